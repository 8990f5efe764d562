//! Error types for the gene-compare library.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems, reported before any import starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Selected column '{column}' not a recognized column key. Must be one of {known}")]
    UnknownColumn { column: String, known: String },

    #[error("Malformed rule '{rule}': {reason}")]
    MalformedRule { rule: String, reason: String },

    #[error("Invalid regex in rule '{rule}': {source}")]
    Regex {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("Please call using a directory, not a specific file: {0}")]
    NotADirectory(PathBuf),

    #[error("No pool sub-directories found in {0}")]
    NoPools(PathBuf),
}

/// Table manipulation errors.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{0}' would appear twice")]
    DuplicateColumn(String),
}

/// Errors raised while evaluating a compiled filter rule.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Column in rule '{rule}' not found in table: {column}")]
    ColumnNotFound { rule: String, column: String },

    #[error("Rule '{rule}' cannot compare value '{value}' in column '{column}' as {target}")]
    Coercion {
        rule: String,
        column: String,
        value: String,
        target: &'static str,
    },
}

/// Import failures. Recoverable conditions never surface as errors: importers
/// log them and return `Ok(None)`.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {column} value '{value}' on line {line}")]
    InvalidValue {
        column: String,
        value: String,
        line: usize,
    },

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Top-level errors of an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{loader} generated an exception while loading {pool}/{file}: {source}")]
    Import {
        loader: &'static str,
        pool: String,
        file: PathBuf,
        #[source]
        source: ImportError,
    },

    #[error("Failed to load flagged genes from {path}: {source}")]
    FlaggedGenes {
        path: PathBuf,
        #[source]
        source: ImportError,
    },

    #[error("{pool} generated an exception: {source}")]
    Pivot {
        pool: String,
        #[source]
        source: TableError,
    },

    #[error("Analysis error: {0}")]
    Table(#[from] TableError),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("No variant data could be imported from {0}")]
    NoData(PathBuf),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
