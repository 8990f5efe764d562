//! # Gene Compare
//!
//! Multithreaded comparison of variant calls across pools of samples, to
//! surface candidate causal mutations while suppressing background noise.
//!
//! ## Features
//!
//! - snpEff TXT and snpEff-annotated VCF import (plain or gzip)
//! - Declarative include/exclude row filters from `gene_compare.yaml`
//! - Background, candidate-positional and candidate-gene hit counts
//! - Per-gene homozygosity ratios and flagged-gene annotation
//! - Per-pool pivot tables with deterministic ordering
//! - Multiple output formats (TSV, CSV, JSON, HTML)

pub mod analysis;
pub mod columns;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod flagged;
pub mod output;
pub mod parsers;
pub mod table;
pub mod types;

// Re-export key types
pub use analysis::{Report, VariantAnalyzer};
pub use columns::ColumnKey;
pub use config::Config;
pub use discovery::FileDiscovery;
pub use error::{AnalysisError, ConfigError, FilterError, ImportError, TableError};
pub use filter::{FilterTree, RuleSpec};
pub use flagged::FlaggedGenesImporter;
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{SnpEffImporter, VariantImporter, VcfImporter};
pub use table::{IndexedTable, Table};
pub use types::{DType, Value};
