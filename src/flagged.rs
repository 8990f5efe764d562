//! Curated gene lists, loaded into a gene-id indexed membership table.

use csv::ReaderBuilder;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::columns::ColumnKey;
use crate::discovery::list_files;
use crate::error::ImportError;
use crate::parsers::{open_file, sample_name};
use crate::table::{Column, IndexedTable, Table};
use crate::types::{DType, Value};

lazy_static! {
    static ref GENE_ID: Regex = Regex::new(r"^AT(?:[1-5]|M|C)G[0-9]{5}(?:\.[0-9]+)?$").unwrap();
}

/// Loads flagged genes from one delimited file (one category) or a directory
/// of them (one category per file).
#[derive(Debug, Clone)]
pub struct FlaggedGenesImporter {
    path: Option<PathBuf>,
    details: bool,
}

impl FlaggedGenesImporter {
    /// `relative` is resolved against `root`; a missing source is only a warning
    pub fn new(root: &Path, relative: Option<&str>, details: bool) -> Self {
        let path = relative.and_then(|relative| {
            let path = root.join(relative);
            if path.exists() {
                Some(path)
            } else {
                warn!(
                    "unable to locate specified flagged genes file: {}",
                    path.display()
                );
                None
            }
        });
        Self { path, details }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Membership table indexed by `gene_id`, or `None` without a source
    pub fn load(&self) -> Result<Option<IndexedTable>, ImportError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let sources = if path.is_dir() {
            list_files(path)
        } else {
            vec![path.clone()]
        };

        let mut categories: Vec<(String, BTreeSet<String>)> = Vec::with_capacity(sources.len());
        for source in &sources {
            let genes = read_genes(source)?;
            debug!("{} flagged genes in {}", genes.len(), source.display());
            categories.push((sample_name(source), genes));
        }

        let all: BTreeSet<&String> = categories.iter().flat_map(|(_, genes)| genes).collect();

        let index = Table::new().with_column(Column::for_key(
            ColumnKey::GeneId.as_str(),
            all.iter().map(|g| Value::from(g.as_str())).collect(),
        ))?;

        let mut data = Table::new().with_column(Column::for_key(
            ColumnKey::FlaggedGene.as_str(),
            vec![Value::Bool(true); all.len()],
        ))?;
        if self.details {
            for (category, genes) in &categories {
                let values = all.iter().map(|g| Value::Bool(genes.contains(*g))).collect();
                data.set_column(Column::new(category.as_str(), DType::Bool, values))?;
            }
        }

        Ok(Some(IndexedTable { index, data }))
    }
}

/// Gene ids from the first field of every row below the header line
fn read_genes(path: &Path) -> Result<BTreeSet<String>, ImportError> {
    let is_csv = path
        .to_string_lossy()
        .to_ascii_lowercase()
        .trim_end_matches(".gz")
        .ends_with(".csv");

    let mut reader = ReaderBuilder::new()
        .delimiter(if is_csv { b',' } else { b'\t' })
        .has_headers(true)
        .flexible(true)
        .from_reader(open_file(path)?);

    let mut genes = BTreeSet::new();
    for record in reader.records() {
        let record = record?;
        let Some(first) = record.get(0) else {
            continue;
        };
        let gene = first.trim().to_uppercase();
        if GENE_ID.is_match(&gene) {
            genes.insert(gene);
        }
    }
    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn flags(table: &IndexedTable, column: &str) -> Vec<bool> {
        table
            .data
            .column(column)
            .unwrap()
            .values()
            .iter()
            .map(Value::is_truthy)
            .collect()
    }

    #[test]
    fn test_single_file_normalizes_and_dedups() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("flowering.tsv"),
            "Gene\tNote\n at2g00002 \tx\nAT1G00001.1\ty\nAT2G00002\tdup\nPHYB\tsymbol\n",
        )
        .unwrap();

        let importer = FlaggedGenesImporter::new(dir.path(), Some("flowering.tsv"), false);
        let table = importer.load().unwrap().unwrap();
        assert_eq!(
            table.index.column("gene_id").unwrap().values(),
            &[Value::from("AT1G00001.1"), Value::from("AT2G00002")]
        );
        assert_eq!(table.data.column_names(), vec!["flagged_gene"]);
        assert_eq!(flags(&table, "flagged_gene"), vec![true, true]);
    }

    #[test]
    fn test_directory_with_details_outer_joins_categories() {
        let dir = TempDir::new().unwrap();
        let lists = dir.path().join("flagged");
        fs::create_dir(&lists).unwrap();
        fs::write(lists.join("light.csv"), "gene,source\nAT1G00001,a\nAT3G00003,b\n").unwrap();
        fs::write(lists.join("heat.tsv"), "gene\nAT3G00003\nATMG00010\n").unwrap();

        let importer = FlaggedGenesImporter::new(dir.path(), Some("flagged"), true);
        let table = importer.load().unwrap().unwrap();

        assert_eq!(
            table.index.column("gene_id").unwrap().values(),
            &[
                Value::from("AT1G00001"),
                Value::from("AT3G00003"),
                Value::from("ATMG00010")
            ]
        );
        assert_eq!(table.data.column_names(), vec!["flagged_gene", "heat", "light"]);
        assert_eq!(flags(&table, "heat"), vec![false, true, true]);
        assert_eq!(flags(&table, "light"), vec![true, true, false]);
    }

    #[test]
    fn test_missing_source_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let importer = FlaggedGenesImporter::new(dir.path(), Some("nope.tsv"), false);
        assert!(importer.path().is_none());
        assert!(importer.load().unwrap().is_none());
        assert!(FlaggedGenesImporter::new(dir.path(), None, false)
            .load()
            .unwrap()
            .is_none());
    }
}
