//! Importers turning upstream variant files into normalized tables.

pub mod snpeff;
pub mod vcf;

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::columns::ColumnKey;
use crate::error::ImportError;
use crate::filter::FilterTree;
use crate::table::{Column, Table};
use crate::types::Value;

pub use snpeff::SnpEffImporter;
pub use vcf::VcfImporter;

/// A variant file format the analysis can import.
///
/// `import` returns `Ok(None)` when the file was skipped for a recoverable
/// reason that has already been logged.
pub trait VariantImporter: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_load(&self, path: &Path) -> bool;

    fn import(&self, pool: &str, path: &Path) -> Result<Option<Table>, ImportError>;
}

/// Settings shared by every importer of a run
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub filter: Arc<FilterTree>,
    /// Columns to keep (besides pool and sample); empty keeps everything
    pub select: Vec<ColumnKey>,
}

/// The fixed, ordered importer list. The first importer whose `can_load`
/// accepts a file wins.
pub fn default_importers(options: &ImportOptions) -> Vec<Box<dyn VariantImporter>> {
    vec![
        Box::new(VcfImporter::new(options.clone())),
        Box::new(SnpEffImporter::new(options.clone())),
    ]
}

/// Open a plain or gzip-compressed (`.gz`) text file
pub fn open_file(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Prefix bare chromosome names with `chr`
pub fn normalize_chromosome(chrom: &str) -> String {
    let chrom = chrom.trim();
    if chrom.starts_with("chr") {
        chrom.to_string()
    } else {
        format!("chr{}", chrom)
    }
}

/// Sample name derived from a file name (stem without the last extension)
pub fn sample_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Common tail of every import: attach pool (and sample), fill missing cells,
/// run the configured filters, and project to the selected columns.
pub(crate) fn finish_import(
    mut table: Table,
    pool: &str,
    sample: Option<&str>,
    path: &Path,
    options: &ImportOptions,
) -> Result<Option<Table>, ImportError> {
    let n = table.n_rows();
    table.set_column(Column::for_key(
        ColumnKey::Pool.as_str(),
        vec![Value::from(pool); n],
    ))?;
    if let Some(sample) = sample {
        table.set_column(Column::for_key(
            ColumnKey::Sample.as_str(),
            vec![Value::from(sample); n],
        ))?;
    }

    table.fill_missing();

    if table.is_empty() {
        warn!("file has no variant rows, skipping: {}", path.display());
        return Ok(None);
    }

    options.filter.apply_in_place(&mut table)?;
    if table.is_empty() {
        warn!(
            "config filter removes all incoming rows, skipping: {}",
            path.display()
        );
        return Ok(None);
    }

    if !options.select.is_empty() {
        let mut keep: Vec<&str> = options.select.iter().map(|k| k.as_str()).collect();
        for key in [ColumnKey::Pool, ColumnKey::Sample] {
            if !keep.contains(&key.as_str()) {
                keep.push(key.as_str());
            }
        }
        table = table.select(&keep)?;
    }

    table.remove_unused_categories();
    Ok(Some(table))
}
