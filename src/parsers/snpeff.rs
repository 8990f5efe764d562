use std::io::BufRead;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

use crate::columns::{self, ColumnKey};
use crate::error::ImportError;
use crate::parsers::{finish_import, open_file, sample_name, ImportOptions, VariantImporter};
use crate::table::{Column, Table};
use crate::types::Value;

const HEADER_PREFIX: &str = "# Chromo";

/// snpEff TXT summary importer. One file holds one sample; the sample name is
/// the file stem.
pub struct SnpEffImporter {
    options: ImportOptions,
}

impl SnpEffImporter {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    /// Normalized header columns, `None` when the file has no header line.
    /// Unreadable or non-UTF-8 input is an I/O error.
    fn extract_columns(&self, path: &Path) -> std::io::Result<Option<Vec<Option<ColumnKey>>>> {
        let mut reader = open_file(path)?;
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            if line.starts_with(HEADER_PREFIX) {
                let raw: Vec<&str> = line[1..].trim_end_matches(['\n', '\r']).split('\t').collect();
                return Ok(Some(columns::normalize(&raw)));
            }
            line.clear();
        }
        Ok(None)
    }

    /// Keep the first occurrence of each recognized key
    fn kept_columns(header: &[Option<ColumnKey>]) -> Vec<(usize, ColumnKey)> {
        let mut kept: Vec<(usize, ColumnKey)> = Vec::new();
        for (i, key) in header.iter().enumerate() {
            if let Some(key) = key {
                if !kept.iter().any(|(_, k)| k == key) {
                    kept.push((i, *key));
                }
            }
        }
        kept
    }

    fn parse_data_line(
        &self,
        line: &str,
        line_no: usize,
        kept: &[(usize, ColumnKey)],
        columns: &mut [Vec<Value>],
    ) -> Result<(), ImportError> {
        let parts: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
        for ((idx, key), column) in kept.iter().zip(columns.iter_mut()) {
            let field = parts.get(*idx).copied().unwrap_or("");
            let value = key.dtype().parse(field).ok_or_else(|| ImportError::InvalidValue {
                column: key.to_string(),
                value: field.to_string(),
                line: line_no,
            })?;
            column.push(value);
        }
        Ok(())
    }
}

impl VariantImporter for SnpEffImporter {
    fn name(&self) -> &'static str {
        "SnpEffImporter"
    }

    fn can_load(&self, path: &Path) -> bool {
        match self.extract_columns(path) {
            Ok(Some(header)) => header.iter().any(Option::is_some),
            _ => false,
        }
    }

    fn import(&self, pool: &str, path: &Path) -> Result<Option<Table>, ImportError> {
        let start = Instant::now();
        let Some(header) = self.extract_columns(path)? else {
            warn!(
                "no '{}' header line, skipping: {}",
                HEADER_PREFIX,
                path.display()
            );
            return Ok(None);
        };
        let kept = Self::kept_columns(&header);

        let mut reader = open_file(path)?;
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); kept.len()];
        let mut line = String::new();
        let mut line_no = 0;
        while reader.read_line(&mut line)? > 0 {
            line_no += 1;
            if !line.starts_with('#') && !line.trim().is_empty() {
                self.parse_data_line(&line, line_no, &kept, &mut columns)?;
            }
            line.clear();
        }

        let mut table = Table::new();
        for ((_, key), values) in kept.iter().zip(columns) {
            table.push_column(Column::for_key(key.as_str(), values))?;
        }

        let sample = sample_name(path);
        let result = finish_import(table, pool, Some(&sample), path, &self.options);
        debug!(
            "snpeff import of {} took {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "# Chromo\tPosition\tReference\tChange\tChange_type\tHomozygous\tQuality\tCoverage\tWarnings\tGene_ID\tGene_name\tBio_type\tTrancript_ID\tExon_ID\tExon_Rank\tEffect\told_AA/new_AA\tOld_codon/New_codon\tCodon_Num(CDS)\tCodon_Degeneracy\tCDS_size\tCodons_around\tAAs_around\tCustom_interval_ID";

    fn write_snpeff(dir: &Path, name: &str, rows: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut content = format!("# SnpEff version 3.3c\n{}\n", HEADER);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_can_load_requires_header() {
        let dir = TempDir::new().unwrap();
        let good = write_snpeff(dir.path(), "S1.snpeff", &[]);
        let plain = dir.path().join("readme.txt");
        fs::write(&plain, "hello\n").unwrap();
        let binary = dir.path().join("blob.bin");
        fs::write(&binary, [0xffu8, 0xfe, 0x00, 0x80]).unwrap();

        let importer = SnpEffImporter::new(ImportOptions::default());
        assert!(importer.can_load(&good));
        assert!(!importer.can_load(&plain));
        assert!(!importer.can_load(&binary));
    }

    #[test]
    fn test_import_types_and_sample_name() {
        let dir = TempDir::new().unwrap();
        let path = write_snpeff(
            dir.path(),
            "M12.snpeff",
            &["chr1\t100\tC\tT\tSNP\tHom\t50\t12\t\tAT1G01010\tNAC001\tprotein_coding\tAT1G01010.1\texon_1_100_200\t1\tNON_SYNONYMOUS_CODING\tA/V\tgCt/gTt\t45\t\t1290\t\t\t"],
        );
        let importer = SnpEffImporter::new(ImportOptions::default());
        let table = importer.import("P1", &path).unwrap().unwrap();

        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.column("pos").unwrap().get(0), &Value::Int(100));
        assert_eq!(table.column("qual").unwrap().get(0), &Value::Int(50));
        assert_eq!(table.column("transcript_id").unwrap().get(0), &Value::from("AT1G01010.1"));
        assert_eq!(table.column("warns").unwrap().get(0), &Value::from(""));
        assert_eq!(table.column("sample").unwrap().get(0), &Value::from("M12"));
        assert_eq!(table.column("pool").unwrap().get(0), &Value::from("P1"));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_snpeff(dir.path(), "S1.snpeff", &["chr1\tabc\tC\tT\tSNP\tHom\t50\t12"]);
        let importer = SnpEffImporter::new(ImportOptions::default());
        match importer.import("P1", &path) {
            Err(ImportError::InvalidValue { column, value, line }) => {
                assert_eq!(column, "pos");
                assert_eq!(value, "abc");
                assert_eq!(line, 3);
            }
            other => panic!("expected InvalidValue, got {:?}", other.map(|t| t.map(|t| t.n_rows()))),
        }
    }

    #[test]
    fn test_missing_header_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("S1.snpeff");
        fs::write(&path, "# SnpEff version 3.3c\nchr1\t100\tC\tT\n").unwrap();
        let importer = SnpEffImporter::new(ImportOptions::default());
        assert!(importer.import("P1", &path).unwrap().is_none());
    }

    #[test]
    fn test_header_only_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_snpeff(dir.path(), "S1.snpeff", &[]);
        let importer = SnpEffImporter::new(ImportOptions::default());
        assert!(importer.import("P1", &path).unwrap().is_none());
    }
}
