use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::columns::{self, ColumnKey, HET, HOM};
use crate::error::ImportError;
use crate::parsers::{finish_import, normalize_chromosome, open_file, ImportOptions, VariantImporter};
use crate::table::{Column, Table};
use crate::types::Value;

lazy_static! {
    static ref INFO_ID: Regex = Regex::new(r"[<,]ID=([^,>]+)").unwrap();
    static ref INFO_DESCRIPTION: Regex = Regex::new(r#"Description="((?:[^"\\]|\\.)*)""#).unwrap();
    static ref INFO_LIST: Regex = Regex::new(r"^.*: '(.+)'\s*$").unwrap();
    static ref INFO_LIST_SEP: Regex = Regex::new(r"[|(]").unwrap();
    static ref GENE_ID: Regex = Regex::new(r"^AT[1-5]G\d{5}$").unwrap();
}

const TYPE_INFO_KEYS: &[&str] = &["TYPE", "VARTYPE"];
const HOM_INFO_KEYS: &[&str] = &["HOM"];
const EFF_INFO_KEYS: &[&str] = &["EFF", "ANN"];

/// snpEff-annotated VCF importer. Emits one row per record, ALT allele and sample.
pub struct VcfImporter {
    options: ImportOptions,
}

#[derive(Debug, Default)]
struct VcfHeader {
    /// INFO id -> description
    info: HashMap<String, String>,
    samples: Vec<String>,
}

impl VcfHeader {
    fn parse_meta_line(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("##INFO=") {
            if let Some(id) = INFO_ID.captures(rest).map(|c| c[1].to_string()) {
                let description = INFO_DESCRIPTION
                    .captures(rest)
                    .map(|c| c[1].to_string())
                    .unwrap_or_default();
                self.info.insert(id, description);
            }
        }
    }

    fn parse_column_line(&mut self, line: &str) {
        let parts: Vec<&str> = line.trim_end().split('\t').collect();
        if parts.len() > 9 {
            self.samples = parts[9..].iter().map(|s| s.to_string()).collect();
        }
    }

    fn find_info(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find(|id| self.info.contains_key(**id))
            .map(|id| id.to_string())
    }
}

/// Where each output column comes from in a raw row
#[derive(Debug)]
struct Layout {
    type_key: String,
    hom_key: String,
    eff_key: String,
    eff_fields: usize,
    /// (raw column position, normalized key), first spelling of each key wins
    kept: Vec<(usize, ColumnKey)>,
}

impl VcfImporter {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    fn resolve_layout(&self, header: &VcfHeader, path: &Path) -> Option<Layout> {
        let Some(type_key) = header.find_info(TYPE_INFO_KEYS) else {
            warn!(
                "cannot find Variant Type (TYPE/VARTYPE) in vcf header, skipping: {}",
                path.display()
            );
            return None;
        };

        let Some(hom_key) = header.find_info(HOM_INFO_KEYS) else {
            warn!("cannot find HOM in vcf header, skipping: {}", path.display());
            return None;
        };

        let Some(eff_key) = header.find_info(EFF_INFO_KEYS) else {
            warn!(
                "cannot find snpEff effects in vcf file, skipping: {}",
                path.display()
            );
            return None;
        };

        let Some(desc) = INFO_LIST.captures(&header.info[&eff_key]) else {
            warn!(
                "unable to load vcf snpEff effect fields, skipping: {}",
                path.display()
            );
            return None;
        };

        let eff_fields: Vec<String> = INFO_LIST_SEP
            .split(&desc[1])
            .map(|s| s.trim_matches(|c: char| matches!(c, ' ' | ']' | '[' | ')')).to_string())
            .collect();
        if eff_fields.iter().all(|f| f.is_empty()) {
            warn!(
                "unable to parse vcf snpEff effect fields, skipping: {}",
                path.display()
            );
            return None;
        }

        let mut raw_columns: Vec<String> = [
            ColumnKey::Chromo,
            ColumnKey::Pos,
            ColumnKey::Ref,
            ColumnKey::Change,
            ColumnKey::ChangeType,
            ColumnKey::Hh,
        ]
        .iter()
        .map(|k| k.as_str().to_string())
        .collect();
        raw_columns.extend(eff_fields.iter().cloned());
        raw_columns.push(ColumnKey::Sample.as_str().to_string());

        let mut kept: Vec<(usize, ColumnKey)> = Vec::new();
        for (i, (raw, key)) in raw_columns.iter().zip(columns::normalize(&raw_columns)).enumerate() {
            match key {
                Some(key) if !kept.iter().any(|(_, k)| *k == key) => kept.push((i, key)),
                Some(_) => debug!("duplicate column {} ignored in {}", raw, path.display()),
                None => debug!("unrecognized effect field {} ignored in {}", raw, path.display()),
            }
        }

        Some(Layout {
            type_key,
            hom_key,
            eff_key,
            eff_fields: eff_fields.len(),
            kept,
        })
    }

    fn parse_info_field(&self, info_str: &str) -> HashMap<String, String> {
        let mut info_map = HashMap::new();
        if info_str == "." {
            return info_map;
        }

        for entry in info_str.split(';') {
            match entry.split_once('=') {
                Some((key, value)) => info_map.insert(key.to_string(), value.to_string()),
                None => info_map.insert(entry.to_string(), "true".to_string()),
            };
        }

        info_map
    }

    /// Split the first effect annotation into its declared fields
    fn split_effects(&self, eff: Option<&String>, num_fields: usize) -> Vec<Option<String>> {
        let mut effects: Vec<Option<String>> = match eff.and_then(|e| e.split(',').next()) {
            Some(first) => INFO_LIST_SEP
                .split(first)
                .map(|s| {
                    let s = s.trim_matches(|c: char| c == ' ' || c == ')');
                    (!s.is_empty()).then(|| s.to_string())
                })
                .collect(),
            None => Vec::new(),
        };
        effects.resize(num_fields, None);
        effects
    }

    fn parse_variant_line(
        &self,
        line: &str,
        line_no: usize,
        header: &VcfHeader,
        layout: &Layout,
        columns: &mut [Vec<Value>],
    ) -> Result<(), ImportError> {
        let parts: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
        if parts.len() < 8 {
            return Err(ImportError::InvalidRecord {
                line: line_no,
                reason: "not enough columns".to_string(),
            });
        }

        let chromosome = normalize_chromosome(parts[0]);
        let alts: Vec<&str> = parts[4].split(',').filter(|a| *a != ".").collect();
        let info = self.parse_info_field(parts[7]);

        let types: Vec<&str> = info
            .get(&layout.type_key)
            .map(|t| t.split(',').collect())
            .unwrap_or_default();
        let hh = match info.get(&layout.hom_key).map(String::as_str) {
            None | Some("0") | Some("false") | Some("False") => HET,
            Some(_) => HOM,
        };
        let effects = self.split_effects(info.get(&layout.eff_key), layout.eff_fields);

        for (i, alt) in alts.iter().enumerate() {
            let variant_type = types.get(i).ok_or_else(|| ImportError::InvalidRecord {
                line: line_no,
                reason: format!("no {} value for ALT allele {}", layout.type_key, alt),
            })?;
            let variant_type = variant_type.to_uppercase();

            for sample in &header.samples {
                let mut raw: Vec<Option<&str>> = vec![
                    Some(chromosome.as_str()),
                    Some(parts[1]),
                    Some(parts[3]),
                    Some(*alt),
                    Some(variant_type.as_str()),
                    Some(hh),
                ];
                raw.extend(effects.iter().map(|e| e.as_deref()));
                raw.push(Some(sample.as_str()));

                for ((idx, key), column) in layout.kept.iter().zip(columns.iter_mut()) {
                    let field = raw[*idx].unwrap_or("");
                    let value = key.dtype().parse(field).ok_or_else(|| ImportError::InvalidValue {
                        column: key.to_string(),
                        value: field.to_string(),
                        line: line_no,
                    })?;
                    column.push(value);
                }
            }
        }
        Ok(())
    }
}

/// Fill in `gene_id` from whichever column holds the most gene identifiers:
/// `gene_name` as-is, or `transcript_id` up to its first `.`
fn derive_gene_id(table: &mut Table, path: &Path) -> Result<(), ImportError> {
    if table.has_column(ColumnKey::GeneId.as_str()) {
        return Ok(());
    }

    let mut best: Option<(&'static str, ColumnKey, usize, Vec<Value>)> = None;
    let candidates = [
        ("copied", ColumnKey::GeneName),
        ("derived", ColumnKey::TranscriptId),
    ];
    for (method, key) in candidates {
        let Some(column) = table.column(key.as_str()) else {
            continue;
        };
        let values: Vec<Value> = column
            .values()
            .iter()
            .map(|v| match (key, v) {
                (ColumnKey::TranscriptId, Value::Str(s)) => {
                    Value::from(s.split('.').next().unwrap_or_default())
                }
                _ => v.clone(),
            })
            .collect();
        let matches = values
            .iter()
            .filter(|v| v.as_str().map(|s| GENE_ID.is_match(s)).unwrap_or(false))
            .count();
        if best.as_ref().map(|b| matches > b.2).unwrap_or(true) {
            best = Some((method, key, matches, values));
        }
    }

    if let Some((method, key, _, values)) = best {
        info!(
            "{} was {} from {} in {}",
            ColumnKey::GeneId,
            method,
            key,
            path.display()
        );
        table.set_column(Column::for_key(ColumnKey::GeneId.as_str(), values))?;
    }
    Ok(())
}

impl VariantImporter for VcfImporter {
    fn name(&self) -> &'static str {
        "VcfImporter"
    }

    fn can_load(&self, path: &Path) -> bool {
        let Ok(mut reader) = open_file(path) else {
            return false;
        };
        let mut first_line = String::new();
        match reader.read_line(&mut first_line) {
            Ok(_) => first_line.starts_with("##fileformat=VCF"),
            Err(_) => false,
        }
    }

    fn import(&self, pool: &str, path: &Path) -> Result<Option<Table>, ImportError> {
        let start = Instant::now();
        let mut reader = open_file(path)?;
        let mut header = VcfHeader::default();

        let mut line = String::new();
        let mut line_no = 0;
        while reader.read_line(&mut line)? > 0 {
            line_no += 1;
            if line.starts_with("##") {
                header.parse_meta_line(line.trim_end());
            } else if line.starts_with("#CHROM") {
                header.parse_column_line(&line);
                line.clear();
                break;
            } else if !line.trim().is_empty() {
                return Err(ImportError::InvalidRecord {
                    line: line_no,
                    reason: "record found before the #CHROM header line".to_string(),
                });
            }
            line.clear();
        }

        let Some(layout) = self.resolve_layout(&header, path) else {
            return Ok(None);
        };

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); layout.kept.len()];
        while reader.read_line(&mut line)? > 0 {
            line_no += 1;
            if !line.starts_with('#') && !line.trim().is_empty() {
                self.parse_variant_line(&line, line_no, &header, &layout, &mut columns)?;
            }
            line.clear();
        }

        let mut table = Table::new();
        for ((_, key), values) in layout.kept.iter().zip(columns) {
            table.push_column(Column::for_key(key.as_str(), values))?;
        }
        derive_gene_id(&mut table, path)?;

        let result = finish_import(table, pool, None, path, &self.options);
        debug!(
            "vcf import of {} took {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const EFF_HEADER: &str = "##INFO=<ID=EFF,Number=.,Type=String,Description=\"Predicted effects for this variant.Format: 'Effect ( Effect_Impact | Functional_Class | Codon_Change | Amino_Acid_Change| Amino_Acid_Length | Gene_Name | Transcript_BioType | Gene_Coding | Transcript_ID | Exon_Rank  | Genotype_Number [ | ERRORS | WARNINGS ] )' \">";

    fn write_vcf(dir: &Path, name: &str, with_hom: bool) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        writeln!(f, "##fileformat=VCFv4.1").unwrap();
        writeln!(f, "##INFO=<ID=TYPE,Number=A,Type=String,Description=\"The type of allele\">").unwrap();
        if with_hom {
            writeln!(f, "##INFO=<ID=HOM,Number=0,Type=Flag,Description=\"Homozygous\">").unwrap();
        }
        writeln!(f, "{}", EFF_HEADER).unwrap();
        writeln!(f, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tM1\tM2").unwrap();
        writeln!(
            f,
            "1\t100\t.\tC\tT\t50\tPASS\tTYPE=snp;HOM;EFF=NON_SYNONYMOUS_CODING(MODERATE|MISSENSE|gCt/gTt|A45V|300|AT1G01010|protein_coding|CODING|AT1G01010.1|2|1)\tGT\t1/1\t1/1"
        )
        .unwrap();
        writeln!(
            f,
            "chr2\t250\t.\tG\tA,C\t40\tPASS\tTYPE=snp,snp;EFF=INTERGENIC(MODIFIER|||||||||||1)\tGT\t0/1\t0/2"
        )
        .unwrap();
        path
    }

    #[test]
    fn test_can_load_detects_vcf() {
        let dir = TempDir::new().unwrap();
        let vcf = write_vcf(dir.path(), "calls.vcf", true);
        let other = dir.path().join("notes.txt");
        std::fs::write(&other, "# Chromo\tPosition\n").unwrap();

        let importer = VcfImporter::new(ImportOptions::default());
        assert!(importer.can_load(&vcf));
        assert!(!importer.can_load(&other));
    }

    #[test]
    fn test_import_emits_row_per_alt_and_sample() {
        let dir = TempDir::new().unwrap();
        let vcf = write_vcf(dir.path(), "calls.vcf", true);
        let importer = VcfImporter::new(ImportOptions::default());
        let table = importer.import("P1", &vcf).unwrap().unwrap();

        // 1 alt x 2 samples + 2 alts x 2 samples
        assert_eq!(table.n_rows(), 6);
        let chromo = table.column("chromo").unwrap();
        assert_eq!(chromo.get(0), &Value::from("chr1"));
        assert_eq!(chromo.get(2), &Value::from("chr2"));
        assert_eq!(table.column("hh").unwrap().get(0), &Value::from("Hom"));
        assert_eq!(table.column("hh").unwrap().get(2), &Value::from("Het"));
        assert_eq!(table.column("change_type").unwrap().get(0), &Value::from("SNP"));
        assert_eq!(table.column("change").unwrap().get(4), &Value::from("C"));
        assert_eq!(table.column("sample").unwrap().get(1), &Value::from("M2"));
        assert_eq!(table.column("pool").unwrap().get(5), &Value::from("P1"));
        assert_eq!(table.column("exon_rank").unwrap().get(0), &Value::Int(2));
        // missing effect fields receive registry fill values
        assert_eq!(table.column("exon_rank").unwrap().get(2), &Value::Int(-1));
        assert_eq!(table.column("gene_id").unwrap().get(0), &Value::from("AT1G01010"));
        assert_eq!(table.column("gene_id").unwrap().get(2), &Value::from(""));
        assert!(!table.has_column("Genotype_Number"));
    }

    #[test]
    fn test_missing_hom_header_skips_file() {
        let dir = TempDir::new().unwrap();
        let vcf = write_vcf(dir.path(), "calls.vcf", false);
        let importer = VcfImporter::new(ImportOptions::default());
        assert!(importer.import("P1", &vcf).unwrap().is_none());
    }

    #[test]
    fn test_gene_id_derived_from_transcripts_when_names_are_symbols() {
        let mut table = Table::from_rows(
            &[
                ("gene_name", crate::types::DType::Text),
                ("transcript_id", crate::types::DType::Text),
            ],
            vec![
                vec![Value::from("PHYB"), Value::from("AT2G18790.1")],
                vec![Value::from("CRY1"), Value::from("AT4G08920.2")],
            ],
        )
        .unwrap();
        derive_gene_id(&mut table, Path::new("x.vcf")).unwrap();
        assert_eq!(
            table.column("gene_id").unwrap().values(),
            &[Value::from("AT2G18790"), Value::from("AT4G08920")]
        );
    }
}
