//! Column registry: semantic column keys, their display titles, logical types,
//! recognized input spellings and the fill values used before grouping.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

use crate::types::{DType, Value};

/// Semantic identifier of a known column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKey {
    // snpEff TXT / VCF effect fields
    Chromo,
    Pos,
    Ref,
    Change,
    ChangeType,
    Hh,
    Qual,
    Cov,
    Warns,
    Errors,
    GeneId,
    GeneName,
    GeneCoding,
    BioType,
    TranscriptId,
    ExonId,
    ExonRank,
    Effect,
    EffectImpact,
    FunctionalClass,
    AaDiff,
    CodonDiff,
    CodonNum,
    CodonDeg,
    CdsSize,
    CodonCirca,
    AaCirca,
    CustomIntId,

    // derived
    Pool,
    Sample,
    Background,
    CandPos,
    CandGene,
    CandGeneHomRatio,
    FlaggedGene,
}

/// Expected homozygous marker in the `hh` column.
pub const HOM: &str = "Hom";
pub const HET: &str = "Het";

const OBJECT_DEFAULT: Fill = Fill::Text("");
const UINT64_DEFAULT: Fill = Fill::Int(-1);
const FLOAT64_DEFAULT: Fill = Fill::Float(-1.0);

/// Fill value applied where a column has no value in a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Text(&'static str),
    Int(i64),
    Float(f64),
}

impl Fill {
    pub fn to_value(self) -> Value {
        match self {
            Fill::Text(s) => Value::from(s),
            Fill::Int(v) => Value::Int(v),
            Fill::Float(v) => Value::Float(v),
        }
    }
}

/// Per-key column metadata
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub key: ColumnKey,
    pub title: &'static str,
    pub dtype: DType,
    pub alternates: &'static [&'static str],
    /// Number format hint for exporters, e.g. `0%`
    pub format: Option<&'static str>,
    pub fill: Option<Fill>,
}

const fn meta(
    key: ColumnKey,
    title: &'static str,
    dtype: DType,
    alternates: &'static [&'static str],
    format: Option<&'static str>,
    fill: Option<Fill>,
) -> ColumnMeta {
    ColumnMeta {
        key,
        title,
        dtype,
        alternates,
        format,
        fill,
    }
}

use ColumnKey::*;
use DType::{Bool, Category, Float, Text, UInt};

/// The registry, in canonical column order.
pub const COLUMNS: &[ColumnMeta] = &[
    meta(Chromo, "Chromo", Category, &[], None, None),
    meta(Pos, "Position", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(Ref, "Reference", Category, &[], None, None),
    meta(Change, "Change", Category, &[], None, None),
    meta(ChangeType, "Change_type", Category, &[], None, None),
    meta(Hh, "Homozygous", Category, &[], None, None),
    meta(Qual, "Quality", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(Cov, "Coverage", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(Warns, "Warnings", Text, &["WARNINGS"], None, Some(OBJECT_DEFAULT)),
    meta(Errors, "Errors", Text, &["ERRORS"], None, Some(OBJECT_DEFAULT)),
    meta(GeneId, "Gene_ID", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(GeneName, "Gene_name", Text, &["Gene_Name"], None, Some(OBJECT_DEFAULT)),
    meta(GeneCoding, "Gene_Coding", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(BioType, "Bio_type", Text, &["Transcript_BioType"], None, Some(OBJECT_DEFAULT)),
    // [sic] snpEff 3.3c spelling
    meta(TranscriptId, "Transcript_ID", Text, &["Trancript_ID"], None, Some(OBJECT_DEFAULT)),
    meta(ExonId, "Exon_ID", Text, &["Exon"], None, Some(OBJECT_DEFAULT)),
    meta(ExonRank, "Exon_Rank", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(Effect, "Effect", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(EffectImpact, "Effect_Impact", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(FunctionalClass, "Functional_Class", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(AaDiff, "old_AA/new_AA", Text, &["Amino_Acid_change", "Amino_Acid_Change"], None, Some(OBJECT_DEFAULT)),
    meta(CodonDiff, "Old_codon/New_codon", Text, &["Codon_Change"], None, Some(OBJECT_DEFAULT)),
    meta(CodonNum, "Codon_Num(CDS)", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(CodonDeg, "Codon_Degeneracy", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(CdsSize, "CDS_size", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(CodonCirca, "Codons_around", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(AaCirca, "AAs_around", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(CustomIntId, "Custom_interval_ID", Text, &[], None, Some(OBJECT_DEFAULT)),
    meta(Pool, "Pool", Category, &[], None, None),
    meta(Sample, "Sample", Category, &[], None, None),
    meta(Background, "Background", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(CandPos, "Candidate: Positional", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(CandGene, "Candidate: Gene", UInt, &[], None, Some(UINT64_DEFAULT)),
    meta(CandGeneHomRatio, "Gene Hit Homozygosity", Float, &[], Some("0%"), Some(FLOAT64_DEFAULT)),
    meta(FlaggedGene, "Flagged Gene", Bool, &[], None, None),
];

impl ColumnKey {
    /// Stable key name as used in configuration files and table schemas
    pub fn as_str(&self) -> &'static str {
        match self {
            Chromo => "chromo",
            Pos => "pos",
            Ref => "ref",
            Change => "change",
            ChangeType => "change_type",
            Hh => "hh",
            Qual => "qual",
            Cov => "cov",
            Warns => "warns",
            Errors => "errors",
            GeneId => "gene_id",
            GeneName => "gene_name",
            GeneCoding => "gene_coding",
            BioType => "bio_type",
            TranscriptId => "transcript_id",
            ExonId => "exon_id",
            ExonRank => "exon_rank",
            Effect => "effect",
            EffectImpact => "effect_impact",
            FunctionalClass => "functional_class",
            AaDiff => "aa_diff",
            CodonDiff => "codon_diff",
            CodonNum => "codon_num",
            CodonDeg => "codon_deg",
            CdsSize => "cds_size",
            CodonCirca => "codon_circa",
            AaCirca => "aa_circa",
            CustomIntId => "custom_int_id",
            Pool => "pool",
            Sample => "sample",
            Background => "background",
            CandPos => "cand_pos",
            CandGene => "cand_gene",
            CandGeneHomRatio => "cand_gene_hom_ratio",
            FlaggedGene => "flagged_gene",
        }
    }

    pub fn meta(&self) -> &'static ColumnMeta {
        // COLUMNS is declared in enum order
        &COLUMNS[*self as usize]
    }

    pub fn title(&self) -> &'static str {
        self.meta().title
    }

    pub fn dtype(&self) -> DType {
        self.meta().dtype
    }

    pub fn fill(&self) -> Option<Value> {
        self.meta().fill.map(Fill::to_value)
    }

    /// Parse a key name (`gene_id`), returning `None` for unknown keys
    pub fn from_key(name: &str) -> Option<ColumnKey> {
        COLUMNS
            .iter()
            .find(|m| m.key.as_str() == name)
            .map(|m| m.key)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    /// Map of raw input column names to normalized column keys
    static ref LOOKUP: HashMap<&'static str, ColumnKey> = build_lookup();
}

fn build_lookup() -> HashMap<&'static str, ColumnKey> {
    let mut lookup = HashMap::new();
    for m in COLUMNS {
        let names = std::iter::once(m.key.as_str())
            .chain(std::iter::once(m.title))
            .chain(m.alternates.iter().copied());
        for name in names {
            if let Some(previous) = lookup.insert(name, m.key) {
                if previous != m.key {
                    tracing::error!(
                        "column name '{}' is claimed by both {} and {}",
                        name,
                        previous,
                        m.key
                    );
                }
            }
        }
    }
    lookup
}

/// Normalize one raw input column name
pub fn lookup(raw: &str) -> Option<ColumnKey> {
    LOOKUP.get(raw.trim()).copied()
}

/// Normalize a list of raw input column names
pub fn normalize<S: AsRef<str>>(raw_columns: &[S]) -> Vec<Option<ColumnKey>> {
    raw_columns.iter().map(|c| lookup(c.as_ref())).collect()
}

/// Display title for a table column name, falling back to the name itself
pub fn output_name(column: &str) -> &str {
    match ColumnKey::from_key(column) {
        Some(key) => key.title(),
        None => column,
    }
}

/// All known key names, for error messages
pub fn column_keys() -> Vec<&'static str> {
    COLUMNS.iter().map(|m| m.key.as_str()).collect()
}
