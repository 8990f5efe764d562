use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::columns::{ColumnKey, HOM};
use crate::config::Config;
use crate::discovery::{natural_cmp, FileDiscovery};
use crate::error::{AnalysisError, Result, TableError};
use crate::filter::FilterTree;
use crate::flagged::FlaggedGenesImporter;
use crate::parsers::{default_importers, ImportOptions, VariantImporter};
use crate::table::{concat, Column, IndexedTable, JoinHow, Table};
use crate::types::{DType, Value};

/// Ordered sheet name -> table map handed to the exporter
#[derive(Debug, Clone, Default)]
pub struct Report {
    sheets: Vec<(String, Table)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, replacing any sheet with the same name
    pub fn push(&mut self, name: impl Into<String>, table: Table) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some(sheet) => sheet.1 = table,
            None => self.sheets.push((name, table)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> + '_ {
        self.sheets.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

/// One (pool, file) import unit and the importer that accepted the file
#[derive(Debug, Clone)]
struct PlannedImport {
    pool: String,
    path: PathBuf,
    importer: usize,
}

/// Pooled-sample variant analysis over `<pool_root>/<pool>/<files>`
pub struct VariantAnalyzer {
    pool_root: PathBuf,
    pools: Vec<String>,
    importers: Vec<Box<dyn VariantImporter>>,
    plan: Vec<PlannedImport>,
    flagged: Option<FlaggedGenesImporter>,
    workers: usize,
}

impl VariantAnalyzer {
    /// Configure a run from `gene_compare.yaml` in `pool_root`
    pub fn new(pool_root: &Path, workers: usize) -> Result<Self> {
        let config = Config::load(pool_root)?;
        Self::with_config(pool_root, config, workers)
    }

    /// Validate `config` and plan every import. Configuration problems are
    /// reported here, before any file is read.
    pub fn with_config(pool_root: &Path, config: Config, workers: usize) -> Result<Self> {
        let discovery = FileDiscovery::new(pool_root)?;
        let pools = discovery.pools()?;

        let options = ImportOptions {
            select: config.selected_keys()?,
            filter: Arc::new(FilterTree::compile(&config.filters)?),
        };
        let importers = default_importers(&options);

        let mut plan = Vec::new();
        for pool in &pools {
            for path in discovery.files_in(pool) {
                match importers.iter().position(|i| i.can_load(&path)) {
                    Some(importer) => plan.push(PlannedImport {
                        pool: pool.clone(),
                        path,
                        importer,
                    }),
                    None => warn!("unable to identify file: {}", path.display()),
                }
            }
        }

        let flagged = config.flagged_genes_path.as_deref().map(|relative| {
            FlaggedGenesImporter::new(pool_root, Some(relative), config.flagged_genes_details)
        });

        Ok(Self {
            pool_root: pool_root.to_path_buf(),
            pools,
            importers,
            plan,
            flagged,
            workers: workers.max(1),
        })
    }

    pub fn pool_root(&self) -> &Path {
        &self.pool_root
    }

    pub fn pools(&self) -> &[String] {
        &self.pools
    }

    /// Planned imports as (pool, file, importer name)
    pub fn planned_imports(&self) -> Vec<(&str, &Path, &'static str)> {
        self.plan
            .iter()
            .map(|p| (p.pool.as_str(), p.path.as_path(), self.importers[p.importer].name()))
            .collect()
    }

    /// Import, analyse and pivot everything
    pub fn run(&self) -> Result<Report> {
        let table = self.load_tables()?;
        self.analyse(table)
    }

    fn worker_pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?)
    }

    /// Import every planned file and concatenate the results in plan order
    pub fn load_tables(&self) -> Result<Table> {
        let start = Instant::now();
        let workers = self.worker_pool()?;

        let imported: Vec<Option<Table>> = workers.install(|| {
            self.plan
                .par_iter()
                .map(|item| {
                    let importer = &self.importers[item.importer];
                    importer
                        .import(&item.pool, &item.path)
                        .map_err(|source| AnalysisError::Import {
                            loader: importer.name(),
                            pool: item.pool.clone(),
                            file: item.path.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let merged = imported
            .into_iter()
            .flatten()
            .reduce(concat)
            .ok_or_else(|| AnalysisError::NoData(self.pool_root.clone()))?;

        info!(
            "pool imports took {}ms total ({} rows)",
            start.elapsed().as_millis(),
            merged.n_rows()
        );
        Ok(merged)
    }

    /// Annotate, split per pool, pivot and summarize an imported table
    pub fn analyse(&self, table: Table) -> Result<Report> {
        let start = Instant::now();
        let flagged = self.load_flagged_genes()?;
        let table = annotate_mutations(table, flagged.as_ref())?;
        info!("mutation analysis took {}ms", start.elapsed().as_millis());

        let start = Instant::now();
        let splits = split_by_pool(&table)?;
        let workers = self.worker_pool()?;
        let pivots: Vec<(String, Table)> = workers.install(|| {
            splits
                .par_iter()
                .map(|(pool, pool_table)| {
                    pivot_pool(pool, pool_table)
                        .map(|pivot| (pool.clone(), pivot))
                        .map_err(|source| AnalysisError::Pivot {
                            pool: pool.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>>>()
        })?;
        info!("pool splitting took {}ms total", start.elapsed().as_millis());

        let start = Instant::now();
        let mut report = Report::new();
        for (pool, pivot) in pivots {
            report.push(pool, pivot);
        }
        let flagged_supplied = flagged.is_some_and(|f| f.n_rows() > 0);
        for (name, sheet) in summarize(&table, flagged_supplied)? {
            report.push(name, sheet);
        }
        info!("summary results took {}ms", start.elapsed().as_millis());

        Ok(report)
    }

    fn load_flagged_genes(&self) -> Result<Option<IndexedTable>> {
        let Some(importer) = &self.flagged else {
            return Ok(None);
        };
        importer
            .load()
            .map_err(|source| AnalysisError::FlaggedGenes {
                path: importer.path().map(Path::to_path_buf).unwrap_or_default(),
                source,
            })
    }
}

/// Run every annotation step in order. Missing cells are filled from the
/// registry first, so files lacking a key column (e.g. no `Gene_ID`) keep
/// their rows through the group-by steps.
pub fn annotate_mutations(
    mut table: Table,
    flagged: Option<&IndexedTable>,
) -> std::result::Result<Table, TableError> {
    table.fill_missing();
    let table = add_flagged_genes(table, flagged)?;
    let table = add_background_mutations(&table)?;
    let table = add_candidate_pos_mutations(&table)?;
    let table = add_candidate_gene_mutations(&table)?;
    add_candidate_gene_hh_ratios(table)
}

/// Left-join flagged-gene membership by `gene_id`; unmatched rows get `false`
/// in every flag column. A missing or empty membership table is a no-op.
pub fn add_flagged_genes(
    table: Table,
    flagged: Option<&IndexedTable>,
) -> std::result::Result<Table, TableError> {
    let Some(flagged) = flagged.filter(|f| f.n_rows() > 0) else {
        return Ok(table);
    };

    let mut joined = table.join_indexed(flagged, JoinHow::Left)?;
    for name in flagged.data.column_names() {
        if let Some(column) = joined.column_mut(name) {
            column.map(|v| if v.is_null() { Value::Bool(false) } else { v.clone() });
        }
    }
    Ok(joined)
}

/// Distinct `count_by` values per `intersect` group, minus one, inner-joined
/// back onto every row of the group as column `hit`
fn add_hit_column(
    table: &Table,
    hit: ColumnKey,
    intersect: &[ColumnKey],
    count_by: ColumnKey,
) -> std::result::Result<Table, TableError> {
    let keys: Vec<&str> = intersect.iter().map(|k| k.as_str()).collect();
    let mut counts = table
        .group_by(&keys)?
        .nunique(count_by.as_str(), hit.as_str())?;
    if let Some(column) = counts.data.column_mut(hit.as_str()) {
        column.map(|v| Value::Int(v.as_i64().unwrap_or(0) - 1));
    }
    table.join_indexed(&counts, JoinHow::Inner)
}

/// Number of other pools sharing each (chromo, pos)
pub fn add_background_mutations(table: &Table) -> std::result::Result<Table, TableError> {
    add_hit_column(
        table,
        ColumnKey::Background,
        &[ColumnKey::Chromo, ColumnKey::Pos],
        ColumnKey::Pool,
    )
}

/// Number of other samples in the same pool sharing each (chromo, pos)
pub fn add_candidate_pos_mutations(table: &Table) -> std::result::Result<Table, TableError> {
    add_hit_column(
        table,
        ColumnKey::CandPos,
        &[ColumnKey::Pool, ColumnKey::Chromo, ColumnKey::Pos],
        ColumnKey::Sample,
    )
}

/// Number of other samples with a variant in the same gene
pub fn add_candidate_gene_mutations(table: &Table) -> std::result::Result<Table, TableError> {
    add_hit_column(
        table,
        ColumnKey::CandGene,
        &[ColumnKey::GeneId],
        ColumnKey::Sample,
    )
}

/// Share of homozygous observations per gene, inner-joined by `gene_id`.
/// Skipped with a warning when `Hom` is not one of the zygosity categories.
pub fn add_candidate_gene_hh_ratios(table: Table) -> std::result::Result<Table, TableError> {
    if table.is_empty() {
        return Ok(table);
    }

    let hh_values: Vec<String> = table
        .require(ColumnKey::Hh.as_str())?
        .categories()
        .iter()
        .map(|c| c.to_string())
        .collect();
    if !hh_values.iter().any(|v| v == HOM) {
        warn!(
            "{} not found in {} values: {:?}",
            HOM,
            ColumnKey::Hh,
            hh_values
        );
        return Ok(table);
    }

    let counts = table
        .group_by(&[ColumnKey::GeneId.as_str()])?
        .pivot_count(ColumnKey::Hh.as_str())?;
    let count_of = |name: &str, row: usize| -> i64 {
        counts
            .data
            .column(name)
            .and_then(|c| c.get(row).as_i64())
            .unwrap_or(0)
    };

    let mut keep = Vec::with_capacity(counts.n_rows());
    let mut ratios = Vec::with_capacity(counts.n_rows());
    for row in 0..counts.n_rows() {
        let total: i64 = hh_values.iter().map(|h| count_of(h, row)).sum();
        keep.push(total > 0);
        if total > 0 {
            ratios.push(Value::Float(count_of(HOM, row) as f64 / total as f64));
        }
    }

    let ratios = IndexedTable {
        index: counts.index.filter(&keep),
        data: Table::new().with_column(Column::new(
            ColumnKey::CandGeneHomRatio.as_str(),
            DType::Float,
            ratios,
        ))?,
    };
    table.join_indexed(&ratios, JoinHow::Inner)
}

/// Per-pool subsets of `table`, in natural pool order
pub fn split_by_pool(table: &Table) -> std::result::Result<Vec<(String, Table)>, TableError> {
    let groups = table.group_by(&[ColumnKey::Pool.as_str()])?;
    let mut splits: Vec<(String, Table)> = groups
        .groups()
        .map(|(key, rows)| (key[0].to_string(), table.take(rows)))
        .collect();
    splits.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(splits)
}

/// Occurrence counts per sample for every distinct variant row of one pool,
/// sorted by chromo, pos and zygosity (Hom before Het)
pub fn pivot_pool(pool: &str, table: &Table) -> std::result::Result<Table, TableError> {
    let start = Instant::now();
    let mut table = table.clone();
    table.fill_missing();

    let index: Vec<&str> = table
        .column_names()
        .into_iter()
        .filter(|n| *n != ColumnKey::Pool.as_str() && *n != ColumnKey::Sample.as_str())
        .collect();
    if let Some(clash) = table
        .require(ColumnKey::Sample.as_str())?
        .values()
        .iter()
        .filter_map(Value::as_str)
        .find(|sample| index.contains(sample))
    {
        return Err(TableError::DuplicateColumn(clash.to_string()));
    }

    let pivot = table
        .group_by(&index)?
        .pivot_count(ColumnKey::Sample.as_str())?
        .flatten_index()
        .sort_by(&[
            (ColumnKey::Chromo.as_str(), true),
            (ColumnKey::Pos.as_str(), true),
            (ColumnKey::Hh.as_str(), false),
        ])?;

    debug!("splitting {} took {}ms", pool, start.elapsed().as_millis());
    Ok(pivot)
}

fn hit_counts(table: &Table, key: ColumnKey) -> std::result::Result<Vec<i64>, TableError> {
    Ok(table
        .require(key.as_str())?
        .values()
        .iter()
        .map(|v| v.as_i64().unwrap_or(0))
        .collect())
}

/// Cross-pool summary sheets: Background, Candidate: Positional,
/// Candidate: Gene and, with flagged-gene data, Flagged Gene
pub fn summarize(
    table: &Table,
    flagged_supplied: bool,
) -> std::result::Result<Vec<(String, Table)>, TableError> {
    let background = hit_counts(table, ColumnKey::Background)?;
    let mut sheets = Vec::new();

    for hit in [ColumnKey::Background, ColumnKey::CandPos, ColumnKey::CandGene] {
        let hits = hit_counts(table, hit)?;
        let mask: Vec<bool> = hits
            .iter()
            .zip(&background)
            .map(|(&h, &b)| h > 0 && (hit == ColumnKey::Background || b == 0))
            .collect();
        let sheet = table.filter(&mask).sort_by(&[
            (hit.as_str(), false),
            (ColumnKey::Chromo.as_str(), true),
            (ColumnKey::Pos.as_str(), true),
            (ColumnKey::Hh.as_str(), false),
        ])?;
        sheets.push((hit.title().to_string(), sheet));
    }

    if flagged_supplied {
        if let Some(flags) = table.column(ColumnKey::FlaggedGene.as_str()) {
            let mask: Vec<bool> = flags
                .values()
                .iter()
                .zip(&background)
                .map(|(f, &b)| f.is_truthy() && b == 0)
                .collect();
            let sheet = table.filter(&mask).sort_by(&[
                (ColumnKey::Chromo.as_str(), true),
                (ColumnKey::Pos.as_str(), true),
                (ColumnKey::Hh.as_str(), false),
            ])?;
            sheets.push((ColumnKey::FlaggedGene.title().to_string(), sheet));
        }
    }

    Ok(sheets)
}
