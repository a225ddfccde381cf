// End-to-end harmonization run.
//
// Loader → Reconciler → Merger → Gap filling → Duplicate resolver →
// Identifier directory. The table is owned here until every stage has run;
// callers only ever see the finished artifact or a fatal error.
use crate::config::PipelineConfig;
use crate::directory::{DirectoryStats, IdentifierDirectory};
use crate::duplicates::{resolve, DuplicateReport};
use crate::error::{PipelineError, Result};
use crate::impute::{impute, normalize, ImputationReport, NormalizationReport};
use crate::loader::load_years;
use crate::merge::merge;
use crate::reconcile::reconcile;
use crate::types::{HarmonizedTable, SkippedYearRow};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything the run has to say besides the table itself.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Local>,
    pub data_dir: String,
    pub requested_years: Vec<i32>,
    pub loaded_years: Vec<i32>,
    pub skipped_years: Vec<SkippedYearRow>,
    pub rows_loaded: usize,
    pub rows_out: usize,
    pub metric_columns: usize,
    pub coerced_cells: usize,
    pub normalization: NormalizationReport,
    pub imputation: ImputationReport,
    pub duplicates: DuplicateReport,
    pub directory: DirectoryStats,
    /// Distinct municipality names per year that are not in the directory.
    pub unmatched_names: BTreeMap<i32, usize>,
}

#[derive(Debug, Clone)]
pub struct HarmonizationRun {
    pub table: HarmonizedTable,
    pub directory: IdentifierDirectory,
    pub summary: RunSummary,
}

pub fn run(config: &PipelineConfig) -> Result<HarmonizationRun> {
    let mut requested_years = config.years.clone();
    requested_years.sort_unstable();
    requested_years.dedup();

    let load = load_years(config);
    if load.loaded.is_empty() {
        return Err(PipelineError::ZeroYearsLoaded { attempted: requested_years.len() });
    }
    let reference_year = config.effective_reference_year().ok_or(PipelineError::NoReferenceYear)?;
    if !load.is_loaded(reference_year) {
        return Err(PipelineError::ReferenceTableUnavailable { year: reference_year });
    }
    let rows_loaded = load.total_rows();
    if rows_loaded == 0 {
        return Err(PipelineError::NoRecords);
    }

    let loaded_years = load.loaded_years();
    let coerced_cells = load.coerced_cells();
    let skipped_years: Vec<SkippedYearRow> = load
        .skipped
        .iter()
        .map(|s| SkippedYearRow { year: s.year, kind: s.error.kind().to_string(), reason: s.error.to_string() })
        .collect();
    if !skipped_years.is_empty() {
        warn!("{} requested years skipped", skipped_years.len());
    }

    let reconciled = reconcile(load.loaded);
    let reference = reconciled
        .iter()
        .find(|t| t.year == reference_year)
        .ok_or(PipelineError::ReferenceTableUnavailable { year: reference_year })?;
    let directory = IdentifierDirectory::build(reference)?;

    let merged = merge(reconciled)?;
    let (mut table, normalization) = normalize(merged);
    let imputation = impute(&mut table, config.imputation, &config.pollutant_columns);

    let duplicates = resolve(&mut table, config.on_duplicate);
    if config.strict_duplicates && !duplicates.is_clean() {
        return Err(PipelineError::DuplicateKeys { groups: duplicates.groups, rows: duplicates.rows });
    }

    let unmatched_names = directory.unmatched_names(&table);
    for (year, n) in &unmatched_names {
        warn!("{}: {} municipalities not found in the {} directory", year, n, reference_year);
    }

    let summary = RunSummary {
        generated_at: Local::now(),
        data_dir: config.data_dir.display().to_string(),
        requested_years,
        loaded_years,
        skipped_years,
        rows_loaded,
        rows_out: table.len(),
        metric_columns: table.metrics.len(),
        coerced_cells,
        normalization,
        imputation,
        duplicates,
        directory: directory.stats(),
        unmatched_names,
    };
    info!(
        "harmonized {} rows over {} years ({} skipped)",
        summary.rows_out,
        summary.loaded_years.len(),
        summary.skipped_years.len()
    );
    Ok(HarmonizationRun { table, directory, summary })
}
