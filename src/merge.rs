// Temporal merge: stack reconciled years into one long table, tagging each
// row with the year it came from. Purely structural; nothing is dropped.
use crate::error::{PipelineError, Result};
use crate::types::{MergedRecord, MergedTable, ReconciledTable};
use log::info;

pub fn merge(tables: Vec<ReconciledTable>) -> Result<MergedTable> {
    let mut merged = MergedTable {
        columns: tables.first().map(|t| t.columns.clone()).unwrap_or_default(),
        ..MergedTable::default()
    };
    for t in tables {
        // the reconciler exists to make this impossible
        if t.columns != merged.columns || t.rows.iter().any(|r| r.values.len() != merged.columns.len()) {
            return Err(PipelineError::SchemaMismatch { year: t.year });
        }
        merged.coverage.insert(t.year, t.source_columns);
        let year = t.year;
        merged.records.extend(t.rows.into_iter().map(|row| MergedRecord {
            year,
            municipality_id: row.municipality_id,
            municipality_name: row.municipality_name,
            values: row.values,
        }));
    }
    info!(
        "merged {} rows across {} years",
        merged.len(),
        merged.coverage.len()
    );
    Ok(merged)
}
