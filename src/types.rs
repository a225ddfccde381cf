use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tabled::Tabled;

/// One data line of a yearly export. `values` is aligned with the owning
/// table's `columns`; `None` marks a missing or non-numeric cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub municipality_id: Option<String>,
    pub municipality_name: Option<String>,
    pub values: Vec<Option<f64>>,
}

/// One yearly snapshot as parsed from its CSV file.
#[derive(Debug, Clone)]
pub struct YearlyRecordSet {
    pub year: i32,
    pub has_id_column: bool,
    pub has_name_column: bool,
    /// Numeric column headers in source order (everything except identifier and name).
    pub columns: Vec<String>,
    pub rows: Vec<SourceRow>,
    /// Non-empty numeric cells that could not be parsed and became missing.
    pub coerced_cells: usize,
}

impl YearlyRecordSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A yearly snapshot padded out to the union schema.
#[derive(Debug, Clone)]
pub struct ReconciledTable {
    pub year: i32,
    pub has_id_column: bool,
    pub has_name_column: bool,
    pub columns: Vec<String>,
    /// Columns that were really present in the source file.
    pub source_columns: BTreeSet<String>,
    pub rows: Vec<SourceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub year: i32,
    pub municipality_id: Option<String>,
    pub municipality_name: Option<String>,
    pub values: Vec<Option<f64>>,
}

/// All reconciled years concatenated, before any cleaning.
#[derive(Debug, Clone, Default)]
pub struct MergedTable {
    pub columns: Vec<String>,
    /// Per year, the columns its source file actually carried.
    pub coverage: BTreeMap<i32, BTreeSet<String>>,
    pub records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedRecord {
    pub municipality_id: String,
    pub municipality_name: String,
    pub population: f64,
    pub year: i32,
    /// Aligned with `HarmonizedTable::metrics`.
    pub values: Vec<Option<f64>>,
}

/// The cleaned, year-indexed dataset handed to chart and dashboard code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarmonizedTable {
    pub metrics: Vec<String>,
    pub coverage: BTreeMap<i32, BTreeSet<String>>,
    pub records: Vec<HarmonizedRecord>,
}

impl HarmonizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metric_index(&self, metric: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m == metric)
    }

    pub fn value(&self, record: &HarmonizedRecord, metric: &str) -> Option<f64> {
        let idx = self.metric_index(metric)?;
        record.values.get(idx).copied().flatten()
    }

    /// Whether the source file for `year` carried `metric` at all.
    pub fn is_covered(&self, year: i32, metric: &str) -> bool {
        self.coverage.get(&year).is_some_and(|cols| cols.contains(metric))
    }

    pub fn year_slice(&self, year: i32) -> Vec<&HarmonizedRecord> {
        self.records.iter().filter(|r| r.year == year).collect()
    }

    pub fn missing_count(&self, metric: &str) -> usize {
        match self.metric_index(metric) {
            Some(idx) => self.records.iter().filter(|r| r.values[idx].is_none()).count(),
            None => 0,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SkippedYearRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Kind")]
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "Reason")]
    #[tabled(rename = "Reason")]
    pub reason: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq, Eq)]
pub struct DuplicateClusterRow {
    #[serde(rename = "MunicipalityId")]
    #[tabled(rename = "MunicipalityId")]
    pub municipality_id: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Rows")]
    #[tabled(rename = "Rows")]
    pub rows: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MetricImputationRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Median")]
    #[tabled(rename = "Median")]
    pub median: String,
    #[serde(rename = "Filled")]
    #[tabled(rename = "Filled")]
    pub filled: usize,
    #[serde(rename = "LeftMissing")]
    #[tabled(rename = "LeftMissing")]
    pub left_missing: usize,
}

/// A full record as shown in the duplicate sample.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SampleRow {
    pub municipality_id: String,
    pub municipality_name: String,
    pub population: f64,
    pub year: i32,
    pub values: BTreeMap<String, Option<f64>>,
}

impl SampleRow {
    pub fn from_record(table: &HarmonizedTable, record: &HarmonizedRecord) -> Self {
        Self {
            municipality_id: record.municipality_id.clone(),
            municipality_name: record.municipality_name.clone(),
            population: record.population,
            year: record.year,
            values: table
                .metrics
                .iter()
                .cloned()
                .zip(record.values.iter().copied())
                .collect(),
        }
    }
}
