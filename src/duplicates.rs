// Detection (and opt-in removal) of rows sharing a `(municipality, year)` key.
use crate::config::DuplicatePolicy;
use crate::types::{DuplicateClusterRow, HarmonizedTable, SampleRow};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;

/// Clusters listed individually in the report.
pub const MAX_LISTED_CLUSTERS: usize = 10;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DuplicateReport {
    /// Keys held by more than one row.
    pub groups: usize,
    /// Rows belonging to those keys.
    pub rows: usize,
    pub clusters: Vec<DuplicateClusterRow>,
    /// Every row of the first duplicated key, for inspection.
    pub sample: Vec<SampleRow>,
    pub policy: Option<DuplicatePolicy>,
    pub removed: usize,
}

impl DuplicateReport {
    pub fn is_clean(&self) -> bool {
        self.groups == 0
    }

    /// Rows beyond the first of each group.
    pub fn surplus_rows(&self) -> usize {
        self.rows - self.groups
    }
}

/// Row positions per key, keys ordered by first occurrence.
fn group_positions(table: &HarmonizedTable) -> Vec<((&str, i32), Vec<usize>)> {
    let mut slot: HashMap<(&str, i32), usize> = HashMap::new();
    let mut groups: Vec<((&str, i32), Vec<usize>)> = Vec::new();
    for (pos, r) in table.records.iter().enumerate() {
        let key = (r.municipality_id.as_str(), r.year);
        match slot.get(&key) {
            Some(&g) => groups[g].1.push(pos),
            None => {
                slot.insert(key, groups.len());
                groups.push((key, vec![pos]));
            }
        }
    }
    groups
}

/// Count duplicated keys without touching the table.
pub fn detect(table: &HarmonizedTable) -> DuplicateReport {
    let mut report = DuplicateReport::default();
    for ((id, year), positions) in group_positions(table) {
        if positions.len() < 2 {
            continue;
        }
        if report.groups == 0 {
            report.sample = positions
                .iter()
                .map(|&p| SampleRow::from_record(table, &table.records[p]))
                .collect();
        }
        report.groups += 1;
        report.rows += positions.len();
        if report.clusters.len() < MAX_LISTED_CLUSTERS {
            report.clusters.push(DuplicateClusterRow {
                municipality_id: id.to_string(),
                year,
                rows: positions.len(),
            });
        }
    }
    if report.is_clean() {
        info!("no duplicated (municipality, year) keys");
    } else {
        warn!(
            "{} duplicated (municipality, year) keys covering {} rows",
            report.groups, report.rows
        );
    }
    report
}

/// Keep the first row of every key, dropping the rest. Returns rows removed.
pub fn drop_keep_first(table: &mut HarmonizedTable) -> usize {
    let before = table.records.len();
    let mut keep = vec![true; before];
    for (_, positions) in group_positions(table) {
        for &p in positions.iter().skip(1) {
            keep[p] = false;
        }
    }
    let mut flags = keep.into_iter();
    table.records.retain(|_| flags.next().unwrap_or(true));
    before - table.records.len()
}

/// Apply the configured policy. Detection always runs first, so the report
/// describes the table as it was before any removal.
pub fn resolve(table: &mut HarmonizedTable, policy: DuplicatePolicy) -> DuplicateReport {
    let mut report = detect(table);
    report.policy = Some(policy);
    if policy == DuplicatePolicy::DropKeepFirst && !report.is_clean() {
        report.removed = drop_keep_first(table);
        info!("removed {} duplicated rows (kept first of each key)", report.removed);
    }
    report
}
