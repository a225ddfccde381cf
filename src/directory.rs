// Bidirectional municipality name ↔ identifier lookup.
//
// Built once per run from the reference year's table and then only read.
// Chart code receives it by reference to turn identifiers into labels.
use crate::config::{ID_COLUMN, NAME_COLUMN};
use crate::error::DirectoryError;
use crate::types::{HarmonizedTable, ReconciledTable};
use crate::util::canonical_id;
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct IdentifierDirectory {
    reference_year: i32,
    name_to_id: BTreeMap<String, String>,
    id_to_name: BTreeMap<String, String>,
    /// Names seen with more than one identifier.
    shared_names: BTreeSet<String>,
    /// Identifiers seen with more than one name.
    shared_ids: BTreeSet<String>,
    skipped_rows: usize,
}

/// Cardinality view of the directory for the run summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DirectoryStats {
    pub reference_year: i32,
    pub names: usize,
    pub ids: usize,
    pub cardinality_mismatch: bool,
    pub shared_names: Vec<String>,
    pub shared_ids: Vec<String>,
    pub skipped_rows: usize,
}

impl IdentifierDirectory {
    /// Build from the reference table. Rows lacking a name or an identifier
    /// are skipped; a table lacking either column altogether is unusable.
    pub fn build(reference: &ReconciledTable) -> Result<Self, DirectoryError> {
        if !reference.has_id_column {
            return Err(DirectoryError::MissingColumn { year: reference.year, column: ID_COLUMN });
        }
        if !reference.has_name_column {
            return Err(DirectoryError::MissingColumn { year: reference.year, column: NAME_COLUMN });
        }

        let mut dir = IdentifierDirectory { reference_year: reference.year, ..Self::default() };
        let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();
        for row in &reference.rows {
            let (Some(name), Some(id)) =
                (row.municipality_name.clone(), canonical_id(row.municipality_id.as_deref()))
            else {
                dir.skipped_rows += 1;
                continue;
            };
            if !pairs.insert((name.clone(), id.clone())) {
                continue;
            }
            if let Some(prev) = dir.name_to_id.insert(name.clone(), id.clone()) {
                if prev != id {
                    dir.shared_names.insert(name.clone());
                }
            }
            if let Some(prev) = dir.id_to_name.insert(id.clone(), name.clone()) {
                if prev != name {
                    dir.shared_ids.insert(id);
                }
            }
        }

        info!(
            "directory from {}: {} names, {} identifiers",
            dir.reference_year,
            dir.name_to_id.len(),
            dir.id_to_name.len()
        );
        if dir.has_cardinality_mismatch() {
            warn!(
                "directory cardinality mismatch: {} names vs {} identifiers",
                dir.name_to_id.len(),
                dir.id_to_name.len()
            );
        }
        Ok(dir)
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(name).map(String::as_str)
    }

    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.id_to_name.get(id).map(String::as_str)
    }

    /// Human-readable label for an identifier, falling back to the identifier.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.name_for(id).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    pub fn has_cardinality_mismatch(&self) -> bool {
        self.name_to_id.len() != self.id_to_name.len()
    }

    /// Whether `name` takes part in a shared-name or shared-identifier anomaly.
    pub fn is_flagged(&self, name: &str) -> bool {
        self.shared_names.contains(name)
            || self.id_for(name).is_some_and(|id| self.shared_ids.contains(id))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name_to_id.keys().map(String::as_str)
    }

    /// Per year, how many distinct municipality names the directory does not know.
    pub fn unmatched_names(&self, table: &HarmonizedTable) -> BTreeMap<i32, usize> {
        let mut unmatched: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
        for r in &table.records {
            if !self.name_to_id.contains_key(&r.municipality_name) {
                unmatched.entry(r.year).or_default().insert(&r.municipality_name);
            }
        }
        unmatched.into_iter().map(|(year, names)| (year, names.len())).collect()
    }

    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            reference_year: self.reference_year,
            names: self.name_to_id.len(),
            ids: self.id_to_name.len(),
            cardinality_mismatch: self.has_cardinality_mismatch(),
            shared_names: self.shared_names.iter().cloned().collect(),
            shared_ids: self.shared_ids.iter().cloned().collect(),
            skipped_rows: self.skipped_rows,
        }
    }
}
