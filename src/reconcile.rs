// Schema reconciliation: pad every yearly table out to the union of all
// column sets so the tables can be stacked.
use crate::types::{ReconciledTable, SourceRow, YearlyRecordSet};
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};

/// Union of all numeric columns, in first-seen order across the inputs.
pub fn union_columns(tables: &[YearlyRecordSet]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut union = Vec::new();
    for t in tables {
        for c in &t.columns {
            if seen.insert(c.as_str()) {
                union.push(c.clone());
            }
        }
    }
    union
}

/// Consume the yearly tables and return them column-homogeneous.
///
/// A column absent from a year becomes an all-missing column for that year,
/// never a zero column and never dropped.
pub fn reconcile(tables: Vec<YearlyRecordSet>) -> Vec<ReconciledTable> {
    let schema = union_columns(&tables);
    info!("reconciled schema has {} numeric columns", schema.len());

    tables
        .into_iter()
        .map(|t| {
            // position of each schema column in this table, if any
            let mapping: Vec<Option<usize>> = schema
                .iter()
                .map(|c| t.columns.iter().position(|own| own == c))
                .collect();
            let padded = mapping.iter().filter(|m| m.is_none()).count();
            if padded > 0 {
                debug!("{}: padding {} absent columns", t.year, padded);
            }
            let rows = t
                .rows
                .into_iter()
                .map(|row| SourceRow {
                    values: mapping
                        .iter()
                        .map(|m| m.and_then(|i| row.values.get(i).copied().flatten()))
                        .collect(),
                    municipality_id: row.municipality_id,
                    municipality_name: row.municipality_name,
                })
                .collect();
            ReconciledTable {
                year: t.year,
                has_id_column: t.has_id_column,
                has_name_column: t.has_name_column,
                columns: schema.clone(),
                source_columns: t.columns.into_iter().collect::<BTreeSet<_>>(),
                rows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(year: i32, columns: &[&str], rows: Vec<Vec<Option<f64>>>) -> YearlyRecordSet {
        YearlyRecordSet {
            year,
            has_id_column: true,
            has_name_column: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, values)| SourceRow {
                    municipality_id: Some(format!("0100{}", i)),
                    municipality_name: Some(format!("Commune {}", i)),
                    values,
                })
                .collect(),
            coerced_cells: 0,
        }
    }

    #[test]
    fn every_table_gets_the_union_schema() {
        let a = table(2008, &["Population", "NO2"], vec![vec![Some(10.0), Some(20.0)]]);
        let b = table(2009, &["NO2", "PM25", "Population"], vec![vec![Some(1.0), Some(2.0), Some(3.0)]]);
        let c = table(2010, &["O3"], vec![vec![Some(7.0)], vec![None]]);

        let out = reconcile(vec![a, b, c]);
        let expected: BTreeSet<&str> = ["Population", "NO2", "PM25", "O3"].into_iter().collect();
        for t in &out {
            assert_eq!(t.columns, out[0].columns);
            let got: BTreeSet<&str> = t.columns.iter().map(String::as_str).collect();
            assert_eq!(got, expected);
            assert!(t.rows.iter().all(|r| r.values.len() == t.columns.len()));
        }
    }

    #[test]
    fn absent_columns_are_all_missing_and_values_follow_their_header() {
        let a = table(2008, &["Population", "NO2"], vec![vec![Some(10.0), Some(20.0)]]);
        let b = table(2009, &["NO2", "PM25", "Population"], vec![vec![Some(1.0), Some(2.0), Some(3.0)]]);
        let out = reconcile(vec![a, b]);

        let col = |name: &str| out[0].columns.iter().position(|c| c == name).unwrap();
        assert_eq!(out[0].rows[0].values[col("PM25")], None);
        assert_eq!(out[0].rows[0].values[col("NO2")], Some(20.0));
        assert_eq!(out[1].rows[0].values[col("Population")], Some(3.0));
        assert_eq!(out[1].rows[0].values[col("PM25")], Some(2.0));
        assert!(!out[0].source_columns.contains("PM25"));
        assert!(out[1].source_columns.contains("PM25"));
    }

    #[test]
    fn union_keeps_first_seen_order() {
        let a = table(2000, &["B", "A"], vec![]);
        let b = table(2001, &["C", "A"], vec![]);
        assert_eq!(union_columns(&[a, b]), vec!["B", "A", "C"]);
    }
}
