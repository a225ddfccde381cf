// Gap filling and key normalization.
//
// `normalize` turns the loosely typed merged table into `HarmonizedTable`
// (canonical identifiers, defaulted names and population); `impute` then
// fills missing pollutant cells in place according to the chosen strategy.
use crate::config::{ImputationStrategy, POPULATION_COLUMN, UNKNOWN};
use crate::types::{HarmonizedRecord, HarmonizedTable, MergedTable, MetricImputationRow};
use crate::util::{canonical_id, format_number, median};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct NormalizationReport {
    pub unknown_ids: usize,
    pub unknown_names: usize,
    pub population_defaulted: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricImputation {
    pub metric: String,
    /// Pooled median used for filling; only set for the whole-corpus strategy.
    pub median: Option<f64>,
    pub filled: usize,
    /// Missing cells in covered years that had no median to fill with.
    pub left_missing: usize,
    /// Missing cells in years whose source never carried the metric.
    pub not_measured: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImputationReport {
    pub strategy: ImputationStrategy,
    pub metrics: Vec<MetricImputation>,
}

impl ImputationReport {
    pub fn total_filled(&self) -> usize {
        self.metrics.iter().map(|m| m.filled).sum()
    }

    pub fn rows(&self) -> Vec<MetricImputationRow> {
        self.metrics
            .iter()
            .map(|m| MetricImputationRow {
                metric: m.metric.clone(),
                median: m.median.map_or_else(|| "-".to_string(), |v| format_number(v, 2)),
                filled: m.filled,
                left_missing: m.left_missing,
            })
            .collect()
    }
}

/// Canonicalize keys and split population out of the metric columns.
/// Never removes a row.
pub fn normalize(merged: MergedTable) -> (HarmonizedTable, NormalizationReport) {
    let pop_idx = merged.column_index(POPULATION_COLUMN);
    let mut report = NormalizationReport::default();
    let metrics: Vec<String> = merged
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != pop_idx)
        .map(|(_, c)| c.clone())
        .collect();

    let records = merged
        .records
        .into_iter()
        .map(|r| {
            let municipality_id = canonical_id(r.municipality_id.as_deref()).unwrap_or_else(|| {
                report.unknown_ids += 1;
                UNKNOWN.to_string()
            });
            let municipality_name = r
                .municipality_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| {
                    report.unknown_names += 1;
                    UNKNOWN.to_string()
                });
            let population = match pop_idx.and_then(|i| r.values[i]) {
                Some(p) if p >= 0.0 => p,
                _ => {
                    report.population_defaulted += 1;
                    0.0
                }
            };
            let values = r
                .values
                .into_iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != pop_idx)
                .map(|(_, v)| v)
                .collect();
            HarmonizedRecord { municipality_id, municipality_name, population, year: r.year, values }
        })
        .collect();

    if report.unknown_ids > 0 {
        warn!("{} rows without identifier set to '{}'", report.unknown_ids, UNKNOWN);
    }
    (HarmonizedTable { metrics, coverage: merged.coverage, records }, report)
}

/// Fill missing cells of the designated metric columns with a median.
///
/// A cell is only filled when its year's source file carried the metric;
/// columns created by schema padding stay missing. A metric with no observed
/// value at all has no median and is left untouched.
pub fn impute(
    table: &mut HarmonizedTable,
    strategy: ImputationStrategy,
    designated: &[String],
) -> ImputationReport {
    let HarmonizedTable { metrics, coverage, records } = table;
    let mut report = ImputationReport { strategy, metrics: Vec::new() };

    for (idx, metric) in metrics.iter().enumerate() {
        if !designated.iter().any(|d| d == metric) {
            continue;
        }
        let covered = |year: i32| coverage.get(&year).is_some_and(|c| c.contains(metric));

        let pooled = median(records.iter().filter_map(|r| r.values[idx]));
        let per_year: BTreeMap<i32, Option<f64>> = match strategy {
            ImputationStrategy::PerYearMedian => coverage
                .keys()
                .map(|&y| {
                    let m = median(records.iter().filter(|r| r.year == y).filter_map(|r| r.values[idx]));
                    (y, m)
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        let mut entry = MetricImputation {
            metric: metric.clone(),
            median: match strategy {
                ImputationStrategy::WholeCorpusMedian => pooled,
                _ => None,
            },
            filled: 0,
            left_missing: 0,
            not_measured: 0,
        };
        for r in records.iter_mut().filter(|r| r.values[idx].is_none()) {
            if !covered(r.year) {
                entry.not_measured += 1;
                continue;
            }
            let fill = match strategy {
                ImputationStrategy::WholeCorpusMedian => pooled,
                ImputationStrategy::PerYearMedian => per_year.get(&r.year).copied().flatten(),
                ImputationStrategy::None => None,
            };
            match fill {
                Some(v) => {
                    r.values[idx] = Some(v);
                    entry.filled += 1;
                }
                None => entry.left_missing += 1,
            }
        }
        if pooled.is_none() {
            warn!("{}: no observed values, median undefined", metric);
        }
        report.metrics.push(entry);
    }
    info!(
        "imputation ({:?}) filled {} cells over {} metrics",
        strategy,
        report.total_filled(),
        report.metrics.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MergedRecord;
    use std::collections::BTreeSet;

    const NO2: &str = "NO2";
    const PM25: &str = "PM25";

    fn designated() -> Vec<String> {
        vec![NO2.to_string(), PM25.to_string()]
    }

    fn rec(year: i32, id: Option<&str>, values: Vec<Option<f64>>) -> MergedRecord {
        MergedRecord {
            year,
            municipality_id: id.map(str::to_string),
            municipality_name: Some("X".to_string()),
            values,
        }
    }

    /// Columns: Population, NO2, PM25. 2008 never carried PM25.
    fn merged() -> MergedTable {
        let mut coverage = BTreeMap::new();
        coverage.insert(2008, ["Population", NO2].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());
        coverage.insert(2009, ["Population", NO2, PM25].iter().map(|s| s.to_string()).collect());
        MergedTable {
            columns: vec!["Population".into(), NO2.into(), PM25.into()],
            coverage,
            records: vec![
                rec(2008, Some("1001"), vec![Some(100.0), Some(10.0), None]),
                rec(2008, None, vec![None, None, None]),
                rec(2009, Some("75056"), vec![Some(-5.0), Some(30.0), Some(8.0)]),
                rec(2009, Some("75056.0"), vec![Some(50.0), Some(40.0), None]),
                rec(2009, Some("13055"), vec![Some(60.0), None, Some(12.0)]),
            ],
        }
    }

    #[test]
    fn normalization_canonicalizes_keys_and_defaults() {
        let (table, report) = normalize(merged());
        assert_eq!(table.metrics, vec![NO2.to_string(), PM25.to_string()]);
        assert_eq!(table.records[0].municipality_id, "01001");
        assert_eq!(table.records[1].municipality_id, "Unknown");
        assert_eq!(table.records[3].municipality_id, "75056");
        assert_eq!(table.records[1].population, 0.0);
        assert_eq!(table.records[2].population, 0.0);
        assert_eq!(table.records[4].population, 60.0);
        assert_eq!(table.len(), 5);
        assert_eq!(
            report,
            NormalizationReport { unknown_ids: 1, unknown_names: 0, population_defaulted: 2 }
        );
    }

    #[test]
    fn blank_names_become_unknown() {
        let mut m = merged();
        m.records[2].municipality_name = None;
        m.records[4].municipality_name = Some("  ".to_string());
        let (table, report) = normalize(m);
        assert_eq!(table.records[2].municipality_name, UNKNOWN);
        assert_eq!(table.records[4].municipality_name, UNKNOWN);
        assert_eq!(table.records[0].municipality_name, "X");
        assert_eq!(report.unknown_names, 2);
    }

    #[test]
    fn whole_corpus_median_fills_covered_cells_only() {
        let (mut table, _) = normalize(merged());
        let report = impute(&mut table, ImputationStrategy::WholeCorpusMedian, &designated());

        // NO2 observed: 10, 30, 40 -> median 30
        assert_eq!(table.value(&table.records[1], NO2), Some(30.0));
        assert_eq!(table.value(&table.records[4], NO2), Some(30.0));
        // PM25 observed: 8, 12 -> median 10, only 2009 rows get it
        assert_eq!(table.value(&table.records[3], PM25), Some(10.0));
        assert_eq!(table.value(&table.records[0], PM25), None);
        assert_eq!(table.value(&table.records[1], PM25), None);

        let pm25 = report.metrics.iter().find(|m| m.metric == PM25).unwrap();
        assert_eq!(pm25.median, Some(10.0));
        assert_eq!(pm25.filled, 1);
        assert_eq!(pm25.not_measured, 2);
        assert_eq!(report.total_filled(), 3);
    }

    #[test]
    fn per_year_median_uses_the_rows_own_year() {
        let (mut table, _) = normalize(merged());
        impute(&mut table, ImputationStrategy::PerYearMedian, &designated());
        // 2008 NO2 observed: 10 only
        assert_eq!(table.value(&table.records[1], NO2), Some(10.0));
        // 2009 NO2 observed: 30, 40 -> 35
        assert_eq!(table.value(&table.records[4], NO2), Some(35.0));
    }

    #[test]
    fn no_imputation_leaves_gaps_but_counts_them() {
        let (mut table, _) = normalize(merged());
        let before = table.clone();
        let report = impute(&mut table, ImputationStrategy::None, &designated());
        assert_eq!(table, before);
        let no2 = report.metrics.iter().find(|m| m.metric == NO2).unwrap();
        assert_eq!(no2.left_missing, 2);
        assert_eq!(no2.filled, 0);
    }

    #[test]
    fn imputation_is_idempotent() {
        let (mut table, _) = normalize(merged());
        impute(&mut table, ImputationStrategy::WholeCorpusMedian, &designated());
        let once = table.clone();
        let second = impute(&mut table, ImputationStrategy::WholeCorpusMedian, &designated());
        assert_eq!(table, once);
        assert_eq!(second.total_filled(), 0);
        let no2 = second.metrics.iter().find(|m| m.metric == NO2).unwrap();
        assert_eq!(no2.median, Some(30.0));
    }

    #[test]
    fn entirely_missing_metric_stays_missing() {
        let mut m = merged();
        for r in &mut m.records {
            r.values[2] = None;
        }
        let (mut table, _) = normalize(m);
        let report = impute(&mut table, ImputationStrategy::WholeCorpusMedian, &designated());
        let pm25 = report.metrics.iter().find(|m| m.metric == PM25).unwrap();
        assert_eq!(pm25.median, None);
        assert_eq!(pm25.left_missing, 3);
        assert_eq!(table.missing_count(PM25), 5);
    }

    #[test]
    fn undesignated_columns_are_not_touched() {
        let (mut table, _) = normalize(merged());
        let report = impute(&mut table, ImputationStrategy::WholeCorpusMedian, &[PM25.to_string()]);
        assert_eq!(report.metrics.len(), 1);
        assert_eq!(table.value(&table.records[1], NO2), None);
    }
}
