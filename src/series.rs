// Read-only views handed to chart builders. Rendering itself lives outside
// this crate; builders only see a finished table and the directory.
use crate::config::Pollutant;
use crate::directory::IdentifierDirectory;
use crate::types::HarmonizedTable;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub municipality_id: String,
    pub population: f64,
    pub value: f64,
}

/// Values of `metric` for one year, ordered by increasing population.
///
/// Records without a value are left out, never plotted as zero.
pub fn metric_series(
    table: &HarmonizedTable,
    directory: &IdentifierDirectory,
    year: i32,
    metric: &str,
) -> Vec<SeriesPoint> {
    let Some(idx) = table.metric_index(metric) else {
        return Vec::new();
    };
    let mut points: Vec<SeriesPoint> = table
        .records
        .iter()
        .filter(|r| r.year == year)
        .filter_map(|r| {
            let value = r.values[idx]?;
            Some(SeriesPoint {
                label: directory.label(&r.municipality_id).to_string(),
                municipality_id: r.municipality_id.clone(),
                population: r.population,
                value,
            })
        })
        .collect();
    points.sort_by(|a, b| a.population.total_cmp(&b.population));
    points
}

/// Something that turns harmonized data into a renderable figure.
pub trait ChartBuilder {
    type Figure;

    fn build(
        &self,
        table: &HarmonizedTable,
        directory: &IdentifierDirectory,
        year: i32,
        pollutant: &Pollutant,
    ) -> Self::Figure;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::pollutant;
    use crate::types::{HarmonizedRecord, ReconciledTable, SourceRow};
    use std::collections::BTreeSet;

    const NO2: &str = "Moyenne annuelle de concentration de NO2 (ug/m3)";

    fn directory() -> IdentifierDirectory {
        let reference = ReconciledTable {
            year: 2000,
            has_id_column: true,
            has_name_column: true,
            columns: vec![],
            source_columns: BTreeSet::new(),
            rows: vec![SourceRow {
                municipality_id: Some("75056".into()),
                municipality_name: Some("Paris".into()),
                values: vec![],
            }],
        };
        IdentifierDirectory::build(&reference).unwrap()
    }

    fn table() -> HarmonizedTable {
        let rec = |id: &str, year, population, v: Option<f64>| HarmonizedRecord {
            municipality_id: id.into(),
            municipality_name: id.into(),
            population,
            year,
            values: vec![v],
        };
        HarmonizedTable {
            metrics: vec![NO2.to_string()],
            records: vec![
                rec("75056", 2000, 2_000_000.0, Some(40.0)),
                rec("01001", 2000, 700.0, Some(12.0)),
                rec("13055", 2000, 800_000.0, None),
                rec("75056", 2001, 2_000_000.0, Some(38.0)),
            ],
            ..HarmonizedTable::default()
        }
    }

    #[test]
    fn series_excludes_absent_values_and_sorts_by_population() {
        let s = metric_series(&table(), &directory(), 2000, NO2);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].municipality_id, "01001");
        assert_eq!(s[0].label, "01001");
        assert_eq!(s[1].label, "Paris");
        assert_eq!(s[1].value, 40.0);
    }

    #[test]
    fn unknown_metric_yields_empty_series() {
        assert!(metric_series(&table(), &directory(), 2000, "CO2").is_empty());
    }

    struct PointCount;

    impl ChartBuilder for PointCount {
        type Figure = usize;

        fn build(&self, table: &HarmonizedTable, directory: &IdentifierDirectory, year: i32, pollutant: &Pollutant) -> usize {
            metric_series(table, directory, year, pollutant.column).len()
        }
    }

    #[test]
    fn builders_receive_table_directory_and_selector() {
        let no2 = pollutant("NO2").unwrap();
        assert_eq!(PointCount.build(&table(), &directory(), 2001, no2), 1);
    }
}
