use crate::config::{PipelineConfig, ACCEPTED_COLUMN_COUNTS, ID_COLUMN, NAME_COLUMN};
use crate::error::LoadError;
use crate::types::{SourceRow, YearlyRecordSet};
use crate::util::{clean_text, decode_windows_1252, parse_f64_safe, year_from_file_name};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ID_POSITION: usize = 0;
const NAME_POSITION: usize = 1;

/// Yearly export files found in the data directory, keyed by survey year.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    pub dir: PathBuf,
    pub files: BTreeMap<i32, PathBuf>,
}

impl SourceIndex {
    /// Scan `dir` for `*.csv` files whose name carries a four-digit year.
    ///
    /// An unreadable or absent directory yields an empty index; every year
    /// then reports as missing instead of the scan failing outright.
    pub fn discover(dir: &Path) -> Self {
        let mut index = SourceIndex { dir: dir.to_path_buf(), files: BTreeMap::new() };
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot list {}: {}", dir.display(), e);
                return index;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x.eq_ignore_ascii_case("csv"))
            })
            .collect();
        paths.sort();
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Some(year) = year_from_file_name(name) else {
                debug!("ignoring {}: no year in file name", path.display());
                continue;
            };
            if let Some(existing) = index.files.get(&year) {
                warn!("{} also claims {}; keeping {}", path.display(), year, existing.display());
                continue;
            }
            index.files.insert(year, path);
        }
        index
    }

    pub fn path_for(&self, year: i32) -> Option<&Path> {
        self.files.get(&year).map(PathBuf::as_path)
    }
}

/// A requested year that produced no data, with the reason.
#[derive(Debug)]
pub struct SkippedYear {
    pub year: i32,
    pub error: LoadError,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<YearlyRecordSet>,
    pub skipped: Vec<SkippedYear>,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.loaded.iter().map(|t| t.len()).sum()
    }

    pub fn coerced_cells(&self) -> usize {
        self.loaded.iter().map(|t| t.coerced_cells).sum()
    }

    pub fn loaded_years(&self) -> Vec<i32> {
        self.loaded.iter().map(|t| t.year).collect()
    }

    pub fn is_loaded(&self, year: i32) -> bool {
        self.loaded.iter().any(|t| t.year == year)
    }
}

/// Locate and parse the export for `year`.
pub fn load_year(index: &SourceIndex, year: i32) -> Result<YearlyRecordSet, LoadError> {
    let path = index
        .path_for(year)
        .ok_or_else(|| LoadError::MissingSourceFile { year, dir: index.dir.clone() })?;
    load_file(path, year)
}

pub fn load_file(path: &Path, year: i32) -> Result<YearlyRecordSet, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    parse_export(&bytes, year, path)
}

/// Parse the raw bytes of one yearly export.
///
/// The first line is a free-text description and is skipped; the next line
/// is the header. Rows with a different field count than the header make
/// the whole file unusable rather than being guessed at.
pub fn parse_export(bytes: &[u8], year: i32, path: &Path) -> Result<YearlyRecordSet, LoadError> {
    let text = decode_windows_1252(bytes);
    let body = match text.split_once('\n') {
        Some((_description, rest)) => rest,
        None => "",
    };
    if body.trim().is_empty() {
        return Err(LoadError::Empty { path: path.to_path_buf() });
    }

    let csv_err = |source| LoadError::Csv { path: path.to_path_buf(), source };
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if !ACCEPTED_COLUMN_COUNTS.contains(&headers.len()) {
        warn!("{}: {} columns found: {:?}", path.display(), headers.len(), headers);
        return Err(LoadError::ColumnCount { path: path.to_path_buf(), found: headers.len() });
    }

    // Identifier and name are always the first two columns, whatever their header says.
    for (pos, expected) in [(ID_POSITION, ID_COLUMN), (NAME_POSITION, NAME_COLUMN)] {
        if headers[pos] != expected {
            warn!(
                "{}: column {} is '{}', expected '{}'",
                path.display(),
                pos + 1,
                headers[pos],
                expected
            );
        }
    }
    let id_pos = Some(ID_POSITION).filter(|&i| !headers[i].is_empty());
    let name_pos = Some(NAME_POSITION).filter(|&i| !headers[i].is_empty());
    let numeric: Vec<usize> = (NAME_POSITION + 1..headers.len()).collect();

    let mut rows = Vec::new();
    let mut coerced_cells = 0usize;
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let mut values = Vec::with_capacity(numeric.len());
        for &i in &numeric {
            let cell = record.get(i);
            let value = parse_f64_safe(cell);
            if value.is_none() && cell.is_some_and(|c| !c.trim().is_empty()) {
                coerced_cells += 1;
            }
            values.push(value);
        }
        rows.push(SourceRow {
            municipality_id: id_pos.and_then(|i| clean_text(record.get(i))),
            municipality_name: name_pos.and_then(|i| clean_text(record.get(i))),
            values,
        });
    }

    Ok(YearlyRecordSet {
        year,
        has_id_column: id_pos.is_some(),
        has_name_column: name_pos.is_some(),
        columns: numeric.iter().map(|&i| headers[i].clone()).collect(),
        rows,
        coerced_cells,
    })
}

/// Load every configured year in ascending order, absorbing per-year failures.
pub fn load_years(config: &PipelineConfig) -> LoadReport {
    let index = SourceIndex::discover(&config.data_dir);
    let mut years = config.years.clone();
    years.sort_unstable();
    years.dedup();
    let mut report = LoadReport::default();
    for year in years {
        match load_year(&index, year) {
            Ok(set) => {
                info!(
                    "{}: {} rows, {} columns ({} cells coerced to missing)",
                    year,
                    set.len(),
                    set.columns.len() + 2,
                    set.coerced_cells
                );
                report.loaded.push(set);
            }
            Err(error) => {
                warn!("{}: skipped: {}", year, error);
                report.skipped.push(SkippedYear { year, error });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_12: &str = "COM Insee,Commune,Population,\
        Moyenne annuelle de concentration de NO2 (ug/m3),\
        Moyenne annuelle de concentration de NO2 ponderee par la population (ug/m3),\
        Moyenne annuelle de concentration de PM10 (ug/m3),\
        Moyenne annuelle de concentration de PM10 ponderee par la population (ug/m3),\
        Moyenne annuelle de concentration de O3 (ug/m3),\
        Moyenne annuelle de concentration de O3 ponderee par la population (ug/m3),\
        Moyenne annuelle d'AOT 40 (ug/m3.heure),\
        Moyenne annuelle de somo 35 (ug/m3.jour),\
        Moyenne annuelle de somo 35 pondere par la population (ug/m3.jour)";

    fn parse(body: &[u8]) -> Result<YearlyRecordSet, LoadError> {
        parse_export(body, 2000, Path::new("test_2000.csv"))
    }

    #[test]
    fn parses_a_twelve_column_export() {
        let mut bytes = b"Indicateurs de qualit\xE9 de l'air\n".to_vec();
        bytes.extend_from_slice(HEADER_12.as_bytes());
        bytes.extend_from_slice(b"\n01001,L'Abergement-Cl\xE9menciat,767,12.5,12.4,18,18,45,45,9000,3000,3000\n");
        bytes.extend_from_slice(b"75056,Paris,2125246,n.d.,40,,25,40,40,5000,1000,1000\n");

        let set = parse(&bytes).unwrap();
        assert_eq!(set.year, 2000);
        assert_eq!(set.columns.len(), 10);
        assert_eq!(set.columns[0], "Population");
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[0].municipality_id.as_deref(), Some("01001"));
        assert_eq!(set.rows[0].municipality_name.as_deref(), Some("L'Abergement-Clémenciat"));
        assert_eq!(set.rows[0].values[1], Some(12.5));
        assert_eq!(set.rows[1].values[1], None);
        assert_eq!(set.rows[1].values[3], None);
        assert_eq!(set.coerced_cells, 1);
    }

    #[test]
    fn rejects_unexpected_column_count() {
        let bytes = b"desc\nCOM Insee,Commune,Population\n01001,X,1\n";
        match parse(bytes) {
            Err(LoadError::ColumnCount { found, .. }) => assert_eq!(found, 3),
            other => panic!("expected column count error, got {:?}", other),
        }
    }

    #[test]
    fn empty_and_description_only_files_are_empty() {
        assert!(matches!(parse(b""), Err(LoadError::Empty { .. })));
        assert!(matches!(parse(b"only a description line"), Err(LoadError::Empty { .. })));
        assert!(matches!(parse(b"desc\n\n  \n"), Err(LoadError::Empty { .. })));
    }

    #[test]
    fn ragged_rows_make_the_file_malformed() {
        let mut bytes = b"desc\n".to_vec();
        bytes.extend_from_slice(HEADER_12.as_bytes());
        bytes.extend_from_slice(b"\n01001;X;1;2;3;4;5;6;7;8;9;10\n");
        assert!(matches!(parse(&bytes), Err(LoadError::Csv { .. })));
    }

    #[test]
    fn header_only_export_loads_with_no_rows() {
        let mut bytes = b"desc\n".to_vec();
        bytes.extend_from_slice(HEADER_12.as_bytes());
        bytes.push(b'\n');
        let set = parse(&bytes).unwrap();
        assert!(set.is_empty());
        assert!(set.has_id_column && set.has_name_column);
    }

    #[test]
    fn identifier_and_name_are_read_by_position() {
        let mut bytes = b"desc\n".to_vec();
        bytes.extend_from_slice(HEADER_12.replacen("COM Insee", "Code", 1).as_bytes());
        bytes.extend_from_slice(b"\n75056,Paris,2125246,40,40,25,25,40,40,5000,1000,1000\n");

        let set = parse(&bytes).unwrap();
        assert!(set.has_id_column && set.has_name_column);
        assert_eq!(set.columns.len(), 10);
        assert_eq!(set.columns[0], "Population");
        assert!(!set.columns.iter().any(|c| c == "Code"));
        assert_eq!(set.rows[0].municipality_id.as_deref(), Some("75056"));
        assert_eq!(set.rows[0].municipality_name.as_deref(), Some("Paris"));
        assert_eq!(set.rows[0].values[0], Some(2125246.0));
    }

    #[test]
    fn discovery_keeps_first_path_per_year_and_ignores_the_rest() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b_2000.csv", "a_2000.csv", "readme.csv", "x_2001.txt"] {
            fs::write(dir.path().join(name), b"desc\n").unwrap();
        }

        let index = SourceIndex::discover(dir.path());
        let expected: BTreeMap<i32, PathBuf> = [(2000, dir.path().join("a_2000.csv"))].into_iter().collect();
        assert_eq!(index.files, expected);
        assert_eq!(index.path_for(2001), None);
    }

    #[test]
    fn missing_file_is_reported_per_year() {
        let index = SourceIndex { dir: PathBuf::from("nowhere"), files: BTreeMap::new() };
        match load_year(&index, 2001) {
            Err(e @ LoadError::MissingSourceFile { .. }) => assert_eq!(e.kind(), "missing_source_file"),
            other => panic!("expected missing file, got {:?}", other),
        }
    }
}
