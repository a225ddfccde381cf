// Run configuration and the fixed vocabulary of the yearly survey exports.
//
// Column headers are the exact strings found in the source CSV files, so the
// rest of the crate never hardcodes them.
use clap::ValueEnum;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const ID_COLUMN: &str = "COM Insee";
pub const NAME_COLUMN: &str = "Commune";
pub const POPULATION_COLUMN: &str = "Population";
pub const YEAR_COLUMN: &str = "Année";

/// Sentinel used for a missing municipality identifier or name.
pub const UNKNOWN: &str = "Unknown";

pub const FIRST_YEAR: i32 = 2000;
pub const LAST_YEAR: i32 = 2015;
/// No survey was published for this year.
pub const MISSING_SURVEY_YEAR: i32 = 2006;

/// Column counts a well-formed export may have (14 once PM25 is published).
pub const ACCEPTED_COLUMN_COUNTS: [usize; 2] = [12, 14];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pollutant {
    pub code: &'static str,
    pub column: &'static str,
    /// First survey year carrying this metric, if it was not there from the start.
    pub introduced: Option<i32>,
    /// Population-weighted variants are imputed but never offered as a chart selector.
    pub weighted: bool,
}

impl Pollutant {
    pub fn available_in(&self, year: i32) -> bool {
        self.introduced.map_or(true, |first| year >= first)
    }
}

pub static POLLUTANTS: Lazy<Vec<Pollutant>> = Lazy::new(|| {
    vec![
        Pollutant { code: "NO2", column: "Moyenne annuelle de concentration de NO2 (ug/m3)", introduced: None, weighted: false },
        Pollutant { code: "NO2 pondere", column: "Moyenne annuelle de concentration de NO2 ponderee par la population (ug/m3)", introduced: None, weighted: true },
        Pollutant { code: "PM10", column: "Moyenne annuelle de concentration de PM10 (ug/m3)", introduced: None, weighted: false },
        Pollutant { code: "PM10 pondere", column: "Moyenne annuelle de concentration de PM10 ponderee par la population (ug/m3)", introduced: None, weighted: true },
        Pollutant { code: "O3", column: "Moyenne annuelle de concentration de O3 (ug/m3)", introduced: None, weighted: false },
        Pollutant { code: "O3 pondere", column: "Moyenne annuelle de concentration de O3 ponderee par la population (ug/m3)", introduced: None, weighted: true },
        Pollutant { code: "Somo 35", column: "Moyenne annuelle de somo 35 (ug/m3.jour)", introduced: None, weighted: false },
        Pollutant { code: "Somo 35 pondere", column: "Moyenne annuelle de somo 35 pondere par la population (ug/m3.jour)", introduced: None, weighted: true },
        Pollutant { code: "AOT 40", column: "Moyenne annuelle d'AOT 40 (ug/m3.heure)", introduced: None, weighted: false },
        Pollutant { code: "PM25", column: "Moyenne annuelle de concentration de PM25 (ug/m3)", introduced: Some(2009), weighted: false },
        Pollutant { code: "PM25 pondere", column: "Moyenne annuelle de concentration de PM25 ponderee par la population (ug/m3)", introduced: Some(2009), weighted: true },
    ]
});

static BY_CODE: Lazy<HashMap<&'static str, &'static Pollutant>> =
    Lazy::new(|| POLLUTANTS.iter().map(|p| (p.code, p)).collect());

pub fn pollutant(code: &str) -> Option<&'static Pollutant> {
    BY_CODE.get(code).copied()
}

/// Pollutants a chart may be asked for in `year`.
pub fn pollutants_for_year(year: i32) -> Vec<&'static Pollutant> {
    POLLUTANTS
        .iter()
        .filter(|p| !p.weighted && p.available_in(year))
        .collect()
}

pub fn default_years() -> Vec<i32> {
    (FIRST_YEAR..=LAST_YEAR)
        .filter(|y| *y != MISSING_SURVEY_YEAR)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImputationStrategy {
    /// Median over every observed value of the column, all years pooled.
    #[default]
    WholeCorpusMedian,
    /// Median over the observed values of the same year only.
    PerYearMedian,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    #[default]
    Report,
    DropKeepFirst,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub years: Vec<i32>,
    /// Year the identifier directory is built from; the earliest requested year when unset.
    pub reference_year: Option<i32>,
    pub imputation: ImputationStrategy,
    pub on_duplicate: DuplicatePolicy,
    /// Abort the run when any `(municipality, year)` key is duplicated.
    pub strict_duplicates: bool,
    /// Metric columns eligible for median imputation.
    pub pollutant_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/raw"),
            years: default_years(),
            reference_year: None,
            imputation: ImputationStrategy::default(),
            on_duplicate: DuplicatePolicy::default(),
            strict_duplicates: false,
            pollutant_columns: POLLUTANTS.iter().map(|p| p.column.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    pub fn effective_reference_year(&self) -> Option<i32> {
        self.reference_year.or_else(|| self.years.iter().copied().min())
    }
}
