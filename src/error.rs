// Error taxonomy for the harmonization run.
//
// `LoadError` is always absorbed per year; `PipelineError` aborts the run.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single yearly export could not be used.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no source file for year {year} in {}", .dir.display())]
    MissingSourceFile { year: i32, dir: PathBuf },
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is empty", .path.display())]
    Empty { path: PathBuf },
    #[error("{} has {found} columns, expected 12 or 14", .path.display())]
    ColumnCount { path: PathBuf, found: usize },
    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl LoadError {
    /// Short machine-friendly label used in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSourceFile { .. } => "missing_source_file",
            Self::Io { .. } | Self::Empty { .. } | Self::ColumnCount { .. } | Self::Csv { .. } => {
                "malformed_source"
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("reference table for {year} has no '{column}' column")]
    MissingColumn { year: i32, column: &'static str },
}

/// Conditions that make a run impossible; no table is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("none of the {attempted} requested years could be loaded")]
    ZeroYearsLoaded { attempted: usize },
    #[error("loaded years contain no records")]
    NoRecords,
    #[error("reference year {year} could not be loaded")]
    ReferenceTableUnavailable { year: i32 },
    #[error("no reference year configured")]
    NoReferenceYear,
    #[error("table for {year} does not match the reconciled schema")]
    SchemaMismatch { year: i32 },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("{groups} duplicated (municipality, year) keys covering {rows} rows")]
    DuplicateKeys { groups: usize, rows: usize },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
