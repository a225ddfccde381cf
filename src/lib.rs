// Harmonization of yearly municipal air-quality survey exports into one
// clean, year-indexed table plus a municipality name ↔ identifier directory.

pub mod config;
pub mod directory;
pub mod duplicates;
pub mod error;
pub mod impute;
pub mod loader;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod series;
pub mod types;
pub mod util;

pub use config::{DuplicatePolicy, ImputationStrategy, PipelineConfig};
pub use directory::IdentifierDirectory;
pub use error::{LoadError, PipelineError};
pub use pipeline::{run, HarmonizationRun, RunSummary};
pub use types::{HarmonizedRecord, HarmonizedTable};
