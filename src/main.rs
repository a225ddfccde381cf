// Entry point and high-level CLI flow.
//
// One invocation performs one harmonization run:
// - load, reconcile, merge, gap-fill and de-duplicate the yearly exports,
// - write the harmonized table, the duplicate clusters and a JSON summary,
// - print short Markdown previews of what happened.
use air_harmonize::config::{default_years, DuplicatePolicy, ImputationStrategy, PipelineConfig};
use air_harmonize::output;
use air_harmonize::pipeline::{self, HarmonizationRun};
use air_harmonize::util::{format_int, format_number};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "air_harmonize", about = "Harmonize yearly municipal air-quality exports")]
struct Args {
    /// Directory holding the yearly CSV exports.
    #[arg(long, env = "AIR_DATA_DIR", default_value = "data/raw")]
    data_dir: PathBuf,

    /// Directory the harmonized table and summary are written to.
    #[arg(long, env = "AIR_OUTPUT_DIR", default_value = "data/cleaned")]
    output_dir: PathBuf,

    /// Years to load (comma separated). Defaults to 2000-2015 without 2006.
    #[arg(long, value_delimiter = ',')]
    years: Option<Vec<i32>>,

    /// Year the name/identifier directory is built from.
    #[arg(long)]
    reference_year: Option<i32>,

    #[arg(long, value_enum, default_value_t = ImputationStrategy::WholeCorpusMedian)]
    imputation: ImputationStrategy,

    #[arg(long, value_enum, default_value_t = DuplicatePolicy::Report)]
    on_duplicate: DuplicatePolicy,

    /// Abort when any (municipality, year) key is duplicated.
    #[arg(long)]
    strict: bool,

    /// Rows shown in each console preview.
    #[arg(long, default_value_t = 5)]
    preview_rows: usize,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            data_dir: self.data_dir.clone(),
            years: self.years.clone().unwrap_or_else(default_years),
            reference_year: self.reference_year,
            imputation: self.imputation,
            on_duplicate: self.on_duplicate,
            strict_duplicates: self.strict,
            ..PipelineConfig::default()
        }
    }
}

/// Print the run's diagnostics the way an analyst reads them.
fn print_summary(run: &HarmonizationRun, preview_rows: usize) {
    let s = &run.summary;
    println!(
        "Processing dataset... ({} rows loaded from {} years, {} years skipped)",
        format_int(s.rows_loaded),
        s.loaded_years.len(),
        s.skipped_years.len()
    );
    if s.coerced_cells > 0 {
        println!("Note: {} non-numeric cells treated as missing.", format_int(s.coerced_cells));
    }
    if s.normalization.unknown_ids > 0 {
        println!(
            "Note: {} rows without identifier set to 'Unknown'.",
            format_int(s.normalization.unknown_ids)
        );
    }
    println!();

    if !s.skipped_years.is_empty() {
        output::preview_table("Skipped years", None, &s.skipped_years, s.skipped_years.len());
    }
    output::preview_table(
        "Median imputation",
        Some("per metric, missing cells filled"),
        &s.imputation.rows(),
        s.imputation.metrics.len(),
    );
    println!(
        "Duplicates by '{}' and year: {} groups, {} rows",
        air_harmonize::config::ID_COLUMN,
        format_int(s.duplicates.groups),
        format_int(s.duplicates.rows)
    );
    if !s.duplicates.is_clean() {
        output::preview_table("Duplicated keys", None, &s.duplicates.clusters, preview_rows);
    }
    if s.directory.cardinality_mismatch {
        println!(
            "Warning: directory has {} names for {} identifiers.",
            format_int(s.directory.names),
            format_int(s.directory.ids)
        );
    }
    let mean_population = if run.table.is_empty() {
        0.0
    } else {
        run.table.records.iter().map(|r| r.population).sum::<f64>() / run.table.len() as f64
    };
    println!(
        "Harmonized table: {} rows x {} metrics (mean population {})\n",
        format_int(s.rows_out),
        s.metric_columns,
        format_number(mean_population, 0)
    );
}

fn write_outputs(run: &HarmonizationRun, output_dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let table_path = output_dir.join("cleaned_air_quality_with_year.csv");
    output::write_table_file(&table_path, &run.table)?;
    output::write_json(&output_dir.join("summary.json"), &run.summary)?;
    if !run.summary.duplicates.is_clean() {
        output::write_csv(&output_dir.join("duplicates.csv"), &run.summary.duplicates.clusters)?;
    }
    println!("(Full table exported to {})", table_path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.pipeline_config();

    let run = match pipeline::run(&config) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Harmonization aborted: {}", e);
            return ExitCode::FAILURE;
        }
    };
    print_summary(&run, args.preview_rows);
    if let Err(e) = write_outputs(&run, &args.output_dir) {
        eprintln!("Write error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
