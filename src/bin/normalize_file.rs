//! Offline normalizer
//!
//! Reads one raw run payload (`{"metadata": {...}, "metrics": {...}}`) from
//! a local JSON file, normalizes it, and writes a one-row CSV. Useful for
//! inspecting what a run will look like without touching the document store.

use benchpress::export;
use benchpress::normalize::{normalize, RunPayload};
use benchpress::telemetry::Telemetry;

use clap::Parser;
use std::fs::File;
use tracing::info;

/// benchpress offline normalizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Raw run payload JSON file
    #[arg(long)]
    input: String,

    /// CSV output path
    #[arg(long, default_value = "run.csv")]
    output: String,

    /// Comma-separated metric-name exclusion patterns
    #[arg(long, default_value = "")]
    exclude: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("benchpress-normalize-file", &args.log_level)?;

    let file = File::open(&args.input)?;
    let payload: RunPayload = serde_json::from_reader(file)?;
    info!(
        input = %args.input,
        metrics = payload.metrics.len(),
        "Loaded run payload"
    );

    let row = normalize(&payload, &args.exclude)?;
    export::write_csv_file(&args.output, std::slice::from_ref(&row))?;

    Ok(())
}
