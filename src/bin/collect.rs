//! benchpress collection binary
//!
//! Queries the document store for benchmark runs in a time range,
//! normalizes each run into one flat row, writes the rows to CSV, and
//! optionally uploads chunked copies to object storage.

use benchpress::collector::Collector;
use benchpress::config::CollectionConfig;
use benchpress::normalize::normalize;
use benchpress::telemetry::Telemetry;
use benchpress::{export, Error};

use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::Path;
use tracing::info;

/// benchpress collector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document store endpoint
    #[arg(long, env = "ES_SERVER")]
    es_server: String,

    /// Document store index name
    #[arg(long, env = "ES_INDEX")]
    es_index: String,

    /// Collection config file (YAML)
    #[arg(long, env = "BENCHPRESS_CONFIG")]
    config: String,

    /// Start of the time range, in epoch seconds
    #[arg(long)]
    from: i64,

    /// End of the time range, in epoch seconds (defaults to now)
    #[arg(long)]
    to: Option<i64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("benchpress-collect", &args.log_level)?;

    let (from, to) = parse_timerange(args.from, args.to)?;
    let config = CollectionConfig::load(&args.config)?;
    let exclude_patterns = config.exclude_patterns();
    let output_file = config.output_file.clone();
    let upload = config.s3.clone();

    info!(
        es_server = %args.es_server,
        es_index = %args.es_index,
        from = %from,
        to = %to,
        "Starting benchpress collection"
    );

    let collector = Collector::new(&args.es_server, &args.es_index, config)?;
    let runs = collector.collect(from, to).await?;
    info!(runs = runs.len(), "Collected complete runs");

    let mut rows = Vec::with_capacity(runs.len());
    for run in &runs {
        let row = normalize(&run.payload, &exclude_patterns)?;
        rows.push(row);
    }

    if rows.is_empty() {
        info!("No runs to report");
        return Ok(());
    }

    export::write_csv_file(&output_file, &rows)?;

    if let Some(upload) = upload {
        let store = export::create_object_store(&upload.bucket)?;
        let filename = Path::new(&output_file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("results.csv");
        let chunks = export::upload_chunks(
            store.as_ref(),
            &upload.folder,
            filename,
            &rows,
            upload.chunk_size,
        )
        .await?;
        info!(chunks, bucket = %upload.bucket, "Upload complete");
    }

    Ok(())
}

fn parse_timerange(from: i64, to: Option<i64>) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
    let from = DateTime::from_timestamp(from, 0)
        .ok_or_else(|| Error::Config(format!("invalid --from timestamp: {from}")))?;
    let to = match to {
        Some(to) => DateTime::from_timestamp(to, 0)
            .ok_or_else(|| Error::Config(format!("invalid --to timestamp: {to}")))?,
        None => Utc::now(),
    };
    if from >= to {
        return Err(Error::Config(
            "start date must be before end date".to_string(),
        ));
    }
    Ok((from, to))
}
