use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::engine::tools::parse_run_date;

/// Ingest one container's JSON blobs for a date range into a partitioned document collection.
#[derive(Clone, Debug, Parser)]
#[command(name = "blobflow")]
#[command(about = "Ingest dated JSON blobs into a document collection, sized to its provisioned throughput.")]
pub struct Cli {
    /// First day to ingest (YYYY-MM-DD or YYYYMMDD).
    #[arg(value_name = "START_DATE", value_parser = parse_run_date)]
    pub start_date: NaiveDate,

    /// Last day to ingest, inclusive.
    #[arg(value_name = "END_DATE", value_parser = parse_run_date)]
    pub end_date: NaiveDate,

    /// Source container holding one directory per day.
    #[arg(value_name = "CONTAINER")]
    pub container: String,

    /// Settings file. Default: `blobflow.toml` in the working directory, if present.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Verbose output and a live document counter.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
