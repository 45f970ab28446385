//! CLI command handler: load settings, expand the date range, run the pipeline.

use anyhow::{Context, Result};
use chrono::Local;
use log::debug;

use crate::engine::arg_parser::Cli;
use crate::engine::progress::{create_counter, progress_callback, refresh_bar};
use crate::engine::tools::day_prefixes;
use crate::pipeline::report_outcome;
use crate::utils::{IngestConfig, setup_logging};

/// Run one ingestion for the CLI arguments. Any fatal pipeline error is returned (non-zero exit).
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.is_verbose());

    let cwd = std::env::current_dir().context("resolve working directory")?;
    let config = IngestConfig::load(cli.config.as_deref(), &cwd)?;
    let prefixes = day_prefixes(cli.start_date, cli.end_date)?;
    debug!(
        "Ingesting {} day(s) from container '{}'",
        prefixes.len(),
        cli.container
    );

    println!("Start time: {}", Local::now());
    let bar = cli.is_verbose().then(|| create_counter("Ingesting"));
    let outcome = crate::ingest(&config, &cli.container, &prefixes, progress_callback(&bar));
    if let Some(ref b) = bar {
        refresh_bar(b);
        eprintln!();
    }
    let outcome = outcome?;
    report_outcome(&outcome);
    println!("End time: {}", Local::now());
    Ok(())
}
