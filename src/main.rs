//! blobflow CLI: ingest a date range of JSON blobs into a document collection.

use anyhow::Result;
use blobflow::engine::arg_parser::Cli;
use blobflow::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
