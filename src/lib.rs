//! blobflow: capacity-aware ingestion of dated JSON blobs into a partitioned document collection

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::*;
pub use types::*;

use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::progress::ProgressFn;
use crate::pipeline::PipelineOrchestrator;
use crate::store::{FsSourceStore, SqliteDocumentStore};
use crate::utils::IngestConfig;

/// Result alias used by public blobflow API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: ingest every object of `container` under `prefixes` with `config`.
///
/// Sources come from `<config.source_root>/<container>`; documents go to the SQLite store at
/// `config.destination_path`. `on_item` is called from worker threads once per finished object.
///
/// Per-object failures are counted in the returned [`RunOutcome`]; a fatal pipeline error
/// (missing collection, listing failure) is returned as an error.
pub fn ingest(
    config: &IngestConfig,
    container: &str,
    prefixes: &[String],
    on_item: Option<ProgressFn>,
) -> Result<RunOutcome> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        config
    );
    debug!("{}", config_str);

    let source = Arc::new(FsSourceStore::new(&config.source_root, container));
    let destination = Arc::new(SqliteDocumentStore::open(
        &config.destination_path,
        config.connection_pool_size,
        Duration::from_millis(config.busy_timeout_ms),
    )?);
    let mut orchestrator =
        PipelineOrchestrator::new(source, destination, config.pipeline_config())
            .with_progress(on_item);
    Ok(orchestrator.run(prefixes)?)
}
