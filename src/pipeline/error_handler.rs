use log::{error, info, warn};

use crate::engine::record::IngestDocument;
use crate::error::ItemError;
use crate::types::RunOutcome;
use crate::utils::Colors;

/// Log an item that failed before a write was attempted.
pub fn log_item_failure(err: &ItemError) {
    error!("Skipping object: {}", err);
}

/// Log a failed write with the payload, so the document can be re-driven by hand.
pub fn log_write_failure(doc: &IngestDocument, err: &ItemError) {
    error!(
        "Failed to write {} (partition {}). Error was {}",
        doc.to_json(),
        doc.partition_key,
        err
    );
}

/// Summary line for a finished (or drained) run. Warns when any item failed.
pub fn report_outcome(outcome: &RunOutcome) {
    info!(
        "{} | {} | {}",
        Colors::colorize(
            Colors::ATTEMPTED,
            &format!("Attempted: {}", outcome.attempted)
        ),
        Colors::colorize(
            Colors::SUCCEEDED,
            &format!("Succeeded: {}", outcome.succeeded)
        ),
        Colors::colorize(Colors::FAILED, &format!("Failed: {}", outcome.failed))
    );
    if outcome.failed > 0 {
        warn!(
            "{} object(s) were not ingested; re-run the date range to retry them",
            outcome.failed
        );
    }
}
