//! Worker budget and listing page size derived from destination throughput.

use log::debug;

use crate::types::{ThroughputBudget, WorkerBudget};
use crate::utils::config::WorkerLimits;

/// Worker count for a run.
///
/// A positive `explicit_override` is returned verbatim. Otherwise one worker per
/// [`WorkerLimits::UNITS_PER_WORKER`] throughput units, at least 1 and at most
/// [`WorkerLimits::MAX_WORKERS`].
#[must_use]
pub fn plan(explicit_override: Option<i64>, throughput: ThroughputBudget) -> WorkerBudget {
    if let Some(k) = explicit_override.filter(|k| *k > 0) {
        debug!("Using explicit parallelism {}", k);
        return WorkerBudget::new(usize::try_from(k).unwrap_or(usize::MAX));
    }
    let raw = (throughput.get() / WorkerLimits::UNITS_PER_WORKER).max(1) as usize;
    let workers = raw.min(WorkerLimits::MAX_WORKERS);
    debug!(
        "Derived {} worker(s) from {} throughput units",
        workers,
        throughput.get()
    );
    WorkerBudget::new(workers)
}

/// Objects requested per list call so one prefix splits evenly across workers.
/// Clamped to `[1, max_page_size]`.
#[must_use]
pub fn page_size(estimated_objects: usize, budget: WorkerBudget, max_page_size: usize) -> usize {
    (estimated_objects / budget.get()).clamp(1, max_page_size.max(1))
}
