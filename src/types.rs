//! Public and internal types for the blobflow API and pipeline.

use std::fmt;
use std::time::Duration;

use crate::engine::record::RecordSettings;
use crate::engine::retry::RetryPolicy;

/// One listed source object: the date prefix it was listed under plus the rest of its key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceObjectRef {
    /// Partition-date segment (e.g. `20170101`).
    pub prefix: String,
    /// Leaf name below the prefix. May itself contain `/` for nested layouts.
    pub name: String,
}

impl SourceObjectRef {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// Full hierarchical key, `prefix/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.prefix, self.name)
    }
}

impl fmt::Display for SourceObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.name)
    }
}

/// Opaque token exchanged for the next listing page. Only the source store interprets it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuationCursor(String);

impl ContinuationCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a listing. `continuation` is `None` on the final page.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    pub items: Vec<SourceObjectRef>,
    pub continuation: Option<ContinuationCursor>,
}

impl ListingPage {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_final(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Destination collection address: database + collection name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionId {
    pub database: String,
    pub collection: String,
}

impl CollectionId {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.collection)
    }
}

/// Provisioned write capacity of the destination collection, read once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThroughputBudget(pub u32);

impl ThroughputBudget {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Number of concurrent ingestion workers for a run. Always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerBudget(usize);

impl WorkerBudget {
    /// Build a budget; zero is raised to 1.
    pub fn new(workers: usize) -> Self {
        Self(workers.max(1))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Per-page result of [`IngestionWorkerPool::process_page`](crate::pipeline::IngestionWorkerPool::process_page).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Aggregate result of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Orchestrator lifecycle. `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ProbingCapacity,
    Planning,
    Dispatching,
    Draining,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// Everything the orchestrator needs for one run, built once at start-up.
///
/// Usually produced by [`IngestConfig::pipeline_config`](crate::utils::IngestConfig::pipeline_config).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Destination collection to probe and write into.
    pub collection: CollectionId,
    /// Explicit worker count. `None` or a non-positive value derives it from throughput.
    pub parallelism_override: Option<i64>,
    /// Expected objects per prefix; divided across workers to size listing pages.
    pub estimated_objects_per_prefix: usize,
    /// Listing platform ceiling for a single page.
    pub max_page_size: usize,
    /// Retry policy for transient listing errors.
    pub list_retry: RetryPolicy,
    /// Retry policy for throttled destination writes.
    pub write_retry: RetryPolicy,
    /// Which record fields form the partition key.
    pub record: RecordSettings,
}

impl PipelineConfig {
    /// Config with the reference defaults for `collection`.
    pub fn new(collection: CollectionId) -> Self {
        use crate::utils::config::{ListingConsts, ThrottleConsts};
        Self {
            collection,
            parallelism_override: None,
            estimated_objects_per_prefix: ListingConsts::ESTIMATED_OBJECTS_PER_PREFIX,
            max_page_size: ListingConsts::MAX_PAGE_SIZE,
            list_retry: RetryPolicy {
                max_retries: ListingConsts::MAX_RETRIES,
                initial_backoff: Duration::from_millis(ListingConsts::INITIAL_BACKOFF_MS),
                max_backoff: Duration::from_millis(ListingConsts::MAX_BACKOFF_MS),
                max_total_wait: None,
            },
            write_retry: RetryPolicy {
                max_retries: ThrottleConsts::MAX_RETRIES,
                initial_backoff: Duration::from_millis(ThrottleConsts::INITIAL_BACKOFF_MS),
                max_backoff: Duration::from_millis(ThrottleConsts::MAX_BACKOFF_MS),
                max_total_wait: Some(Duration::from_secs(ThrottleConsts::MAX_TOTAL_WAIT_SECS)),
            },
            record: RecordSettings::default(),
        }
    }
}
