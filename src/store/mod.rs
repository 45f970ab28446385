//! Source and destination store interfaces, plus the shipped filesystem and SQLite implementations.

mod fs_source;
mod sqlite;

pub use fs_source::FsSourceStore;
pub use sqlite::{SqliteDocumentStore, open_db, open_db_in_memory};

use log::warn;

use crate::engine::record::IngestDocument;
use crate::engine::retry::{Attempt, RetryPolicy, with_retry};
use crate::error::{IngestError, ItemError, SourceError, WriteError};
use crate::types::{
    CollectionId, ContinuationCursor, ListingPage, SourceObjectRef, ThroughputBudget,
};

/// Paginated, prefix-addressed object store holding the source blobs.
pub trait SourceStore: Send + Sync {
    /// Up to `max_items` objects under `prefix`, after `cursor` when given.
    /// The returned page carries a cursor only when more objects remain.
    fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&ContinuationCursor>,
        max_items: usize,
    ) -> Result<ListingPage, SourceError>;

    /// Raw content of one object.
    fn download(&self, object: &SourceObjectRef) -> Result<Vec<u8>, SourceError>;
}

/// Partitioned document collection receiving the ingested records.
pub trait DocumentStore: Send + Sync {
    /// Provisioned write capacity of `collection`. Missing collection or offer is a configuration error.
    fn provisioned_throughput(&self, collection: &CollectionId)
    -> Result<ThroughputBudget, IngestError>;

    /// One write attempt. Re-writing the same `(partition_key, id)` replaces the document.
    fn upsert(&self, collection: &CollectionId, doc: &IngestDocument) -> Result<(), WriteError>;
}

/// Upsert with the destination's throttle policy. Returns attempts used on success.
///
/// Only `Throttled` is retried; `Rejected` fails at once. Exhausting the policy yields
/// [`ItemError::ThrottleExhausted`].
pub fn upsert_with_retry(
    store: &dyn DocumentStore,
    collection: &CollectionId,
    doc: &IngestDocument,
    policy: &RetryPolicy,
    key: &str,
) -> Result<u32, ItemError> {
    with_retry(policy, key, |attempt| match store.upsert(collection, doc) {
        Ok(()) => Attempt::Done(attempt),
        Err(WriteError::Throttled { retry_after }) => Attempt::Retry {
            error: WriteError::Throttled { retry_after },
            after: retry_after,
        },
        Err(e) => Attempt::Fail(e),
    })
    .map_err(|failure| match failure.error {
        WriteError::Throttled { .. } => {
            warn!(
                "Write of {} still throttled after {} attempt(s)",
                key, failure.attempts
            );
            ItemError::ThrottleExhausted {
                key: key.to_string(),
                attempts: failure.attempts,
            }
        }
        WriteError::Rejected(reason) => ItemError::Write {
            key: key.to_string(),
            reason,
        },
    })
}
