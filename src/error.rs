//! Error taxonomy. Only [`IngestError`] stops a run; [`ItemError`] is absorbed per object.

use std::time::Duration;

use thiserror::Error;

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Destination collection or its throughput descriptor is missing. Raised before any listing.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Listing failed permanently or exhausted its retry budget.
    #[error("listing prefix '{prefix}' failed after {attempts} attempt(s): {reason}")]
    Enumeration {
        prefix: String,
        attempts: u32,
        reason: String,
    },
    /// A finished enumerator was asked for another page.
    #[error("enumerator for prefix '{prefix}' is exhausted; build a new one to re-scan")]
    EnumeratorExhausted { prefix: String },
}

/// Failure of a single object. Logged and counted, never escalated.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("download of '{key}' failed: {reason}")]
    Download { key: String, reason: String },
    #[error("'{key}' is not a JSON object: {reason}")]
    Parse { key: String, reason: String },
    #[error("'{key}' has no usable '{field}' field")]
    MissingField { key: String, field: String },
    #[error("write of '{key}' rejected: {reason}")]
    Write { key: String, reason: String },
    #[error("write of '{key}' still throttled after {attempts} attempt(s)")]
    ThrottleExhausted { key: String, attempts: u32 },
}

/// Result of a single destination write attempt.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Rate limited; retry later, optionally after the store's hint.
    #[error("throttled")]
    Throttled { retry_after: Option<Duration> },
    #[error("{0}")]
    Rejected(String),
}

/// Source store failure for a list or download call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network/throttle style failure; the caller may retry.
    #[error("transient source error: {0}")]
    Transient(String),
    #[error("source error: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}
