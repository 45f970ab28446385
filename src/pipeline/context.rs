//! Pipeline context: shared data passed into worker threads, work items, and per-page tickets.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::progress::ProgressFn;
use crate::engine::record::RecordSettings;
use crate::engine::retry::RetryPolicy;
use crate::error::ItemError;
use crate::store::{DocumentStore, SourceStore};
use crate::types::{CollectionId, PageOutcome, RunOutcome, SourceObjectRef};

/// Result of ingesting one object, sent back to the page that dispatched it.
pub type ItemResult = Result<(), ItemError>;

/// Shared context for the worker pool. Built once per run and shared by every worker.
pub struct WorkerContext {
    pub source: Arc<dyn SourceStore>,
    pub destination: Arc<dyn DocumentStore>,
    pub collection: CollectionId,
    pub record: RecordSettings,
    pub write_retry: RetryPolicy,
    pub tally: Arc<RunTally>,
    /// Called with 1 after each finished item (success or failure).
    pub on_item: Option<ProgressFn>,
}

/// One object queued for a worker, with the channel its outcome goes back on.
pub struct WorkItem {
    pub object: SourceObjectRef,
    pub reply: Sender<ItemResult>,
}

/// Run-wide counters, incremented by workers.
#[derive(Debug, Default)]
pub struct RunTally {
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunTally {
    pub fn record(&self, ok: bool) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RunOutcome {
        RunOutcome {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle for one dispatched page. Collects exactly one outcome per delivered item.
pub struct PageTicket {
    outcome_rx: Receiver<ItemResult>,
    pending: usize,
    outcome: PageOutcome,
}

impl PageTicket {
    /// `pending` items were handed to workers; `undelivered` never reached one and count as failed.
    pub(crate) fn new(outcome_rx: Receiver<ItemResult>, pending: usize, undelivered: usize) -> Self {
        Self {
            outcome_rx,
            pending,
            outcome: PageOutcome {
                succeeded: 0,
                failed: undelivered,
            },
        }
    }

    fn absorb(&mut self, result: ItemResult) {
        self.pending -= 1;
        match result {
            Ok(()) => self.outcome.succeeded += 1,
            Err(_) => self.outcome.failed += 1,
        }
    }

    /// Outcomes still outstanding.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Take whatever outcomes are ready. `Some` once every item has reported.
    pub fn poll(&mut self) -> Option<PageOutcome> {
        while self.pending > 0 {
            match self.outcome_rx.try_recv() {
                Ok(result) => self.absorb(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    // Workers went away without answering; those items did not complete.
                    self.outcome.failed += self.pending;
                    self.pending = 0;
                }
            }
        }
        Some(self.outcome)
    }

    /// Block until every item has reported.
    pub fn wait(mut self) -> PageOutcome {
        while self.pending > 0 {
            match self.outcome_rx.recv() {
                Ok(result) => self.absorb(result),
                Err(_) => {
                    self.outcome.failed += self.pending;
                    self.pending = 0;
                }
            }
        }
        self.outcome
    }
}
