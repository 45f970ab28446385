use crossbeam_channel::{Receiver, SendError, Sender, bounded};
use log::{debug, error};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::context::{ItemResult, PageTicket, RunTally, WorkItem, WorkerContext};
use super::error_handler::{log_item_failure, log_write_failure};
use crate::engine::record::{IngestDocument, RawRecord};
use crate::error::ItemError;
use crate::store::upsert_with_retry;
use crate::types::{ListingPage, PageOutcome, RunOutcome, SourceObjectRef, WorkerBudget};
use crate::utils::config::WorkerLimits;

/// Download, transform and write one object. Every failure is logged here.
fn ingest_object(ctx: &WorkerContext, object: &SourceObjectRef) -> ItemResult {
    let key = object.key();
    let bytes = ctx.source.download(object).map_err(|e| {
        let err = ItemError::Download {
            key: key.clone(),
            reason: e.to_string(),
        };
        log_item_failure(&err);
        err
    })?;
    let doc = RawRecord::parse(&key, &bytes)
        .and_then(|record| IngestDocument::from_record(object, record, &ctx.record))
        .inspect_err(log_item_failure)?;
    upsert_with_retry(
        ctx.destination.as_ref(),
        &ctx.collection,
        &doc,
        &ctx.write_retry,
        &key,
    )
    .map(|attempts| {
        if attempts > 1 {
            debug!("Wrote {} after {} attempts", key, attempts);
        }
    })
    .inspect_err(|e| log_write_failure(&doc, e))
}

/// Single ingestion worker: take items from `item_rx` until the queue closes.
fn ingestion_worker_loop(item_rx: Receiver<WorkItem>, ctx: Arc<WorkerContext>) {
    while let Ok(item) = item_rx.recv() {
        let result = ingest_object(&ctx, &item.object);
        ctx.tally.record(result.is_ok());
        if let Some(ref cb) = ctx.on_item {
            cb(1);
        }
        let _ = item.reply.send(result);
    }
}

/// Fixed pool of `WorkerBudget` threads shared by every page of a run.
///
/// Each worker has at most one destination write in flight, so the budget is a hard
/// ceiling on concurrent writes across all pages.
pub struct IngestionWorkerPool {
    item_tx: Sender<WorkItem>,
    handles: Vec<JoinHandle<()>>,
    tally: Arc<RunTally>,
    budget: WorkerBudget,
}

impl IngestionWorkerPool {
    /// Spawn `budget` workers. Call [`shutdown`](Self::shutdown) to close the queue and join them.
    pub fn spawn(ctx: WorkerContext, budget: WorkerBudget) -> Self {
        let (item_tx, item_rx) = bounded::<WorkItem>(WorkerLimits::queue_capacity(budget.get()));
        let tally = Arc::clone(&ctx.tally);
        let ctx = Arc::new(ctx);
        let handles: Vec<_> = (0..budget.get())
            .filter_map(|worker_id| {
                let item_rx = item_rx.clone();
                let ctx = Arc::clone(&ctx);
                thread::Builder::new()
                    .name(format!("ingest-{worker_id}"))
                    .spawn(move || ingestion_worker_loop(item_rx, ctx))
                    .map_err(|e| error!("Failed to spawn worker {}: {}", worker_id, e))
                    .ok()
            })
            .collect();
        debug!("Spawned {} of {} ingestion workers", handles.len(), budget.get());
        // Only workers hold the receiver now, so sends fail once they are all gone.
        drop(item_rx);
        Self {
            item_tx,
            handles,
            tally,
            budget,
        }
    }

    pub fn budget(&self) -> WorkerBudget {
        self.budget
    }

    /// Queue every item of `page`. Blocks while the queue is full; returns before the items finish.
    pub fn dispatch(&self, page: ListingPage) -> PageTicket {
        let (reply_tx, reply_rx) = bounded::<ItemResult>(page.len().max(1));
        let mut delivered = 0_usize;
        let mut undelivered = 0_usize;
        for object in page.items {
            let item = WorkItem {
                object,
                reply: reply_tx.clone(),
            };
            match self.item_tx.send(item) {
                Ok(()) => delivered += 1,
                Err(SendError(item)) => {
                    error!("No ingestion worker available for {}", item.object);
                    self.tally.record(false);
                    undelivered += 1;
                }
            }
        }
        PageTicket::new(reply_rx, delivered, undelivered)
    }

    /// Ingest one page and wait for all of its items.
    pub fn process_page(&self, page: ListingPage) -> PageOutcome {
        self.dispatch(page).wait()
    }

    /// Counts so far.
    pub fn tally(&self) -> RunOutcome {
        self.tally.snapshot()
    }

    /// Close the queue, let workers finish what is queued, and join them.
    pub fn shutdown(self) -> RunOutcome {
        let Self {
            item_tx,
            handles,
            tally,
            ..
        } = self;
        // Dropping the last sender closes the channel so workers exit.
        drop(item_tx);
        for h in handles {
            if h.join().is_err() {
                error!("Ingestion worker panicked");
            }
        }
        tally.snapshot()
    }
}
