use log::{debug, error, info};
use std::sync::Arc;

use crate::engine::planner;
use crate::engine::progress::ProgressFn;
use crate::error::IngestError;
use crate::pipeline::{
    IngestionWorkerPool, PageTicket, RunTally, SourceEnumerator, WorkerContext,
    report_outcome,
};
use crate::store::{DocumentStore, SourceStore};
use crate::types::{PageOutcome, PipelineConfig, RunOutcome, RunState, WorkerBudget};
use crate::utils::config::WorkerLimits;

/// Drives one run: probe capacity → plan workers → list and dispatch every prefix → drain.
pub struct PipelineOrchestrator {
    source: Arc<dyn SourceStore>,
    destination: Arc<dyn DocumentStore>,
    config: PipelineConfig,
    on_item: Option<ProgressFn>,
    state: RunState,
    worker_budget: Option<WorkerBudget>,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn SourceStore>,
        destination: Arc<dyn DocumentStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            destination,
            config,
            on_item: None,
            state: RunState::Idle,
            worker_budget: None,
        }
    }

    /// Per-item progress callback, called from worker threads.
    pub fn with_progress(mut self, on_item: Option<ProgressFn>) -> Self {
        self.on_item = on_item;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Budget chosen by the last run, once it got past planning.
    pub fn worker_budget(&self) -> Option<WorkerBudget> {
        self.worker_budget
    }

    fn transition(&mut self, next: RunState) {
        debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the pipeline over `prefixes` (one listing per prefix, one shared worker pool).
    ///
    /// Item failures never fail the run; they are counted in the returned [`RunOutcome`].
    /// An oversized parallelism override or a probe error fails before any listing. A listing
    /// error stops dispatching, waits for everything already dispatched, then fails.
    pub fn run(&mut self, prefixes: &[String]) -> Result<RunOutcome, IngestError> {
        self.state = RunState::Idle;
        self.worker_budget = None;

        if let Some(k) = self.config.parallelism_override
            && k > WorkerLimits::MAX_OVERRIDE_WORKERS
        {
            self.transition(RunState::Failed);
            let e = IngestError::Configuration(format!(
                "parallelism override {} exceeds the maximum of {}",
                k,
                WorkerLimits::MAX_OVERRIDE_WORKERS
            ));
            error!("{}", e);
            return Err(e);
        }

        self.transition(RunState::ProbingCapacity);
        let throughput = match self
            .destination
            .provisioned_throughput(&self.config.collection)
        {
            Ok(t) => t,
            Err(e) => {
                self.transition(RunState::Failed);
                error!("Capacity probe failed: {}", e);
                return Err(e);
            }
        };
        info!(
            "Collection {} is provisioned with {} throughput units",
            self.config.collection,
            throughput.get()
        );

        self.transition(RunState::Planning);
        let budget = planner::plan(self.config.parallelism_override, throughput);
        let page_size = planner::page_size(
            self.config.estimated_objects_per_prefix,
            budget,
            self.config.max_page_size,
        );
        self.worker_budget = Some(budget);
        info!(
            "Using {} worker(s), {} object(s) per listing page",
            budget.get(),
            page_size
        );

        self.transition(RunState::Dispatching);
        let pool = IngestionWorkerPool::spawn(
            WorkerContext {
                source: Arc::clone(&self.source),
                destination: Arc::clone(&self.destination),
                collection: self.config.collection.clone(),
                record: self.config.record.clone(),
                write_retry: self.config.write_retry,
                tally: Arc::new(RunTally::default()),
                on_item: self.on_item.clone(),
            },
            budget,
        );

        let mut in_flight: Vec<PageTicket> = Vec::new();
        let mut settled = PageOutcome::default();
        let mut fatal = None;
        'prefixes: for prefix in prefixes {
            let mut enumerator = SourceEnumerator::new(
                Arc::clone(&self.source),
                prefix.as_str(),
                page_size,
                self.config.list_retry,
            );
            for page in &mut enumerator {
                match page {
                    Ok(page) if page.is_empty() => {}
                    Ok(page) => {
                        in_flight.push(pool.dispatch(page));
                        // Settle finished pages so outcomes don't pile up over a long range.
                        in_flight.retain_mut(|t| match t.poll() {
                            Some(o) => {
                                add_page(&mut settled, o);
                                false
                            }
                            None => true,
                        });
                    }
                    Err(e) => {
                        fatal = Some(e);
                        break 'prefixes;
                    }
                }
            }
            info!(
                "Prefix {}: {} object(s) dispatched in {} page(s)",
                prefix,
                enumerator.objects_listed(),
                enumerator.pages_listed()
            );
        }

        self.transition(RunState::Draining);
        for ticket in in_flight {
            add_page(&mut settled, ticket.wait());
        }
        let outcome = pool.shutdown();
        debug!(
            "Drained pages: {} succeeded, {} failed",
            settled.succeeded, settled.failed
        );

        match fatal {
            Some(e) => {
                self.transition(RunState::Failed);
                error!("Run aborted: {}", e);
                report_outcome(&outcome);
                Err(e)
            }
            None => {
                self.transition(RunState::Completed);
                Ok(outcome)
            }
        }
    }
}

fn add_page(total: &mut PageOutcome, page: PageOutcome) {
    total.succeeded += page.succeeded;
    total.failed += page.failed;
}
