//! Pipeline components: context, enumeration, worker pool, orchestration, error reporting.

pub mod context;
pub mod enumerate;
pub mod error_handler;
pub mod orchestrator;
pub mod worker;

pub use context::{ItemResult, PageTicket, RunTally, WorkItem, WorkerContext};
pub use enumerate::SourceEnumerator;
pub use error_handler::{log_item_failure, log_write_failure, report_outcome};
pub use orchestrator::PipelineOrchestrator;
pub use worker::IngestionWorkerPool;
