//! Engine module: planning, record shaping, retry, and the CLI surface

pub mod arg_parser;
pub mod cli;
pub mod planner;
pub mod progress;
pub mod record;
pub mod retry;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use planner::{page_size, plan};
pub use record::{IngestDocument, RawRecord, RecordSettings, partition_key};
pub use retry::{Attempt, RetryFailure, RetryPolicy, with_retry};
pub use tools::{day_prefix, day_prefixes, parse_run_date};
