//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!("{pkg}.toml"),
                env_prefix: format!("{}_", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Settings file looked up in the working directory when `--config` is not given.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    /// Environment variable name for `key`, e.g. `BLOBFLOW_DATABASE`.
    pub fn env_var(&self, key: &str) -> String {
        format!("{}{}", self.env_prefix, key)
    }
}

// ---- Worker budget ----

/// Bounds for deriving the worker count from provisioned throughput.
pub struct WorkerLimits;

impl WorkerLimits {
    /// Hard cap on derived workers, regardless of measured capacity.
    pub const MAX_WORKERS: usize = 250;
    /// Throughput units per derived worker.
    pub const UNITS_PER_WORKER: u32 = 1000;
    /// Work queue slots per worker. Keeps the enumerator just ahead of the pool.
    pub const QUEUE_SLOTS_PER_WORKER: usize = 2;
    /// Largest explicit worker count accepted from configuration.
    pub const MAX_OVERRIDE_WORKERS: i64 = 4096;
    /// Upper bound on work queue slots, whatever the worker count.
    pub const MAX_QUEUE_SLOTS: usize = 8192;

    /// Work queue capacity for `workers` threads.
    pub fn queue_capacity(workers: usize) -> usize {
        workers
            .saturating_mul(Self::QUEUE_SLOTS_PER_WORKER)
            .clamp(1, Self::MAX_QUEUE_SLOTS)
    }
}

/// Config value meaning "derive parallelism from throughput".
pub const DERIVE_PARALLELISM: i64 = -1;

// ---- Listing ----

/// Listing page sizing and retry.
pub struct ListingConsts;

impl ListingConsts {
    /// Expected objects in one day prefix; divided across workers to size pages.
    pub const ESTIMATED_OBJECTS_PER_PREFIX: usize = 73_000;
    /// Platform ceiling on objects per list call.
    pub const MAX_PAGE_SIZE: usize = 5_000;
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 2_000;
    pub const MAX_BACKOFF_MS: u64 = 30_000;
}

// ---- Destination writes ----

/// Throttle retry policy for destination writes.
pub struct ThrottleConsts;

impl ThrottleConsts {
    pub const MAX_RETRIES: u32 = 10;
    pub const MAX_TOTAL_WAIT_SECS: u64 = 60;
    pub const INITIAL_BACKOFF_MS: u64 = 100;
    pub const MAX_BACKOFF_MS: u64 = 5_000;
}

// ---- Database ----

/// SQLite destination tuning.
pub struct DatabaseConsts;

impl DatabaseConsts {
    /// How long a connection waits on a lock before the write is reported as throttled.
    pub const BUSY_TIMEOUT_MS: u64 = 50;
    /// Connections in the writer pool.
    pub const CONNECTION_POOL_SIZE: usize = 4;
    /// Partition key path recorded for new collections.
    pub const DEFAULT_PARTITION_KEY_PATH: &'static str = "/partitionKey";
}

// ---- Records ----

/// Field injected into every written document.
pub const PARTITION_KEY_FIELD: &str = "partitionKey";
/// Field used as document id when it holds a string.
pub const ID_FIELD: &str = "id";
