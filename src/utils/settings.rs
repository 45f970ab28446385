//! Run settings: defaults → `blobflow.toml` → `.env` → process environment.
//!
//! Built once at start-up and passed into constructors; nothing else reads the environment.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::record::RecordSettings;
use crate::engine::retry::RetryPolicy;
use crate::types::{CollectionId, PipelineConfig};
use crate::utils::config::{
    DERIVE_PARALLELISM, DatabaseConsts, ListingConsts, PackagePaths, ThrottleConsts, WorkerLimits,
};

/// Externally configured values for one ingestion run.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Directory holding source containers.
    pub source_root: PathBuf,
    pub estimated_objects_per_prefix: usize,
    pub max_page_size: usize,
    pub list_max_retries: u32,
    pub list_backoff_ms: u64,
    /// SQLite file of the destination document store.
    pub destination_path: PathBuf,
    pub database: String,
    pub collection: String,
    /// `-1` derives parallelism from throughput; positive values are used verbatim.
    pub degree_of_parallelism: i64,
    pub max_throttle_retries: u32,
    pub max_throttle_wait_secs: u64,
    pub busy_timeout_ms: u64,
    pub connection_pool_size: usize,
    pub record: RecordSettings,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("."),
            estimated_objects_per_prefix: ListingConsts::ESTIMATED_OBJECTS_PER_PREFIX,
            max_page_size: ListingConsts::MAX_PAGE_SIZE,
            list_max_retries: ListingConsts::MAX_RETRIES,
            list_backoff_ms: ListingConsts::INITIAL_BACKOFF_MS,
            destination_path: PathBuf::from(format!("{}.db", PackagePaths::get().pkg_name())),
            database: String::new(),
            collection: String::new(),
            degree_of_parallelism: DERIVE_PARALLELISM,
            max_throttle_retries: ThrottleConsts::MAX_RETRIES,
            max_throttle_wait_secs: ThrottleConsts::MAX_TOTAL_WAIT_SECS,
            busy_timeout_ms: DatabaseConsts::BUSY_TIMEOUT_MS,
            connection_pool_size: DatabaseConsts::CONNECTION_POOL_SIZE,
            record: RecordSettings::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsToml {
    #[serde(default)]
    source: SourceSection,
    #[serde(default)]
    destination: DestinationSection,
    #[serde(default)]
    record: RecordSection,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    root: Option<String>,
    estimated_objects_per_prefix: Option<usize>,
    max_page_size: Option<usize>,
    list_max_retries: Option<u32>,
    list_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DestinationSection {
    path: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    degree_of_parallelism: Option<i64>,
    max_throttle_retries: Option<u32>,
    max_throttle_wait_secs: Option<u64>,
    busy_timeout_ms: Option<u64>,
    connection_pool_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordSection {
    customer_field: Option<String>,
    site_field: Option<String>,
    separator: Option<String>,
}

/// Overwrite a config field from the file when present.
macro_rules! apply_file_opt {
    ($section:expr, $cfg:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $cfg.$field = v;
        }
    };
}

fn apply_file_to_config(file: &SettingsToml, cfg: &mut IngestConfig) {
    let src = &file.source;
    if let Some(ref root) = src.root {
        cfg.source_root = PathBuf::from(root);
    }
    apply_file_opt!(src, cfg, estimated_objects_per_prefix);
    apply_file_opt!(src, cfg, max_page_size);
    apply_file_opt!(src, cfg, list_max_retries);
    apply_file_opt!(src, cfg, list_backoff_ms);

    let dest = &file.destination;
    if let Some(ref path) = dest.path {
        cfg.destination_path = PathBuf::from(path);
    }
    apply_file_opt!(dest, cfg, database);
    apply_file_opt!(dest, cfg, collection);
    apply_file_opt!(dest, cfg, degree_of_parallelism);
    apply_file_opt!(dest, cfg, max_throttle_retries);
    apply_file_opt!(dest, cfg, max_throttle_wait_secs);
    apply_file_opt!(dest, cfg, busy_timeout_ms);
    apply_file_opt!(dest, cfg, connection_pool_size);

    let rec = &file.record;
    apply_file_opt!(rec, cfg.record, customer_field);
    apply_file_opt!(rec, cfg.record, site_field);
    apply_file_opt!(rec, cfg.record, separator);
}

impl IngestConfig {
    /// Load settings for a run started in `dir`.
    ///
    /// `config_path` must exist when given; otherwise `<dir>/blobflow.toml` is used if present.
    /// A `.env` in `dir` is loaded into the environment before overrides are read.
    pub fn load(config_path: Option<&Path>, dir: &Path) -> Result<Self> {
        let mut cfg = match config_path {
            Some(path) => {
                let s = std::fs::read_to_string(path)
                    .with_context(|| format!("read settings file {}", path.display()))?;
                Self::from_toml_str(&s).with_context(|| format!("parse {}", path.display()))?
            }
            None => {
                let path = dir.join(PackagePaths::get().settings_filename());
                match std::fs::read_to_string(&path) {
                    Ok(s) => Self::from_toml_str(&s)
                        .with_context(|| format!("parse {}", path.display()))?,
                    Err(_) => Self::default(),
                }
            }
        };

        let env_path = dir.join(".env");
        if env_path.is_file()
            && let Err(e) = dotenvy::from_path(&env_path)
        {
            log::warn!("{}: {}", env_path.display(), e);
        }
        cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with a TOML document. Sections and keys are all optional.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SettingsToml = toml::from_str(s).context("invalid settings TOML")?;
        let mut cfg = Self::default();
        apply_file_to_config(&file, &mut cfg);
        Ok(cfg)
    }

    /// Apply `BLOBFLOW_*` overrides. `lookup` returns the raw value of a variable, if set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let paths = PackagePaths::get();
        let get = |key: &str| {
            lookup(&paths.env_var(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("SOURCE_ROOT") {
            self.source_root = PathBuf::from(v);
        }
        if let Some(v) = get("DESTINATION_PATH") {
            self.destination_path = PathBuf::from(v);
        }
        if let Some(v) = get("DATABASE") {
            self.database = v;
        }
        if let Some(v) = get("COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = get("DEGREE_OF_PARALLELISM") {
            self.degree_of_parallelism = v.parse().with_context(|| {
                format!(
                    "{} must be an integer, got '{}'",
                    paths.env_var("DEGREE_OF_PARALLELISM"),
                    v
                )
            })?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            bail!("destination database name is not configured");
        }
        if self.collection.is_empty() {
            bail!("destination collection name is not configured");
        }
        if self.degree_of_parallelism > WorkerLimits::MAX_OVERRIDE_WORKERS {
            bail!(
                "degree_of_parallelism {} exceeds the maximum of {}",
                self.degree_of_parallelism,
                WorkerLimits::MAX_OVERRIDE_WORKERS
            );
        }
        if self.max_page_size == 0 {
            bail!("max_page_size must be at least 1");
        }
        if self.connection_pool_size == 0 {
            bail!("connection_pool_size must be at least 1");
        }
        if self.record.customer_field.is_empty() || self.record.site_field.is_empty() {
            bail!("partition key field names must not be empty");
        }
        Ok(())
    }

    /// `None` when parallelism should be derived from throughput.
    pub fn parallelism_override(&self) -> Option<i64> {
        (self.degree_of_parallelism > 0).then_some(self.degree_of_parallelism)
    }

    /// Pipeline settings for this config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut pc = PipelineConfig::new(CollectionId::new(&self.database, &self.collection));
        pc.parallelism_override = self.parallelism_override();
        pc.estimated_objects_per_prefix = self.estimated_objects_per_prefix;
        pc.max_page_size = self.max_page_size;
        pc.list_retry = RetryPolicy {
            max_retries: self.list_max_retries,
            initial_backoff: Duration::from_millis(self.list_backoff_ms),
            ..pc.list_retry
        };
        pc.write_retry = RetryPolicy {
            max_retries: self.max_throttle_retries,
            max_total_wait: Some(Duration::from_secs(self.max_throttle_wait_secs)),
            ..pc.write_retry
        };
        pc.record = self.record.clone();
        pc
    }
}
