//! Shared doubles for integration tests: in-memory source and scripted destinations.

#![allow(dead_code)]

use blobflow::engine::record::IngestDocument;
use blobflow::engine::retry::RetryPolicy;
use blobflow::store::{DocumentStore, SourceStore};
use blobflow::{
    CollectionId, ContinuationCursor, IngestError, ListingPage, SourceError, SourceObjectRef,
    ThroughputBudget, WriteError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

pub fn collection() -> CollectionId {
    CollectionId::new("telemetry", "readings")
}

/// Retry policy that never sleeps long enough to slow a test down.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        max_total_wait: None,
    }
}

pub fn record_json(custid: &str, siteid: &str, extra: &str) -> Vec<u8> {
    format!(r#"{{"custid":"{custid}","siteid":"{siteid}","value":"{extra}"}}"#).into_bytes()
}

/// In-memory source: objects keyed by `prefix/name`, listed in key order.
#[derive(Default)]
pub struct MemorySource {
    pub objects: BTreeMap<String, Vec<u8>>,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    /// Transient listing failures to return before succeeding.
    pub transient_list_failures: AtomicU32,
    /// Every listing fails permanently.
    pub fail_listing: bool,
    /// Listings after the first `n` calls fail permanently.
    pub fail_after_calls: Option<usize>,
    /// Names (below the prefix) whose download fails.
    pub broken_downloads: Vec<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, prefix: &str, name: &str, body: Vec<u8>) -> Self {
        self.objects.insert(format!("{prefix}/{name}"), body);
        self
    }

    /// `count` valid records under `prefix`, named `obj-00000.json` onwards.
    pub fn with_records(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            self.objects.insert(
                format!("{prefix}/obj-{i:05}.json"),
                record_json(&format!("c{}", i % 3), "s1", &i.to_string()),
            );
        }
        self
    }

    pub fn with_transient_list_failures(self, n: u32) -> Self {
        self.transient_list_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl SourceStore for MemorySource {
    fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&ContinuationCursor>,
        max_items: usize,
    ) -> Result<ListingPage, SourceError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_listing || self.fail_after_calls.is_some_and(|n| call > n) {
            return Err(SourceError::Fatal("listing denied".into()));
        }
        let pending = self.transient_list_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_list_failures.store(pending - 1, Ordering::SeqCst);
            return Err(SourceError::Transient("connection reset".into()));
        }
        let dir = format!("{prefix}/");
        let names: Vec<&str> = self
            .objects
            .keys()
            .filter_map(|k| k.strip_prefix(&dir))
            .filter(|n| cursor.is_none_or(|c| *n > c.as_str()))
            .collect();
        let taken: Vec<&str> = names.iter().take(max_items).copied().collect();
        let continuation = (names.len() > taken.len())
            .then(|| ContinuationCursor::new(*taken.last().unwrap_or(&"")));
        Ok(ListingPage {
            items: taken
                .into_iter()
                .map(|n| SourceObjectRef::new(prefix, n))
                .collect(),
            continuation,
        })
    }

    fn download(&self, object: &SourceObjectRef) -> Result<Vec<u8>, SourceError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_downloads.contains(&object.name) {
            return Err(SourceError::Fatal(format!("{} is unreadable", object.key())));
        }
        self.objects
            .get(&object.key())
            .cloned()
            .ok_or_else(|| SourceError::Fatal(format!("{} not found", object.key())))
    }
}

/// How a [`MemoryDestination`] answers writes.
#[derive(Clone, Copy, Debug)]
pub enum WriteMode {
    Accept,
    /// Throttle the first `n` attempts of every document, then accept.
    ThrottleFirst(u32),
    ThrottleAlways,
    Reject,
}

/// In-memory destination recording documents by `(partition_key, id)`.
pub struct MemoryDestination {
    pub throughput: Result<u32, String>,
    pub mode: WriteMode,
    pub docs: Mutex<HashMap<(String, String), IngestDocument>>,
    pub write_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    attempts: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MemoryDestination {
    pub fn new(throughput: u32) -> Self {
        Self {
            throughput: Ok(throughput),
            mode: WriteMode::Accept,
            docs: Mutex::new(HashMap::new()),
            write_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Destination whose collection cannot be found.
    pub fn missing() -> Self {
        Self {
            throughput: Err("collection not found".into()),
            ..Self::new(0)
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn doc_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryDestination {
    fn provisioned_throughput(
        &self,
        _collection: &CollectionId,
    ) -> Result<ThroughputBudget, IngestError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.throughput
            .clone()
            .map(ThroughputBudget)
            .map_err(IngestError::Configuration)
    }

    fn upsert(&self, _collection: &CollectionId, doc: &IngestDocument) -> Result<(), WriteError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(1));
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(doc.id.clone()).or_insert(0);
            *n += 1;
            *n
        };
        let result = match self.mode {
            WriteMode::Accept => Ok(()),
            WriteMode::ThrottleFirst(n) if attempt <= n => {
                Err(WriteError::Throttled { retry_after: None })
            }
            WriteMode::ThrottleFirst(_) => Ok(()),
            WriteMode::ThrottleAlways => Err(WriteError::Throttled {
                retry_after: Some(Duration::from_millis(1)),
            }),
            WriteMode::Reject => Err(WriteError::Rejected("document too large".into())),
        };
        if result.is_ok() {
            self.docs
                .lock()
                .unwrap()
                .insert((doc.partition_key.clone(), doc.id.clone()), doc.clone());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
