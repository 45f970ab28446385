//! End-to-end runs through the orchestrator state machine.

mod common;

use blobflow::pipeline::PipelineOrchestrator;
use blobflow::store::{DocumentStore, SqliteDocumentStore};
use blobflow::utils::config::DatabaseConsts;
use blobflow::{IngestError, PipelineConfig, RunOutcome, RunState};
use common::{MemoryDestination, MemorySource, collection, fast_retry};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn config() -> PipelineConfig {
    let mut c = PipelineConfig::new(collection());
    c.list_retry = fast_retry(2);
    c.write_retry = fast_retry(3);
    c
}

fn prefixes(days: &[&str]) -> Vec<String> {
    days.iter().map(|d| d.to_string()).collect()
}

#[test]
fn test_single_day_end_to_end() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 3));
    let dest = Arc::new(MemoryDestination::new(5000));
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), config());
    assert_eq!(orch.state(), RunState::Idle);

    let outcome = orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(
        outcome,
        RunOutcome {
            attempted: 3,
            succeeded: 3,
            failed: 0
        }
    );
    assert_eq!(orch.state(), RunState::Completed);
    assert!(orch.state().is_terminal());
    assert_eq!(orch.worker_budget().map(|b| b.get()), Some(5));
    assert_eq!(dest.doc_count(), 3);
    for doc in dest.docs.lock().unwrap().values() {
        assert_eq!(doc.body.get("partitionKey"), Some(&doc.partition_key.clone().into()));
    }
}

#[test]
fn test_probe_failure_fails_before_listing() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 3));
    let dest = Arc::new(MemoryDestination::missing());
    let mut orch = PipelineOrchestrator::new(source.clone(), dest.clone(), config());
    let err = orch.run(&prefixes(&["20170101"])).unwrap_err();
    assert!(matches!(err, IngestError::Configuration(_)));
    assert_eq!(orch.state(), RunState::Failed);
    assert!(orch.worker_budget().is_none());
    assert_eq!(source.list_calls(), 0);
    assert_eq!(dest.write_calls(), 0);
}

#[test]
fn test_probe_runs_once_for_a_date_range() {
    let source = Arc::new(
        MemorySource::new()
            .with_records("20170101", 4)
            .with_records("20170102", 2)
            .with_records("20170104", 5),
    );
    let dest = Arc::new(MemoryDestination::new(2000));
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), config());
    let outcome = orch
        .run(&prefixes(&["20170101", "20170102", "20170103", "20170104"]))
        .unwrap();
    assert_eq!(outcome.attempted, 11);
    assert_eq!(outcome.succeeded, 11);
    assert_eq!(dest.probe_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_item_failures_do_not_fail_the_run() {
    let source = Arc::new(
        MemorySource::new()
            .with_records("20170101", 6)
            .with_object("20170101", "zz-bad.json", b"[1,2,3]".to_vec()),
    );
    let dest = Arc::new(MemoryDestination::new(3000));
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), config());
    let outcome = orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(outcome.attempted, 7);
    assert_eq!(outcome.succeeded, 6);
    assert_eq!(outcome.failed, 1);
    assert_eq!(orch.state(), RunState::Completed);
}

#[test]
fn test_many_pages_with_small_page_size() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 50));
    let dest = Arc::new(MemoryDestination::new(4000));
    let mut c = config();
    c.estimated_objects_per_prefix = 12;
    let mut orch = PipelineOrchestrator::new(source.clone(), dest.clone(), c);
    let outcome = orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(outcome.succeeded, 50);
    // 12 estimated / 4 workers = pages of 3.
    assert_eq!(source.list_calls(), 17);
    assert!(dest.peak_in_flight.load(Ordering::SeqCst) <= 4);
}

#[test]
fn test_enumeration_failure_drains_and_fails() {
    let source = Arc::new(MemorySource {
        fail_listing: true,
        ..MemorySource::new()
    });
    let dest = Arc::new(MemoryDestination::new(1000));
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), config());
    let err = orch.run(&prefixes(&["20170101"])).unwrap_err();
    assert!(matches!(err, IngestError::Enumeration { .. }));
    assert_eq!(orch.state(), RunState::Failed);
    assert_eq!(dest.write_calls(), 0);
}

#[test]
fn test_enumeration_failure_after_first_page_drains_dispatched_work() {
    let source = Arc::new(MemorySource {
        fail_after_calls: Some(1),
        ..MemorySource::new().with_records("20170101", 12)
    });
    let dest = Arc::new(MemoryDestination::new(1000));
    let mut c = config();
    // One worker, pages of 5.
    c.estimated_objects_per_prefix = 5;
    let mut orch = PipelineOrchestrator::new(source.clone(), dest.clone(), c);
    let err = orch.run(&prefixes(&["20170101"])).unwrap_err();
    assert!(matches!(err, IngestError::Enumeration { .. }));
    assert_eq!(orch.state(), RunState::Failed);
    assert_eq!(dest.write_calls(), 5);
    assert_eq!(dest.doc_count(), 5);
    let docs = dest.docs.lock().unwrap();
    for i in 0..5 {
        let id = format!("20170101/obj-{i:05}.json");
        assert!(docs.keys().any(|(_, doc_id)| *doc_id == id), "{id} not written");
    }
}

#[test]
fn test_oversized_parallelism_override_fails_before_probe() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 2));
    let dest = Arc::new(MemoryDestination::new(1000));
    let mut c = config();
    c.parallelism_override = Some(i64::MAX);
    let mut orch = PipelineOrchestrator::new(source.clone(), dest.clone(), c);
    let err = orch.run(&prefixes(&["20170101"])).unwrap_err();
    assert!(matches!(err, IngestError::Configuration(_)));
    assert_eq!(orch.state(), RunState::Failed);
    assert!(orch.worker_budget().is_none());
    assert_eq!(dest.probe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.list_calls(), 0);
}

#[test]
fn test_override_within_ceiling_is_used_verbatim() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 3));
    let dest = Arc::new(MemoryDestination::new(1000));
    let mut c = config();
    c.parallelism_override = Some(64);
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), c);
    assert_eq!(orch.run(&prefixes(&["20170101"])).unwrap().succeeded, 3);
    assert_eq!(orch.worker_budget().map(|b| b.get()), Some(64));
}

#[test]
fn test_parallelism_override_wins() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 4));
    let dest = Arc::new(MemoryDestination::new(250_000));
    let mut c = config();
    c.parallelism_override = Some(2);
    let mut orch = PipelineOrchestrator::new(source, dest, c);
    orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(orch.worker_budget().map(|b| b.get()), Some(2));
}

#[test]
fn test_rerun_is_idempotent() {
    let source = Arc::new(MemorySource::new().with_records("20170101", 5));
    let dest = Arc::new(MemoryDestination::new(1000));
    let mut orch = PipelineOrchestrator::new(source, dest.clone(), config());
    orch.run(&prefixes(&["20170101"])).unwrap();
    let second = orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(second.succeeded, 5);
    assert_eq!(dest.doc_count(), 5);
    assert_eq!(dest.write_calls(), 10);
}

#[test]
fn test_end_to_end_into_sqlite() {
    let tmp = tempfile::tempdir().unwrap();
    let day = tmp.path().join("blobs").join("20170101");
    std::fs::create_dir_all(&day).unwrap();
    std::fs::write(day.join("a.json"), br#"{"custid":"c1","siteid":"s1","v":1}"#).unwrap();
    std::fs::write(day.join("b.json"), br#"{"id":"fixed","custid":7,"siteid":"s2"}"#).unwrap();
    std::fs::write(day.join("c.json"), br#"{"custid":"c1"}"#).unwrap();

    let store = SqliteDocumentStore::open_in_memory().unwrap();
    store
        .create_collection(&collection(), DatabaseConsts::DEFAULT_PARTITION_KEY_PATH, Some(5000))
        .unwrap();
    let store = Arc::new(store);
    let source = Arc::new(blobflow::store::FsSourceStore::new(tmp.path(), "blobs"));
    let mut orch = PipelineOrchestrator::new(source, store.clone(), config());
    let outcome = orch.run(&prefixes(&["20170101"])).unwrap();
    assert_eq!(
        outcome,
        RunOutcome {
            attempted: 3,
            succeeded: 2,
            failed: 1
        }
    );
    assert_eq!(store.document_count(&collection()).unwrap(), 2);
    let doc = store
        .get_document(&collection(), "7_s2", "fixed")
        .unwrap()
        .unwrap();
    assert_eq!(doc.get("partitionKey"), Some(&"7_s2".into()));
    assert!(
        store
            .get_document(&collection(), "c1_s1", "20170101/a.json")
            .unwrap()
            .is_some()
    );
    assert!(store.provisioned_throughput(&collection()).is_ok());
}
