//! End-to-end runs of the coordinator against in-process stores
//!
//! Covers the documented run shapes: normal completion, single-sample
//! statistics, and failing stores with and without sibling workers.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use collectionmaker_core::document::{DocumentGenerator, document_key, global_index};
use collectionmaker_core::progress::SharedBuffer;
use collectionmaker_core::store::{BatchOutcome, CollectionHandle, DocumentStore, OverwriteMode};
use collectionmaker_core::{
    BenchConfig, BenchError, Document, InMemoryStore, ProgressSink, StoreError, StoreResult,
    WorkerCoordinator, WorkerState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Wraps the in-memory store and fails selected submissions
struct FlakyStore {
    inner: InMemoryStore,
    calls: AtomicU64,
    fail_from_call: u64,
    fail_count: u64,
}

impl FlakyStore {
    /// Fail `count` consecutive calls starting at 1-based call `from`
    fn failing(from: u64, count: u64) -> Self {
        Self {
            inner: InMemoryStore::with_collection("batchimport"),
            calls: AtomicU64::new(0),
            fail_from_call: from,
            fail_count: count,
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentStore for FlakyStore {
    async fn open_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        self.inner.open_collection(name).await
    }

    async fn count(&self, collection: &CollectionHandle) -> StoreResult<u64> {
        self.inner.count(collection).await
    }

    async fn submit_batch(
        &self,
        collection: &CollectionHandle,
        documents: &[Document],
        mode: OverwriteMode,
        deadline: Duration,
    ) -> StoreResult<BatchOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from_call && call < self.fail_from_call + self.fail_count {
            return Err(StoreError::Rejected(format!("injected failure on call {call}")));
        }
        self.inner
            .submit_batch(collection, documents, mode, deadline)
            .await
    }
}

fn shape(parallelism: u64, batches: u64, batch_size: u64) -> BenchConfig {
    BenchConfig {
        parallelism,
        batches_per_worker: batches,
        batch_size,
        payload_size: 16,
        start_delay_ms: 0,
        ..BenchConfig::default()
    }
}

#[tokio::test]
async fn two_workers_write_thirty_documents() {
    let store = Arc::new(InMemoryStore::with_collection("batchimport"));
    let output = SharedBuffer::new();
    let coordinator = WorkerCoordinator::new(Arc::clone(&store), ProgressSink::new(output.clone()));

    let report = coordinator.run(&shape(2, 3, 5)).await.unwrap();

    assert_eq!(report.result.total_documents, 30);
    assert!(!report.result.any_worker_failed);
    assert_eq!(store.len("batchimport"), 30);
    for worker in &report.workers {
        assert_eq!(worker.state, WorkerState::Completed);
        assert_eq!(worker.samples.len(), 3);
        assert_eq!(worker.documents_attempted, 15);
    }
    assert_eq!(report.overall.unwrap().samples, 6);

    // keys land exactly where the generator says they should
    let generator = DocumentGenerator::new(3, 5, 0);
    let expected = generator.generate(&mut rand::thread_rng(), 2, 3, 5);
    assert_eq!(expected.key, document_key(global_index(2, 3, 5, 3, 5)));
    assert!(store.get("batchimport", &expected.key).is_some());

    let contents = output.contents();
    assert!(contents.contains("Total number of documents written: 30"));
    assert_eq!(contents.matches("Times for 3 batches").count(), 2);
    // run-level latency line comes after the totals and covers all six batches
    let lines = output.lines();
    let totals = lines
        .iter()
        .position(|l| l.starts_with("Total number of documents written"))
        .unwrap();
    assert!(lines[totals + 1].starts_with("All batches: "));
    assert!(lines[totals + 1].ends_with("6 samples"));

    let result = report.into_result().unwrap();
    assert_eq!(result.total_documents, 30);
}

#[tokio::test]
async fn single_batch_single_document_statistics() {
    let store = Arc::new(InMemoryStore::with_collection("batchimport"));
    let coordinator = WorkerCoordinator::new(store, ProgressSink::discard());

    let report = coordinator.run(&shape(1, 1, 1)).await.unwrap();

    let worker = &report.workers[0];
    let stats = worker.stats.unwrap();
    assert_eq!(worker.samples.len(), 1);
    assert_eq!(stats.median, worker.samples[0]);
    assert_eq!(stats.p90, worker.samples[0]);
    assert_eq!(stats.p99, worker.samples[0]);
}

#[tokio::test]
async fn store_failing_immediately_marks_run_failed() {
    let store = Arc::new(FlakyStore::failing(1, u64::MAX / 2));
    let output = SharedBuffer::new();
    let coordinator = WorkerCoordinator::new(Arc::clone(&store), ProgressSink::new(output.clone()));

    let report = coordinator.run(&shape(1, 4, 10)).await.unwrap();

    assert!(report.result.any_worker_failed);
    assert_eq!(report.result.total_documents, 40);
    assert_eq!(report.workers[0].batches_completed, 0);
    assert_eq!(store.calls(), 1);
    assert!(output.contents().contains("could not write batch 1"));
    assert!(!output.contents().contains("All batches"));

    match report.into_result() {
        Err(BenchError::WorkersFailed { failures, .. }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].batch_index, 1);
            assert!(failures[0].message.contains("injected failure"));
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_stops_at_the_failing_batch() {
    // third submission fails; later batches must never be attempted
    let store = Arc::new(FlakyStore::failing(3, 1));
    let coordinator = WorkerCoordinator::new(Arc::clone(&store), ProgressSink::discard());

    let report = coordinator.run(&shape(1, 10, 2)).await.unwrap();

    let worker = &report.workers[0];
    assert_eq!(worker.state, WorkerState::Failed);
    assert_eq!(worker.batches_completed, 2);
    assert_eq!(worker.samples.len(), 2);
    assert_eq!(worker.documents_attempted, 6);
    assert_eq!(store.calls(), 3);
    assert_eq!(store.inner.len("batchimport"), 4);
    assert_eq!(worker.failure.as_ref().unwrap().batch_index, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failure_does_not_cancel_siblings() {
    let store = Arc::new(FlakyStore::failing(1, 1));
    let coordinator = WorkerCoordinator::new(Arc::clone(&store), ProgressSink::discard());

    let report = coordinator.run(&shape(3, 5, 4)).await.unwrap();

    let failed: Vec<_> = report.workers.iter().filter(|w| w.failed()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].batches_completed, 0);
    for worker in report.workers.iter().filter(|w| !w.failed()) {
        assert_eq!(worker.batches_completed, 5);
    }
    // 1 failed call + 2 workers * 5 batches
    assert_eq!(store.calls(), 11);
    assert_eq!(store.inner.len("batchimport"), 40);
    assert!(report.result.any_worker_failed);
    assert_eq!(report.result.total_documents, 60);
}

#[tokio::test]
async fn rerun_with_same_shape_hits_same_keys() {
    let store = Arc::new(InMemoryStore::with_collection("batchimport"));
    let coordinator = WorkerCoordinator::new(Arc::clone(&store), ProgressSink::discard());

    coordinator.run(&shape(2, 2, 3)).await.unwrap().into_result().unwrap();
    coordinator.run(&shape(2, 2, 3)).await.unwrap().into_result().unwrap();

    // ignore-on-conflict: second run adds nothing
    assert_eq!(store.len("batchimport"), 12);
}
