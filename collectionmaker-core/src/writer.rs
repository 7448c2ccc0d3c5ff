//! Batch submission with latency measurement

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::store::{CollectionHandle, DocumentStore, OverwriteMode};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-request deadline; a safety net against hung connections, not a
/// control path
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// Submits whole batches to one collection
#[derive(Debug)]
pub struct BatchWriter<S> {
    store: Arc<S>,
    collection: CollectionHandle,
    mode: OverwriteMode,
    deadline: Duration,
}

impl<S> Clone for BatchWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            mode: self.mode,
            deadline: self.deadline,
        }
    }
}

impl<S: DocumentStore> BatchWriter<S> {
    /// Writer using the ignore-on-conflict policy and the default deadline
    #[must_use]
    pub fn new(store: Arc<S>, collection: CollectionHandle) -> Self {
        Self {
            store,
            collection,
            mode: OverwriteMode::Ignore,
            deadline: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Override the overwrite policy
    #[must_use]
    pub fn with_overwrite_mode(mut self, mode: OverwriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Collection this writer targets
    #[must_use]
    pub const fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Submit `batch` as one request and return the submission latency.
    ///
    /// On success the buffer is emptied with its capacity kept. On failure the
    /// contents are left untouched and must not be resubmitted.
    pub async fn write(&self, batch: &mut Vec<Document>) -> StoreResult<Duration> {
        let start = Instant::now();
        let submit = self
            .store
            .submit_batch(&self.collection, batch.as_slice(), self.mode, self.deadline);
        let outcome = tokio::time::timeout(self.deadline, submit)
            .await
            .map_err(|_| StoreError::DeadlineExceeded(self.deadline))??;
        let elapsed = start.elapsed();

        if outcome.document_errors > 0 {
            tracing::warn!(
                collection = self.collection.name(),
                rejected = outcome.document_errors,
                submitted = outcome.submitted,
                "Store rejected documents in batch"
            );
        }
        batch.clear();
        Ok(elapsed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::DocumentGenerator;
    use crate::store::{BatchOutcome, InMemoryStore};
    use std::future::Future;

    struct HangingStore;

    impl DocumentStore for HangingStore {
        async fn open_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
            Ok(CollectionHandle::new(name))
        }

        async fn count(&self, _collection: &CollectionHandle) -> StoreResult<u64> {
            Ok(0)
        }

        fn submit_batch(
            &self,
            _collection: &CollectionHandle,
            _documents: &[Document],
            _mode: OverwriteMode,
            _deadline: Duration,
        ) -> impl Future<Output = StoreResult<BatchOutcome>> + Send {
            std::future::pending()
        }
    }

    #[tokio::test]
    async fn successful_write_clears_buffer_and_keeps_capacity() {
        let store = Arc::new(InMemoryStore::with_collection("c"));
        let writer = BatchWriter::new(Arc::clone(&store), CollectionHandle::new("c"));
        let generator = DocumentGenerator::new(1, 16, 8);
        let mut batch = Vec::with_capacity(16);
        generator.fill_batch(&mut rand::thread_rng(), 1, 1, &mut batch);

        writer.write(&mut batch).await.unwrap();

        assert!(batch.is_empty());
        assert!(batch.capacity() >= 16);
        assert_eq!(store.len("c"), 16);
    }

    #[tokio::test]
    async fn failed_write_leaves_buffer_and_reports_error() {
        let store = Arc::new(InMemoryStore::new());
        let writer = BatchWriter::new(store, CollectionHandle::new("missing"));
        let generator = DocumentGenerator::new(1, 4, 0);
        let mut batch = Vec::new();
        generator.fill_batch(&mut rand::thread_rng(), 1, 1, &mut batch);

        let err = writer.write(&mut batch).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
        assert_eq!(batch.len(), 4);
    }

    #[tokio::test]
    async fn overwrite_mode_is_forwarded() {
        let store = Arc::new(InMemoryStore::with_collection("c"));
        let generator = DocumentGenerator::new(1, 2, 8);
        let mut batch = Vec::new();
        generator.fill_batch(&mut rand::thread_rng(), 1, 1, &mut batch);
        let first = batch[0].clone();
        BatchWriter::new(Arc::clone(&store), CollectionHandle::new("c"))
            .write(&mut batch)
            .await
            .unwrap();

        generator.fill_batch(&mut rand::thread_rng(), 1, 1, &mut batch);
        let second = batch[0].clone();
        let writer = BatchWriter::new(Arc::clone(&store), CollectionHandle::new("c"))
            .with_overwrite_mode(OverwriteMode::Replace);
        assert_eq!(writer.collection().name(), "c");
        writer.write(&mut batch).await.unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(store.get("c", &first.key).unwrap().payload, second.payload);
        assert_eq!(store.len("c"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_hung_submission() {
        let writer = BatchWriter::new(Arc::new(HangingStore), CollectionHandle::new("c"))
            .with_deadline(Duration::from_secs(5));
        let mut batch = Vec::new();

        let err = writer.write(&mut batch).await.unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded(d) if d == Duration::from_secs(5)));
    }
}
