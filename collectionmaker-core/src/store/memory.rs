//! In-process store backed by concurrent maps

use super::{BatchOutcome, CollectionHandle, DocumentStore, OverwriteMode};
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;

/// Store that keeps every collection in memory.
///
/// Used for client-side dry runs and tests. All four overwrite modes behave
/// like the document API: conflicts are counted per document, never fatal.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: DashMap<String, DashMap<String, Document>>,
}

impl InMemoryStore {
    /// Empty store without collections
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one empty collection
    #[must_use]
    pub fn with_collection(name: &str) -> Self {
        let store = Self::new();
        store.create_collection(name);
        store
    }

    /// Create a collection; returns `false` if it already existed
    pub fn create_collection(&self, name: &str) -> bool {
        match self.collections.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(DashMap::new());
                true
            }
        }
    }

    /// Fetch a stored document
    #[must_use]
    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(key).map(|doc| doc.value().clone()))
    }

    /// Number of documents in a collection, zero if it does not exist
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    /// True if the collection is missing or empty
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl DocumentStore for InMemoryStore {
    async fn open_collection(&self, name: &str) -> StoreResult<CollectionHandle> {
        if self.collections.contains_key(name) {
            Ok(CollectionHandle::new(name))
        } else {
            Err(StoreError::CollectionNotFound(name.to_string()))
        }
    }

    async fn count(&self, collection: &CollectionHandle) -> StoreResult<u64> {
        self.collections
            .get(collection.name())
            .map(|docs| docs.len() as u64)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.name().to_string()))
    }

    async fn submit_batch(
        &self,
        collection: &CollectionHandle,
        documents: &[Document],
        mode: OverwriteMode,
        _deadline: Duration,
    ) -> StoreResult<BatchOutcome> {
        let docs = self
            .collections
            .get(collection.name())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.name().to_string()))?;

        let mut outcome = BatchOutcome {
            submitted: documents.len(),
            document_errors: 0,
        };
        for doc in documents {
            match docs.entry(doc.key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(doc.clone());
                }
                Entry::Occupied(mut existing) => match mode {
                    OverwriteMode::Error => outcome.document_errors += 1,
                    OverwriteMode::Ignore => {}
                    OverwriteMode::Replace => {
                        existing.insert(doc.clone());
                    }
                    OverwriteMode::Update => {
                        let stored = existing.get_mut();
                        stored.content_tag.clone_from(&doc.content_tag);
                        stored.payload.clone_from(&doc.payload);
                    }
                },
            }
        }
        Ok(outcome)
    }
}
