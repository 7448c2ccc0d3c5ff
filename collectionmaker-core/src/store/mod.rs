//! Document store abstraction consumed by the benchmark engine
//!
//! The engine only needs three operations: open a collection, count it, and
//! submit a batch. Connection bootstrap and provisioning live with the concrete
//! backends.

use crate::document::Document;
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub mod http;
pub mod memory;

pub use http::{CollectionOptions, ConnectionConfig, HttpDocumentStore};
pub use memory::InMemoryStore;

/// Server-side behaviour when a submitted key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Report a per-document conflict
    Error,
    /// Silently skip the document
    #[default]
    Ignore,
    /// Replace the stored document
    Replace,
    /// Merge the submitted fields into the stored document
    Update,
}

impl OverwriteMode {
    /// Query-string value understood by the document API
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "conflict",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
            Self::Update => "update",
        }
    }
}

/// An opened collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: String,
}

impl CollectionHandle {
    /// Wrap a collection name that the store has confirmed to exist
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-request result of a batch submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Documents sent in the request
    pub submitted: usize,
    /// Documents the store rejected individually
    pub document_errors: usize,
}

/// Store client shared by all workers of a run
pub trait DocumentStore: Send + Sync + 'static {
    /// Resolve a collection by name
    fn open_collection(
        &self,
        name: &str,
    ) -> impl Future<Output = StoreResult<CollectionHandle>> + Send;

    /// Current number of documents in a collection
    fn count(&self, collection: &CollectionHandle) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Submit one batch as a single request
    fn submit_batch(
        &self,
        collection: &CollectionHandle,
        documents: &[Document],
        mode: OverwriteMode,
        deadline: Duration,
    ) -> impl Future<Output = StoreResult<BatchOutcome>> + Send;
}
