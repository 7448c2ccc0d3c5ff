//! Run parameters

use crate::error::{BenchError, BenchResult};
use crate::writer::DEFAULT_REQUEST_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shape and pacing of one benchmark run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Concurrent workers
    pub parallelism: u64,
    /// Batches each worker submits
    pub batches_per_worker: u64,
    /// Pause before each worker is dispatched, in milliseconds
    pub start_delay_ms: u64,
    /// Payload bytes per document
    pub payload_size: usize,
    /// Documents per batch
    pub batch_size: u64,
    /// Target collection
    pub collection: String,
    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,
    /// Emit a progress line every this many batches
    pub progress_every: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            batches_per_worker: 1_000_000,
            start_delay_ms: 5,
            payload_size: 10,
            batch_size: 10_000,
            collection: "batchimport".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            progress_every: 100,
        }
    }
}

impl BenchConfig {
    /// Stagger between dispatches
    #[must_use]
    pub const fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Per-request deadline
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Documents the run attempts to write across all workers
    #[must_use]
    pub const fn total_documents(&self) -> u64 {
        self.parallelism
            .saturating_mul(self.batches_per_worker)
            .saturating_mul(self.batch_size)
    }

    /// Documents one worker attempts to write
    #[must_use]
    pub const fn documents_per_worker(&self) -> u64 {
        self.batches_per_worker.saturating_mul(self.batch_size)
    }

    /// Reject out-of-range parameters
    pub fn validate(&self) -> BenchResult<()> {
        let checks = [
            (self.parallelism >= 1, "parallelism must be at least 1"),
            (
                self.batches_per_worker >= 1,
                "batches per worker must be at least 1",
            ),
            (self.batch_size >= 1, "batch size must be at least 1"),
            (
                self.request_timeout_secs >= 1,
                "request timeout must be at least 1 second",
            ),
            (self.progress_every >= 1, "progress interval must be at least 1"),
            (!self.collection.is_empty(), "collection name must not be empty"),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(BenchError::InvalidConfig(message.to_string()));
            }
        }

        // Highest global index must fit in u64
        self.parallelism
            .checked_add(1)
            .and_then(|w| w.checked_mul(self.batches_per_worker))
            .and_then(|b| b.checked_mul(self.batch_size))
            .map(|_| ())
            .ok_or_else(|| {
                BenchError::InvalidConfig("run shape overflows the document index space".to_string())
            })
    }
}
