//! Error types for store access and benchmark runs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// The named collection does not exist
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// The named database does not exist
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),

    /// Endpoint list was empty or an endpoint could not be parsed
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Endpoint as given by the caller
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network or protocol failure before a response was received
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("server returned {status} for {url}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Error message reported by the server, if any
        message: String,
    },

    /// Submission did not finish within its deadline
    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Response body did not have the expected shape
    #[error("malformed response from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// What was wrong with the body
        reason: String,
    },

    /// Backend refused the request for a backend-specific reason
    #[error("{0}")]
    Rejected(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One worker that stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    /// 1-based worker id
    pub worker_id: u64,
    /// 1-based index of the batch whose submission failed
    pub batch_index: u64,
    /// Batches that were written before the failure
    pub batches_completed: u64,
    /// Rendered store error
    pub message: String,
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "worker {} failed on batch {} after {} completed batches: {}",
            self.worker_id, self.batch_index, self.batches_completed, self.message
        )
    }
}

/// Errors surfaced by a benchmark run
#[derive(Error, Debug)]
pub enum BenchError {
    /// Run parameters are out of range
    #[error("invalid benchmark configuration: {0}")]
    InvalidConfig(String),

    /// Target collection could not be opened before dispatch
    #[error("cannot open collection '{name}': {source}")]
    CollectionUnavailable {
        /// Collection name
        name: String,
        /// Store error
        #[source]
        source: StoreError,
    },

    /// At least one worker stopped on a write error
    #[error("{} of {parallelism} workers failed; first: {}", failures.len(), first_failure(failures))]
    WorkersFailed {
        /// Number of dispatched workers
        parallelism: u64,
        /// Every failed worker, ordered by worker id
        failures: Vec<WorkerFailure>,
    },
}

fn first_failure(failures: &[WorkerFailure]) -> String {
    failures
        .first()
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

/// Result type for benchmark runs
pub type BenchResult<T> = Result<T, BenchError>;
