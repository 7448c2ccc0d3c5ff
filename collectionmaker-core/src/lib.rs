//! Concurrent batch-import benchmark for document stores
//!
//! A [`WorkerCoordinator`] dispatches a fixed number of workers with a serial
//! start stagger. Each worker repeatedly fills a reusable batch with
//! deterministic-key documents, submits it through a [`BatchWriter`], and
//! records the submission latency. After every worker has joined, the
//! per-worker reports are reduced into a [`RunReport`].

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod latency;
pub mod progress;
pub mod report;
pub mod store;
pub mod worker;
pub mod writer;

pub use config::BenchConfig;
pub use coordinator::WorkerCoordinator;
pub use document::{Document, DocumentGenerator};
pub use error::{BenchError, BenchResult, StoreError, StoreResult, WorkerFailure};
pub use latency::{LatencyRecorder, LatencyStats};
pub use progress::ProgressSink;
pub use report::{RunReport, RunResult};
pub use store::{
    BatchOutcome, CollectionHandle, CollectionOptions, ConnectionConfig, DocumentStore,
    HttpDocumentStore, InMemoryStore, OverwriteMode,
};
pub use worker::{WorkerReport, WorkerState, WorkerTask};
pub use writer::BatchWriter;
