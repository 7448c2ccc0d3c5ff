//! One benchmark worker: generate, write, record, repeat

use crate::config::BenchConfig;
use crate::document::{Document, DocumentGenerator};
use crate::error::WorkerFailure;
use crate::latency::{LatencyRecorder, LatencyStats};
use crate::progress::ProgressSink;
use crate::report;
use crate::store::DocumentStore;
use crate::writer::BatchWriter;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Upper bound on samples reserved up front; the recorder grows past it
const MAX_PREALLOCATED_SAMPLES: usize = 1 << 16;

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, not yet dispatched
    Idle,
    /// Submitting batches
    Running,
    /// All batches written
    Completed,
    /// Stopped on the first write error
    Failed,
}

/// What a finished worker hands back to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    /// 1-based worker id
    pub worker_id: u64,
    /// `Completed` or `Failed`
    pub state: WorkerState,
    /// Batches written successfully
    pub batches_completed: u64,
    /// Documents sent to the store, including a failed batch
    pub documents_attempted: u64,
    /// Worker wall clock from first generation to exit
    pub elapsed: Duration,
    /// Latency summary, present when the worker completed
    pub stats: Option<LatencyStats>,
    /// Why the worker stopped early
    pub failure: Option<WorkerFailure>,
    /// Raw batch latencies in submission order
    #[serde(skip)]
    pub samples: Vec<Duration>,
}

impl WorkerReport {
    /// Report for a worker whose task never returned (panicked or was
    /// cancelled by the runtime)
    #[must_use]
    pub fn aborted(worker_id: u64, message: String) -> Self {
        Self {
            worker_id,
            state: WorkerState::Failed,
            batches_completed: 0,
            documents_attempted: 0,
            elapsed: Duration::ZERO,
            stats: None,
            failure: Some(WorkerFailure {
                worker_id,
                batch_index: 0,
                batches_completed: 0,
                message,
            }),
            samples: Vec::new(),
        }
    }

    /// True if the worker stopped early
    #[must_use]
    pub fn failed(&self) -> bool {
        self.state == WorkerState::Failed
    }
}

/// Sequential batch loop owned by one concurrent task
pub struct WorkerTask<S> {
    id: u64,
    batch_count: u64,
    documents_per_worker: u64,
    progress_every: u64,
    generator: DocumentGenerator,
    writer: BatchWriter<S>,
    sink: ProgressSink,
    state: WorkerState,
    recorder: LatencyRecorder,
    buffer: Vec<Document>,
}

impl<S: DocumentStore> WorkerTask<S> {
    /// Idle worker for the given run shape
    #[must_use]
    pub fn new(id: u64, config: &BenchConfig, writer: BatchWriter<S>, sink: ProgressSink) -> Self {
        let samples = usize::try_from(config.batches_per_worker)
            .map_or(MAX_PREALLOCATED_SAMPLES, |n| n.min(MAX_PREALLOCATED_SAMPLES));
        Self {
            id,
            batch_count: config.batches_per_worker,
            documents_per_worker: config.documents_per_worker(),
            progress_every: config.progress_every.max(1),
            generator: DocumentGenerator::new(
                config.batches_per_worker,
                config.batch_size,
                config.payload_size,
            ),
            writer,
            sink,
            state: WorkerState::Idle,
            recorder: LatencyRecorder::with_capacity(samples),
            buffer: Vec::with_capacity(usize::try_from(config.batch_size).unwrap_or(0)),
        }
    }

    /// Worker id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// Run every batch, stopping at the first write error
    pub async fn run(mut self) -> WorkerReport {
        self.state = WorkerState::Running;
        tracing::info!(worker = self.id, batches = self.batch_count, "Worker started");
        self.sink.line(format!("Starting worker {}...", self.id));

        let mut rng = StdRng::from_entropy();
        let batch_size = self.generator.batch_size();
        let started = Instant::now();
        let mut failure = None;
        let mut attempted = 0u64;

        for batch_index in 1..=self.batch_count {
            self.generator
                .fill_batch(&mut rng, self.id, batch_index, &mut self.buffer);
            attempted += batch_size;

            match self.writer.write(&mut self.buffer).await {
                Ok(latency) => {
                    self.recorder.record(latency);
                    tracing::debug!(worker = self.id, batch = batch_index, ?latency, "Batch written");
                }
                Err(err) => {
                    self.buffer.clear();
                    tracing::warn!(
                        worker = self.id,
                        batch = batch_index,
                        error = %err,
                        "Batch write failed, worker stopping"
                    );
                    self.sink.line(format!(
                        "Worker {}: could not write batch {}: {}",
                        self.id, batch_index, err
                    ));
                    failure = Some(WorkerFailure {
                        worker_id: self.id,
                        batch_index,
                        batches_completed: self.recorder.len() as u64,
                        message: err.to_string(),
                    });
                    break;
                }
            }

            if batch_index % self.progress_every == 0 {
                self.sink.batches_imported(self.id, batch_index);
            }
        }

        let elapsed = started.elapsed();
        let batches_completed = self.recorder.len() as u64;
        let stats = if failure.is_none() {
            self.state = WorkerState::Completed;
            let stats = self
                .recorder
                .summarize(self.documents_per_worker, elapsed);
            if let Some(stats) = &stats {
                self.sink
                    .line(report::worker_summary(self.id, batches_completed, stats));
            }
            stats
        } else {
            self.state = WorkerState::Failed;
            None
        };

        tracing::info!(
            worker = self.id,
            state = ?self.state,
            batches_completed,
            elapsed_secs = elapsed.as_secs_f64(),
            "Worker finished"
        );
        self.sink.line(format!("Worker {} done", self.id));

        WorkerReport {
            worker_id: self.id,
            state: self.state,
            batches_completed,
            documents_attempted: attempted,
            elapsed,
            stats,
            failure,
            samples: self.recorder.into_samples(),
        }
    }
}
