//! Dispatches workers, waits for all of them, and reduces their reports

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::progress::ProgressSink;
use crate::report::{self, RunReport};
use crate::store::DocumentStore;
use crate::worker::{WorkerReport, WorkerTask};
use crate::writer::BatchWriter;
use std::sync::Arc;
use std::time::Instant;

/// Launches one task per worker against a shared store
pub struct WorkerCoordinator<S> {
    store: Arc<S>,
    sink: ProgressSink,
}

impl<S: DocumentStore> WorkerCoordinator<S> {
    /// Coordinator writing human-facing output to `sink`
    #[must_use]
    pub fn new(store: Arc<S>, sink: ProgressSink) -> Self {
        Self { store, sink }
    }

    /// Execute one run.
    ///
    /// Fails early only for configuration problems. Worker failures do not
    /// cancel siblings; they are collected in the returned report once every
    /// worker has finished (see [`RunReport::into_result`]).
    pub async fn run(&self, config: &BenchConfig) -> BenchResult<RunReport> {
        config.validate()?;
        let collection = self
            .store
            .open_collection(&config.collection)
            .await
            .map_err(|source| BenchError::CollectionUnavailable {
                name: config.collection.clone(),
                source,
            })?;
        let writer =
            BatchWriter::new(Arc::clone(&self.store), collection).with_deadline(config.request_timeout());

        tracing::info!(
            parallelism = config.parallelism,
            batches_per_worker = config.batches_per_worker,
            batch_size = config.batch_size,
            payload_size = config.payload_size,
            start_delay_ms = config.start_delay_ms,
            collection = %config.collection,
            "Starting batch import"
        );

        let started = Instant::now();
        let mut handles = Vec::with_capacity(usize::try_from(config.parallelism).unwrap_or(0));
        for worker_id in 1..=config.parallelism {
            // serial stagger: worker N starts roughly N * start_delay after the run
            tokio::time::sleep(config.start_delay()).await;
            let task = WorkerTask::new(worker_id, config, writer.clone(), self.sink.clone());
            handles.push((task.id(), tokio::spawn(task.run())));
        }

        let mut workers = Vec::with_capacity(handles.len());
        for (worker_id, handle) in handles {
            let report = handle.await.unwrap_or_else(|join_error| {
                tracing::error!(worker = worker_id, error = %join_error, "Worker task aborted");
                WorkerReport::aborted(worker_id, format!("worker task aborted: {join_error}"))
            });
            workers.push(report);
        }
        let elapsed = started.elapsed();

        let report = RunReport::new(config.clone(), workers, elapsed);
        self.sink.line("");
        self.sink.line(report::run_summary(&report.result));
        if let Some(overall) = &report.overall {
            self.sink.line(report::overall_summary(overall));
        }
        if report.result.any_worker_failed {
            let failures = report.failures();
            tracing::error!(failed = failures.len(), "Batch import finished with failed workers");
            for failure in &failures {
                self.sink.line(format!("Error: {failure}"));
            }
        } else {
            tracing::info!(
                elapsed_secs = elapsed.as_secs_f64(),
                docs_per_sec = report.result.docs_per_sec(),
                "Batch import finished"
            );
        }
        Ok(report)
    }
}
