//! Run results and their human/JSON renderings

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult, WorkerFailure};
use crate::latency::{self, LatencyStats};
use crate::worker::WorkerReport;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Outcome of a whole run, finalized after every worker joined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Configured total, `parallelism * batches_per_worker * batch_size`
    pub total_documents: u64,
    /// Coordinator wall clock from run start to the join
    pub wall_clock_elapsed: Duration,
    /// At least one worker stopped early
    pub any_worker_failed: bool,
}

impl RunResult {
    /// Aggregate throughput over the configured total
    #[must_use]
    pub fn docs_per_sec(&self) -> f64 {
        latency::throughput(self.total_documents, self.wall_clock_elapsed)
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Parameters the run used
    pub config: BenchConfig,
    /// Run-level totals
    pub result: RunResult,
    /// Statistics over the merged samples of every worker
    pub overall: Option<LatencyStats>,
    /// Per-worker reports ordered by worker id
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// Reduce joined worker reports into a run report
    #[must_use]
    pub fn new(config: BenchConfig, mut workers: Vec<WorkerReport>, elapsed: Duration) -> Self {
        workers.sort_by_key(|w| w.worker_id);
        let any_worker_failed = workers.iter().any(WorkerReport::failed);

        let merged: Vec<Duration> = workers
            .iter()
            .flat_map(|w| w.samples.iter().copied())
            .collect();
        let written = workers
            .iter()
            .map(|w| w.batches_completed)
            .sum::<u64>()
            .saturating_mul(config.batch_size);
        let overall = LatencyStats::from_samples(&merged, written, elapsed);

        Self {
            result: RunResult {
                total_documents: config.total_documents(),
                wall_clock_elapsed: elapsed,
                any_worker_failed,
            },
            config,
            overall,
            workers,
        }
    }

    /// Failed workers ordered by id
    #[must_use]
    pub fn failures(&self) -> Vec<WorkerFailure> {
        self.workers
            .iter()
            .filter_map(|w| w.failure.clone())
            .collect()
    }

    /// The run result, or the aggregate failure if any worker stopped early
    pub fn into_result(self) -> BenchResult<RunResult> {
        if self.result.any_worker_failed {
            return Err(BenchError::WorkersFailed {
                parallelism: self.config.parallelism,
                failures: self.failures(),
            });
        }
        Ok(self.result)
    }

    /// Multi-line summary for terminals
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Batch import against '{}'", self.config.collection);
        let _ = writeln!(
            s,
            "Workers: {} | Batches per worker: {} | Batch size: {} | Payload: {} bytes",
            self.config.parallelism,
            self.config.batches_per_worker,
            self.config.batch_size,
            self.config.payload_size
        );
        s.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        let _ = writeln!(s, "{}", run_summary(&self.result));

        if let Some(stats) = &self.overall {
            let _ = writeln!(s, "{}", overall_summary(stats));
        }

        let failures = self.failures();
        if !failures.is_empty() {
            let _ = writeln!(s, "\nFailed workers ({}):", failures.len());
            for failure in &failures {
                let _ = writeln!(s, "  {failure}");
            }
        }
        s
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON rendering to `path`
    pub fn save_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Per-worker statistics line
#[must_use]
pub fn worker_summary(worker_id: u64, batches: u64, stats: &LatencyStats) -> String {
    format!(
        "Times for {batches} batches: {:?} (median), {:?} (90%ile), {:?} (99%ile), {:?} (average), docs per second in worker {worker_id}: {:.2}",
        stats.median, stats.p90, stats.p99, stats.mean, stats.docs_per_sec
    )
}

/// Latency line over the merged samples of every worker
#[must_use]
pub fn overall_summary(stats: &LatencyStats) -> String {
    format!(
        "All batches: {:?} (median), {:?} (90%ile), {:?} (99%ile), {:?} (average), {:?} (max), {} samples",
        stats.median, stats.p90, stats.p99, stats.mean, stats.max, stats.samples
    )
}

/// Run-level totals line
#[must_use]
pub fn run_summary(result: &RunResult) -> String {
    format!(
        "Total number of documents written: {}, total time: {:?}, total docs per second: {:.2}",
        result.total_documents,
        result.wall_clock_elapsed,
        result.docs_per_sec()
    )
}
