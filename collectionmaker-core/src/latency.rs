//! Per-batch latency bookkeeping and summary statistics

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Derived statistics over a set of batch latencies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of samples
    pub samples: usize,
    /// Fastest batch
    pub min: Duration,
    /// `samples[floor(0.5 n)]`
    pub median: Duration,
    /// `samples[floor(0.9 n)]`
    pub p90: Duration,
    /// `samples[floor(0.99 n)]`
    pub p99: Duration,
    /// Slowest batch
    pub max: Duration,
    /// Arithmetic mean
    pub mean: Duration,
    /// Documents per second over the caller's wall clock
    pub docs_per_sec: f64,
}

impl LatencyStats {
    /// Summarize `samples` (any order).
    ///
    /// Returns `None` for an empty set. `documents` and `elapsed` feed the
    /// throughput figure only.
    #[must_use]
    pub fn from_samples(samples: &[Duration], documents: u64, elapsed: Duration) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let total: Duration = sorted.iter().sum();
        Some(Self {
            samples: n,
            min: sorted[0],
            median: sorted[percentile_index(n, 0.5)],
            p90: sorted[percentile_index(n, 0.9)],
            p99: sorted[percentile_index(n, 0.99)],
            max: sorted[n - 1],
            mean: mean(total, n),
            docs_per_sec: throughput(documents, elapsed),
        })
    }
}

/// Position of the `fraction` percentile in an ascending set of `n` values,
/// clamped to the last element
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile_index(n: usize, fraction: f64) -> usize {
    let raw = (fraction * n as f64).floor() as usize;
    raw.min(n.saturating_sub(1))
}

/// Documents per second; zero when no time elapsed
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput(documents: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        documents as f64 / secs
    } else {
        0.0
    }
}

fn mean(total: Duration, n: usize) -> Duration {
    u32::try_from(n).map_or_else(
        |_| Duration::from_secs_f64(total.as_secs_f64() / n as f64),
        |n| total / n,
    )
}

/// Latencies of one worker in submission order
#[derive(Debug, Clone, Default)]
pub struct LatencyRecorder {
    samples: Vec<Duration>,
}

impl LatencyRecorder {
    /// Recorder with room for `capacity` samples
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append one batch latency
    pub fn record(&mut self, duration: Duration) {
        self.samples.push(duration);
    }

    /// Number of recorded batches
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first batch
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in submission order
    #[must_use]
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Statistics over a sorted copy; the recorded order is left as is
    #[must_use]
    pub fn summarize(&self, documents: u64, elapsed: Duration) -> Option<LatencyStats> {
        LatencyStats::from_samples(&self.samples, documents, elapsed)
    }

    /// Hand over the samples
    #[must_use]
    pub fn into_samples(self) -> Vec<Duration> {
        self.samples
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn single_sample_does_not_index_out_of_bounds() {
        let mut recorder = LatencyRecorder::default();
        recorder.record(ms(42));
        let stats = recorder.summarize(1, ms(50)).unwrap();
        assert_eq!(stats.median, ms(42));
        assert_eq!(stats.p90, ms(42));
        assert_eq!(stats.p99, ms(42));
        assert_eq!(stats.mean, ms(42));
    }

    #[test]
    fn percentiles_follow_floor_positions() {
        let mut recorder = LatencyRecorder::default();
        // recorded out of order on purpose
        for v in (1..=10).rev() {
            recorder.record(ms(v));
        }
        let stats = recorder.summarize(100, Duration::from_secs(2)).unwrap();
        // sorted = [1..=10]; floor(5) -> 6, floor(9) -> 10, floor(9.9) -> 10
        assert_eq!(stats.median, ms(6));
        assert_eq!(stats.p90, ms(10));
        assert_eq!(stats.p99, ms(10));
        assert_eq!(stats.min, ms(1));
        assert_eq!(stats.mean, Duration::from_micros(5500));
        assert!((stats.docs_per_sec - 50.0).abs() < f64::EPSILON);
        // original order untouched
        assert_eq!(recorder.samples()[0], ms(10));
    }

    #[test]
    fn empty_recorder_has_no_stats() {
        assert!(LatencyRecorder::default().summarize(0, ms(1)).is_none());
    }

    #[test]
    fn index_is_clamped() {
        assert_eq!(percentile_index(1, 0.99), 0);
        assert_eq!(percentile_index(2, 0.99), 1);
        assert_eq!(percentile_index(100, 0.99), 99);
        assert_eq!(percentile_index(3, 1.0), 2);
    }

    #[test]
    fn zero_elapsed_gives_zero_throughput() {
        assert!(throughput(10, Duration::ZERO).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn percentiles_are_ordered_members(values in prop::collection::vec(0u64..1_000_000, 1..500)) {
            let samples: Vec<Duration> = values.iter().map(|v| Duration::from_micros(*v)).collect();
            let stats = LatencyStats::from_samples(&samples, 1, Duration::from_secs(1)).unwrap();
            prop_assert!(stats.min <= stats.median);
            prop_assert!(stats.median <= stats.p90);
            prop_assert!(stats.p90 <= stats.p99);
            prop_assert!(stats.p99 <= stats.max);
            prop_assert!(samples.contains(&stats.median));
            prop_assert!(samples.contains(&stats.p90));
            prop_assert!(samples.contains(&stats.p99));
        }
    }
}
