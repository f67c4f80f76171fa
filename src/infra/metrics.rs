//! Lock-free check-in metrics and periodic reporting
//!
//! Counters are updated with relaxed atomics on the request path. Monotonic
//! totals are never reset; latency statistics are swapped to zero on each
//! `report()`.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not drive any check-in decision.

use crate::domain::types::{Decision, RejectionReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤1, ≤2, ≤4, ≤8, ≤16, ≤32, ≤64, ≤128, ≤256, ≤512, >512
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];
pub const METRICS_NUM_BUCKETS: usize = 11;

/// Upper bound reported for each bucket (last bucket uses 2x the previous bound)
const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

const NUM_REASONS: usize = RejectionReason::ALL.len();

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    METRICS_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

/// Lock-free check-in metrics collector
pub struct Metrics {
    /// Decisions evaluated (monotonic)
    attempts_total: AtomicU64,
    /// Accepted check-ins (monotonic)
    accepted_total: AtomicU64,
    /// Rejections by reason, indexed by `RejectionReason::index` (monotonic)
    rejected_total: [AtomicU64; NUM_REASONS],
    /// Requests that could not be decoded (monotonic)
    malformed_total: AtomicU64,
    /// Decisions since last report (reset on report)
    attempts_since_report: AtomicU64,
    /// Sum of evaluation latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max evaluation latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Evaluation latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Evaluation latency histogram buckets (monotonic, for Prometheus)
    latency_buckets_total: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Sum of all evaluation latencies in microseconds (monotonic)
    latency_sum_total_us: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            attempts_total: AtomicU64::new(0),
            accepted_total: AtomicU64::new(0),
            rejected_total: std::array::from_fn(|_| AtomicU64::new(0)),
            malformed_total: AtomicU64::new(0),
            attempts_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_buckets_total: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_total_us: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record one evaluated decision and how long it took (lock-free)
    #[inline]
    pub fn record_decision(&self, decision: Decision, latency_us: u64) {
        self.attempts_total.fetch_add(1, Ordering::Relaxed);
        self.attempts_since_report.fetch_add(1, Ordering::Relaxed);

        match decision {
            Decision::Accepted => {
                self.accepted_total.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Rejected(reason) => {
                self.rejected_total[reason.index()].fetch_add(1, Ordering::Relaxed);
            }
        }

        let bucket = bucket_index(latency_us);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_total_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets_total[bucket].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    /// Record a request body that could not be decoded
    #[inline]
    pub fn record_malformed(&self) {
        self.malformed_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn attempts_total(&self) -> u64 {
        self.attempts_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn accepted_total(&self) -> u64 {
        self.accepted_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_total(&self, reason: RejectionReason) -> u64 {
        self.rejected_total[reason.index()].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn malformed_total(&self) -> u64 {
        self.malformed_total.load(Ordering::Relaxed)
    }

    /// Read monotonic counters only; nothing is reset
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts_total: self.attempts_total(),
            accepted_total: self.accepted_total(),
            rejected: self.rejected_by_reason(),
            malformed_total: self.malformed_total(),
            lat_buckets_total: load_buckets(&self.latency_buckets_total),
            latency_sum_total_us: self.latency_sum_total_us.load(Ordering::Relaxed),
        }
    }

    fn rejected_by_reason(&self) -> [u64; NUM_REASONS] {
        let mut rejected = [0u64; NUM_REASONS];
        for reason in RejectionReason::ALL {
            rejected[reason.index()] = self.rejected_total(reason);
        }
        rejected
    }

    /// Snapshot totals and swap periodic latency statistics to zero
    pub fn report(&self) -> MetricsSummary {
        let attempts_count = self.attempts_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max_us = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let attempts_per_sec = if elapsed.as_secs_f64() > 0.0 {
            attempts_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let latency_avg_us = if attempts_count > 0 { latency_sum / attempts_count } else { 0 };

        MetricsSummary {
            attempts_total: self.attempts_total(),
            accepted_total: self.accepted_total(),
            rejected: self.rejected_by_reason(),
            malformed_total: self.malformed_total(),
            attempts_per_sec,
            latency_avg_us,
            latency_max_us,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counters, as exported to Prometheus
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub attempts_total: u64,
    pub accepted_total: u64,
    /// Rejections indexed by `RejectionReason::index`
    pub rejected: [u64; NUM_REASONS],
    pub malformed_total: u64,
    pub lat_buckets_total: [u64; METRICS_NUM_BUCKETS],
    pub latency_sum_total_us: u64,
}

impl MetricsSnapshot {
    pub fn rejected(&self, reason: RejectionReason) -> u64 {
        self.rejected[reason.index()]
    }
}

/// Periodic report: totals plus latency statistics since the previous report
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub attempts_total: u64,
    pub accepted_total: u64,
    /// Rejections indexed by `RejectionReason::index`
    pub rejected: [u64; NUM_REASONS],
    pub malformed_total: u64,
    pub attempts_per_sec: f64,
    pub latency_avg_us: u64,
    pub latency_max_us: u64,
    /// Evaluation latency histogram buckets since the previous report
    pub lat_buckets: [u64; METRICS_NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
}

impl MetricsSummary {
    pub fn rejected(&self, reason: RejectionReason) -> u64 {
        self.rejected[reason.index()]
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.iter().sum()
    }

    pub fn log(&self) {
        info!(
            attempts_total = %self.attempts_total,
            accepted_total = %self.accepted_total,
            rejected_total = %self.rejected_total(),
            invalid_qr_format = %self.rejected(RejectionReason::InvalidQrFormat),
            invalid_qr_token = %self.rejected(RejectionReason::InvalidQrToken),
            out_of_zone = %self.rejected(RejectionReason::OutOfZone),
            outside_time_window = %self.rejected(RejectionReason::OutsideTimeWindow),
            malformed_total = %self.malformed_total,
            attempts_per_sec = format!("{:.2}", self.attempts_per_sec),
            avg_latency_us = %self.latency_avg_us,
            max_latency_us = %self.latency_max_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.attempts_total(), 0);
        assert_eq!(metrics.accepted_total(), 0);
        for reason in RejectionReason::ALL {
            assert_eq!(metrics.rejected_total(reason), 0);
        }
    }

    #[test]
    fn test_record_decisions_by_outcome() {
        let metrics = Metrics::new();

        metrics.record_decision(Decision::Accepted, 3);
        metrics.record_decision(Decision::Accepted, 3);
        metrics.record_decision(Decision::Rejected(RejectionReason::OutOfZone), 5);
        metrics.record_decision(Decision::Rejected(RejectionReason::InvalidQrToken), 1);

        assert_eq!(metrics.attempts_total(), 4);
        assert_eq!(metrics.accepted_total(), 2);
        assert_eq!(metrics.rejected_total(RejectionReason::OutOfZone), 1);
        assert_eq!(metrics.rejected_total(RejectionReason::InvalidQrToken), 1);
        assert_eq!(metrics.rejected_total(RejectionReason::InvalidQrFormat), 0);
    }

    #[test]
    fn test_report_resets_latency_but_not_totals() {
        let metrics = Metrics::new();

        metrics.record_decision(Decision::Accepted, 10);
        metrics.record_decision(Decision::Accepted, 30);
        metrics.record_malformed();

        let first = metrics.report();
        assert_eq!(first.attempts_total, 2);
        assert_eq!(first.malformed_total, 1);
        assert_eq!(first.latency_avg_us, 20);
        assert_eq!(first.latency_max_us, 30);

        let second = metrics.report();
        assert_eq!(second.attempts_total, 2);
        assert_eq!(second.latency_max_us, 0);
        assert_eq!(second.lat_buckets.iter().sum::<u64>(), 0);
    }

    #[test]
    fn test_summary_carries_latency_stats() {
        let metrics = Metrics::new();

        metrics.record_decision(Decision::Accepted, 3);
        metrics.record_decision(Decision::Accepted, 5);
        metrics.record_decision(Decision::Rejected(RejectionReason::InvalidQrToken), 100);

        let summary = metrics.report();
        assert_eq!(summary.latency_avg_us, 36);
        assert_eq!(summary.latency_max_us, 100);
        assert_eq!(summary.lat_p50_us, 8);
        assert_eq!(summary.lat_p99_us, 128);
        summary.log();
    }

    #[test]
    fn test_snapshot_survives_report() {
        let metrics = Metrics::new();

        metrics.record_decision(Decision::Accepted, 10);
        metrics.record_decision(Decision::Rejected(RejectionReason::OutOfZone), 30);
        let _ = metrics.report();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts_total, 2);
        assert_eq!(snapshot.rejected(RejectionReason::OutOfZone), 1);
        assert_eq!(snapshot.latency_sum_total_us, 40);
        assert_eq!(snapshot.lat_buckets_total.iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(2), 1);
        assert_eq!(bucket_index(3), 2);
        assert_eq!(bucket_index(512), 9);
        assert_eq!(bucket_index(513), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();

        for _ in 0..100 {
            metrics.record_decision(Decision::Accepted, 6);
        }

        let summary = metrics.report();
        assert_eq!(summary.lat_p50_us, 8);
        assert_eq!(summary.lat_p99_us, 8);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000u64 {
                    let decision = if i % 2 == 0 {
                        Decision::Accepted
                    } else {
                        Decision::Rejected(RejectionReason::OutsideTimeWindow)
                    };
                    m.record_decision(decision, i % 64);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.attempts_total(), 10_000);
        assert_eq!(metrics.accepted_total(), 5_000);
        assert_eq!(metrics.rejected_total(RejectionReason::OutsideTimeWindow), 5_000);
    }
}
