//! Prometheus text exposition of check-in metrics
//!
//! Served at GET /metrics by `http_api`.

use crate::domain::types::RejectionReason;
use crate::infra::metrics::{Metrics, MetricsSnapshot, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use std::fmt::Write;

/// Write a counter with site label
fn write_counter(output: &mut String, name: &str, help: &str, site: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
///
/// Reads monotonic counters only, so scrapes do not disturb the periodic log report.
pub fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    let snapshot = metrics.snapshot();
    let mut output = String::with_capacity(2048);

    write_decision_metrics(&mut output, site_id, &snapshot);
    write_latency_metrics(&mut output, site_id, &snapshot);

    output
}

fn write_decision_metrics(output: &mut String, site: &str, snapshot: &MetricsSnapshot) {
    write_counter(
        output,
        "checkin_attempts_total",
        "Check-in attempts evaluated",
        site,
        snapshot.attempts_total,
    );
    write_counter(
        output,
        "checkin_accepted_total",
        "Check-in attempts accepted",
        site,
        snapshot.accepted_total,
    );

    let name = "checkin_rejected_total";
    let _ = writeln!(output, "# HELP {name} Check-in attempts rejected, by reason");
    let _ = writeln!(output, "# TYPE {name} counter");
    for reason in RejectionReason::ALL {
        let _ = writeln!(
            output,
            "{name}{{site=\"{site}\",reason=\"{}\"}} {}",
            reason.as_str(),
            snapshot.rejected(reason)
        );
    }

    write_counter(
        output,
        "checkin_malformed_requests_total",
        "Check-in requests that could not be decoded",
        site,
        snapshot.malformed_total,
    );
}

fn write_latency_metrics(output: &mut String, site: &str, snapshot: &MetricsSnapshot) {
    write_histogram(
        output,
        "checkin_decision_latency_us",
        "Check-in decision latency in microseconds",
        site,
        &snapshot.lat_buckets_total,
        snapshot.latency_sum_total_us,
    );
}
