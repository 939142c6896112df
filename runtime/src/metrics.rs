//! Lifecycle metrics.
//!
//! Recorded through the `metrics` facade. Install any recorder (Prometheus,
//! statsd, a test recorder) in the host application to collect them; without
//! one, recording is a no-op.
//!
//! | metric                                   | kind      | labels   |
//! |------------------------------------------|-----------|----------|
//! | `lifecycle_invocations_total`            | counter   |          |
//! | `lifecycle_settled_total`                | counter   | `status` |
//! | `lifecycle_aborted_total`                | counter   |          |
//! | `lifecycle_condition_skipped_total`      | counter   |          |
//! | `lifecycle_invocation_duration_seconds`  | histogram |          |

use composable_lifecycle_core::event::RequestStatus;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register descriptions for every lifecycle metric.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!("lifecycle_invocations_total", "Total number of lifecycle invocations started");
    describe_counter!(
        "lifecycle_settled_total",
        "Total number of invocations settled, by terminal status"
    );
    describe_counter!("lifecycle_aborted_total", "Total number of invocations aborted after starting");
    describe_counter!(
        "lifecycle_condition_skipped_total",
        "Total number of invocations skipped by their gate"
    );
    describe_histogram!(
        "lifecycle_invocation_duration_seconds",
        "Time from call to terminal event"
    );
}

/// Lifecycle metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record a call.
    pub fn record_call() {
        counter!("lifecycle_invocations_total").increment(1);
    }

    /// Record a terminal event.
    pub fn record_settled(status: RequestStatus, duration: Duration) {
        counter!("lifecycle_settled_total", "status" => status.suffix()).increment(1);
        histogram!("lifecycle_invocation_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an abort winning the race.
    pub fn record_abort() {
        counter!("lifecycle_aborted_total").increment(1);
    }

    /// Record a gate skip.
    pub fn record_condition_skip() {
        counter!("lifecycle_condition_skipped_total").increment(1);
    }
}
