//! Prometheus metrics for agent requests.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`
//! and defines the metric names the client records.  The CLI has no
//! scrape endpoint; the rendered exposition is logged instead.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

use crate::errors::ErrorKind;

// -- Metric name constants ----------------------------------------------------

/// Total agent requests (counter). Labels: endpoint, method, status.
pub const REQUESTS_TOTAL: &str = "pgconsul_requests_total";

/// Agent request duration in seconds (histogram). Labels: endpoint, method.
pub const REQUEST_DURATION_SECONDS: &str = "pgconsul_request_duration_seconds";

/// Replies that failed to decode (counter). Labels: kind.
pub const DECODE_ERRORS_TOTAL: &str = "pgconsul_decode_errors_total";

/// Status label recorded when no HTTP status was received.
pub const STATUS_TRANSPORT_ERROR: &str = "error";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent; returns
/// the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            warn!("Another metrics recorder is already installed; exposition will be empty");
        }
        handle
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total requests sent to the consul agent");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Consul agent request duration in seconds"
    );
    describe_counter!(DECODE_ERRORS_TOTAL, "Agent replies that failed to decode");
}

/// Rendered Prometheus exposition, or `None` before `init_metrics()`.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

// -- Recording helpers --------------------------------------------------------

pub fn record_request(endpoint: &'static str, method: &str, status: &str, elapsed: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "endpoint" => endpoint,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        REQUEST_DURATION_SECONDS,
        "endpoint" => endpoint,
        "method" => method.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_decode_error(kind: ErrorKind) {
    counter!(DECODE_ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}

// -- Tests --------------------------------------------------------------------
