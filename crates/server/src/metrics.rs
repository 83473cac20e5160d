//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the signing server:
//! - HTTP request metrics (latency, counts, errors)
//! - Job submissions at the boundary
//! - Dispatcher queue and worker status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "playsigner_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("playsigner_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "playsigner_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "playsigner_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Signing job submissions by result.
pub static JOB_SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "playsigner_job_submissions_total",
            "Signing job submissions at the HTTP boundary",
        ),
        &["result"], // "accepted", "invalid", "too_large", "queue_full", "error"
    )
    .unwrap()
});

// =============================================================================
// Dispatcher Metrics (collected dynamically)
// =============================================================================

/// Jobs waiting for a worker.
pub static DISPATCHER_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "playsigner_dispatcher_queued_jobs",
        "Number of signing jobs waiting for a worker",
    )
    .unwrap()
});

/// Workers currently running a job.
pub static DISPATCHER_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "playsigner_dispatcher_active_workers",
        "Number of workers currently running a signing job",
    )
    .unwrap()
});

/// Configured pool size.
pub static DISPATCHER_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("playsigner_dispatcher_workers", "Configured worker count").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Submissions
    registry
        .register(Box::new(JOB_SUBMISSIONS_TOTAL.clone()))
        .unwrap();

    // Dispatcher
    registry
        .register(Box::new(DISPATCHER_QUEUED.clone()))
        .unwrap();
    registry
        .register(Box::new(DISPATCHER_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(DISPATCHER_WORKERS.clone()))
        .unwrap();

    // Core metrics (jobs, artifacts, external services)
    for metric in playsigner_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the dispatcher gauges reflect the moment of the scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.queue().status();
    DISPATCHER_QUEUED.set(status.queued as i64);
    DISPATCHER_ACTIVE.set(status.active as i64);
    DISPATCHER_WORKERS.set(status.workers as i64);
}

static SIGNING_PATH: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"^/app/[^/]+/[^/]+/[^/]+/?$").unwrap());

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    if SIGNING_PATH.is_match(path) {
        return "/app/{destination_id}/{package_name}/{version_code}".to_string();
    }
    NUMERIC_SEGMENT.replace_all(path, "/{id}$1").to_string()
}
