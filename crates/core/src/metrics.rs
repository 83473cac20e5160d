//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Signing jobs (outcomes, duration)
//! - Artifact fan-out (forwarded splits and universal APKs)
//! - External services (publishing API, distribution service)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Signing Jobs
// =============================================================================

/// Signing jobs finished, by result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("playsigner_jobs_total", "Total signing jobs finished"),
        &["result"], // "succeeded", "failed"
    )
    .unwrap()
});

/// Signing job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "playsigner_job_duration_seconds",
            "Duration of signing jobs from edit to last forward",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["result"],
    )
    .unwrap()
});

/// Artifacts forwarded to the distribution service.
pub static ARTIFACTS_FORWARDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "playsigner_artifacts_forwarded_total",
            "Artifacts forwarded downstream",
        ),
        &["kind", "result"], // kind: "split", "universal"; result: "accepted", "failed"
    )
    .unwrap()
});

/// Failure notifications sent.
pub static FAILURE_NOTIFICATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "playsigner_failure_notifications_total",
        "Failure notifications sent to the distribution service",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "playsigner_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "playsigner_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the duration and outcome of one external call.
pub fn observe_external_call(service: &str, operation: &str, seconds: f64, success: bool) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if success { "success" } else { "error" }])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(ARTIFACTS_FORWARDED.clone()),
        Box::new(FAILURE_NOTIFICATIONS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
