//! Observability utilities shared by the gateway, orchestrator, and analytics worker.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Job-queue metrics (dispatch/retry/DLQ/queue depth)
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, JobMetrics};
//!
//! // Initialize metrics recorder
//! init_metrics();
//!
//! // Record job-queue operations
//! JobMetrics::record_dispatched("chat");
//! JobMetrics::record_completed("chat", 0.42);
//!
//! // Add metrics endpoint to router
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod jobs;
pub mod middleware;

pub use jobs::JobMetrics;
pub use middleware::MetricsLayer;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");

        // Register metric descriptions
        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // HTTP metrics
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    // Job-queue metrics
    describe_counter!(
        "jobs_dispatched_total",
        "Total jobs dispatched to a handler by topic"
    );
    describe_counter!(
        "jobs_completed_total",
        "Total jobs completed successfully by topic"
    );
    describe_histogram!(
        "job_duration_seconds",
        "Job handling duration in seconds by topic"
    );
    describe_counter!(
        "jobs_retried_total",
        "Total jobs requeued onto the retry topic"
    );
    describe_counter!(
        "jobs_dead_lettered_total",
        "Total jobs moved to the dead-letter store"
    );
    describe_gauge!(
        "job_queue_depth",
        "Current depth of a primary or retry stream"
    );
    describe_gauge!(
        "dead_letter_queue_size",
        "Current count of unresolved dead-letter records"
    );
    describe_gauge!(
        "active_worker_permits",
        "Number of worker semaphore permits currently in use"
    );
}
