//! Job-queue-specific metrics shared by the orchestrator and analytics worker.

use metrics::{counter, gauge, histogram};

/// Recorder for worker-pool and dead-letter-queue metrics.
pub struct JobMetrics;

impl JobMetrics {
    /// Record a job dispatched to a handler.
    pub fn record_dispatched(topic: &str) {
        counter!("jobs_dispatched_total", "topic" => topic.to_string()).increment(1);
    }

    /// Record a job completed successfully, with its handling duration.
    pub fn record_completed(topic: &str, duration_secs: f64) {
        counter!("jobs_completed_total", "topic" => topic.to_string()).increment(1);
        histogram!("job_duration_seconds", "topic" => topic.to_string()).record(duration_secs);
    }

    /// Record a job requeued onto the retry topic.
    pub fn record_retried(topic: &str, attempt: u32) {
        counter!(
            "jobs_retried_total",
            "topic" => topic.to_string(),
            "attempt" => attempt.to_string()
        )
        .increment(1);
    }

    /// Record a job moved to the dead-letter store after exhausting retries.
    pub fn record_dead_lettered(topic: &str) {
        counter!("jobs_dead_lettered_total", "topic" => topic.to_string()).increment(1);
    }

    /// Set the current depth of the primary or retry stream.
    pub fn set_queue_depth(topic: &str, depth: u64) {
        gauge!("job_queue_depth", "topic" => topic.to_string()).set(depth as f64);
    }

    /// Set the current count of unresolved dead-letter records.
    pub fn set_dlq_size(count: u64) {
        gauge!("dead_letter_queue_size").set(count as f64);
    }

    /// Set the number of worker permits currently in use.
    pub fn set_active_workers(count: u64) {
        gauge!("active_worker_permits").set(count as f64);
    }
}
