//! Worker pool configuration.

use uuid::Uuid;

/// Configuration for a `WorkerPool`.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis stream name jobs are enqueued on.
    pub stream_name: String,

    /// Consumer group name.
    pub consumer_group: String,

    /// Unique consumer ID for this worker process (auto-generated if not provided).
    pub consumer_id: String,

    /// Blocking read timeout in milliseconds for XREADGROUP.
    pub block_timeout_ms: u64,

    /// Batch size for reading messages.
    pub batch_size: usize,

    /// Maximum number of jobs processed concurrently (the worker semaphore size).
    pub max_concurrent_jobs: usize,

    /// Idle time in milliseconds before a pending message is considered abandoned
    /// and eligible for XAUTOCLAIM.
    pub claim_idle_ms: u64,

    /// How often the background claim task sweeps for abandoned messages.
    pub claim_interval_ms: u64,
}

impl WorkerConfig {
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            block_timeout_ms: 5_000,
            batch_size: 10,
            max_concurrent_jobs: 8,
            claim_idle_ms: 30_000,
            claim_interval_ms: 15_000,
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_claim_idle_ms(mut self, ms: u64) -> Self {
        self.claim_idle_ms = ms;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("jobs:stream", "jobs:workers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = WorkerConfig::default()
            .with_consumer_id("worker-1")
            .with_max_concurrent_jobs(4)
            .with_batch_size(20);

        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.stream_name, "jobs:stream");
    }

    #[test]
    fn max_concurrent_jobs_is_never_zero() {
        let config = WorkerConfig::default().with_max_concurrent_jobs(0);
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
