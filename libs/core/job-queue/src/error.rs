//! Error types for job-queue operations.

use thiserror::Error;

/// Errors that can occur in the job queue: stream I/O, the result channel, and the DLQ.
#[derive(Error, Debug)]
pub enum JobQueueError {
    /// Redis connection or command error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job handler returned an error while processing a job.
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stream/queue operation error.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Consumer group error.
    #[error("Consumer group error: {0}")]
    ConsumerGroup(String),

    /// A message on the stream could not be parsed into a `JobEnvelope`.
    #[error("Job parsing error: {0}")]
    JobParsing(String),

    /// The correlation id referenced by an operation was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Health check failed.
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// Timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl JobQueueError {
    /// Check if this is a BLOCK timeout (normal behavior, not an error).
    ///
    /// When using XREADGROUP with BLOCK, a timeout means no messages arrived
    /// within the block period. This is expected behavior, not an error.
    pub fn is_block_timeout(&self) -> bool {
        match self {
            Self::Redis(e) => {
                let err_str = e.to_string().to_lowercase();
                err_str.contains("timed out") && !err_str.contains("connection")
            }
            _ => false,
        }
    }

    /// Check if this is a consumer group missing error (NOGROUP).
    pub fn is_nogroup_error(&self) -> bool {
        match self {
            Self::Redis(e) => e.to_string().contains("NOGROUP"),
            Self::ConsumerGroup(s) | Self::Queue(s) => s.contains("NOGROUP"),
            _ => false,
        }
    }
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JobQueueError::Processing("handler failed".to_string());
        assert_eq!(err.to_string(), "Processing error: handler failed");
    }

    #[test]
    fn test_is_nogroup_error() {
        let err = JobQueueError::Queue("NOGROUP No such consumer group".to_string());
        assert!(err.is_nogroup_error());

        let err = JobQueueError::Processing("invalid data".to_string());
        assert!(!err.is_nogroup_error());
    }
}
