//! Redis Streams job queue: the result channel, retry policy, dead-letter store,
//! and the worker pool that ties them together with a pluggable `JobHandler`.
//!
//! # Architecture
//!
//! ```text
//! Redis Stream (jobs:stream)
//!   ↓ (consumer group)
//! WorkerPool<H: JobHandler>
//!   ↓ success                  ↓ retryable error          ↓ terminal error
//! ResultChannel (completed)    requeue onto jobs:stream   DlqStore + ResultChannel (error)
//! ```

mod config;
mod consumer;
pub mod dlq;
pub mod envelope;
mod error;
mod health;
mod producer;
mod registry;
pub mod result_channel;
pub mod retry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{ConsumedMessage, StreamConsumer};
pub use dlq::{DlqRecord, DlqStats, DlqStatus, DlqStore};
pub use envelope::{ChatPayload, CorrelationId, FilePayload, JobEnvelope, KbAction, KbPayload, RetryMeta};
pub use error::{JobQueueError, JobQueueResult};
pub use health::{
    dlq_admin_router, dlq_delete_handler, dlq_get_handler, dlq_list_handler,
    dlq_resolve_handler, dlq_retry_all_pending_handler, dlq_retry_handler, dlq_stats_handler,
    full_admin_router, health_handler, health_router, ready_handler, stream_info_handler,
    HealthState,
};
pub use producer::JobProducer;
pub use registry::{JobHandler, JobOutcome};
pub use result_channel::{JobType, ProgressRecord, ProgressStatus, ResultChannel};
pub use retry::RetryPolicy;
pub use worker::WorkerPool;
