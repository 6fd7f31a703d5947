//! Connection management for the Redis-backed job queue and result channel.
//!
//! # Examples
//!
//! ```ignore
//! use database::redis;
//!
//! let manager = redis::connect("redis://127.0.0.1:6379").await?;
//! ```

// Always available modules
pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

// Re-exports for convenience
pub use common::{DatabaseError, DatabaseResult};
