//! Gateway — entry point.
//!
//! Authenticated HTTP surface that validates, persists, and enqueues chat and
//! file-extraction requests onto the primary job stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    gateway::run().await
}
