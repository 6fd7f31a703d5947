//! Orchestrator — entry point.
//!
//! Background worker that drains the primary job stream and dispatches each
//! envelope to its chat/file/kb handler.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    orchestrator::run().await
}
