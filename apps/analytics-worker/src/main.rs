//! Analytics worker — entry point.
//!
//! Separate consumer group on the secondary bus that transforms, persists,
//! and aggregates handler lifecycle events into windowed metrics and a
//! minute-resolution time series.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    analytics_worker::run().await
}
