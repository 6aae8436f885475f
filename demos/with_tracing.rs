//! Example: Using tracing for observability.
//!
//! This example demonstrates how to enable structured logging using
//! the `tracing` ecosystem. The credential lifecycle, the scan and every
//! Gmail call emit spans and events.
//!
//! # Usage
//!
//! ```bash
//! export SENDER="Shop <orders@shop.example>"
//! export PATTERN='/order id: (\d+)/'
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=email_check=debug
//!
//! cargo run --example with_tracing
//! ```

use email_check::{CheckerConfig, InboxChecker};
use std::env;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> email_check::Result<()> {
    // Use RUST_LOG to control log levels, e.g. RUST_LOG=email_check=debug,info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("email_check=info")),
        )
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let sender = env::var("SENDER").expect("SENDER environment variable required");
    let pattern = env::var("PATTERN").expect("PATTERN environment variable required");

    tracing::info!(sender = %sender, "Starting email-check example");

    // Verbose outcomes ("No new messages." etc.) are logged at info
    let config = CheckerConfig::builder().verbose(true).build()?;
    let checker = InboxChecker::new(config)?;

    tracing::debug!(?checker, "Checker built");

    match checker.check(&sender, &pattern).await {
        Ok(Some(content)) => tracing::info!(content = %content, "Found content"),
        Ok(None) => tracing::info!("Nothing found"),
        Err(e) => {
            tracing::warn!(error = %e, category = %e.category(), "Check failed");
            return Err(e);
        }
    }

    Ok(())
}
