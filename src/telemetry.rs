//! Telemetry initialization: structured logging via `tracing`.
//!
//! The subscriber reads its filter from `RUST_LOG` and falls back to `info`.
//! `try_init` is used so tests that initialize logging themselves don't
//! panic on double-initialization.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber with console output.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::info!("Telemetry initialized");

    Ok(())
}
