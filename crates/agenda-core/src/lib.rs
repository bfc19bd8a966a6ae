//! Shared configuration, error types and logging setup for agenda.

pub mod config;
pub mod error;
pub mod zone;

pub use config::{CalendarConfig, Config, TodayMode, ValidationResult};
pub use error::{AppError, ConfigError};
pub use zone::DisplayZone;

use anyhow::Result;

/// Initialize logging for the agenda process.
///
/// Logs go to stderr so they never mix with a text agenda on stdout.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("agenda core initialized");
    Ok(())
}
