use std::path::PathBuf;

use agenda_core::Config;
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    agenda_core::init()?;

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let handle = agenda_service::start_with_defaults(&config)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    tracing::info!("Agenda running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    let stats = handle.stop().await;
    tracing::info!(
        refreshes = stats.refresh_ticks,
        renders = stats.render_ticks,
        "Agenda stopped"
    );

    Ok(())
}
