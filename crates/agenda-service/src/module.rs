//! Host-facing start/stop lifecycle.

use std::sync::Arc;

use agenda_calendar::{Event, HttpFetcher, IcsParser, SourceFetcher};
use agenda_core::{AppError, Config, ConfigError};
use agenda_display::{JsonFileSink, RenderSink, TextSink};
use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::scheduler::{RefreshScheduler, SchedulerSettings, SchedulerState, SchedulerStats};

/// Handle to a running agenda module.
///
/// [`stop`](Self::stop) consumes the handle, so the module can only be
/// stopped once.
pub struct ModuleHandle {
    events: watch::Receiver<Arc<Vec<Event>>>,
    state: watch::Receiver<SchedulerState>,
    cancel: CancellationToken,
    task: JoinHandle<SchedulerStats>,
}

impl ModuleHandle {
    /// Latest successfully refreshed event list.
    pub fn events(&self) -> Arc<Vec<Event>> {
        self.events.borrow().clone()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Signal the scheduler and wait for its loop to exit.
    pub async fn stop(self) -> SchedulerStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Agenda scheduler task did not finish cleanly");
                SchedulerStats::default()
            }
        }
    }
}

/// Validate `config`, load the stylesheet into `sink`, run one refresh and
/// one render, then start the scheduler loop.
///
/// Configuration problems abort startup. A failing first refresh does not:
/// the module starts with an empty list and retries on the next tick.
pub async fn start<F, S>(config: &Config, fetcher: F, mut sink: S) -> Result<ModuleHandle, AppError>
where
    F: SourceFetcher + 'static,
    S: RenderSink + 'static,
{
    let validation = config.validate();
    if !validation.is_valid() {
        return Err(ConfigError::Invalid(validation.error_summary()).into());
    }
    for warning in &validation.warnings {
        warn!(field = %warning.field, "{}", warning.message);
    }
    let zone = config.display_zone()?;

    if let Some(path) = &config.stylesheet {
        let css = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("stylesheet {}: {}", path.display(), e))
        })?;
        sink.load_stylesheet(&css)
            .map_err(|e| ConfigError::Invalid(format!("stylesheet {}: {}", path.display(), e)))?;
    }

    let settings = SchedulerSettings::from_config(config, zone);
    let mut scheduler = RefreshScheduler::new(settings, fetcher, sink);

    if let Err(e) = scheduler.refresh().await {
        error!(url = %e.url(), error = %e, hint = %e.user_message(), "Initial refresh failed, starting with no events");
    }
    if let Err(e) = scheduler.render() {
        error!(error = %e, hint = e.user_message(), "Initial render failed");
    }

    let events = scheduler.subscribe();
    let state = scheduler.watch_state();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    info!(zone = %zone.name(), calendars = config.calendars.len(), "Agenda module started");
    Ok(ModuleHandle {
        events,
        state,
        cancel,
        task,
    })
}

/// [`start`] with the HTTP fetcher and the sink named by `config.output`:
/// a JSON snapshot file when set, plain text on stdout otherwise.
pub async fn start_with_defaults(config: &Config) -> Result<ModuleHandle, AppError> {
    let zone = config.display_zone()?;
    let fetcher = HttpFetcher::new(config.request_timeout, IcsParser::new(zone))
        .context("Failed to create HTTP client")?;

    let sink: Box<dyn RenderSink> = match &config.output {
        Some(path) => Box::new(JsonFileSink::new(path)),
        None => Box::new(TextSink::stdout()),
    };
    start(config, fetcher, sink).await
}
