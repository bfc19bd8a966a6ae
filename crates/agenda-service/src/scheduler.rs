//! Dual-cadence refresh and render loop.

use std::sync::Arc;
use std::time::Duration;

use agenda_calendar::{fetch_all, Aggregator, Event, SourceError, SourceFetcher, TimeWindow};
use agenda_core::{CalendarConfig, Config, DisplayZone};
use agenda_display::{RenderError, RenderSink};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Scheduler lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Tick counters for the loop. Startup work is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub refresh_ticks: u64,
    pub refresh_failures: u64,
    pub render_ticks: u64,
    pub render_failures: u64,
}

/// Everything the scheduler needs from the configuration.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub sources: Vec<CalendarConfig>,
    pub aggregator: Aggregator,
    pub max_days: u32,
    pub refresh_interval: Duration,
    pub render_interval: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config, zone: DisplayZone) -> Self {
        Self {
            sources: config.calendars.clone(),
            aggregator: Aggregator::new(config.event_cap(), zone, config.today_mode),
            max_days: config.max_days,
            refresh_interval: config.interval,
            render_interval: config.render_interval,
        }
    }
}

/// Owns the working event list and drives both cadences.
///
/// The list lives in a `watch` channel. A refresh replaces it with a new
/// `Arc` in one step, so a render or an outside reader sees either the old
/// list or the new one.
pub struct RefreshScheduler<F, S> {
    settings: SchedulerSettings,
    fetcher: F,
    sink: S,
    events: watch::Sender<Arc<Vec<Event>>>,
    state: watch::Sender<SchedulerState>,
    stats: SchedulerStats,
}

impl<F: SourceFetcher, S: RenderSink> RefreshScheduler<F, S> {
    pub fn new(settings: SchedulerSettings, fetcher: F, sink: S) -> Self {
        let (events, _) = watch::channel(Arc::new(Vec::new()));
        let (state, _) = watch::channel(SchedulerState::Running);
        Self {
            settings,
            fetcher,
            sink,
            events,
            state,
            stats: SchedulerStats::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Event>>> {
        self.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Current working list.
    pub fn events(&self) -> Arc<Vec<Event>> {
        self.events.borrow().clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Fetch every source and replace the working list. On failure the
    /// previous list stays in place.
    pub async fn refresh(&mut self) -> Result<usize, SourceError> {
        self.refresh_at(Utc::now()).await
    }

    /// [`refresh`](Self::refresh) against a fixed clock.
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<usize, SourceError> {
        let window = TimeWindow::ahead(now, self.settings.max_days);
        let per_source = fetch_all(&self.fetcher, &self.settings.sources, &window).await?;
        let events = self.settings.aggregator.aggregate(per_source, now);
        let count = events.len();
        self.events.send_replace(Arc::new(events));
        info!(count, "Refreshed agenda");
        Ok(count)
    }

    /// Hand the current list to the sink.
    pub fn render(&mut self) -> Result<(), RenderError> {
        let events = self.events();
        self.sink.render(&events)
    }

    /// Run until `cancel` fires. A stop request wins over any tick that is
    /// ready at the same moment and abandons an in-flight refresh.
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerStats {
        let start = Instant::now();
        let refresh_every = self.settings.refresh_interval;
        let render_every = self.settings.render_interval;

        let mut refresh_timer = interval_at(start + refresh_every, refresh_every);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut render_timer = interval_at(start + render_every, render_every);
        render_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            refresh = ?refresh_every,
            render = ?render_every,
            sources = self.settings.sources.len(),
            "Agenda scheduler running"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = refresh_timer.tick() => {
                    self.stats.refresh_ticks += 1;
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!("Stop requested during refresh, abandoning it");
                            break;
                        }
                        result = self.refresh() => result,
                    };
                    if let Err(e) = result {
                        self.stats.refresh_failures += 1;
                        error!(url = %e.url(), error = %e, hint = %e.user_message(), "Refresh failed, keeping previous events");
                    }
                }
                _ = render_timer.tick() => {
                    self.stats.render_ticks += 1;
                    if let Err(e) = self.render() {
                        self.stats.render_failures += 1;
                        error!(error = %e, hint = e.user_message(), "Render failed");
                    }
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!(stats = ?self.stats, "Agenda scheduler stopped");
        self.stats
    }
}
