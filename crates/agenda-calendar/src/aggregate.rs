//! Merge, rank and classify entries from every source.

use agenda_core::{DisplayZone, TodayMode};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::classify::{is_all_day, is_today, is_today_in};
use crate::types::{Event, RawCalendarEntry};

/// Turns per-source entry lists into the ranked agenda.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    /// Global bound on the result. `None` and `Some(0)` mean unbounded.
    pub cap: Option<usize>,
    pub zone: DisplayZone,
    pub today_mode: TodayMode,
}

impl Aggregator {
    pub fn new(cap: Option<usize>, zone: DisplayZone, today_mode: TodayMode) -> Self {
        Self {
            cap,
            zone,
            today_mode,
        }
    }

    /// Concatenate sources in configuration order, sort ascending by start
    /// (ties keep concatenation order), truncate to the cap, then classify.
    pub fn aggregate(&self, per_source: Vec<Vec<RawCalendarEntry>>, now: DateTime<Utc>) -> Vec<Event> {
        let mut entries: Vec<RawCalendarEntry> = per_source.into_iter().flatten().collect();
        let total = entries.len();
        entries.sort_by_key(|e| e.start);
        if let Some(cap) = self.cap.filter(|cap| *cap > 0) {
            entries.truncate(cap);
        }
        debug!(total, kept = entries.len(), "Aggregated calendar entries");

        entries.iter().map(|entry| self.classify(entry, &now)).collect()
    }

    fn classify(&self, entry: &RawCalendarEntry, now: &DateTime<Utc>) -> Event {
        let is_today = match self.today_mode {
            TodayMode::Utc => is_today(Some(&entry.start), now),
            TodayMode::Display => is_today_in(Some(&entry.start), now, &self.zone),
        };
        Event {
            title: entry.summary.clone(),
            time: self.zone.convert(&entry.start),
            is_all_day: is_all_day(entry),
            is_today,
        }
    }
}
