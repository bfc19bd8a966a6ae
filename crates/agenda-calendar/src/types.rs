//! Calendar entry and event types.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One occurrence as produced by the feed parser, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCalendarEntry {
    /// Start in the zone the feed gave it (or the display zone for floating
    /// and date-only values).
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
    pub summary: String,
    /// The start property was a date with no time component.
    pub start_value_is_date_only: bool,
}

impl RawCalendarEntry {
    pub fn new(start: DateTime<FixedOffset>, summary: impl Into<String>) -> Self {
        Self {
            start,
            end: None,
            summary: summary.into(),
            start_value_is_date_only: false,
        }
    }

    pub fn with_end(mut self, end: DateTime<FixedOffset>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn date_only(mut self) -> Self {
        self.start_value_is_date_only = true;
        self
    }
}

/// Display-ready agenda item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub title: String,
    /// Start time, expressed in the display zone.
    pub time: DateTime<FixedOffset>,
    pub is_all_day: bool,
    pub is_today: bool,
}

/// Retrieval window `[start, end]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window starting at `now` and reaching `days` whole days ahead.
    pub fn ahead(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now,
            end: now + Duration::days(i64::from(days)),
        }
    }

    /// Whether an occurrence intersects the window. `end` is exclusive; an
    /// occurrence without a positive length is a point and must lie inside.
    pub fn overlaps(&self, start: &DateTime<FixedOffset>, end: Option<&DateTime<FixedOffset>>) -> bool {
        let start = start.with_timezone(&Utc);
        if start > self.end {
            return false;
        }
        match end.map(|e| e.with_timezone(&Utc)).filter(|e| *e > start) {
            Some(end) => end > self.start,
            None => start >= self.start,
        }
    }
}
