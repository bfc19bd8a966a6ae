//! All-day and same-day classification.

use agenda_core::DisplayZone;
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};

use crate::types::RawCalendarEntry;

/// An entry is all-day when its start was given as a bare date, or when it
/// begins at midnight and lasts exactly 24 hours.
pub fn is_all_day(entry: &RawCalendarEntry) -> bool {
    if entry.start_value_is_date_only {
        return true;
    }
    let Some(end) = entry.end else {
        return false;
    };
    let start = entry.start;
    start.hour() == 0 && start.minute() == 0 && end - start == Duration::hours(24)
}

/// Same UTC calendar day as `now`. A missing start is never today.
pub fn is_today(start: Option<&DateTime<FixedOffset>>, now: &DateTime<Utc>) -> bool {
    start.is_some_and(|s| s.with_timezone(&Utc).date_naive() == now.date_naive())
}

/// Same calendar day as `now`, with both instants read in `zone`.
pub fn is_today_in(
    start: Option<&DateTime<FixedOffset>>,
    now: &DateTime<Utc>,
    zone: &DisplayZone,
) -> bool {
    start.is_some_and(|s| zone.convert(s).date_naive() == zone.convert(now).date_naive())
}
