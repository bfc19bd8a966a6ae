//! iCalendar feed parsing.
//!
//! Component parsing is delegated to `icalendar` and recurrence expansion to
//! `rrule`; this module only maps VEVENTs onto [`RawCalendarEntry`] values and
//! keeps the occurrences that intersect the retrieval window.

use std::collections::HashSet;

use agenda_core::zone::localize_in;
use agenda_core::DisplayZone;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold, Component, Property};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use rrule::RRuleSet;
use tracing::{debug, warn};

use crate::error::ParseFailure;
use crate::types::{RawCalendarEntry, TimeWindow};

/// Upper bound on occurrences expanded from a single recurring event.
const MAX_OCCURRENCES: u16 = 1000;

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Parses a feed body into the entries that intersect `window`.
pub trait CalendarParser: Send + Sync {
    /// Entries come back in feed order. Occurrences of one recurring event
    /// stay together, in chronological order.
    fn parse(&self, content: &str, window: &TimeWindow) -> Result<Vec<RawCalendarEntry>, ParseFailure>;
}

/// Parser for RFC 5545 feeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcsParser {
    /// Zone for floating times and bare dates.
    floating_zone: DisplayZone,
}

impl IcsParser {
    pub fn new(floating_zone: DisplayZone) -> Self {
        Self { floating_zone }
    }
}

impl CalendarParser for IcsParser {
    fn parse(&self, content: &str, window: &TimeWindow) -> Result<Vec<RawCalendarEntry>, ParseFailure> {
        let body = content.trim_start_matches('\u{feff}').trim_start();
        if !body
            .get(..15)
            .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
        {
            return Err(ParseFailure("missing BEGIN:VCALENDAR".into()));
        }

        let unfolded = unfold(body);
        let calendar = read_calendar(&unfolded).map_err(|e| ParseFailure(e.to_string()))?;

        let vevents: Vec<&Component> = calendar
            .components
            .iter()
            .filter(|c| c.name == "VEVENT")
            .collect();

        // Occurrences replaced by a RECURRENCE-ID override
        let overridden: HashSet<(String, DateTime<Utc>)> = vevents
            .iter()
            .filter_map(|vevent| {
                let uid = text_prop(vevent, "UID")?;
                let stamp = Stamp::from_property(vevent.find_prop("RECURRENCE-ID")?)?;
                Some((uid, self.resolve(&stamp).with_timezone(&Utc)))
            })
            .collect();

        let mut entries = Vec::new();
        for vevent in vevents {
            self.expand_event(vevent, window, &overridden, &mut entries);
        }
        Ok(entries)
    }
}

impl IcsParser {
    fn expand_event(
        &self,
        vevent: &Component,
        window: &TimeWindow,
        overridden: &HashSet<(String, DateTime<Utc>)>,
        out: &mut Vec<RawCalendarEntry>,
    ) {
        let Some(start_stamp) = vevent.find_prop("DTSTART").and_then(Stamp::from_property) else {
            debug!("Skipping VEVENT without a usable DTSTART");
            return;
        };
        let start = self.resolve(&start_stamp);
        let span = self.event_end(vevent, &start_stamp, start).map(|end| end - start);
        let summary = text_prop(vevent, "SUMMARY")
            .map(|s| unescape_text(&s))
            .unwrap_or_default();
        let date_only = matches!(start_stamp, Stamp::Date(_))
            || vevent.find_prop("DTSTART").is_some_and(is_date_value);

        let mut push = |occurrence: DateTime<FixedOffset>| {
            let end = span.map(|span| occurrence + span);
            if window.overlaps(&occurrence, end.as_ref()) {
                out.push(RawCalendarEntry {
                    start: occurrence,
                    end,
                    summary: summary.clone(),
                    start_value_is_date_only: date_only,
                });
            }
        };

        let is_override = vevent.find_prop("RECURRENCE-ID").is_some();
        let Some(rule) = text_prop(vevent, "RRULE").filter(|_| !is_override) else {
            push(start);
            return;
        };

        let uid = text_prop(vevent, "UID");
        let excluded: HashSet<DateTime<Utc>> = vevent
            .properties
            .iter()
            .filter(|p| p.name == "EXDATE")
            .flat_map(exdate_stamps)
            .map(|stamp| self.resolve(&stamp).with_timezone(&Utc))
            .collect();

        let lookback = span.unwrap_or_else(Duration::zero).max(Duration::zero());
        let occurrences = match self.expand_rule(&start_stamp, &rule, window, lookback) {
            Ok(occurrences) => occurrences,
            Err(e) => {
                warn!(rrule = %rule, error = %e, "Could not expand recurrence, keeping first instance");
                vec![start]
            }
        };

        for occurrence in occurrences {
            let instant = occurrence.with_timezone(&Utc);
            if excluded.contains(&instant) {
                continue;
            }
            if uid
                .as_ref()
                .is_some_and(|uid| overridden.contains(&(uid.clone(), instant)))
            {
                continue;
            }
            push(occurrence);
        }
    }

    /// DTEND when present, otherwise DTSTART plus DURATION. A bare date with
    /// neither lasts one day.
    fn event_end(
        &self,
        vevent: &Component,
        start_stamp: &Stamp,
        start: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        if let Some(stamp) = vevent.find_prop("DTEND").and_then(Stamp::from_property) {
            return Some(self.resolve(&stamp));
        }
        if let Some(duration) = text_prop(vevent, "DURATION").and_then(|d| parse_duration(&d)) {
            return Some(start + duration);
        }
        match start_stamp {
            Stamp::Date(date) => date.succ_opt().map(|next| self.resolve(&Stamp::Date(next))),
            _ => None,
        }
    }

    /// Occurrences of `rule` that may intersect `window`, looking back by
    /// `lookback` for ones still in progress when the window opens.
    ///
    /// Floating and date starts are expanded on wall-clock time, written as
    /// UTC, and each occurrence is then placed in the display zone.
    fn expand_rule(
        &self,
        start: &Stamp,
        rule: &str,
        window: &TimeWindow,
        lookback: Duration,
    ) -> Result<Vec<DateTime<FixedOffset>>, String> {
        let text = format!("{}\nRRULE:{}", dtstart_line(start), self.normalize_until(start, rule));
        let rule_set = text.parse::<RRuleSet>().map_err(|e| e.to_string())?;

        // Wall-clock bounds are unknown until each occurrence is localised
        let slack = if start.is_wall_clock() {
            Duration::days(1)
        } else {
            Duration::seconds(1)
        };
        let utc: rrule::Tz = Utc.into();
        let after = (window.start - lookback - slack).with_timezone(&utc);
        let before = (window.end + slack).with_timezone(&utc);
        let result = rule_set.after(after).before(before).all(MAX_OCCURRENCES);

        Ok(result
            .dates
            .iter()
            .map(|occurrence| {
                if start.is_wall_clock() {
                    self.floating_zone.localize(occurrence.naive_utc())
                } else {
                    occurrence.fixed_offset()
                }
            })
            .collect())
    }

    /// Rewrite an `UNTIL=` part so it matches the frame of [`dtstart_line`].
    fn normalize_until(&self, start: &Stamp, rule: &str) -> String {
        rule.split(';')
            .map(|part| match part.split_once('=') {
                Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                    match value_stamp(value.trim(), false, None) {
                        Some(until) => format!("UNTIL={}", self.until_value(start, until)),
                        None => part.to_string(),
                    }
                }
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    fn until_value(&self, start: &Stamp, until: Stamp) -> String {
        let value = if start.is_wall_clock() {
            match until {
                Stamp::Date(date) => end_of_day(date),
                Stamp::Floating(naive) => naive,
                other => self.floating_zone.convert(&self.resolve(&other)).naive_local(),
            }
        } else {
            // Floating and date limits are read in the zone of DTSTART
            let in_start_zone = |naive: NaiveDateTime| match start {
                Stamp::Zoned { tz, .. } => localize_in(tz, naive).naive_utc(),
                _ => naive,
            };
            match until {
                Stamp::Date(date) => in_start_zone(end_of_day(date)),
                Stamp::Floating(naive) => in_start_zone(naive),
                other => self.resolve(&other).naive_utc(),
            }
        };
        format!("{}Z", value.format(STAMP_FORMAT))
    }

    fn resolve(&self, stamp: &Stamp) -> DateTime<FixedOffset> {
        match stamp {
            Stamp::Utc(dt) => dt.fixed_offset(),
            Stamp::Zoned { naive, tz } => localize_in(tz, *naive),
            Stamp::Floating(naive) => self.floating_zone.localize(*naive),
            Stamp::Date(date) => self.floating_zone.localize(date.and_time(NaiveTime::MIN)),
        }
    }
}

/// DTSTART line the recurrence engine understands. Wall-clock values are
/// written as UTC and localised after expansion.
fn dtstart_line(start: &Stamp) -> String {
    match start {
        Stamp::Utc(dt) => format!("DTSTART:{}Z", dt.format(STAMP_FORMAT)),
        Stamp::Zoned { naive, tz } => {
            format!("DTSTART;TZID={}:{}", tz.name(), naive.format(STAMP_FORMAT))
        }
        Stamp::Floating(naive) => format!("DTSTART:{}Z", naive.format(STAMP_FORMAT)),
        Stamp::Date(date) => {
            format!("DTSTART:{}Z", date.and_time(NaiveTime::MIN).format(STAMP_FORMAT))
        }
    }
}

/// Last second of `date`; a DATE limit includes the whole day.
fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1)
}

/// A date-time property value before it is placed on the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Stamp {
    Date(NaiveDate),
    Utc(DateTime<Utc>),
    Floating(NaiveDateTime),
    Zoned { naive: NaiveDateTime, tz: Tz },
}

impl Stamp {
    fn from_property(prop: &Property) -> Option<Self> {
        let stamp = match DatePerhapsTime::try_from(prop).ok()? {
            DatePerhapsTime::Date(date) => Self::Date(date),
            DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Self::Utc(dt),
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Self::Floating(naive),
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
                Self::zoned(date_time, &tzid)
            }
        };
        Some(stamp)
    }

    /// Floating and date values carry no zone of their own.
    fn is_wall_clock(&self) -> bool {
        matches!(self, Self::Date(_) | Self::Floating(_))
    }

    /// Unknown zone identifiers degrade to floating time.
    fn zoned(naive: NaiveDateTime, tzid: &str) -> Self {
        match tzid.trim_matches('"').parse::<Tz>() {
            Ok(tz) => Self::Zoned { naive, tz },
            Err(_) => {
                debug!(tzid, "Unknown TZID, treating time as floating");
                Self::Floating(naive)
            }
        }
    }
}

/// EXDATE may carry several comma-separated values sharing one TZID.
fn exdate_stamps(prop: &Property) -> Vec<Stamp> {
    let tzid = param(prop, "TZID");
    let date_only = is_date_value(prop);
    prop.val
        .as_ref()
        .split(',')
        .filter_map(|value| value_stamp(value.trim(), date_only, tzid.as_deref()))
        .collect()
}

/// A raw `DATE` or `DATE-TIME` value.
fn value_stamp(value: &str, date_only: bool, tzid: Option<&str>) -> Option<Stamp> {
    if date_only || value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok().map(Stamp::Date);
    }
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, STAMP_FORMAT).ok()?;
        return Some(Stamp::Utc(naive.and_utc()));
    }
    let naive = NaiveDateTime::parse_from_str(value, STAMP_FORMAT).ok()?;
    Some(match tzid {
        Some(tzid) => Stamp::zoned(naive, tzid),
        None => Stamp::Floating(naive),
    })
}

fn text_prop(component: &Component, name: &str) -> Option<String> {
    component
        .find_prop(name)
        .map(|p| p.val.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn param(prop: &Property, key: &str) -> Option<String> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()))
}

fn is_date_value(prop: &Property) -> bool {
    param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
}

/// ISO 8601 duration, optionally negative.
fn parse_duration(value: &str) -> Option<Duration> {
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let std: std::time::Duration = iso8601::duration(body).ok()?.into();
    let duration = Duration::from_std(std).ok()?;
    Some(if negative { -duration } else { duration })
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
