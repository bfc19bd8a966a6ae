//! Display time zone resolution.

use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Zone that events are displayed in. Absent configuration means the
/// system local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Named(Tz),
}

impl DisplayZone {
    /// Resolve an optional IANA zone name. Empty names count as absent.
    pub fn from_name(name: Option<&str>) -> Result<Self, ConfigError> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Self::Local),
            Some(n) => n
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|e| ConfigError::Invalid(format!("timezone {:?}: {}", n, e))),
        }
    }

    /// Convert an instant into this zone.
    pub fn convert<T: TimeZone>(&self, dt: &DateTime<T>) -> DateTime<FixedOffset> {
        match self {
            Self::Local => dt.with_timezone(&Local).fixed_offset(),
            Self::Named(tz) => dt.with_timezone(tz).fixed_offset(),
        }
    }

    /// Place a wall-clock time in this zone.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        match self {
            Self::Local => localize_in(&Local, naive),
            Self::Named(tz) => localize_in(tz, naive),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Local => "local".to_string(),
            Self::Named(tz) => tz.name().to_string(),
        }
    }
}

/// Ambiguous times take the earlier offset; times skipped by a DST gap are
/// read as UTC wall-clock.
pub fn localize_in<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> DateTime<FixedOffset> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.fixed_offset(),
        LocalResult::Ambiguous(earliest, _) => earliest.fixed_offset(),
        LocalResult::None => zone.from_utc_datetime(&naive).fixed_offset(),
    }
}
