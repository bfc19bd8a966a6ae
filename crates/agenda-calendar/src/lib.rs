//! Remote calendar aggregation for agenda.
//!
//! Fetches calendar feeds, bounds each feed's contribution, merges and ranks
//! the entries, and classifies them relative to the refresh moment.

pub mod aggregate;
pub mod classify;
pub mod client;
pub mod error;
pub mod ics;
pub mod types;

pub use aggregate::Aggregator;
pub use client::{fetch_all, fetch_source, HttpFetcher, SourceFetcher};
pub use error::{ParseFailure, SourceError};
pub use ics::{CalendarParser, IcsParser};
pub use types::{Event, RawCalendarEntry, TimeWindow};
