//! Render sinks for the agenda.
//!
//! A sink receives the current event list on every render tick and is the
//! only place the list becomes visible.

pub mod error;
pub mod json;
pub mod sink;
pub mod text;

pub use error::RenderError;
pub use json::JsonFileSink;
pub use sink::RenderSink;
pub use text::{format_event, TextSink};
