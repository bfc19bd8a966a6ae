//! Plain-text agenda output.

use std::io::{self, Stdout, Write};

use agenda_calendar::Event;

use crate::error::RenderError;
use crate::sink::RenderSink;

/// Writes one line per event. Today's events are starred and all-day events
/// show "all day" in place of a clock time.
///
/// Each render is assembled in memory and written with a single
/// `write_all`, so the blocking part is one short write and flush.
pub struct TextSink<W: Write + Send> {
    out: W,
}

impl TextSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderSink for TextSink<W> {
    fn render(&mut self, events: &[Event]) -> Result<(), RenderError> {
        let mut block = String::new();
        if events.is_empty() {
            block.push_str("No upcoming events\n");
        }
        for event in events {
            block.push_str(&format_event(event));
            block.push('\n');
        }
        block.push('\n');

        self.out.write_all(block.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Single agenda line, e.g. `* Fri 01 Mar  09:00    Standup`.
pub fn format_event(event: &Event) -> String {
    let marker = if event.is_today { '*' } else { ' ' };
    let when = if event.is_all_day {
        "all day".to_string()
    } else {
        event.time.format("%H:%M").to_string()
    };
    format!(
        "{} {}  {:<7}  {}",
        marker,
        event.time.format("%a %d %b"),
        when,
        event.title
    )
}
