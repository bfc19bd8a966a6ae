//! JSON snapshot output for an external display process.

use std::fs;
use std::path::PathBuf;

use agenda_calendar::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::RenderError;
use crate::sink::RenderSink;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    stylesheet: Option<&'a str>,
    rendered_at: DateTime<Utc>,
    events: &'a [Event],
}

/// Replaces a JSON file on every render. Readers see either the previous
/// snapshot or the new one, never a partial write.
pub struct JsonFileSink {
    path: PathBuf,
    stylesheet: Option<String>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stylesheet: None,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RenderSink for JsonFileSink {
    fn load_stylesheet(&mut self, css: &str) -> Result<(), RenderError> {
        self.stylesheet = Some(css.to_string());
        Ok(())
    }

    fn render(&mut self, events: &[Event]) -> Result<(), RenderError> {
        let snapshot = Snapshot {
            stylesheet: self.stylesheet.as_deref(),
            rendered_at: Utc::now(),
            events,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        debug!(path = %self.path.display(), count = events.len(), "Wrote agenda snapshot");
        Ok(())
    }
}
