use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::zone::DisplayZone;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// How the "today" flag is computed.
///
/// `Utc` compares UTC calendar days and is the default. `Display` compares
/// calendar days in the display zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TodayMode {
    #[default]
    Utc,
    Display,
}

/// One remote calendar feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarConfig {
    pub url: String,

    /// Per-source cap, 0 = unbounded
    #[serde(default)]
    pub max_events: usize,
}

impl CalendarConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_events: 0,
        }
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// IANA zone name events are displayed in, system zone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Window length in days
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// Global cap, 0 = unbounded
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Refresh cadence
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Redraw cadence
    #[serde(default = "default_render_interval", with = "humantime_serde")]
    pub render_interval: Duration,

    /// Timeout applied to each calendar request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default)]
    pub today_mode: TodayMode,

    /// Stylesheet handed to the render sink once at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<PathBuf>,

    /// JSON snapshot path; the agenda is printed to stdout when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Remote calendar feeds, fetched in this order. Must stay the last
    /// field: TOML tables follow plain keys.
    #[serde(default)]
    pub calendars: Vec<CalendarConfig>,
}

fn default_max_days() -> u32 {
    5
}

fn default_max_events() -> usize {
    20
}

fn default_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_render_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            max_days: default_max_days(),
            max_events: default_max_events(),
            interval: default_interval(),
            render_interval: default_render_interval(),
            request_timeout: default_request_timeout(),
            today_mode: TodayMode::default(),
            stylesheet: None,
            output: None,
            calendars: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating a default
    /// file if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::warn!(
                "Created default config at {} (no calendars configured)",
                config_path.display()
            );
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {}", path.display(), e)))?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(e) = self.display_zone() {
            result.add_error("timezone", e.to_string());
        }

        if self.calendars.is_empty() {
            result.add_warning("calendars", "No calendars configured - the agenda will be empty");
        }

        for (i, calendar) in self.calendars.iter().enumerate() {
            self.validate_url(&calendar.url, &format!("calendars[{}].url", i), &mut result);
        }

        if self.max_days == 0 {
            result.add_error("maxDays", "Window must span at least one day");
        } else if self.max_days > 366 {
            result.add_warning("maxDays", "Window is longer than a year");
        }

        if self.interval.is_zero() {
            result.add_error("interval", "Refresh interval must be greater than 0");
        }

        if self.render_interval.is_zero() {
            result.add_error("renderInterval", "Render interval must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            result.add_error("requestTimeout", "Request timeout must be greater than 0");
        } else if self.request_timeout >= self.interval && !self.interval.is_zero() {
            result.add_warning(
                "requestTimeout",
                "Request timeout is not shorter than the refresh interval",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Resolve the configured zone name
    pub fn display_zone(&self) -> Result<DisplayZone, ConfigError> {
        DisplayZone::from_name(self.timezone.as_deref())
    }

    /// Global cap, `None` when unbounded
    pub fn event_cap(&self) -> Option<usize> {
        (self.max_events > 0).then_some(self.max_events)
    }

    /// Save configuration to a file
    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Invalid(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, contents)
            .map_err(|e| ConfigError::Invalid(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("Failed to get config directory".to_string()))?
            .join("agenda");

        Ok(config_dir.join("config.toml"))
    }
}
