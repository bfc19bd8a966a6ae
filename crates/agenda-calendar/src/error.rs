//! Source retrieval error types.

use thiserror::Error;

/// Longest slice of an error response body kept for diagnostics.
const BODY_SNIPPET_LEN: usize = 256;

/// Failure to obtain entries from one calendar source. Every variant names
/// the source it came from.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("could not parse calendar from {url}: {message}")]
    Parse { url: String, message: String },
}

impl SourceError {
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: snippet(body),
        }
    }

    /// The source this error belongs to.
    pub fn url(&self) -> &str {
        match self {
            Self::Request { url, .. } | Self::Status { url, .. } | Self::Parse { url, .. } => url,
        }
    }

    /// Network failure or non-success status.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Request { .. } => "Calendar could not be reached. Check your connection.".into(),
            Self::Status { status, .. } => format!("Calendar server answered with HTTP {}.", status),
            Self::Parse { .. } => "Calendar data is malformed.".into(),
        }
    }
}

/// Opaque parser failure, converted into [`SourceError::Parse`] by the fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseFailure(pub String);

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_LEN {
        return trimmed.to_string();
    }
    let mut cut = BODY_SNIPPET_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}
