//! Calendar source retrieval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agenda_core::CalendarConfig;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::ics::{CalendarParser, IcsParser};
use crate::types::{RawCalendarEntry, TimeWindow};

const USER_AGENT: &str = concat!("agenda/", env!("CARGO_PKG_VERSION"));

/// Obtains the parsed entries of one source with a single retrieval.
pub trait SourceFetcher: Send + Sync {
    fn fetch_entries(
        &self,
        url: &str,
        window: &TimeWindow,
    ) -> impl Future<Output = Result<Vec<RawCalendarEntry>, SourceError>> + Send;
}

/// Fetches calendar feeds over HTTP(S) and parses them.
#[derive(Clone)]
pub struct HttpFetcher<P = IcsParser> {
    client: Arc<Client>,
    parser: P,
}

impl<P: CalendarParser> HttpFetcher<P> {
    pub fn new(timeout: Duration, parser: P) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            parser,
        })
    }
}

impl<P: CalendarParser> SourceFetcher for HttpFetcher<P> {
    #[instrument(skip(self, window), level = "info")]
    async fn fetch_entries(
        &self,
        url: &str,
        window: &TimeWindow,
    ) -> Result<Vec<RawCalendarEntry>, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::status(url, status.as_u16(), &text));
        }

        let body = response.text().await.map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;

        self.parser
            .parse(&body, window)
            .map_err(|e| SourceError::Parse {
                url: url.to_string(),
                message: e.0,
            })
    }
}

/// Fetch one configured source and keep its first `max_events` entries in
/// feed order. A cap of 0 keeps everything.
pub async fn fetch_source<F: SourceFetcher>(
    fetcher: &F,
    source: &CalendarConfig,
    window: &TimeWindow,
) -> Result<Vec<RawCalendarEntry>, SourceError> {
    let mut entries = fetcher.fetch_entries(&source.url, window).await?;
    let found = entries.len();
    if source.max_events > 0 {
        entries.truncate(source.max_events);
    }
    debug!(url = %source.url, found, kept = entries.len(), "Fetched calendar source");
    Ok(entries)
}

/// Fetch every source in configuration order. The first failure aborts the
/// whole collection.
pub async fn fetch_all<F: SourceFetcher>(
    fetcher: &F,
    sources: &[CalendarConfig],
    window: &TimeWindow,
) -> Result<Vec<Vec<RawCalendarEntry>>, SourceError> {
    let mut per_source = Vec::with_capacity(sources.len());
    for source in sources {
        per_source.push(fetch_source(fetcher, source, window).await?);
    }
    Ok(per_source)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use agenda_core::DisplayZone;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//agenda//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:one\r\n\
DTSTART:20240301T090000Z\r\n\
SUMMARY:First\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:two\r\n\
DTSTART:20240302T090000Z\r\n\
SUMMARY:Second\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:three\r\n\
DTSTART:20240301T070000Z\r\n\
SUMMARY:Third\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(
            Duration::from_secs(5),
            IcsParser::new(DisplayZone::Named(chrono_tz::UTC)),
        )
        .unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::ahead(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 5)
    }

    async fn serve(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cal.ics"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(1)
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_fetch_entries() {
        let mock_server = serve(200, FEED).await;
        let url = format!("{}/cal.ics", mock_server.uri());

        let entries = fetcher().fetch_entries(&url, &window()).await.unwrap();
        let summaries: Vec<_> = entries.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_per_source_cap_keeps_feed_order() {
        let mock_server = serve(200, FEED).await;
        let source = CalendarConfig::new(format!("{}/cal.ics", mock_server.uri())).with_max_events(2);

        let entries = fetch_source(&fetcher(), &source, &window()).await.unwrap();
        let summaries: Vec<_> = entries.iter().map(|e| e.summary.as_str()).collect();
        // "Third" starts earliest but is dropped, the cap is not chronological
        assert_eq!(summaries, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_zero_cap_is_unbounded() {
        let mock_server = serve(200, FEED).await;
        let source = CalendarConfig::new(format!("{}/cal.ics", mock_server.uri()));

        let entries = fetch_source(&fetcher(), &source, &window()).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let mock_server = serve(500, "internal error").await;
        let url = format!("{}/cal.ics", mock_server.uri());

        let err = fetcher().fetch_entries(&url, &window()).await.unwrap_err();
        assert!(err.is_fetch());
        assert_eq!(err.url(), url);
        assert!(matches!(err, SourceError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mock_server = serve(200, "this is not a calendar").await;
        let url = format!("{}/cal.ics", mock_server.uri());

        let err = fetcher().fetch_entries(&url, &window()).await.unwrap_err();
        assert!(err.is_parse());
        assert_eq!(err.url(), url);
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        // Nothing listens on the discard port
        let url = "http://127.0.0.1:9/cal.ics";
        let err = fetcher().fetch_entries(url, &window()).await.unwrap_err();
        assert!(matches!(err, SourceError::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_all_aborts_on_first_failure() {
        let good = serve(200, FEED).await;
        let bad = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&bad)
            .await;

        let sources = vec![
            CalendarConfig::new(format!("{}/cal.ics", good.uri())),
            CalendarConfig::new(format!("{}/missing.ics", bad.uri())),
        ];
        let err = fetch_all(&fetcher(), &sources, &window()).await.unwrap_err();
        assert!(err.url().starts_with(&bad.uri()));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_configuration_order() {
        let mock_server = serve(200, FEED).await;
        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//agenda//test//EN\r\nEND:VCALENDAR\r\n",
            ))
            .mount(&empty)
            .await;

        let sources = vec![
            CalendarConfig::new(empty.uri()),
            CalendarConfig::new(format!("{}/cal.ics", mock_server.uri())),
        ];
        let per_source = fetch_all(&fetcher(), &sources, &window()).await.unwrap();
        assert_eq!(per_source.len(), 2);
        assert!(per_source[0].is_empty());
        assert_eq!(per_source[1].len(), 3);
    }
}
