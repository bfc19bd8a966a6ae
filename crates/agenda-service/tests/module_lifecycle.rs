//! Integration tests for the agenda module lifecycle.
//!
//! Calendar servers are mocked with wiremock; scheduling runs against the
//! real `start`/`stop` entry points.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use agenda_calendar::{
    Aggregator, Event, HttpFetcher, IcsParser, RawCalendarEntry, SourceError, SourceFetcher,
    TimeWindow,
};
use agenda_core::{AppError, CalendarConfig, Config, ConfigError, DisplayZone, TodayMode};
use agenda_display::{JsonFileSink, RenderError, RenderSink};
use agenda_service::{start, RefreshScheduler, SchedulerSettings, SchedulerState};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct RecordingSink {
    stylesheets: Arc<Mutex<Vec<String>>>,
    renders: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RenderSink for RecordingSink {
    fn load_stylesheet(&mut self, css: &str) -> Result<(), RenderError> {
        self.stylesheets.lock().push(css.to_string());
        Ok(())
    }

    fn render(&mut self, events: &[Event]) -> Result<(), RenderError> {
        self.renders
            .lock()
            .push(events.iter().map(|e| e.title.clone()).collect());
        Ok(())
    }
}

/// Every source yields nothing; keeps the paused clock free of real I/O.
#[derive(Clone, Copy)]
struct EmptyFetcher;

impl SourceFetcher for EmptyFetcher {
    async fn fetch_entries(
        &self,
        _url: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<RawCalendarEntry>, SourceError> {
        Ok(Vec::new())
    }
}

fn stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn feed(events: &[(DateTime<Utc>, &str)]) -> String {
    let mut body =
        String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//agenda//test//EN\r\n");
    for (i, (start, summary)) in events.iter().enumerate() {
        body.push_str(&format!(
            "BEGIN:VEVENT\r\nUID:{}\r\nDTSTART:{}\r\nSUMMARY:{}\r\nEND:VEVENT\r\n",
            i,
            stamp(*start),
            summary
        ));
    }
    body.push_str("END:VCALENDAR\r\n");
    body
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(
        Duration::from_secs(5),
        IcsParser::new(DisplayZone::Named(chrono_tz::UTC)),
    )
    .unwrap()
}

fn config(urls: &[String]) -> Config {
    Config {
        timezone: Some("UTC".into()),
        calendars: urls.iter().map(|u| CalendarConfig::new(u.clone())).collect(),
        ..Config::default()
    }
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_start_refreshes_and_renders_before_returning() {
    let server = MockServer::start().await;
    let now = Utc::now();
    mount_feed(
        &server,
        "/a.ics",
        feed(&[
            (now + ChronoDuration::hours(2), "Second"),
            (now + ChronoDuration::hours(1), "First"),
            (now + ChronoDuration::days(10), "Too far out"),
        ]),
    )
    .await;

    let sink = RecordingSink::default();
    let config = config(&[format!("{}/a.ics", server.uri())]);
    let handle = start(&config, fetcher(), sink.clone()).await.unwrap();

    let titles: Vec<_> = handle.events().iter().map(|e| e.title.clone()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    assert_eq!(sink.renders.lock().len(), 1);
    assert_eq!(handle.state(), SchedulerState::Running);

    let state = handle.watch_state();
    handle.stop().await;
    assert_eq!(*state.borrow(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_failing_source_voids_first_refresh() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/a.ics",
        feed(&[(Utc::now() + ChronoDuration::hours(1), "From A")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/b.ics"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let config = config(&[
        format!("{}/a.ics", server.uri()),
        format!("{}/b.ics", server.uri()),
    ]);
    let handle = start(&config, fetcher(), sink.clone()).await.unwrap();

    assert!(handle.events().is_empty());
    assert_eq!(sink.renders.lock().as_slice(), &[Vec::<String>::new()]);
    handle.stop().await;
}

#[tokio::test]
async fn test_failing_source_keeps_previous_list() {
    let server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
    let tomorrow = |hour: u32| Utc.with_ymd_and_hms(2024, 3, 2, hour, 0, 0).unwrap();

    mount_feed(
        &server,
        "/a.ics",
        feed(&[(tomorrow(9), "A 09:00"), (tomorrow(14), "A 14:00")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/b.ics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&[
            (Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), "B 08:00 today"),
            (tomorrow(10), "B 10:00"),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.ics"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let b_url = format!("{}/b.ics", server.uri());
    let settings = SchedulerSettings {
        sources: vec![
            CalendarConfig::new(format!("{}/a.ics", server.uri())),
            CalendarConfig::new(b_url.clone()),
        ],
        aggregator: Aggregator::new(Some(3), DisplayZone::Named(chrono_tz::UTC), TodayMode::Utc),
        max_days: 5,
        refresh_interval: Duration::from_secs(30 * 60),
        render_interval: Duration::from_secs(60),
    };
    let mut scheduler = RefreshScheduler::new(settings, fetcher(), RecordingSink::default());

    assert_eq!(scheduler.refresh_at(now).await.unwrap(), 3);
    let first = scheduler.events();
    let titles: Vec<_> = first.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["B 08:00 today", "A 09:00", "B 10:00"]);
    assert!(first[0].is_today);
    assert!(!first[1].is_today);

    let err = scheduler.refresh_at(now).await.unwrap_err();
    assert!(err.is_fetch());
    assert_eq!(err.url(), b_url);
    assert!(matches!(err, SourceError::Status { status: 500, .. }));
    assert_eq!(scheduler.events(), first);
}

#[tokio::test]
async fn test_unknown_timezone_aborts_start() {
    let mut config = config(&["https://example.com/cal.ics".to_string()]);
    config.timezone = Some("Nowhere/Special".into());

    let result = start(&config, EmptyFetcher, RecordingSink::default()).await;
    assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));
}

#[tokio::test]
async fn test_missing_stylesheet_aborts_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&["https://example.com/cal.ics".to_string()]);
    config.stylesheet = Some(dir.path().join("missing.css"));

    let result = start(&config, EmptyFetcher, RecordingSink::default()).await;
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_stylesheet_loaded_once_into_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let css = dir.path().join("agenda.css");
    std::fs::write(&css, ".today { color: teal }").unwrap();
    let output = dir.path().join("agenda.json");

    let mut config = config(&["https://example.com/cal.ics".to_string()]);
    config.stylesheet = Some(css);
    let handle = start(&config, EmptyFetcher, JsonFileSink::new(&output))
        .await
        .unwrap();

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(snapshot["stylesheet"], ".today { color: teal }");
    assert_eq!(snapshot["events"].as_array().unwrap().len(), 0);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_at_minute_ten_halts_ticks() {
    let sink = RecordingSink::default();
    let config = config(&["https://example.com/cal.ics".to_string()]);
    let handle = start(&config, EmptyFetcher, sink.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10 * 60 + 30)).await;
    let stats = handle.stop().await;
    assert_eq!(stats.render_ticks, 10);
    assert_eq!(stats.refresh_ticks, 0);

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    // Startup render plus ten ticks
    assert_eq!(sink.renders.lock().len(), 11);
}
