use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use news_relay::{
    fingerprint, Aggregator, AggregatorError, Article, DedupLedger, FetchConfig, MemoryLedger,
    NotificationSink, Result, Settings, SourceConfig, SourceKind, Summarizer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<(String, Vec<Article>)>>,
    texts: Mutex<Vec<String>>,
    fail_batches: bool,
}

impl RecordingSink {
    fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn push_articles(&self, articles: &[Article], source_name: &str) -> Result<()> {
        self.batches
            .lock()
            .unwrap()
            .push((source_name.to_string(), articles.to_vec()));
        if self.fail_batches {
            return Err(AggregatorError::Delivery("sink unavailable".to_string()));
        }
        Ok(())
    }

    async fn push_text(&self, content: &str) -> Result<()> {
        self.texts.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

struct RecordingSummarizer {
    calls: AtomicUsize,
    response: Option<String>,
    fail: bool,
}

impl RecordingSummarizer {
    fn returning(response: Option<&str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: response.map(|s| s.to_string()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: None,
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, _articles: &[Article], _max_len: usize) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AggregatorError::Summarize("service down".to_string()));
        }
        Ok(self.response.clone())
    }
}

fn test_settings() -> Settings {
    Settings {
        pacing_ms: 0,
        source_pacing_ms: 0,
        fetch: FetchConfig {
            max_retries: 0,
            retry_base_delay_ms: 10,
            ..FetchConfig::default()
        },
        ..Settings::default()
    }
}

fn json_source(name: &str, server: &MockServer, route: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: format!("{}{}", server.uri(), route),
        kind: SourceKind::JsonReport,
    }
}

/// A `reports` body, listed newest first the way feeds usually are.
fn report_feed(entries: &[(&str, DateTime<Utc>)]) -> String {
    let reports: Vec<serde_json::Value> = entries
        .iter()
        .map(|(link, published)| {
            serde_json::json!({
                "title": format!("Report {}", link),
                "url": format!("https://example.com{}", link),
                "disclosed_at": published.to_rfc3339(),
            })
        })
        .collect();
    serde_json::json!({ "reports": reports }).to_string()
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn one_failing_source_does_not_abort_the_run() {
    let server = MockServer::start().await;
    let now = Utc::now();

    mount_feed(&server, "/first", report_feed(&[("/a", now)])).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_feed(&server, "/third", report_feed(&[("/b", now)])).await;

    let sources = vec![
        json_source("First", &server, "/first"),
        json_source("Broken", &server, "/broken"),
        json_source("Third", &server, "/third"),
    ];

    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(RecordingSummarizer::returning(None));
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        summarizer,
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();

    assert_eq!(report.sources_checked, 3);
    assert_eq!(report.new_articles.len(), 2);
    assert_eq!(sink.batch_count(), 2);
}

#[tokio::test]
async fn idle_run_sends_one_status_message_and_no_summary() {
    let server = MockServer::start().await;
    mount_feed(&server, "/quiet", r#"{"reports": []}"#.to_string()).await;

    let sources = vec![json_source("Quiet", &server, "/quiet")];

    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(RecordingSummarizer::returning(Some("unused")));
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        summarizer.clone(),
    )
    .unwrap();

    aggregator.run(&sources).await.unwrap();

    assert_eq!(sink.batch_count(), 0);
    let texts = sink.texts();
    assert_eq!(texts.len(), 1, "exactly one idle status message");
    assert!(texts[0].contains('1'), "status message names the source count");
    assert_eq!(summarizer.call_count(), 0);
}

#[tokio::test]
async fn per_source_cap_leaves_excess_unrecorded() {
    let server = MockServer::start().await;
    let now = Utc::now();

    // 25 fresh reports, newest first; processing order is oldest first.
    let entries: Vec<(String, DateTime<Utc>)> = (0..25)
        .map(|i| (format!("/r{}", i), now - Duration::minutes(i)))
        .collect();
    let borrowed: Vec<(&str, DateTime<Utc>)> =
        entries.iter().map(|(l, t)| (l.as_str(), *t)).collect();
    mount_feed(&server, "/burst", report_feed(&borrowed)).await;

    let sources = vec![json_source("Burst", &server, "/burst")];
    let ledger = Arc::new(MemoryLedger::new());
    let sink = Arc::new(RecordingSink::default());
    let aggregator = Aggregator::new(
        test_settings(),
        ledger.clone(),
        sink.clone(),
        Arc::new(RecordingSummarizer::returning(None)),
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();

    assert_eq!(report.new_articles.len(), 20);
    assert_eq!(ledger.len().await, 20);
    // The oldest 20 were kept; the 5 newest stayed unrecorded.
    for i in 0..5 {
        let fp = fingerprint(&format!("https://example.com/r{}", i));
        assert!(!ledger.is_seen(&fp).await.unwrap());
    }

    // Next run picks up exactly the excess.
    let second = aggregator.run(&sources).await.unwrap();
    assert_eq!(second.new_articles.len(), 5);
    assert_eq!(ledger.len().await, 25);
}

#[tokio::test]
async fn same_link_in_two_sources_is_emitted_once() {
    let server = MockServer::start().await;
    let now = Utc::now();

    mount_feed(&server, "/primary", report_feed(&[("/shared", now)])).await;
    mount_feed(&server, "/mirror", report_feed(&[("/shared", now)])).await;

    let sources = vec![
        json_source("Primary", &server, "/primary"),
        json_source("Mirror", &server, "/mirror"),
    ];

    let sink = Arc::new(RecordingSink::default());
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        Arc::new(RecordingSummarizer::returning(None)),
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();

    // First-processed source wins the tie.
    assert_eq!(report.new_articles.len(), 1);
    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, "Primary");
}

#[tokio::test]
async fn summary_message_follows_a_productive_run() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", report_feed(&[("/a", Utc::now())])).await;

    let sources = vec![json_source("Feed", &server, "/feed")];
    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(RecordingSummarizer::returning(Some("key themes of the day")));
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        summarizer.clone(),
    )
    .unwrap();

    aggregator.run(&sources).await.unwrap();

    assert_eq!(summarizer.call_count(), 1);
    let texts = sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("**Run Summary:**"));
    assert!(texts[0].contains("key themes of the day"));
}

#[tokio::test]
async fn summarizer_failure_degrades_to_no_summary() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", report_feed(&[("/a", Utc::now())])).await;

    let sources = vec![json_source("Feed", &server, "/feed")];
    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(RecordingSummarizer::failing());
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        summarizer.clone(),
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();

    assert_eq!(report.new_articles.len(), 1);
    assert_eq!(summarizer.call_count(), 1);
    assert!(sink.texts().is_empty(), "no summary and no idle message");
}

#[tokio::test]
async fn delivery_failure_does_not_abort_the_run() {
    let server = MockServer::start().await;
    let now = Utc::now();
    mount_feed(&server, "/one", report_feed(&[("/a", now)])).await;
    mount_feed(&server, "/two", report_feed(&[("/b", now)])).await;

    let sources = vec![
        json_source("One", &server, "/one"),
        json_source("Two", &server, "/two"),
    ];

    let sink = Arc::new(RecordingSink {
        fail_batches: true,
        ..RecordingSink::default()
    });
    let summarizer = Arc::new(RecordingSummarizer::returning(None));
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        summarizer.clone(),
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();

    assert_eq!(report.new_articles.len(), 2);
    assert_eq!(sink.batch_count(), 2, "both deliveries were attempted");
    assert_eq!(summarizer.call_count(), 1);
}

#[tokio::test]
async fn invalid_source_url_is_skipped_without_counting() {
    let server = MockServer::start().await;
    mount_feed(&server, "/quiet", r#"{"reports": []}"#.to_string()).await;

    let sources = vec![
        SourceConfig {
            name: "Typo".to_string(),
            url: "not a url".to_string(),
            kind: SourceKind::Syndication,
        },
        json_source("Quiet", &server, "/quiet"),
    ];

    let sink = Arc::new(RecordingSink::default());
    let aggregator = Aggregator::new(
        test_settings(),
        Arc::new(MemoryLedger::new()),
        sink.clone(),
        Arc::new(RecordingSummarizer::returning(None)),
    )
    .unwrap();

    let report = aggregator.run(&sources).await.unwrap();
    assert_eq!(report.sources_checked, 1);
    assert_eq!(sink.texts().len(), 1);
}
