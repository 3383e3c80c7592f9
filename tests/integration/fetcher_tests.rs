//! Integration tests for the HTTP page fetcher
//!
//! These tests use wiremock to serve pages and check how responses are
//! turned into links, structural signals and blocking signals.

use harvest_engine::config::{
    Config, CrawlerConfig, FrontierConfig, LearnerConfig, OutputConfig, TargetConfig,
    UserAgentConfig,
};
use harvest_engine::crawler::{FetchError, HttpPageFetcher, PageFetcher};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a test configuration
fn create_test_config() -> Config {
    Config {
        seeds: vec![],
        crawler: CrawlerConfig::default(),
        frontier: FrontierConfig::default(),
        learner: LearnerConfig::default(),
        target: TargetConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: "./unused.db".to_string(),
        },
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

#[tokio::test]
async fn test_fetch_extracts_links_and_signals() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let cards: String = (0..5)
        .map(|i| {
            format!(
                r#"<li class="card"><h3 class="name">Agency {i}</h3><a href="/agency/agency-{i}">Agency {i} profile</a></li>"#
            )
        })
        .collect();
    let body = format!(
        r#"<nav><a href="/about">About</a></nav>
        <ul class="grid">{}</ul>
        <div class="pagination"><a href="/agencies?page=2">2</a></div>"#,
        cards
    );

    Mock::given(method("GET"))
        .and(path("/agencies"))
        .respond_with(html(&body))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let page = fetcher
        .fetch(&format!("{}/agencies", base_url), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(page.final_url, format!("{}/agencies", base_url));
    assert!(!page.blocking_signal_detected);
    assert_eq!(page.links.len(), 7);
    assert_eq!(page.signals.total_links, 7);
    assert_eq!(page.signals.entity_links, 5);
    assert_eq!(page.signals.repeating_structures, 1);
    assert!(page.signals.has_pagination);
    assert!(page.signals.has_grid_or_list);

    let profile = page
        .links
        .iter()
        .find(|l| l.url.ends_with("/agency/agency-0"))
        .unwrap();
    assert!(profile.context.in_grid && profile.context.in_card);
    assert!(profile.confidence > 0.9);

    let about = page.links.iter().find(|l| l.url.ends_with("/about")).unwrap();
    assert!(about.context.in_nav);
    assert!(about.confidence < profile.confidence);
}

#[tokio::test]
async fn test_fetch_sends_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(html("<p>hello</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let page = fetcher.fetch(&mock_server.uri(), TIMEOUT).await;
    assert!(page.is_ok());
}

#[tokio::test]
async fn test_blocking_statuses_are_not_errors() {
    let mock_server = MockServer::start().await;

    for (route, status) in [("/limited", 429), ("/forbidden", 403), ("/unavailable", 503)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
    }

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    for route in ["/limited", "/forbidden", "/unavailable"] {
        let page = fetcher
            .fetch(&format!("{}{}", mock_server.uri(), route), TIMEOUT)
            .await
            .unwrap();
        assert!(page.blocking_signal_detected, "{} should block", route);
        assert!(page.links.is_empty());
    }
}

#[tokio::test]
async fn test_rate_limit_headers_block() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/exhausted"))
        .respond_with(
            html(r#"<a href="/agency/acme">Acme</a>"#).insert_header("X-RateLimit-Remaining", "0"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/retry"))
        .respond_with(html(r#"<a href="/agency/acme">Acme</a>"#).insert_header("Retry-After", "60"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/remaining"))
        .respond_with(
            html(r#"<a href="/agency/acme">Acme</a>"#).insert_header("X-RateLimit-Remaining", "40"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    for route in ["/exhausted", "/retry"] {
        let page = fetcher
            .fetch(&format!("{}{}", mock_server.uri(), route), TIMEOUT)
            .await
            .unwrap();
        assert!(page.blocking_signal_detected, "{} should block", route);
    }

    let page = fetcher
        .fetch(&format!("{}/remaining", mock_server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert!(!page.blocking_signal_detected);
    assert_eq!(page.links.len(), 1);
}

#[tokio::test]
async fn test_blocking_keywords_in_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/agencies"))
        .respond_with(html(
            r#"<h1>Please complete the CAPTCHA</h1><a href="/agency/acme">Acme</a>"#,
        ))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let page = fetcher
        .fetch(&format!("{}/agencies", mock_server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert!(page.blocking_signal_detected);
}

#[tokio::test]
async fn test_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let result = fetcher
        .fetch(&format!("{}/missing", mock_server.uri()), TIMEOUT)
        .await;
    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_content_type_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json"))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let result = fetcher
        .fetch(&format!("{}/data.json", mock_server.uri()), TIMEOUT)
        .await;

    match result {
        Err(FetchError::ContentMismatch { content_type, .. }) => {
            assert!(content_type.starts_with("application/json"));
        }
        other => panic!("expected content mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let result = fetcher
        .fetch(
            &format!("{}/slow", mock_server.uri()),
            Duration::from_millis(200),
        )
        .await;
    assert!(matches!(result, Err(FetchError::Timeout { .. })));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html(r#"<a href="/agency/acme">Acme</a>"#))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(&create_test_config()).unwrap();
    let page = fetcher
        .fetch(&format!("{}/old", base_url), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(page.final_url, format!("{}/new", base_url));
    assert_eq!(page.signals.entity_links, 1);
}
