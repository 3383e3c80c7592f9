//! Integration tests for the crawl engine
//!
//! These tests drive the engine with a scripted page fetcher on a paused
//! tokio clock, so intervals, cooldowns and timeouts elapse instantly.

use async_trait::async_trait;
use harvest_engine::classifier::StructuralSignals;
use harvest_engine::config::{
    Config, CrawlerConfig, FrontierConfig, LearnerConfig, OutputConfig, TargetConfig,
    UserAgentConfig,
};
use harvest_engine::crawler::{
    CrawlEngine, CrawlEvent, ExtractedLink, FetchError, FetchedPage, LinkContext, PageFetcher,
};
use harvest_engine::state::CrawlPhase;
use harvest_engine::storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;

const COOLDOWN_MS: u64 = 60_000;

/// What the scripted fetcher answers for a URL
#[derive(Clone)]
enum Scripted {
    Page(FetchedPage),
    Fail,
    Hang,
}

/// Page fetcher that answers from a script and records every call
#[derive(Clone, Default)]
struct ScriptedFetcher {
    script: Arc<Mutex<HashMap<String, Scripted>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    fn script(&self, url: &str, answer: Scripted) {
        self.script.lock().unwrap().insert(url.to_string(), answer);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let answer = self.script.lock().unwrap().get(url).cloned();

        match answer {
            Some(Scripted::Page(page)) => Ok(page),
            Some(Scripted::Fail) => Err(FetchError::Navigation {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Ok(FetchedPage {
                final_url: url.to_string(),
                ..FetchedPage::default()
            }),
        }
    }
}

/// Store whose writes always fail
struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }

    fn remove(&mut self, _key: &str) -> StorageResult<()> {
        Ok(())
    }
}

/// Creates a test configuration with short timings
fn create_test_config() -> Config {
    Config {
        seeds: vec![],
        crawler: CrawlerConfig {
            request_interval_ms: 1000,
            fetch_timeout_ms: 500,
            jitter: 0.0,
            cooldown_ms: COOLDOWN_MS,
            base_domain_delay_ms: 100,
            ..CrawlerConfig::default()
        },
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

fn spawn_driver(engine: &CrawlEngine) -> JoinHandle<()> {
    let engine = engine.clone();
    tokio::spawn(async move { engine.run().await })
}

/// Waits (on the paused clock) for the first event matching `pred`
async fn wait_for<F>(events: &mut Receiver<CrawlEvent>, pred: F) -> CrawlEvent
where
    F: Fn(&CrawlEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never arrived")
}

fn link(url: &str, confidence: f64) -> ExtractedLink {
    ExtractedLink {
        url: url.to_string(),
        anchor_text: "Profile".to_string(),
        context: LinkContext::default(),
        confidence,
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_order_follows_priority() {
    let fetcher = ScriptedFetcher::default();
    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());

    // Scores 80, 50, 90
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();
    engine.add_seed("https://ex.com/directory/web").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;

    assert_eq!(
        fetcher.calls(),
        vec![
            "https://ex.com/directory/web",
            "https://ex.com/agencies",
            "https://ex.com/about-us",
        ]
    );

    let snapshot = engine.get_state();
    assert!(!snapshot.enabled);
    assert_eq!(snapshot.phase, CrawlPhase::Stopped);
    assert_eq!(snapshot.visited_count, 3);
    assert_eq!(snapshot.unvisited_count, 0);
    assert!(snapshot.last_dispatch_at.is_some());

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_are_spaced_by_interval() {
    let fetcher = ScriptedFetcher::default();
    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    let started = tokio::time::Instant::now();
    engine.start_crawl(1000);

    wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;

    // First dispatch is immediate, the second waits one interval
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert!(started.elapsed() < Duration::from_millis(1500));

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_blocking_enters_cooldown_and_stop_cancels_resume() {
    let fetcher = ScriptedFetcher::default();
    fetcher.script(
        "https://ex.com/agencies",
        Scripted::Page(FetchedPage::blocked("https://ex.com/agencies")),
    );

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    let blocked = wait_for(&mut events, |e| matches!(e, CrawlEvent::Blocked { .. })).await;
    assert_eq!(
        blocked,
        CrawlEvent::Blocked {
            url: "https://ex.com/agencies".to_string(),
            cooldown_ms: COOLDOWN_MS,
        }
    );
    assert!(matches!(engine.get_state().phase, CrawlPhase::Cooldown { .. }));

    engine.stop_crawl();
    assert_eq!(engine.get_state().phase, CrawlPhase::Stopped);

    tokio::time::sleep(Duration::from_millis(COOLDOWN_MS * 2)).await;

    let snapshot = engine.get_state();
    assert!(!snapshot.enabled);
    assert_eq!(snapshot.phase, CrawlPhase::Stopped);
    assert_eq!(fetcher.calls(), vec!["https://ex.com/agencies"]);

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_resumes_when_enabled() {
    let fetcher = ScriptedFetcher::default();
    fetcher.script(
        "https://ex.com/agencies",
        Scripted::Page(FetchedPage::blocked("https://ex.com/agencies")),
    );

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    let started = tokio::time::Instant::now();
    engine.start_crawl(1000);

    wait_for(&mut events, |e| matches!(e, CrawlEvent::Blocked { .. })).await;
    let progress = wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;

    assert!(started.elapsed() >= Duration::from_millis(COOLDOWN_MS));
    match progress {
        CrawlEvent::Progress { current_url, .. } => {
            assert_eq!(current_url, "https://ex.com/about-us")
        }
        other => panic!("unexpected event {:?}", other),
    }

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_stays_visited() {
    let fetcher = ScriptedFetcher::default();
    fetcher.script("https://ex.com/agencies", Scripted::Fail);

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    let failed = wait_for(&mut events, |e| matches!(e, CrawlEvent::FetchFailed { .. })).await;
    match failed {
        CrawlEvent::FetchFailed {
            url, failed_count, ..
        } => {
            assert_eq!(url, "https://ex.com/agencies");
            assert_eq!(failed_count, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;

    // Never retried
    assert_eq!(
        fetcher.calls(),
        vec!["https://ex.com/agencies", "https://ex.com/about-us"]
    );
    assert_eq!(engine.get_state().failed_count, 1);

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hung_fetch_times_out() {
    let fetcher = ScriptedFetcher::default();
    fetcher.script("https://ex.com/agencies", Scripted::Hang);

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    let failed = wait_for(&mut events, |e| matches!(e, CrawlEvent::FetchFailed { .. })).await;
    match failed {
        CrawlEvent::FetchFailed { error, .. } => assert!(error.contains("timed out")),
        other => panic!("unexpected event {:?}", other),
    }

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_result() {
    let fetcher = ScriptedFetcher::default();
    fetcher.script("https://ex.com/agencies", Scripted::Hang);

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    while !matches!(engine.get_state().phase, CrawlPhase::Dispatching { .. }) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    engine.stop_crawl();

    // Let the fetch time out behind the stop
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = engine.get_state();
    assert_eq!(snapshot.phase, CrawlPhase::Stopped);
    assert_eq!(snapshot.failed_count, 0);
    assert_eq!(snapshot.visited_count, 1);
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_page_is_learned_and_links_ingested() {
    let fetcher = ScriptedFetcher::default();

    let mut links: Vec<ExtractedLink> = (0..12)
        .map(|i| link(&format!("https://ex.com/agency/{}", 1000 + i), 0.9))
        .collect();
    links.push(link("https://ex.com/login", 0.5));
    links.push(link("https://ex.com/agency/1000/#reviews", 0.95));

    fetcher.script(
        "https://ex.com/agencies",
        Scripted::Page(FetchedPage {
            final_url: "https://ex.com/agencies".to_string(),
            links,
            signals: StructuralSignals {
                link_density: 8.0,
                repeating_structures: 4,
                has_pagination: true,
                has_grid_or_list: true,
                total_links: 60,
                entity_links: 12,
            },
            blocking_signal_detected: false,
        }),
    );

    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    let progress = wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;
    engine.stop_crawl();

    match progress {
        CrawlEvent::Progress {
            current_url,
            visited_count,
            unvisited_count,
            page_type,
        } => {
            assert_eq!(current_url, "https://ex.com/agencies");
            assert_eq!(visited_count, 1);
            // Twelve profiles; the login link is out of scope and the
            // fragment variant deduplicates
            assert_eq!(unvisited_count, 12);
            assert_eq!(page_type, harvest_engine::PageType::Collection);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let stats = engine.get_site_statistics();
    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.total_domains, 1);
    assert_eq!(stats.patterns_learned, 1);
    assert_eq!(stats.top_patterns[0].pattern, "agencies");
    assert_eq!(stats.top_patterns[0].avg_entity_yield, 12.0);
    assert_eq!(stats.top_domains[0].entity_yield_total, 12);

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_restart() {
    let store = MemoryStore::new();
    let fetcher = ScriptedFetcher::default();

    let engine = CrawlEngine::init(create_test_config(), store.clone(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();
    engine.add_seed("https://ex.com/about-us").unwrap();
    engine.add_seed("https://ex.com/directory/web").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(2500);

    // Visit one page, then stop
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;
    engine.stop_crawl();
    engine.shutdown().await.unwrap();
    driver.await.unwrap();

    let before = engine.get_site_statistics();

    let restarted = CrawlEngine::init(create_test_config(), store.clone(), fetcher.clone());
    let snapshot = restarted.get_state();
    assert!(!snapshot.enabled);
    assert_eq!(snapshot.phase, CrawlPhase::Stopped);
    assert_eq!(snapshot.visited_count, 1);
    assert_eq!(snapshot.unvisited_count, 2);
    assert_eq!(snapshot.current_interval_ms, 2500);
    assert_eq!(restarted.get_site_statistics(), before);

    // The visited page is not dispatched again
    let mut events = restarted.subscribe();
    let driver = spawn_driver(&restarted);
    restarted.start_crawl(1000);
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;

    assert_eq!(
        fetcher.calls(),
        vec![
            "https://ex.com/directory/web",
            "https://ex.com/agencies",
            "https://ex.com/about-us",
        ]
    );

    restarted.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reset_visited_makes_urls_eligible_again() {
    let fetcher = ScriptedFetcher::default();
    let engine = CrawlEngine::init(create_test_config(), MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);

    engine.start_crawl(1000);
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;
    assert_eq!(engine.get_state().unvisited_count, 0);

    engine.reset_visited();
    assert_eq!(engine.get_state().unvisited_count, 1);

    engine.start_crawl(1000);
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;
    assert_eq!(fetcher.calls().len(), 2);

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_warns_and_keeps_running() {
    let fetcher = ScriptedFetcher::default();
    let engine = CrawlEngine::init(create_test_config(), FailingStore, fetcher.clone());
    engine.add_seed("https://ex.com/agencies").unwrap();

    let mut events = engine.subscribe();
    assert!(engine.flush().await.is_err());

    let warning = wait_for(&mut events, |e| {
        matches!(e, CrawlEvent::PersistenceWarning { .. })
    })
    .await;
    match warning {
        CrawlEvent::PersistenceWarning { message } => assert!(message.contains("disk full")),
        other => panic!("unexpected event {:?}", other),
    }

    // Still crawls from memory
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);
    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;
    assert_eq!(fetcher.calls(), vec!["https://ex.com/agencies"]);

    assert!(engine.shutdown().await.is_err());
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_tagged_page_is_dispatched_first_and_counts_as_collection() {
    let fetcher = ScriptedFetcher::default();
    let mut config = create_test_config();
    config.target.collection_patterns = vec!["/best/".to_string()];

    let engine = CrawlEngine::init(config, MemoryStore::new(), fetcher.clone());
    engine.add_seed("https://ex.com/directory/web").unwrap();
    engine.add_seed("https://ex.com/best/web").unwrap();

    let mut events = engine.subscribe();
    let driver = spawn_driver(&engine);
    engine.start_crawl(1000);

    let progress = wait_for(&mut events, |e| matches!(e, CrawlEvent::Progress { .. })).await;
    match progress {
        CrawlEvent::Progress {
            current_url,
            page_type,
            ..
        } => {
            assert_eq!(current_url, "https://ex.com/best/web");
            assert_eq!(page_type, harvest_engine::PageType::Collection);
        }
        other => panic!("unexpected event {:?}", other),
    }

    wait_for(&mut events, |e| matches!(e, CrawlEvent::Complete)).await;
    assert_eq!(
        fetcher.calls(),
        vec!["https://ex.com/best/web", "https://ex.com/directory/web"]
    );

    let stats = engine.get_site_statistics();
    assert_eq!(stats.top_domains[0].collection_page_count, 1);

    engine.shutdown().await.unwrap();
    driver.await.unwrap();
}
