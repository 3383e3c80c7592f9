//! Crawl engine - scheduling, learning and persistence
//!
//! The engine owns the frontier, the site map and the crawl state. A single
//! driver task (`CrawlEngine::run`) advances the scheduler one dispatch at a
//! time:
//! - Pick the highest-priority unvisited URL
//! - Hold it until the rate governor allows the dispatch
//! - Mark it visited, fetch it under a timeout
//! - Classify the page, learn from it, merge its links into the frontier
//! - Persist whatever changed
//!
//! Control calls (`start_crawl`, `stop_crawl`, ...) may come from any task.
//! They change state under the same lock and wake the driver.

use crate::classifier::{CollectionTag, CollectionTags, TagPartition};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::events::CrawlEvent;
use crate::crawler::fetcher::{FetchError, FetchedPage, PageFetcher};
use crate::crawler::governor::RateGovernor;
use crate::frontier::{DiscoveredUrl, FrontierStore, SourceMeta};
use crate::learner::{DomainStat, LinkStats, PathPattern, SiteMap, SiteStatistics};
use crate::scorer::PriorityScorer;
use crate::state::{CrawlPhase, CrawlState};
use crate::storage::{encode_table, load_table, KeyValueStore, StorageResult, Table};
use crate::url::{hostname, normalize_or_raw, normalize_url, LinkScope};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;

/// Smallest accepted dispatch interval
const MIN_INTERVAL_MS: u64 = 100;

/// Pause before a failed storage write is retried once
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Point-in-time view of the engine for hosts and the CLI
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub enabled: bool,
    pub phase: CrawlPhase,
    pub visited_count: usize,
    pub unvisited_count: usize,
    pub current_interval_ms: u64,
    pub failed_count: u64,
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

/// A fetch the driver should perform
struct Dispatch {
    url: String,
    epoch: u64,
    timeout: Duration,
}

/// What the driver does next
enum Step {
    /// Sleep until the deadline (or forever) unless woken
    Wait(Option<Instant>),
    Dispatch(Dispatch),
    /// State changed without a dispatch; evaluate again
    Continue,
}

struct EngineCore {
    crawler: CrawlerConfig,
    frontier: FrontierStore,
    site_map: SiteMap,
    tags: CollectionTags,
    state: CrawlState,
    phase: CrawlPhase,
    governor: RateGovernor,
    scope: LinkScope,

    /// Bumped by stop and shutdown so in-flight results can be recognised as stale
    epoch: u64,

    dirty: BTreeSet<Table>,
    shutting_down: bool,
    events: broadcast::Sender<CrawlEvent>,
}

/// Handle to a running crawl engine
///
/// Cloning is cheap; every clone controls the same engine.
#[derive(Clone)]
pub struct CrawlEngine {
    core: Arc<Mutex<EngineCore>>,
    wake: Arc<Notify>,
    events: broadcast::Sender<CrawlEvent>,
    store: Arc<Mutex<Box<dyn KeyValueStore>>>,
    fetcher: Arc<dyn PageFetcher>,

    /// Serializes flushes so an older snapshot never overwrites a newer one
    flush_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Reads a persisted table, treating unreadable data as absent
fn load_or_warn<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    table: Table,
    dirty: &mut BTreeSet<Table>,
) -> Option<T> {
    match load_table(store, table) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Discarding unreadable {} table: {}", table.key(), e);
            dirty.insert(table);
            None
        }
    }
}

impl CrawlEngine {
    /// Creates an engine from persisted state
    ///
    /// Every table is loaded from `store`; missing tables start empty and
    /// corrupt ones are logged and replaced. The engine always comes up
    /// stopped, keeping the persisted interval and failure count. Seeds from
    /// the configuration are added to the frontier.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `store` - Key-value store holding the engine tables
    /// * `fetcher` - The page-fetch collaborator
    pub fn init<S, F>(config: Config, store: S, fetcher: F) -> Self
    where
        S: KeyValueStore + 'static,
        F: PageFetcher + 'static,
    {
        let mut dirty = BTreeSet::new();

        let discovered: Vec<DiscoveredUrl> =
            load_or_warn(&store, Table::Discovered, &mut dirty).unwrap_or_default();
        let visited: Vec<String> =
            load_or_warn(&store, Table::Visited, &mut dirty).unwrap_or_default();
        let domains: Vec<DomainStat> =
            load_or_warn(&store, Table::Domains, &mut dirty).unwrap_or_default();
        let patterns: Vec<PathPattern> =
            load_or_warn(&store, Table::Patterns, &mut dirty).unwrap_or_default();
        let saved_state: Option<CrawlState> = load_or_warn(&store, Table::CrawlState, &mut dirty);
        let saved_tags: Vec<CollectionTag> =
            load_or_warn(&store, Table::CollectionTags, &mut dirty).unwrap_or_default();

        let loaded = discovered.len();
        let frontier = FrontierStore::from_records(config.frontier.capacity, discovered, visited);
        if frontier.len() < loaded {
            dirty.insert(Table::Discovered);
        }

        let site_map = SiteMap::from_records(&config.learner, domains, patterns);

        let mut tags = CollectionTags::from_records(saved_tags);
        for pattern in &config.target.collection_patterns {
            if !tags.has_pattern(pattern) && tags.add(pattern, "from configuration").is_some() {
                dirty.insert(Table::CollectionTags);
            }
        }

        let state = match saved_state {
            Some(mut state) => {
                if state.enabled {
                    tracing::info!("Previous session was crawling; waiting for start");
                    state.enabled = false;
                    dirty.insert(Table::CrawlState);
                }
                state
            }
            None => {
                dirty.insert(Table::CrawlState);
                CrawlState::new(config.crawler.request_interval_ms)
            }
        };

        let mut governor = RateGovernor::new(&config.crawler);
        governor.set_interval(Duration::from_millis(state.request_interval_ms));

        tracing::info!(
            "Engine loaded: {} discovered, {} visited, {} domains, {} patterns, {} collection tags",
            frontier.len(),
            frontier.visited_count(),
            site_map.domain_count(),
            site_map.pattern_count(),
            tags.len()
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store: Box<dyn KeyValueStore> = Box::new(store);

        let core = EngineCore {
            crawler: config.crawler.clone(),
            frontier,
            site_map,
            tags,
            state,
            phase: CrawlPhase::Stopped,
            governor,
            scope: LinkScope::from_config(&config.target),
            epoch: 0,
            dirty,
            shutting_down: false,
            events: events.clone(),
        };

        let engine = Self {
            core: Arc::new(Mutex::new(core)),
            wake: Arc::new(Notify::new()),
            events,
            store: Arc::new(Mutex::new(store)),
            fetcher: Arc::new(fetcher),
            flush_lock: Arc::new(tokio::sync::Mutex::new(())),
        };

        for seed in &config.seeds {
            if let Err(e) = engine.add_seed(seed) {
                tracing::warn!("Ignoring seed {}: {}", seed, e);
            }
        }

        engine
    }

    fn lock(&self) -> MutexGuard<'_, EngineCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a URL supplied by the operator
    ///
    /// Seeds bypass the link scope filter and enter with confidence 1.0.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was new to the frontier
    /// * `Ok(false)` - It was already known
    /// * `Err(HarvestError::Url)` - The URL is not a valid http(s) URL
    pub fn add_seed(&self, url: &str) -> crate::Result<bool> {
        normalize_url(url)?;

        let mut core = self.lock();
        let outcome = core.frontier.add_discovered(url, &SourceMeta::seed());
        core.dirty.insert(Table::Discovered);
        drop(core);

        self.wake.notify_one();
        Ok(outcome.is_new)
    }

    /// Enables crawling with the given base interval
    ///
    /// From `Stopped` or `Cooldown` the first dispatch is due immediately
    /// (subject to the rate gate). While scheduled or dispatching only the
    /// interval changes.
    pub fn start_crawl(&self, interval_ms: u64) {
        let interval_ms = interval_ms.max(MIN_INTERVAL_MS);

        let mut core = self.lock();
        core.state.enabled = true;
        core.state.request_interval_ms = interval_ms;
        core.governor.set_interval(Duration::from_millis(interval_ms));
        core.dirty.insert(Table::CrawlState);

        if matches!(core.phase, CrawlPhase::Stopped | CrawlPhase::Cooldown { .. }) {
            core.phase = CrawlPhase::Scheduled {
                at: Instant::now(),
            };
        }
        tracing::info!("Crawl started ({} ms interval)", interval_ms);
        drop(core);

        self.wake.notify_one();
    }

    /// Disables crawling from any phase
    ///
    /// Pending timers, including a cooldown resume, are cancelled. A fetch in
    /// flight is allowed to finish but its result is discarded.
    pub fn stop_crawl(&self) {
        let mut core = self.lock();
        core.state.enabled = false;
        core.phase = CrawlPhase::Stopped;
        core.epoch += 1;
        core.dirty.insert(Table::CrawlState);
        tracing::info!("Crawl stopped");
        drop(core);

        self.wake.notify_one();
    }

    /// Forgets every visit so all discovered URLs can be dispatched again
    pub fn reset_visited(&self) {
        let mut core = self.lock();
        let cleared = core.frontier.visited_count();
        core.frontier.reset_visited();
        core.dirty.insert(Table::Visited);
        tracing::info!("Reset {} visited URLs", cleared);
        drop(core);

        self.wake.notify_one();
    }

    pub fn get_state(&self) -> EngineSnapshot {
        let core = self.lock();
        EngineSnapshot {
            enabled: core.state.enabled,
            phase: core.phase.clone(),
            visited_count: core.frontier.visited_count(),
            unvisited_count: core.frontier.unvisited_count(),
            current_interval_ms: core.state.request_interval_ms,
            failed_count: core.state.failed_count,
            last_dispatch_at: core.state.last_dispatch_at,
        }
    }

    pub fn get_site_statistics(&self) -> SiteStatistics {
        self.lock().site_map.statistics()
    }

    pub fn collection_tags(&self) -> Vec<CollectionTag> {
        self.lock().tags.records().to_vec()
    }

    /// Adds an enabled collection tag
    ///
    /// Returns `None` when the pattern is blank.
    pub fn add_collection_tag(&self, pattern: &str, description: &str) -> Option<CollectionTag> {
        let mut core = self.lock();
        let tag = core.tags.add(pattern, description)?;
        core.dirty.insert(Table::CollectionTags);
        tracing::info!("Added collection tag {} ({})", tag.id, tag.pattern);
        Some(tag)
    }

    pub fn remove_collection_tag(&self, id: u64) -> bool {
        let mut core = self.lock();
        let removed = core.tags.remove(id);
        if removed {
            core.dirty.insert(Table::CollectionTags);
        }
        removed
    }

    pub fn set_collection_tag_enabled(&self, id: u64, enabled: bool) -> bool {
        let mut core = self.lock();
        let found = core.tags.set_enabled(id, enabled);
        if found {
            core.dirty.insert(Table::CollectionTags);
        }
        found
    }

    /// Splits the unvisited frontier by collection tag
    pub fn classify_frontier(&self) -> TagPartition {
        let core = self.lock();
        core.tags
            .partition(core.frontier.unvisited().map(|d| d.url.as_str()))
    }

    /// Scores the unvisited frontier, best first
    pub fn ranked_frontier(&self) -> Vec<(String, f64)> {
        let core = self.lock();
        let scorer = PriorityScorer::new(&core.site_map).with_collection_tags(&core.tags);
        let urls: Vec<&str> = core.frontier.unvisited().map(|d| d.url.as_str()).collect();
        scorer
            .rank(&urls)
            .into_iter()
            .map(|url| (url.to_string(), scorer.score(url)))
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// Drives the scheduler until `shutdown` is called
    pub async fn run(&self) {
        let flush_every = {
            let core = self.lock();
            Duration::from_secs(core.crawler.flush_interval_secs)
        };
        tracing::info!("Crawl driver running");

        loop {
            let step = {
                let mut core = self.lock();
                if core.shutting_down {
                    break;
                }
                core.next_step(Instant::now())
            };

            match step {
                Step::Continue => {}
                Step::Dispatch(dispatch) => self.dispatch(dispatch).await,
                Step::Wait(deadline) => {
                    let deadline = if self.has_dirty() {
                        let flush_at = Instant::now() + flush_every;
                        Some(deadline.map_or(flush_at, |d| d.min(flush_at)))
                    } else {
                        deadline
                    };

                    match deadline {
                        Some(at) => {
                            tokio::select! {
                                _ = tokio::time::sleep_until(at) => {}
                                _ = self.wake.notified() => {}
                            }
                        }
                        None => self.wake.notified().await,
                    }
                }
            }

            if self.has_dirty() {
                // Failures are reported by flush and retried next turn
                let _ = self.flush().await;
            }
        }

        tracing::info!("Crawl driver stopped");
    }

    async fn dispatch(&self, dispatch: Dispatch) {
        let Dispatch {
            url,
            epoch,
            timeout,
        } = dispatch;

        tracing::debug!("Dispatching {}", url);
        let result = match tokio::time::timeout(timeout, self.fetcher.fetch(&url, timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { url: url.clone() }),
        };

        let mut core = self.lock();
        if core.epoch != epoch || core.shutting_down {
            tracing::debug!("Discarding result for {} after stop", url);
            return;
        }
        core.complete_dispatch(&url, result, Instant::now());
    }

    fn has_dirty(&self) -> bool {
        !self.lock().dirty.is_empty()
    }

    /// Writes every changed table to the store
    ///
    /// A failed write is retried once after 200 ms. If it fails again a
    /// `PersistenceWarning` is published, the table stays dirty for the next
    /// flush and the engine keeps running from memory.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every dirty table was written
    /// * `Err(StorageError)` - The first write that failed
    pub async fn flush(&self) -> StorageResult<()> {
        let _guard = self.flush_lock.lock().await;
        let pending = self.lock().take_dirty();

        let mut first_error = None;
        for (table, encoded) in pending {
            let written = match encoded {
                Ok(json) => self.write_with_retry(table, &json).await,
                Err(e) => Err(e),
            };

            if let Err(e) = written {
                let message = format!("Failed to persist {}: {}", table.key(), e);
                tracing::warn!("{}", message);
                self.lock().dirty.insert(table);
                let _ = self.events.send(CrawlEvent::PersistenceWarning { message });
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn write_with_retry(&self, table: Table, json: &str) -> StorageResult<()> {
        match self.write(table, json) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("Write of {} failed, retrying: {}", table.key(), e);
                tokio::time::sleep(WRITE_RETRY_DELAY).await;
                self.write(table, json)
            }
        }
    }

    fn write(&self, table: Table, json: &str) -> StorageResult<()> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.set(table.key(), json)
    }

    /// Stops the driver and writes out all pending state
    ///
    /// The persisted `enabled` flag is left as it was so the next session can
    /// tell that a crawl was interrupted.
    pub async fn shutdown(&self) -> StorageResult<()> {
        {
            let mut core = self.lock();
            core.shutting_down = true;
            core.phase = CrawlPhase::Stopped;
            core.epoch += 1;
        }
        self.wake.notify_one();
        tracing::info!("Engine shutting down");
        self.flush().await
    }
}

impl EngineCore {
    fn emit(&self, event: CrawlEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Advances the state machine at `now`
    fn next_step(&mut self, now: Instant) -> Step {
        match self.phase {
            CrawlPhase::Stopped | CrawlPhase::Dispatching { .. } => Step::Wait(None),
            CrawlPhase::Cooldown { resume_at } => {
                if now < resume_at {
                    return Step::Wait(Some(resume_at));
                }
                self.phase = if self.state.enabled {
                    tracing::info!("Cooldown over, resuming");
                    CrawlPhase::Scheduled { at: now }
                } else {
                    CrawlPhase::Stopped
                };
                Step::Continue
            }
            CrawlPhase::Scheduled { at } => {
                if now < at {
                    return Step::Wait(Some(at));
                }
                self.try_dispatch(now)
            }
        }
    }

    fn try_dispatch(&mut self, now: Instant) -> Step {
        let scorer = PriorityScorer::new(&self.site_map).with_collection_tags(&self.tags);
        let next = scorer
            .select_next(self.frontier.unvisited())
            .map(|d| (d.url.clone(), d.normalized_url.clone()));

        let Some((url, normalized)) = next else {
            tracing::info!("Frontier exhausted, crawl complete");
            self.state.enabled = false;
            self.phase = CrawlPhase::Stopped;
            self.dirty.insert(Table::CrawlState);
            self.emit(CrawlEvent::Complete);
            return Step::Continue;
        };

        let domain = hostname(&url);
        let gate = self.governor.gate(domain.as_deref(), now);
        if gate > now {
            tracing::debug!("Holding {} for {:?}", url, gate - now);
            self.phase = CrawlPhase::Scheduled { at: gate };
            return Step::Wait(Some(gate));
        }

        self.frontier.mark_visited(&normalized);
        self.governor.record_dispatch(domain.as_deref(), now);
        self.state.last_dispatch_at = Some(Utc::now());
        self.dirty.insert(Table::Visited);
        self.dirty.insert(Table::CrawlState);
        self.phase = CrawlPhase::Dispatching { url: url.clone() };

        Step::Dispatch(Dispatch {
            url,
            epoch: self.epoch,
            timeout: Duration::from_millis(self.crawler.fetch_timeout_ms),
        })
    }

    fn complete_dispatch(
        &mut self,
        url: &str,
        result: Result<FetchedPage, FetchError>,
        now: Instant,
    ) {
        match result {
            Ok(page) if page.blocking_signal_detected => {
                let cooldown_ms = self.crawler.cooldown_ms;
                tracing::warn!("Blocking signal on {}, cooling down for {} ms", url, cooldown_ms);
                self.phase = CrawlPhase::Cooldown {
                    resume_at: now + Duration::from_millis(cooldown_ms),
                };
                self.emit(CrawlEvent::Blocked {
                    url: url.to_string(),
                    cooldown_ms,
                });
                return;
            }
            Ok(page) => self.ingest_page(url, page),
            Err(e) => {
                self.state.failed_count += 1;
                self.dirty.insert(Table::CrawlState);
                tracing::warn!(
                    "Fetch failed for {} (domain {}): {}",
                    url,
                    hostname(url).unwrap_or_default(),
                    e
                );
                self.emit(CrawlEvent::FetchFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                    failed_count: self.state.failed_count,
                });
            }
        }

        let gap = self.governor.next_gap();
        self.phase = CrawlPhase::Scheduled { at: now + gap };
    }

    /// Classifies a fetched page, learns from it and merges its links
    fn ingest_page(&mut self, url: &str, page: FetchedPage) {
        let page_url = if page.final_url.is_empty() {
            url.to_string()
        } else {
            page.final_url.clone()
        };

        // A redirect target counts as visited too
        if page_url != url && self.frontier.mark_visited(&normalize_or_raw(&page_url)) {
            self.dirty.insert(Table::Visited);
        }

        let classification = self.tags.classify(&page_url, &page.signals);
        let stats = LinkStats {
            total_links: page.signals.total_links,
            entity_count: page.signals.entity_links,
        };

        if let Some(outcome) = self.site_map.record_page(&page_url, &classification, stats) {
            self.dirty.insert(Table::Domains);
            if let Some(pattern) = outcome.pattern {
                tracing::debug!("Learned from {} as pattern {}", page_url, pattern);
                self.dirty.insert(Table::Patterns);
            }
        }

        let mut added = 0;
        for link in &page.links {
            if !self.scope.allows(&link.url) {
                continue;
            }
            let source =
                SourceMeta::from_page(&page_url, classification.page_type, link.confidence);
            if self.frontier.add_discovered(&link.url, &source).is_new {
                added += 1;
            }
            self.dirty.insert(Table::Discovered);
        }

        tracing::info!(
            "Visited {} [{}] {} links, {} new",
            url,
            classification.page_type,
            page.links.len(),
            added
        );

        self.emit(CrawlEvent::Progress {
            current_url: url.to_string(),
            visited_count: self.frontier.visited_count(),
            unvisited_count: self.frontier.unvisited_count(),
            page_type: classification.page_type,
        });
    }

    /// Takes the dirty set, encoding each table's current contents
    fn take_dirty(&mut self) -> Vec<(Table, StorageResult<String>)> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|table| (table, self.encode(table)))
            .collect()
    }

    fn encode(&self, table: Table) -> StorageResult<String> {
        match table {
            Table::Discovered => encode_table(&self.frontier.discovered().collect::<Vec<_>>()),
            Table::Visited => encode_table(&self.frontier.visited_sorted()),
            Table::Domains => encode_table(&self.site_map.domain_records()),
            Table::Patterns => encode_table(&self.site_map.pattern_records()),
            Table::CrawlState => encode_table(&self.state),
            Table::CollectionTags => encode_table(self.tags.records()),
        }
    }
}
