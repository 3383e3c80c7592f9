//! Statistics generation from persisted engine state
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics straight from the key-value store.

use crate::config::Config;
use crate::frontier::{DiscoveredUrl, FrontierStore};
use crate::learner::{DomainStat, PathPattern, SiteMap, SiteStatistics};
use crate::scorer::PriorityScorer;
use crate::state::CrawlState;
use crate::storage::{load_table, KeyValueStore, StorageResult, Table};

/// How many of the best-ranked frontier URLs are listed
const NEXT_UP_LIMIT: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of URLs in the frontier store
    pub discovered: usize,

    /// Number of URLs already dispatched
    pub visited: usize,

    /// Discovered URLs still waiting for a visit
    pub unvisited: usize,

    /// Persisted crawl singleton, if a crawl ever ran
    pub crawl_state: Option<CrawlState>,

    /// What the learner knows
    pub site: SiteStatistics,

    /// Highest-scoring unvisited URLs with their scores
    pub next_up: Vec<(String, f64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The key-value store holding the engine tables
/// * `config` - Supplies frontier capacity and learner settings
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A table could not be read or decoded
pub fn load_statistics(store: &dyn KeyValueStore, config: &Config) -> StorageResult<CrawlStatistics> {
    let discovered: Vec<DiscoveredUrl> = load_table(store, Table::Discovered)?.unwrap_or_default();
    let visited: Vec<String> = load_table(store, Table::Visited)?.unwrap_or_default();
    let domains: Vec<DomainStat> = load_table(store, Table::Domains)?.unwrap_or_default();
    let patterns: Vec<PathPattern> = load_table(store, Table::Patterns)?.unwrap_or_default();
    let crawl_state: Option<CrawlState> = load_table(store, Table::CrawlState)?;

    let frontier = FrontierStore::from_records(config.frontier.capacity, discovered, visited);
    let site_map = SiteMap::from_records(&config.learner, domains, patterns);

    let scorer = PriorityScorer::new(&site_map);
    let urls: Vec<&str> = frontier.unvisited().map(|d| d.url.as_str()).collect();
    let next_up = scorer
        .rank(&urls)
        .into_iter()
        .take(NEXT_UP_LIMIT)
        .map(|url| (url.to_string(), scorer.score(url)))
        .collect();

    Ok(CrawlStatistics {
        discovered: frontier.len(),
        visited: frontier.visited_count(),
        unvisited: frontier.unvisited_count(),
        crawl_state,
        site: site_map.statistics(),
        next_up,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Frontier:");
    println!("  Discovered URLs: {}", stats.discovered);
    println!("  Visited: {}", stats.visited);
    println!("  Unvisited: {}", stats.unvisited);
    println!();

    match &stats.crawl_state {
        Some(state) => {
            println!("Crawl State:");
            println!("  Enabled: {}", state.enabled);
            println!("  Interval: {}ms", state.request_interval_ms);
            match state.last_dispatch_at {
                Some(at) => println!("  Last dispatch: {}", at.to_rfc3339()),
                None => println!("  Last dispatch: never"),
            }
            println!("  Failed pages: {}", state.failed_count);
        }
        None => println!("Crawl State: no crawl has run yet"),
    }
    println!();

    println!("Learner:");
    println!("  Pages learned from: {}", stats.site.total_pages);
    println!("  Domains: {}", stats.site.total_domains);
    println!("  Patterns learned: {}", stats.site.patterns_learned);
    println!();

    if !stats.site.top_domains.is_empty() {
        println!("Top Domains by Entity Yield:");
        for domain in &stats.site.top_domains {
            println!(
                "  {}: {} entities over {} pages (collection score {:.2})",
                domain.domain,
                domain.entity_yield_total,
                domain.page_count,
                domain.avg_collection_score
            );
        }
        println!();
    }

    if !stats.site.top_patterns.is_empty() {
        println!("Top Patterns by Average Yield:");
        for pattern in &stats.site.top_patterns {
            println!(
                "  {}: {:.1} entities/page over {} pages",
                pattern.pattern, pattern.avg_entity_yield, pattern.occurrences
            );
        }
        println!();
    }

    if !stats.next_up.is_empty() {
        println!("Next Up ({}):", stats.next_up.len());
        for (url, score) in &stats.next_up {
            println!("  {:>6.1}  {}", score, url);
        }
        println!();
    }

    let failed = stats.crawl_state.as_ref().map_or(0, |s| s.failed_count);
    let success_rate = if stats.visited > 0 {
        (stats.visited.saturating_sub(failed as usize) as f64 / stats.visited as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} failed / {} visited)",
        success_rate, failed, stats.visited
    );
}
