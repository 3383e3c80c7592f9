use crate::classifier::Classification;
use crate::config::LearnerConfig;
use crate::learner::{LinkStats, SiteStatistics};
use crate::url::{extract_domain, generalize_path};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use url::Url;

/// How many entries `statistics()` reports per ranking
const TOP_N: usize = 5;

/// Learned statistics for one hostname
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStat {
    pub domain: String,
    pub page_count: u64,
    pub entity_yield_total: u64,
    pub collection_page_count: u64,
    pub avg_collection_score: f64,
}

impl DomainStat {
    fn new(domain: String) -> Self {
        Self {
            domain,
            page_count: 0,
            entity_yield_total: 0,
            collection_page_count: 0,
            avg_collection_score: 0.0,
        }
    }
}

/// Learned statistics for one generalized path pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPattern {
    pub pattern: String,
    pub occurrences: u64,
    pub avg_entity_yield: f64,
    pub avg_collection_score: f64,

    /// Most recent concrete URLs that matched, oldest first
    pub example_urls: VecDeque<String>,
}

impl PathPattern {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            occurrences: 0,
            avg_entity_yield: 0.0,
            avg_collection_score: 0.0,
            example_urls: VecDeque::new(),
        }
    }
}

/// What a call to `SiteMap::record_page` changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub domain: String,

    /// The pattern that was updated, if the page cleared the learn threshold
    pub pattern: Option<String>,
}

/// Running mean after the `n`th observation (`n` counted after the increment)
fn running_mean(old_avg: f64, n: u64, value: f64) -> f64 {
    (old_avg * (n - 1) as f64 + value) / n as f64
}

/// Per-domain and per-pattern statistics learned from visited pages
#[derive(Debug, Clone)]
pub struct SiteMap {
    domains: HashMap<String, DomainStat>,
    patterns: HashMap<String, PathPattern>,
    learn_threshold: u32,
    example_limit: usize,
}

impl SiteMap {
    pub fn new(config: &LearnerConfig) -> Self {
        Self {
            domains: HashMap::new(),
            patterns: HashMap::new(),
            learn_threshold: config.learn_threshold,
            example_limit: config.example_limit.max(1),
        }
    }

    /// Rebuilds a site map from persisted records
    pub fn from_records(
        config: &LearnerConfig,
        domains: Vec<DomainStat>,
        patterns: Vec<PathPattern>,
    ) -> Self {
        let mut map = Self::new(config);
        map.domains = domains
            .into_iter()
            .map(|d| (d.domain.clone(), d))
            .collect();
        map.patterns = patterns
            .into_iter()
            .map(|p| (p.pattern.clone(), p))
            .collect();
        map
    }

    /// Records one classified page
    ///
    /// The domain entry is always updated. The path pattern entry is updated
    /// only when the page yielded more entities than the learn threshold, so
    /// low-signal pages do not dilute pattern averages.
    ///
    /// # Returns
    ///
    /// * `Some(RecordOutcome)` - What was updated
    /// * `None` - The page URL could not be parsed; nothing was recorded
    pub fn record_page(
        &mut self,
        page_url: &str,
        classification: &Classification,
        link_stats: LinkStats,
    ) -> Option<RecordOutcome> {
        let parsed = match Url::parse(page_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Not learning from unparsable URL {}: {}", page_url, e);
                return None;
            }
        };

        let Some(domain) = extract_domain(&parsed) else {
            tracing::warn!("Not learning from URL without host: {}", page_url);
            return None;
        };

        let stat = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| DomainStat::new(domain.clone()));
        stat.page_count += 1;
        stat.entity_yield_total += u64::from(link_stats.entity_count);
        if classification.is_collection() {
            stat.collection_page_count += 1;
        }
        stat.avg_collection_score = running_mean(
            stat.avg_collection_score,
            stat.page_count,
            classification.collection_score,
        );

        let mut outcome = RecordOutcome {
            domain,
            pattern: None,
        };

        if link_stats.entity_count > self.learn_threshold {
            let key = generalize_path(parsed.path());
            let pattern = self
                .patterns
                .entry(key.clone())
                .or_insert_with(|| PathPattern::new(key.clone()));

            pattern.occurrences += 1;
            pattern.avg_entity_yield = running_mean(
                pattern.avg_entity_yield,
                pattern.occurrences,
                f64::from(link_stats.entity_count),
            );
            pattern.avg_collection_score = running_mean(
                pattern.avg_collection_score,
                pattern.occurrences,
                classification.collection_score,
            );
            pattern.example_urls.push_back(page_url.to_string());
            while pattern.example_urls.len() > self.example_limit {
                pattern.example_urls.pop_front();
            }

            tracing::debug!(
                "Learned pattern '{}' ({} occurrences, avg yield {:.1})",
                key,
                pattern.occurrences,
                pattern.avg_entity_yield
            );
            outcome.pattern = Some(key);
        }

        Some(outcome)
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainStat> {
        self.domains.get(domain)
    }

    pub fn pattern(&self, pattern: &str) -> Option<&PathPattern> {
        self.patterns.get(pattern)
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Domain records sorted by hostname
    pub fn domain_records(&self) -> Vec<DomainStat> {
        let mut records: Vec<DomainStat> = self.domains.values().cloned().collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        records
    }

    /// Pattern records sorted by pattern key
    pub fn pattern_records(&self) -> Vec<PathPattern> {
        let mut records: Vec<PathPattern> = self.patterns.values().cloned().collect();
        records.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        records
    }

    /// Summarizes the learned tables
    ///
    /// Rankings break ties by key so the output does not depend on hash order.
    pub fn statistics(&self) -> SiteStatistics {
        let mut top_domains = self.domain_records();
        top_domains.sort_by(|a, b| b.entity_yield_total.cmp(&a.entity_yield_total));
        top_domains.truncate(TOP_N);

        let mut top_patterns = self.pattern_records();
        top_patterns.sort_by(|a, b| b.avg_entity_yield.total_cmp(&a.avg_entity_yield));
        top_patterns.truncate(TOP_N);

        SiteStatistics {
            total_pages: self.domains.values().map(|d| d.page_count).sum(),
            total_domains: self.domains.len(),
            patterns_learned: self.patterns.len(),
            top_domains,
            top_patterns,
        }
    }
}
