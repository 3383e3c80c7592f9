use crate::frontier::{DiscoveredUrl, SourceMeta};
use crate::url::normalize_or_raw;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Result of `FrontierStore::add_discovered`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Whether a new entry was created
    pub is_new: bool,

    /// How many old entries were evicted to stay within capacity
    pub evicted: usize,
}

/// Discovered URLs and the visited set
///
/// Entries are kept in discovery order. The first sighting of a normalized
/// URL wins: later sightings can only raise its confidence.
#[derive(Debug, Clone)]
pub struct FrontierStore {
    discovered: IndexMap<String, DiscoveredUrl>,
    visited: HashSet<String>,
    capacity: usize,
}

impl FrontierStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            discovered: IndexMap::new(),
            visited: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuilds a store from persisted records
    ///
    /// Duplicate records keep the first occurrence; capacity is enforced
    /// afterwards in case the limit was lowered since the records were written.
    pub fn from_records(
        capacity: usize,
        discovered: Vec<DiscoveredUrl>,
        visited: Vec<String>,
    ) -> Self {
        let mut store = Self::new(capacity);
        for record in discovered {
            store
                .discovered
                .entry(record.normalized_url.clone())
                .or_insert(record);
        }
        store.visited = visited.into_iter().collect();
        store.enforce_capacity();
        store
    }

    /// Adds a URL found on a page, timestamped now
    pub fn add_discovered(&mut self, url: &str, source: &SourceMeta) -> AddOutcome {
        self.add_discovered_at(url, source, Utc::now())
    }

    /// Adds a URL with an explicit discovery time
    ///
    /// # Arguments
    ///
    /// * `url` - The URL as extracted; malformed URLs are keyed by their raw text
    /// * `source` - Where the URL was found
    /// * `at` - Discovery timestamp recorded for new entries
    ///
    /// # Returns
    ///
    /// `is_new` is false when the normalized form was already present, in
    /// which case only the confidence may have been raised.
    pub fn add_discovered_at(
        &mut self,
        url: &str,
        source: &SourceMeta,
        at: DateTime<Utc>,
    ) -> AddOutcome {
        let normalized = normalize_or_raw(url);

        if let Some(existing) = self.discovered.get_mut(&normalized) {
            existing.confidence = existing.confidence.max(source.confidence.clamp(0.0, 1.0));
            return AddOutcome {
                is_new: false,
                evicted: 0,
            };
        }

        let entry = DiscoveredUrl::new(url, normalized.clone(), source, at);
        self.discovered.insert(normalized, entry);
        let evicted = self.enforce_capacity();

        AddOutcome {
            is_new: true,
            evicted,
        }
    }

    /// Drops the oldest entries beyond capacity; the visited set is untouched
    fn enforce_capacity(&mut self) -> usize {
        let excess = self.discovered.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.discovered.drain(..excess);
            tracing::debug!("Evicted {} oldest frontier entries", excess);
        }
        excess
    }

    /// Marks a normalized URL as dispatched
    ///
    /// Returns true if it was not visited before.
    pub fn mark_visited(&mut self, normalized_url: &str) -> bool {
        self.visited.insert(normalized_url.to_string())
    }

    /// Checks the visited set, normalizing the argument first
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&normalize_or_raw(url))
    }

    /// Discovered URLs not yet visited, in discovery order
    pub fn unvisited(&self) -> impl Iterator<Item = &DiscoveredUrl> {
        self.discovered
            .values()
            .filter(|entry| !self.visited.contains(&entry.normalized_url))
    }

    /// Forgets every visit so all discovered URLs become eligible again
    pub fn reset_visited(&mut self) {
        self.visited.clear();
    }

    pub fn get(&self, url: &str) -> Option<&DiscoveredUrl> {
        self.discovered.get(&normalize_or_raw(url))
    }

    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn unvisited_count(&self) -> usize {
        self.unvisited().count()
    }

    /// All discovered entries in discovery order
    pub fn discovered(&self) -> impl Iterator<Item = &DiscoveredUrl> {
        self.discovered.values()
    }

    /// Visited URLs in sorted order, for stable persistence
    pub fn visited_sorted(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.visited.iter().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }
}
