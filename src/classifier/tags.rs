//! Operator-defined collection tags
//!
//! A tag is a URL pattern the operator knows marks a collection page. Tagged
//! pages are classified as collections whatever their structure, and tagged
//! URLs are dispatched ahead of untagged ones.

use crate::classifier::classify::classify;
use crate::classifier::types::{Classification, PageType, StructuralSignals};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One collection tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTag {
    pub id: u64,
    pub pattern: String,
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl CollectionTag {
    /// The substring a URL must contain for this tag to match
    ///
    /// `/term/` and `term-` are accepted as written in listings; their
    /// delimiters are stripped. Matching is case-insensitive.
    fn needle(&self) -> String {
        let pattern = self.pattern.trim().to_lowercase();
        if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
            pattern[1..pattern.len() - 1].to_string()
        } else if pattern.len() > 1 && pattern.ends_with('-') {
            pattern[..pattern.len() - 1].to_string()
        } else {
            pattern
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let needle = self.needle();
        !needle.is_empty() && url.to_lowercase().contains(&needle)
    }
}

/// URLs split by whether a collection tag matched them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagPartition {
    pub collection: Vec<String>,
    pub individual: Vec<String>,
}

/// The set of collection tags, in creation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionTags {
    tags: Vec<CollectionTag>,
}

impl CollectionTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(tags: Vec<CollectionTag>) -> Self {
        Self { tags }
    }

    pub fn records(&self) -> &[CollectionTag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn has_pattern(&self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        self.tags.iter().any(|t| t.pattern.eq_ignore_ascii_case(pattern))
    }

    /// Adds an enabled tag
    ///
    /// Returns `None` when the pattern is blank.
    pub fn add(&mut self, pattern: &str, description: &str) -> Option<CollectionTag> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        let id = self.tags.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
        let tag = CollectionTag {
            id,
            pattern: pattern.to_string(),
            description: description.trim().to_string(),
            enabled: true,
            created_at: Utc::now(),
        };
        self.tags.push(tag.clone());
        Some(tag)
    }

    /// Removes a tag, returning whether it existed
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.id != id);
        self.tags.len() != before
    }

    /// Enables or disables a tag, returning whether it exists
    pub fn set_enabled(&mut self, id: u64, enabled: bool) -> bool {
        match self.tags.iter_mut().find(|t| t.id == id) {
            Some(tag) => {
                tag.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether any enabled tag matches `url`
    pub fn matches(&self, url: &str) -> bool {
        self.tags.iter().any(|t| t.matches(url))
    }

    /// Classifies a page, forcing `Collection` when a tag matches its URL
    pub fn classify(&self, page_url: &str, signals: &StructuralSignals) -> Classification {
        let mut classification = classify(page_url, signals);
        if self.matches(page_url) {
            classification.page_type = PageType::Collection;
            classification.collection_score = 1.0;
        }
        classification
    }

    pub fn partition<'u, I>(&self, urls: I) -> TagPartition
    where
        I: IntoIterator<Item = &'u str>,
    {
        let mut partition = TagPartition::default();
        for url in urls {
            if self.matches(url) {
                partition.collection.push(url.to_string());
            } else {
                partition.individual.push(url.to_string());
            }
        }
        partition
    }
}
