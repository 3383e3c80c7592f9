//! Frontier of discovered URLs
//!
//! Holds every discovered URL in discovery order, keyed by its normalized
//! form, plus the set of normalized URLs already dispatched.

mod store;

pub use store::{AddOutcome, FrontierStore};

use crate::classifier::PageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A URL found on a fetched page (or supplied as a seed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// The URL as first seen
    pub url: String,

    /// Dedup key
    pub normalized_url: String,

    pub discovered_at: DateTime<Utc>,

    /// Page the link was found on; `None` for seeds
    pub source_page_url: Option<String>,

    pub source_page_type: PageType,

    /// How likely the link leads to useful content, in [0, 1]
    pub confidence: f64,
}

impl DiscoveredUrl {
    pub fn new(
        url: &str,
        normalized_url: String,
        source: &SourceMeta,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.to_string(),
            normalized_url,
            discovered_at,
            source_page_url: source.page_url.clone(),
            source_page_type: source.page_type,
            confidence: source.confidence.clamp(0.0, 1.0),
        }
    }
}

/// Where a discovered URL came from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    pub page_url: Option<String>,
    pub page_type: PageType,
    pub confidence: f64,
}

impl SourceMeta {
    /// Metadata for a URL supplied by the operator rather than found on a page
    pub fn seed() -> Self {
        Self {
            page_url: None,
            page_type: PageType::Unknown,
            confidence: 1.0,
        }
    }

    /// Metadata for a link extracted from a fetched page
    pub fn from_page(page_url: &str, page_type: PageType, confidence: f64) -> Self {
        Self {
            page_url: Some(page_url.to_string()),
            page_type,
            confidence,
        }
    }
}
