use crate::classifier::PageType;
use serde::Serialize;

/// Notifications published by the crawl engine
///
/// Delivered over a `tokio::sync::broadcast` channel; slow subscribers may
/// miss events and see `RecvError::Lagged`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CrawlEvent {
    /// A page was fetched and classified
    Progress {
        current_url: String,
        visited_count: usize,
        unvisited_count: usize,
        page_type: PageType,
    },

    /// The frontier ran dry and the crawl stopped
    Complete,

    /// A blocking signal was seen; dispatching pauses for `cooldown_ms`
    Blocked { url: String, cooldown_ms: u64 },

    /// A fetch failed; the URL stays visited
    FetchFailed {
        url: String,
        error: String,
        failed_count: u64,
    },

    /// Engine state could not be written and is only held in memory
    PersistenceWarning { message: String },
}
