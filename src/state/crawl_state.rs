use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Persisted crawl singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Whether the crawl loop should be dispatching
    pub enabled: bool,

    /// Base delay between dispatches (milliseconds)
    pub request_interval_ms: u64,

    /// Wall-clock time of the most recent dispatch
    pub last_dispatch_at: Option<DateTime<Utc>>,

    /// Number of dispatched pages whose fetch failed
    #[serde(default)]
    pub failed_count: u64,
}

impl CrawlState {
    pub fn new(request_interval_ms: u64) -> Self {
        Self {
            enabled: false,
            request_interval_ms,
            last_dispatch_at: None,
            failed_count: 0,
        }
    }
}

/// Scheduler phase
///
/// Not persisted: a restarted engine always comes up `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlPhase {
    /// No timer pending, nothing in flight
    Stopped,

    /// Next dispatch attempt is due at `at`
    Scheduled { at: Instant },

    /// A fetch for `url` is in flight
    Dispatching { url: String },

    /// Paused after a blocking signal until `resume_at`
    Cooldown { resume_at: Instant },
}

impl CrawlPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Scheduled { .. } => "scheduled",
            Self::Dispatching { .. } => "dispatching",
            Self::Cooldown { .. } => "cooldown",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
