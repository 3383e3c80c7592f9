//! Harvest Engine: a learning crawl prioritizer
//!
//! This crate decides which discovered URL to visit next, learns from every
//! visited page which URL shapes yield the most target entities, and paces
//! requests so a rate-sensitive directory site is not hammered.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod frontier;
pub mod learner;
pub mod output;
pub mod scorer;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Harvest Engine operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors (the `InvalidUrl` category)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Harvest Engine operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classifier::{classify, Classification, PageSubType, PageType, StructuralSignals};
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlEvent, EngineSnapshot, PageFetcher};
pub use frontier::{DiscoveredUrl, FrontierStore, SourceMeta};
pub use learner::{SiteMap, SiteStatistics};
pub use scorer::PriorityScorer;
pub use url::{extract_domain, normalize_or_raw, normalize_url};
