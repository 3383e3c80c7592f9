//! Crawler module for scheduling, fetching and learning
//!
//! This module contains the core crawling logic, including:
//! - The crawl engine and its single-dispatch driver loop
//! - Rate governance with per-domain tiers and jitter
//! - The page-fetch collaborator and its HTTP implementation
//! - HTML parsing into links and structural signals
//! - Events published to hosts

mod engine;
mod events;
mod fetcher;
mod governor;
mod parser;

pub use engine::{CrawlEngine, EngineSnapshot};
pub use events::CrawlEvent;
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpPageFetcher, PageFetcher};
pub use governor::RateGovernor;
pub use parser::{parse_page, ExtractedLink, LinkContext, ParseOptions, ParsedPage};
