//! Output module for reporting what the engine has learned
//!
//! This module handles:
//! - Reading persisted engine tables without starting a crawl
//! - Printing frontier, learner and crawl-state statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
