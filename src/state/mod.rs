//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: The persisted crawl singleton (enabled flag, interval, last dispatch)
//! - `CrawlPhase`: Where the scheduler currently is in its loop
//! - `DomainState`: Per-domain request counting for rate governance

mod crawl_state;
mod domain_state;

pub use crawl_state::{CrawlPhase, CrawlState};
pub use domain_state::DomainState;
