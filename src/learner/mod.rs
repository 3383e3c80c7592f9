//! Site map and pattern learning
//!
//! Every classified page updates per-domain statistics; pages that yield
//! many entities also update statistics for their generalized path pattern.
//! The scorer reads both tables to rank the frontier.

mod site_map;

pub use site_map::{DomainStat, PathPattern, RecordOutcome, SiteMap};

use serde::Serialize;

/// Link counts of one fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStats {
    /// Total number of links on the page
    pub total_links: u32,

    /// Links pointing at target entities
    pub entity_count: u32,
}

/// Aggregate view of what the learner knows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteStatistics {
    pub total_pages: u64,
    pub total_domains: usize,
    pub patterns_learned: usize,

    /// Up to five domains with the highest entity yield
    pub top_domains: Vec<DomainStat>,

    /// Up to five patterns with the highest average entity yield
    pub top_patterns: Vec<PathPattern>,
}
