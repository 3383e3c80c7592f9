//! URL priority scoring
//!
//! Ranks the unvisited frontier using what the learner knows about domains
//! and path patterns plus a few URL-structure heuristics.

mod priority;

pub use priority::{PriorityScorer, BASE_SCORE};
