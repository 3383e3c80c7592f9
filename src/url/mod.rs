//! URL handling module for Harvest Engine
//!
//! This module provides URL normalization, domain extraction, path
//! generalization and link scope filtering.

mod domain;
mod normalize;
mod pattern;
mod scope;

// Re-export main functions
pub use domain::{extract_domain, hostname};
pub use normalize::{is_tracking_param, normalize_or_raw, normalize_url};
pub use pattern::{generalize_path, path_depth};
pub use scope::{matches_wildcard, LinkScope};
