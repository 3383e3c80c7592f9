//! Path generalization
//!
//! Variable path segments (numeric IDs, hashes) are replaced by placeholders
//! so structurally similar URLs share one learned pattern.

use regex::Regex;
use std::sync::LazyLock;

static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));

static HASH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]{8,}$").expect("valid regex"));

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").expect("valid regex"));

/// Generalizes a URL path into a pattern key
///
/// Empty segments are dropped and the result has no leading slash:
/// `/agency/12345` becomes `agency/[id]`, `/p/deadbeef42` becomes `p/[hash]`,
/// `/item-20231104-x` becomes `item-[id]-x`.
pub fn generalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(generalize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn generalize_segment(segment: &str) -> String {
    if NUMERIC_SEGMENT.is_match(segment) {
        "[id]".to_string()
    } else if HASH_SEGMENT.is_match(segment) {
        "[hash]".to_string()
    } else {
        DIGIT_RUN.replace_all(segment, "[id]").into_owned()
    }
}

/// Number of non-empty segments in a path
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}
