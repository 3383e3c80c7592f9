use crate::classifier::CollectionTags;
use crate::frontier::DiscoveredUrl;
use crate::learner::SiteMap;
use crate::url::{extract_domain, generalize_path, path_depth};
use url::Url;

/// Score every URL starts from
pub const BASE_SCORE: f64 = 50.0;

/// Path keyword groups and the bonus each group adds (once per group)
const KEYWORD_BONUSES: &[(&[&str], f64)] = &[
    (&["agencies", "directory"], 30.0),
    (&["list", "all"], 20.0),
    (&["category", "search"], 15.0),
];

/// Domains whose cumulative entity yield exceeds this get a bonus
const PRODUCTIVE_DOMAIN_YIELD: u64 = 50;

/// Bonus for URLs an enabled collection tag matches
pub const TAGGED_COLLECTION_BONUS: f64 = 40.0;

/// Scores candidate URLs against the current learned tables
///
/// Scores are deterministic: the same URL scored against the same site map
/// always yields the same value.
#[derive(Debug, Clone, Copy)]
pub struct PriorityScorer<'a> {
    site_map: &'a SiteMap,
    tags: Option<&'a CollectionTags>,
}

impl<'a> PriorityScorer<'a> {
    pub fn new(site_map: &'a SiteMap) -> Self {
        Self {
            site_map,
            tags: None,
        }
    }

    pub fn with_collection_tags(mut self, tags: &'a CollectionTags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Computes the additive priority score of a URL
    ///
    /// # Scoring
    ///
    /// | Condition | Points |
    /// |-----------|--------|
    /// | base | 50 |
    /// | known domain | avg collection score × 30 |
    /// | domain entity yield > 50 | 20 |
    /// | known path pattern | avg collection score × 40 + min(avg yield, 20) |
    /// | path depth 2 or 3 | 10 |
    /// | path has "agencies" or "directory" | 30 |
    /// | path has "list" or "all" | 20 |
    /// | path has "category" or "search" | 15 |
    /// | query has "page=" | 10 |
    /// | matched by an enabled collection tag | 40 |
    ///
    /// An unparsable URL scores the base value.
    pub fn score(&self, url: &str) -> f64 {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Scoring unparsable URL {} at base ({})", url, e);
                return BASE_SCORE;
            }
        };

        let mut score = BASE_SCORE;

        if let Some(stat) = extract_domain(&parsed).and_then(|d| self.site_map.domain(&d)) {
            score += stat.avg_collection_score * 30.0;
            if stat.entity_yield_total > PRODUCTIVE_DOMAIN_YIELD {
                score += 20.0;
            }
        }

        if let Some(pattern) = self.site_map.pattern(&generalize_path(parsed.path())) {
            score += pattern.avg_collection_score * 40.0;
            score += pattern.avg_entity_yield.min(20.0);
        }

        let depth = path_depth(parsed.path());
        if depth == 2 || depth == 3 {
            score += 10.0;
        }

        let path = parsed.path().to_lowercase();
        for (keywords, bonus) in KEYWORD_BONUSES {
            if keywords.iter().any(|k| path.contains(k)) {
                score += bonus;
            }
        }

        if parsed.query().is_some_and(|q| q.contains("page=")) {
            score += 10.0;
        }

        if self.tags.is_some_and(|tags| tags.matches(url)) {
            score += TAGGED_COLLECTION_BONUS;
        }

        score
    }

    /// Orders URLs by descending score
    ///
    /// The sort is stable, so equal scores keep their input (discovery) order.
    pub fn rank<'u, S: AsRef<str>>(&self, urls: &'u [S]) -> Vec<&'u S> {
        let mut scored: Vec<(f64, &S)> = urls.iter().map(|u| (self.score(u.as_ref()), u)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, u)| u).collect()
    }

    /// Picks the highest-scoring candidate, the earliest one on ties
    pub fn select_next<'d, I>(&self, candidates: I) -> Option<&'d DiscoveredUrl>
    where
        I: IntoIterator<Item = &'d DiscoveredUrl>,
    {
        let mut best: Option<(f64, &'d DiscoveredUrl)> = None;

        for candidate in candidates {
            let score = self.score(&candidate.url);
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, candidate)),
            }
        }

        best.map(|(_, candidate)| candidate)
    }
}
