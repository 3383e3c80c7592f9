use crate::config::TargetConfig;
use url::Url;

/// Checks if a domain matches a wildcard pattern
///
/// Supported patterns:
/// 1. Exact match: `example.com` matches only `example.com`
/// 2. Wildcard match: `*.example.com` matches `example.com` and any subdomain
///
/// # Examples
///
/// ```
/// use harvest_engine::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Decides which extracted links may enter the frontier
///
/// A link is in scope when it is http(s), its host matches one of the allowed
/// domain patterns (an empty list allows every host), and its path contains
/// none of the excluded navigation fragments.
#[derive(Debug, Clone, Default)]
pub struct LinkScope {
    allowed_domains: Vec<String>,
    excluded_paths: Vec<String>,
}

impl LinkScope {
    pub fn new(allowed_domains: Vec<String>, excluded_paths: Vec<String>) -> Self {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.to_lowercase())
                .collect(),
            excluded_paths: excluded_paths
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(target: &TargetConfig) -> Self {
        Self::new(target.allowed_domains.clone(), target.excluded_paths.clone())
    }

    pub fn allows(&self, url_str: &str) -> bool {
        let Ok(url) = Url::parse(url_str) else {
            return false;
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let Some(host) = url.host_str().map(str::to_lowercase) else {
            return false;
        };

        if !self.allowed_domains.is_empty()
            && !self
                .allowed_domains
                .iter()
                .any(|pattern| matches_wildcard(pattern, &host))
        {
            return false;
        }

        let path = url.path().to_lowercase();
        !self
            .excluded_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}
