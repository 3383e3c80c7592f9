use crate::UrlError;
use url::{form_urlencoded, Url};

/// Tracking query parameters dropped during normalization (besides `utm_*`)
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
    "campaign_id",
    "_ga",
    "_gl",
];

/// Canonicalizes a URL so equivalent URLs dedupe to the same string
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not http(s)
/// 2. Remove the fragment
/// 3. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`, ...)
/// 4. Remove an empty query string
/// 5. Remove trailing slashes from non-root paths
///
/// Remaining query parameters keep their order. The host is lowercased by the
/// URL parser; scheme and `www.` are left alone, so `http://a.com` and
/// `https://a.com` are distinct entries.
///
/// # Arguments
///
/// * `url_str` - The absolute URL to normalize
///
/// # Returns
///
/// * `Ok(String)` - The normalized URL
/// * `Err(UrlError)` - The input is not a well-formed absolute http(s) URL
///
/// # Examples
///
/// ```
/// use harvest_engine::url::normalize_url;
///
/// let url = normalize_url("https://example.com/agencies/london/?utm_source=x&page=2#top").unwrap();
/// assert_eq!(url, "https://example.com/agencies/london?page=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    strip_tracking_params(&mut url);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&trimmed);
        }
    }

    Ok(url.to_string())
}

/// Normalizes a URL, falling back to the raw (trimmed) string when it is malformed
///
/// Callers use this where a bad link must never abort the crawl loop: the raw
/// string simply becomes its own dedup key.
pub fn normalize_or_raw(url_str: &str) -> String {
    match normalize_url(url_str) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::debug!("Keeping raw URL {} ({})", url_str, e);
            url_str.trim().to_string()
        }
    }
}

/// Returns true if the query parameter only carries tracking data
pub fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Drops tracking parameters, keeping the raw encoding of every other pair
///
/// Pairs are spliced from the original query string rather than re-encoded,
/// so `q=a%20b` and a bare `flag` come out the same whether or not a tracking
/// parameter sat next to them. Empty pairs (`a=1&&b=2`) are dropped.
fn strip_tracking_params(url: &mut Url) {
    let Some(query) = url.query() else {
        return;
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = form_urlencoded::parse(pair.as_bytes())
                .next()
                .map(|(k, _)| k.into_owned())
                .unwrap_or_default();
            !is_tracking_param(&key)
        })
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let rebuilt = kept.join("&");
        url.set_query(Some(&rebuilt));
    }
}
