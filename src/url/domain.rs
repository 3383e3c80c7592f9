use url::Url;

/// Extracts the lowercase hostname from a parsed URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use harvest_engine::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/agencies").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and returns its lowercase hostname
///
/// Returns `None` for unparsable input or URLs without a host.
pub fn hostname(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_domain)
}
