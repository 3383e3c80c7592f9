//! HTML parser for extracting links and structural signals
//!
//! This module turns a fetched HTML document into:
//! - Links to consider for the frontier, with their structural context
//! - A confidence value per link
//! - Page-level structural signals for the classifier
//! - Whether the page looks like an anti-bot wall

use crate::classifier::StructuralSignals;
use crate::config::{CrawlerConfig, TargetConfig};
use crate::url::{normalize_or_raw, path_depth, LinkScope};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use url::Url;

static NAVIGATION_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(home|about|contact|blog|services|next|prev|previous|\d+)$").expect("valid regex")
});

static PAGINATION_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+|next|prev)$").expect("valid regex"));

static LOW_VALUE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(click|view|more)").expect("valid regex"));

/// Where a link sits in the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkContext {
    pub in_list: bool,
    pub in_grid: bool,
    pub in_card: bool,
    pub in_nav: bool,
    pub is_navigation: bool,
    pub is_pagination: bool,
}

/// A link extracted from a page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLink {
    /// Absolute URL
    pub url: String,
    pub anchor_text: String,
    pub context: LinkContext,

    /// How likely the link leads to useful content, in [0, 1]
    pub confidence: f64,
}

/// Everything the engine needs from one HTML document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub links: Vec<ExtractedLink>,
    pub signals: StructuralSignals,
    pub blocking_signal_detected: bool,
}

/// Settings that shape link extraction
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Links must be in scope to count as entities
    pub scope: LinkScope,

    /// Lowercase path fragments identifying entity links; empty counts every in-scope link
    pub entity_paths: Vec<String>,

    /// Lowercase phrases that mark the page as blocked
    pub blocking_keywords: Vec<String>,
}

impl ParseOptions {
    pub fn from_config(crawler: &CrawlerConfig, target: &TargetConfig) -> Self {
        Self {
            scope: LinkScope::from_config(target),
            entity_paths: target.entity_paths.iter().map(|p| p.to_lowercase()).collect(),
            blocking_keywords: crawler
                .blocking_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    fn is_entity_url(&self, url: &str) -> bool {
        if !self.scope.allows(url) {
            return false;
        }
        let lower = url.to_lowercase();
        self.entity_paths.is_empty() || self.entity_paths.iter().any(|p| lower.contains(p.as_str()))
    }
}

/// Parses an HTML document
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document, resolved against `base_url`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the document was served from
/// * `options` - Entity and blocking detection settings
pub fn parse_page(html: &str, base_url: &Url, options: &ParseOptions) -> ParsedPage {
    let document = Html::parse_document(html);

    let text = body_text(&document);
    let title = extract_title(&document);
    let links = extract_links(&document, base_url, options);

    let total_links = count(&document, "a[href]");
    let entity_links = links
        .iter()
        .filter(|link| options.is_entity_url(&link.url))
        .map(|link| normalize_or_raw(&link.url))
        .collect::<HashSet<_>>()
        .len() as u32;

    let text_len = text.chars().count();
    let link_density = if text_len > 0 {
        total_links as f64 / (text_len as f64 / 1000.0)
    } else {
        0.0
    };

    let signals = StructuralSignals {
        link_density,
        repeating_structures: repeating_structures(&document),
        has_pagination: count(
            &document,
            r#"[class*="pagination"], [class*="pager"], a[rel="next"], a[rel="prev"]"#,
        ) > 0,
        has_grid_or_list: count(&document, r#"ul, ol, [class*="grid"], [class*="Grid"]"#) > 0,
        total_links,
        entity_links,
    };

    let haystack = format!("{} {}", title.as_deref().unwrap_or(""), text).to_lowercase();
    let blocking_signal_detected = options
        .blocking_keywords
        .iter()
        .any(|k| haystack.contains(k.as_str()));

    ParsedPage {
        title,
        links,
        signals,
        blocking_signal_detected,
    }
}

fn count(document: &Html, selector: &str) -> u32 {
    Selector::parse(selector)
        .map(|s| document.select(&s).count() as u32)
        .unwrap_or(0)
}

fn body_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|body| body.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Counts groups of more than three containers sharing a child layout
///
/// A container's layout is the list of its children's `tag:class` pairs.
fn repeating_structures(document: &Html) -> u32 {
    let Ok(selector) = Selector::parse(r#"article, .item, .card, [class*="list-item"]"#) else {
        return 0;
    };

    let mut layouts: HashMap<String, u32> = HashMap::new();
    for container in document.select(&selector) {
        let layout = container
            .children()
            .filter_map(ElementRef::wrap)
            .map(|child| {
                format!(
                    "{}:{}",
                    child.value().name(),
                    child.value().attr("class").unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        *layouts.entry(layout).or_insert(0) += 1;
    }

    layouts.values().filter(|&&n| n > 3).count() as u32
}

fn extract_links(document: &Html, base_url: &Url, options: &ParseOptions) -> Vec<ExtractedLink> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        let anchor_text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let context = link_context(&element, &url, &anchor_text);
        let confidence = link_confidence(&url, &anchor_text, &context, options);

        links.push(ExtractedLink {
            url,
            anchor_text,
            context,
            confidence,
        });
    }

    links
}

fn link_context(element: &ElementRef, url: &str, anchor_text: &str) -> LinkContext {
    let mut context = LinkContext::default();

    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        let tag = ancestor.value().name();
        let class = ancestor
            .value()
            .attr("class")
            .unwrap_or("")
            .to_lowercase();
        let has_class = |name: &str| class.split_whitespace().any(|c| c == name);

        if matches!(tag, "ul" | "ol" | "nav") || has_class("list") || has_class("listing") {
            context.in_list = true;
        }
        if class.contains("grid") {
            context.in_grid = true;
        }
        if tag == "article" || class.contains("card") || has_class("item") {
            context.in_card = true;
        }
        if matches!(tag, "nav" | "header" | "footer")
            || has_class("navigation")
            || has_class("menu")
        {
            context.in_nav = true;
        }
    }

    let text = anchor_text.to_lowercase();
    context.is_navigation = context.in_nav || NAVIGATION_TEXT.is_match(&text);
    context.is_pagination =
        url.contains("page=") || url.contains("/page/") || PAGINATION_TEXT.is_match(&text);

    context
}

/// Scores how likely a link leads to useful content
///
/// Starts at 0.5; structural containers and entity-looking URLs add to it,
/// pagination and navigation placement subtract. Clamped to [0, 1].
fn link_confidence(
    url: &str,
    anchor_text: &str,
    context: &LinkContext,
    options: &ParseOptions,
) -> f64 {
    let mut score = 0.5;

    if context.in_list {
        score += 0.15;
    }
    if context.in_grid {
        score += 0.15;
    }
    if context.in_card {
        score += 0.1;
    }
    if !context.is_navigation {
        score += 0.1;
    }

    let depth = Url::parse(url).map(|u| path_depth(u.path())).unwrap_or(0);
    if (2..=4).contains(&depth) {
        score += 0.1;
    }

    let lower = url.to_lowercase();
    if options.entity_paths.iter().any(|p| lower.contains(p.as_str())) {
        score += 0.2;
    }

    if anchor_text.chars().count() > 5 && !LOW_VALUE_TEXT.is_match(&anchor_text.to_lowercase()) {
        score += 0.1;
    }

    if context.is_pagination {
        score -= 0.3;
    }
    if context.in_nav {
        score -= 0.2;
    }

    f64::clamp(score, 0.0, 1.0)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}
