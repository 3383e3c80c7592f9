use crate::classifier::types::{Classification, PageSubType, PageType, StructuralSignals};

/// URL fragments that mark a listing page regardless of its structure
const LISTING_URL_MARKERS: &[&str] = &["/agencies", "/directory", "/list"];

/// Number of boolean structural signals feeding the confidence
const SIGNAL_COUNT: u32 = 6;

/// Classifies a page as collection or detail
///
/// The score is accumulated in tenths so threshold comparisons are exact:
///
/// | Signal | Points |
/// |--------|--------|
/// | repeating structures > 3 | 3 |
/// | link density > 5 | 2 |
/// | pagination present | 2 |
/// | grid or list present | 1 |
/// | total links > 50 | 1 |
/// | entity ratio > 0.3 | 1 |
/// | URL has a listing marker | 3 |
///
/// The page is a collection when the clamped score exceeds 0.5.
///
/// # Arguments
///
/// * `page_url` - URL of the classified page (checked for listing and search markers)
/// * `signals` - Structural measurements of the page
pub fn classify(page_url: &str, signals: &StructuralSignals) -> Classification {
    let url = page_url.to_lowercase();

    let fired = [
        (signals.repeating_structures > 3, 3),
        (signals.link_density > 5.0, 2),
        (signals.has_pagination, 2),
        (signals.has_grid_or_list, 1),
        (signals.total_links > 50, 1),
        (signals.entity_ratio() > 0.3, 1),
    ];

    let mut tenths: u32 = fired
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, points)| points)
        .sum();
    let signals_fired = fired.iter().filter(|(hit, _)| *hit).count() as u32;

    if LISTING_URL_MARKERS.iter().any(|m| url.contains(m)) {
        tenths += 3;
    }

    let tenths = tenths.min(10);
    let page_type = if tenths > 5 {
        PageType::Collection
    } else {
        PageType::Detail
    };

    Classification {
        page_type,
        sub_type: sub_type(&url, signals),
        collection_score: f64::from(tenths) / 10.0,
        confidence: f64::from(signals_fired) / f64::from(SIGNAL_COUNT),
    }
}

fn sub_type(url: &str, signals: &StructuralSignals) -> PageSubType {
    if url.contains("search") || url.contains("?q=") {
        PageSubType::SearchResults
    } else if url.contains("category") || url.contains("categories") {
        PageSubType::Category
    } else if signals.has_pagination {
        PageSubType::PaginatedList
    } else if signals.repeating_structures > 5 {
        PageSubType::Directory
    } else if signals.link_density < 2.0 {
        PageSubType::ContentPage
    } else {
        PageSubType::Unknown
    }
}
