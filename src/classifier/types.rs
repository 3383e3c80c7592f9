use serde::{Deserialize, Serialize};

/// Coarse page type used by the learner and recorded on discovered URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Collection,
    Detail,
    #[default]
    Unknown,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Detail => "detail",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer page shape, resolved by a fixed precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSubType {
    SearchResults,
    Category,
    PaginatedList,
    Directory,
    ContentPage,
    Unknown,
}

/// Structural measurements of a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuralSignals {
    /// Links per 1000 characters of visible text
    pub link_density: f64,

    /// Groups of more than three sibling items sharing one child layout
    pub repeating_structures: u32,

    /// Whether pagination controls are present
    pub has_pagination: bool,

    /// Whether a list or grid container is present
    pub has_grid_or_list: bool,

    /// Total number of links on the page
    pub total_links: u32,

    /// Links pointing at target entities
    pub entity_links: u32,
}

impl StructuralSignals {
    /// Share of links that point at target entities (0 when the page has no links)
    pub fn entity_ratio(&self) -> f64 {
        if self.total_links == 0 {
            0.0
        } else {
            f64::from(self.entity_links) / f64::from(self.total_links)
        }
    }
}

/// Result of classifying one page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub page_type: PageType,
    pub sub_type: PageSubType,

    /// How strongly the page looks like a collection, in [0, 1]
    pub collection_score: f64,

    /// Fraction of the six structural signals that fired, in [0, 1]
    pub confidence: f64,
}

impl Classification {
    pub fn is_collection(&self) -> bool {
        self.page_type == PageType::Collection
    }
}
