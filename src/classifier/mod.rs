//! Page classification
//!
//! Decides from structural signals whether a fetched page is a collection
//! (a listing or directory linking to many entities) or a detail page.
//! Operator-defined collection tags override the structural verdict.

mod classify;
mod tags;
mod types;

pub use classify::classify;
pub use tags::{CollectionTag, CollectionTags, TagPartition};
pub use types::{Classification, PageSubType, PageType, StructuralSignals};
