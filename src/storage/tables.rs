use crate::storage::traits::{KeyValueStore, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persisted engine table and the key it lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Discovered,
    Visited,
    Domains,
    Patterns,
    CrawlState,
    CollectionTags,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Discovered,
        Table::Visited,
        Table::Domains,
        Table::Patterns,
        Table::CrawlState,
        Table::CollectionTags,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Discovered => "frontier.discovered",
            Self::Visited => "frontier.visited",
            Self::Domains => "sitemap.domains",
            Self::Patterns => "sitemap.patterns",
            Self::CrawlState => "crawl.state",
            Self::CollectionTags => "classifier.collection_tags",
        }
    }
}

/// Reads and deserializes a table
///
/// # Returns
///
/// * `Ok(Some(T))` - The stored value
/// * `Ok(None)` - Nothing stored under the table's key
/// * `Err(StorageError)` - The read failed or the stored JSON is invalid
pub fn load_table<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    table: Table,
) -> StorageResult<Option<T>> {
    match store.get(table.key())? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Serializes a value into the JSON document stored for a table
pub fn encode_table<T: Serialize + ?Sized>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}
