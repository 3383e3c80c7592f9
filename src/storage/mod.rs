//! Storage module for persisting engine state
//!
//! This module handles durable storage of the engine's tables, including:
//! - The key-value store interface and its SQLite and in-memory backends
//! - SQLite schema management
//! - The table keys and their JSON encoding

mod memory;
mod schema;
mod sqlite;
mod tables;
mod traits;

pub use memory::MemoryStore;
pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteStore;
pub use tables::{encode_table, load_table, Table};
pub use traits::{KeyValueStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the SQLite store at `path`, creating it if needed
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}
