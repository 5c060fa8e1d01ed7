//! Index/document store
//!
//! This module provides the persistence layer the index worker writes to and
//! the search command reads from. Records are keyed by URL and written by
//! upsert, so redelivered documents never produce duplicates.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    ContentType, DocumentStore, IndexedDocument, SearchHit, SearchPage, SearchQuery, StoreError,
    StoreResult, UpsertOutcome,
};
