//! Document store trait and error types
//!
//! This module defines the trait interface for the index/document store and
//! the records it exchanges with the index worker and the search command.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse kind of page, derived from its URL and title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Homepage,
    Product,
    Category,
    Article,
    Documentation,
    Other,
}

impl ContentType {
    pub const ALL: [ContentType; 6] = [
        Self::Homepage,
        Self::Product,
        Self::Category,
        Self::Article,
        Self::Documentation,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Product => "product",
            Self::Category => "category",
            Self::Article => "article",
            Self::Documentation => "documentation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown content type '{}'", s))
    }
}

/// A document as persisted by the index worker
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub url: String,
    pub url_hash: String,
    pub domain: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub keywords: Vec<String>,
    pub content_type: ContentType,
    pub depth: u32,
    pub seed_domain: String,
    pub crawled_at: String,
    pub indexed_at: String,
}

/// Whether an upsert created or replaced the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A full-text query with optional filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub domain: Option<String>,
    pub content_type: Option<ContentType>,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: None,
            content_type: None,
            page: 1,
            page_size: 10,
        }
    }
}

/// One ranked search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub domain: String,
    pub content_type: ContentType,
    pub score: f64,
    /// Query terms found in this document, sorted
    pub matched_terms: Vec<String>,
}

/// One page of search hits
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    /// Matching documents across all pages
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Trait for document store implementations
///
/// Writes are keyed by URL: storing the same document twice leaves exactly
/// one record, which is what makes queue redelivery harmless.
pub trait DocumentStore {
    /// Inserts the document or replaces the record with the same URL
    fn upsert(&mut self, document: &IndexedDocument) -> StoreResult<UpsertOutcome>;

    /// Looks up one document by URL
    fn get(&self, url: &str) -> StoreResult<Option<IndexedDocument>>;

    /// Runs a ranked full-text query
    fn query(&self, query: &SearchQuery) -> StoreResult<SearchPage>;

    /// Counts stored documents
    fn count(&self) -> StoreResult<u64>;
}
