//! SQLite document store implementation
//!
//! Documents live in one row per URL; a `terms` table holds the weighted
//! inverted index used for ranking.

use crate::indexer::tokenize;
use crate::store::schema::initialize_schema;
use crate::store::traits::{
    ContentType, DocumentStore, IndexedDocument, SearchHit, SearchPage, SearchQuery, StoreResult,
    UpsertOutcome,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

/// Title terms count this many times a body term
const TITLE_WEIGHT: f64 = 3.0;

/// SQLite document store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Summed term weights of a document
fn term_weights(document: &IndexedDocument) -> HashMap<String, f64> {
    let mut weights: HashMap<String, f64> = HashMap::new();

    for term in tokenize(&document.title) {
        *weights.entry(term).or_insert(0.0) += TITLE_WEIGHT;
    }
    for term in tokenize(&document.content) {
        *weights.entry(term).or_insert(0.0) += 1.0;
    }

    weights
}

fn parse_content_type(raw: &str) -> ContentType {
    raw.parse().unwrap_or(ContentType::Other)
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<(IndexedDocument, String)> {
    let content_type: String = row.get(7)?;
    let keywords: String = row.get(6)?;

    Ok((
        IndexedDocument {
            url: row.get(0)?,
            url_hash: row.get(1)?,
            domain: row.get(2)?,
            title: row.get(3)?,
            summary: row.get(4)?,
            content: row.get(5)?,
            keywords: Vec::new(),
            content_type: parse_content_type(&content_type),
            depth: row.get(8)?,
            seed_domain: row.get(9)?,
            crawled_at: row.get(10)?,
            indexed_at: row.get(11)?,
        },
        keywords,
    ))
}

impl DocumentStore for SqliteStore {
    fn upsert(&mut self, document: &IndexedDocument) -> StoreResult<UpsertOutcome> {
        let keywords = serde_json::to_string(&document.keywords)?;
        let tx = self.conn.transaction()?;

        let existed = tx
            .query_row(
                "SELECT 1 FROM documents WHERE url = ?1",
                params![document.url],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            "INSERT INTO documents
                (url, url_hash, domain, title, summary, content, keywords, content_type,
                 depth, seed_domain, crawled_at, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(url) DO UPDATE SET
                url_hash = excluded.url_hash,
                domain = excluded.domain,
                title = excluded.title,
                summary = excluded.summary,
                content = excluded.content,
                keywords = excluded.keywords,
                content_type = excluded.content_type,
                depth = excluded.depth,
                seed_domain = excluded.seed_domain,
                crawled_at = excluded.crawled_at,
                indexed_at = excluded.indexed_at",
            params![
                document.url,
                document.url_hash,
                document.domain,
                document.title,
                document.summary,
                document.content,
                keywords,
                document.content_type.as_str(),
                document.depth,
                document.seed_domain,
                document.crawled_at,
                document.indexed_at,
            ],
        )?;

        tx.execute("DELETE FROM terms WHERE url = ?1", params![document.url])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO terms (url, term, weight) VALUES (?1, ?2, ?3)")?;
            for (term, weight) in term_weights(document) {
                stmt.execute(params![document.url, term, weight])?;
            }
        }

        tx.commit()?;

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn get(&self, url: &str) -> StoreResult<Option<IndexedDocument>> {
        let found = self
            .conn
            .query_row(
                "SELECT url, url_hash, domain, title, summary, content, keywords, content_type,
                        depth, seed_domain, crawled_at, indexed_at
                 FROM documents WHERE url = ?1",
                params![url],
                row_to_document,
            )
            .optional()?;

        match found {
            Some((mut document, keywords)) => {
                document.keywords = serde_json::from_str(&keywords)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    fn query(&self, query: &SearchQuery) -> StoreResult<SearchPage> {
        let terms: BTreeSet<String> = tokenize(&query.text).into_iter().collect();
        if terms.is_empty() || query.page_size == 0 {
            return Ok(SearchPage::default());
        }

        let placeholders = vec!["?"; terms.len()].join(", ");
        let mut filters = format!("t.term IN ({})", placeholders);
        let mut values: Vec<Value> = terms.iter().cloned().map(Value::Text).collect();

        if let Some(domain) = &query.domain {
            filters.push_str(" AND d.domain = ?");
            values.push(Value::Text(domain.to_lowercase()));
        }
        if let Some(content_type) = query.content_type {
            filters.push_str(" AND d.content_type = ?");
            values.push(Value::Text(content_type.as_str().to_string()));
        }

        let total: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(DISTINCT d.url) FROM terms t
                 JOIN documents d ON d.url = t.url
                 WHERE {}",
                filters
            ),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let page = query.page.max(1);
        let offset = (page - 1).saturating_mul(query.page_size);
        values.push(Value::Integer(i64::try_from(query.page_size).unwrap_or(i64::MAX)));
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT d.url, d.title, d.summary, d.domain, d.content_type,
                    SUM(t.weight) AS score, GROUP_CONCAT(t.term, ' ')
             FROM terms t
             JOIN documents d ON d.url = t.url
             WHERE {}
             GROUP BY d.url
             ORDER BY score DESC, d.url ASC
             LIMIT ? OFFSET ?",
            filters
        ))?;

        let hits = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let content_type: String = row.get(4)?;
                let matched: String = row.get(6)?;
                let mut matched_terms: Vec<String> =
                    matched.split(' ').map(str::to_string).collect();
                matched_terms.sort();

                Ok(SearchHit {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    summary: row.get(2)?,
                    domain: row.get(3)?,
                    content_type: parse_content_type(&content_type),
                    score: row.get(5)?,
                    matched_terms,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchPage {
            total: total.max(0) as u64,
            hits,
        })
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}
