//! Database schema for the document store

use rusqlite::Connection;

/// SQL schema for the document store
pub const SCHEMA_SQL: &str = r#"
-- Documents table: one row per URL
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    url_hash TEXT NOT NULL,
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    content TEXT NOT NULL,
    keywords TEXT NOT NULL,  -- JSON array
    content_type TEXT NOT NULL,
    depth INTEGER NOT NULL,
    seed_domain TEXT NOT NULL,
    crawled_at TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_domain ON documents(domain);
CREATE INDEX IF NOT EXISTS idx_documents_content_type ON documents(content_type);

-- Inverted index: weighted terms per document
CREATE TABLE IF NOT EXISTS terms (
    url TEXT NOT NULL,
    term TEXT NOT NULL,
    weight REAL NOT NULL,
    PRIMARY KEY (url, term)
);

CREATE INDEX IF NOT EXISTS idx_terms_term ON terms(term);
"#;

/// Creates the store tables if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
