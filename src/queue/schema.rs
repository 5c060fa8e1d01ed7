//! Database schema for the queue broker

use rusqlite::Connection;

/// SQL schema for the broker database
pub const SCHEMA_SQL: &str = r#"
-- One row per message still owed to a consumer
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    body TEXT NOT NULL,
    group_key TEXT,
    sent_at INTEGER NOT NULL,
    visible_at INTEGER NOT NULL,
    receipt TEXT,
    receive_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_queue_visible ON messages(queue, visible_at);
CREATE INDEX IF NOT EXISTS idx_messages_receipt ON messages(receipt);

-- Dedup keys seen within the dedup window
CREATE TABLE IF NOT EXISTS dedup_keys (
    queue TEXT NOT NULL,
    dedup_key TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    PRIMARY KEY (queue, dedup_key)
);
"#;

/// Creates the broker tables if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
