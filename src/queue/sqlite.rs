//! SQLite queue broker
//!
//! This module provides a SQLite-based implementation of the QueueTransport
//! trait. Every process opens the same database file; WAL mode and a busy
//! timeout let them share it.

use crate::config::QueueConfig;
use crate::queue::schema::initialize_schema;
use crate::queue::traits::{Delivery, QueueError, QueueResult, QueueTransport, SendOutcome};
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// How long a writer waits for another process's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery parameters of the broker
#[derive(Debug, Clone, Copy)]
pub struct BrokerOptions {
    /// How long a received message stays hidden before redelivery
    pub visibility_timeout: Duration,
    /// How long a dedup key suppresses repeated sends
    pub dedup_window: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(60),
            dedup_window: Duration::from_secs(3600),
        }
    }
}

impl From<&QueueConfig> for BrokerOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            visibility_timeout: config.visibility_timeout(),
            dedup_window: config.dedup_window(),
        }
    }
}

/// SQLite queue backend
pub struct SqliteBroker {
    conn: Mutex<Connection>,
    options: BrokerOptions,
}

impl SqliteBroker {
    /// Opens (or creates) the broker database at `path`
    pub fn new(path: &Path, options: BrokerOptions) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    /// Creates a private in-memory broker
    pub fn new_in_memory(options: BrokerOptions) -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| QueueError::LockPoisoned)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl QueueTransport for SqliteBroker {
    fn send(
        &self,
        queue: &str,
        body: &str,
        dedup_key: Option<&str>,
        group_key: Option<&str>,
    ) -> QueueResult<SendOutcome> {
        let now = now_millis();
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(key) = dedup_key {
            tx.execute(
                "DELETE FROM dedup_keys WHERE queue = ?1 AND expires_at <= ?2",
                params![queue, now],
            )?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO dedup_keys (queue, dedup_key, expires_at) VALUES (?1, ?2, ?3)",
                params![queue, key, now.saturating_add(millis(self.options.dedup_window))],
            )?;

            if inserted == 0 {
                tx.commit()?;
                tracing::trace!("Dropped duplicate on {}: {}", queue, key);
                return Ok(SendOutcome::Duplicate);
            }
        }

        tx.execute(
            "INSERT INTO messages (queue, body, group_key, sent_at, visible_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![queue, body, group_key, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(SendOutcome::Enqueued(id))
    }

    fn try_receive(&self, queue: &str, max_messages: usize) -> QueueResult<Vec<Delivery>> {
        if max_messages == 0 {
            return Ok(Vec::new());
        }

        let now = now_millis();
        let hidden_until = now.saturating_add(millis(self.options.visibility_timeout));
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut picked: Vec<(i64, String, u32)> = Vec::new();
        {
            // Groups with a message in flight are blocked until it is acked or reappears
            let mut stmt = tx.prepare(
                "SELECT DISTINCT group_key FROM messages
                 WHERE queue = ?1 AND group_key IS NOT NULL AND receipt IS NOT NULL AND visible_at > ?2",
            )?;
            let mut blocked_groups = stmt
                .query_map(params![queue, now], |row| row.get::<_, String>(0))?
                .collect::<Result<HashSet<_>, _>>()?;

            let mut stmt = tx.prepare(
                "SELECT id, body, group_key, receive_count FROM messages
                 WHERE queue = ?1 AND visible_at <= ?2 ORDER BY id",
            )?;
            let mut rows = stmt.query(params![queue, now])?;

            while let Some(row) = rows.next()? {
                let group: Option<String> = row.get(2)?;
                if let Some(group) = group {
                    // At most one message per group per batch, in send order
                    if !blocked_groups.insert(group) {
                        continue;
                    }
                }

                picked.push((row.get(0)?, row.get(1)?, row.get(3)?));
                if picked.len() >= max_messages {
                    break;
                }
            }
        }

        let mut deliveries = Vec::with_capacity(picked.len());
        for (id, body, receive_count) in picked {
            let receipt = Uuid::new_v4().to_string();
            tx.execute(
                "UPDATE messages SET receipt = ?1, visible_at = ?2, receive_count = receive_count + 1
                 WHERE id = ?3",
                params![receipt, hidden_until, id],
            )?;

            deliveries.push(Delivery {
                message_id: id,
                body,
                receipt,
                receive_count: receive_count + 1,
            });
        }

        tx.commit()?;
        Ok(deliveries)
    }

    fn ack(&self, queue: &str, receipt: &str) -> QueueResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM messages WHERE queue = ?1 AND receipt = ?2",
            params![queue, receipt],
        )?;
        Ok(deleted > 0)
    }

    fn extend_visibility(
        &self,
        queue: &str,
        receipt: &str,
        hidden_for: Duration,
    ) -> QueueResult<bool> {
        let visible_at = now_millis().saturating_add(millis(hidden_for));
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE messages SET visible_at = ?1 WHERE queue = ?2 AND receipt = ?3",
            params![visible_at, queue, receipt],
        )?;
        Ok(updated > 0)
    }

    fn depth(&self, queue: &str) -> QueueResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE queue = ?1",
            params![queue],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> SqliteBroker {
        SqliteBroker::new_in_memory(BrokerOptions::default()).unwrap()
    }

    #[test]
    fn test_send_and_receive() {
        let broker = broker();
        let outcome = broker.send("tasks", "hello", None, None).unwrap();
        assert!(outcome.is_enqueued());

        let batch = broker.try_receive("tasks", 10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "hello");
        assert_eq!(batch[0].receive_count, 1);
    }

    #[test]
    fn test_empty_receive_is_normal() {
        let broker = broker();
        assert!(broker.try_receive("tasks", 10).unwrap().is_empty());
    }

    #[test]
    fn test_queues_are_isolated() {
        let broker = broker();
        broker.send("tasks", "a", None, None).unwrap();
        assert!(broker.try_receive("results", 10).unwrap().is_empty());
        assert_eq!(broker.try_receive("tasks", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_dedup_key_drops_repeat() {
        let broker = broker();
        assert!(broker.send("tasks", "a", Some("k1"), None).unwrap().is_enqueued());
        assert_eq!(
            broker.send("tasks", "a", Some("k1"), None).unwrap(),
            SendOutcome::Duplicate
        );
        // Same key on another queue is independent
        assert!(broker.send("documents", "a", Some("k1"), None).unwrap().is_enqueued());
        assert_eq!(broker.depth("tasks").unwrap(), 1);
    }

    #[test]
    fn test_dedup_key_survives_ack() {
        let broker = broker();
        broker.send("tasks", "a", Some("k1"), None).unwrap();
        let batch = broker.try_receive("tasks", 1).unwrap();
        assert!(broker.ack("tasks", &batch[0].receipt).unwrap());

        assert_eq!(
            broker.send("tasks", "a", Some("k1"), None).unwrap(),
            SendOutcome::Duplicate
        );
    }

    #[test]
    fn test_dedup_window_expires() {
        let broker = SqliteBroker::new_in_memory(BrokerOptions {
            visibility_timeout: Duration::from_secs(60),
            dedup_window: Duration::ZERO,
        })
        .unwrap();

        broker.send("tasks", "a", Some("k1"), None).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(broker.send("tasks", "a", Some("k1"), None).unwrap().is_enqueued());
    }

    #[test]
    fn test_received_message_is_hidden() {
        let broker = broker();
        broker.send("tasks", "a", None, None).unwrap();
        assert_eq!(broker.try_receive("tasks", 10).unwrap().len(), 1);
        assert!(broker.try_receive("tasks", 10).unwrap().is_empty());
    }

    #[test]
    fn test_ack_deletes() {
        let broker = broker();
        broker.send("tasks", "a", None, None).unwrap();
        let batch = broker.try_receive("tasks", 10).unwrap();
        assert!(broker.ack("tasks", &batch[0].receipt).unwrap());
        assert_eq!(broker.depth("tasks").unwrap(), 0);
        assert!(!broker.ack("tasks", &batch[0].receipt).unwrap());
    }

    #[test]
    fn test_unacked_message_is_redelivered() {
        let broker = SqliteBroker::new_in_memory(BrokerOptions {
            visibility_timeout: Duration::ZERO,
            dedup_window: Duration::from_secs(60),
        })
        .unwrap();
        broker.send("tasks", "a", None, None).unwrap();

        let first = broker.try_receive("tasks", 1).unwrap();
        let second = broker.try_receive("tasks", 1).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].message_id, second[0].message_id);
        assert_eq!(second[0].receive_count, 2);

        // The stale receipt can no longer acknowledge
        assert!(!broker.ack("tasks", &first[0].receipt).unwrap());
        assert!(broker.ack("tasks", &second[0].receipt).unwrap());
    }

    #[test]
    fn test_extended_message_stays_hidden() {
        let broker = SqliteBroker::new_in_memory(BrokerOptions {
            visibility_timeout: Duration::ZERO,
            dedup_window: Duration::from_secs(60),
        })
        .unwrap();
        broker.send("tasks", "a", None, None).unwrap();

        let first = broker.try_receive("tasks", 1).unwrap();
        assert!(broker
            .extend_visibility("tasks", &first[0].receipt, Duration::from_secs(60))
            .unwrap());
        assert!(broker.try_receive("tasks", 1).unwrap().is_empty());
        assert!(broker.ack("tasks", &first[0].receipt).unwrap());
    }

    #[test]
    fn test_extend_with_stale_receipt_fails() {
        let broker = SqliteBroker::new_in_memory(BrokerOptions {
            visibility_timeout: Duration::ZERO,
            dedup_window: Duration::from_secs(60),
        })
        .unwrap();
        broker.send("tasks", "a", None, None).unwrap();

        let first = broker.try_receive("tasks", 1).unwrap();
        let second = broker.try_receive("tasks", 1).unwrap();
        assert!(!broker
            .extend_visibility("tasks", &first[0].receipt, Duration::from_secs(60))
            .unwrap());
        assert!(broker
            .extend_visibility("tasks", &second[0].receipt, Duration::from_secs(60))
            .unwrap());
    }

    #[test]
    fn test_max_messages_respected() {
        let broker = broker();
        for i in 0..5 {
            broker.send("tasks", &i.to_string(), None, None).unwrap();
        }
        assert_eq!(broker.try_receive("tasks", 3).unwrap().len(), 3);
        assert_eq!(broker.try_receive("tasks", 3).unwrap().len(), 2);
    }

    #[test]
    fn test_group_delivers_in_order_one_at_a_time() {
        let broker = broker();
        broker.send("documents", "g1-first", None, Some("g1")).unwrap();
        broker.send("documents", "g1-second", None, Some("g1")).unwrap();
        broker.send("documents", "g2-first", None, Some("g2")).unwrap();

        let batch = broker.try_receive("documents", 10).unwrap();
        let bodies: Vec<_> = batch.iter().map(|d| d.body.as_str()).collect();
        assert_eq!(bodies, vec!["g1-first", "g2-first"]);

        // g1 is blocked while its first message is in flight
        assert!(broker.try_receive("documents", 10).unwrap().is_empty());

        broker.ack("documents", &batch[0].receipt).unwrap();
        let next = broker.try_receive("documents", 10).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].body, "g1-second");
    }

    #[test]
    fn test_file_backed_broker_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.db");

        let producer = SqliteBroker::new(&path, BrokerOptions::default()).unwrap();
        let consumer = SqliteBroker::new(&path, BrokerOptions::default()).unwrap();

        producer.send("tasks", "shared", None, None).unwrap();
        let batch = consumer.try_receive("tasks", 10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "shared");
    }
}
