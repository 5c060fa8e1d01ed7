//! Shared per-domain politeness gate
//!
//! Every crawl worker reserves a fetch slot for the target domain before
//! dispatching a request. The gate keeps one next-eligible time per domain in
//! the broker database, so the spacing holds across all workers and processes.

use crate::queue::{QueueError, QueueResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const GATE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS domain_slots (
    domain TEXT PRIMARY KEY,
    next_eligible_at INTEGER NOT NULL
);
"#;

/// Trait for domain gate implementations
pub trait DomainGate: Send + Sync {
    /// Reserves the next fetch slot for `domain`
    ///
    /// Returns how long the caller must wait before fetching. The slot after
    /// this one is pushed `delay` past the reserved slot.
    fn reserve(&self, domain: &str, delay: Duration) -> QueueResult<Duration>;
}

/// Computes a reservation from the stored next-eligible time (milliseconds)
///
/// Returns `(wait, new_next_eligible)` where the reserved slot is
/// `max(now, next_eligible)`.
pub fn next_slot(next_eligible: Option<i64>, now: i64, delay_ms: i64) -> (i64, i64) {
    let slot = next_eligible.map_or(now, |next| next.max(now));
    (slot - now, slot.saturating_add(delay_ms))
}

/// Domain gate stored in a SQLite table
pub struct SqliteDomainGate {
    conn: Mutex<Connection>,
}

impl SqliteDomainGate {
    /// Opens the gate table in the database at `path` (normally the broker's)
    pub fn new(path: &Path) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(GATE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn new_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(GATE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| QueueError::LockPoisoned)
    }
}

impl DomainGate for SqliteDomainGate {
    fn reserve(&self, domain: &str, delay: Duration) -> QueueResult<Duration> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT next_eligible_at FROM domain_slots WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;

        // Read the clock inside the write lock so concurrent reservations see
        // each other's slots
        let now = Utc::now().timestamp_millis();
        let (wait_ms, next) = next_slot(stored, now, delay_ms);

        tx.execute(
            "INSERT INTO domain_slots (domain, next_eligible_at) VALUES (?1, ?2)
             ON CONFLICT(domain) DO UPDATE SET next_eligible_at = excluded.next_eligible_at",
            params![domain, next],
        )?;
        tx.commit()?;

        Ok(Duration::from_millis(wait_ms.max(0) as u64))
    }
}

/// Reserves a slot for `domain` and sleeps until it opens
///
/// `before_wait` runs with the reserved wait just before sleeping, if there is
/// one. Returns the time slept. Gate errors are logged and the fetch goes
/// ahead unspaced.
pub async fn wait_for_slot<G, F>(
    gate: &G,
    domain: &str,
    delay: Duration,
    before_wait: F,
) -> Duration
where
    G: DomainGate + ?Sized,
    F: FnOnce(Duration),
{
    match gate.reserve(domain, delay) {
        Ok(wait) if !wait.is_zero() => {
            tracing::debug!("Waiting {:?} for a {} slot", wait, domain);
            before_wait(wait);
            tokio::time::sleep(wait).await;
            wait
        }
        Ok(_) => Duration::ZERO,
        Err(e) => {
            tracing::warn!("Domain gate unavailable for {}: {}", domain, e);
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_reservation_is_immediate() {
        assert_eq!(next_slot(None, 1_000, 500), (0, 1_500));
    }

    #[test]
    fn test_reservation_waits_for_pending_slot() {
        // Previous reservation at t=1000 pushed the next slot to 1500
        assert_eq!(next_slot(Some(1_500), 1_200, 500), (300, 2_000));
    }

    #[test]
    fn test_stale_slot_is_ignored() {
        assert_eq!(next_slot(Some(900), 5_000, 500), (0, 5_500));
    }

    #[test]
    fn test_back_to_back_reservations_are_spaced() {
        let now = 10_000;
        let (first_wait, next) = next_slot(None, now, 1_000);
        let (second_wait, next) = next_slot(Some(next), now, 1_000);
        let (third_wait, _) = next_slot(Some(next), now, 1_000);
        assert_eq!((first_wait, second_wait, third_wait), (0, 1_000, 2_000));
    }

    #[test]
    fn test_sqlite_gate_spaces_same_domain() {
        let gate = SqliteDomainGate::new_in_memory().unwrap();
        let delay = Duration::from_millis(1_000);

        assert_eq!(gate.reserve("example.com", delay).unwrap(), Duration::ZERO);
        let second = gate.reserve("example.com", delay).unwrap();
        assert!(second > Duration::from_millis(900));
        assert!(second <= delay);

        // Other domains are independent
        assert_eq!(gate.reserve("other.com", delay).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_gate_is_shared_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.db");
        let worker_a = SqliteDomainGate::new(&path).unwrap();
        let worker_b = SqliteDomainGate::new(&path).unwrap();
        let delay = Duration::from_secs(2);

        assert_eq!(worker_a.reserve("example.com", delay).unwrap(), Duration::ZERO);
        assert!(worker_b.reserve("example.com", delay).unwrap() > Duration::from_millis(1_900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_slot_sleeps_reserved_wait() {
        let gate = Arc::new(SqliteDomainGate::new_in_memory().unwrap());
        let delay = Duration::from_secs(30);

        let mut announced = Vec::new();
        let start = tokio::time::Instant::now();
        let first = wait_for_slot(gate.as_ref(), "example.com", delay, |wait| {
            announced.push(wait)
        })
        .await;
        assert_eq!(first, Duration::ZERO);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let second = wait_for_slot(gate.as_ref(), "example.com", delay, |wait| {
            announced.push(wait)
        })
        .await;
        assert!(start.elapsed() > Duration::from_secs(29));
        // Only the second reservation had to wait
        assert_eq!(announced, vec![second]);
    }
}
