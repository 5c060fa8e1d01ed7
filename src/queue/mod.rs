//! Durable message queues
//!
//! Processes never share memory; they exchange work through named queues of a
//! broker with at-least-once delivery. A consumer acknowledges a message only
//! after everything it emits for that message has been sent.

mod control;
mod schema;
mod sqlite;
mod traits;

pub use control::{announce, terminate_requested, WorkerExit};
pub use sqlite::{BrokerOptions, SqliteBroker};
pub use traits::{Delivery, QueueError, QueueResult, QueueTransport, SendOutcome};

use crate::message::encode;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Well-known queue names
pub mod names {
    /// Crawl tasks, coordinator and crawl workers to crawl workers
    pub const TASKS: &str = "tasks";
    /// Page content, crawl workers to index workers
    pub const DOCUMENTS: &str = "documents";
    /// Crawl results, crawl workers to the coordinator
    pub const RESULTS: &str = "results";
    /// Index results, index workers to the coordinator
    pub const INDEX_RESULTS: &str = "index-results";
    /// Worker announcements, workers to the coordinator
    pub const CONTROL: &str = "control";

    /// Private control queue of one worker
    pub fn control_for(worker_id: &str) -> String {
        format!("{}.{}", CONTROL, worker_id)
    }
}

/// How often a long poll re-checks an empty queue
const POLL_STEP: Duration = Duration::from_millis(250);

/// Long-polls `queue` for up to `wait`
///
/// Returns as soon as at least one message is visible, or an empty batch once
/// `wait` has elapsed. A zero `wait` checks exactly once.
pub async fn receive<Q>(
    transport: &Q,
    queue: &str,
    max_messages: usize,
    wait: Duration,
) -> QueueResult<Vec<Delivery>>
where
    Q: QueueTransport + ?Sized,
{
    let deadline = Instant::now() + wait;

    loop {
        let batch = transport.try_receive(queue, max_messages)?;
        if !batch.is_empty() {
            return Ok(batch);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(batch);
        }

        tokio::time::sleep(POLL_STEP.min(deadline - now)).await;
    }
}

/// Encodes `message` as JSON and sends it
pub fn publish<Q, T>(
    transport: &Q,
    queue: &str,
    message: &T,
    dedup_key: Option<&str>,
    group_key: Option<&str>,
) -> QueueResult<SendOutcome>
where
    Q: QueueTransport + ?Sized,
    T: Serialize,
{
    let body = encode(message)?;
    transport.send(queue, &body, dedup_key, group_key)
}
