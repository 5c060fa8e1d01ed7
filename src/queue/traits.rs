//! Queue transport trait and error types
//!
//! This module defines the contract every queue backend provides: at-least-once
//! delivery, dedup keys, group keys, and receipt-based acknowledgement.

use crate::message::MessageError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Queue connection lock poisoned")]
    LockPoisoned,

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// What happened to a sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Stored and will be delivered
    Enqueued(i64),
    /// Dropped because its dedup key was seen within the dedup window
    Duplicate,
}

impl SendOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued(_))
    }
}

/// A received message together with the receipt needed to acknowledge it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: i64,
    pub body: String,
    pub receipt: String,
    /// How many times this message has been handed out, this time included
    pub receive_count: u32,
}

/// Trait for queue transport implementations
///
/// Delivery is at-least-once: a received message stays hidden for the
/// visibility timeout and comes back if it is not acknowledged in time.
/// Implementations must be safe to share between tasks of one process and
/// between processes attached to the same backend.
pub trait QueueTransport: Send + Sync {
    /// Sends a message
    ///
    /// # Arguments
    ///
    /// * `queue` - Queue name
    /// * `body` - Message body (JSON)
    /// * `dedup_key` - Messages with a key already seen within the dedup window are dropped
    /// * `group_key` - Messages of one group are delivered in send order, one in flight at a time
    fn send(
        &self,
        queue: &str,
        body: &str,
        dedup_key: Option<&str>,
        group_key: Option<&str>,
    ) -> QueueResult<SendOutcome>;

    /// Receives up to `max_messages` visible messages without waiting
    ///
    /// An empty vector is a normal outcome.
    fn try_receive(&self, queue: &str, max_messages: usize) -> QueueResult<Vec<Delivery>>;

    /// Acknowledges (deletes) a received message
    ///
    /// Returns false if the receipt is stale, i.e. the message was already
    /// acknowledged or redelivered under a newer receipt.
    fn ack(&self, queue: &str, receipt: &str) -> QueueResult<bool>;

    /// Keeps a received message hidden for `hidden_for` from now
    ///
    /// Consumers call this before any wait that could outlast the visibility
    /// timeout. Returns false if the receipt is stale: the message was
    /// acknowledged or handed to another consumer, which now owns it.
    fn extend_visibility(&self, queue: &str, receipt: &str, hidden_for: Duration)
        -> QueueResult<bool>;

    /// Counts messages in a queue, in flight or not
    fn depth(&self, queue: &str) -> QueueResult<u64>;
}
