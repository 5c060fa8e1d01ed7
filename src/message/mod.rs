//! Wire messages exchanged between coordinator and workers
//!
//! Every queue carries JSON bodies with stable snake_case field names. This
//! module defines the message types and the encode/decode helpers used on
//! both sides of a queue.

mod types;

pub use types::{
    now_timestamp, ControlSignal, CrawlResult, CrawlStatus, CrawlTask, Document, IndexResult,
    IndexStatus, LinkTally, Signal, WorkerAnnouncement, WorkerEvent, WorkerRole,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors converting messages to and from their wire form
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Malformed message body: {0}")]
    Decode(serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// Serializes a message body
pub fn encode<T: Serialize>(message: &T) -> Result<String, MessageError> {
    serde_json::to_string(message).map_err(MessageError::Encode)
}

/// Deserializes a message body
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, MessageError> {
    serde_json::from_str(body).map_err(MessageError::Decode)
}
