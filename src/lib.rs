//! Frontier Mesh: a queue-coordinated crawl frontier
//!
//! This crate implements a fleet of cooperating processes (a frontier
//! coordinator, crawl workers and index workers) that share no memory and
//! talk only through a durable, at-least-once message broker.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod indexer;
pub mod message;
pub mod queue;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Frontier Mesh operations
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Message error: {0}")]
    Message(#[from] message::MessageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid restricted pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Frontier Mesh operations
pub type Result<T> = std::result::Result<T, MeshError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use message::{CrawlResult, CrawlStatus, CrawlTask, Document, IndexResult};
pub use crate::url::{dedup_key, extract_domain, normalize_url, RestrictionSet};
