//! Configuration module for Frontier Mesh
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file shared by the coordinator and every worker.
//!
//! # Example
//!
//! ```no_run
//! use frontier_mesh::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("frontier.toml")).unwrap();
//! println!("Depth limit: {}", config.frontier.depth_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FrontierConfig, IndexerConfig, QueueConfig, UserAgentConfig,
    WorkerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
