//! Indexer module: the index worker role
//!
//! Index workers consume documents, derive the searchable metadata of each
//! page (keywords, summary, content type) and write the result to the
//! document store with bounded retries.

mod classify;
mod keywords;
mod retry;
mod summary;
mod worker;

pub use classify::classify_content;
pub use keywords::{extract_keywords, tokenize};
pub use retry::{retry_with_backoff, RetryPolicy, RetryReport};
pub use summary::summarize;
pub use worker::{DocumentOutcome, IndexWorker, IndexWorkerSettings};

use crate::config::Config;
use crate::queue::{BrokerOptions, SqliteBroker, WorkerExit};
use crate::store::SqliteStore;
use std::sync::Arc;

/// Runs an index worker process until it is terminated or goes idle
pub async fn run_index_worker(config: &Config, worker_id: String) -> crate::Result<WorkerExit> {
    let broker = SqliteBroker::new(
        &config.queue.database_path,
        BrokerOptions::from(&config.queue),
    )?;
    let store = SqliteStore::new(&config.indexer.database_path)?;

    let mut worker = IndexWorker::new(
        worker_id,
        Arc::new(broker),
        Box::new(store),
        IndexWorkerSettings::from_config(config),
    );

    Ok(worker.run().await?)
}
