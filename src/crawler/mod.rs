//! Crawler module: the crawl worker role
//!
//! This module contains everything a crawl worker process needs:
//! - HTTP fetching under a bounded timeout
//! - HTML parsing and link extraction
//! - The shared per-domain politeness gate
//! - The task pull loop and its fan-out of children, documents and results

mod fetcher;
mod parser;
mod politeness;
mod worker;

pub use fetcher::{build_http_client, fetch_url, FetchOutcome};
pub use parser::{parse_html, ParsedPage};
pub use politeness::{next_slot, wait_for_slot, DomainGate, SqliteDomainGate};
pub use worker::{CrawlWorker, CrawlWorkerSettings, TaskOutcome};

use crate::config::Config;
use crate::queue::{BrokerOptions, SqliteBroker, WorkerExit};
use std::sync::Arc;

/// Runs a crawl worker process until it is terminated or goes idle
///
/// Opens the broker and the domain gate named by the configuration, builds
/// the HTTP client and runs the pull loop.
pub async fn run_crawl_worker(config: &Config, worker_id: String) -> crate::Result<WorkerExit> {
    let broker = SqliteBroker::new(
        &config.queue.database_path,
        BrokerOptions::from(&config.queue),
    )?;
    let gate = SqliteDomainGate::new(&config.queue.database_path)?;
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;

    let worker = CrawlWorker::new(
        worker_id,
        Arc::new(broker),
        Arc::new(gate),
        client,
        CrawlWorkerSettings::from_config(config),
    );

    Ok(worker.run().await?)
}
