//! Frontier module: the coordinator role
//!
//! The coordinator owns all frontier state of a run (visited keys, counters,
//! idle tracking and the worker registry) in one [`FrontierState`] and shares
//! nothing with the workers except the broker.

mod coordinator;
mod quiescence;
mod registry;
mod stats;
mod visited;

pub use coordinator::{
    Coordinator, CoordinatorSettings, FrontierState, FrontierSummary, RoundReport, SeedAdmission,
};
pub use quiescence::IdleTracker;
pub use registry::{signal_shutdown, ShutdownLatch, WorkerRegistry};
pub use stats::{print_summary, FrontierStats, LinkTotals};
pub use visited::VisitedSet;

use crate::config::Config;
use crate::queue::{BrokerOptions, SqliteBroker};
use std::sync::Arc;

/// Runs the coordinator until the crawl is quiescent and prints the summary
pub async fn run_coordinator(config: &Config) -> crate::Result<FrontierSummary> {
    let broker = SqliteBroker::new(
        &config.queue.database_path,
        BrokerOptions::from(&config.queue),
    )?;
    let mut coordinator =
        Coordinator::new(Arc::new(broker), CoordinatorSettings::from_config(config))?;

    let summary = coordinator.run().await;
    print_summary(&summary.stats, summary.elapsed, summary.visited);

    Ok(summary)
}
