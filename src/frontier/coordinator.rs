//! Frontier coordinator - seeding, result aggregation and quiescence
//!
//! The coordinator never fetches anything. It admits the seeds, then polls
//! the result queues in rounds until enough consecutive rounds came back
//! empty, and finally tells every active worker to stop.

use crate::config::Config;
use crate::frontier::quiescence::IdleTracker;
use crate::frontier::registry::{signal_shutdown, ShutdownLatch, WorkerRegistry};
use crate::frontier::stats::FrontierStats;
use crate::frontier::visited::VisitedSet;
use crate::message::{decode, CrawlResult, CrawlTask, IndexResult, WorkerAnnouncement};
use crate::queue::{names, publish, receive, Delivery, QueueResult, QueueTransport};
use crate::url::{dedup_key, normalize_url, RestrictionSet};
use crate::ConfigError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub seeds: Vec<String>,
    pub depth_limit: u32,
    pub restricted: Vec<String>,
    pub idle_rounds: u32,
    /// Long-poll wait on the result queue, i.e. the length of an empty round
    pub poll_interval: Duration,
    pub max_messages: usize,
    /// Log a progress line every this many results (0 disables)
    pub progress_every: u64,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            seeds: config.frontier.seeds.clone(),
            depth_limit: config.frontier.depth_limit,
            restricted: config.frontier.restricted.clone(),
            idle_rounds: config.frontier.idle_rounds,
            poll_interval: config.frontier.poll_interval(),
            max_messages: config.queue.max_messages,
            progress_every: config.frontier.progress_every,
        }
    }
}

/// Everything the coordinator knows during one run
///
/// Constructed at start, threaded through every coordination step, dropped
/// at shutdown.
#[derive(Debug)]
pub struct FrontierState {
    pub visited: VisitedSet,
    pub stats: FrontierStats,
    pub idle: IdleTracker,
    pub registry: WorkerRegistry,
    pub shutdown: ShutdownLatch,
}

impl FrontierState {
    pub fn new(idle_rounds: u32) -> Self {
        Self {
            visited: VisitedSet::new(),
            stats: FrontierStats::new(),
            idle: IdleTracker::new(idle_rounds),
            registry: WorkerRegistry::new(),
            shutdown: ShutdownLatch::new(),
        }
    }
}

/// What happened to one seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedAdmission {
    Enqueued,
    /// Already visited in this run, or dropped by the broker's dedup window
    Duplicate,
    /// Matched a restricted pattern; marked visited, never enqueued
    Restricted,
    Invalid(String),
}

/// What one polling round received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub crawl_results: usize,
    pub index_results: usize,
    pub announcements: usize,
}

impl RoundReport {
    /// Whether the round counts as activity; announcements do not
    pub fn has_results(&self) -> bool {
        self.crawl_results + self.index_results > 0
    }
}

/// How a coordinator run ended
#[derive(Debug, Clone)]
pub struct FrontierSummary {
    pub rounds: u64,
    pub elapsed: Duration,
    pub terminate_signals: usize,
    pub visited: usize,
    pub stats: FrontierStats,
}

/// The frontier coordinator
pub struct Coordinator {
    queue: Arc<dyn QueueTransport>,
    settings: CoordinatorSettings,
    restrictions: RestrictionSet,
    state: FrontierState,
    results_seen: u64,
    started: Instant,
}

impl Coordinator {
    /// Creates a coordinator, compiling the restricted patterns
    pub fn new(
        queue: Arc<dyn QueueTransport>,
        settings: CoordinatorSettings,
    ) -> Result<Self, ConfigError> {
        let restrictions = RestrictionSet::compile(settings.restricted.as_slice())?;
        let state = FrontierState::new(settings.idle_rounds);
        Ok(Self {
            queue,
            settings,
            restrictions,
            state,
            results_seen: 0,
            started: Instant::now(),
        })
    }

    pub fn state(&self) -> &FrontierState {
        &self.state
    }

    /// Admits every configured seed
    pub fn admit_seeds(&mut self) -> Vec<(String, SeedAdmission)> {
        let seeds = self.settings.seeds.clone();
        seeds
            .into_iter()
            .map(|seed| {
                let admission = self.admit_seed(&seed);
                (seed, admission)
            })
            .collect()
    }

    /// Normalizes, dedups, filters and enqueues one seed at depth 0
    pub fn admit_seed(&mut self, seed: &str) -> SeedAdmission {
        let url = match normalize_url(seed) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping invalid seed {}: {}", seed, e);
                return SeedAdmission::Invalid(e.to_string());
            }
        };

        let key = dedup_key(&url);
        if !self.state.visited.mark(&key) {
            tracing::debug!("Seed {} already visited", url);
            self.state.stats.seeds_duplicate += 1;
            return SeedAdmission::Duplicate;
        }

        let patterns = self.settings.restricted.clone();
        let task = match CrawlTask::seed(&url, self.settings.depth_limit, patterns) {
            Some(task) => task,
            None => {
                tracing::warn!("Skipping seed without a host: {}", url);
                return SeedAdmission::Invalid(format!("no host in {}", url));
            }
        };

        if let Some(pattern) = self.restrictions.find_match(&url) {
            tracing::info!("Seed {} matches restricted pattern '{}'", url, pattern.source());
            self.state.stats.record_restricted_seed(&task.seed_domain);
            return SeedAdmission::Restricted;
        }

        match publish(self.queue.as_ref(), names::TASKS, &task, Some(&key), None) {
            Ok(outcome) if outcome.is_enqueued() => {
                tracing::info!("Seeded {} (depth limit {})", url, task.depth_limit);
                self.state.stats.seeds_enqueued += 1;
                SeedAdmission::Enqueued
            }
            Ok(_) => {
                tracing::info!("Seed {} is still within the broker's dedup window", url);
                self.state.stats.seeds_duplicate += 1;
                SeedAdmission::Duplicate
            }
            Err(e) => {
                tracing::error!("Failed to enqueue seed {}: {}", url, e);
                SeedAdmission::Invalid(e.to_string())
            }
        }
    }

    /// Runs one polling round
    ///
    /// Long-polls the result queue for one poll interval, then drains the
    /// index-result and control queues without waiting. Queue errors are
    /// logged and count as empty polls.
    pub async fn poll_round(&mut self) -> RoundReport {
        let mut report = RoundReport::default();

        let crawl_batch = receive(
            self.queue.as_ref(),
            names::RESULTS,
            self.settings.max_messages,
            self.settings.poll_interval,
        )
        .await;
        for delivery in self.batch_or_empty(names::RESULTS, crawl_batch) {
            if let Some(result) = self.take::<CrawlResult>(names::RESULTS, &delivery) {
                self.record_crawl(&result);
                report.crawl_results += 1;
            }
        }

        let index_batch = self
            .queue
            .try_receive(names::INDEX_RESULTS, self.settings.max_messages);
        for delivery in self.batch_or_empty(names::INDEX_RESULTS, index_batch) {
            if let Some(result) = self.take::<IndexResult>(names::INDEX_RESULTS, &delivery) {
                self.record_index(&result);
                report.index_results += 1;
            }
        }

        let control_batch = self
            .queue
            .try_receive(names::CONTROL, self.settings.max_messages);
        for delivery in self.batch_or_empty(names::CONTROL, control_batch) {
            if let Some(announcement) = self.take::<WorkerAnnouncement>(names::CONTROL, &delivery) {
                self.state.registry.apply(&announcement);
                report.announcements += 1;
            }
        }

        report
    }

    /// Seeds the frontier and coordinates until quiescence
    pub async fn run(&mut self) -> FrontierSummary {
        self.started = Instant::now();
        tracing::info!(
            "Coordinator starting with {} seeds, depth limit {}, {} restricted patterns",
            self.settings.seeds.len(),
            self.settings.depth_limit,
            self.restrictions.patterns().len()
        );

        self.admit_seeds();

        let mut rounds = 0u64;
        loop {
            let report = self.poll_round().await;
            rounds += 1;

            if self.state.idle.record_round(report.has_results()) {
                tracing::info!(
                    "No results for {} consecutive rounds, crawl is quiescent",
                    self.state.idle.idle_rounds()
                );
                break;
            }
            if !report.has_results() {
                tracing::debug!(
                    "Idle round {}/{}",
                    self.state.idle.idle_rounds(),
                    self.state.idle.threshold()
                );
            }
        }

        let terminate_signals = self.shutdown("frontier quiescent");
        let elapsed = self.started.elapsed();
        tracing::info!(
            "Coordinator finished after {} rounds in {:.1}s; signalled {} workers",
            rounds,
            elapsed.as_secs_f64(),
            terminate_signals
        );

        FrontierSummary {
            rounds,
            elapsed,
            terminate_signals,
            visited: self.state.visited.len(),
            stats: self.state.stats.clone(),
        }
    }

    /// Signals every active worker to terminate; no-op after the first call
    pub fn shutdown(&mut self, reason: &str) -> usize {
        signal_shutdown(
            self.queue.as_ref(),
            &self.state.registry,
            &mut self.state.shutdown,
            reason,
        )
    }

    fn record_crawl(&mut self, result: &CrawlResult) {
        let key = if result.url_hash.is_empty() {
            normalize_url(&result.url).map(|url| dedup_key(&url)).ok()
        } else {
            Some(result.url_hash.clone())
        };
        if let Some(key) = key {
            self.state.visited.mark(&key);
        }

        match &result.error {
            Some(error) => tracing::debug!("Crawl error for {}: {}", result.url, error),
            None => tracing::debug!("Crawl {} for {}", result.status.as_str(), result.url),
        }
        self.state.stats.record_crawl(result);
        self.count_result();
    }

    fn record_index(&mut self, result: &IndexResult) {
        if let Some(error) = &result.error {
            tracing::warn!(
                "Index failure for {}: {}",
                result.url().unwrap_or("<unknown>"),
                error
            );
        }
        self.state.stats.record_index(result);
        self.count_result();
    }

    fn count_result(&mut self) {
        self.results_seen += 1;
        let every = self.settings.progress_every;
        if every > 0 && self.results_seen % every == 0 {
            self.state.stats.log_progress(self.started.elapsed());
        }
    }

    fn batch_or_empty(&self, queue: &str, batch: QueueResult<Vec<Delivery>>) -> Vec<Delivery> {
        batch.unwrap_or_else(|e| {
            tracing::warn!("Polling {} failed, treating as empty: {}", queue, e);
            Vec::new()
        })
    }

    /// Decodes and acknowledges one delivery; malformed bodies are dropped
    fn take<T: serde::de::DeserializeOwned>(&self, queue: &str, delivery: &Delivery) -> Option<T> {
        let decoded = match decode::<T>(&delivery.body) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Discarding malformed message on {}: {}", queue, e);
                None
            }
        };

        if let Err(e) = self.queue.ack(queue, &delivery.receipt) {
            tracing::warn!("Failed to ack message on {}: {}", queue, e);
        }

        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{
        encode, ControlSignal, LinkTally, Signal, WorkerEvent, WorkerRole,
    };
    use crate::queue::{announce, BrokerOptions, SqliteBroker};
    use url::Url;

    fn settings(seeds: &[&str]) -> CoordinatorSettings {
        CoordinatorSettings {
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            depth_limit: 1,
            restricted: vec!["*/login*".to_string(), "ads.example.com".to_string()],
            idle_rounds: 30,
            poll_interval: Duration::from_secs(5),
            max_messages: 10,
            progress_every: 25,
        }
    }

    fn broker() -> Arc<SqliteBroker> {
        Arc::new(SqliteBroker::new_in_memory(BrokerOptions::default()).unwrap())
    }

    fn queued_tasks(broker: &SqliteBroker) -> Vec<CrawlTask> {
        broker
            .try_receive(names::TASKS, 10)
            .unwrap()
            .iter()
            .map(|d| decode(&d.body).unwrap())
            .collect()
    }

    #[test]
    fn test_seed_admission() {
        let broker = broker();
        let mut coordinator = Coordinator::new(
            broker.clone(),
            settings(&[
                "http://example.com/a",
                "http://example.com/a#top",
                "http://example.com/login",
                "https://ads.example.com/banner",
                "ftp://example.com/file",
            ]),
        )
        .unwrap();

        let admissions: Vec<SeedAdmission> =
            coordinator.admit_seeds().into_iter().map(|(_, a)| a).collect();

        assert_eq!(admissions[0], SeedAdmission::Enqueued);
        assert_eq!(admissions[1], SeedAdmission::Duplicate);
        assert_eq!(admissions[2], SeedAdmission::Restricted);
        assert_eq!(admissions[3], SeedAdmission::Restricted);
        assert!(matches!(admissions[4], SeedAdmission::Invalid(_)));

        let tasks = queued_tasks(&broker);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].url, "http://example.com/a");
        assert_eq!(tasks[0].depth, 0);
        assert_eq!(tasks[0].seed_domain, "example.com");
        assert_eq!(tasks[0].depth_limit, 1);

        let state = coordinator.state();
        assert_eq!(state.visited.len(), 3);
        assert_eq!(state.stats.seeds_enqueued, 1);
        assert_eq!(state.stats.status_count(crate::message::CrawlStatus::Restricted), 2);
    }

    #[test]
    fn test_invalid_restricted_pattern_is_rejected() {
        let mut bad = settings(&["http://example.com/"]);
        bad.restricted = vec![String::new()];
        assert!(Coordinator::new(broker(), bad).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_counts_results_and_registers_workers() {
        let broker = broker();
        let mut coordinator = Coordinator::new(broker.clone(), settings(&[])).unwrap();

        let task = CrawlTask::seed(&Url::parse("http://example.com/").unwrap(), 1, vec![]).unwrap();
        let result = CrawlResult::success(&task, 200, 3, LinkTally::default());
        broker.send(names::RESULTS, &encode(&result).unwrap(), None, None).unwrap();
        broker.send(names::RESULTS, "garbage", None, None).unwrap();
        let indexed = IndexResult::indexed("http://example.com/", 1, 1);
        broker.send(names::INDEX_RESULTS, &encode(&indexed).unwrap(), None, None).unwrap();
        announce(broker.as_ref(), "crawl-1", WorkerRole::Crawl, WorkerEvent::Started).unwrap();

        let report = coordinator.poll_round().await;

        assert_eq!(report.crawl_results, 1);
        assert_eq!(report.index_results, 1);
        assert_eq!(report.announcements, 1);
        assert!(report.has_results());
        assert_eq!(coordinator.state().registry.active_ids(), vec!["crawl-1"]);
        assert!(coordinator.state().visited.contains(&task.url_hash));
        // Malformed result acknowledged, not redelivered
        assert_eq!(broker.depth(names::RESULTS).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_announcements_alone_do_not_reset_idle() {
        let broker = broker();
        let mut coordinator = Coordinator::new(broker.clone(), settings(&[])).unwrap();
        announce(broker.as_ref(), "index-1", WorkerRole::Index, WorkerEvent::Started).unwrap();

        let report = coordinator.poll_round().await;
        assert_eq!(report.announcements, 1);
        assert!(!report.has_results());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiescence_after_150s_signals_each_worker_once() {
        let broker = broker();
        announce(broker.as_ref(), "crawl-1", WorkerRole::Crawl, WorkerEvent::Started).unwrap();
        announce(broker.as_ref(), "crawl-2", WorkerRole::Crawl, WorkerEvent::Started).unwrap();
        announce(broker.as_ref(), "index-1", WorkerRole::Index, WorkerEvent::Started).unwrap();

        let mut coordinator =
            Coordinator::new(broker.clone(), settings(&["http://example.com/a"])).unwrap();
        let start = Instant::now();
        let summary = coordinator.run().await;

        assert_eq!(start.elapsed(), Duration::from_secs(150));
        assert_eq!(summary.rounds, 30);
        assert_eq!(summary.terminate_signals, 3);

        for worker in ["crawl-1", "crawl-2", "index-1"] {
            let queue = names::control_for(worker);
            let batch = broker.try_receive(&queue, 10).unwrap();
            assert_eq!(batch.len(), 1);
            let signal: ControlSignal = decode(&batch[0].body).unwrap();
            assert_eq!(signal.signal, Signal::Terminate);
        }

        // Second shutdown request is a no-op
        assert_eq!(coordinator.shutdown("again"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_worker_is_not_signalled() {
        let broker = broker();
        announce(broker.as_ref(), "crawl-1", WorkerRole::Crawl, WorkerEvent::Started).unwrap();
        announce(broker.as_ref(), "crawl-2", WorkerRole::Crawl, WorkerEvent::Started).unwrap();
        announce(broker.as_ref(), "crawl-2", WorkerRole::Crawl, WorkerEvent::Stopped).unwrap();

        let mut quick = settings(&[]);
        quick.idle_rounds = 2;
        let mut coordinator = Coordinator::new(broker.clone(), quick).unwrap();
        let summary = coordinator.run().await;

        assert_eq!(summary.terminate_signals, 1);
        assert_eq!(broker.depth(&names::control_for("crawl-2")).unwrap(), 0);
    }
}
