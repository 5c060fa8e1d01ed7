//! Crawl worker - pulls tasks, fetches pages and fans out the results
//!
//! Per task the worker emits, in order: admitted child tasks, one document,
//! and one terminal crawl result. The task message is acknowledged only after
//! every emission went through; otherwise it is redelivered after the
//! visibility timeout and the dedup keys absorb the repeated children.
//!
//! A task waiting for its domain slot is kept hidden for the whole wait, and
//! is only fetched if this worker still owns its message afterwards.

use crate::config::Config;
use crate::crawler::fetcher::{fetch_url, FetchOutcome};
use crate::crawler::parser::parse_html;
use crate::crawler::politeness::{wait_for_slot, DomainGate};
use crate::message::{
    decode, CrawlResult, CrawlTask, Document, LinkTally, WorkerEvent, WorkerRole,
};
use crate::queue::{
    announce, names, publish, receive, terminate_requested, Delivery, QueueResult,
    QueueTransport, SendOutcome, WorkerExit,
};
use crate::url::{
    classify_link, dedup_key, extract_domain, normalize_url, LinkScope, RestrictionSet,
    ScopeDecision,
};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Crawl worker settings
#[derive(Debug, Clone)]
pub struct CrawlWorkerSettings {
    /// Long-poll wait of a task pull
    pub wait: Duration,
    /// Visibility timeout of the broker; a held task is re-hidden this long
    pub visibility: Duration,
    /// Pause after each processed task
    pub pull_delay: Duration,
    /// Spacing between requests to one domain
    pub domain_delay: Duration,
    pub max_content_chars: usize,
    pub same_origin: bool,
    /// Consecutive empty pulls before exiting on its own (0 disables)
    pub idle_exit_rounds: u32,
}

impl CrawlWorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait: config.queue.wait(),
            visibility: config.queue.visibility_timeout(),
            pull_delay: config.crawler.pull_delay(),
            domain_delay: config.crawler.domain_delay(),
            max_content_chars: config.crawler.max_content_chars,
            same_origin: config.frontier.same_origin,
            idle_exit_rounds: config.worker.idle_exit_rounds,
        }
    }
}

/// What happened to one task message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Fetched and fanned out
    Crawled { status_code: u16, tally: LinkTally },
    /// Fetch failed; an error result was emitted
    Failed { error: String },
    /// Matched a restricted pattern; never fetched
    Restricted,
    /// Depth beyond its own limit; dropped without a result
    DepthExceeded,
    /// Undecodable body; discarded
    Malformed,
    /// Redelivered to another worker while waiting; neither fetched nor acked
    Superseded,
}

/// A crawl worker bound to a broker, a domain gate and an HTTP client
pub struct CrawlWorker {
    id: String,
    queue: Arc<dyn QueueTransport>,
    gate: Arc<dyn DomainGate>,
    client: Client,
    settings: CrawlWorkerSettings,
}

impl CrawlWorker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn QueueTransport>,
        gate: Arc<dyn DomainGate>,
        client: Client,
        settings: CrawlWorkerSettings,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            gate,
            client,
            settings,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs the pull loop until terminated or idle
    ///
    /// Queue failures inside the loop are logged and treated as empty pulls.
    pub async fn run(&self) -> QueueResult<WorkerExit> {
        announce(self.queue.as_ref(), &self.id, WorkerRole::Crawl, WorkerEvent::Started)?;
        tracing::info!("Crawl worker {} started", self.id);

        let mut idle_rounds = 0u32;
        let mut processed = 0u64;

        let exit = loop {
            if terminate_requested(self.queue.as_ref(), &self.id) {
                break WorkerExit::Terminated;
            }

            let pulled = receive(self.queue.as_ref(), names::TASKS, 1, self.settings.wait).await;
            let batch = match pulled {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!("Task pull failed on worker {}: {}", self.id, e);
                    Vec::new()
                }
            };

            if batch.is_empty() {
                idle_rounds += 1;
                let limit = self.settings.idle_exit_rounds;
                if limit > 0 && idle_rounds >= limit {
                    tracing::info!(
                        "Crawl worker {} idle for {} pulls, exiting",
                        self.id,
                        idle_rounds
                    );
                    break WorkerExit::Idle;
                }
                continue;
            }

            idle_rounds = 0;
            for delivery in &batch {
                match self.process_delivery(delivery).await {
                    Ok(outcome) => {
                        tracing::debug!("Task outcome on {}: {:?}", self.id, outcome);
                        processed += 1;
                    }
                    Err(e) => tracing::error!(
                        "Emission failed on worker {}, task left for redelivery: {}",
                        self.id,
                        e
                    ),
                }
            }

            if !self.settings.pull_delay.is_zero() {
                tokio::time::sleep(self.settings.pull_delay).await;
            }
        };

        let stopped = announce(
            self.queue.as_ref(),
            &self.id,
            WorkerRole::Crawl,
            WorkerEvent::Stopped,
        );
        if let Err(e) = stopped {
            tracing::warn!("Failed to announce stop of {}: {}", self.id, e);
        }
        tracing::info!(
            "Crawl worker {} stopped ({:?}) after {} tasks",
            self.id,
            exit,
            processed
        );

        Ok(exit)
    }

    /// Processes one task message and acknowledges it
    ///
    /// Returns an error (and leaves the message unacknowledged) only if an
    /// emission failed.
    pub async fn process_delivery(&self, delivery: &Delivery) -> QueueResult<TaskOutcome> {
        let outcome = match decode::<CrawlTask>(&delivery.body) {
            Ok(task) => self.process_task(task, &delivery.receipt).await?,
            Err(e) => {
                tracing::warn!("Discarding malformed task message: {}", e);
                TaskOutcome::Malformed
            }
        };
        if outcome == TaskOutcome::Superseded {
            return Ok(outcome);
        }

        if !self.queue.ack(names::TASKS, &delivery.receipt)? {
            tracing::warn!(
                "Stale receipt for task message {}; it was redelivered meanwhile",
                delivery.message_id
            );
        }

        Ok(outcome)
    }

    async fn process_task(&self, mut task: CrawlTask, receipt: &str) -> QueueResult<TaskOutcome> {
        let url = match normalize_url(&task.url) {
            Ok(url) => url,
            Err(e) => {
                let message = format!("Invalid task URL: {}", e);
                return self.emit_failure(&task, None, message);
            }
        };
        if task.url_hash.is_empty() {
            task.url_hash = dedup_key(&url);
        }

        if !task.within_depth() {
            tracing::warn!(
                "Dropping {} at depth {} beyond its limit {}",
                task.url,
                task.depth,
                task.depth_limit
            );
            return Ok(TaskOutcome::DepthExceeded);
        }

        let restrictions = match RestrictionSet::compile(task.restricted_patterns.as_slice()) {
            Ok(restrictions) => restrictions,
            Err(e) => {
                let message = format!("Invalid restricted pattern: {}", e);
                return self.emit_failure(&task, None, message);
            }
        };

        if let Some(pattern) = restrictions.find_match(&url) {
            tracing::info!("Skipping restricted {} (matches '{}')", task.url, pattern.source());
            self.emit_restricted(&task)?;
            return Ok(TaskOutcome::Restricted);
        }

        if let Some(domain) = extract_domain(&url) {
            let hold = |wait: Duration| {
                let hidden_for = wait.saturating_add(self.settings.visibility);
                if let Err(e) = self.queue.extend_visibility(names::TASKS, receipt, hidden_for) {
                    tracing::warn!("Could not extend visibility of {}: {}", task.url, e);
                }
            };
            let waited =
                wait_for_slot(self.gate.as_ref(), &domain, self.settings.domain_delay, hold).await;

            if !waited.is_zero()
                && !self
                    .queue
                    .extend_visibility(names::TASKS, receipt, self.settings.visibility)?
            {
                tracing::info!(
                    "Task {} was redelivered while waiting for its slot, skipping",
                    task.url
                );
                return Ok(TaskOutcome::Superseded);
            }
        }

        tracing::info!("Worker {} fetching {} (depth {})", self.id, task.url, task.depth);
        match fetch_url(&self.client, url.as_str()).await {
            FetchOutcome::Success {
                final_url,
                status_code,
                body,
            } => {
                let base = Url::parse(&final_url).unwrap_or_else(|_| url.clone());
                let tally = self.fan_out(&task, &url, &base, &body, status_code, &restrictions)?;
                Ok(TaskOutcome::Crawled { status_code, tally })
            }
            FetchOutcome::HttpError { status_code } => {
                self.emit_failure(&task, Some(status_code), format!("HTTP {}", status_code))
            }
            FetchOutcome::TransportError { error } => self.emit_failure(&task, None, error),
        }
    }

    /// Emits children, the document and the success result of a fetched page
    fn fan_out(
        &self,
        task: &CrawlTask,
        url: &Url,
        base: &Url,
        body: &str,
        status_code: u16,
        restrictions: &RestrictionSet,
    ) -> QueueResult<LinkTally> {
        let parsed = parse_html(body, base);

        let scope = LinkScope {
            seed_domain: &task.seed_domain,
            depth: task.child_depth(),
            depth_limit: task.depth_limit,
            same_origin: self.settings.same_origin,
            restrictions,
        };

        // The page itself counts as already seen
        let mut seen: HashSet<String> = HashSet::from([dedup_key(url)]);
        let mut tally = LinkTally::default();

        for link in &parsed.links {
            let Ok(candidate) = normalize_url(link.as_str()) else {
                continue;
            };
            let key = dedup_key(&candidate);
            if !seen.insert(key) {
                continue;
            }

            match classify_link(&candidate, &scope) {
                ScopeDecision::CrossDomain => tally.cross_domain += 1,
                ScopeDecision::DepthExceeded => tally.depth_exceeded += 1,
                decision => {
                    // Admitted and restricted links always have a child depth
                    let Some(child) = task.child(&candidate) else {
                        tally.depth_exceeded += 1;
                        continue;
                    };

                    if decision == ScopeDecision::Restricted {
                        tally.restricted += 1;
                        self.emit_restricted(&child)?;
                        continue;
                    }

                    let outcome = publish(
                        self.queue.as_ref(),
                        names::TASKS,
                        &child,
                        Some(&child.url_hash),
                        None,
                    )?;
                    match outcome {
                        SendOutcome::Enqueued(_) => tally.enqueued += 1,
                        SendOutcome::Duplicate => {
                            tracing::debug!("Already enqueued: {}", child.url)
                        }
                    }
                }
            }
        }

        let document = Document::from_page(
            task,
            parsed.title.as_deref(),
            &parsed.text,
            self.settings.max_content_chars,
        );
        publish(
            self.queue.as_ref(),
            names::DOCUMENTS,
            &document,
            Some(&document.url_hash),
            Some(&document.url_hash),
        )?;

        let extracted = u32::try_from(parsed.links.len()).unwrap_or(u32::MAX);
        self.emit_result(CrawlResult::success(task, status_code, extracted, tally))?;

        tracing::info!(
            "Crawled {}: {} links, {} enqueued, {} cross-domain, {} too deep, {} restricted",
            task.url,
            extracted,
            tally.enqueued,
            tally.cross_domain,
            tally.depth_exceeded,
            tally.restricted
        );

        Ok(tally)
    }

    fn emit_failure(
        &self,
        task: &CrawlTask,
        status_code: Option<u16>,
        error: String,
    ) -> QueueResult<TaskOutcome> {
        tracing::error!("Failed to crawl {}: {}", task.url, error);
        self.emit_result(CrawlResult::error(task, status_code, error.clone()))?;
        Ok(TaskOutcome::Failed { error })
    }

    /// Reports a restricted URL once, however many pages link to it
    fn emit_restricted(&self, task: &CrawlTask) -> QueueResult<()> {
        let key = format!("restricted:{}", task.url_hash);
        self.publish_result(CrawlResult::restricted(task), Some(&key))
    }

    fn emit_result(&self, result: CrawlResult) -> QueueResult<()> {
        self.publish_result(result, None)
    }

    fn publish_result(&self, result: CrawlResult, dedup_key: Option<&str>) -> QueueResult<()> {
        let result = result.with_worker(&self.id);
        publish(self.queue.as_ref(), names::RESULTS, &result, dedup_key, None)?;
        Ok(())
    }
}
