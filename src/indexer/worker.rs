//! Index worker - turns documents into store records
//!
//! A document message is acknowledged only after its record was committed
//! (or its retry budget was spent and a failure result went out). A crash in
//! between causes redelivery, which the store's upsert absorbs.
//!
//! While a document is being retried its message is kept hidden from other
//! consumers. A message that was handed to another consumer before this one
//! got to it is left alone: the new owner emits its result.

use crate::config::Config;
use crate::indexer::classify::classify_content;
use crate::indexer::keywords::extract_keywords;
use crate::indexer::retry::{retry_with_backoff, RetryPolicy};
use crate::indexer::summary::summarize;
use crate::message::{decode, now_timestamp, Document, IndexResult, WorkerEvent, WorkerRole};
use crate::queue::{
    announce, names, publish, receive, terminate_requested, Delivery, QueueResult,
    QueueTransport, WorkerExit,
};
use crate::store::{ContentType, DocumentStore, IndexedDocument, UpsertOutcome};
use crate::url::extract_domain;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Log a throughput line every this many indexed documents
const PROGRESS_EVERY: u64 = 10;

/// Index worker settings
#[derive(Debug, Clone)]
pub struct IndexWorkerSettings {
    pub wait: Duration,
    pub max_messages: usize,
    /// Visibility timeout of the broker; a held message is re-hidden this long
    pub visibility: Duration,
    pub retry: RetryPolicy,
    pub summary_max_chars: usize,
    pub summary_lookahead: usize,
    pub keyword_count: usize,
    /// Consecutive empty pulls before exiting on its own (0 disables)
    pub idle_exit_rounds: u32,
}

impl IndexWorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait: config.queue.wait(),
            max_messages: config.queue.max_messages,
            visibility: config.queue.visibility_timeout(),
            retry: RetryPolicy::new(config.indexer.retry_base(), config.indexer.max_attempts),
            summary_max_chars: config.indexer.summary_max_chars,
            summary_lookahead: config.indexer.summary_lookahead,
            keyword_count: config.indexer.keyword_count,
            idle_exit_rounds: config.worker.idle_exit_rounds,
        }
    }
}

/// What happened to one document message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Indexed {
        outcome: UpsertOutcome,
        attempts: u32,
        waits: Vec<Duration>,
    },
    /// Retries exhausted; a failure result was emitted and the message dropped
    Failed {
        error: String,
        attempts: u32,
        waits: Vec<Duration>,
    },
    /// Undecodable body; discarded
    Malformed,
    /// Redelivered to another consumer meanwhile; neither emitted nor acked
    Superseded,
}

/// An index worker bound to a broker and a document store
pub struct IndexWorker {
    id: String,
    queue: Arc<dyn QueueTransport>,
    store: Box<dyn DocumentStore + Send>,
    settings: IndexWorkerSettings,
    indexed_count: u64,
    failed_count: u64,
    started: Instant,
}

impl IndexWorker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn QueueTransport>,
        store: Box<dyn DocumentStore + Send>,
        settings: IndexWorkerSettings,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            store,
            settings,
            indexed_count: 0,
            failed_count: 0,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn indexed_count(&self) -> u64 {
        self.indexed_count
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// Runs the pull loop until terminated or idle
    pub async fn run(&mut self) -> QueueResult<WorkerExit> {
        announce(self.queue.as_ref(), &self.id, WorkerRole::Index, WorkerEvent::Started)?;
        tracing::info!("Index worker {} started", self.id);

        let mut idle_rounds = 0u32;

        let exit = loop {
            if terminate_requested(self.queue.as_ref(), &self.id) {
                break WorkerExit::Terminated;
            }

            let pulled = receive(
                self.queue.as_ref(),
                names::DOCUMENTS,
                self.settings.max_messages,
                self.settings.wait,
            )
            .await;
            let batch = match pulled {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!("Document pull failed on worker {}: {}", self.id, e);
                    Vec::new()
                }
            };

            if batch.is_empty() {
                idle_rounds += 1;
                let limit = self.settings.idle_exit_rounds;
                if limit > 0 && idle_rounds >= limit {
                    tracing::info!(
                        "Index worker {} idle for {} pulls, exiting",
                        self.id,
                        idle_rounds
                    );
                    break WorkerExit::Idle;
                }
                continue;
            }

            idle_rounds = 0;
            for delivery in &batch {
                if let Err(e) = self.process_delivery(delivery).await {
                    tracing::error!(
                        "Emission failed on worker {}, document left for redelivery: {}",
                        self.id,
                        e
                    );
                }
            }
        };

        let stopped = announce(
            self.queue.as_ref(),
            &self.id,
            WorkerRole::Index,
            WorkerEvent::Stopped,
        );
        if let Err(e) = stopped {
            tracing::warn!("Failed to announce stop of {}: {}", self.id, e);
        }
        tracing::info!(
            "Index worker {} shutting down ({:?}). Indexed {} documents, {} failed",
            self.id,
            exit,
            self.indexed_count,
            self.failed_count
        );

        Ok(exit)
    }

    /// Processes one document message and acknowledges it
    ///
    /// Messages later in a batch may have outlived their visibility while
    /// earlier ones were retried, so ownership is re-checked first.
    pub async fn process_delivery(&mut self, delivery: &Delivery) -> QueueResult<DocumentOutcome> {
        if !self.hold(delivery)? {
            tracing::info!(
                "Document message {} was redelivered elsewhere, skipping",
                delivery.message_id
            );
            return Ok(DocumentOutcome::Superseded);
        }

        let outcome = match decode::<Document>(&delivery.body) {
            Ok(document) => self.index_document(&document, delivery).await?,
            Err(e) => {
                tracing::warn!("Discarding malformed document message: {}", e);
                DocumentOutcome::Malformed
            }
        };
        if outcome == DocumentOutcome::Superseded {
            return Ok(outcome);
        }

        if !self.queue.ack(names::DOCUMENTS, &delivery.receipt)? {
            tracing::warn!(
                "Stale receipt for document message {}; it was redelivered meanwhile",
                delivery.message_id
            );
        }

        Ok(outcome)
    }

    /// Re-hides `delivery` for one visibility timeout; false once it is stale
    fn hold(&self, delivery: &Delivery) -> QueueResult<bool> {
        self.queue
            .extend_visibility(names::DOCUMENTS, &delivery.receipt, self.settings.visibility)
    }

    async fn index_document(
        &mut self,
        document: &Document,
        delivery: &Delivery,
    ) -> QueueResult<DocumentOutcome> {
        let record = self.prepare(document);
        let policy = self.settings.retry;
        let visibility = self.settings.visibility;
        let queue = self.queue.as_ref();
        let store = &mut self.store;

        let report = retry_with_backoff(policy, |attempt| {
            // Covers this attempt and the backoff after it
            let hidden_for = visibility.saturating_add(policy.delay_for(attempt));
            if let Err(e) = queue.extend_visibility(names::DOCUMENTS, &delivery.receipt, hidden_for)
            {
                tracing::warn!("Could not extend visibility of {}: {}", record.url, e);
            }
            store.upsert(&record)
        })
        .await;

        if !self.hold(delivery)? {
            tracing::warn!(
                "Document {} was redelivered during retries; leaving it to the new owner",
                record.url
            );
            return Ok(DocumentOutcome::Superseded);
        }

        match report.result {
            Ok(outcome) => {
                self.indexed_count += 1;
                let result = IndexResult::indexed(&record.url, self.indexed_count, report.attempts);
                publish(self.queue.as_ref(), names::INDEX_RESULTS, &result, None, None)?;

                tracing::info!(
                    "Indexer {} indexed {} ({:?}, {} keywords)",
                    self.id,
                    record.url,
                    record.content_type,
                    record.keywords.len()
                );
                if self.indexed_count % PROGRESS_EVERY == 0 {
                    let elapsed = self.started.elapsed().as_secs_f64();
                    let rate = if elapsed > 0.0 {
                        self.indexed_count as f64 / elapsed
                    } else {
                        0.0
                    };
                    tracing::info!(
                        "Indexer {} performance: {} documents indexed, {:.2} docs/sec",
                        self.id,
                        self.indexed_count,
                        rate
                    );
                }

                Ok(DocumentOutcome::Indexed {
                    outcome,
                    attempts: report.attempts,
                    waits: report.waits,
                })
            }
            Err(e) => {
                self.failed_count += 1;
                let error = e.to_string();
                let result = IndexResult::failed(
                    &record.url,
                    self.failed_count,
                    error.clone(),
                    report.attempts,
                );
                publish(self.queue.as_ref(), names::INDEX_RESULTS, &result, None, None)?;

                tracing::error!(
                    "Giving up on {} after {} attempts: {}",
                    record.url,
                    report.attempts,
                    error
                );

                Ok(DocumentOutcome::Failed {
                    error,
                    attempts: report.attempts,
                    waits: report.waits,
                })
            }
        }
    }

    /// Derives the store record of a document
    fn prepare(&self, document: &Document) -> IndexedDocument {
        let url = Url::parse(&document.url).ok();
        let domain = url
            .as_ref()
            .and_then(extract_domain)
            .unwrap_or_else(|| document.seed_domain.clone());
        let content_type = url
            .as_ref()
            .map_or(ContentType::Other, |url| classify_content(url, &document.title));
        let text = format!("{} {}", document.title, document.content);

        IndexedDocument {
            url: document.url.clone(),
            url_hash: document.url_hash.clone(),
            domain,
            title: document.title.clone(),
            summary: summarize(
                &document.content,
                self.settings.summary_max_chars,
                self.settings.summary_lookahead,
            ),
            content: document.content.clone(),
            keywords: extract_keywords(&text, self.settings.keyword_count),
            content_type,
            depth: document.depth,
            seed_domain: document.seed_domain.clone(),
            crawled_at: document.timestamp.clone(),
            indexed_at: now_timestamp(),
        }
    }
}
