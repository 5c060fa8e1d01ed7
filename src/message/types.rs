use crate::url::{dedup_key, extract_domain};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Current time as an RFC 3339 UTC timestamp
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// A unit of crawl work: fetch one URL within its seed's scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTask {
    /// Normalized URL to fetch
    pub url: String,

    /// Dedup key of `url`; recomputed by receivers when absent
    #[serde(default)]
    pub url_hash: String,

    /// Distance from the seed (seed = 0)
    pub depth: u32,

    /// Domain of the seed this branch started from
    pub seed_domain: String,

    /// Maximum depth of this branch
    pub depth_limit: u32,

    /// Operator patterns this branch must never fetch
    #[serde(default)]
    pub restricted_patterns: Vec<String>,
}

impl CrawlTask {
    /// Creates a depth-0 task for a normalized seed URL
    ///
    /// Returns None if the URL has no host.
    pub fn seed(url: &Url, depth_limit: u32, restricted_patterns: Vec<String>) -> Option<Self> {
        let seed_domain = extract_domain(url)?;
        Some(Self {
            url: url.to_string(),
            url_hash: dedup_key(url),
            depth: 0,
            seed_domain,
            depth_limit,
            restricted_patterns,
        })
    }

    /// Creates the task for a link found on this task's page
    ///
    /// The child inherits the seed domain, depth limit and patterns; its depth
    /// is `self.depth + 1`, or None if that overflows. Scope checks are the
    /// caller's job.
    pub fn child(&self, url: &Url) -> Option<Self> {
        Some(Self {
            url: url.to_string(),
            url_hash: dedup_key(url),
            depth: self.child_depth()?,
            seed_domain: self.seed_domain.clone(),
            depth_limit: self.depth_limit,
            restricted_patterns: self.restricted_patterns.clone(),
        })
    }

    /// Depth of links found on this task's page
    pub fn child_depth(&self) -> Option<u32> {
        self.depth.checked_add(1)
    }

    /// Returns true while `0 <= depth <= depth_limit` holds
    pub fn within_depth(&self) -> bool {
        self.depth <= self.depth_limit
    }
}

/// Terminal status of a processed crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Success,
    Error,
    Restricted,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Restricted => "restricted",
        }
    }
}

/// How the links of a successfully fetched page were dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkTally {
    pub enqueued: u32,
    pub cross_domain: u32,
    pub depth_exceeded: u32,
    pub restricted: u32,
}

/// Terminal report for one crawl task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub url_hash: String,
    pub status: CrawlStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_urls_count: Option<u32>,

    pub depth: u32,
    pub seed_domain: String,
    pub timestamp: String,

    /// Failure description, present for `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enqueued_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_domain_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_exceeded_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

impl CrawlResult {
    fn base(task: &CrawlTask, status: CrawlStatus) -> Self {
        Self {
            url: task.url.clone(),
            url_hash: task.url_hash.clone(),
            status,
            status_code: None,
            extracted_urls_count: None,
            depth: task.depth,
            seed_domain: task.seed_domain.clone(),
            timestamp: now_timestamp(),
            error: None,
            enqueued_count: None,
            cross_domain_count: None,
            depth_exceeded_count: None,
            restricted_count: None,
            worker_id: None,
        }
    }

    pub fn success(task: &CrawlTask, status_code: u16, extracted: u32, tally: LinkTally) -> Self {
        Self {
            status_code: Some(status_code),
            extracted_urls_count: Some(extracted),
            enqueued_count: Some(tally.enqueued),
            cross_domain_count: Some(tally.cross_domain),
            depth_exceeded_count: Some(tally.depth_exceeded),
            restricted_count: Some(tally.restricted),
            ..Self::base(task, CrawlStatus::Success)
        }
    }

    pub fn error(
        task: &CrawlTask,
        status_code: Option<u16>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            error: Some(description.into()),
            ..Self::base(task, CrawlStatus::Error)
        }
    }

    pub fn restricted(task: &CrawlTask) -> Self {
        Self::base(task, CrawlStatus::Restricted)
    }

    pub fn with_worker(mut self, worker_id: &str) -> Self {
        self.worker_id = Some(worker_id.to_string());
        self
    }
}

/// Page content handed from a crawl worker to an index worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub url_hash: String,
    pub title: String,
    pub content: String,
    pub depth: u32,
    pub seed_domain: String,
    pub timestamp: String,
}

impl Document {
    /// Builds the document for a fetched page, bounding content to `max_chars`
    pub fn from_page(task: &CrawlTask, title: Option<&str>, text: &str, max_chars: usize) -> Self {
        Self {
            url: task.url.clone(),
            url_hash: task.url_hash.clone(),
            title: title.unwrap_or("No Title").to_string(),
            content: text.chars().take(max_chars).collect(),
            depth: task.depth,
            seed_domain: task.seed_domain.clone(),
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Indexed,
    Failed,
}

/// Terminal report for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_url: Option<String>,

    pub status: IndexStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Store attempts made for this document
    #[serde(default)]
    pub attempts: u32,

    pub timestamp: String,
}

impl IndexResult {
    pub fn indexed(url: &str, indexed_count: u64, attempts: u32) -> Self {
        Self {
            indexed_url: Some(url.to_string()),
            failed_url: None,
            status: IndexStatus::Indexed,
            indexed_count: Some(indexed_count),
            failed_count: None,
            error: None,
            attempts,
            timestamp: now_timestamp(),
        }
    }

    pub fn failed(url: &str, failed_count: u64, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            indexed_url: None,
            failed_url: Some(url.to_string()),
            status: IndexStatus::Failed,
            indexed_count: None,
            failed_count: Some(failed_count),
            error: Some(error.into()),
            attempts,
            timestamp: now_timestamp(),
        }
    }

    /// The URL this result is about
    pub fn url(&self) -> Option<&str> {
        self.indexed_url.as_deref().or(self.failed_url.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Crawl,
    Index,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Index => "index",
        }
    }

    /// Generates a fresh worker id such as `crawl-1a2b3c4d`
    pub fn new_worker_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.as_str(), &suffix[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerEvent {
    Started,
    Stopped,
}

/// Lifecycle notice a worker posts on the control queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAnnouncement {
    pub worker_id: String,
    pub role: WorkerRole,
    pub event: WorkerEvent,
    pub timestamp: String,
}

impl WorkerAnnouncement {
    pub fn new(worker_id: &str, role: WorkerRole, event: WorkerEvent) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            role,
            event,
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Terminate,
}

/// Signal the coordinator addresses to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSignal {
    pub signal: Signal,
    pub reason: String,
    pub timestamp: String,
}

impl ControlSignal {
    pub fn terminate(reason: impl Into<String>) -> Self {
        Self {
            signal: Signal::Terminate,
            reason: reason.into(),
            timestamp: now_timestamp(),
        }
    }
}
