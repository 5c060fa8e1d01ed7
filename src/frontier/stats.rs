//! In-memory run statistics of the coordinator
//!
//! Counters are for observability only. They live for one coordinator run,
//! are never persisted, and never influence task flow.

use crate::message::{CrawlResult, CrawlStatus, IndexResult, IndexStatus};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Link dispatch totals summed over successful pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkTotals {
    pub extracted: u64,
    pub enqueued: u64,
    pub cross_domain: u64,
    pub depth_exceeded: u64,
    pub restricted: u64,
}

/// Aggregate counters of one coordinator run
#[derive(Debug, Clone, Default)]
pub struct FrontierStats {
    /// Seeds sent to the task queue
    pub seeds_enqueued: u64,

    /// Seeds dropped because their key was already visited
    pub seeds_duplicate: u64,

    /// Crawl results by status (restricted seeds included)
    pub by_status: HashMap<CrawlStatus, u64>,

    /// Crawl results by task depth
    pub by_depth: BTreeMap<u32, u64>,

    /// Crawl results by seed domain
    pub by_domain: BTreeMap<String, u64>,

    pub links: LinkTotals,

    pub indexed: u64,
    pub index_failed: u64,

    /// Documents that needed more than one store attempt
    pub index_retried: u64,
}

impl FrontierStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_crawl(&mut self, result: &CrawlResult) {
        *self.by_status.entry(result.status).or_insert(0) += 1;
        *self.by_depth.entry(result.depth).or_insert(0) += 1;
        *self.by_domain.entry(result.seed_domain.clone()).or_insert(0) += 1;

        if result.status == CrawlStatus::Success {
            let count = |field: Option<u32>| u64::from(field.unwrap_or(0));
            self.links.extracted += count(result.extracted_urls_count);
            self.links.enqueued += count(result.enqueued_count);
            self.links.cross_domain += count(result.cross_domain_count);
            self.links.depth_exceeded += count(result.depth_exceeded_count);
            self.links.restricted += count(result.restricted_count);
        }
    }

    /// Counts a seed that matched a restricted pattern and was never enqueued
    pub fn record_restricted_seed(&mut self, seed_domain: &str) {
        *self.by_status.entry(CrawlStatus::Restricted).or_insert(0) += 1;
        *self.by_depth.entry(0).or_insert(0) += 1;
        *self.by_domain.entry(seed_domain.to_string()).or_insert(0) += 1;
    }

    pub fn record_index(&mut self, result: &IndexResult) {
        match result.status {
            IndexStatus::Indexed => self.indexed += 1,
            IndexStatus::Failed => self.index_failed += 1,
        }
        if result.attempts > 1 {
            self.index_retried += 1;
        }
    }

    pub fn status_count(&self, status: CrawlStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Crawl results received, restricted seeds included
    pub fn crawl_results(&self) -> u64 {
        self.by_status.values().sum()
    }

    pub fn index_results(&self) -> u64 {
        self.indexed + self.index_failed
    }

    pub fn log_progress(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.crawl_results() as f64 / secs
        } else {
            0.0
        };
        tracing::info!(
            "Progress: {} crawled ({} ok, {} errors, {} restricted), {} indexed, \
             {} index failures, {:.2} pages/sec",
            self.crawl_results(),
            self.status_count(CrawlStatus::Success),
            self.status_count(CrawlStatus::Error),
            self.status_count(CrawlStatus::Restricted),
            self.indexed,
            self.index_failed,
            rate
        );
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(stats: &FrontierStats, elapsed: Duration, visited: usize) {
    println!("=== Frontier Summary ===\n");

    println!("Overview:");
    println!("  Run time: {:.1}s", elapsed.as_secs_f64());
    println!("  Seeds enqueued: {}", stats.seeds_enqueued);
    println!("  Duplicate seeds dropped: {}", stats.seeds_duplicate);
    println!("  URLs visited: {}", visited);
    println!("  Crawl results: {}", stats.crawl_results());
    println!();

    println!("Results by Status:");
    for status in [CrawlStatus::Success, CrawlStatus::Error, CrawlStatus::Restricted] {
        let count = stats.status_count(status);
        let percentage = if stats.crawl_results() > 0 {
            (count as f64 / stats.crawl_results() as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status.as_str(), count, percentage);
    }
    println!();

    if !stats.by_depth.is_empty() {
        println!("Results by Depth:");
        for (depth, count) in &stats.by_depth {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.by_domain.is_empty() {
        println!("Results by Seed Domain ({}):", stats.by_domain.len());
        let mut domains: Vec<_> = stats.by_domain.iter().collect();
        domains.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (domain, count) in domains {
            println!("  - {}: {}", domain, count);
        }
        println!();
    }

    println!("Links:");
    println!("  Extracted: {}", stats.links.extracted);
    println!("  Enqueued: {}", stats.links.enqueued);
    println!("  Cross-domain (dropped): {}", stats.links.cross_domain);
    println!("  Beyond depth limit: {}", stats.links.depth_exceeded);
    println!("  Restricted: {}", stats.links.restricted);
    println!();

    println!("Indexing:");
    println!("  Indexed: {}", stats.indexed);
    println!("  Failed: {}", stats.index_failed);
    println!("  Needed retries: {}", stats.index_retried);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CrawlTask, LinkTally};
    use url::Url;

    fn task(depth: u32) -> CrawlTask {
        let seed = CrawlTask::seed(&Url::parse("http://example.com/").unwrap(), 3, vec![]).unwrap();
        let mut task = seed.child(&Url::parse("http://example.com/x").unwrap()).unwrap();
        task.depth = depth;
        task
    }

    #[test]
    fn test_record_crawl_counts_by_status_depth_and_domain() {
        let mut stats = FrontierStats::new();
        let tally = LinkTally {
            enqueued: 2,
            cross_domain: 1,
            depth_exceeded: 0,
            restricted: 1,
        };
        stats.record_crawl(&CrawlResult::success(&task(1), 200, 4, tally));
        stats.record_crawl(&CrawlResult::error(&task(2), Some(500), "HTTP 500"));
        stats.record_restricted_seed("example.com");

        assert_eq!(stats.crawl_results(), 3);
        assert_eq!(stats.status_count(CrawlStatus::Success), 1);
        assert_eq!(stats.status_count(CrawlStatus::Restricted), 1);
        assert_eq!(stats.by_depth.get(&2), Some(&1));
        assert_eq!(stats.by_domain.get("example.com"), Some(&3));
        assert_eq!(stats.links.extracted, 4);
        assert_eq!(stats.links.enqueued, 2);
        assert_eq!(stats.links.restricted, 1);
    }

    #[test]
    fn test_record_index() {
        let mut stats = FrontierStats::new();
        stats.record_index(&IndexResult::indexed("http://example.com/", 1, 3));
        stats.record_index(&IndexResult::failed("http://example.com/x", 1, "locked", 3));
        stats.record_index(&IndexResult::indexed("http://example.com/y", 2, 1));

        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.index_failed, 1);
        assert_eq!(stats.index_retried, 2);
        assert_eq!(stats.index_results(), 3);
    }
}
