//! Frontier Mesh main entry point
//!
//! One binary, one role per process: the coordinator, a crawl worker or an
//! index worker. All of them attach to the same broker database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use frontier_mesh::config::{load_config_with_hash, Config};
use frontier_mesh::crawler::run_crawl_worker;
use frontier_mesh::frontier::run_coordinator;
use frontier_mesh::indexer::run_index_worker;
use frontier_mesh::message::WorkerRole;
use frontier_mesh::store::{ContentType, DocumentStore, SearchQuery, SqliteStore};
use frontier_mesh::url::RestrictionSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Frontier Mesh: a queue-coordinated crawl frontier
///
/// A coordinator seeds the crawl and watches for quiescence; any number of
/// crawl and index workers compete for work on shared durable queues.
#[derive(Parser, Debug)]
#[command(name = "frontier-mesh")]
#[command(version = "1.0.0")]
#[command(about = "A queue-coordinated crawl frontier", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the frontier and coordinate until the crawl is quiescent
    Coordinator,

    /// Run a crawl worker
    CrawlWorker {
        /// Worker id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Run an index worker
    IndexWorker {
        /// Worker id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Query the document store
    Search {
        /// Free-text query
        query: String,

        /// Only return documents from this domain
        #[arg(long)]
        domain: Option<String>,

        /// Only return documents of this content type
        #[arg(long)]
        content_type: Option<ContentType>,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Hits per page
        #[arg(long, default_value_t = 10)]
        page_size: usize,
    },

    /// Validate the configuration and print the effective settings
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Coordinator => {
            let summary = run_coordinator(&config)
                .await
                .context("coordinator failed to start")?;
            tracing::info!(
                "Crawl complete: {} results, {} documents indexed",
                summary.stats.crawl_results(),
                summary.stats.indexed
            );
        }
        Command::CrawlWorker { id } => {
            let id = id.unwrap_or_else(|| WorkerRole::Crawl.new_worker_id());
            tracing::info!("Starting crawl worker {}", id);
            let exit = run_crawl_worker(&config, id.clone())
                .await
                .with_context(|| format!("crawl worker {} failed", id))?;
            tracing::info!("Crawl worker {} exited ({:?})", id, exit);
        }
        Command::IndexWorker { id } => {
            let id = id.unwrap_or_else(|| WorkerRole::Index.new_worker_id());
            tracing::info!("Starting index worker {}", id);
            let exit = run_index_worker(&config, id.clone())
                .await
                .with_context(|| format!("index worker {} failed", id))?;
            tracing::info!("Index worker {} exited ({:?})", id, exit);
        }
        Command::Search {
            query,
            domain,
            content_type,
            page,
            page_size,
        } => {
            let query = SearchQuery {
                text: query,
                domain,
                content_type,
                page: page.max(1),
                page_size: page_size.max(1),
            };
            handle_search(&config, &query)?;
        }
        Command::Check => handle_check(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frontier_mesh=info,warn"),
            1 => EnvFilter::new("frontier_mesh=debug,info"),
            2 => EnvFilter::new("frontier_mesh=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs a query against the document store and prints the hits
fn handle_search(config: &Config, query: &SearchQuery) -> anyhow::Result<()> {
    let store = SqliteStore::new(&config.indexer.database_path).with_context(|| {
        format!(
            "failed to open document store {}",
            config.indexer.database_path.display()
        )
    })?;

    let results = store.query(query)?;

    println!(
        "=== {} results for \"{}\" (page {}) ===\n",
        results.total, query.text, query.page
    );
    for (rank, hit) in results.hits.iter().enumerate() {
        let position = (query.page - 1) * query.page_size + rank + 1;
        println!("{}. {} [{}]", position, hit.title, hit.content_type);
        println!("   {}", hit.url);
        println!(
            "   score {:.1}, matched: {}",
            hit.score,
            hit.matched_terms.join(", ")
        );
        if !hit.summary.is_empty() {
            println!("   {}", hit.summary);
        }
        println!();
    }

    Ok(())
}

/// Prints the effective configuration without touching any database
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Frontier Mesh Configuration Check ===\n");

    println!("Frontier:");
    println!("  Depth limit: {}", config.frontier.depth_limit);
    println!("  Same origin: {}", config.frontier.same_origin);
    println!(
        "  Quiescence: {} idle rounds x {}s",
        config.frontier.idle_rounds, config.frontier.poll_interval_secs
    );
    println!("  Progress every: {} results", config.frontier.progress_every);

    println!("\nSeeds ({}):", config.frontier.seeds.len());
    for seed in &config.frontier.seeds {
        println!("  - {}", seed);
    }

    let restrictions = RestrictionSet::compile(config.frontier.restricted.as_slice())?;
    println!("\nRestricted Patterns ({}):", restrictions.patterns().len());
    for pattern in restrictions.patterns() {
        println!("  - {} => {}", pattern.source(), pattern.regex_str());
    }

    println!("\nQueue:");
    println!("  Database: {}", config.queue.database_path.display());
    println!("  Wait: {}s", config.queue.wait_secs);
    println!("  Max messages: {}", config.queue.max_messages);
    println!("  Visibility timeout: {}s", config.queue.visibility_timeout_secs);
    println!("  Dedup window: {}s", config.queue.dedup_window_secs);

    println!("\nCrawler:");
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Pull delay: {}ms", config.crawler.pull_delay_ms);
    println!("  Domain delay: {}ms", config.crawler.domain_delay_ms);
    println!("  Max content chars: {}", config.crawler.max_content_chars);

    println!("\nIndexer:");
    println!("  Database: {}", config.indexer.database_path.display());
    println!(
        "  Retries: {} attempts, base {}ms",
        config.indexer.max_attempts, config.indexer.retry_base_ms
    );
    println!("  Keywords per document: {}", config.indexer.keyword_count);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    println!("\n✓ Configuration is valid");

    Ok(())
}
