//! End-to-end test of one crawl through all three roles
//!
//! A coordinator, a crawl worker and an index worker share one broker file,
//! exactly as separate processes would. Pages are served by wiremock.

use frontier_mesh::crawler::{CrawlWorker, CrawlWorkerSettings, SqliteDomainGate};
use frontier_mesh::frontier::{Coordinator, CoordinatorSettings, SeedAdmission};
use frontier_mesh::indexer::{IndexWorker, IndexWorkerSettings, RetryPolicy};
use frontier_mesh::message::CrawlStatus;
use frontier_mesh::queue::{names, BrokerOptions, QueueTransport, SqliteBroker};
use frontier_mesh::store::{ContentType, DocumentStore, SearchQuery, SqliteStore};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_seed_to_search() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page(
            "Book Shop",
            &format!(
                r#"<p>Welcome to the shop.</p>
                <a href="{base}/catalogue/travel">Browse</a>
                <a href="{base}/about">About</a>
                <a href="https://elsewhere.example/">Partner</a>"#
            ),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/travel"))
        .respond_with(page(
            "Travel Books",
            &format!(
                r#"<p>Travel books and maps for travelers.</p>
                <a href="{base}/">Home</a>
                <a href="{base}/catalogue/travel/deeper">More</a>"#
            ),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(page("About Us", "<p>A small family shop.</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/travel/deeper"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let queue_db = dir.path().join("queue.db");
    let index_db = dir.path().join("index.db");

    // Coordinator seeds the frontier
    let coordinator_broker =
        Arc::new(SqliteBroker::new(&queue_db, BrokerOptions::default()).unwrap());
    let mut coordinator = Coordinator::new(
        coordinator_broker.clone(),
        CoordinatorSettings {
            seeds: vec![format!("{}/", base), format!("{}/#top", base)],
            depth_limit: 1,
            restricted: vec![],
            idle_rounds: 3,
            poll_interval: Duration::from_millis(50),
            max_messages: 10,
            progress_every: 0,
        },
    )
    .unwrap();
    let admissions: Vec<SeedAdmission> =
        coordinator.admit_seeds().into_iter().map(|(_, a)| a).collect();
    assert_eq!(admissions, vec![SeedAdmission::Enqueued, SeedAdmission::Duplicate]);

    // Crawl worker drains the task queue
    let crawl_broker = Arc::new(SqliteBroker::new(&queue_db, BrokerOptions::default()).unwrap());
    let crawler = CrawlWorker::new(
        "crawl-pipeline",
        crawl_broker.clone(),
        Arc::new(SqliteDomainGate::new(&queue_db).unwrap()),
        Client::new(),
        CrawlWorkerSettings {
            wait: Duration::ZERO,
            visibility: Duration::from_secs(60),
            pull_delay: Duration::ZERO,
            domain_delay: Duration::ZERO,
            max_content_chars: 1000,
            same_origin: true,
            idle_exit_rounds: 1,
        },
    );
    let mut crawled = 0;
    while let Some(delivery) = crawl_broker.try_receive(names::TASKS, 1).unwrap().pop() {
        crawler.process_delivery(&delivery).await.unwrap();
        crawled += 1;
    }
    assert_eq!(crawled, 3);

    // Index worker drains the document queue
    let index_broker = Arc::new(SqliteBroker::new(&queue_db, BrokerOptions::default()).unwrap());
    let mut indexer = IndexWorker::new(
        "index-pipeline",
        index_broker.clone(),
        Box::new(SqliteStore::new(&index_db).unwrap()),
        IndexWorkerSettings {
            wait: Duration::ZERO,
            max_messages: 10,
            visibility: Duration::from_secs(60),
            retry: RetryPolicy::new(Duration::from_millis(1), 3),
            summary_max_chars: 200,
            summary_lookahead: 50,
            keyword_count: 10,
            idle_exit_rounds: 1,
        },
    );
    for delivery in index_broker.try_receive(names::DOCUMENTS, 10).unwrap() {
        indexer.process_delivery(&delivery).await.unwrap();
    }
    assert_eq!(indexer.indexed_count(), 3);
    assert_eq!(index_broker.depth(names::DOCUMENTS).unwrap(), 0);

    // Coordinator aggregates both result queues in one round
    let report = coordinator.poll_round().await;
    assert_eq!(report.crawl_results, 3);
    assert_eq!(report.index_results, 3);

    let stats = &coordinator.state().stats;
    assert_eq!(stats.status_count(CrawlStatus::Success), 3);
    assert_eq!(stats.links.cross_domain, 1);
    // Both links on the depth-1 page would land at depth 2
    assert_eq!(stats.links.depth_exceeded, 2);
    assert_eq!(stats.by_depth.get(&0), Some(&1));
    assert_eq!(stats.by_depth.get(&1), Some(&2));
    assert_eq!(stats.indexed, 3);

    // The store answers queries over what was crawled
    let store = SqliteStore::new(&index_db).unwrap();
    assert_eq!(store.count().unwrap(), 3);

    let results = store.query(&SearchQuery::new("travel maps")).unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].url, format!("{}/catalogue/travel", base));
    assert_eq!(results.hits[0].content_type, ContentType::Product);
    assert_eq!(results.hits[0].matched_terms, vec!["map", "travel"]);

    let mut homepages = SearchQuery::new("shop");
    homepages.content_type = Some(ContentType::Homepage);
    let results = store.query(&homepages).unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].url, format!("{}/", base));
}
