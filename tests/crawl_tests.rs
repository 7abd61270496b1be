//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run full
//! multi-cycle crawls against a SQLite store on disk.

use crawl_frontier::config::{
    Config, CrawlerConfig, GeneratorConfig, HttpConfig, RulesConfig, SchedulerConfig, SeedsConfig,
    StorageConfig, UserAgentConfig,
};
use crawl_frontier::crawler::{crawler_from_config, META_KEY_DEPTH, META_KEY_REFERER};
use crawl_frontier::state::CrawlStatus;
use crawl_frontier::storage::{lock_store, open_storage, share, SharedStore};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `base_url` with fast scheduler timings
fn create_test_config(base_url: &str, db_path: &Path, depth: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            depth,
            threads: 4,
            ..CrawlerConfig::default()
        },
        scheduler: SchedulerConfig {
            hang_timeout_secs: 10,
            drain_timeout_secs: 5,
            monitor_interval_ms: 50,
            spin_wait_ms: 20,
            feeder_poll_ms: 20,
            ..SchedulerConfig::default()
        },
        generator: GeneratorConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        http: HttpConfig {
            https_only: false,
            ..HttpConfig::default()
        },
        storage: StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
        seeds: SeedsConfig {
            urls: vec![format!("{}/", base_url)],
            forced: vec![],
        },
        rules: RulesConfig {
            patterns: vec![format!("+{}/.*", base_url)],
        },
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Mounts a small site: `/` links to three pages, one failing and one redirecting
async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/page1">Page 1</a>
               <a href="/page2">Page 2</a>
               <a href="/old">Old</a>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<a href="/">Home</a><a href="/page2">Page 2</a>"#))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<p>Moved here</p>"))
        .mount(server)
        .await;
}

fn status_of(store: &SharedStore, url: &str) -> Option<CrawlStatus> {
    lock_store(store)
        .unwrap()
        .get(url)
        .unwrap()
        .map(|datum| datum.status())
}

#[tokio::test]
async fn test_full_crawl_follows_links_and_redirects() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&base_url, &db_path, 5);

    let store = share(open_storage(&db_path).unwrap());
    let crawler = crawler_from_config(&config, store.clone()).unwrap();
    let report = crawler.start(config.crawler.depth).await.unwrap();

    // /, then page1 + page2 + old, then the redirect target, then nothing
    assert_eq!(report.cycles.len(), 4);
    assert_eq!(report.cycles[3].generated, 0);
    assert_eq!(report.total_generated(), 5);
    assert_eq!(report.total_succeeded(), 4);
    assert_eq!(report.total_failed(), 1);
    assert!(!report.interrupted());

    let url = |p: &str| format!("{}{}", base_url, p);
    assert_eq!(status_of(&store, &url("/")), Some(CrawlStatus::Success));
    assert_eq!(status_of(&store, &url("/page1")), Some(CrawlStatus::Success));
    assert_eq!(status_of(&store, &url("/page2")), Some(CrawlStatus::Failed));
    assert_eq!(status_of(&store, &url("/old")), Some(CrawlStatus::Success));
    assert_eq!(status_of(&store, &url("/new")), Some(CrawlStatus::Success));

    let guard = lock_store(&store).unwrap();
    assert_eq!(guard.count_total().unwrap(), 5);
    assert_eq!(guard.count_cycles().unwrap(), 4);

    let old = guard.get(&url("/old")).unwrap().unwrap();
    assert_eq!(old.code(), 301);
    assert_eq!(old.location(), Some(url("/new").as_str()));

    let new = guard.get(&url("/new")).unwrap().unwrap();
    assert_eq!(new.meta_as_i64(META_KEY_DEPTH), Some(3));
    assert_eq!(new.meta_as_str(META_KEY_REFERER), Some(url("/old")));
}

#[tokio::test]
async fn test_resumed_crawl_retries_only_failed_records() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&base_url, &db_path, 5);

    {
        let store = share(open_storage(&db_path).unwrap());
        let crawler = crawler_from_config(&config, store).unwrap();
        crawler.start(config.crawler.depth).await.unwrap();
    }

    let store = share(open_storage(&db_path).unwrap());
    let crawler = crawler_from_config(&config, store.clone())
        .unwrap()
        .resumable(true);
    let report = crawler.start(1).await.unwrap();

    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.total_generated(), 1);
    assert_eq!(report.total_failed(), 1);

    let page2 = lock_store(&store)
        .unwrap()
        .get(&format!("{}/page2", base_url))
        .unwrap()
        .unwrap();
    assert_eq!(page2.status(), CrawlStatus::Failed);
    assert_eq!(page2.execute_count(), 2);
}

#[tokio::test]
async fn test_fresh_crawl_clears_previous_records() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = create_test_config(&base_url, &db_path, 1);

    let store = share(open_storage(&db_path).unwrap());
    let first = crawler_from_config(&config, store.clone())
        .unwrap()
        .start(1)
        .await
        .unwrap();
    let second = crawler_from_config(&config, store.clone())
        .unwrap()
        .start(1)
        .await
        .unwrap();

    assert_eq!(first.total_generated(), 1);
    assert_eq!(second.total_generated(), 1);

    let guard = lock_store(&store).unwrap();
    // The seed plus the three links found on it, with no leftover cycles
    assert_eq!(guard.count_total().unwrap(), 4);
    assert_eq!(guard.count_cycles().unwrap(), 1);
    assert_eq!(guard.count_by_status(CrawlStatus::Success).unwrap(), 1);
}
