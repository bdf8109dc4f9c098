//! HTTP API tests against a live server on an ephemeral port

use driftnet::api::{router, AppState};
use driftnet::config::{Config, CrawlerConfig, StorageConfig};
use driftnet::storage::{QueueStatus, SqliteStorage, Storage};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

async fn spawn_api(whitelist: Vec<String>) -> (String, Arc<Mutex<SqliteStorage>>) {
    let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
    let state = AppState {
        storage: storage.clone(),
        config: Arc::new(Config {
            http: Default::default(),
            storage: StorageConfig {
                database_path: ":memory:".to_string(),
            },
            crawler: CrawlerConfig {
                whitelist_domains: whitelist,
                ..Default::default()
            },
            proxies: Default::default(),
        }),
        proxy_count: 0,
        started_at: Instant::now(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    (format!("http://{}", addr), storage)
}

#[tokio::test]
async fn test_enqueue_accepts_whitelisted_url() {
    let (base, storage) = spawn_api(vec!["example.com".to_string()]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/enqueue", base))
        .json(&json!({"url": "https://example.com/page"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["enqueued"], true);
    assert_eq!(body["url"], "https://example.com/page");
    assert!(body.get("message").is_none());

    let storage = storage.lock().unwrap();
    assert_eq!(
        storage.count_queue_by_status(QueueStatus::Queued).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_enqueue_reports_duplicates() {
    let (base, _storage) = spawn_api(vec![]).await;
    let client = reqwest::Client::new();
    let req = json!({"url": "https://example.com/page"});

    let first = client
        .post(format!("{}/api/enqueue", base))
        .json(&req)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second: Value = client
        .post(format!("{}/api/enqueue", base))
        .json(&req)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["enqueued"], false);
    assert_eq!(second["message"], "duplicate (already queued or processing)");
}

#[tokio::test]
async fn test_enqueue_normalizes_host_for_dedup() {
    let (base, _storage) = spawn_api(vec![]).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/api/enqueue", base))
        .json(&json!({"url": "https://www.Example.com/page#top"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["enqueued"], true);
    assert_eq!(first["url"], "https://example.com/page");

    // same page through a different spelling is a duplicate
    let second: Value = client
        .post(format!("{}/api/enqueue", base))
        .json(&json!({"url": "https://example.com/page"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["enqueued"], false);
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_urls() {
    let (base, _storage) = spawn_api(vec![]).await;
    let client = reqwest::Client::new();

    for bad in ["not a url", "ftp://example.com/f", "https:///nohost"] {
        let resp = client
            .post(format!("{}/api/enqueue", base))
            .json(&json!({"url": bad}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "url {:?}", bad);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_enqueue_rejects_non_whitelisted_domain() {
    let (base, _storage) = spawn_api(vec!["example.com".to_string()]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/enqueue", base))
        .json(&json!({"url": "https://evil.com/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // subdomains of a whitelisted domain pass
    let resp = client
        .post(format!("{}/api/enqueue", base))
        .json(&json!({"url": "https://docs.example.com/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_healthz_reports_ok() {
    let (base, _storage) = spawn_api(vec!["example.com".to_string()]).await;

    let resp = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["proxies"], 0);
    assert_eq!(body["whitelist_domains"], json!(["example.com"]));
    assert!(body["workers"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_storage_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawler.db");

    {
        let mut storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
        let site_id = storage.ensure_site("example.com", 10, 20, 3).unwrap();
        storage
            .enqueue(site_id, "https://example.com/", "h1", 0)
            .unwrap();
    }

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    assert_eq!(
        storage.count_queue_by_status(QueueStatus::Queued).unwrap(),
        1
    );
}
