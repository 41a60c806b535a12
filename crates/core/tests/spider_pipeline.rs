//! End-to-end tests of the fetch/validate/persist pipeline against a
//! scripted catalog.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

use sagasu_core::{testing::MockCatalog, RetryPolicy, Spider, SpiderConfig, SpiderProgress};

struct TestHarness {
    catalog: Arc<MockCatalog>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            catalog: Arc::new(MockCatalog::new()),
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn spider(&self, begin: u32, end: u32, parallel: usize) -> Spider<MockCatalog> {
        let config = SpiderConfig {
            begin,
            end: Some(end),
            parallel,
            output_dir: self.temp_dir.path().to_path_buf(),
        };
        Spider::new(config, Arc::clone(&self.catalog))
    }

    async fn read_subject(&self, id: u32) -> Value {
        let path = self.temp_dir.path().join(format!("{}.json", id));
        let raw = tokio::fs::read_to_string(path).await.expect("file missing");
        serde_json::from_str(&raw).expect("file is not JSON")
    }

    fn has_file(&self, id: u32) -> bool {
        self.temp_dir.path().join(format!("{}.json", id)).exists()
    }
}

#[tokio::test]
async fn test_sweep_persists_every_subject_in_range() {
    let harness = TestHarness::new();
    harness
        .catalog
        .insert(10, json!({"id": 10, "type": 2, "name": "A"}))
        .await;
    harness
        .catalog
        .insert(11, json!({"id": 11, "type": 2, "name": "B"}))
        .await;

    let dispatched = harness.spider(10, 12, 2).run().await;

    assert_eq!(dispatched, 2);
    assert_eq!(harness.catalog.calls().await.len(), 2);

    let first = harness.read_subject(10).await;
    assert_eq!(first["id"], 10);
    assert_eq!(first["type"], 2);
    assert_eq!(first["name"], "A");

    let second = harness.read_subject(11).await;
    assert_eq!(second["name"], "B");

    assert!(!harness.has_file(12), "12 is past the end of the range");
}

#[tokio::test]
async fn test_ids_are_dispatched_in_increasing_order() {
    let harness = TestHarness::new();
    for id in 1..=6 {
        harness
            .catalog
            .insert(id, json!({"id": id, "type": 2, "name": format!("S{}", id)}))
            .await;
    }

    harness.spider(1, 7, 1).run().await;

    // With a single permit the fetch order is exactly the dispatch order.
    assert_eq!(harness.catalog.calls().await, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let harness = TestHarness::new();
    for id in 1..=12 {
        harness
            .catalog
            .insert(id, json!({"id": id, "type": 2, "name": "x"}))
            .await;
    }
    harness.catalog.set_delay(Duration::from_millis(10)).await;

    harness.spider(1, 13, 3).run().await;

    assert!(harness.catalog.max_concurrent() <= 3);
    for id in 1..=12 {
        assert!(harness.has_file(id));
    }
}

#[tokio::test]
async fn test_validation_failure_skips_id_without_disturbing_others() {
    let harness = TestHarness::new();
    harness
        .catalog
        .insert(10, json!({"id": 10, "type": 2, "name": "A"}))
        .await;
    // Missing the required name.
    harness.catalog.insert(11, json!({"id": 11, "type": 2})).await;
    harness
        .catalog
        .insert(12, json!({"id": 12, "type": 2, "name": "C"}))
        .await;

    let dispatched = harness.spider(10, 13, 2).run().await;

    assert_eq!(dispatched, 3);
    assert!(harness.has_file(10));
    assert!(!harness.has_file(11), "invalid payload must not persist");
    assert!(harness.has_file(12));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new();
    harness
        .catalog
        .insert(10, json!({"id": 10, "type": 2, "name": "A"}))
        .await;
    harness
        .catalog
        .insert(11, json!({"id": 11, "type": 2, "name": "B"}))
        .await;

    harness.spider(10, 12, 2).run().await;
    let before = tokio::fs::read(harness.temp_dir.path().join("10.json"))
        .await
        .unwrap();

    let dispatched = harness.spider(10, 12, 2).run().await;
    assert_eq!(dispatched, 2);

    let after = tokio::fs::read(harness.temp_dir.path().join("10.json"))
        .await
        .unwrap();
    assert_eq!(before, after, "a re-run must leave existing files untouched");
}

#[tokio::test]
async fn test_transient_failures_are_retried_to_success() {
    let harness = TestHarness::new();
    harness
        .catalog
        .insert(5, json!({"id": 5, "type": 2, "name": "flaky"}))
        .await;
    harness.catalog.fail_times(5, 2).await;

    harness.spider(5, 6, 1).run().await;

    assert!(harness.has_file(5));
    assert_eq!(harness.catalog.calls().await.len(), 3);
}

#[tokio::test]
async fn test_bounded_retry_gives_up_cleanly() {
    let harness = TestHarness::new();
    // No payload registered: every fetch answers 404.
    let spider = harness
        .spider(1, 2, 1)
        .with_retry_policy(RetryPolicy::bounded(3));

    let dispatched = spider.run().await;

    assert_eq!(dispatched, 1);
    assert_eq!(harness.catalog.calls().await.len(), 3);
    assert!(!harness.has_file(1));
}

#[tokio::test]
async fn test_progress_reports_position_and_total() {
    let harness = TestHarness::new();
    for id in 1..=4 {
        harness
            .catalog
            .insert(id, json!({"id": id, "type": 2, "name": "x"}))
            .await;
    }

    let (tx, mut rx) = mpsc::channel::<SpiderProgress>(16);
    harness.spider(1, 5, 2).run_with_progress(Some(tx)).await;

    let mut ticks = Vec::new();
    while let Some(tick) = rx.recv().await {
        ticks.push(tick);
    }

    assert_eq!(ticks.len(), 4);
    assert_eq!(ticks[0].position, 1);
    assert_eq!(ticks[3].position, 4);
    assert!(ticks.iter().all(|t| t.total == Some(4)));
}
