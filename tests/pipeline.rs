//! Integration tests for the ingestion pipeline.
//!
//! Uses an in-memory stub connector against an in-memory SQLite store, so
//! the full fetch → normalize → embed → upsert → cursor path runs without
//! touching the network.

use async_trait::async_trait;

use operius::config::EmbeddingConfig;
use operius::connector::{Connector, FetchBatch};
use operius::error::ConnectorError;
use operius::models::{RawRecord, Source};
use operius::pipeline::run_sync;
use operius::store::VectorStore;
use operius::{db, migrate};

struct StubConnector {
    records: Vec<RawRecord>,
    next_ref: Option<String>,
}

#[async_trait]
impl Connector for StubConnector {
    fn name(&self) -> &str {
        "stub"
    }

    fn description(&self) -> &str {
        "In-memory test connector"
    }

    async fn fetch(&self, _since: Option<&str>) -> Result<FetchBatch, ConnectorError> {
        Ok(FetchBatch {
            records: self.records.clone(),
            next_ref: self.next_ref.clone(),
        })
    }
}

/// Mimics the GitHub connector's incremental contract: a full batch when
/// the cursor is behind, an empty batch once the cursor reaches head.
struct HeadAwareConnector {
    head: String,
    records: Vec<RawRecord>,
}

#[async_trait]
impl Connector for HeadAwareConnector {
    fn name(&self) -> &str {
        "head-aware"
    }

    fn description(&self) -> &str {
        "Returns records until the cursor reaches head"
    }

    async fn fetch(&self, since: Option<&str>) -> Result<FetchBatch, ConnectorError> {
        let records = if since == Some(self.head.as_str()) {
            Vec::new()
        } else {
            self.records.clone()
        };
        Ok(FetchBatch {
            records,
            next_ref: Some(self.head.clone()),
        })
    }
}

struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    fn name(&self) -> &str {
        "failing"
    }

    fn description(&self) -> &str {
        "Always rate limited"
    }

    async fn fetch(&self, _since: Option<&str>) -> Result<FetchBatch, ConnectorError> {
        Err(ConnectorError::RateLimit("try again later".into()))
    }
}

fn file_record(path: &str, content: &str) -> RawRecord {
    RawRecord::GithubFile {
        repo: "acme/platform".to_string(),
        path: path.to_string(),
        content: content.to_string(),
        language: Some("Rust".to_string()),
        default_branch: "main".to_string(),
    }
}

async fn memory_store() -> VectorStore {
    let pool = db::connect_memory().await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    VectorStore::new(pool, EmbeddingConfig::default())
}

#[tokio::test]
async fn test_sync_ingests_and_advances_cursor() {
    let store = memory_store().await;
    let connector = StubConnector {
        records: vec![
            file_record("README.md", "# Platform\nDeploy docs."),
            file_record("src/main.rs", "fn main() {}"),
        ],
        next_ref: Some("abc123".to_string()),
    };

    let report = run_sync(&connector, &store, Source::Github, false, None)
        .await
        .unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.documents_failed, 0);
    assert_eq!(store.document_count(None).await.unwrap(), 2);

    let cursor = store.get_cursor(Source::Github).await.unwrap().unwrap();
    assert_eq!(cursor.last_synced_ref, "abc123");
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let store = memory_store().await;
    let connector = StubConnector {
        records: vec![file_record("src/lib.rs", "pub fn add() {}")],
        next_ref: Some("sha-1".to_string()),
    };

    run_sync(&connector, &store, Source::Github, false, None)
        .await
        .unwrap();
    run_sync(&connector, &store, Source::Github, true, None)
        .await
        .unwrap();

    // Same stable id both times, so the second run overwrites in place.
    assert_eq!(store.document_count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_record_is_skipped_not_fatal() {
    let store = memory_store().await;
    let connector = StubConnector {
        records: vec![
            file_record("good.md", "# Good"),
            file_record("empty.md", "   "), // normalization rejects empty content
            file_record("also-good.md", "# Also good"),
        ],
        next_ref: Some("sha-2".to_string()),
    };

    let report = run_sync(&connector, &store, Source::Github, false, None)
        .await
        .unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.documents_failed, 1);
    assert_eq!(store.document_count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_connector_failure_preserves_cursor() {
    let store = memory_store().await;

    let seed = StubConnector {
        records: vec![file_record("a.md", "# A")],
        next_ref: Some("sha-initial".to_string()),
    };
    run_sync(&seed, &store, Source::Github, false, None)
        .await
        .unwrap();

    let result = run_sync(&FailingConnector, &store, Source::Github, false, None).await;
    assert!(result.is_err());

    // The failed run must not have moved the bookmark.
    let cursor = store.get_cursor(Source::Github).await.unwrap().unwrap();
    assert_eq!(cursor.last_synced_ref, "sha-initial");
}

#[tokio::test]
async fn test_failed_upsert_preserves_cursor() {
    let pool = db::connect_memory().await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();

    let working = VectorStore::new(pool.clone(), EmbeddingConfig::default());
    let seed = StubConnector {
        records: vec![file_record("a.md", "# A")],
        next_ref: Some("sha-initial".to_string()),
    };
    run_sync(&seed, &working, Source::Github, false, None)
        .await
        .unwrap();

    // Same database, but embedding disabled: the upsert fails after the
    // connector succeeded.
    let broken = VectorStore::new(
        pool,
        EmbeddingConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        },
    );
    let next = StubConnector {
        records: vec![file_record("b.md", "# B")],
        next_ref: Some("sha-next".to_string()),
    };
    let result = run_sync(&next, &broken, Source::Github, false, None).await;
    assert!(result.is_err());

    let cursor = working.get_cursor(Source::Github).await.unwrap().unwrap();
    assert_eq!(cursor.last_synced_ref, "sha-initial");
}

#[tokio::test]
async fn test_limit_caps_processed_records() {
    let store = memory_store().await;
    let connector = StubConnector {
        records: (0..10)
            .map(|i| file_record(&format!("doc-{}.md", i), "content"))
            .collect(),
        next_ref: None,
    };

    let report = run_sync(&connector, &store, Source::Github, false, Some(3))
        .await
        .unwrap();

    assert_eq!(report.documents_processed, 3);
}

#[tokio::test]
async fn test_limited_run_leaves_cursor_for_followup() {
    let store = memory_store().await;
    let connector = HeadAwareConnector {
        head: "head-sha".to_string(),
        records: (0..5)
            .map(|i| file_record(&format!("doc-{}.md", i), "content"))
            .collect(),
    };

    let report = run_sync(&connector, &store, Source::Github, false, Some(2))
        .await
        .unwrap();
    assert_eq!(report.documents_processed, 2);

    // The cap dropped three records, so the run was not complete and the
    // bookmark must not move; otherwise the next incremental run would
    // see cursor == head and skip them forever.
    assert!(store.get_cursor(Source::Github).await.unwrap().is_none());

    run_sync(&connector, &store, Source::Github, false, None)
        .await
        .unwrap();
    assert_eq!(store.document_count(None).await.unwrap(), 5);
    assert_eq!(
        store
            .get_cursor(Source::Github)
            .await
            .unwrap()
            .unwrap()
            .last_synced_ref,
        "head-sha"
    );
}

#[tokio::test]
async fn test_sources_isolated_by_cursor_and_count() {
    let store = memory_store().await;

    let github = StubConnector {
        records: vec![file_record("x.md", "# X")],
        next_ref: Some("sha-x".to_string()),
    };
    run_sync(&github, &store, Source::Github, false, None)
        .await
        .unwrap();

    let k8s = StubConnector {
        records: vec![RawRecord::K8sResource {
            kind: "Pod".to_string(),
            name: "web-1".to_string(),
            namespace: Some("default".to_string()),
            api_version: "v1".to_string(),
            labels: Default::default(),
            manifest_json: "{\"kind\":\"Pod\"}".to_string(),
            resource_version: "42".to_string(),
            uid: "u-1".to_string(),
        }],
        next_ref: Some("42".to_string()),
    };
    run_sync(&k8s, &store, Source::Kubernetes, false, None)
        .await
        .unwrap();

    assert_eq!(store.document_count(Some(Source::Github)).await.unwrap(), 1);
    assert_eq!(
        store.document_count(Some(Source::Kubernetes)).await.unwrap(),
        1
    );
    assert!(store.get_cursor(Source::Kubernetes).await.unwrap().is_some());
    assert_eq!(
        store
            .get_cursor(Source::Github)
            .await
            .unwrap()
            .unwrap()
            .last_synced_ref,
        "sha-x"
    );
}
