//! Core data models for the ingestion and search pipeline.
//!
//! Raw connector output is a [`RawRecord`] tagged by source; the transform
//! step normalizes it into a [`Document`], which is the unit stored,
//! embedded, and returned from search.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw item produced by a connector before normalization.
///
/// One variant per source; the per-source transform in [`crate::transform`]
/// consumes these. Field shapes mirror what the upstream APIs return.
#[derive(Debug, Clone)]
pub enum RawRecord {
    GithubFile {
        repo: String,
        path: String,
        content: String,
        language: Option<String>,
        default_branch: String,
    },
    GithubCommit {
        repo: String,
        sha: String,
        message: String,
        author: Option<String>,
        committed_at: Option<DateTime<Utc>>,
    },
    K8sResource {
        kind: String,
        name: String,
        namespace: Option<String>,
        api_version: String,
        labels: BTreeMap<String, String>,
        manifest_json: String,
        resource_version: String,
        uid: String,
    },
}

impl RawRecord {
    /// Short label used in skip-and-log messages.
    pub fn describe(&self) -> String {
        match self {
            RawRecord::GithubFile { repo, path, .. } => format!("github file {}/{}", repo, path),
            RawRecord::GithubCommit { repo, sha, .. } => format!("github commit {}@{}", repo, sha),
            RawRecord::K8sResource {
                kind,
                name,
                namespace,
                ..
            } => format!(
                "k8s {} {}/{}",
                kind,
                namespace.as_deref().unwrap_or("cluster-wide"),
                name
            ),
        }
    }
}

/// Which external system a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Github,
    Kubernetes,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Github => "github",
            Source::Kubernetes => "kubernetes",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Source::Github),
            "kubernetes" | "k8s" => Ok(Source::Kubernetes),
            other => anyhow::bail!("Unknown source: '{}'. Use github or kubernetes.", other),
        }
    }
}

/// Normalized document stored in the vector store.
///
/// `id` is stable across re-ingestion of the same underlying resource
/// (`github:{repo}/{path}`, `github:{repo}@{sha}`,
/// `k8s://{namespace}/{kind}/{name}`), which makes upserts idempotent.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub source: Source,
    pub title: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

/// Per-source ingestion bookmark.
///
/// `last_synced_ref` is a commit SHA for GitHub and a list resourceVersion
/// for Kubernetes. Written only after a fully successful run.
#[derive(Debug, Clone)]
pub struct SyncCursor {
    pub source_id: String,
    pub last_synced_ref: String,
    pub updated_at: DateTime<Utc>,
}

/// A ranked similarity-search hit. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub document: Document,
    /// Cosine similarity, higher = closer.
    pub score: f64,
    /// 1-based position after deterministic ordering.
    pub rank: usize,
}

/// Inferred category of a user query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Github,
    Kubernetes,
    Mixed,
    Unknown,
}

impl Intent {
    /// The source filter implied by this intent, if any.
    pub fn source_filter(&self) -> Option<Source> {
        match self {
            Intent::Github => Some(Source::Github),
            Intent::Kubernetes => Some(Source::Kubernetes),
            Intent::Mixed | Intent::Unknown => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Intent::Github => "github",
            Intent::Kubernetes => "kubernetes",
            Intent::Mixed => "mixed",
            Intent::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One exchange in a chat session. Held in memory, cleared by `/clear`.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub query: String,
    pub intent: Intent,
    pub results: Vec<QueryResult>,
    pub response_text: String,
    /// True when the gateway failed and the fallback rendering was used.
    pub degraded: bool,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub source: Source,
    pub documents_processed: u64,
    pub documents_failed: u64,
    pub duration: std::time::Duration,
}
