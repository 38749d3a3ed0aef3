//! GitHub repository connector.
//!
//! Fetches repository metadata, the file tree, file contents, and commit
//! history through the GitHub REST API with bearer-token authentication.
//! Incremental sync is keyed by the head commit SHA: when the cursor
//! already points at head the batch is empty, otherwise the compare
//! endpoint limits file fetches to changed paths.
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN` — optional; unauthenticated requests work but are
//!   heavily rate limited.
//!
//! # Configuration
//!
//! ```toml
//! [connectors.github]
//! repo = "owner/repo"
//! include_globs = ["**/*.md", "**/*.rs"]
//! max_files = 50
//! max_commits = 30
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::warn;

use crate::config::GithubConnectorConfig;
use crate::connector::{Connector, FetchBatch};
use crate::error::ConnectorError;
use crate::models::RawRecord;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "operius-knowledge-base";
const COMMITS_PER_PAGE: usize = 100;

pub struct GithubConnector {
    config: GithubConnectorConfig,
    client: reqwest::Client,
    token: Option<String>,
}

impl GithubConnector {
    pub fn new(config: GithubConnectorConfig) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConnectorError::Unavailable(e.to_string()))?;

        Ok(Self {
            config,
            client,
            token: std::env::var("GITHUB_TOKEN").ok(),
        })
    }

    /// True when a bearer token is available.
    pub fn authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ConnectorError> {
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        Ok(response.json().await?)
    }

    async fn repo_info(&self) -> Result<RepoInfo, ConnectorError> {
        let url = format!("{}/repos/{}", API_BASE, self.config.repo);
        let json = self.get_json(&url).await?;
        serde_json::from_value(json)
            .map_err(|e| ConnectorError::Unavailable(format!("bad repo response: {}", e)))
    }

    async fn head_sha(&self, branch: &str) -> Result<String, ConnectorError> {
        let url = format!("{}/repos/{}/commits/{}", API_BASE, self.config.repo, branch);
        let json = self.get_json(&url).await?;
        json.get("sha")
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::Unavailable("commit response missing sha".to_string()))
    }

    /// Paths changed between two commits, via the compare endpoint.
    async fn changed_paths(
        &self,
        base: &str,
        head: &str,
    ) -> Result<Vec<String>, ConnectorError> {
        let url = format!(
            "{}/repos/{}/compare/{}...{}",
            API_BASE, self.config.repo, base, head
        );
        let json = self.get_json(&url).await?;
        let files = json
            .get("files")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(files
            .iter()
            .filter_map(|f| f.get("filename").and_then(|n| n.as_str()))
            .map(str::to_string)
            .collect())
    }

    /// All blob paths in the tree at `sha`, recursively.
    async fn tree_paths(&self, sha: &str) -> Result<Vec<String>, ConnectorError> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            API_BASE, self.config.repo, sha
        );
        let json = self.get_json(&url).await?;
        let entries = json
            .get("tree")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(entries
            .iter()
            .filter(|e| e.get("type").and_then(|t| t.as_str()) == Some("blob"))
            .filter_map(|e| e.get("path").and_then(|p| p.as_str()))
            .map(str::to_string)
            .collect())
    }

    async fn file_content(&self, path: &str, reference: &str) -> Result<String, ConnectorError> {
        let url = format!(
            "{}/repos/{}/contents/{}?ref={}",
            API_BASE, self.config.repo, path, reference
        );
        let json = self.get_json(&url).await?;

        if json.get("encoding").and_then(|e| e.as_str()) != Some("base64") {
            return Ok(String::new());
        }

        let raw = json
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .replace('\n', "");

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(|e| ConnectorError::Unavailable(format!("bad base64 for {}: {}", path, e)))?;

        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    /// Recent commits on `branch`, paginating until `max_commits` or a
    /// short page. When `since` is set, stops at the cursor commit.
    async fn list_commits(
        &self,
        branch: &str,
        since: Option<&str>,
    ) -> Result<Vec<CommitEntry>, ConnectorError> {
        let mut commits = Vec::new();
        let mut page = 1usize;

        'pages: loop {
            let url = format!(
                "{}/repos/{}/commits?sha={}&per_page={}&page={}",
                API_BASE, self.config.repo, branch, COMMITS_PER_PAGE, page
            );
            let json = self.get_json(&url).await?;
            let entries: Vec<CommitEntry> = serde_json::from_value(json)
                .map_err(|e| ConnectorError::Unavailable(format!("bad commits response: {}", e)))?;

            let page_len = entries.len();
            if accumulate_commits(entries, since, self.config.max_commits, &mut commits) {
                break 'pages;
            }

            if page_len < COMMITS_PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(commits)
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn name(&self) -> &str {
        "github"
    }

    fn description(&self) -> &str {
        "Fetch files and commit metadata from a GitHub repository"
    }

    async fn fetch(&self, since: Option<&str>) -> Result<FetchBatch, ConnectorError> {
        let info = self.repo_info().await?;
        let branch = self
            .config
            .branch
            .clone()
            .unwrap_or_else(|| info.default_branch.clone());
        let head = self.head_sha(&branch).await?;

        // Cursor already at head: nothing changed.
        if since == Some(head.as_str()) {
            return Ok(FetchBatch {
                records: Vec::new(),
                next_ref: Some(head),
            });
        }

        // Scope file fetches to changed paths on incremental runs.
        let changed = match since {
            Some(base) => Some(self.changed_paths(base, &head).await?),
            None => None,
        };

        let include_set = build_globset(&self.config.include_globs)?;
        let exclude_set = build_globset(&self.config.exclude_globs)?;

        let mut paths: Vec<String> = self
            .tree_paths(&head)
            .await?
            .into_iter()
            .filter(|p| include_set.is_match(p) && !exclude_set.is_match(p))
            .filter(|p| match &changed {
                Some(set) => set.contains(p),
                None => true,
            })
            .collect();
        paths.sort();
        paths.truncate(self.config.max_files);

        let mut records = Vec::new();

        for path in &paths {
            // One unreadable file must not sink the batch.
            let content = match self.file_content(path, &head).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            records.push(RawRecord::GithubFile {
                repo: self.config.repo.clone(),
                path: path.clone(),
                content,
                language: info.language.clone(),
                default_branch: branch.clone(),
            });
        }

        for commit in self.list_commits(&branch, since).await? {
            records.push(RawRecord::GithubCommit {
                repo: self.config.repo.clone(),
                sha: commit.sha,
                message: commit.commit.message,
                author: commit.commit.author.as_ref().and_then(|a| a.name.clone()),
                committed_at: commit
                    .commit
                    .author
                    .as_ref()
                    .and_then(|a| a.date.as_deref())
                    .and_then(parse_rfc3339),
            });
        }

        Ok(FetchBatch {
            records,
            next_ref: Some(head),
        })
    }
}

/// Append one page of commits until the cursor commit or the cap.
/// The cap is checked before each push, so `cap == 0` collects nothing.
/// Returns true when pagination should stop.
fn accumulate_commits(
    entries: Vec<CommitEntry>,
    since: Option<&str>,
    cap: usize,
    commits: &mut Vec<CommitEntry>,
) -> bool {
    for entry in entries {
        if commits.len() >= cap {
            return true;
        }
        if Some(entry.sha.as_str()) == since {
            return true;
        }
        commits.push(entry);
    }
    false
}

/// Map a GitHub API error status onto the connector error taxonomy.
fn classify_status(status: u16, body: &str) -> ConnectorError {
    match status {
        401 => ConnectorError::Auth(format!("GitHub rejected credentials: {}", body)),
        403 if body.contains("rate limit") || body.contains("API rate limit") => {
            ConnectorError::RateLimit(format!("GitHub API rate limit exceeded: {}", body))
        }
        429 => ConnectorError::RateLimit(format!("GitHub API throttled: {}", body)),
        403 => ConnectorError::Auth(format!("GitHub access forbidden: {}", body)),
        _ => ConnectorError::Unavailable(format!("GitHub API error {}: {}", status, body)),
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConnectorError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| ConnectorError::Unavailable(format!("bad glob '{}': {}", pattern, e)))?,
        );
    }
    builder
        .build()
        .map_err(|e| ConnectorError::Unavailable(e.to_string()))
}

// ============ Response shapes ============

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    #[serde(default)]
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
}
