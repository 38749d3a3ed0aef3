//! Pure per-source transforms from raw records to normalized documents.
//!
//! Each transform is a total function over its record shape: malformed
//! input yields a [`TransformError`] the pipeline counts and skips, never
//! a panic and never an aborted batch. Document ids are derived only from
//! stable resource identity so re-ingestion overwrites in place.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::TransformError;
use crate::models::{Document, RawRecord, Source};

/// Normalize one raw record into a document.
pub fn to_document(record: &RawRecord) -> Result<Document, TransformError> {
    match record {
        RawRecord::GithubFile {
            repo,
            path,
            content,
            language,
            default_branch,
        } => github_file(repo, path, content, language.as_deref(), default_branch),
        RawRecord::GithubCommit {
            repo,
            sha,
            message,
            author,
            committed_at,
        } => github_commit(record, repo, sha, message, author.as_deref(), *committed_at),
        RawRecord::K8sResource {
            kind,
            name,
            namespace,
            api_version,
            labels,
            manifest_json,
            resource_version,
            uid,
        } => k8s_resource(
            record,
            kind,
            name,
            namespace.as_deref(),
            api_version,
            labels,
            manifest_json,
            resource_version,
            uid,
        ),
    }
}

fn github_file(
    repo: &str,
    path: &str,
    content: &str,
    language: Option<&str>,
    branch: &str,
) -> Result<Document, TransformError> {
    if path.is_empty() {
        return Err(TransformError::new(
            format!("github file in {}", repo),
            "empty file path",
        ));
    }
    if content.trim().is_empty() {
        return Err(TransformError::new(
            format!("github file {}/{}", repo, path),
            "empty content",
        ));
    }

    let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();

    let mut metadata = BTreeMap::new();
    metadata.insert("doc_type".to_string(), "file".to_string());
    metadata.insert("repo_name".to_string(), repo.to_string());
    metadata.insert("file_path".to_string(), path.to_string());
    metadata.insert("file_name".to_string(), file_name.clone());
    metadata.insert("file_extension".to_string(), extension);
    metadata.insert(
        "url".to_string(),
        format!("https://github.com/{}/blob/{}/{}", repo, branch, path),
    );
    if let Some(lang) = language {
        metadata.insert("language".to_string(), lang.to_string());
    }

    Ok(Document {
        id: format!("github:{}/{}", repo, path),
        source: Source::Github,
        title: file_name,
        content: content.to_string(),
        metadata,
        updated_at: Utc::now(),
    })
}

fn github_commit(
    record: &RawRecord,
    repo: &str,
    sha: &str,
    message: &str,
    author: Option<&str>,
    committed_at: Option<chrono::DateTime<Utc>>,
) -> Result<Document, TransformError> {
    if sha.is_empty() {
        return Err(TransformError::new(record.describe(), "empty commit sha"));
    }

    let summary = message.lines().next().unwrap_or("(no message)").to_string();

    let mut metadata = BTreeMap::new();
    metadata.insert("doc_type".to_string(), "commit".to_string());
    metadata.insert("repo_name".to_string(), repo.to_string());
    metadata.insert("sha".to_string(), sha.to_string());
    if let Some(name) = author {
        metadata.insert("author".to_string(), name.to_string());
    }

    let mut content = format!("Commit {} in {}\n\n{}", sha, repo, message);
    if let Some(name) = author {
        content.push_str(&format!("\n\nAuthor: {}", name));
    }

    Ok(Document {
        id: format!("github:{}@{}", repo, sha),
        source: Source::Github,
        title: summary,
        content,
        metadata,
        updated_at: committed_at.unwrap_or_else(Utc::now),
    })
}

#[allow(clippy::too_many_arguments)]
fn k8s_resource(
    record: &RawRecord,
    kind: &str,
    name: &str,
    namespace: Option<&str>,
    api_version: &str,
    labels: &BTreeMap<String, String>,
    manifest_json: &str,
    resource_version: &str,
    uid: &str,
) -> Result<Document, TransformError> {
    if name.is_empty() {
        return Err(TransformError::new(record.describe(), "empty resource name"));
    }
    if kind.is_empty() {
        return Err(TransformError::new(record.describe(), "empty resource kind"));
    }

    let scope = namespace.unwrap_or("cluster-wide");

    let mut metadata = BTreeMap::new();
    metadata.insert("kind".to_string(), kind.to_string());
    metadata.insert("name".to_string(), name.to_string());
    metadata.insert("namespace".to_string(), scope.to_string());
    metadata.insert("api_version".to_string(), api_version.to_string());
    if !resource_version.is_empty() {
        metadata.insert("resource_version".to_string(), resource_version.to_string());
    }
    if !uid.is_empty() {
        metadata.insert("uid".to_string(), uid.to_string());
    }
    if !labels.is_empty() {
        let joined = labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        metadata.insert("labels".to_string(), joined);
    }

    Ok(Document {
        id: format!("k8s://{}/{}/{}", scope, kind.to_lowercase(), name),
        source: Source::Kubernetes,
        title: format!("{}/{}", kind, name),
        content: manifest_json.to_string(),
        metadata,
        updated_at: Utc::now(),
    })
}
