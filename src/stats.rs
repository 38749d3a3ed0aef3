//! Collection statistics: document counts, per-source breakdowns,
//! embedding coverage, and sync cursor positions.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::models::SyncCursor;

#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub total_documents: i64,
    pub embedded_documents: i64,
    pub by_source: Vec<(String, i64)>,
    /// GitHub documents broken down by `doc_type` (file vs commit).
    pub github_by_type: Vec<(String, i64)>,
    /// GitHub documents broken down by repository.
    pub github_by_repo: Vec<(String, i64)>,
    /// Kubernetes documents broken down by resource kind.
    pub k8s_by_kind: Vec<(String, i64)>,
    pub cursors: Vec<SyncCursor>,
}

pub async fn collect(pool: &SqlitePool) -> Result<CollectionStats, StoreError> {
    let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;

    let embedded_documents: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL")
            .fetch_one(pool)
            .await?;

    let by_source = grouped(
        pool,
        "SELECT source, COUNT(*) AS n FROM documents GROUP BY source ORDER BY source",
    )
    .await?;

    let github_by_type = grouped(
        pool,
        "SELECT json_extract(metadata_json, '$.doc_type') AS k, COUNT(*) AS n \
         FROM documents WHERE source = 'github' AND k IS NOT NULL \
         GROUP BY k ORDER BY k",
    )
    .await?;

    let github_by_repo = grouped(
        pool,
        "SELECT json_extract(metadata_json, '$.repo_name') AS k, COUNT(*) AS n \
         FROM documents WHERE source = 'github' AND k IS NOT NULL \
         GROUP BY k ORDER BY k",
    )
    .await?;

    let k8s_by_kind = grouped(
        pool,
        "SELECT json_extract(metadata_json, '$.kind') AS k, COUNT(*) AS n \
         FROM documents WHERE source = 'kubernetes' AND k IS NOT NULL \
         GROUP BY k ORDER BY k",
    )
    .await?;

    let cursor_rows = sqlx::query(
        "SELECT source, last_synced_ref, updated_at FROM cursors ORDER BY source",
    )
    .fetch_all(pool)
    .await?;

    let cursors = cursor_rows
        .iter()
        .map(|r| SyncCursor {
            source_id: r.get("source"),
            last_synced_ref: r.get("last_synced_ref"),
            updated_at: DateTime::from_timestamp(r.get::<i64, _>("updated_at"), 0)
                .unwrap_or_else(Utc::now),
        })
        .collect();

    Ok(CollectionStats {
        total_documents,
        embedded_documents,
        by_source,
        github_by_type,
        github_by_repo,
        k8s_by_kind,
        cursors,
    })
}

async fn grouped(pool: &SqlitePool, sql: &str) -> Result<Vec<(String, i64)>, StoreError> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>(0), r.get::<i64, _>(1)))
        .collect())
}

/// Human-readable rendering used by both the `stats` command and the
/// chat `/stats` command.
pub fn render(stats: &CollectionStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Documents: {}", stats.total_documents));
    out.push_str(&format!(
        " ({} embedded)\n",
        stats.embedded_documents
    ));

    if !stats.by_source.is_empty() {
        out.push_str("\nBy source:\n");
        for (source, count) in &stats.by_source {
            out.push_str(&format!("  {:<12} {}\n", source, count));
        }
    }

    if !stats.github_by_type.is_empty() {
        out.push_str("\nGitHub documents:\n");
        for (doc_type, count) in &stats.github_by_type {
            out.push_str(&format!("  {:<12} {}\n", doc_type, count));
        }
    }

    if !stats.github_by_repo.is_empty() {
        out.push_str("\nGitHub repositories:\n");
        for (repo, count) in &stats.github_by_repo {
            out.push_str(&format!("  {:<24} {}\n", repo, count));
        }
    }

    if !stats.k8s_by_kind.is_empty() {
        out.push_str("\nKubernetes resources:\n");
        for (kind, count) in &stats.k8s_by_kind {
            out.push_str(&format!("  {:<12} {}\n", kind, count));
        }
    }

    if !stats.cursors.is_empty() {
        out.push_str("\nSync cursors:\n");
        for cursor in &stats.cursors {
            out.push_str(&format!(
                "  {:<12} {} (updated {})\n",
                cursor.source_id,
                short_ref(&cursor.last_synced_ref),
                cursor.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ));
        }
    }

    out
}

fn short_ref(r: &str) -> String {
    if r.len() <= 12 {
        return r.to_string();
    }
    let mut end = 12;
    while !r.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &r[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_collection() {
        let stats = CollectionStats {
            total_documents: 0,
            embedded_documents: 0,
            by_source: vec![],
            github_by_type: vec![],
            github_by_repo: vec![],
            k8s_by_kind: vec![],
            cursors: vec![],
        };
        let text = render(&stats);
        assert!(text.contains("Documents: 0"));
    }

    #[test]
    fn test_short_ref_respects_char_boundaries() {
        assert_eq!(short_ref("abc"), "abc");
        assert_eq!(short_ref("0123456789abcdef"), "0123456789ab...");
        // Multi-byte refs must not split a character.
        let r = format!("a{}", "日".repeat(4)); // 13 bytes, boundary at 10
        assert_eq!(short_ref(&r), "a日日日...");
    }

    #[test]
    fn test_render_breakdowns() {
        let stats = CollectionStats {
            total_documents: 3,
            embedded_documents: 3,
            by_source: vec![("github".into(), 2), ("kubernetes".into(), 1)],
            github_by_type: vec![("commit".into(), 1), ("file".into(), 1)],
            github_by_repo: vec![("acme/platform".into(), 2)],
            k8s_by_kind: vec![("Pod".into(), 1)],
            cursors: vec![],
        };
        let text = render(&stats);
        assert!(text.contains("github"));
        assert!(text.contains("acme/platform"));
        assert!(text.contains("Pod"));
    }
}
