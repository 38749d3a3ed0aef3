//! Vector store adapter over SQLite.
//!
//! Owns the embed-and-upsert path and the similarity query path. The rest
//! of the system sees only this contract, so swapping the demo's SQLite
//! file for a vector-extension relational database changes nothing above
//! this module.
//!
//! Ordering is deterministic: descending score, ties broken by ascending
//! document id.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::embedding;
use crate::error::StoreError;
use crate::models::{Document, QueryResult, Source, SyncCursor};

pub struct VectorStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
}

impl VectorStore {
    pub fn new(pool: SqlitePool, embedding: EmbeddingConfig) -> Self {
        Self { pool, embedding }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Embed and insert-or-update documents, batched by the configured
    /// batch size to bound request size. Returns the number of documents
    /// written. A failure anywhere aborts the whole call.
    pub async fn upsert(&self, documents: &[Document]) -> Result<u64, StoreError> {
        let mut written = 0u64;

        for batch in documents.chunks(self.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(embeddable_text).collect();
            let vectors = embedding::embed_texts(&self.embedding, &texts).await?;

            let mut tx = self.pool.begin().await?;
            for (doc, vector) in batch.iter().zip(vectors.iter()) {
                let metadata_json = serde_json::to_string(&doc.metadata)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;

                sqlx::query(
                    r#"
                    INSERT INTO documents (id, source, title, content, metadata_json, embedding, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        source = excluded.source,
                        title = excluded.title,
                        content = excluded.content,
                        metadata_json = excluded.metadata_json,
                        embedding = excluded.embedding,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(&doc.id)
                .bind(doc.source.as_str())
                .bind(&doc.title)
                .bind(&doc.content)
                .bind(&metadata_json)
                .bind(embedding::vec_to_blob(vector))
                .bind(doc.updated_at.timestamp())
                .execute(&mut *tx)
                .await?;

                written += 1;
            }
            tx.commit().await?;

            debug!(batch = batch.len(), "upserted document batch");
        }

        Ok(written)
    }

    /// Similarity search over stored documents.
    ///
    /// Embeds the query text, scores every stored vector (optionally
    /// restricted to one source), and returns the top `top_k` results in
    /// deterministic order.
    pub async fn query(
        &self,
        text: &str,
        filter: Option<Source>,
        top_k: usize,
    ) -> Result<Vec<QueryResult>, StoreError> {
        let query_vec = embedding::embed_query(&self.embedding, text).await?;

        let rows = match filter {
            Some(source) => {
                sqlx::query(
                    "SELECT id, source, title, content, metadata_json, embedding, updated_at \
                     FROM documents WHERE source = ? AND embedding IS NOT NULL",
                )
                .bind(source.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, source, title, content, metadata_json, embedding, updated_at \
                     FROM documents WHERE embedding IS NOT NULL",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut scored: Vec<(Document, f64)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            let score = embedding::cosine_similarity(&query_vec, &vector) as f64;
            scored.push((document_from_row(row)?, score));
        }

        Ok(rank_results(scored, top_k))
    }

    /// Fetch a single document by its stable id.
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, source, title, content, metadata_json, embedding, updated_at \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(document_from_row(&r)?)),
            None => Ok(None),
        }
    }

    pub async fn get_cursor(&self, source: Source) -> Result<Option<SyncCursor>, StoreError> {
        let row = sqlx::query("SELECT last_synced_ref, updated_at FROM cursors WHERE source = ?")
            .bind(source.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| SyncCursor {
            source_id: source.as_str().to_string(),
            last_synced_ref: r.get("last_synced_ref"),
            updated_at: DateTime::from_timestamp(r.get::<i64, _>("updated_at"), 0)
                .unwrap_or_else(Utc::now),
        }))
    }

    pub async fn set_cursor(&self, source: Source, last_synced_ref: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cursors (source, last_synced_ref, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                last_synced_ref = excluded.last_synced_ref,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source.as_str())
        .bind(last_synced_ref)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn document_count(&self, filter: Option<Source>) -> Result<i64, StoreError> {
        let count: i64 = match filter {
            Some(source) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE source = ?")
                    .bind(source.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}

/// Order scored documents: score descending, then id ascending, then
/// truncate to `top_k` and assign 1-based ranks.
pub fn rank_results(mut scored: Vec<(Document, f64)>, top_k: usize) -> Vec<QueryResult> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(top_k);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (document, score))| QueryResult {
            document,
            score,
            rank: i + 1,
        })
        .collect()
}

/// Composite text handed to the embedding provider: structured fields
/// first, then content truncated to keep request sizes bounded.
fn embeddable_text(doc: &Document) -> String {
    let mut parts = vec![
        format!("Source: {}", doc.source),
        format!("Name: {}", doc.title),
    ];

    for (key, value) in &doc.metadata {
        parts.push(format!("{}: {}", key, value));
    }

    let content = if doc.content.len() > 2000 {
        let mut end = 2000;
        while !doc.content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &doc.content[..end])
    } else {
        doc.content.clone()
    };
    parts.push(format!("Content: {}", content));

    parts.join("\n")
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document, StoreError> {
    let source_str: String = row.get("source");
    let source: Source = source_str
        .parse()
        .map_err(|e: anyhow::Error| StoreError::Unavailable(e.to_string()))?;

    let metadata_json: String = row.get("metadata_json");
    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).unwrap_or_default();

    Ok(Document {
        id: row.get("id"),
        source,
        title: row.get("title"),
        content: row.get("content"),
        metadata,
        updated_at: DateTime::from_timestamp(row.get::<i64, _>("updated_at"), 0)
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            source: Source::Github,
            title: id.to_string(),
            content: "content".to_string(),
            metadata: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rank_ties_broken_by_ascending_id() {
        let scored = vec![
            (make_doc("b"), 0.9),
            (make_doc("a"), 0.9),
            (make_doc("c"), 0.7),
        ];
        let results = rank_results(scored, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            results.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let scored = vec![
            (make_doc("a"), 0.5),
            (make_doc("b"), 0.8),
            (make_doc("c"), 0.2),
        ];
        let results = rank_results(scored, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "b");
        assert_eq!(results[1].document.id, "a");
    }

    #[test]
    fn test_embeddable_text_truncates_long_content() {
        let mut doc = make_doc("big");
        doc.content = "x".repeat(5000);
        let text = embeddable_text(&doc);
        assert!(text.len() < 3000);
        assert!(text.ends_with("..."));
    }
}
