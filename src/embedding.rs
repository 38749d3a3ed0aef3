//! Embedding provider abstraction and implementations.
//!
//! Three providers, selected by `embedding.provider` in the config:
//! - **`local`** — deterministic feature-hashing embedder (sha2 token
//!   hashing into a fixed-dimension vector). No network, suitable for the
//!   demo and for tests.
//! - **`openai`** — calls the OpenAI embeddings API in batches.
//! - **`disabled`** — always errors; ingestion and search refuse to run.
//!
//! Also provides the vector codecs used for SQLite BLOB storage
//! ([`vec_to_blob`] / [`blob_to_vec`]) and [`cosine_similarity`].

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::error::StoreError;

/// Embed a batch of texts using the configured provider.
///
/// Returns one vector per input text, in input order. Fails with
/// [`StoreError::Embedding`] when the provider is disabled, unknown, or
/// the backing API call fails.
pub async fn embed_texts(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, StoreError> {
    match config.provider.as_str() {
        "local" => Ok(texts
            .iter()
            .map(|t| hash_embed(t, config.dims))
            .collect()),
        "openai" => embed_openai(config, texts).await,
        "disabled" => Err(StoreError::Embedding(
            "embedding provider is disabled".to_string(),
        )),
        other => Err(StoreError::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>, StoreError> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Embedding("empty embedding response".to_string()))
}

// ============ Local hashing provider ============

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256; the first
/// 8 bytes select a bucket and sign. The resulting vector is
/// L2-normalized so cosine similarity behaves sensibly. The same text
/// always produces the same vector.
pub fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dims.max(1)];

    for token in tokenize(text) {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[0..8]);
        let bucket = u64::from_le_bytes(prefix) as usize % vec.len();
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
    }

    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

// ============ OpenAI provider ============

/// Call the OpenAI embeddings API once, with the configured timeout.
///
/// A timeout or network failure maps to [`StoreError::Embedding`]; the
/// run aborts and the cursor is preserved, so the next run retries.
async fn embed_openai(
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, StoreError> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| StoreError::Embedding("OPENAI_API_KEY not set".to_string()))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| StoreError::Embedding("embedding.model required for openai".to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| StoreError::Embedding(e.to_string()))?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let response = client
        .post("https://api.openai.com/v1/embeddings")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&body)
        .send()
        .await
        .map_err(|e| StoreError::Embedding(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(StoreError::Embedding(format!(
            "OpenAI API error {}: {}",
            status, body_text
        )));
    }

    let json: serde_json::Value = response
        .json()
        .await
        .map_err(|e| StoreError::Embedding(e.to_string()))?;

    parse_openai_response(&json)
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, StoreError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| StoreError::Embedding("missing data array in response".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| StoreError::Embedding("missing embedding in response".to_string()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Vector codecs ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or length mismatches.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
