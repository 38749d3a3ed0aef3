//! Error taxonomy for the connector, store, and gateway seams.
//!
//! Propagation policy: [`TransformError`] is per-record and never escapes
//! the ingestion pipeline (counted and skipped); [`ConnectorError`] and
//! [`StoreError`] abort the current run without advancing persisted cursor
//! state; [`GatewayError`] is swallowed by the search agent, which degrades
//! to a formatted rendering of raw results.

use thiserror::Error;

/// Failure reaching or reading from a source connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Credentials rejected by the provider (HTTP 401, kubeconfig auth).
    #[error("connector auth error: {0}")]
    Auth(String),

    /// Provider throttling. The caller should back off and retry a later
    /// run; the pipeline itself does not retry.
    #[error("connector rate limited: {0}")]
    RateLimit(String),

    /// Network failure, timeout, or provider-side error.
    #[error("connector unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        ConnectorError::Unavailable(e.to_string())
    }
}

/// A single raw record that could not be normalized into a document.
///
/// Non-fatal: the pipeline logs it, counts it, and continues with the
/// sibling records in the batch.
#[derive(Debug, Error)]
#[error("transform error for {record}: {reason}")]
pub struct TransformError {
    pub record: String,
    pub reason: String,
}

impl TransformError {
    pub fn new(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

/// Failure in the vector store adapter. Fatal to the current run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Embedding generation failed for an input batch.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The backing database is unreachable or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Failure calling the LLM gateway. Degrades, never fatal.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway not configured: {0}")]
    NotConfigured(String),

    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Request(e.to_string())
    }
}
