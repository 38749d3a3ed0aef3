//! Source connector contract.
//!
//! A connector scans one external system and returns raw records plus the
//! ref the pipeline should persist as the new sync cursor. Pagination is
//! exhausted inside `fetch`; callers never see page boundaries.

use async_trait::async_trait;

use crate::error::ConnectorError;
use crate::models::RawRecord;

/// Everything one fetch pass produced.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<RawRecord>,
    /// Ref to persist as the cursor once the whole batch is stored
    /// (commit SHA for GitHub, list resourceVersion for Kubernetes).
    /// `None` means the cursor should not move.
    pub next_ref: Option<String>,
}

/// A data source that produces records for ingestion.
///
/// Connectors have no side effects beyond outbound API calls. Errors are
/// classified into the [`ConnectorError`] taxonomy so the pipeline can
/// report auth, throttling, and availability failures distinctly; none of
/// them are retried automatically.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector instance name (`"github"`, `"kubernetes"`).
    fn name(&self) -> &str;

    /// One-line description shown by `operius sources`.
    fn description(&self) -> &str;

    /// Fetch all records changed since `since` (full fetch when `None`).
    async fn fetch(&self, since: Option<&str>) -> Result<FetchBatch, ConnectorError>;
}
