//! Ingestion pipeline: fetch raw records, normalize, upsert, advance cursor.
//!
//! Failure policy: a [`TransformError`](crate::error::TransformError) skips
//! the offending record and the run continues; a connector or store error
//! aborts the run and leaves the persisted cursor untouched, so the next
//! run re-fetches from the same bookmark.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::connector::Connector;
use crate::models::{Document, IngestionReport, Source};
use crate::store::VectorStore;
use crate::transform;

/// Run one sync for a single source.
///
/// `full` ignores the stored cursor and re-fetches everything. `limit`
/// caps the number of raw records actually processed, handy for demos
/// against large upstreams.
pub async fn run_sync(
    connector: &dyn Connector,
    store: &VectorStore,
    source: Source,
    full: bool,
    limit: Option<usize>,
) -> Result<IngestionReport> {
    let started = Instant::now();

    let since = if full {
        None
    } else {
        store
            .get_cursor(source)
            .await
            .context("failed to read sync cursor")?
            .map(|c| c.last_synced_ref)
    };

    match &since {
        Some(cursor) => info!(source = %source, cursor = %cursor, "starting incremental sync"),
        None => info!(source = %source, "starting full sync"),
    }

    let batch = connector
        .fetch(since.as_deref())
        .await
        .with_context(|| format!("fetch from {} failed", connector.name()))?;

    let mut records = batch.records;
    let mut truncated = false;
    if let Some(cap) = limit {
        if cap < records.len() {
            truncated = true;
        }
        records.truncate(cap);
    }

    let mut documents: Vec<Document> = Vec::with_capacity(records.len());
    let mut failed: u64 = 0;
    for record in &records {
        match transform::to_document(record) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(source = %source, error = %e, "skipping record");
                failed += 1;
            }
        }
    }

    let processed = store
        .upsert(&documents)
        .await
        .context("failed to upsert documents")?;

    // Only a fully successful, complete run moves the bookmark forward.
    // A record cap drops the tail of the batch, so advancing the cursor
    // would skip those records forever; leave it so the next run retries.
    if truncated {
        info!(source = %source, "record cap reached, leaving cursor in place");
    } else if let Some(next_ref) = &batch.next_ref {
        store
            .set_cursor(source, next_ref)
            .await
            .context("failed to advance sync cursor")?;
    }

    let report = IngestionReport {
        source,
        documents_processed: processed,
        documents_failed: failed,
        duration: started.elapsed(),
    };

    info!(
        source = %source,
        processed = report.documents_processed,
        failed = report.documents_failed,
        elapsed_ms = report.duration.as_millis() as u64,
        "sync complete"
    );

    Ok(report)
}
