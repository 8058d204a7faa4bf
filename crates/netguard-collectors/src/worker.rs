//! The log-tail collector cycle (spec §4.3): read a byte range starting at
//! the stored position, parse it, flush non-empty batches, and only then
//! advance the position — so a crash mid-insert causes at most a few
//! seconds of reprocessing, never silent loss (spec's at-least-once
//! semantics). Failures in parse or insert are logged and leave the
//! position untouched so the next cycle retries the same range.

use std::path::Path;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error};

use netguard_capture::PositionStore;
use netguard_common::Result;
use netguard_store::TableRegistry;

use crate::collector::{flush_batch, BatchOutcome};

/// Runs one cycle of a log-tailing collector: read `log_path` from the
/// stored `(tool, source_id)` position, hand the new bytes to `parse_fn`,
/// flush any records produced, and advance the position only on success.
pub async fn run_log_tail_cycle<T, F>(
    pool: &SqlitePool,
    registry: &TableRegistry,
    positions: &PositionStore,
    tool: &str,
    source_id: &str,
    log_path: &Path,
    ceiling: usize,
    parse_fn: F,
) -> Result<BatchOutcome>
where
    T: Serialize,
    F: FnOnce(&str, usize) -> Result<(Vec<T>, usize)>,
{
    let contents = match tokio::fs::read(log_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(tool, path = %log_path.display(), error = %e, "log file not yet present");
            return Ok(BatchOutcome::default());
        }
    };
    let text = String::from_utf8_lossy(&contents);

    let position = positions.open_or_reset(tool, source_id, text.len() as u64).await?;
    let position = position.min(text.len() as u64) as usize;

    let (records, new_position) = match parse_fn(&text, position) {
        Ok(result) => result,
        Err(e) => {
            error!(tool, error = %e, "parse failed, position left unchanged");
            return Ok(BatchOutcome::default());
        }
    };

    if records.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let outcome = flush_batch(pool, registry, tool, &records, ceiling).await?;
    positions.set(tool, source_id, new_position as u64).await?;
    Ok(outcome)
}
