//! Position Store (spec §9): replaces ad-hoc text position files with an
//! explicit abstraction over `(tool, source_id) -> byte_offset`, backed by
//! the `collector_positions` table so it survives restarts alongside the
//! rest of the Store.

use netguard_common::{Error, Result};
use sqlx::SqlitePool;

/// `(tool, source_id)`-keyed byte offset tracker. Position only advances
/// after the caller's insert transaction has committed (spec §4.3
/// at-least-once semantics).
pub struct PositionStore {
    pool: SqlitePool,
}

impl PositionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads the stored offset for `(tool, source_id)`, or `0` if unset.
    pub async fn get(&self, tool: &str, source_id: &str) -> Result<u64> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT byte_offset FROM collector_positions WHERE tool = ? AND source_id = ?",
        )
        .bind(tool)
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(row.map(|(offset,)| offset as u64).unwrap_or(0))
    }

    /// Persists `offset` for `(tool, source_id)`. Call only after the
    /// corresponding batch insert has committed.
    pub async fn set(&self, tool: &str, source_id: &str, offset: u64) -> Result<()> {
        sqlx::query(
            "INSERT INTO collector_positions (tool, source_id, byte_offset, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(tool, source_id) DO UPDATE SET
               byte_offset = excluded.byte_offset,
               updated_at = excluded.updated_at",
        )
        .bind(tool)
        .bind(source_id)
        .bind(offset as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    /// Resolves the starting offset for a fresh collector cycle against a
    /// log file whose current length is `file_len`. Per spec §9's Open
    /// Question decision: if the file is new/empty (`file_len == 0`), start
    /// at 0 and clear any stale stored offset; otherwise preserve whatever
    /// offset was recorded across the restart.
    pub async fn open_or_reset(&self, tool: &str, source_id: &str, file_len: u64) -> Result<u64> {
        if file_len == 0 {
            self.set(tool, source_id, 0).await?;
            return Ok(0);
        }
        let stored = self.get(tool, source_id).await?;
        Ok(stored.min(file_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    async fn store() -> Store {
        Store::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn unset_position_defaults_to_zero() {
        let store = store().await;
        let positions = PositionStore::new(store.pool().clone());
        assert_eq!(positions.get("p0f", "p0f.log").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store().await;
        let positions = PositionStore::new(store.pool().clone());
        positions.set("p0f", "p0f.log", 4096).await.unwrap();
        assert_eq!(positions.get("p0f", "p0f.log").await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn empty_file_resets_position() {
        let store = store().await;
        let positions = PositionStore::new(store.pool().clone());
        positions.set("ngrep", "ngrep.log", 1024).await.unwrap();
        let offset = positions.open_or_reset("ngrep", "ngrep.log", 0).await.unwrap();
        assert_eq!(offset, 0);
        assert_eq!(positions.get("ngrep", "ngrep.log").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn existing_file_preserves_position_across_restart() {
        let store = store().await;
        let positions = PositionStore::new(store.pool().clone());
        positions.set("httpry", "httpry.log", 2048).await.unwrap();
        let offset = positions
            .open_or_reset("httpry", "httpry.log", 9000)
            .await
            .unwrap();
        assert_eq!(offset, 2048);
    }
}
