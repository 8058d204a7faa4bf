//! The embedded SQL store (spec C1): a single SQLite database file backing
//! both the timestamped collector tables and the derived-state tables.
//! Grounded on `mcp_common::config::DatabaseConfig` for pool sizing and on
//! `enhanced_alert_system.py::init_database`'s bootstrap-on-connect shape.

use std::path::Path;
use std::time::Duration;

use netguard_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::registry::TableRegistry;
use crate::schema::derived_state_ddl;

/// Owns the connection pool and exposes the table registry on top of it.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the SQLite database at `db_path` and
    /// applies the derived-state DDL. Safe to call on every startup.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Store(e.to_string()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let store = Self { pool };
        store.bootstrap().await?;
        info!(path = %db_path.display(), "store opened");
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        for ddl in derived_state_ddl() {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn registry(&self) -> TableRegistry {
        TableRegistry::new(self.pool.clone())
    }

    /// Runs SQLite's `VACUUM` and `ANALYZE` (spec supplemented feature,
    /// grounded on `optimize_database.py`). Intended for the `flush`
    /// one-shot subcommand, not the hot path.
    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_bootstraps_derived_tables() {
        let store = Store::open_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'devices'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn vacuum_does_not_error_on_empty_db() {
        let store = Store::open_in_memory().await.unwrap();
        store.vacuum().await.unwrap();
    }
}
