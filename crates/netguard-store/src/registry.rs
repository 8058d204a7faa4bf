//! Table Registry (spec §4.4): tracks the timestamped tables each collector
//! creates and resolves the "latest" table for a tool, mirroring
//! `unified_device_processor.py::get_latest_table`'s
//! `SELECT name FROM sqlite_master ... ORDER BY name DESC LIMIT 1` pattern.

use netguard_common::time::{is_tool_table, table_name, template_name};
use netguard_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::schema::create_table_sql;

/// Lists and creates the per-tool timestamped tables, backed by SQLite's
/// own `sqlite_master` catalog rather than a separate bookkeeping table.
pub struct TableRegistry {
    pool: SqlitePool,
}

impl TableRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new timestamped table for `tool` and returns its name.
    /// `tool` may be a compound name such as `suricata_alert`.
    pub async fn create(&self, tool: &str) -> Result<String> {
        let ts = chrono::Utc::now();
        let table = table_name(tool, ts);
        let sql = create_table_sql(tool, &table)
            .ok_or_else(|| Error::Store(format!("no schema registered for tool {tool}")))?;
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(table)
    }

    /// Ensures a schema-reference `_template` table exists for `tool`, used
    /// by downstream tooling to introspect the column shape without
    /// scanning a real data table (spec §3, invariant T2).
    pub async fn ensure_template(&self, tool: &str) -> Result<()> {
        let table = template_name(tool);
        let sql = create_table_sql(tool, &table)
            .ok_or_else(|| Error::Store(format!("no schema registered for tool {tool}")))?;
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    /// Lists all real (non-template) tables belonging to `tool`, oldest
    /// first.
    pub async fn list(&self, tool: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .filter(|name| is_tool_table(name, tool))
            .collect())
    }

    /// Resolves the lexicographically-latest (== chronologically latest,
    /// per invariant T1) table for `tool`. Returns `None` if the tool has
    /// never been collected.
    pub async fn latest(&self, tool: &str) -> Result<Option<String>> {
        Ok(self.list(tool).await?.into_iter().next_back())
    }

    /// Drops `table`, used by retention/flush (spec C1 "flush" operation).
    pub async fn drop_table(&self, table: &str) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{table}\""))
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_then_latest_round_trips() {
        let registry = TableRegistry::new(memory_pool().await);
        let table = registry.create("tcpdump").await.unwrap();
        assert_eq!(registry.latest("tcpdump").await.unwrap(), Some(table));
    }

    #[tokio::test]
    async fn latest_picks_most_recent_of_several() {
        let registry = TableRegistry::new(memory_pool().await);
        // sqlite_master ordering is lexicographic on the name we picked,
        // so force a distinguishable pair regardless of clock resolution.
        sqlx::query("CREATE TABLE tcpdump_20240101_000000 (id INTEGER)")
            .execute(&registry.pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE tcpdump_20250101_000000 (id INTEGER)")
            .execute(&registry.pool)
            .await
            .unwrap();
        assert_eq!(
            registry.latest("tcpdump").await.unwrap(),
            Some("tcpdump_20250101_000000".to_string())
        );
    }

    #[tokio::test]
    async fn template_table_excluded_from_latest() {
        let registry = TableRegistry::new(memory_pool().await);
        registry.ensure_template("tcpdump").await.unwrap();
        assert_eq!(registry.latest("tcpdump").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_tool_rejected() {
        let registry = TableRegistry::new(memory_pool().await);
        assert!(registry.create("bogus").await.is_err());
    }
}
