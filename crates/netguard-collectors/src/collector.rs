//! Generic collector loop (spec C5): cadence, batch insert, position-
//! advance-after-commit, backpressure ceiling, failure isolation. Grounded
//! on `mcp-pipeline-guard/src/guard.rs::monitoring_cycle`'s
//! do-work-then-sleep shape, generalized from a single health check to an
//! arbitrary serializable record batch so every tool-specific parser can
//! share one flush path instead of ten hand-written insert routines.

use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Arguments, SqlitePool};
use tracing::{info, warn};

use netguard_common::{Error, Result};
use netguard_store::TableRegistry;

/// Result of one flush attempt, reported back to the owning collector loop
/// for logging/metrics.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub table: Option<String>,
    pub inserted: usize,
    pub dropped: usize,
}

/// Serializes `records` and inserts them as a fresh timestamped table for
/// `tool`, truncating to `ceiling` rows if exceeded (spec §4.3
/// backpressure). Returns the outcome; the caller is responsible for only
/// advancing its position store after this returns `Ok`.
pub async fn flush_batch<T: Serialize>(
    pool: &SqlitePool,
    registry: &TableRegistry,
    tool: &str,
    records: &[T],
    ceiling: usize,
) -> Result<BatchOutcome> {
    if records.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let dropped = records.len().saturating_sub(ceiling);
    let batch = if dropped > 0 {
        warn!(tool, dropped, "batch exceeded ceiling, truncating");
        &records[..ceiling]
    } else {
        records
    };

    let rows: Vec<serde_json::Map<String, Value>> = batch
        .iter()
        .map(|record| match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(Error::Serialization(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "record did not serialize to a JSON object",
            )))),
            Err(e) => Err(Error::Serialization(e)),
        })
        .collect::<Result<Vec<_>>>()?;

    let table = registry.create(tool).await?;
    let columns: Vec<String> = rows[0].keys().cloned().collect();
    let placeholders = std::iter::repeat("?").take(columns.len()).collect::<Vec<_>>().join(", ");
    let quoted_columns = columns.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ");
    let sql = format!("INSERT INTO \"{table}\" ({quoted_columns}) VALUES ({placeholders})");

    let mut tx = pool.begin().await.map_err(|e| Error::Store(e.to_string()))?;
    let mut inserted = 0usize;
    for row in &rows {
        let mut args = SqliteArguments::default();
        for column in &columns {
            bind_json(&mut args, row.get(column).unwrap_or(&Value::Null));
        }
        sqlx::query_with(&sql, args)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        inserted += 1;
    }
    tx.commit().await.map_err(|e| Error::Store(e.to_string()))?;

    info!(tool, table = %table, inserted, dropped, "flushed collector batch");
    Ok(BatchOutcome {
        table: Some(table),
        inserted,
        dropped,
    })
}

fn bind_json(args: &mut SqliteArguments<'_>, value: &Value) {
    match value {
        Value::Null => {
            args.add(None::<i64>);
        }
        Value::Bool(b) => {
            args.add(*b as i64);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                args.add(i);
            } else if let Some(f) = n.as_f64() {
                args.add(f);
            } else {
                args.add(n.to_string());
            }
        }
        Value::String(s) => {
            args.add(s.clone());
        }
        other => {
            args.add(other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        timestamp: chrono::DateTime<chrono::Utc>,
        src_ip: Option<String>,
        dest_ip: Option<String>,
        src_port: Option<u16>,
        dest_port: Option<u16>,
        protocol: Option<String>,
        tcp_syn: bool,
        tcp_ack: bool,
        tcp_fin: bool,
        ttl: Option<u8>,
        length: Option<u32>,
        app_protocol: Option<String>,
        threat_score: f64,
        is_suspicious: bool,
        geo_country: Option<String>,
    }

    fn sample() -> Sample {
        Sample {
            timestamp: chrono::Utc::now(),
            src_ip: Some("192.168.1.5".to_string()),
            dest_ip: Some("8.8.8.8".to_string()),
            src_port: Some(51000),
            dest_port: Some(443),
            protocol: Some("tcp".to_string()),
            tcp_syn: true,
            tcp_ack: false,
            tcp_fin: false,
            ttl: Some(54),
            length: Some(60),
            app_protocol: Some("tls".to_string()),
            threat_score: 0.1,
            is_suspicious: false,
            geo_country: None,
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = Store::open_in_memory().await.unwrap();
        let registry = store.registry();
        let outcome = flush_batch::<Sample>(store.pool(), &registry, "tcpdump", &[], 100)
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 0);
        assert!(outcome.table.is_none());
    }

    #[tokio::test]
    async fn inserts_rows_into_a_fresh_table() {
        let store = Store::open_in_memory().await.unwrap();
        let registry = store.registry();
        let records = vec![sample(), sample()];
        let outcome = flush_batch(store.pool(), &registry, "tcpdump", &records, 100)
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.dropped, 0);
        let table = outcome.table.unwrap();
        let row: (String,) = sqlx::query_as(&format!("SELECT src_ip FROM \"{table}\" LIMIT 1"))
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, "192.168.1.5");
    }

    #[tokio::test]
    async fn truncates_to_ceiling_and_reports_drop_count() {
        let store = Store::open_in_memory().await.unwrap();
        let registry = store.registry();
        let records = vec![sample(), sample(), sample()];
        let outcome = flush_batch(store.pool(), &registry, "tcpdump", &records, 2)
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.dropped, 1);
    }
}
