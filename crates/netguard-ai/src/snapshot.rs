//! Per-cycle snapshot builder (spec §4.9 step 1): samples the newest rows
//! from every collector table plus the derived device/vulnerability state,
//! grounded on `comprehensive_data_aggregator.py::aggregate_all_data` and
//! its per-tool `get_*_data` helpers.

use netguard_common::{Error, Result};
use netguard_store::schema::{SURICATA_EVENT_TYPES, TOOLS};
use netguard_store::TableRegistry;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Column, Row, SqlitePool};

/// Per-tool row cap when sampling for the AI prompt, mirroring the
/// Python original's "LIMIT 100"/"LIMIT 50" ad-hoc caps (spec §4.9: "50-200").
fn sample_cap(tool: &str) -> i64 {
    match tool {
        "tcpdump" => 100,
        "tshark" => 100,
        "suricata" => 100,
        "httpry" => 50,
        "argus" => 100,
        _ => 50,
    }
}

/// One tool's sampled rows plus the total row count in its latest table.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSample {
    pub table: String,
    pub total_rows: i64,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NetworkSummary {
    pub unique_device_count: i64,
    pub devices: Vec<Value>,
    pub os_distribution: Value,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IotSummary {
    pub recent_devices: Vec<Value>,
    pub category_counts: Value,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IotSecuritySummary {
    pub top_unresolved: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct OverallStatistics {
    pub total_data_points: i64,
    pub per_tool_counts: Value,
}

/// The full document handed to [`crate::prompt::render`]. Field names
/// mirror the Python aggregator's export shape so the prompt reads the
/// same sections an operator reading the old JSON export would recognise.
#[derive(Debug, Clone, Serialize, Default)]
pub struct NetworkSnapshot {
    pub time_window_minutes: i64,
    pub tools: Vec<ToolSample>,
    pub network_summary: NetworkSummary,
    pub iot_summary: IotSummary,
    pub iot_security: IotSecuritySummary,
    pub overall_statistics: OverallStatistics,
}

impl NetworkSnapshot {
    pub fn is_empty(&self) -> bool {
        self.overall_statistics.total_data_points == 0
    }
}

/// Builds a [`NetworkSnapshot`] by reading every tool's latest table plus
/// the `devices`/`iot_vulnerabilities` derived state.
pub async fn build(
    pool: &SqlitePool,
    registry: &TableRegistry,
    time_window_minutes: i64,
    max_packets_to_analyze: i64,
) -> Result<NetworkSnapshot> {
    let mut tools = Vec::new();
    let mut per_tool_counts = serde_json::Map::new();
    let mut total = 0i64;

    for tool in TOOLS {
        if let Some(sample) = sample_tool(pool, registry, tool, max_packets_to_analyze).await? {
            total += sample.total_rows;
            per_tool_counts.insert((*tool).to_string(), Value::from(sample.total_rows));
            tools.push(sample);
        }
    }

    for event_type in SURICATA_EVENT_TYPES {
        let tool = format!("suricata_{event_type}");
        if let Some(sample) = sample_tool(pool, registry, &tool, max_packets_to_analyze).await? {
            total += sample.total_rows;
            per_tool_counts.insert(tool, Value::from(sample.total_rows));
            tools.push(sample);
        }
    }

    let network_summary = build_network_summary(pool).await?;
    let iot_summary = build_iot_summary(pool).await?;
    let iot_security = build_iot_security_summary(pool).await?;
    total += network_summary.unique_device_count;

    Ok(NetworkSnapshot {
        time_window_minutes,
        tools,
        network_summary,
        iot_summary,
        iot_security,
        overall_statistics: OverallStatistics {
            total_data_points: total,
            per_tool_counts: Value::Object(per_tool_counts),
        },
    })
}

async fn sample_tool(
    pool: &SqlitePool,
    registry: &TableRegistry,
    tool: &str,
    max_rows: i64,
) -> Result<Option<ToolSample>> {
    let Some(table) = registry.latest(tool).await? else {
        return Ok(None);
    };
    let cap = sample_cap(tool).min(max_rows.max(1));
    let rows = sqlx::query(&format!(
        "SELECT * FROM \"{table}\" ORDER BY id DESC LIMIT {cap}"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| Error::Store(e.to_string()))?;

    let total_rows: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

    let rows = rows.into_iter().map(row_to_json).collect();

    Ok(Some(ToolSample {
        table,
        total_rows: total_rows.0,
        rows,
    }))
}

fn row_to_json(row: sqlx::sqlite::SqliteRow) -> Value {
    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name();
        let value: Value = row
            .try_get::<i64, _>(name)
            .map(Value::from)
            .or_else(|_| row.try_get::<f64, _>(name).map(Value::from))
            .or_else(|_| row.try_get::<String, _>(name).map(Value::from))
            .unwrap_or(Value::Null);
        map.insert(name.to_string(), value);
    }
    Value::Object(map)
}

async fn build_network_summary(pool: &SqlitePool) -> Result<NetworkSummary> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

    let rows = sqlx::query(
        "SELECT ip_address, hostname, vendor, device_type FROM devices ORDER BY last_seen DESC LIMIT 100",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::Store(e.to_string()))?;
    let devices: Vec<Value> = rows.into_iter().map(row_to_json).collect();

    let type_counts: Vec<(String, i64)> =
        sqlx::query_as("SELECT device_type, COUNT(*) FROM devices GROUP BY device_type")
            .fetch_all(pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
    let os_distribution = Value::Object(
        type_counts
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect(),
    );

    Ok(NetworkSummary {
        unique_device_count: count.0,
        devices,
        os_distribution,
    })
}

async fn build_iot_summary(pool: &SqlitePool) -> Result<IotSummary> {
    let rows = sqlx::query(
        "SELECT ip_address, hostname, vendor, device_category FROM devices \
         WHERE device_type = 'IoT' AND last_seen >= datetime('now', '-1 hour') \
         ORDER BY last_seen DESC LIMIT 100",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::Store(e.to_string()))?;
    let recent_devices: Vec<Value> = rows.into_iter().map(row_to_json).collect();

    let category_counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT device_category, COUNT(*) FROM devices WHERE device_type = 'IoT' GROUP BY device_category",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::Store(e.to_string()))?;
    let category_counts = Value::Object(
        category_counts
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect(),
    );

    Ok(IotSummary {
        recent_devices,
        category_counts,
    })
}

async fn build_iot_security_summary(pool: &SqlitePool) -> Result<IotSecuritySummary> {
    let rows = sqlx::query(
        "SELECT device_ip, vulnerability_type, severity, description, detected_at \
         FROM iot_vulnerabilities WHERE resolved = 0 \
         ORDER BY CASE severity \
           WHEN 'CRITICAL' THEN 0 WHEN 'HIGH' THEN 1 WHEN 'MEDIUM' THEN 2 ELSE 3 END, \
           detected_at DESC LIMIT 25",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::Store(e.to_string()))?;
    Ok(IotSecuritySummary {
        top_unresolved: rows.into_iter().map(row_to_json).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    #[tokio::test]
    async fn empty_store_yields_empty_snapshot() {
        let store = Store::open_in_memory().await.unwrap();
        let snapshot = build(store.pool(), &store.registry(), 5, 1000)
            .await
            .unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.tools.is_empty());
    }

    #[tokio::test]
    async fn device_rows_feed_the_network_and_iot_summaries() {
        let store = Store::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO devices (ip_address, hostname, vendor, device_type, device_category, \
             is_trusted, first_seen, last_seen, total_packets, total_bytes) \
             VALUES ('192.168.1.10', 'raspberrypi', 'Raspberry Pi Foundation', 'IoT', 'Raspberry Pi', \
             0, datetime('now'), datetime('now'), 10, 1000)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let snapshot = build(store.pool(), &store.registry(), 5, 1000)
            .await
            .unwrap();
        assert_eq!(snapshot.network_summary.unique_device_count, 1);
        assert_eq!(snapshot.iot_summary.recent_devices.len(), 1);
        assert!(!snapshot.is_empty());
    }

    #[tokio::test]
    async fn tool_sampling_respects_the_configured_cap() {
        let store = Store::open_in_memory().await.unwrap();
        let table = store.registry().create("tcpdump").await.unwrap();
        for port in 0..30u32 {
            sqlx::query(&format!(
                "INSERT INTO \"{table}\" (timestamp, src_ip, dest_ip, dest_port) VALUES (datetime('now'), ?, ?, ?)"
            ))
            .bind("192.168.1.2")
            .bind("8.8.8.8")
            .bind(port as i64)
            .execute(store.pool())
            .await
            .unwrap();
        }

        let snapshot = build(store.pool(), &store.registry(), 5, 10)
            .await
            .unwrap();
        let tcpdump = snapshot.tools.iter().find(|t| t.table == table).unwrap();
        assert_eq!(tcpdump.total_rows, 30);
        assert_eq!(tcpdump.rows.len(), 10);
    }
}
