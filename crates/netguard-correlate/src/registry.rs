//! Device Registry (spec C6 / §4.5): continuous loop that reconciles ARP
//! neighbour data and recent local traffic into the canonical `devices`
//! table. Grounded on
//! `original_source/.../unified_device_processor.py::process_traffic_data`
//! (ARP scan + latest-table local-IP scan + per-IP upsert).

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::Utc;
use netguard_common::net::is_private;
use netguard_common::{DeviceType, Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

use netguard_store::TableRegistry;

use crate::arp;
use crate::categorize::categorize;
use crate::dns::ReverseDnsLookup;
use crate::oui::vendor_for_mac;

/// Local-traffic tables the registry samples for distinct local IPs (spec
/// §4.5 step 3).
const TRAFFIC_TOOLS: &[&str] = &["tcpdump", "tshark"];

/// Per-cycle row cap when scanning a traffic table for local IPs, matching
/// the source's `LIMIT 500` per direction per table.
const TRAFFIC_SAMPLE_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub arp_devices: usize,
    pub traffic_devices: usize,
}

pub struct DeviceRegistry {
    pool: SqlitePool,
    table_registry: TableRegistry,
    dns: ReverseDnsLookup,
    arp_scan_enabled: bool,
}

impl DeviceRegistry {
    pub fn new(pool: SqlitePool, table_registry: TableRegistry, arp_scan_enabled: bool) -> Self {
        Self {
            pool,
            table_registry,
            dns: ReverseDnsLookup::new(),
            arp_scan_enabled,
        }
    }

    /// Runs one registry cycle: ARP scan, then local-IP traffic scan, each
    /// upserting `devices`. Never deletes a device (spec §4.5 step 5).
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        if self.arp_scan_enabled {
            let entries = arp::scan().await?;
            for entry in entries {
                self.upsert(entry.ip, Some(entry.mac), 0, 0).await?;
                report.arp_devices += 1;
            }
        }

        for tool in TRAFFIC_TOOLS {
            let Some(table) = self.table_registry.latest(tool).await? else {
                continue;
            };
            let deltas = self.collect_traffic_deltas(&table).await?;
            report.traffic_devices += deltas.len();
            for (ip, (packets, bytes)) in deltas {
                self.upsert(ip, None, packets, bytes).await?;
            }
        }

        info!(arp = report.arp_devices, traffic = report.traffic_devices, "device registry cycle complete");
        Ok(report)
    }

    async fn collect_traffic_deltas(&self, table: &str) -> Result<HashMap<IpAddr, (i64, i64)>> {
        let rows: Vec<(Option<String>, Option<String>, Option<i64>)> = sqlx::query_as(&format!(
            "SELECT src_ip, dest_ip, length FROM \"{table}\" LIMIT {TRAFFIC_SAMPLE_LIMIT}"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        let mut deltas: HashMap<IpAddr, (i64, i64)> = HashMap::new();
        for (src, dest, length) in rows {
            let bytes = length.unwrap_or(0);
            for candidate in [src, dest].into_iter().flatten() {
                if let Ok(ip) = candidate.parse::<IpAddr>() {
                    if is_private(ip) {
                        let entry = deltas.entry(ip).or_insert((0, 0));
                        entry.0 += 1;
                        entry.1 += bytes;
                    }
                }
            }
        }
        Ok(deltas)
    }

    async fn upsert(&self, ip: IpAddr, mac: Option<String>, packets_delta: i64, bytes_delta: i64) -> Result<()> {
        let vendor = mac.as_deref().map(vendor_for_mac).unwrap_or_else(|| "Unknown".to_string());
        let hostname = self.dns.resolve(ip).await;
        let (device_type, device_category) = categorize(hostname.as_deref(), Some(&vendor));
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO devices
               (ip_address, mac_address, hostname, vendor, device_type, device_category,
                security_score, is_trusted, first_seen, last_seen, total_packets, total_bytes)
             VALUES (?, ?, ?, ?, ?, ?, 100, 0, ?, ?, ?, ?)
             ON CONFLICT(ip_address) DO UPDATE SET
               mac_address = COALESCE(devices.mac_address, excluded.mac_address),
               hostname = COALESCE(devices.hostname, excluded.hostname),
               vendor = CASE WHEN devices.vendor = 'Unknown' THEN excluded.vendor ELSE devices.vendor END,
               device_type = CASE WHEN devices.device_type = 'Unknown' THEN excluded.device_type ELSE devices.device_type END,
               device_category = CASE WHEN devices.device_category = 'Unknown' THEN excluded.device_category ELSE devices.device_category END,
               last_seen = excluded.last_seen,
               total_packets = devices.total_packets + excluded.total_packets,
               total_bytes = devices.total_bytes + excluded.total_bytes",
        )
        .bind(ip.to_string())
        .bind(mac)
        .bind(hostname)
        .bind(vendor)
        .bind(device_type.as_str())
        .bind(&device_category)
        .bind(now)
        .bind(now)
        .bind(packets_delta)
        .bind(bytes_delta)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        debug!(%ip, ?device_type, category = %device_category, "device upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    async fn registry() -> (Store, DeviceRegistry) {
        let store = Store::open_in_memory().await.unwrap();
        let table_registry = store.registry();
        let device_registry = DeviceRegistry::new(store.pool().clone(), store.registry(), false);
        let _ = table_registry;
        (store, device_registry)
    }

    #[tokio::test]
    async fn upsert_inserts_new_device_with_first_seen_eq_last_seen() {
        let (store, registry) = registry().await;
        registry
            .upsert("192.168.1.10".parse().unwrap(), Some("B8:27:EB:01:02:03".to_string()), 5, 1000)
            .await
            .unwrap();

        let row: (String, String, i64, i64) = sqlx::query_as(
            "SELECT vendor, device_type, total_packets, total_bytes FROM devices WHERE ip_address = '192.168.1.10'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(row.0, "Raspberry Pi Foundation");
        assert_eq!(row.1, "IoT");
        assert_eq!(row.2, 5);
        assert_eq!(row.3, 1000);
    }

    #[tokio::test]
    async fn upsert_is_additive_on_traffic_counters() {
        let (store, registry) = registry().await;
        let ip = "192.168.1.20".parse().unwrap();
        registry.upsert(ip, None, 10, 2000).await.unwrap();
        registry.upsert(ip, None, 5, 500).await.unwrap();

        let row: (i64, i64) = sqlx::query_as("SELECT total_packets, total_bytes FROM devices WHERE ip_address = '192.168.1.20'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 15);
        assert_eq!(row.1, 2500);
    }

    #[tokio::test]
    async fn mac_prefers_non_null_across_upserts() {
        let (store, registry) = registry().await;
        let ip = "192.168.1.30".parse().unwrap();
        registry.upsert(ip, None, 0, 0).await.unwrap();
        registry.upsert(ip, Some("B8:27:EB:01:02:03".to_string()), 0, 0).await.unwrap();

        let row: (Option<String>,) = sqlx::query_as("SELECT mac_address FROM devices WHERE ip_address = '192.168.1.30'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0.as_deref(), Some("B8:27:EB:01:02:03"));
    }
}
