//! Vulnerability Scanner (spec C7 / §4.6): periodic passive checks over IoT
//! devices producing `iot_vulnerabilities` rows. Grounded on
//! `original_source/.../enhanced_alert_system.py`'s check families (open
//! ports, suspicious destinations, excess traffic, risky vendors, stale
//! firmware) translated onto the Store's `devices`/`latest(tcpdump)` shape.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use netguard_common::net::is_benign_by_default;
use netguard_common::{Error, Result, Severity};
use sqlx::SqlitePool;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use netguard_store::TableRegistry;

/// Risky/default-credential ports probed on each IoT device (spec §4.6).
const RISKY_PORTS: &[u16] = &[21, 23, 2323, 80, 445, 1433, 3306, 3389, 5900, 8080, 8443, 8888];
const TELNET_PORTS: &[u16] = &[23, 2323];
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Destination ports treated as known C2/mining-pool traffic for the
/// suspicious-connection check.
const KNOWN_BAD_PORTS: &[u16] = &[4444, 6667, 6697, 3333, 5555, 7777, 14444, 9999];

/// Vendors flagged for informational default-credentials risk.
const RISKY_VENDORS: &[&str] = &["Espressif Inc.", "TP-Link Technologies"];

const FIRMWARE_STALE_DAYS: i64 = 90;
const DEDUP_WINDOW_HOURS: i64 = 24;

struct IotDevice {
    ip: IpAddr,
    vendor: Option<String>,
    device_category: String,
    total_bytes: i64,
    first_seen: chrono::DateTime<Utc>,
}

pub struct VulnerabilityScanner {
    pool: SqlitePool,
    table_registry: TableRegistry,
}

impl VulnerabilityScanner {
    pub fn new(pool: SqlitePool, table_registry: TableRegistry) -> Self {
        Self { pool, table_registry }
    }

    pub async fn run_cycle(&self) -> Result<usize> {
        let devices = self.recent_iot_devices().await?;
        let mut written = 0;
        for device in devices {
            written += self.scan_device(&device).await?;
        }
        Ok(written)
    }

    async fn recent_iot_devices(&self) -> Result<Vec<IotDevice>> {
        let rows: Vec<(String, Option<String>, String, i64, chrono::DateTime<Utc>)> = sqlx::query_as(
            "SELECT ip_address, vendor, device_category, total_bytes, first_seen
             FROM devices
             WHERE device_type = 'IoT' AND last_seen >= datetime('now', '-1 hour')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(ip, vendor, device_category, total_bytes, first_seen)| {
                Some(IotDevice {
                    ip: ip.parse().ok()?,
                    vendor,
                    device_category,
                    total_bytes,
                    first_seen,
                })
            })
            .collect())
    }

    async fn scan_device(&self, device: &IotDevice) -> Result<usize> {
        let mut written = 0;
        written += self.open_port_probe(device).await?;
        written += self.suspicious_connection_check(device).await?;
        written += self.excess_traffic_check(device).await?;
        written += self.default_credentials_check(device).await?;
        written += self.firmware_freshness_check(device).await?;
        Ok(written)
    }

    async fn open_port_probe(&self, device: &IotDevice) -> Result<usize> {
        let mut written = 0;
        for &port in RISKY_PORTS {
            let addr = SocketAddr::new(device.ip, port);
            let connected = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await.is_ok_and(|r| r.is_ok());
            if !connected {
                continue;
            }
            let severity = if TELNET_PORTS.contains(&port) { Severity::High } else { Severity::Medium };
            let description = format!("Open port {port} on IoT device {}", device.ip);
            written += self
                .record(
                    device.ip,
                    "open_port",
                    severity,
                    &description,
                    "Disable the service or firewall the port from untrusted networks.",
                )
                .await?;
        }
        Ok(written)
    }

    async fn suspicious_connection_check(&self, device: &IotDevice) -> Result<usize> {
        let Some(table) = self.table_registry.latest("tcpdump").await? else {
            return Ok(0);
        };
        let rows: Vec<(Option<String>, Option<i64>)> = sqlx::query_as(&format!(
            "SELECT dest_ip, dest_port FROM \"{table}\" WHERE src_ip = ? LIMIT 2000"
        ))
        .bind(device.ip.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        let hit = rows.iter().any(|(dest_ip, dest_port)| {
            let external = dest_ip
                .as_deref()
                .and_then(|ip| ip.parse::<IpAddr>().ok())
                .map(|ip| !is_benign_by_default(ip))
                .unwrap_or(false);
            let bad_port = dest_port.map(|p| KNOWN_BAD_PORTS.contains(&(p as u16))).unwrap_or(false);
            external && bad_port
        });
        if !hit {
            return Ok(0);
        }
        self.record(
            device.ip,
            "suspicious_connection",
            Severity::High,
            &format!("{} contacted a known-bad destination port", device.ip),
            "Isolate the device and inspect its outbound connections.",
        )
        .await
    }

    async fn excess_traffic_check(&self, device: &IotDevice) -> Result<usize> {
        let threshold = traffic_threshold_bytes(&device.device_category);
        if device.total_bytes <= threshold {
            return Ok(0);
        }
        self.record(
            device.ip,
            "excess_traffic",
            Severity::Medium,
            &format!(
                "{} ({}) has transferred {} bytes, above the {} byte threshold for its category",
                device.ip, device.device_category, device.total_bytes, threshold
            ),
            "Review the device's traffic pattern for possible data exfiltration.",
        )
        .await
    }

    async fn default_credentials_check(&self, device: &IotDevice) -> Result<usize> {
        let Some(vendor) = &device.vendor else {
            return Ok(0);
        };
        if !RISKY_VENDORS.iter().any(|v| v == vendor) {
            return Ok(0);
        }
        self.record(
            device.ip,
            "default_credentials",
            Severity::Medium,
            &format!("{} is from a vendor commonly shipped with default credentials", vendor),
            "Verify the device's admin credentials have been changed from the factory default.",
        )
        .await
    }

    async fn firmware_freshness_check(&self, device: &IotDevice) -> Result<usize> {
        if Utc::now() - device.first_seen < ChronoDuration::days(FIRMWARE_STALE_DAYS) {
            return Ok(0);
        }
        self.record(
            device.ip,
            "stale_firmware",
            Severity::Low,
            &format!("{} has been on the network for over {FIRMWARE_STALE_DAYS} days with no recorded update", device.ip),
            "Check for and apply a firmware update.",
        )
        .await
    }

    /// Inserts a vulnerability row unless an unresolved row already exists
    /// for (device_ip, vulnerability_type) within the dedup window
    /// (invariant V1).
    async fn record(&self, ip: IpAddr, vulnerability_type: &str, severity: Severity, description: &str, recommendation: &str) -> Result<usize> {
        let existing: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM iot_vulnerabilities
             WHERE device_ip = ? AND vulnerability_type = ? AND resolved = 0
               AND detected_at >= datetime('now', ?)",
        )
        .bind(ip.to_string())
        .bind(vulnerability_type)
        .bind(format!("-{DEDUP_WINDOW_HOURS} hours"))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        if existing.0 > 0 {
            debug!(%ip, vulnerability_type, "vulnerability already recorded within dedup window");
            return Ok(0);
        }

        sqlx::query(
            "INSERT INTO iot_vulnerabilities (device_ip, vulnerability_type, severity, description, recommendation)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(ip.to_string())
        .bind(vulnerability_type)
        .bind(severity.as_str())
        .bind(description)
        .bind(recommendation)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        warn!(%ip, vulnerability_type, %severity, "vulnerability recorded");
        Ok(1)
    }
}

fn traffic_threshold_bytes(category: &str) -> i64 {
    match category {
        "Smart Light" => 500 * 1024,
        "Smart Speaker" => 5 * 1024 * 1024,
        "Smart Security" => 20 * 1024 * 1024,
        _ => 10 * 1024 * 1024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    async fn scanner() -> (Store, VulnerabilityScanner) {
        let store = Store::open_in_memory().await.unwrap();
        let scanner = VulnerabilityScanner::new(store.pool().clone(), store.registry());
        (store, scanner)
    }

    async fn insert_device(store: &Store, ip: &str, category: &str, total_bytes: i64, first_seen_days_ago: i64) {
        sqlx::query(
            "INSERT INTO devices (ip_address, device_type, device_category, total_bytes, first_seen, last_seen)
             VALUES (?, 'IoT', ?, ?, datetime('now', ?), datetime('now'))",
        )
        .bind(ip)
        .bind(category)
        .bind(total_bytes)
        .bind(format!("-{first_seen_days_ago} days"))
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn excess_traffic_is_flagged_for_smart_light() {
        let (store, scanner) = scanner().await;
        insert_device(&store, "192.168.1.50", "Smart Light", 600 * 1024, 1).await;

        let device = IotDevice {
            ip: "192.168.1.50".parse().unwrap(),
            vendor: None,
            device_category: "Smart Light".to_string(),
            total_bytes: 600 * 1024,
            first_seen: Utc::now(),
        };
        let written = scanner.excess_traffic_check(&device).await.unwrap();
        assert_eq!(written, 1);

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM iot_vulnerabilities WHERE vulnerability_type = 'excess_traffic'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn dedup_suppresses_repeat_within_window() {
        let (_store, scanner) = scanner().await;
        let ip: IpAddr = "192.168.1.60".parse().unwrap();
        let first = scanner.record(ip, "stale_firmware", Severity::Low, "old", "update").await.unwrap();
        let second = scanner.record(ip, "stale_firmware", Severity::Low, "old", "update").await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn firmware_freshness_flags_devices_older_than_ninety_days() {
        let (_store, scanner) = scanner().await;
        let device = IotDevice {
            ip: "192.168.1.70".parse().unwrap(),
            vendor: None,
            device_category: "Unknown".to_string(),
            total_bytes: 0,
            first_seen: Utc::now() - ChronoDuration::days(120),
        };
        let written = scanner.firmware_freshness_check(&device).await.unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn default_credentials_check_only_flags_risky_vendors() {
        let (_store, scanner) = scanner().await;
        let device = IotDevice {
            ip: "192.168.1.80".parse().unwrap(),
            vendor: Some("Espressif Inc.".to_string()),
            device_category: "Unknown".to_string(),
            total_bytes: 0,
            first_seen: Utc::now(),
        };
        assert_eq!(scanner.default_credentials_check(&device).await.unwrap(), 1);

        let trusted = IotDevice {
            ip: "192.168.1.81".parse().unwrap(),
            vendor: Some("Apple Inc.".to_string()),
            device_category: "Unknown".to_string(),
            total_bytes: 0,
            first_seen: Utc::now(),
        };
        assert_eq!(scanner.default_credentials_check(&trusted).await.unwrap(), 0);
    }
}
