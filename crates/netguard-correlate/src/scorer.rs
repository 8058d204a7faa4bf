//! Scorer (spec C8 / §4.7): computes each device's 0-100 security score
//! from an ordered set of penalties and writes it back to
//! `devices.security_score`. Grounded on
//! `original_source/.../enhanced_alert_system.py`'s scoring pass, with the
//! exact weights spec.md §4.7 specifies.

use chrono::Utc;
use netguard_common::{DeviceType, Error, Grade, Result, Severity};
use sqlx::SqlitePool;
use tracing::debug;

use netguard_store::TableRegistry;

const MIN_WEB_SAMPLE: i64 = 10;

#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub ip_address: String,
    pub score: u8,
    pub grade: Grade,
    pub reasons: Vec<String>,
}

struct DeviceRow {
    ip_address: String,
    hostname: Option<String>,
    mac_address: Option<String>,
    device_type: DeviceType,
    device_category: String,
    last_seen: chrono::DateTime<Utc>,
}

pub struct Scorer {
    pool: SqlitePool,
    table_registry: TableRegistry,
}

impl Scorer {
    pub fn new(pool: SqlitePool, table_registry: TableRegistry) -> Self {
        Self { pool, table_registry }
    }

    pub async fn run_cycle(&self) -> Result<Vec<ScoreResult>> {
        let devices = self.all_devices().await?;
        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            let result = self.score_device(&device).await?;
            self.write_back(&result).await?;
            results.push(result);
        }
        Ok(results)
    }

    async fn all_devices(&self) -> Result<Vec<DeviceRow>> {
        let rows: Vec<(String, Option<String>, Option<String>, String, String, chrono::DateTime<Utc>)> = sqlx::query_as(
            "SELECT ip_address, hostname, mac_address, device_type, device_category, last_seen FROM devices",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(ip_address, hostname, mac_address, device_type, device_category, last_seen)| DeviceRow {
                ip_address,
                hostname,
                mac_address,
                device_type: device_type.parse().unwrap_or(DeviceType::Unknown),
                device_category,
                last_seen,
            })
            .collect())
    }

    async fn score_device(&self, device: &DeviceRow) -> Result<ScoreResult> {
        let mut score: i32 = 100;
        let mut reasons = Vec::new();

        if device.hostname.is_none() {
            score -= 10;
            reasons.push("hostname missing (-10)".to_string());
        }
        if device.mac_address.is_none() {
            score -= 15;
            reasons.push("MAC address missing (-15)".to_string());
        }
        if device.device_type == DeviceType::Unknown {
            score -= 10;
            reasons.push("device type unresolved (-10)".to_string());
        }

        if let Some(penalty) = self.vulnerability_penalty(&device.ip_address).await? {
            score -= penalty.0;
            reasons.push(format!("unresolved {} vulnerability (-{})", penalty.1, penalty.0));
        }

        if let Some(penalty) = self.unencrypted_web_penalty(&device.ip_address).await? {
            score -= penalty.0;
            reasons.push(format!("{}% unencrypted web traffic (-{})", penalty.1, penalty.0));
        }

        if Utc::now() - device.last_seen > chrono::Duration::hours(24) {
            score -= 5;
            reasons.push("last seen over 24h ago (-5)".to_string());
        }

        match device.device_type {
            DeviceType::IoT => {
                score -= 5;
                reasons.push("IoT device type (-5)".to_string());
                if device.device_category != "Unknown" {
                    score += 3;
                    reasons.push("IoT device with known category (+3)".to_string());
                }
            }
            DeviceType::Network => {
                score += 10;
                reasons.push("network infrastructure device (+10)".to_string());
            }
            _ => {}
        }

        let clamped = score.clamp(0, 100) as u8;
        Ok(ScoreResult {
            ip_address: device.ip_address.clone(),
            score: clamped,
            grade: Grade::from(clamped),
            reasons,
        })
    }

    /// Returns `(penalty, severity_label)` for the highest-severity
    /// unresolved vulnerability, or `None` if the device has no unresolved
    /// vulnerabilities. Only the maximum applies (spec §4.7).
    async fn vulnerability_penalty(&self, ip: &str) -> Result<Option<(i32, &'static str)>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT severity FROM iot_vulnerabilities WHERE device_ip = ? AND resolved = 0")
            .bind(ip)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;

        let worst = rows
            .iter()
            .filter_map(|(s,)| match s.as_str() {
                "CRITICAL" => Some(Severity::Critical),
                "HIGH" => Some(Severity::High),
                "MEDIUM" => Some(Severity::Medium),
                "LOW" => Some(Severity::Low),
                _ => None,
            })
            .max();

        Ok(worst.map(|severity| {
            let penalty = match severity {
                Severity::Critical => 40,
                Severity::High => 25,
                Severity::Medium => 15,
                Severity::Low => 5,
            };
            (penalty, severity.as_str())
        }))
    }

    async fn unencrypted_web_penalty(&self, ip: &str) -> Result<Option<(i32, u32)>> {
        let Some(table) = self.table_registry.latest("tcpdump").await? else {
            return Ok(None);
        };
        let rows: Vec<(Option<i64>,)> = sqlx::query_as(&format!(
            "SELECT dest_port FROM \"{table}\" WHERE src_ip = ? AND dest_port IN (80, 443) LIMIT 5000"
        ))
        .bind(ip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        if (rows.len() as i64) < MIN_WEB_SAMPLE {
            return Ok(None);
        }
        let http = rows.iter().filter(|(p,)| *p == Some(80)).count();
        let ratio = (http as f64) / (rows.len() as f64);
        let percent = (ratio * 100.0).round() as u32;

        if ratio > 0.70 {
            Ok(Some((15, percent)))
        } else if ratio > 0.40 {
            Ok(Some((8, percent)))
        } else {
            Ok(None)
        }
    }

    async fn write_back(&self, result: &ScoreResult) -> Result<()> {
        sqlx::query("UPDATE devices SET security_score = ? WHERE ip_address = ?")
            .bind(result.score as i64)
            .bind(&result.ip_address)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
        debug!(ip = %result.ip_address, score = result.score, ?result.grade, "device scored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    async fn scorer() -> (Store, Scorer) {
        let store = Store::open_in_memory().await.unwrap();
        let scorer = Scorer::new(store.pool().clone(), store.registry());
        (store, scorer)
    }

    #[tokio::test]
    async fn complete_device_with_no_issues_scores_perfectly() {
        let (store, scorer) = scorer().await;
        sqlx::query(
            "INSERT INTO devices (ip_address, mac_address, hostname, device_type, device_category, first_seen, last_seen)
             VALUES ('192.168.1.10', 'AA:BB:CC:DD:EE:FF', 'desktop', 'Computer', 'Desktop/Laptop', datetime('now'), datetime('now'))",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let device = DeviceRow {
            ip_address: "192.168.1.10".to_string(),
            hostname: Some("desktop".to_string()),
            mac_address: Some("AA:BB:CC:DD:EE:FF".to_string()),
            device_type: DeviceType::Computer,
            device_category: "Desktop/Laptop".to_string(),
            last_seen: Utc::now(),
        };
        let result = scorer.score_device(&device).await.unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.grade, Grade::A);
        assert!(result.reasons.is_empty());
    }

    #[tokio::test]
    async fn missing_hostname_and_mac_both_apply() {
        let (_store, scorer) = scorer().await;
        let device = DeviceRow {
            ip_address: "192.168.1.11".to_string(),
            hostname: None,
            mac_address: None,
            device_type: DeviceType::Computer,
            device_category: "Unknown".to_string(),
            last_seen: Utc::now(),
        };
        let result = scorer.score_device(&device).await.unwrap();
        assert_eq!(result.score, 75);
    }

    #[tokio::test]
    async fn critical_vulnerability_penalty_dominates_over_lesser_ones() {
        let (store, scorer) = scorer().await;
        sqlx::query(
            "INSERT INTO iot_vulnerabilities (device_ip, vulnerability_type, severity, description, recommendation)
             VALUES ('192.168.1.12', 'open_port', 'LOW', 'x', 'y'),
                    ('192.168.1.12', 'suspicious_connection', 'CRITICAL', 'x', 'y')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let penalty = scorer.vulnerability_penalty("192.168.1.12").await.unwrap();
        assert_eq!(penalty, Some((40, "CRITICAL")));
    }

    #[tokio::test]
    async fn iot_device_gets_net_penalty_with_known_category_credit() {
        let (_store, scorer) = scorer().await;
        let device = DeviceRow {
            ip_address: "192.168.1.13".to_string(),
            hostname: Some("raspberrypi".to_string()),
            mac_address: Some("B8:27:EB:01:02:03".to_string()),
            device_type: DeviceType::IoT,
            device_category: "Raspberry Pi".to_string(),
            last_seen: Utc::now(),
        };
        let result = scorer.score_device(&device).await.unwrap();
        // 100 - 5 (IoT) + 3 (known category) = 98
        assert_eq!(result.score, 98);
    }

    #[tokio::test]
    async fn stale_unresolved_unknown_device_accumulates_every_base_penalty() {
        let (_store, scorer) = scorer().await;
        let device = DeviceRow {
            ip_address: "192.168.1.14".to_string(),
            hostname: None,
            mac_address: None,
            device_type: DeviceType::Unknown,
            device_category: "Unknown".to_string(),
            last_seen: Utc::now() - chrono::Duration::hours(48),
        };
        let result = scorer.score_device(&device).await.unwrap();
        // 100 - 10 (hostname) - 15 (mac) - 10 (unknown type) - 5 (stale last_seen) = 60
        assert_eq!(result.score, 60);
        assert_eq!(result.grade, Grade::D);
    }

    #[tokio::test]
    async fn penalties_stack_additively_before_clamping() {
        let (store, scorer) = scorer().await;
        sqlx::query(
            "INSERT INTO iot_vulnerabilities (device_ip, vulnerability_type, severity, description, recommendation)
             VALUES ('192.168.1.15', 'suspicious_connection', 'CRITICAL', 'x', 'y')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let device = DeviceRow {
            ip_address: "192.168.1.15".to_string(),
            hostname: None,
            mac_address: None,
            device_type: DeviceType::Unknown,
            device_category: "Unknown".to_string(),
            last_seen: Utc::now() - chrono::Duration::hours(48),
        };
        // 100 - 10 (hostname) - 15 (mac) - 10 (unknown type) - 40 (critical vuln) - 5 (stale) = 20
        let result = scorer.score_device(&device).await.unwrap();
        assert_eq!(result.score, 20);
    }
}
