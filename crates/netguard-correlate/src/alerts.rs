//! Alert Engine (spec C9 / §4.8): two-phase detection-then-persistence
//! cycle over `alert_rules`, `security_alerts` and `alert_history`.
//! Grounded on `original_source/.../enhanced_alert_system.py`
//! (`load_alert_rules`, `create_alert`, `resolve_alert`,
//! `execute_auto_remediation`, `mark_false_positive`), with rule names and
//! default thresholds carried over verbatim.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use netguard_common::net::is_private;
use netguard_common::{Error, Result, Severity};
use sqlx::SqlitePool;
use tokio::process::Command;
use tracing::{info, warn};

use netguard_store::TableRegistry;

const AUTO_REMEDIATION_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS queries from a single source within one scan window, above which
/// `detect_dns_tunneling` flags the source regardless of query length.
/// Not specified upstream; chosen as a conservative per-cycle count for a
/// home/small-network deployment.
const DNS_QUERY_RATE_THRESHOLD: i64 = 50;

/// Default rule set seeded on first run, matching the original's
/// `load_alert_rules` defaults exactly.
const DEFAULT_RULES: &[(&str, &str, &str, Option<f64>, &str, bool)] = &[
    (
        "Port_Scan_Detection",
        "behavioral",
        "connection_attempts > threshold in timeframe",
        Some(20.0),
        "HIGH",
        true,
    ),
    (
        "Brute_Force_Attack",
        "authentication",
        "failed_login_attempts > threshold",
        Some(5.0),
        "CRITICAL",
        true,
    ),
    (
        "Unusual_Outbound_Traffic",
        "traffic",
        "outbound_bytes > threshold",
        Some(1_000_000_000.0),
        "MEDIUM",
        false,
    ),
    (
        "IoT_Device_Compromise",
        "iot",
        "iot_unexpected_connection",
        None,
        "CRITICAL",
        true,
    ),
    (
        "Malware_C2_Communication",
        "malware",
        "known_c2_ip_contacted",
        None,
        "CRITICAL",
        true,
    ),
    (
        "DNS_Tunneling",
        "exfiltration",
        "dns_query_length > threshold or dns_query_rate > threshold",
        Some(63.0),
        "HIGH",
        false,
    ),
];

#[derive(Debug, Clone)]
struct AlertRule {
    name: String,
    threshold: Option<f64>,
    severity: Severity,
    auto_remediation: bool,
}

#[derive(Debug, Clone)]
pub struct DraftAlert {
    pub severity: Severity,
    pub alert_type: String,
    pub title: String,
    pub description: String,
    pub source_ip: Option<String>,
    pub affected_devices: Vec<String>,
    pub indicators: Vec<String>,
    pub recommendations: Vec<String>,
    pub auto_remediation_command: Option<String>,
}

pub struct AlertEngine {
    pool: SqlitePool,
    table_registry: TableRegistry,
    c2_indicators: Vec<String>,
}

impl AlertEngine {
    pub fn new(pool: SqlitePool, table_registry: TableRegistry, c2_indicators: Vec<String>) -> Self {
        Self { pool, table_registry, c2_indicators }
    }

    /// Inserts the default rule rows if `alert_rules` is empty. Idempotent.
    pub async fn ensure_default_rules(&self) -> Result<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alert_rules")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
        if count > 0 {
            return Ok(());
        }
        for (name, rule_type, condition, threshold, severity, auto_remediation) in DEFAULT_RULES {
            sqlx::query(
                "INSERT INTO alert_rules (rule_name, rule_type, condition, threshold_value, severity, enabled, auto_remediation)
                 VALUES (?, ?, ?, ?, ?, 1, ?)",
            )
            .bind(*name)
            .bind(*rule_type)
            .bind(*condition)
            .bind(*threshold)
            .bind(*severity)
            .bind(*auto_remediation)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
        }
        Ok(())
    }

    async fn enabled_rules(&self) -> Result<HashMap<String, AlertRule>> {
        let rows: Vec<(String, Option<f64>, String, bool)> =
            sqlx::query_as("SELECT rule_name, threshold_value, severity, auto_remediation FROM alert_rules WHERE enabled = 1")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::Correlation(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|(name, threshold, severity, auto_remediation)| {
                let severity = match severity.as_str() {
                    "CRITICAL" => Severity::Critical,
                    "HIGH" => Severity::High,
                    "MEDIUM" => Severity::Medium,
                    _ => Severity::Low,
                };
                (name.clone(), AlertRule { name, threshold, severity, auto_remediation })
            })
            .collect())
    }

    /// Runs one full detection + persistence cycle, returning the number of
    /// drafts that resulted in a new alert (as opposed to a recurrence bump).
    pub async fn run_cycle(&self) -> Result<usize> {
        self.ensure_default_rules().await?;
        let rules = self.enabled_rules().await?;

        let mut drafts = Vec::new();
        if let Some(rule) = rules.get("Port_Scan_Detection") {
            drafts.extend(self.detect_port_scan(rule).await?);
        }
        if let Some(rule) = rules.get("Brute_Force_Attack") {
            drafts.extend(self.detect_brute_force(rule).await?);
        }
        if let Some(rule) = rules.get("Unusual_Outbound_Traffic") {
            drafts.extend(self.detect_outbound_bytes(rule).await?);
        }
        if let Some(rule) = rules.get("IoT_Device_Compromise") {
            drafts.extend(self.detect_iot_compromise(rule).await?);
        }
        if let Some(rule) = rules.get("Malware_C2_Communication") {
            drafts.extend(self.detect_malware_c2(rule).await?);
        }
        if let Some(rule) = rules.get("DNS_Tunneling") {
            drafts.extend(self.detect_dns_tunneling(rule).await?);
        }

        let mut created = 0;
        for draft in drafts {
            if self.persist(draft).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn detect_port_scan(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        let Some(table) = self.table_registry.latest("tcpdump").await? else {
            return Ok(Vec::new());
        };
        let threshold = rule.threshold.unwrap_or(20.0) as i64;
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT src_ip, COUNT(DISTINCT dest_port) AS n FROM \"{table}\"
             WHERE src_ip IS NOT NULL AND dest_port IS NOT NULL
             GROUP BY src_ip HAVING n > ?"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(src_ip, n)| DraftAlert {
                severity: rule.severity,
                alert_type: "port_scan".to_string(),
                title: format!("Possible port scan from {src_ip}"),
                description: format!("{src_ip} touched {n} distinct destination ports, above the {threshold} threshold"),
                source_ip: Some(src_ip.clone()),
                affected_devices: vec![src_ip.clone()],
                indicators: vec![format!("{n} distinct destination ports")],
                recommendations: vec!["Review the source host for scanning tools or compromise.".to_string()],
                auto_remediation_command: rule.auto_remediation.then(|| format!("iptables -A INPUT -s {src_ip} -j DROP")),
            })
            .collect())
    }

    async fn detect_brute_force(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        let Some(table) = self.table_registry.latest("suricata_alert").await? else {
            return Ok(Vec::new());
        };
        let threshold = rule.threshold.unwrap_or(5.0) as i64;
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT src_ip, COUNT(*) AS n FROM \"{table}\"
             WHERE src_ip IS NOT NULL
               AND (alert_category LIKE '%Login%' OR alert_signature LIKE '%brute%' OR alert_signature LIKE '%auth%')
             GROUP BY src_ip HAVING n > ?"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(src_ip, n)| DraftAlert {
                severity: rule.severity,
                alert_type: "brute_force".to_string(),
                title: format!("Brute-force attempts from {src_ip}"),
                description: format!("{src_ip} generated {n} authentication-failure events"),
                source_ip: Some(src_ip.clone()),
                affected_devices: vec![src_ip.clone()],
                indicators: vec![format!("{n} failed auth events")],
                recommendations: vec!["Block the source and rotate any exposed credentials.".to_string()],
                auto_remediation_command: rule.auto_remediation.then(|| format!("iptables -A INPUT -s {src_ip} -j DROP")),
            })
            .collect())
    }

    async fn detect_outbound_bytes(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        let Some(table) = self.table_registry.latest("tcpdump").await? else {
            return Ok(Vec::new());
        };
        let threshold = rule.threshold.unwrap_or(1_000_000_000.0) as i64;
        let rows: Vec<(Option<String>, Option<String>, Option<i64>)> = sqlx::query_as(&format!(
            "SELECT src_ip, dest_ip, length FROM \"{table}\" WHERE src_ip IS NOT NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        let mut totals: HashMap<String, i64> = HashMap::new();
        for (src_ip, dest_ip, length) in rows {
            let Some(src_ip) = src_ip else { continue };
            let Ok(src) = src_ip.parse() else { continue };
            if !is_private(src) {
                continue;
            }
            let external = dest_ip.as_deref().and_then(|d| d.parse().ok()).map(|d| !is_private(d)).unwrap_or(false);
            if !external {
                continue;
            }
            *totals.entry(src_ip).or_insert(0) += length.unwrap_or(0);
        }

        Ok(totals
            .into_iter()
            .filter(|(_, bytes)| *bytes > threshold)
            .map(|(src_ip, bytes)| DraftAlert {
                severity: rule.severity,
                alert_type: "outbound_bytes".to_string(),
                title: format!("Unusual outbound traffic from {src_ip}"),
                description: format!("{src_ip} sent {bytes} bytes to external hosts, above the {threshold} byte threshold"),
                source_ip: Some(src_ip.clone()),
                affected_devices: vec![src_ip.clone()],
                indicators: vec![format!("{bytes} bytes outbound")],
                recommendations: vec!["Investigate what process is generating this traffic.".to_string()],
                auto_remediation_command: None,
            })
            .collect())
    }

    async fn detect_iot_compromise(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT d.ip_address, COUNT(v.id) AS n
             FROM devices d JOIN iot_vulnerabilities v ON v.device_ip = d.ip_address
             WHERE d.device_type = 'IoT' AND v.resolved = 0 AND v.severity IN ('CRITICAL', 'HIGH')
             GROUP BY d.ip_address HAVING n >= 2",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(ip, n)| DraftAlert {
                severity: rule.severity,
                alert_type: "iot_compromise".to_string(),
                title: format!("Possible IoT device compromise: {ip}"),
                description: format!("{ip} has {n} unresolved CRITICAL/HIGH vulnerabilities"),
                source_ip: Some(ip.clone()),
                affected_devices: vec![ip.clone()],
                indicators: vec![format!("{n} unresolved high-severity vulnerabilities")],
                recommendations: vec!["Isolate the device pending investigation.".to_string()],
                auto_remediation_command: rule.auto_remediation.then(|| format!("iptables -A FORWARD -s {ip} -j DROP")),
            })
            .collect())
    }

    async fn detect_malware_c2(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        if self.c2_indicators.is_empty() {
            return Ok(Vec::new());
        }
        let Some(table) = self.table_registry.latest("tcpdump").await? else {
            return Ok(Vec::new());
        };
        let placeholders = self.c2_indicators.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT DISTINCT src_ip, dest_ip FROM \"{table}\" WHERE dest_ip IN ({placeholders})");
        let mut query = sqlx::query_as(&sql);
        for ip in &self.c2_indicators {
            query = query.bind(ip.as_str());
        }
        let rows: Vec<(Option<String>, String)> = query.fetch_all(&self.pool).await.map_err(|e| Error::Correlation(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(src_ip, dest_ip)| {
                let src_ip = src_ip?;
                Some(DraftAlert {
                    severity: rule.severity,
                    alert_type: "malware_c2".to_string(),
                    title: format!("{src_ip} contacted a known C2 indicator"),
                    description: format!("{src_ip} connected to {dest_ip}, which is on the configured threat-indicator list"),
                    source_ip: Some(src_ip.clone()),
                    affected_devices: vec![src_ip.clone()],
                    indicators: vec![dest_ip.clone()],
                    recommendations: vec!["Isolate the device and rotate any credentials it held.".to_string()],
                    auto_remediation_command: rule.auto_remediation.then(|| format!("iptables -A FORWARD -s {src_ip} -j DROP")),
                })
            })
            .collect())
    }

    async fn detect_dns_tunneling(&self, rule: &AlertRule) -> Result<Vec<DraftAlert>> {
        let Some(table) = self.table_registry.latest("tshark").await? else {
            return Ok(Vec::new());
        };
        let threshold = rule.threshold.unwrap_or(63.0) as i64;
        let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(&format!(
            "SELECT src_ip, dns_query FROM \"{table}\" WHERE dns_query IS NOT NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        struct PerSrc {
            longest: (String, usize),
            count: i64,
        }

        let mut per_src: HashMap<String, PerSrc> = HashMap::new();
        for (src_ip, dns_query) in rows {
            let (Some(src_ip), Some(query)) = (src_ip, dns_query) else { continue };
            let len = query.len();
            let entry = per_src.entry(src_ip).or_insert_with(|| PerSrc { longest: (query.clone(), 0), count: 0 });
            entry.count += 1;
            if len > entry.longest.1 {
                entry.longest = (query, len);
            }
        }

        Ok(per_src
            .into_iter()
            .filter_map(|(src_ip, PerSrc { longest: (query, len), count })| {
                let length_exceeded = (len as i64) > threshold;
                let rate_exceeded = count > DNS_QUERY_RATE_THRESHOLD;
                if !length_exceeded && !rate_exceeded {
                    return None;
                }
                let description = match (length_exceeded, rate_exceeded) {
                    (true, true) => format!(
                        "{src_ip} issued a DNS query {len} characters long (over {threshold}) and {count} DNS queries this cycle (over {DNS_QUERY_RATE_THRESHOLD})"
                    ),
                    (true, false) => format!(
                        "{src_ip} issued a DNS query {len} characters long, above the {threshold}-character threshold"
                    ),
                    (false, true) => format!(
                        "{src_ip} issued {count} DNS queries this cycle, above the {DNS_QUERY_RATE_THRESHOLD}-query threshold"
                    ),
                    (false, false) => unreachable!(),
                };
                Some(DraftAlert {
                    severity: rule.severity,
                    alert_type: "dns_tunneling".to_string(),
                    title: format!("Possible DNS tunnelling from {src_ip}"),
                    description,
                    source_ip: Some(src_ip.clone()),
                    affected_devices: vec![src_ip.clone()],
                    indicators: vec![query],
                    recommendations: vec!["Inspect the device for DNS-tunnelling malware.".to_string()],
                    auto_remediation_command: None,
                })
            })
            .collect())
    }

    /// Phase 2: dedup against invariant A1, else insert + `created` history
    /// row. Returns `true` if a new alert row was inserted.
    async fn persist(&self, draft: DraftAlert) -> Result<bool> {
        let existing: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT id, alert_id, recurrence_count FROM security_alerts
             WHERE alert_type = ? AND source_ip IS ? AND status = 'active'
               AND created_at > datetime('now', '-1 hour')",
        )
        .bind(&draft.alert_type)
        .bind(&draft.source_ip)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        if let Some((id, alert_id, recurrence_count)) = existing {
            sqlx::query(
                "UPDATE security_alerts SET recurrence_count = recurrence_count + 1,
                 last_seen = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
            self.append_history(
                &alert_id,
                "recurrence",
                "system",
                &format!("Recurrence #{} of {}", recurrence_count + 1, draft.title),
            )
            .await?;
            return Ok(false);
        }

        let alert_id = format!(
            "ALERT-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            draft.alert_type.chars().take(4).collect::<String>().to_uppercase()
        );

        sqlx::query(
            "INSERT INTO security_alerts
               (alert_id, severity, alert_type, title, description, source_ip,
                affected_devices, threat_indicators, remediation_steps,
                auto_remediation_available, auto_remediation_command)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert_id)
        .bind(draft.severity.as_str())
        .bind(&draft.alert_type)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.source_ip)
        .bind(serde_json::to_string(&draft.affected_devices).ok())
        .bind(serde_json::to_string(&draft.indicators).ok())
        .bind(serde_json::to_string(&draft.recommendations).ok())
        .bind(draft.auto_remediation_command.is_some())
        .bind(&draft.auto_remediation_command)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;

        self.append_history(&alert_id, "created", "system", &format!("Alert created: {}", draft.title)).await?;
        warn!(alert_id = %alert_id, severity = %draft.severity, "new alert");
        Ok(true)
    }

    async fn append_history(&self, alert_id: &str, action: &str, action_by: &str, notes: &str) -> Result<()> {
        sqlx::query("INSERT INTO alert_history (alert_id, action, action_by, notes) VALUES (?, ?, ?, ?)")
            .bind(alert_id)
            .bind(action)
            .bind(action_by)
            .bind(notes)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
        Ok(())
    }

    pub async fn resolve(&self, alert_id: &str, resolved_by: &str, notes: Option<&str>) -> Result<()> {
        sqlx::query(
            "UPDATE security_alerts SET status = 'resolved', resolved_at = CURRENT_TIMESTAMP,
             resolved_by = ?, updated_at = CURRENT_TIMESTAMP WHERE alert_id = ?",
        )
        .bind(resolved_by)
        .bind(alert_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Correlation(e.to_string()))?;
        self.append_history(alert_id, "resolved", resolved_by, notes.unwrap_or("Alert resolved")).await
    }

    pub async fn mark_false_positive(&self, alert_id: &str, marked_by: &str) -> Result<()> {
        sqlx::query("UPDATE security_alerts SET status = 'false_positive', updated_at = CURRENT_TIMESTAMP WHERE alert_id = ?")
            .bind(alert_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
        self.append_history(alert_id, "marked_false_positive", marked_by, "Alert marked as false positive").await
    }

    /// Executes the alert's `auto_remediation_command` with a 30s timeout.
    /// On rc=0 the alert transitions to resolved; otherwise it stays active.
    pub async fn auto_remediate(&self, alert_id: &str) -> Result<bool> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT auto_remediation_command FROM security_alerts WHERE alert_id = ? AND auto_remediation_available = 1")
                .bind(alert_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Correlation(e.to_string()))?;

        let Some(Some(command)) = row else {
            return Ok(false);
        };

        let output = tokio::time::timeout(
            AUTO_REMEDIATION_TIMEOUT,
            Command::new("sh").arg("-c").arg(&command).stdout(Stdio::piped()).stderr(Stdio::piped()).output(),
        )
        .await;

        let (success, note) = match output {
            Ok(Ok(out)) => {
                let success = out.status.success();
                let text = if success {
                    String::from_utf8_lossy(&out.stdout).to_string()
                } else {
                    String::from_utf8_lossy(&out.stderr).to_string()
                };
                (success, format!("Command executed: {command}\nResult: {text}"))
            }
            Ok(Err(e)) => (false, format!("Command executed: {command}\nResult: {e}")),
            Err(_) => (false, format!("Command executed: {command}\nResult: timed out after 30s")),
        };

        self.append_history(alert_id, if success { "auto_remediation" } else { "auto_remediation_failed" }, "system", &note).await?;
        if success {
            sqlx::query(
                "UPDATE security_alerts SET status = 'resolved', resolved_at = CURRENT_TIMESTAMP,
                 resolved_by = 'auto_remediation', updated_at = CURRENT_TIMESTAMP WHERE alert_id = ?",
            )
            .bind(alert_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Correlation(e.to_string()))?;
            info!(alert_id, "auto-remediation successful");
        } else {
            warn!(alert_id, "auto-remediation failed, alert remains active");
        }
        Ok(success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netguard_store::Store;

    async fn engine() -> (Store, AlertEngine) {
        let store = Store::open_in_memory().await.unwrap();
        let engine = AlertEngine::new(store.pool().clone(), store.registry(), Vec::new());
        (store, engine)
    }

    #[tokio::test]
    async fn ensure_default_rules_seeds_exactly_once() {
        let (store, engine) = engine().await;
        engine.ensure_default_rules().await.unwrap();
        engine.ensure_default_rules().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alert_rules").fetch_one(store.pool()).await.unwrap();
        assert_eq!(count, DEFAULT_RULES.len() as i64);
    }

    #[tokio::test]
    async fn iot_compromise_requires_at_least_two_high_severity_vulns() {
        let (store, engine) = engine().await;
        sqlx::query(
            "INSERT INTO devices (ip_address, device_type, first_seen, last_seen) VALUES ('192.168.1.40', 'IoT', datetime('now'), datetime('now'))",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO iot_vulnerabilities (device_ip, vulnerability_type, severity, description, recommendation)
             VALUES ('192.168.1.40', 'open_port', 'HIGH', 'x', 'y'),
                    ('192.168.1.40', 'suspicious_connection', 'CRITICAL', 'x', 'y')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let rule = AlertRule { name: "IoT_Device_Compromise".to_string(), threshold: None, severity: Severity::Critical, auto_remediation: true };
        let drafts = engine.detect_iot_compromise(&rule).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_ip.as_deref(), Some("192.168.1.40"));
    }

    #[tokio::test]
    async fn port_scan_does_not_fire_when_count_exactly_equals_threshold() {
        let (store, engine) = engine().await;
        let table = store.registry().create("tcpdump").await.unwrap();
        for port in 0..20u32 {
            sqlx::query(&format!(
                "INSERT INTO \"{table}\" (timestamp, src_ip, dest_port) VALUES (datetime('now'), '192.168.1.99', ?)"
            ))
            .bind(port as i64)
            .execute(store.pool())
            .await
            .unwrap();
        }
        let rule = AlertRule { name: "Port_Scan_Detection".to_string(), threshold: Some(20.0), severity: Severity::High, auto_remediation: false };
        let drafts = engine.detect_port_scan(&rule).await.unwrap();
        assert!(drafts.is_empty(), "exactly-at-threshold must not fire (strict >)");
    }

    #[tokio::test]
    async fn persist_dedups_within_the_hour_and_bumps_recurrence() {
        let (store, engine) = engine().await;
        let draft = || DraftAlert {
            severity: Severity::High,
            alert_type: "port_scan".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            source_ip: Some("192.168.1.41".to_string()),
            affected_devices: vec!["192.168.1.41".to_string()],
            indicators: vec![],
            recommendations: vec![],
            auto_remediation_command: None,
        };
        assert!(engine.persist(draft()).await.unwrap());
        assert!(!engine.persist(draft()).await.unwrap());

        let (count, recurrence): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), MAX(recurrence_count) FROM security_alerts WHERE alert_type = 'port_scan'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert_eq!(recurrence, 2);
    }

    #[tokio::test]
    async fn resolve_sets_resolved_at_satisfying_invariant_a2() {
        let (store, engine) = engine().await;
        let draft = DraftAlert {
            severity: Severity::Medium,
            alert_type: "outbound_bytes".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            source_ip: Some("192.168.1.42".to_string()),
            affected_devices: vec![],
            indicators: vec![],
            recommendations: vec![],
            auto_remediation_command: None,
        };
        engine.persist(draft).await.unwrap();
        let (alert_id,): (String,) = sqlx::query_as("SELECT alert_id FROM security_alerts WHERE alert_type = 'outbound_bytes'")
            .fetch_one(store.pool())
            .await
            .unwrap();

        engine.resolve(&alert_id, "user", None).await.unwrap();
        let (status, resolved_at): (String, Option<String>) =
            sqlx::query_as("SELECT status, resolved_at FROM security_alerts WHERE alert_id = ?")
                .bind(&alert_id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(status, "resolved");
        assert!(resolved_at.is_some());
    }

    #[tokio::test]
    async fn auto_remediation_success_resolves_the_alert() {
        let (store, engine) = engine().await;
        let draft = DraftAlert {
            severity: Severity::High,
            alert_type: "port_scan".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            source_ip: Some("192.168.1.50".to_string()),
            affected_devices: vec![],
            indicators: vec![],
            recommendations: vec![],
            auto_remediation_command: Some("exit 0".to_string()),
        };
        engine.persist(draft).await.unwrap();
        let (alert_id,): (String,) = sqlx::query_as("SELECT alert_id FROM security_alerts WHERE source_ip = '192.168.1.50'")
            .fetch_one(store.pool())
            .await
            .unwrap();

        assert!(engine.auto_remediate(&alert_id).await.unwrap());

        let (status, resolved_by): (String, Option<String>) =
            sqlx::query_as("SELECT status, resolved_by FROM security_alerts WHERE alert_id = ?")
                .bind(&alert_id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(status, "resolved");
        assert_eq!(resolved_by.as_deref(), Some("auto_remediation"));

        let (action,): (String,) = sqlx::query_as("SELECT action FROM alert_history WHERE alert_id = ? ORDER BY id DESC LIMIT 1")
            .bind(&alert_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(action, "auto_remediation");
    }

    #[tokio::test]
    async fn auto_remediation_failure_leaves_alert_active() {
        let (store, engine) = engine().await;
        let draft = DraftAlert {
            severity: Severity::High,
            alert_type: "port_scan".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            source_ip: Some("192.168.1.51".to_string()),
            affected_devices: vec![],
            indicators: vec![],
            recommendations: vec![],
            auto_remediation_command: Some("exit 1".to_string()),
        };
        engine.persist(draft).await.unwrap();
        let (alert_id,): (String,) = sqlx::query_as("SELECT alert_id FROM security_alerts WHERE source_ip = '192.168.1.51'")
            .fetch_one(store.pool())
            .await
            .unwrap();

        assert!(!engine.auto_remediate(&alert_id).await.unwrap());

        let (status,): (String,) = sqlx::query_as("SELECT status FROM security_alerts WHERE alert_id = ?")
            .bind(&alert_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(status, "active");

        let (action,): (String,) = sqlx::query_as("SELECT action FROM alert_history WHERE alert_id = ? ORDER BY id DESC LIMIT 1")
            .bind(&alert_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(action, "auto_remediation_failed");
    }
}
