//! DDL for timestamped per-collector tables and derived/state tables
//! (spec §3). Per-tool column shapes are grounded on the row fields the
//! original collectors actually emit
//! (`original_source/.../pcap_to_json.py`, `iftop_collector.py`).

/// The full inventory of collector tools (spec §4.3 table), used to drive
/// schema lookup and the table registry.
pub const TOOLS: &[&str] = &[
    "tcpdump",
    "tshark",
    "p0f",
    "ngrep",
    "httpry",
    "argus",
    "netsniff",
    "iftop",
    "nethogs",
];

/// Suricata EVE event categories (spec §4.3: "11 event types"), each with
/// its own timestamped table family `suricata_<eventtype>_...`.
pub const SURICATA_EVENT_TYPES: &[&str] = &[
    "alert",
    "dns",
    "http",
    "tls",
    "flow",
    "fileinfo",
    "smtp",
    "ssh",
    "stats",
    "netflow",
    "anomaly",
];

/// Returns the `CREATE TABLE IF NOT EXISTS` statement for `table` belonging
/// to `tool`, or `None` if `tool` is not recognized.
pub fn create_table_sql(tool: &str, table: &str) -> Option<String> {
    let columns = columns_for_tool(tool)?;
    Some(format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n{columns}\n  created_at DATETIME DEFAULT CURRENT_TIMESTAMP\n)"
    ))
}

fn columns_for_tool(tool: &str) -> Option<&'static str> {
    let base_tool = tool.strip_prefix("suricata_").map(|_| "suricata").unwrap_or(tool);
    Some(match base_tool {
        "tcpdump" | "netsniff" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  src_port INTEGER,
  dest_port INTEGER,
  protocol TEXT,
  tcp_syn INTEGER DEFAULT 0,
  tcp_ack INTEGER DEFAULT 0,
  tcp_fin INTEGER DEFAULT 0,
  ttl INTEGER,
  length INTEGER,
  app_protocol TEXT,
  threat_score REAL DEFAULT 0,
  is_suspicious INTEGER DEFAULT 0,
  geo_country TEXT,"
        }
        "tshark" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  src_port INTEGER,
  dest_port INTEGER,
  protocol TEXT,
  http_host TEXT,
  http_uri TEXT,
  dns_query TEXT,
  tls_sni TEXT,
  length INTEGER,
  threat_score REAL DEFAULT 0,
  is_suspicious INTEGER DEFAULT 0,
  geo_country TEXT,"
        }
        "p0f" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  src_port INTEGER,
  os_genre TEXT,
  os_details TEXT,
  link_type TEXT,
  distance INTEGER,
  uptime_seconds INTEGER,"
        }
        "ngrep" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  src_port INTEGER,
  dest_port INTEGER,
  protocol TEXT,
  matched_pattern TEXT,
  payload_excerpt TEXT,"
        }
        "httpry" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  method TEXT,
  host TEXT,
  uri TEXT,
  user_agent TEXT,
  status_code INTEGER,
  direction TEXT,"
        }
        "argus" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  src_port INTEGER,
  dest_port INTEGER,
  protocol TEXT,
  state TEXT,
  duration_secs REAL,
  src_bytes INTEGER,
  dest_bytes INTEGER,
  total_packets INTEGER,
  threat_score REAL DEFAULT 0,
  is_suspicious INTEGER DEFAULT 0,"
        }
        "iftop" => {
            "  timestamp DATETIME NOT NULL,
  src_ip TEXT,
  dest_ip TEXT,
  bytes_per_sec_tx REAL,
  bytes_per_sec_rx REAL,
  cumulative_bytes INTEGER,"
        }
        "nethogs" => {
            "  timestamp DATETIME NOT NULL,
  process_name TEXT,
  pid INTEGER,
  sent_bytes_per_sec REAL,
  recv_bytes_per_sec REAL,"
        }
        "suricata" => {
            "  timestamp DATETIME NOT NULL,
  event_type TEXT NOT NULL,
  src_ip TEXT,
  src_port INTEGER,
  dest_ip TEXT,
  dest_port INTEGER,
  proto TEXT,
  alert_signature TEXT,
  alert_category TEXT,
  alert_severity INTEGER,
  signature_id INTEGER,
  raw_json TEXT,"
        }
        _ => return None,
    })
}

/// DDL for the derived/state tables (spec §3-B). Idempotent; run once at
/// supervisor startup.
pub const DEVICES_TABLE: &str = "CREATE TABLE IF NOT EXISTS devices (
    ip_address TEXT PRIMARY KEY,
    mac_address TEXT,
    hostname TEXT,
    vendor TEXT,
    device_type TEXT NOT NULL DEFAULT 'Unknown',
    device_category TEXT NOT NULL DEFAULT 'Unknown',
    security_score INTEGER NOT NULL DEFAULT 100,
    is_trusted INTEGER NOT NULL DEFAULT 0,
    first_seen DATETIME NOT NULL,
    last_seen DATETIME NOT NULL,
    total_packets INTEGER NOT NULL DEFAULT 0,
    total_bytes INTEGER NOT NULL DEFAULT 0
)";

pub const VULNERABILITIES_TABLE: &str = "CREATE TABLE IF NOT EXISTS iot_vulnerabilities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_ip TEXT NOT NULL,
    vulnerability_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    description TEXT NOT NULL,
    recommendation TEXT NOT NULL,
    detected_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at DATETIME
)";

pub const ALERTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS security_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id TEXT UNIQUE NOT NULL,
    severity TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    source_ip TEXT,
    affected_devices TEXT,
    threat_indicators TEXT,
    remediation_steps TEXT,
    auto_remediation_available INTEGER NOT NULL DEFAULT 0,
    auto_remediation_command TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    resolved_at DATETIME,
    resolved_by TEXT,
    recurrence_count INTEGER NOT NULL DEFAULT 1,
    last_seen DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

pub const ALERT_HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS alert_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id TEXT NOT NULL,
    action TEXT NOT NULL,
    action_by TEXT,
    notes TEXT,
    timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

pub const ALERT_RULES_TABLE: &str = "CREATE TABLE IF NOT EXISTS alert_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_name TEXT UNIQUE NOT NULL,
    rule_type TEXT NOT NULL,
    condition TEXT NOT NULL,
    threshold_value REAL,
    severity TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    auto_remediation INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

pub const AI_ANALYSIS_TABLE: &str = "CREATE TABLE IF NOT EXISTS ai_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    threat_level TEXT,
    network_health_score INTEGER,
    summary TEXT,
    threats_json TEXT,
    insights_json TEXT,
    devices_json TEXT,
    http_json TEXT,
    recommendations_json TEXT,
    provider_used TEXT,
    success INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    raw_response TEXT
)";

pub const POSITIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS collector_positions (
    tool TEXT NOT NULL,
    source_id TEXT NOT NULL,
    byte_offset INTEGER NOT NULL DEFAULT 0,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (tool, source_id)
)";

/// All derived-state DDL statements, applied in order at bootstrap.
pub fn derived_state_ddl() -> Vec<&'static str> {
    vec![
        DEVICES_TABLE,
        VULNERABILITIES_TABLE,
        ALERTS_TABLE,
        ALERT_HISTORY_TABLE,
        ALERT_RULES_TABLE,
        AI_ANALYSIS_TABLE,
        POSITIONS_TABLE,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_tool_has_columns() {
        for tool in TOOLS {
            assert!(columns_for_tool(tool).is_some(), "missing schema for {tool}");
        }
        for event_type in SURICATA_EVENT_TYPES {
            let tool = format!("suricata_{event_type}");
            assert!(columns_for_tool(&tool).is_some());
        }
    }

    #[test]
    fn unknown_tool_has_no_schema() {
        assert!(create_table_sql("bogus", "bogus_20250101_000000").is_none());
    }
}
