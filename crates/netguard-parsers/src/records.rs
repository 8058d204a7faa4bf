//! Tagged-variant-per-tool record types (spec §9: "represent each tool's
//! row as a distinct record type"). Field names line up with the column
//! shapes in `netguard_store::schema`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub protocol: Option<String>,
    pub tcp_syn: bool,
    pub tcp_ack: bool,
    pub tcp_fin: bool,
    pub ttl: Option<u8>,
    pub length: Option<u32>,
    pub app_protocol: Option<String>,
    pub threat_score: f64,
    pub is_suspicious: bool,
    pub geo_country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TsharkRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub protocol: Option<String>,
    pub http_host: Option<String>,
    pub http_uri: Option<String>,
    pub dns_query: Option<String>,
    pub tls_sni: Option<String>,
    pub length: Option<u32>,
    pub threat_score: f64,
    pub is_suspicious: bool,
    pub geo_country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub src_port: Option<u16>,
    pub os_genre: Option<String>,
    pub os_details: Option<String>,
    pub link_type: Option<String>,
    pub distance: Option<i32>,
    pub uptime_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatchRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub protocol: Option<String>,
    pub matched_pattern: Option<String>,
    pub payload_excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub method: Option<String>,
    pub host: Option<String>,
    pub uri: Option<String>,
    pub user_agent: Option<String>,
    pub status_code: Option<u16>,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub protocol: Option<String>,
    pub state: Option<String>,
    pub duration_secs: Option<f64>,
    pub src_bytes: Option<i64>,
    pub dest_bytes: Option<i64>,
    pub total_packets: Option<i64>,
    pub threat_score: f64,
    pub is_suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandwidthRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub bytes_per_sec_tx: Option<f64>,
    pub bytes_per_sec_rx: Option<f64>,
    pub cumulative_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessBandwidthRecord {
    pub timestamp: DateTime<Utc>,
    pub process_name: Option<String>,
    pub pid: Option<i32>,
    pub sent_bytes_per_sec: Option<f64>,
    pub recv_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuricataRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub src_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_ip: Option<String>,
    pub dest_port: Option<u16>,
    pub proto: Option<String>,
    pub alert_signature: Option<String>,
    pub alert_category: Option<String>,
    pub alert_severity: Option<i32>,
    pub signature_id: Option<i64>,
    pub raw_json: String,
}
