//! Suricata EVE JSON parser (spec §4.2): one JSON object per line,
//! dispatched by `event_type` to one of 11 categories
//! (`netguard_store::schema::SURICATA_EVENT_TYPES`).

use chrono::{DateTime, Utc};
use netguard_common::Result;
use serde_json::Value;

use crate::records::SuricataRecord;

/// Parses complete JSON lines from `raw[last_position..]`. A trailing line
/// without a terminating `\n` is left unconsumed (the writer may still be
/// mid-write).
pub fn parse(raw: &str, last_position: usize) -> Result<(Vec<SuricataRecord>, usize)> {
    let slice = raw.get(last_position..).unwrap_or("");
    let mut records = Vec::new();
    let mut consumed = 0usize;

    for line in slice.split_inclusive('\n') {
        if !line.ends_with('\n') {
            break;
        }
        consumed += line.len();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                if let Some(record) = project(&value, trimmed) {
                    records.push(record);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed suricata EVE line");
            }
        }
    }

    Ok((records, last_position + consumed))
}

fn project(value: &Value, raw_line: &str) -> Option<SuricataRecord> {
    let event_type = value.get("event_type")?.as_str()?.to_string();
    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let alert = value.get("alert");

    Some(SuricataRecord {
        timestamp,
        event_type,
        src_ip: value.get("src_ip").and_then(Value::as_str).map(str::to_string),
        src_port: value.get("src_port").and_then(Value::as_u64).map(|p| p as u16),
        dest_ip: value.get("dest_ip").and_then(Value::as_str).map(str::to_string),
        dest_port: value.get("dest_port").and_then(Value::as_u64).map(|p| p as u16),
        proto: value.get("proto").and_then(Value::as_str).map(str::to_string),
        alert_signature: alert.and_then(|a| a.get("signature")).and_then(Value::as_str).map(str::to_string),
        alert_category: alert.and_then(|a| a.get("category")).and_then(Value::as_str).map(str::to_string),
        alert_severity: alert.and_then(|a| a.get("severity")).and_then(Value::as_i64).map(|s| s as i32),
        signature_id: alert.and_then(|a| a.get("signature_id")).and_then(Value::as_i64),
        raw_json: raw_line.to_string(),
    })
}

/// Groups already-parsed records by `event_type`, mirroring the 11-table
/// fan-out a collector performs when flushing a batch.
pub fn group_by_event_type(records: Vec<SuricataRecord>) -> std::collections::HashMap<String, Vec<SuricataRecord>> {
    let mut grouped: std::collections::HashMap<String, Vec<SuricataRecord>> = std::collections::HashMap::new();
    for record in records {
        grouped.entry(record.event_type.clone()).or_default().push(record);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERT_LINE: &str = r#"{"timestamp":"2025-01-02T03:04:05.000000+0000","event_type":"alert","src_ip":"192.168.1.5","src_port":51000,"dest_ip":"8.8.8.8","dest_port":443,"proto":"TCP","alert":{"signature":"ET SCAN Possible Nmap","category":"Attempted Information Leak","severity":2,"signature_id":2001219}}
"#;

    #[test]
    fn parses_alert_event() {
        let (records, new_pos) = parse(ALERT_LINE, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "alert");
        assert_eq!(records[0].alert_signature.as_deref(), Some("ET SCAN Possible Nmap"));
        assert_eq!(new_pos, ALERT_LINE.len());
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let input = "not json\n";
        let (records, new_pos) = parse(input, 0).unwrap();
        assert!(records.is_empty());
        assert_eq!(new_pos, input.len());
    }

    #[test]
    fn groups_by_event_type() {
        let (records, _) = parse(ALERT_LINE, 0).unwrap();
        let grouped = group_by_event_type(records);
        assert!(grouped.contains_key("alert"));
    }
}
