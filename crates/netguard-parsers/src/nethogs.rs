//! `nethogs` parser (spec §4.2): short bounded run (`nethogs -t`), per-
//! process bandwidth table. `nethogs -t` emits tab-delimited lines of
//! `program/pid/uid\tsent_KB_sec\treceived_KB_sec`.

use chrono::Utc;
use netguard_common::Result;

use crate::records::ProcessBandwidthRecord;

pub fn parse(output: &str) -> Result<Vec<ProcessBandwidthRecord>> {
    let mut records = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Refreshing") {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            continue;
        }
        let mut parts = fields[0].rsplitn(3, '/');
        let _uid = parts.next();
        let pid = parts.next().and_then(|s| s.parse().ok());
        let process_name = parts.next().unwrap_or(fields[0]).to_string();

        records.push(ProcessBandwidthRecord {
            timestamp: Utc::now(),
            process_name: Some(process_name),
            pid,
            sent_bytes_per_sec: fields[1].trim().parse::<f64>().ok().map(|kb| kb * 1000.0),
            recv_bytes_per_sec: fields[2].trim().parse::<f64>().ok().map(|kb| kb * 1000.0),
        });
    }
    Ok(records)
}
