//! `argus` parser (spec §4.2): capture → analyse → `ra` workaround. This
//! module is the pure third step: projecting `ra`'s whitespace-delimited
//! flow report into `FlowRecord`s. The capture and `ra` invocation steps
//! are I/O, owned by the collector.

use netguard_common::net::is_benign_by_default;
use netguard_common::Result;

use crate::heuristics::{self, TrafficSignals};
use crate::records::FlowRecord;

/// Parses `ra -n -s stime,proto,saddr,sport,dir,daddr,dport,state,dur,sbytes,dbytes,pkts`
/// style output, one flow per line, skipping the header.
pub fn parse(ra_output: &str) -> Result<Vec<FlowRecord>> {
    let mut records = Vec::new();
    for line in ra_output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("StartTime") {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 12 {
            continue;
        }
        let dest_ip = fields[6].trim().to_string();
        let dest_port: Option<u16> = fields[5].trim().parse().ok();
        let dest_addr = dest_ip.parse().ok();

        let benign = dest_addr.map(is_benign_by_default).unwrap_or(false);
        let (threat_score, is_suspicious) = if benign {
            (0.0, false)
        } else {
            heuristics::score(TrafficSignals {
                dest_ip: dest_addr,
                dest_port,
                ttl: None,
                tcp_syn: false,
                tcp_ack: false,
            })
        };

        records.push(FlowRecord {
            timestamp: chrono::Utc::now(),
            src_ip: Some(fields[2].trim().to_string()),
            dest_ip: Some(dest_ip),
            src_port: fields[3].trim().parse().ok(),
            dest_port,
            protocol: Some(fields[1].trim().to_string()),
            state: Some(fields[7].trim().to_string()),
            duration_secs: fields[8].trim().parse().ok(),
            src_bytes: fields[9].trim().parse().ok(),
            dest_bytes: fields[10].trim().parse().ok(),
            total_packets: fields[11].trim().parse().ok(),
            threat_score,
            is_suspicious,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "StartTime,Proto,SrcAddr,Sport,Dir,DstAddr,Dport,State,Dur,SrcBytes,DstBytes,TotPkts\n\
2025/01/02 03:04:05,tcp,192.168.1.5,51000,->,8.8.8.8,443,FIN,1.25,1200,4800,10\n";

    #[test]
    fn parses_one_flow_row() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dest_port, Some(443));
        assert_eq!(records[0].total_packets, Some(10));
    }

    #[test]
    fn header_only_yields_no_rows() {
        let records = parse("StartTime,Proto,SrcAddr,Sport,Dir,DstAddr,Dport,State,Dur,SrcBytes,DstBytes,TotPkts\n").unwrap();
        assert!(records.is_empty());
    }
}
