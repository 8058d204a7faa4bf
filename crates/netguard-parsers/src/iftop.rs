//! `iftop` parser (spec §4.2): short bounded run (`iftop -t -n -P -s 5`),
//! text table output. Grounded on `original_source/.../iftop_collector.py`
//! (`parse_iftop_output`): lines split on `=>`/`<=`, `host:port` pairs, and
//! up to three rate columns carrying a `K`/`M`/`G` suffix.

use chrono::Utc;
use netguard_common::Result;

use crate::records::BandwidthRecord;

fn parse_rate(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let (digits, multiplier) = if let Some(prefix) = token.strip_suffix("Kb") {
        (prefix, 1_000.0)
    } else if let Some(prefix) = token.strip_suffix("Mb") {
        (prefix, 1_000_000.0)
    } else if let Some(prefix) = token.strip_suffix("Gb") {
        (prefix, 1_000_000_000.0)
    } else if let Some(prefix) = token.strip_suffix('b') {
        (prefix, 1.0)
    } else {
        (token, 1.0)
    };
    digits.parse::<f64>().ok().map(|v| v * multiplier)
}

fn split_host_port(token: &str) -> (String, Option<u16>) {
    match token.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().ok()),
        None => (token.to_string(), None),
    }
}

/// Parses the bounded-run text output of one `iftop` invocation into rows.
/// Pure function: the short-lived run itself is performed by the collector.
pub fn parse(output: &str) -> Result<Vec<BandwidthRecord>> {
    let mut records = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (parts, _direction): (Vec<&str>, &str) = if line.contains("=>") {
            (line.splitn(2, "=>").collect(), "TX")
        } else if line.contains("<=") {
            (line.splitn(2, "<=").collect(), "RX")
        } else {
            continue;
        };
        if parts.len() < 2 {
            continue;
        }
        let (src_ip, _src_port) = split_host_port(parts[0].trim());
        let mut rest = parts[1].trim().split_whitespace();
        let Some(dest_token) = rest.next() else { continue };
        let (dest_ip, _dest_port) = split_host_port(dest_token);

        let rates: Vec<f64> = rest.filter_map(parse_rate).collect();
        if src_ip.is_empty() || dest_ip.is_empty() {
            continue;
        }

        records.push(BandwidthRecord {
            timestamp: Utc::now(),
            src_ip: Some(src_ip),
            dest_ip: Some(dest_ip),
            bytes_per_sec_tx: rates.first().copied(),
            bytes_per_sec_rx: rates.get(1).copied(),
            cumulative_bytes: rates.get(2).map(|v| *v as i64),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "192.168.1.100:12345  =>  8.8.8.8:53    1.23Kb  2.45Kb  3.67Kb\n\
192.168.1.100        <=  8.8.8.8       4.56Kb  5.67Kb  6.78Kb\n";

    #[test]
    fn parses_both_directions() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].src_ip.as_deref(), Some("192.168.1.100"));
        assert_eq!(records[0].dest_ip.as_deref(), Some("8.8.8.8"));
        assert!(records[0].bytes_per_sec_tx.unwrap() > 0.0);
    }

    #[test]
    fn blank_and_unrecognized_lines_are_skipped() {
        let records = parse("\nsome unrelated banner line\n").unwrap();
        assert!(records.is_empty());
    }
}
