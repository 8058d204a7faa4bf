//! `p0f` parser (spec §4.2): log-tailing, passive OS fingerprinting.
//! Entries are `.-[ ... ]-` delimited blocks terminated by a `` `---- ``
//! line. Grounded on spec's explicit block-delimiter note; consumes a byte
//! range of a growing log file starting at `last_position`.

use chrono::Utc;
use netguard_common::Result;

use crate::records::FingerprintRecord;

const BLOCK_END: &str = "`----";

/// Parses complete `.-[ ... ]-` blocks found in `raw[last_position..]`.
/// Returns the records found and the new position, which stops short of
/// any trailing incomplete block so it is reparsed on the next cycle.
pub fn parse(raw: &str, last_position: usize) -> Result<(Vec<FingerprintRecord>, usize)> {
    let slice = raw.get(last_position..).unwrap_or("");
    let mut records = Vec::new();
    let mut consumed = 0usize;
    let mut search_from = 0usize;

    while let Some(start) = slice[search_from..].find(".-[") {
        let start = search_from + start;
        let Some(end_rel) = slice[start..].find(BLOCK_END) else {
            // Incomplete trailing block: stop here, don't consume it.
            break;
        };
        let block_end = start + end_rel + BLOCK_END.len();
        let block = &slice[start..block_end];
        if let Some(record) = parse_block(block) {
            records.push(record);
        }
        consumed = block_end;
        search_from = block_end;
    }

    Ok((records, last_position + consumed))
}

fn parse_block(block: &str) -> Option<FingerprintRecord> {
    let header = block.lines().next()?;
    let inner = header.trim_start_matches(".-[").trim_end_matches("]-").trim();
    let (endpoints, _mode) = inner.split_once('(').unwrap_or((inner, ""));
    let (src, _dst) = endpoints.trim().split_once("->")?;
    let (src_ip, src_port) = src.trim().split_once('/').unwrap_or((src.trim(), ""));

    let mut os_genre = None;
    let mut dist = None;
    for line in block.lines() {
        let line = line.trim_start_matches('|').trim();
        if let Some(value) = line.strip_prefix("os").and_then(|rest| rest.trim_start().strip_prefix('=')) {
            os_genre = Some(value.trim().to_string());
        }
        if let Some(value) = line.strip_prefix("dist").and_then(|rest| rest.trim_start().strip_prefix('=')) {
            dist = value.trim().parse().ok();
        }
    }

    Some(FingerprintRecord {
        timestamp: Utc::now(),
        src_ip: Some(src_ip.to_string()),
        src_port: src_port.parse().ok(),
        os_genre: os_genre.clone(),
        os_details: os_genre,
        link_type: None,
        distance: dist,
        uptime_seconds: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = ".-[ 192.168.1.5/51000 -> 8.8.8.8/443 (syn) ]-\n\
|\n\
| client   = 192.168.1.5/51000\n\
| os       = Linux 3.11 and newer\n\
| dist     = 0\n\
|\n\
`----\n";

    #[test]
    fn parses_one_complete_block() {
        let (records, new_pos) = parse(SAMPLE, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].src_ip.as_deref(), Some("192.168.1.5"));
        assert_eq!(records[0].src_port, Some(51000));
        assert_eq!(records[0].os_genre.as_deref(), Some("Linux 3.11 and newer"));
        assert_eq!(records[0].distance, Some(0));
        assert_eq!(new_pos, SAMPLE.len());
    }

    #[test]
    fn incomplete_trailing_block_is_not_consumed() {
        let partial = ".-[ 10.0.0.1/1 -> 10.0.0.2/2 (syn) ]-\n| os = Linux\n";
        let (records, new_pos) = parse(partial, 0).unwrap();
        assert!(records.is_empty());
        assert_eq!(new_pos, 0);
    }

    #[test]
    fn resumes_from_last_position() {
        let double = format!("{SAMPLE}{SAMPLE}");
        let (first, pos) = parse(&double, 0).unwrap();
        assert_eq!(first.len(), 1);
        let (second, _) = parse(&double, pos).unwrap();
        assert_eq!(second.len(), 1);
    }
}
