//! `ngrep` parser (spec §4.2): log-tailing pattern matcher, entries
//! separated by a blank line. Each entry's header line carries the
//! `src:port -> dest:port` pair; the remainder is the matched payload
//! excerpt.

use chrono::Utc;
use netguard_common::Result;

use crate::records::PatternMatchRecord;

/// Parses complete blank-line-delimited entries from `raw[last_position..]`.
/// A trailing entry with no following blank line is treated as incomplete
/// and left unconsumed.
pub fn parse(raw: &str, last_position: usize) -> Result<(Vec<PatternMatchRecord>, usize)> {
    let slice = raw.get(last_position..).unwrap_or("");
    let mut records = Vec::new();
    let mut consumed = 0usize;

    let mut search_from = 0usize;
    while let Some(rel) = slice[search_from..].find("\n\n") {
        let entry_end = search_from + rel;
        let entry = &slice[search_from..entry_end];
        if let Some(record) = parse_entry(entry) {
            records.push(record);
        }
        consumed = entry_end + 2;
        search_from = consumed;
    }

    Ok((records, last_position + consumed))
}

fn parse_entry(entry: &str) -> Option<PatternMatchRecord> {
    let mut lines = entry.lines();
    let header = lines.next()?;
    let arrow = header.find("->")?;
    let (left, right) = (header[..arrow].trim(), header[arrow + 2..].trim());
    let src = left.rsplit(' ').next()?;
    let dest = right.split(' ').next()?;
    let (src_ip, src_port) = src.rsplit_once(':').unwrap_or((src, ""));
    let (dest_ip, dest_port) = dest.rsplit_once(':').unwrap_or((dest, ""));

    let payload: String = lines.collect::<Vec<_>>().join(" ").trim().to_string();

    Some(PatternMatchRecord {
        timestamp: Utc::now(),
        src_ip: Some(src_ip.to_string()),
        dest_ip: Some(dest_ip.to_string()),
        src_port: src_port.parse().ok(),
        dest_port: dest_port.trim_end_matches(|c: char| !c.is_ascii_digit()).parse().ok(),
        protocol: None,
        matched_pattern: None,
        payload_excerpt: if payload.is_empty() { None } else { Some(payload) },
    })
}
