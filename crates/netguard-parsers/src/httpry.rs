//! `httpry` parser (spec §4.2): log-tailing, one tab-delimited HTTP request
//! per line (`timestamp, source-ip, dest-ip, direction, method, host, uri,
//! http-version, status-code, ...`).

use chrono::Utc;
use netguard_common::Result;

use crate::records::HttpRequestRecord;

/// Parses complete newline-terminated lines from `raw[last_position..]`.
/// A trailing partial line (no terminating `\n` yet) is left unconsumed.
pub fn parse(raw: &str, last_position: usize) -> Result<(Vec<HttpRequestRecord>, usize)> {
    let slice = raw.get(last_position..).unwrap_or("");
    let mut records = Vec::new();
    let mut consumed = 0usize;

    for line in slice.split_inclusive('\n') {
        if !line.ends_with('\n') {
            break; // partial trailing line, defer to next cycle
        }
        consumed += line.len();
        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(record) = parse_line(trimmed) {
            records.push(record);
        }
    }

    Ok((records, last_position + consumed))
}

fn parse_line(line: &str) -> Option<HttpRequestRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 7 {
        return None;
    }
    Some(HttpRequestRecord {
        timestamp: Utc::now(),
        src_ip: Some(fields[1].to_string()),
        dest_ip: Some(fields[2].to_string()),
        direction: Some(fields[3].to_string()),
        method: Some(fields[4].to_string()),
        host: Some(fields[5].to_string()),
        uri: Some(fields[6].to_string()),
        status_code: fields.get(8).and_then(|s| s.parse().ok()),
        user_agent: fields.get(11).map(|s| s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "2025-01-02 03:04:05\t192.168.1.5\t1.2.3.4\t>\tGET\texample.com\t/index.html\t1.1\t200\tOK\t-\tMozilla/5.0\n";

    #[test]
    fn parses_one_complete_line() {
        let (records, new_pos) = parse(LINE, 0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].host.as_deref(), Some("example.com"));
        assert_eq!(records[0].status_code, Some(200));
        assert_eq!(new_pos, LINE.len());
    }

    #[test]
    fn partial_trailing_line_is_deferred() {
        let partial = "2025-01-02 03:04:05\t192.168.1.5\t1.2.3.4\t>\tGET\texample";
        let (records, new_pos) = parse(partial, 0).unwrap();
        assert!(records.is_empty());
        assert_eq!(new_pos, 0);
    }
}
