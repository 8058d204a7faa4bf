//! ARP/neighbour table scan (spec §4.5 step 1). Reads the kernel's
//! neighbour cache directly from `/proc/net/arp` rather than shelling out,
//! since the format is a stable, documented virtual file on Linux.

use std::net::IpAddr;

use netguard_common::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: IpAddr,
    pub mac: String,
}

const INCOMPLETE_MAC: &str = "00:00:00:00:00:00";

/// Parses `/proc/net/arp`'s fixed-width table into `(ip, mac)` pairs,
/// skipping incomplete entries (flag `0x0` or an all-zero MAC).
pub fn parse_proc_net_arp(contents: &str) -> Vec<ArpEntry> {
    contents
        .lines()
        .skip(1) // header: "IP address  HW type  Flags  HW address  Mask  Device"
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let ip: IpAddr = fields[0].parse().ok()?;
            let mac = fields[3].to_ascii_uppercase();
            if mac == INCOMPLETE_MAC {
                return None;
            }
            Some(ArpEntry { ip, mac })
        })
        .collect()
}

/// Scans the live neighbour table. On non-Linux or read failure, returns
/// an empty list rather than failing the whole device registry cycle.
pub async fn scan() -> Result<Vec<ArpEntry>> {
    match tokio::fs::read_to_string("/proc/net/arp").await {
        Ok(contents) => Ok(parse_proc_net_arp(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::Collector(format!("reading /proc/net/arp: {e}"))),
    }
}
