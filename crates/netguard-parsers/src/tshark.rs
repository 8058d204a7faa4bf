//! Shared tshark JSON projection, used directly by the `tshark` collector
//! (live capture window) and indirectly by `tcpdump`/`netsniff` (PCAP +
//! offline `tshark -T json` per spec §4.2). Grounded on
//! `original_source/.../pcap_to_json.py`'s field-by-field JSON projection.

use chrono::{DateTime, TimeZone, Utc};
use netguard_common::net::is_private;
use netguard_common::{Error, Result};
use serde_json::Value;
use std::net::IpAddr;

use crate::geoip::GeoIpLookup;
use crate::heuristics::{self, TrafficSignals};
use crate::records::{PacketRecord, TsharkRecord};

fn layer<'a>(frame: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = frame.get("_source")?.get("layers")?;
    for key in path {
        cur = cur.get(key)?;
    }
    Some(cur)
}

fn layer_str(frame: &Value, path: &[&str]) -> Option<String> {
    layer(frame, path).and_then(|v| v.as_str().or_else(|| v.as_array()?.first()?.as_str())).map(str::to_string)
}

fn layer_u16(frame: &Value, path: &[&str]) -> Option<u16> {
    layer_str(frame, path).and_then(|s| s.parse().ok())
}

fn frame_time(frame: &Value) -> DateTime<Utc> {
    layer(frame, &["frame", "frame.time_epoch"])
        .and_then(|v| v.as_str().or_else(|| v.as_array()?.first()?.as_str()))
        .and_then(|s| s.parse::<f64>().ok())
        .and_then(|epoch| Utc.timestamp_opt(epoch as i64, 0).single())
        .unwrap_or_else(Utc::now)
}

/// Parses the output of `tshark -T json` into per-packet records with
/// HTTP/DNS/TLS field extraction, threat-scored per packet.
pub async fn parse(json: &str, geoip: &GeoIpLookup) -> Result<Vec<TsharkRecord>> {
    let frames: Vec<Value> = serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))?;
    let mut records = Vec::with_capacity(frames.len());
    for frame in &frames {
        let src_ip = layer_str(frame, &["ip", "ip.src"]);
        let dest_ip = layer_str(frame, &["ip", "ip.dst"]);
        let dest_addr: Option<IpAddr> = dest_ip.as_deref().and_then(|s| s.parse().ok());

        let geo_country = match dest_addr {
            Some(addr) if !is_private(addr) => geoip.lookup(addr).await,
            _ => None,
        };

        let tcp_syn = layer_str(frame, &["tcp", "tcp.flags.syn"]).as_deref() == Some("1");
        let tcp_ack = layer_str(frame, &["tcp", "tcp.flags.ack"]).as_deref() == Some("1");
        let dest_port = layer_u16(frame, &["tcp", "tcp.dstport"]).or_else(|| layer_u16(frame, &["udp", "udp.dstport"]));
        let ttl = layer_str(frame, &["ip", "ip.ttl"]).and_then(|s| s.parse().ok());

        let (threat_score, is_suspicious) = heuristics::score(TrafficSignals {
            dest_ip: dest_addr,
            dest_port,
            ttl,
            tcp_syn,
            tcp_ack,
        });

        records.push(TsharkRecord {
            timestamp: frame_time(frame),
            src_ip,
            dest_ip,
            src_port: layer_u16(frame, &["tcp", "tcp.srcport"]).or_else(|| layer_u16(frame, &["udp", "udp.srcport"])),
            dest_port,
            protocol: layer_str(frame, &["frame", "frame.protocols"]),
            http_host: layer_str(frame, &["http", "http.host"]),
            http_uri: layer_str(frame, &["http", "http.request.uri"]),
            dns_query: layer_str(frame, &["dns", "dns.qry.name"]),
            tls_sni: layer_str(frame, &["tls", "tls.handshake.extensions_server_name"]),
            length: layer_str(frame, &["frame", "frame.len"]).and_then(|s| s.parse().ok()),
            threat_score,
            is_suspicious,
            geo_country,
        });
    }
    Ok(records)
}

/// Projects the same tshark JSON into the flatter `PacketRecord` shape
/// used by `tcpdump`/`netsniff` (PCAP-sourced collectors, spec §4.2).
pub async fn project_packets(json: &str, geoip: &GeoIpLookup) -> Result<Vec<PacketRecord>> {
    let frames: Vec<Value> = serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))?;
    let mut records = Vec::with_capacity(frames.len());
    for frame in &frames {
        let src_ip = layer_str(frame, &["ip", "ip.src"]);
        let dest_ip = layer_str(frame, &["ip", "ip.dst"]);
        let dest_addr: Option<IpAddr> = dest_ip.as_deref().and_then(|s| s.parse().ok());

        let geo_country = match dest_addr {
            Some(addr) if !is_private(addr) => geoip.lookup(addr).await,
            _ => None,
        };

        let tcp_syn = layer_str(frame, &["tcp", "tcp.flags.syn"]).as_deref() == Some("1");
        let tcp_ack = layer_str(frame, &["tcp", "tcp.flags.ack"]).as_deref() == Some("1");
        let tcp_fin = layer_str(frame, &["tcp", "tcp.flags.fin"]).as_deref() == Some("1");
        let dest_port = layer_u16(frame, &["tcp", "tcp.dstport"]).or_else(|| layer_u16(frame, &["udp", "udp.dstport"]));
        let ttl = layer_str(frame, &["ip", "ip.ttl"]).and_then(|s| s.parse().ok());

        let (threat_score, is_suspicious) = heuristics::score(TrafficSignals {
            dest_ip: dest_addr,
            dest_port,
            ttl,
            tcp_syn,
            tcp_ack,
        });

        records.push(PacketRecord {
            timestamp: frame_time(frame),
            src_ip,
            dest_ip,
            src_port: layer_u16(frame, &["tcp", "tcp.srcport"]).or_else(|| layer_u16(frame, &["udp", "udp.srcport"])),
            dest_port,
            protocol: layer_str(frame, &["ip", "ip.proto"]),
            tcp_syn,
            tcp_ack,
            tcp_fin,
            ttl,
            length: layer_str(frame, &["frame", "frame.len"]).and_then(|s| s.parse().ok()),
            app_protocol: layer_str(frame, &["frame", "frame.protocols"]),
            threat_score,
            is_suspicious,
            geo_country,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "_source": {
                "layers": {
                    "frame": {"frame.time_epoch": "1700000000.0", "frame.len": "60", "frame.protocols": "eth:ip:tcp"},
                    "ip": {"ip.src": "192.168.1.5", "ip.dst": "8.8.8.8", "ip.ttl": "40"},
                    "tcp": {"tcp.srcport": "51000", "tcp.dstport": "443", "tcp.flags.syn": "1", "tcp.flags.ack": "0"}
                }
            }
        }
    ]"#;

    #[tokio::test]
    async fn parses_single_frame_into_tshark_record() {
        let geoip = GeoIpLookup::disabled();
        let records = parse(SAMPLE, &geoip).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].src_ip.as_deref(), Some("192.168.1.5"));
        assert_eq!(records[0].dest_port, Some(443));
    }

    #[tokio::test]
    async fn projects_packet_record_with_tcp_flags() {
        let geoip = GeoIpLookup::disabled();
        let records = project_packets(SAMPLE, &geoip).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].tcp_syn);
        assert!(!records[0].tcp_ack);
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let geoip = GeoIpLookup::disabled();
        assert!(parse("not json", &geoip).await.is_err());
    }
}
