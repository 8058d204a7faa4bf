//! Shared `threat_score`/`is_suspicious` heuristics applied by packet- and
//! flow-oriented parsers (spec §4.2). Grounded on the traffic-summary
//! heuristics in `comprehensive_data_aggregator.py`, generalized into a
//! single reusable scoring function per spec §9's note that these should be
//! tunable rule entries rather than scattered hard-coded checks.

use netguard_common::net::is_benign_by_default;
use std::net::IpAddr;

/// Known command-and-control / mining-pool destination ports, used by both
/// the parser heuristic and the vulnerability scanner's suspicious-
/// connection check.
pub const SUSPICIOUS_DEST_PORTS: &[u16] = &[4444, 6666, 6667, 1337, 31337, 3389];

/// Inputs available to the heuristic at parse time: only what a single
/// packet/flow record exposes, no cross-record state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficSignals {
    pub dest_ip: Option<IpAddr>,
    pub dest_port: Option<u16>,
    pub ttl: Option<u8>,
    pub tcp_syn: bool,
    pub tcp_ack: bool,
}

/// Computes a 0.0-1.0 threat score and suspicion flag for one record.
/// Local network space and multicast are benign by default, per spec §4.2.
pub fn score(signals: TrafficSignals) -> (f64, bool) {
    if let Some(dest) = signals.dest_ip {
        if is_benign_by_default(dest) {
            return (0.0, false);
        }
    }

    let mut score = 0.0;
    if signals.tcp_syn && !signals.tcp_ack {
        score += 0.3;
    }
    if let Some(port) = signals.dest_port {
        if SUSPICIOUS_DEST_PORTS.contains(&port) {
            score += 0.5;
        }
        if port > 50_000 {
            score += 0.1;
        }
    }
    if let Some(ttl) = signals.ttl {
        if ttl < 32 {
            score += 0.2;
        }
    }
    let score = score.min(1.0);
    (score, score >= 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_destination_is_never_suspicious() {
        let signals = TrafficSignals {
            dest_ip: Some("192.168.1.1".parse().unwrap()),
            tcp_syn: true,
            tcp_ack: false,
            dest_port: Some(23),
            ttl: Some(1),
        };
        assert_eq!(score(signals), (0.0, false));
    }

    #[test]
    fn syn_without_ack_to_external_with_bad_port_is_suspicious() {
        let signals = TrafficSignals {
            dest_ip: Some("8.8.8.8".parse().unwrap()),
            tcp_syn: true,
            tcp_ack: false,
            dest_port: Some(4444),
            ttl: Some(20),
        };
        let (value, suspicious) = score(signals);
        assert!(value >= 0.5);
        assert!(suspicious);
    }

    #[test]
    fn plain_https_to_external_is_benign() {
        let signals = TrafficSignals {
            dest_ip: Some("1.1.1.1".parse().unwrap()),
            tcp_syn: false,
            tcp_ack: true,
            dest_port: Some(443),
            ttl: Some(64),
        };
        assert_eq!(score(signals), (0.0, false));
    }
}
