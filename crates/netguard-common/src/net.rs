//! RFC1918/multicast classification shared by parsers, the device registry
//! and the scorer (spec §4.2: "local network space ... and multicast as
//! benign by default").

use std::net::{IpAddr, Ipv4Addr};

/// Whether `addr` falls within RFC1918 private address space.
pub fn is_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => v6.is_unique_local() || v6.is_loopback(),
    }
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    match octets[0] {
        10 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}

/// Whether `addr` is multicast (treated as benign per spec §4.2).
pub fn is_multicast(addr: IpAddr) -> bool {
    addr.is_multicast()
}

/// Whether traffic to/from `addr` should be treated as benign local
/// traffic by default.
pub fn is_benign_by_default(addr: IpAddr) -> bool {
    is_private(addr) || is_multicast(addr) || addr.is_loopback()
}
