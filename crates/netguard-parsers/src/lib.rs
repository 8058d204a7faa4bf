//! Tool-specific capture output parsers for NetGuard Pro (spec C4).

pub mod argus;
pub mod geoip;
pub mod heuristics;
pub mod httpry;
pub mod iftop;
pub mod netsniff;
pub mod ngrep;
pub mod nethogs;
pub mod p0f;
pub mod records;
pub mod suricata;
pub mod tcpdump;
pub mod tshark;

pub use geoip::GeoIpLookup;
