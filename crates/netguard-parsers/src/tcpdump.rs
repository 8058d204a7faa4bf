//! `tcpdump` parser (spec §4.2): PCAP ring buffer rotated by the capture
//! runner, projected via `tshark -T json` into packet rows. The PCAP→JSON
//! step is I/O performed by the collector; this module is the pure
//! projection over the resulting JSON text.

use netguard_common::Result;

use crate::geoip::GeoIpLookup;
use crate::records::PacketRecord;
use crate::tshark;

pub async fn parse(tshark_json: &str, geoip: &GeoIpLookup) -> Result<Vec<PacketRecord>> {
    tshark::project_packets(tshark_json, geoip).await
}
