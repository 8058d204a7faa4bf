//! `netsniff-ng` parser (spec §4.2): same PCAP + offline `tshark -T json`
//! shape as `tcpdump`, distinct only in which capture tool produced the
//! PCAP.

use netguard_common::Result;

use crate::geoip::GeoIpLookup;
use crate::records::PacketRecord;
use crate::tshark;

pub async fn parse(tshark_json: &str, geoip: &GeoIpLookup) -> Result<Vec<PacketRecord>> {
    tshark::project_packets(tshark_json, geoip).await
}
