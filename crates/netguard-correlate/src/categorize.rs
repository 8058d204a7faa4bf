//! Device categorisation rules (spec §4.5): an ordered rule table over
//! (hostname lowercase, vendor lowercase); first match wins. IoT rules are
//! listed ahead of the generic Computer rule so an IoT device built on
//! commodity hardware (e.g. a Raspberry Pi) is never miscategorised as a
//! plain computer.

use netguard_common::DeviceType;

type Rule = (fn(&str, &str) -> bool, DeviceType, &'static str);

fn contains(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.contains(needle)
}

const RULES: &[Rule] = &[
    (
        |host, vendor| contains(host, "raspberrypi") || contains(vendor, "raspberry pi"),
        DeviceType::IoT,
        "Raspberry Pi",
    ),
    (
        |_host, vendor| contains(vendor, "espressif"),
        DeviceType::IoT,
        "ESP8266/ESP32 Module",
    ),
    (
        |host, vendor| contains(host, "roku") || contains(vendor, "roku"),
        DeviceType::IoT,
        "Smart TV / Streaming",
    ),
    (
        |_host, vendor| contains(vendor, "sonos"),
        DeviceType::IoT,
        "Smart Speaker",
    ),
    (
        |host, vendor| contains(vendor, "philips") && contains(host, "hue"),
        DeviceType::IoT,
        "Smart Light",
    ),
    (
        |_host, vendor| contains(vendor, "nest") || contains(vendor, "ring"),
        DeviceType::IoT,
        "Smart Security",
    ),
    (
        |host, _vendor| contains(host, "iphone") || contains(host, "ipad"),
        DeviceType::Mobile,
        "Apple Mobile",
    ),
    (
        |host, _vendor| contains(host, "android"),
        DeviceType::Mobile,
        "Android Device",
    ),
    (
        |_host, vendor| {
            contains(vendor, "cisco")
                || contains(vendor, "netgear")
                || contains(vendor, "tp-link")
                || contains(vendor, "ubiquiti")
                || contains(vendor, "mikrotik")
        },
        DeviceType::Network,
        "Router/Switch",
    ),
    (
        |_host, vendor| contains(vendor, "vmware") || contains(vendor, "virtualbox") || contains(vendor, "qemu"),
        DeviceType::Virtual,
        "Virtual Machine",
    ),
    (
        |host, _vendor| contains(host, "server"),
        DeviceType::Server,
        "Generic Server",
    ),
    (
        |_host, vendor| {
            contains(vendor, "dell")
                || contains(vendor, "hewlett")
                || contains(vendor, "lenovo")
                || contains(vendor, "apple")
                || contains(vendor, "microsoft")
                || contains(vendor, "samsung")
        },
        DeviceType::Computer,
        "Desktop/Laptop",
    ),
];

/// Classifies a device from its best-effort hostname and OUI-resolved
/// vendor. Missing signals on both sides yield `(Unknown, "Unknown")`.
pub fn categorize(hostname: Option<&str>, vendor: Option<&str>) -> (DeviceType, String) {
    let host = hostname.unwrap_or("").to_ascii_lowercase();
    let vendor = vendor.unwrap_or("").to_ascii_lowercase();

    for (matches, device_type, category) in RULES {
        if matches(&host, &vendor) {
            return (*device_type, category.to_string());
        }
    }
    (DeviceType::Unknown, "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raspberry_pi_is_iot_not_computer() {
        let (device_type, category) = categorize(Some("raspberrypi"), Some("Raspberry Pi Foundation"));
        assert_eq!(device_type, DeviceType::IoT);
        assert_eq!(category, "Raspberry Pi");
    }

    #[test]
    fn missing_signals_are_unknown() {
        let (device_type, category) = categorize(None, None);
        assert_eq!(device_type, DeviceType::Unknown);
        assert_eq!(category, "Unknown");
    }

    #[test]
    fn router_vendor_is_network() {
        let (device_type, _) = categorize(None, Some("Netgear Inc."));
        assert_eq!(device_type, DeviceType::Network);
    }

    #[test]
    fn iot_rule_precedes_generic_computer_rule() {
        // Samsung triggers both a hypothetical "generic electronics" read
        // and the Computer rule; absent an IoT-specific match it must
        // resolve to Computer, not silently fall through to Unknown.
        let (device_type, _) = categorize(None, Some("Samsung Electronics"));
        assert_eq!(device_type, DeviceType::Computer);
    }
}
