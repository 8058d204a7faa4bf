//! Runtime configuration for the NetGuard Pro core.
//!
//! Mirrors the shape of the source's `config.py`: a handful of
//! `NETGUARD_*` environment overrides layered onto sane defaults, plus
//! sub-structs per concern the way `mcp_common::config::Config` is
//! organized.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a running NetGuard Pro instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetGuardConfig {
    pub store: StoreConfig,
    pub capture: CaptureConfig,
    pub correlation: CorrelationConfig,
    pub ai: AiDispatchConfig,
}

/// Storage layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub captures_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Capture/collector layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub interfaces: NetworkInterfaces,
    pub run_as_user: Option<String>,
    pub geoip_lookup_bin: Option<String>,
    pub batch_row_ceiling: usize,
}

/// Configured network interfaces, mirroring `config.py`'s
/// `NETWORK_INTERFACES` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterfaces {
    pub primary: String,
    pub wifi: String,
    pub usb_wifi: String,
}

/// Correlator cadence configuration (C6-C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub device_registry_interval_secs: u64,
    pub vulnerability_scan_interval_secs: u64,
    pub scorer_interval_secs: u64,
    pub alert_engine_interval_secs: u64,
    pub arp_scan_enabled: bool,
    /// Known malware C2 IPs/domains for the `Malware_C2_Communication` rule
    /// (spec §4.8). Empty by default, since the built-in rule set ships
    /// with no indicator feed; populate via `NETGUARD_C2_INDICATORS`.
    pub c2_indicators: Vec<String>,
}

/// AI aggregator dispatch configuration (C10), distinct from the richer
/// `ai_config.json` file described in spec §6 which carries provider keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDispatchConfig {
    pub config_file: PathBuf,
    pub default_interval_secs: u64,
    pub provider_call_budget_secs: u64,
}

impl Default for NetGuardConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                db_path: PathBuf::from("network.db"),
                captures_dir: PathBuf::from("captures"),
                logs_dir: PathBuf::from("logs/system"),
            },
            capture: CaptureConfig {
                interfaces: NetworkInterfaces {
                    primary: "eth0".to_string(),
                    wifi: "wlan0".to_string(),
                    usb_wifi: "wlan1".to_string(),
                },
                run_as_user: None,
                geoip_lookup_bin: None,
                batch_row_ceiling: 10_000,
            },
            correlation: CorrelationConfig {
                device_registry_interval_secs: 30,
                vulnerability_scan_interval_secs: 300,
                scorer_interval_secs: 120,
                alert_engine_interval_secs: 300,
                arp_scan_enabled: true,
                c2_indicators: Vec::new(),
            },
            ai: AiDispatchConfig {
                config_file: PathBuf::from("config/ai_config.json"),
                default_interval_secs: 300,
                provider_call_budget_secs: 60,
            },
        }
    }
}

impl NetGuardConfig {
    /// Apply `NETGUARD_*` environment variable overrides on top of
    /// [`NetGuardConfig::default`], matching `config.py`'s `os.getenv` calls.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("NETGUARD_DB_PATH") {
            config.store.db_path = PathBuf::from(path);
        }
        if let Ok(iface) = std::env::var("NETGUARD_INTERFACE_PRIMARY") {
            config.capture.interfaces.primary = iface;
        }
        if let Ok(iface) = std::env::var("NETGUARD_INTERFACE_WIFI") {
            config.capture.interfaces.wifi = iface;
        }
        if let Ok(iface) = std::env::var("NETGUARD_INTERFACE_USB_WIFI") {
            config.capture.interfaces.usb_wifi = iface;
        }
        if let Ok(user) = std::env::var("NETGUARD_RUN_AS_USER") {
            config.capture.run_as_user = Some(user);
        }
        if let Ok(list) = std::env::var("NETGUARD_C2_INDICATORS") {
            config.correlation.c2_indicators =
                list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        }

        config
    }
}
