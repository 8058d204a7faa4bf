//! Optional GeoIP enrichment via an external country-lookup binary, cached
//! for the lifetime of the process (supplemented feature, spec §4.2 /
//! SPEC_FULL.md). No GeoIP crate is pulled in; the original
//! `ai_data_exporter.py`/`comprehensive_data_aggregator.py` do no GeoIP of
//! their own, so this shells out the same way collectors shell out to
//! their capture tools.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use netguard_common::net::is_benign_by_default;
use tokio::process::Command;
use tracing::debug;

/// Looks up the country for non-private destination IPs via a configured
/// external binary (e.g. `geoiplookup`), caching results for this
/// process's lifetime.
pub struct GeoIpLookup {
    bin: Option<String>,
    cache: Mutex<HashMap<IpAddr, Option<String>>>,
}

impl GeoIpLookup {
    pub fn new(bin: Option<String>) -> Self {
        Self {
            bin,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Returns the cached or freshly-looked-up country code/name for
    /// `addr`. Always `None` for private/multicast/loopback addresses and
    /// when no lookup binary is configured.
    pub async fn lookup(&self, addr: IpAddr) -> Option<String> {
        if is_benign_by_default(addr) {
            return None;
        }
        let Some(bin) = &self.bin else {
            return None;
        };
        if let Some(cached) = self.cache.lock().unwrap().get(&addr).cloned() {
            return cached;
        }
        let result = Command::new(bin)
            .arg(addr.to_string())
            .output()
            .await
            .ok()
            .and_then(|output| {
                if output.status.success() {
                    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    }
                } else {
                    None
                }
            });
        if result.is_none() {
            debug!(%addr, "geoip lookup produced no result");
        }
        self.cache.lock().unwrap().insert(addr, result.clone());
        result
    }
}
