//! Best-effort reverse-DNS lookup (spec §4.5 step 4), shelling out to
//! `getent hosts` the same way `netguard_parsers::geoip` shells out to a
//! country-lookup binary — no resolver crate in the corpus, so this keeps
//! the same external-process + cache shape.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::Command;

const LOOKUP_TIMEOUT: Duration = Duration::from_millis(300);

pub struct ReverseDnsLookup {
    cache: Mutex<HashMap<IpAddr, Option<String>>>,
}

impl ReverseDnsLookup {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `addr` to a hostname, caching both hits and misses so a
    /// persistently unresolvable address is only tried once per process.
    pub async fn resolve(&self, addr: IpAddr) -> Option<String> {
        if let Some(cached) = self.cache.lock().unwrap().get(&addr).cloned() {
            return cached;
        }
        let result = tokio::time::timeout(LOOKUP_TIMEOUT, Command::new("getent").arg("hosts").arg(addr.to_string()).output())
            .await
            .ok()
            .and_then(|r| r.ok())
            .and_then(|output| {
                if output.status.success() {
                    String::from_utf8_lossy(&output.stdout)
                        .split_whitespace()
                        .nth(1)
                        .map(|s| s.trim_end_matches('.').to_string())
                } else {
                    None
                }
            });
        self.cache.lock().unwrap().insert(addr, result.clone());
        result
    }
}

impl Default for ReverseDnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresolvable_address_caches_none() {
        let lookup = ReverseDnsLookup::new();
        let addr: IpAddr = "203.0.113.5".parse().unwrap(); // TEST-NET-3, never resolvable
        assert_eq!(lookup.resolve(addr).await, None);
        // second call hits the cache path, still None
        assert_eq!(lookup.resolve(addr).await, None);
    }
}
