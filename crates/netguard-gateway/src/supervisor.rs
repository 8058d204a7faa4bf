//! Process-wide lifecycle (spec C11/§4.10). Grounded on
//! `mcp-pipeline-guard/src/guard.rs::PipelineGuard::new`'s
//! spawn-one-task-per-monitored-thing shape and
//! `mcp-gateway/src/bin/main.rs`'s ctrl_c-driven graceful shutdown,
//! generalized from a single health-check loop to the full collector +
//! correlator worker set.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use netguard_ai::{default_chain, AiAggregator, HttpProvider};
use netguard_capture::{CaptureRunner, PositionStore, RunnerState};
use netguard_common::config::NetGuardConfig;
use netguard_common::Result;
use netguard_correlate::{AlertEngine, DeviceRegistry, Scorer, VulnerabilityScanner};
use netguard_parsers::GeoIpLookup;
use netguard_store::{Store, TableRegistry};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collectors;
use crate::config_file::AiConfigFile;

/// How often a daemon tool's [`CaptureRunner`] is polled for liveness
/// (spec C3). Independent of, and much tighter than, any collector's log
/// read cadence.
const DAEMON_HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Owns the Store and every long-lived worker task; shutdown is
/// cooperative (spec §5: "every worker consults a process-wide shutdown
/// signal at the top of each iteration").
pub struct Supervisor {
    store: Store,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Opens the Store (bootstrapping derived-state DDL as a side effect
    /// of `Store::open`) and ensures every tool's `_template` table exists
    /// so T2 is always resolvable even before first capture.
    pub async fn bootstrap(config: &NetGuardConfig) -> Result<Self> {
        let store = Store::open(&config.store.db_path).await?;
        let registry = store.registry();
        for tool in netguard_store::schema::TOOLS {
            registry.ensure_template(tool).await?;
        }
        Ok(Self {
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        })
    }

    /// Starts one task per collector (spec §4.3 inventory) and one task
    /// per correlator (C6-C10), all reading/writing the shared Store.
    pub fn spawn_all(&mut self, config: &NetGuardConfig, ai_config: &AiConfigFile) {
        let capture_dir = PathBuf::from(&config.store.captures_dir);
        let logs_dir = PathBuf::from(&config.store.logs_dir);
        let interface = config.capture.interfaces.primary.clone();
        let geoip = Arc::new(GeoIpLookup::disabled());

        for profile in netguard_collectors::inventory::inventory() {
            let pool = self.store.pool().clone();
            let positions = PositionStore::new(self.store.pool().clone());
            let shutdown = self.shutdown.clone();
            let capture_dir = capture_dir.clone();
            let logs_dir = logs_dir.clone();
            let geoip = geoip.clone();
            let interface = interface.clone();
            let cadence = profile.cadence;

            let handle = tokio::spawn(async move {
                let registry = TableRegistry::new(pool.clone());
                let mut ticker = tokio::time::interval(cadence);
                loop {
                    ticker.tick().await;
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let result = match profile.mode {
                        netguard_collectors::inventory::CaptureMode::DaemonLogTail => {
                            let log_path = netguard_collectors::inventory::daemon_log_path(&profile, &logs_dir);
                            collectors::run_log_tail(&pool, &registry, &positions, &profile, &log_path).await
                        }
                        netguard_collectors::inventory::CaptureMode::PcapOfflineTshark => {
                            collectors::run_pcap_offline(&pool, &registry, &profile, &capture_dir, &geoip, &interface)
                                .await
                        }
                        netguard_collectors::inventory::CaptureMode::LiveWindow => {
                            collectors::run_live_window(&pool, &registry, &profile, &geoip, &interface).await
                        }
                        netguard_collectors::inventory::CaptureMode::CaptureThenAnalyse => {
                            collectors::run_capture_then_analyse(&pool, &registry, &profile, &capture_dir, &interface)
                                .await
                        }
                        netguard_collectors::inventory::CaptureMode::ShortBoundedRun => {
                            collectors::run_short_bounded(&pool, &registry, &profile, &interface).await
                        }
                    };
                    if let Err(e) = result {
                        warn!(tool = profile.tool, error = %e, "collector cycle failed, will retry next cadence");
                    }
                }
                info!(tool = profile.tool, "collector worker stopped");
            });
            self.handles.push(handle);
        }

        // One CaptureRunner per DaemonLogTail tool (spec C3): these four
        // binaries (p0f, ngrep, httpry, suricata) are long-lived daemons
        // that must actually be spawned, health-polled and restarted with
        // backoff, independent of the log-tail cadence above which only
        // ever reads the file the runner's child is writing.
        let run_as_user = config.capture.run_as_user.clone();
        for profile in netguard_collectors::inventory::inventory() {
            if profile.mode != netguard_collectors::inventory::CaptureMode::DaemonLogTail {
                continue;
            }
            let shutdown = self.shutdown.clone();
            let capture_dir = capture_dir.clone();
            let logs_dir = logs_dir.clone();
            let interface = interface.clone();
            let run_as_user = run_as_user.clone();

            let handle = tokio::spawn(async move {
                let spec = collectors::daemon_capture_spec(&profile, &capture_dir, &logs_dir, &interface, run_as_user);
                let mut runner = CaptureRunner::new(spec);
                let mut ticker = tokio::time::interval(DAEMON_HEALTH_POLL_INTERVAL);
                loop {
                    ticker.tick().await;
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let state = runner.state().clone();
                    let outcome = match state {
                        RunnerState::Idle => runner.start().await,
                        RunnerState::Running => runner.poll_health().map(|_| ()),
                        RunnerState::Exited { .. } | RunnerState::Backoff => runner.maybe_restart().await.map(|_| ()),
                    };
                    if let Err(e) = outcome {
                        warn!(tool = profile.tool, error = %e, "daemon capture health check failed");
                    }
                }
                if let Err(e) = runner.stop().await {
                    warn!(tool = profile.tool, error = %e, "daemon capture did not stop cleanly");
                }
                info!(tool = profile.tool, "daemon capture supervisor stopped");
            });
            self.handles.push(handle);
        }

        let arp_scan_enabled = config.correlation.arp_scan_enabled;
        self.spawn_correlator(
            "device-registry",
            Duration::from_secs(config.correlation.device_registry_interval_secs),
            {
                let pool = self.store.pool().clone();
                move || {
                    let engine = DeviceRegistry::new(pool.clone(), TableRegistry::new(pool.clone()), arp_scan_enabled);
                    async move { engine.run_cycle().await.map(|_| ()) }
                }
            },
        );

        self.spawn_correlator(
            "vulnerability-scanner",
            Duration::from_secs(config.correlation.vulnerability_scan_interval_secs),
            {
                let pool = self.store.pool().clone();
                move || {
                    let scanner = VulnerabilityScanner::new(pool.clone(), TableRegistry::new(pool.clone()));
                    async move { scanner.run_cycle().await.map(|_| ()) }
                }
            },
        );

        self.spawn_correlator("scorer", Duration::from_secs(config.correlation.scorer_interval_secs), {
            let pool = self.store.pool().clone();
            move || {
                let scorer = Scorer::new(pool.clone(), TableRegistry::new(pool.clone()));
                async move { scorer.run_cycle().await.map(|_| ()) }
            }
        });

        let c2_indicators = config.correlation.c2_indicators.clone();
        self.spawn_correlator(
            "alert-engine",
            Duration::from_secs(config.correlation.alert_engine_interval_secs),
            {
                let pool = self.store.pool().clone();
                move || {
                    let engine =
                        AlertEngine::new(pool.clone(), TableRegistry::new(pool.clone()), c2_indicators.clone());
                    async move {
                        engine.ensure_default_rules().await?;
                        engine.run_cycle().await.map(|_| ())
                    }
                }
            },
        );

        if ai_config.ai_enabled {
            let interval = Duration::from_secs((ai_config.analysis_interval_minutes.max(1) * 60) as u64);
            let providers: Vec<Box<dyn netguard_ai::AiProvider>> = default_chain(
                ai_config.api_keys.gemini_api_key.clone(),
                ai_config.api_keys.groq_api_key.clone(),
                ai_config.api_keys.openrouter_api_key.clone(),
            )
            .into_iter()
            .filter(|p| p.has_key())
            .filter_map(|p| HttpProvider::new(p).ok())
            .map(|p| Box::new(p) as Box<dyn netguard_ai::AiProvider>)
            .collect();
            let time_window = ai_config.data_collection.time_window_minutes;
            let max_packets = ai_config.data_collection.max_packets_to_analyze;
            let pool = self.store.pool().clone();
            let shutdown = self.shutdown.clone();

            let handle = tokio::spawn(async move {
                let registry = TableRegistry::new(pool.clone());
                let aggregator = AiAggregator::new(pool, registry, providers, time_window, max_packets);
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(e) = aggregator.run_cycle().await {
                        warn!(error = %e, "AI aggregation cycle failed");
                    }
                }
                info!("AI aggregator worker stopped");
            });
            self.handles.push(handle);
        } else {
            info!("AI analysis disabled (ai_enabled=false in ai_config.json)");
        }
    }

    fn spawn_correlator<F, Fut>(&mut self, name: &'static str, interval: Duration, make_cycle: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = make_cycle().await {
                    error!(worker = name, error = %e, "correlator cycle failed");
                }
            }
            info!(worker = name, "correlator worker stopped");
        });
        self.handles.push(handle);
    }

    /// Returns a handle to the underlying connection pool, e.g. for a
    /// one-shot CLI subcommand that needs to run a single correlator cycle
    /// without spawning the full worker set.
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    pub fn registry(&self) -> TableRegistry {
        self.store.registry()
    }

    /// Cooperative shutdown (spec §5 "cancellation"): flip the shared
    /// flag so every loop exits at the top of its next tick, then wait up
    /// to the capture grace period for workers to notice, then close the
    /// Store by dropping it.
    pub async fn shutdown(self) {
        info!("shutdown requested, signalling all workers");
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles {
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }
        info!("all workers stopped, closing store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_every_tool_template_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NetGuardConfig::default();
        config.store.db_path = dir.path().join("network.db");

        let supervisor = Supervisor::bootstrap(&config).await.unwrap();
        let pool = supervisor.pool().clone();
        for tool in netguard_store::schema::TOOLS {
            let name: String = sqlx::query_scalar(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(format!("{tool}_template"))
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(name, format!("{tool}_template"));
        }
    }

    #[tokio::test]
    async fn spawn_correlator_shuts_down_cooperatively() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NetGuardConfig::default();
        config.store.db_path = dir.path().join("network.db");

        let mut supervisor = Supervisor::bootstrap(&config).await.unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        supervisor.spawn_correlator("test-worker", Duration::from_millis(1), move || {
            let ran = ran_clone.clone();
            async move {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.shutdown().await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
