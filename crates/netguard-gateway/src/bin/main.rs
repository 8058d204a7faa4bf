//! NetGuard Pro main executable.

use std::path::PathBuf;

use netguard_collectors::inventory::CaptureMode;
use netguard_common::config::NetGuardConfig;
use netguard_correlate::{AlertEngine, DeviceRegistry, Scorer, VulnerabilityScanner};
use netguard_gateway::cli::{self, Invocation};
use netguard_gateway::{AiConfigFile, Supervisor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli::build_command().get_matches();
    init_tracing(matches.get_flag("verbose"))?;

    match cli::parse(&matches) {
        Invocation::Serve { config_path, ai_config_path } => serve(config_path, ai_config_path).await,
        Invocation::Scan { config_path } => scan(config_path).await,
        Invocation::Score { config_path } => score(config_path).await,
        Invocation::Flush { config_path } => flush(config_path).await,
    }
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_directive = if verbose {
        "netguard_gateway=debug,netguard_collectors=debug,netguard_correlate=debug,netguard_ai=debug,netguard_capture=debug"
    } else {
        "netguard_gateway=info,netguard_collectors=info,netguard_correlate=info,netguard_ai=info,netguard_capture=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn load_config(db_path_override: Option<PathBuf>) -> NetGuardConfig {
    let mut config = NetGuardConfig::from_env();
    if let Some(path) = db_path_override {
        config.store.db_path = path;
    }
    config
}

fn load_ai_config(path: &std::path::Path) -> AiConfigFile {
    match AiConfigFile::load(path) {
        Ok(config) => config,
        Err(e) => {
            info!(path = %path.display(), error = %e, "no usable ai_config.json found, AI analysis disabled");
            AiConfigFile::disabled()
        }
    }
}

async fn serve(db_path_override: Option<PathBuf>, ai_config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(db_path_override);
    let ai_config = load_ai_config(&ai_config_path);

    info!(version = env!("CARGO_PKG_VERSION"), "starting NetGuard Pro");
    let mut supervisor = Supervisor::bootstrap(&config).await?;
    supervisor.spawn_all(&config, &ai_config);

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    supervisor.shutdown().await;
    Ok(())
}

async fn scan(db_path_override: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(db_path_override);
    let supervisor = Supervisor::bootstrap(&config).await?;
    let pool = supervisor.pool().clone();

    let registry = DeviceRegistry::new(pool.clone(), supervisor.registry(), config.correlation.arp_scan_enabled);
    match registry.run_cycle().await {
        Ok(report) => info!(?report, "device registry cycle complete"),
        Err(e) => error!(error = %e, "device registry cycle failed"),
    }

    let scanner = VulnerabilityScanner::new(pool.clone(), supervisor.registry());
    match scanner.run_cycle().await {
        Ok(flagged) => info!(flagged, "vulnerability scan complete"),
        Err(e) => error!(error = %e, "vulnerability scan failed"),
    }

    let alerts = AlertEngine::new(pool, supervisor.registry(), config.correlation.c2_indicators.clone());
    alerts.ensure_default_rules().await?;
    match alerts.run_cycle().await {
        Ok(raised) => info!(raised, "alert engine cycle complete"),
        Err(e) => error!(error = %e, "alert engine cycle failed"),
    }

    Ok(())
}

async fn score(db_path_override: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(db_path_override);
    let supervisor = Supervisor::bootstrap(&config).await?;
    let scorer = Scorer::new(supervisor.pool().clone(), supervisor.registry());
    let results = scorer.run_cycle().await?;
    info!(scored = results.len(), "scoring pass complete");
    Ok(())
}

async fn flush(db_path_override: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(db_path_override);
    let supervisor = Supervisor::bootstrap(&config).await?;
    let pool = supervisor.pool().clone();
    let positions = netguard_capture::PositionStore::new(pool.clone());
    let logs_dir = PathBuf::from(&config.store.logs_dir);

    for profile in netguard_collectors::inventory::inventory() {
        if profile.mode != CaptureMode::DaemonLogTail {
            continue;
        }
        let log_path = netguard_collectors::inventory::daemon_log_path(&profile, &logs_dir);
        if let Err(e) = netguard_gateway::collectors::run_log_tail(
            &pool,
            &supervisor.registry(),
            &positions,
            &profile,
            &log_path,
        )
        .await
        {
            error!(tool = profile.tool, error = %e, "flush failed for tool");
        }
    }
    info!("backlog flush complete");
    Ok(())
}
