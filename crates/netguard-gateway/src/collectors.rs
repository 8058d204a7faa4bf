//! Per-tool collector cycle bodies (spec C5/§4.3), dispatched by
//! `netguard_collectors::inventory::CaptureMode`. Log-tailing tools reuse
//! `netguard_collectors::worker::run_log_tail_cycle` directly; bounded-run
//! tools (PCAP, live-window, capture-then-analyse, short-bounded) invoke
//! their capture binary to completion each cadence tick and hand the
//! output straight to the matching parser, since there is nothing to
//! supervise between runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use netguard_capture::{CaptureSpec, OutputMode, PositionStore};
use netguard_common::{Error, Result};
use netguard_parsers::GeoIpLookup;
use netguard_store::TableRegistry;
use sqlx::SqlitePool;
use tokio::process::Command;
use tracing::{error, warn};

use netguard_collectors::collector::flush_batch;
use netguard_collectors::inventory::{self, ToolProfile};

/// Batch size ceiling applied uniformly across tools (spec §4.3
/// backpressure); tool-specific tuning is left to deployment config.
const BATCH_CEILING: usize = 500;
const BOUNDED_RUN_TIMEOUT: Duration = Duration::from_secs(45);

/// Runs `program` to completion with the given args, bounded by
/// [`BOUNDED_RUN_TIMEOUT`], and returns its captured stdout as text.
async fn run_bounded(program: &str, args: &[&str]) -> Result<String> {
    let output = tokio::time::timeout(BOUNDED_RUN_TIMEOUT, Command::new(program).args(args).output())
        .await
        .map_err(|_| Error::Timeout(format!("{program} did not complete within the capture window")))?
        .map_err(|e| Error::Capture(format!("running {program}: {e}")))?;
    if !output.status.success() {
        warn!(program, code = ?output.status.code(), "bounded capture exited non-zero");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Builds the [`CaptureSpec`] to hand a [`netguard_capture::CaptureRunner`]
/// for one of the four `DaemonLogTail` tools (spec C3: the capture runner
/// owns the child process, the log-tail cycle only ever reads the file it
/// produces). Suricata is given its own `-l <logs_dir>` flag so it manages
/// `eve.json` itself; the others take `-i <interface>` and have their
/// stdout redirected to `<tool>.log` by the runner.
pub fn daemon_capture_spec(
    profile: &ToolProfile,
    capture_dir: &Path,
    logs_dir: &Path,
    interface: &str,
    run_as_user: Option<String>,
) -> CaptureSpec {
    let mut args: Vec<String> = vec!["-i".to_string(), interface.to_string()];
    args.extend(profile.base_args.iter().map(|s| s.to_string()));
    if profile.tool == "suricata" {
        args.push("-l".to_string());
        args.push(logs_dir.to_string_lossy().into_owned());
    }
    let output: OutputMode = inventory::default_output_mode(profile, capture_dir, logs_dir);
    CaptureSpec { program: profile.program.to_string(), args, output, run_as_user }
}

/// Runs one cycle for a `DaemonLogTail` tool: tail `log_path` from its
/// stored position and flush whatever the tool-specific parser produces.
/// The daemon binary itself is supervised separately by a
/// [`netguard_capture::CaptureRunner`]; this function only ever reads the
/// file that runner's child process is writing.
pub async fn run_log_tail(
    pool: &SqlitePool,
    registry: &TableRegistry,
    positions: &PositionStore,
    profile: &ToolProfile,
    log_path: &Path,
) -> Result<()> {
    let outcome = match profile.tool {
        "p0f" => {
            netguard_collectors::run_log_tail_cycle(
                pool,
                registry,
                positions,
                "p0f",
                "p0f.log",
                log_path,
                BATCH_CEILING,
                netguard_parsers::p0f::parse,
            )
            .await?
        }
        "ngrep" => {
            netguard_collectors::run_log_tail_cycle(
                pool,
                registry,
                positions,
                "ngrep",
                "ngrep.log",
                log_path,
                BATCH_CEILING,
                netguard_parsers::ngrep::parse,
            )
            .await?
        }
        "httpry" => {
            netguard_collectors::run_log_tail_cycle(
                pool,
                registry,
                positions,
                "httpry",
                "httpry.log",
                log_path,
                BATCH_CEILING,
                netguard_parsers::httpry::parse,
            )
            .await?
        }
        "suricata" => {
            netguard_collectors::run_log_tail_cycle(
                pool,
                registry,
                positions,
                "suricata",
                "eve.json",
                log_path,
                BATCH_CEILING,
                netguard_parsers::suricata::parse,
            )
            .await?
        }
        other => {
            error!(tool = other, "no log-tail wiring registered for this tool");
            return Ok(());
        }
    };
    if outcome.inserted > 0 {
        tracing::info!(tool = profile.tool, inserted = outcome.inserted, "collector cycle flushed rows");
    }
    Ok(())
}

/// Runs one cycle for a `PcapOfflineTshark` tool (`tcpdump`, `netsniff`):
/// capture to a PCAP file for the tool's cadence window, then project it
/// through `tshark -T json` and the tool's own thin wrapper parser.
pub async fn run_pcap_offline(
    pool: &SqlitePool,
    registry: &TableRegistry,
    profile: &ToolProfile,
    capture_dir: &Path,
    geoip: &GeoIpLookup,
    interface: &str,
) -> Result<()> {
    let pcap_path = capture_dir.join(format!("{}.pcap", profile.tool));
    let pcap_path_str = pcap_path.to_string_lossy().into_owned();
    let duration_secs = profile.cadence.as_secs().to_string();

    let program = if profile.tool == "netsniff" { "netsniff-ng" } else { "tcpdump" };
    let args: Vec<&str> = if profile.tool == "netsniff" {
        vec!["-o", &pcap_path_str, "-s0", "-b", &duration_secs]
    } else {
        vec!["-i", interface, "-w", &pcap_path_str, "-G", &duration_secs, "-W", "1"]
    };
    run_bounded(program, &args).await?;

    let json = run_bounded("tshark", &["-T", "json", "-r", &pcap_path_str]).await?;
    let records = if profile.tool == "netsniff" {
        netguard_parsers::netsniff::parse(&json, geoip).await?
    } else {
        netguard_parsers::tcpdump::parse(&json, geoip).await?
    };
    let outcome = flush_batch(pool, registry, profile.tool, &records, BATCH_CEILING).await?;
    if outcome.inserted > 0 {
        tracing::info!(tool = profile.tool, inserted = outcome.inserted, "collector cycle flushed rows");
    }
    Ok(())
}

/// Runs one cycle for the `LiveWindow` tool (`tshark`): invoke `tshark`
/// directly with its bounded `-a duration:N` flag and parse its JSON
/// output straight from stdout.
pub async fn run_live_window(
    pool: &SqlitePool,
    registry: &TableRegistry,
    profile: &ToolProfile,
    geoip: &GeoIpLookup,
    interface: &str,
) -> Result<()> {
    let mut args: Vec<&str> = vec!["-i", interface];
    args.extend_from_slice(profile.base_args);
    let json = run_bounded(profile.program, &args).await?;
    let records = netguard_parsers::tshark::parse(&json, geoip).await?;
    let outcome = flush_batch(pool, registry, profile.tool, &records, BATCH_CEILING).await?;
    if outcome.inserted > 0 {
        tracing::info!(tool = profile.tool, inserted = outcome.inserted, "collector cycle flushed rows");
    }
    Ok(())
}

/// Runs one cycle for the `CaptureThenAnalyse` tool (`argus`): capture to a
/// binary flow file, then project it through `ra`'s text report (spec
/// §4.2's "capture → analyse → `ra` workaround").
pub async fn run_capture_then_analyse(
    pool: &SqlitePool,
    registry: &TableRegistry,
    profile: &ToolProfile,
    capture_dir: &Path,
    interface: &str,
) -> Result<()> {
    let flow_path: PathBuf = capture_dir.join("argus.out");
    let flow_path_str = flow_path.to_string_lossy().into_owned();
    let duration_secs = profile.cadence.as_secs().to_string();

    run_bounded(
        "argus",
        &["-i", interface, "-w", &flow_path_str, "-T", &duration_secs],
    )
    .await?;

    let report = run_bounded(
        "ra",
        &[
            "-n",
            "-s",
            "stime,proto,saddr,sport,dir,daddr,dport,state,dur,sbytes,dbytes,pkts",
            "-r",
            &flow_path_str,
        ],
    )
    .await?;
    let records = netguard_parsers::argus::parse(&report)?;
    let outcome = flush_batch(pool, registry, profile.tool, &records, BATCH_CEILING).await?;
    if outcome.inserted > 0 {
        tracing::info!(tool = profile.tool, inserted = outcome.inserted, "collector cycle flushed rows");
    }
    Ok(())
}

/// Runs one cycle for a `ShortBoundedRun` tool (`iftop`, `nethogs`): the
/// command itself is bounded (`-s 5`, `-c 5`), so the cadence is simply
/// "run it to completion, parse stdout, repeat".
pub async fn run_short_bounded(
    pool: &SqlitePool,
    registry: &TableRegistry,
    profile: &ToolProfile,
    interface: &str,
) -> Result<()> {
    let mut args: Vec<&str> = vec!["-i", interface];
    args.extend_from_slice(profile.base_args);
    let output = run_bounded(profile.program, &args).await?;

    let outcome = match profile.tool {
        "iftop" => {
            let records = netguard_parsers::iftop::parse(&output)?;
            flush_batch(pool, registry, profile.tool, &records, BATCH_CEILING).await?
        }
        "nethogs" => {
            let records = netguard_parsers::nethogs::parse(&output)?;
            flush_batch(pool, registry, profile.tool, &records, BATCH_CEILING).await?
        }
        other => {
            error!(tool = other, "no short-bounded-run wiring registered for this tool");
            return Ok(());
        }
    };
    if outcome.inserted > 0 {
        tracing::info!(tool = profile.tool, inserted = outcome.inserted, "collector cycle flushed rows");
    }
    Ok(())
}
