//! Command-line surface (spec §9 open question: scorer daemon vs. batch).
//! Builder-style `clap::Command`, matching
//! `mcp-gateway/src/bin/main.rs`'s argument wiring rather than a derived
//! `Parser`, since that is how the teacher's own binary is built.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Parsed top-level invocation.
pub enum Invocation {
    /// Run the full collector + correlator + AI worker set until signalled
    /// to stop (the default when no subcommand is given).
    Serve { config_path: Option<PathBuf>, ai_config_path: PathBuf },
    /// Run the device registry, vulnerability scanner, and alert engine
    /// once each and exit, without starting any collector.
    Scan { config_path: Option<PathBuf> },
    /// Run one scoring pass over all known devices and exit.
    Score { config_path: Option<PathBuf> },
    /// Flush any pending collector state and exit, without starting the
    /// long-lived worker set (used to drain a log-tail backlog offline).
    Flush { config_path: Option<PathBuf> },
}

pub fn build_command() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .help("Override the Store database path (defaults to NETGUARD_DB_PATH / ./network.db)")
        .required(false);

    Command::new("netguard-pro")
        .version(env!("CARGO_PKG_VERSION"))
        .about("NetGuard Pro - home/small-network security observatory")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug-level logging")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the full collector + correlator + AI worker set")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("ai-config")
                        .long("ai-config")
                        .value_name("FILE")
                        .help("Path to ai_config.json (default: config/ai_config.json)")
                        .required(false),
                ),
        )
        .subcommand(
            Command::new("scan")
                .about("Run the device registry, vulnerability scanner, and alert engine once")
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("score")
                .about("Run one device security-scoring pass and exit")
                .arg(config_arg.clone()),
        )
        .subcommand(
            Command::new("flush")
                .about("Drain pending collector backlog without starting the worker set")
                .arg(config_arg),
        )
}

/// Resolves the parsed matches into an [`Invocation`], defaulting to
/// `serve` when no subcommand was given (spec §6: running the binary with
/// no arguments starts the full observatory).
pub fn parse(matches: &clap::ArgMatches) -> Invocation {
    let default_config = |m: &clap::ArgMatches| m.get_one::<String>("config").map(PathBuf::from);

    match matches.subcommand() {
        Some(("serve", sub)) => Invocation::Serve {
            config_path: default_config(sub),
            ai_config_path: sub
                .get_one::<String>("ai-config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/ai_config.json")),
        },
        Some(("scan", sub)) => Invocation::Scan { config_path: default_config(sub) },
        Some(("score", sub)) => Invocation::Score { config_path: default_config(sub) },
        Some(("flush", sub)) => Invocation::Flush { config_path: default_config(sub) },
        _ => Invocation::Serve { config_path: None, ai_config_path: PathBuf::from("config/ai_config.json") },
    }
}
