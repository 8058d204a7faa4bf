//! Supervisor and CLI for NetGuard Pro (spec C11): wires the collector
//! inventory (C1-C5), correlators (C6-C9), and AI aggregator (C10) into
//! one long-lived process, plus one-shot subcommands for scanning and
//! scoring without the full worker set.

pub mod cli;
pub mod collectors;
pub mod config_file;
pub mod supervisor;

pub use config_file::AiConfigFile;
pub use supervisor::Supervisor;
