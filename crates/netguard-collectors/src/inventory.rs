//! Tool inventory: cadence and argv template per collector (spec §4.3
//! table). Cadences are expressed as the midpoint of any range the spec
//! gives (e.g. p0f's 30-300s becomes a configurable default of 60s).

use std::time::Duration;

use netguard_capture::OutputMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// PCAP ring buffer, read via an offline `tshark -T json` pass.
    PcapOfflineTshark,
    /// Live capture window, tshark invoked directly with a time bound.
    LiveWindow,
    /// Long-lived daemon whose stdout/stderr is redirected to a log file
    /// the collector tails.
    DaemonLogTail,
    /// Capture step followed by an offline analysis step (argus → `ra`).
    CaptureThenAnalyse,
    /// Short, bounded-duration run whose stdout is parsed directly.
    ShortBoundedRun,
}

#[derive(Debug, Clone)]
pub struct ToolProfile {
    pub tool: &'static str,
    pub mode: CaptureMode,
    pub cadence: Duration,
    pub program: &'static str,
    pub base_args: &'static [&'static str],
}

/// The full tool inventory (spec §4.3 table), in the order the supervisor
/// starts collectors.
pub fn inventory() -> Vec<ToolProfile> {
    vec![
        ToolProfile {
            tool: "tcpdump",
            mode: CaptureMode::PcapOfflineTshark,
            cadence: Duration::from_secs(60),
            program: "tcpdump",
            base_args: &["-w"],
        },
        ToolProfile {
            tool: "tshark",
            mode: CaptureMode::LiveWindow,
            cadence: Duration::from_secs(35),
            program: "tshark",
            base_args: &["-a", "duration:30", "-T", "json"],
        },
        ToolProfile {
            tool: "p0f",
            mode: CaptureMode::DaemonLogTail,
            cadence: Duration::from_secs(60),
            program: "p0f",
            base_args: &[],
        },
        ToolProfile {
            tool: "ngrep",
            mode: CaptureMode::DaemonLogTail,
            cadence: Duration::from_secs(30),
            program: "ngrep",
            base_args: &["-q", "-t"],
        },
        ToolProfile {
            tool: "httpry",
            mode: CaptureMode::DaemonLogTail,
            cadence: Duration::from_secs(30),
            program: "httpry",
            base_args: &[],
        },
        ToolProfile {
            tool: "argus",
            mode: CaptureMode::CaptureThenAnalyse,
            cadence: Duration::from_secs(30),
            program: "argus",
            base_args: &["-w"],
        },
        ToolProfile {
            tool: "netsniff",
            mode: CaptureMode::PcapOfflineTshark,
            cadence: Duration::from_secs(30),
            program: "netsniff-ng",
            base_args: &["-o"],
        },
        ToolProfile {
            tool: "iftop",
            mode: CaptureMode::ShortBoundedRun,
            cadence: Duration::from_secs(60),
            program: "iftop",
            base_args: &["-t", "-n", "-P", "-s", "5"],
        },
        ToolProfile {
            tool: "nethogs",
            mode: CaptureMode::ShortBoundedRun,
            cadence: Duration::from_secs(30),
            program: "nethogs",
            base_args: &["-t", "-c", "5"],
        },
        ToolProfile {
            tool: "suricata",
            mode: CaptureMode::DaemonLogTail,
            cadence: Duration::from_secs(15),
            program: "suricata",
            base_args: &["-c", "/etc/suricata/suricata.yaml"],
        },
    ]
}

/// Default output wiring for a tool's capture mode, used when the
/// supervisor doesn't override it from config. Suricata manages its own
/// `eve.json` inside the given directory (passed `-l <logs_dir>`) rather
/// than writing events to stdout, so it gets `Directory` wiring like the
/// PCAP tools even though its `CaptureMode` is `DaemonLogTail`.
pub fn default_output_mode(profile: &ToolProfile, capture_dir: &std::path::Path, logs_dir: &std::path::Path) -> OutputMode {
    match profile.mode {
        CaptureMode::PcapOfflineTshark => OutputMode::Directory(capture_dir.join(profile.tool)),
        CaptureMode::LiveWindow => OutputMode::Pipe,
        CaptureMode::DaemonLogTail if profile.tool == "suricata" => OutputMode::Directory(logs_dir.to_path_buf()),
        CaptureMode::DaemonLogTail => OutputMode::File(logs_dir.join(format!("{}.log", profile.tool))),
        CaptureMode::CaptureThenAnalyse => OutputMode::Directory(capture_dir.join(profile.tool)),
        CaptureMode::ShortBoundedRun => OutputMode::Pipe,
    }
}

/// Path a `DaemonLogTail` collector tails for `profile`. Matches
/// [`default_output_mode`]'s wiring: suricata writes `eve.json` into the
/// directory it was given via `-l`, every other daemon tool's stdout is
/// redirected straight to `<tool>.log`.
pub fn daemon_log_path(profile: &ToolProfile, logs_dir: &std::path::Path) -> std::path::PathBuf {
    if profile.tool == "suricata" {
        logs_dir.join("eve.json")
    } else {
        logs_dir.join(format!("{}.log", profile.tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_covers_every_spec_tool() {
        let tools: Vec<&str> = inventory().iter().map(|p| p.tool).collect();
        for expected in [
            "tcpdump", "tshark", "p0f", "ngrep", "httpry", "argus", "netsniff", "iftop", "nethogs", "suricata",
        ] {
            assert!(tools.contains(&expected), "missing {expected} in inventory");
        }
    }

    #[test]
    fn suricata_has_the_tightest_cadence() {
        let profiles = inventory();
        let suricata = profiles.iter().find(|p| p.tool == "suricata").unwrap();
        assert!(profiles.iter().all(|p| p.cadence >= suricata.cadence));
    }

    #[test]
    fn suricata_log_path_is_eve_json_not_a_tool_named_log() {
        let profiles = inventory();
        let suricata = profiles.iter().find(|p| p.tool == "suricata").unwrap();
        let logs_dir = std::path::Path::new("/var/log/netguard");
        assert_eq!(daemon_log_path(suricata, logs_dir), logs_dir.join("eve.json"));
        match default_output_mode(suricata, std::path::Path::new("/captures"), logs_dir) {
            OutputMode::Directory(dir) => assert_eq!(dir, logs_dir.to_path_buf()),
            other => panic!("expected Directory output mode for suricata, got {other:?}"),
        }
    }

    #[test]
    fn other_daemon_tools_tail_a_tool_named_log_file() {
        let profiles = inventory();
        let p0f = profiles.iter().find(|p| p.tool == "p0f").unwrap();
        let logs_dir = std::path::Path::new("/var/log/netguard");
        assert_eq!(daemon_log_path(p0f, logs_dir), logs_dir.join("p0f.log"));
    }
}
