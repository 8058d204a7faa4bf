//! Capture Runner (spec C3): supervises one external capture process for
//! the lifetime of a collector. Grounded on the supervised-loop-with-backoff
//! shape of `mcp-pipeline-guard/src/guard.rs`, generalized from an internal
//! health check to an owned child process.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use netguard_common::retry::{Backoff, BackoffConfig};
use netguard_common::{Error, Result};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

const STDERR_TAIL_CAP: usize = 2048;
const STARTUP_GRACE: Duration = Duration::from_secs(2);
const STABLE_HEALTHY: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How the child's stdout/stderr are wired up, tool-dependent (spec §4.1).
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Log-tailing tools: redirect to a file the parser later tails.
    File(PathBuf),
    /// PCAP-producing tools: child writes its own ring buffer into a
    /// directory; the runner does not capture stdout at all.
    Directory(PathBuf),
    /// Streaming-JSON tools: read the child's stdout as a pipe.
    Pipe,
}

/// Static description of how to launch a capture child, supplied by the
/// owning collector (spec §4.1 "argv configured by the parent collector").
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    pub program: String,
    pub args: Vec<String>,
    pub output: OutputMode,
    /// Passed through to the child as a tool-specific drop-privilege flag
    /// (e.g. `p0f -u user`, `suricata --user=user`), per the supplemented
    /// privilege-drop feature.
    pub run_as_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Exited { code: Option<i32> },
    Backoff,
}

/// Bounded state machine: Idle → Running → Exited → Backoff → Running.
/// Grounded on spec §9's explicit design note against ad-hoc process
/// globals: each collector owns exactly one `CaptureRunner`.
pub struct CaptureRunner {
    spec: CaptureSpec,
    state: RunnerState,
    child: Option<Child>,
    started_at: Option<Instant>,
    stable_since: Option<Instant>,
    backoff: Backoff,
    backoff_until: Option<Instant>,
    stderr_tail: Arc<Mutex<VecDeque<u8>>>,
}

impl CaptureRunner {
    pub fn new(spec: CaptureSpec) -> Self {
        Self {
            spec,
            state: RunnerState::Idle,
            child: None,
            started_at: None,
            stable_since: None,
            backoff: Backoff::new(BackoffConfig::default()),
            backoff_until: None,
            stderr_tail: Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_CAP))),
        }
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Spawns the child per `self.spec`. Fails with `Error::Capture` if the
    /// binary cannot be started at all (missing from `PATH`, permissions).
    pub async fn start(&mut self) -> Result<()> {
        let mut command = Command::new(&self.spec.program);
        command.args(&self.spec.args);
        if let Some(user) = &self.spec.run_as_user {
            command.args(["--run-as-user", user]);
        }

        match &self.spec.output {
            OutputMode::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::Capture(format!("opening output file {path:?}: {e}")))?;
                command.stdout(Stdio::from(file));
                command.stderr(Stdio::piped());
            }
            OutputMode::Directory(_) => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::piped());
            }
            OutputMode::Pipe => {
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
            }
        }

        let mut child = command
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Capture(format!("spawning {}: {e}", self.spec.program)))?;

        if let Some(stderr) = child.stderr.take() {
            self.spawn_stderr_drain(stderr);
        }

        self.started_at = Some(Instant::now());
        self.stable_since = None;
        self.child = Some(child);
        self.state = RunnerState::Running;
        debug!(program = %self.spec.program, "capture child started");
        Ok(())
    }

    fn spawn_stderr_drain(&self, stderr: tokio::process::ChildStderr) {
        let tail = Arc::clone(&self.stderr_tail);
        tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = [0u8; 512];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut guard = tail.lock().unwrap();
                        guard.extend(&buf[..n]);
                        while guard.len() > STDERR_TAIL_CAP {
                            guard.pop_front();
                        }
                    }
                }
            }
        });
    }

    fn stderr_tail_string(&self) -> String {
        let guard = self.stderr_tail.lock().unwrap();
        String::from_utf8_lossy(&guard.iter().copied().collect::<Vec<u8>>()).into_owned()
    }

    /// Checks the child's liveness without blocking. If the child exited,
    /// transitions to `Exited` then schedules a `Backoff`. Returns `true`
    /// if the child is still alive.
    pub fn poll_health(&mut self) -> Result<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };
        match child.try_wait() {
            Ok(None) => {
                if let Some(started) = self.started_at {
                    if self.stable_since.is_none() && started.elapsed() >= STABLE_HEALTHY {
                        self.stable_since = Some(Instant::now());
                        self.backoff.reset();
                    }
                }
                Ok(true)
            }
            Ok(Some(status)) => {
                let code = status.code();
                let tail = self.stderr_tail_string();
                if self
                    .started_at
                    .map(|s| s.elapsed() < STARTUP_GRACE)
                    .unwrap_or(false)
                {
                    error!(program = %self.spec.program, ?code, stderr_tail = %tail, "capture child failed to start");
                    return Err(Error::Capture(format!(
                        "startup failed for {} (code {code:?}): {tail}",
                        self.spec.program
                    )));
                }
                warn!(program = %self.spec.program, ?code, stderr_tail = %tail, "capture child exited unexpectedly");
                self.state = RunnerState::Exited { code };
                self.child = None;
                let delay = self.backoff.next_delay();
                self.backoff_until = Some(Instant::now() + delay);
                self.state = RunnerState::Backoff;
                Ok(false)
            }
            Err(e) => Err(Error::Capture(format!("polling child status: {e}"))),
        }
    }

    /// Restarts the child if currently backing off and the backoff delay
    /// has elapsed. No-op otherwise.
    pub async fn maybe_restart(&mut self) -> Result<bool> {
        if self.state != RunnerState::Backoff {
            return Ok(false);
        }
        let ready = self.backoff_until.map(|t| Instant::now() >= t).unwrap_or(true);
        if !ready {
            return Ok(false);
        }
        self.start().await?;
        Ok(true)
    }

    /// Polite-then-forced shutdown: send `SIGTERM`, wait up to
    /// [`SHUTDOWN_GRACE`], then `SIGKILL`. Guarantees no orphaned child.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            self.state = RunnerState::Idle;
            return Ok(());
        };
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        let waited = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
        match waited {
            Ok(_) => {}
            Err(_) => {
                warn!(program = %self.spec.program, "capture child ignored SIGTERM, force killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        self.state = RunnerState::Idle;
        Ok(())
    }
}
