//! Provider process supervision
//!
//! Spawns the provider with piped stdin/stdout/stderr, forwards stderr to
//! the log, and watches for exit. The child itself is owned by a watcher
//! task; everything else talks to it through [`ProcessControl`].

use super::error::McpError;
use crate::config::ProviderConfig;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Log target for lines the provider writes to stderr
pub const PROVIDER_LOG_TARGET: &str = "tidings::provider";

/// Something the supervisor observed about the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The configured banner appeared on stderr
    Banner,
    /// The process exited
    Exited { code: Option<i32> },
}

/// Exit status as seen by the watcher; `None` inside means "killed by signal"
type ExitSlot = Option<Option<i32>>;

/// Shared handle used to stop the process and observe its liveness
#[derive(Debug, Clone)]
pub struct ProcessControl {
    stop: Arc<Mutex<Option<oneshot::Sender<Duration>>>>,
    exit: watch::Receiver<ExitSlot>,
}

impl ProcessControl {
    fn new() -> (Self, oneshot::Receiver<Duration>, watch::Sender<ExitSlot>) {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let control = Self {
            stop: Arc::new(Mutex::new(Some(stop_tx))),
            exit: exit_rx,
        };
        (control, stop_rx, exit_tx)
    }

    /// Control for streams that are not backed by a process we own.
    /// `terminate` simply marks it as exited.
    pub fn detached() -> Self {
        let (control, stop_rx, exit_tx) = Self::new();
        tokio::spawn(async move {
            let _ = stop_rx.await;
            let _ = exit_tx.send(Some(None));
        });
        control
    }

    /// Whether the process is still running
    pub fn is_alive(&self) -> bool {
        self.exit.borrow().is_none()
    }

    /// Exit code, once the process has exited
    pub fn exit_code(&self) -> Option<i32> {
        let status = *self.exit.borrow();
        status.flatten()
    }

    /// Ask the process to stop and wait until it has.
    ///
    /// The caller is expected to have closed stdin already; the process gets
    /// `grace` to exit on its own before it is killed. Idempotent.
    pub async fn terminate(&self, grace: Duration) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(grace);
        }

        let mut exit = self.exit.clone();
        let _ = exit.wait_for(|status| status.is_some()).await;
    }

    /// Request a kill without waiting for it
    pub fn kill_now(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(Duration::ZERO);
        }
    }
}

/// A running provider process and its streams
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    events: Option<mpsc::UnboundedReceiver<ProcessEvent>>,
    control: ProcessControl,
}

impl ProcessHandle {
    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Liveness and termination handle
    pub fn control(&self) -> &ProcessControl {
        &self.control
    }

    /// Split into stdin, stdout, the event stream and the control handle.
    /// Returns `None` if the streams were already taken.
    pub fn into_parts(
        mut self,
    ) -> Option<(
        ChildStdin,
        ChildStdout,
        mpsc::UnboundedReceiver<ProcessEvent>,
        ProcessControl,
    )> {
        Some((
            self.stdin.take()?,
            self.stdout.take()?,
            self.events.take()?,
            self.control.clone(),
        ))
    }
}

/// Launches provider processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSupervisor {
    echo_stderr: bool,
}

impl ProcessSupervisor {
    /// Create a supervisor. `echo_stderr` logs provider stderr at info
    /// level instead of debug.
    pub fn new(echo_stderr: bool) -> Self {
        Self { echo_stderr }
    }

    /// Spawn the provider described by `config`
    pub fn start(&self, config: &ProviderConfig) -> Result<ProcessHandle, McpError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| McpError::spawn(&config.command, e.to_string()))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            return Err(McpError::spawn(
                &config.command,
                "provider streams were not captured",
            ));
        };

        info!(command = %config.command, args = ?config.args, ?pid, "provider process started");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (control, stop_rx, exit_tx) = ProcessControl::new();

        tokio::spawn(forward_stderr(
            stderr,
            config.banner_pattern.clone(),
            events_tx.clone(),
            self.echo_stderr,
        ));
        tokio::spawn(watch_exit(child, stop_rx, exit_tx, events_tx));

        Ok(ProcessHandle {
            pid,
            stdin: Some(stdin),
            stdout: Some(stdout),
            events: Some(events_rx),
            control,
        })
    }
}

/// Relay provider stderr to the log, emitting a banner event on first match
async fn forward_stderr(
    stderr: ChildStderr,
    banner: Option<String>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    echo: bool,
) {
    let mut lines = BufReader::new(stderr).lines();
    let mut banner = banner.filter(|pattern| !pattern.is_empty());

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if echo {
                    info!(target: PROVIDER_LOG_TARGET, "{}", line);
                } else {
                    debug!(target: PROVIDER_LOG_TARGET, "{}", line);
                }

                if banner.as_deref().is_some_and(|pattern| line.contains(pattern)) {
                    banner = None;
                    let _ = events.send(ProcessEvent::Banner);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "provider stderr closed with error");
                break;
            }
        }
    }
}

/// Own the child until it exits, killing it when asked to stop
async fn watch_exit(
    mut child: Child,
    stop: oneshot::Receiver<Duration>,
    exit: watch::Sender<ExitSlot>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        grace = stop => {
            // A dropped control means nobody can stop us later: kill now.
            let grace = grace.unwrap_or(Duration::ZERO);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(?grace, "provider did not exit in time, killing it");
                    if let Err(e) = child.start_kill() {
                        debug!(error = %e, "kill failed");
                    }
                    child.wait().await
                }
            }
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "failed to observe provider exit status");
            None
        }
    };

    info!(?code, "provider process exited");
    let _ = exit.send(Some(code));
    let _ = events.send(ProcessEvent::Exited { code });
}
