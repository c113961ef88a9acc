//! Managed Process - a service process owned by the supervisor
//!
//! - stdout/stderr are captured and forwarded into `tracing`, graded by a
//!   configurable log-level pattern
//! - a waiter task publishes the exit through a watch channel
//! - termination is signal based (SIGTERM, then SIGKILL if asked)
//!
//! There is no restart policy: an unexpected exit is logged and nothing else.

use std::process::ExitStatus;
use std::sync::Arc;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::watch;

use crate::config::Service;

use super::error::SupervisorError;
use super::launch::LaunchSpec;
use super::process::{signal_pid, ProcessError, Termination};

/// Streamlit and werkzeug/logging style level keywords.
pub const DEFAULT_LOG_PATTERN: &str = r"\b(?P<level>DEBUG|INFO|WARNING|WARN|ERROR|CRITICAL|FATAL)\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Exited(ExitStatus),
    /// `wait()` itself failed; the process state is unknown.
    WaitFailed,
}

impl ProcessExit {
    pub fn status(&self) -> Option<ExitStatus> {
        match self {
            Self::Exited(status) => Some(*status),
            Self::WaitFailed => None,
        }
    }
}

pub struct ManagedProcess {
    spec: LaunchSpec,
    pid: u32,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl ManagedProcess {
    /// Spawn the process described by `spec`.
    ///
    /// `log_pattern` must contain a named capture group `level`; lines it does
    /// not match are logged at info.
    pub async fn spawn(spec: LaunchSpec, log_pattern: Option<Arc<Regex>>) -> Result<Self, SupervisorError> {
        let mut cmd = TokioCommand::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let launch_error = |source: std::io::Error| SupervisorError::Launch {
            service: spec.service,
            program: spec.program.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(launch_error)?;
        let pid = child.id().ok_or_else(|| {
            launch_error(std::io::Error::new(
                std::io::ErrorKind::Other,
                "process exited before its PID could be read",
            ))
        })?;

        let service = spec.service;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, service, "stdout", log_pattern.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, service, "stderr", log_pattern));
        }

        // ── process waiter ───────────────────────────────────
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => {
                    tracing::info!("{} server (PID {}) exited with {}", service, pid, status);
                    ProcessExit::Exited(status)
                }
                Err(e) => {
                    tracing::error!("Failed to wait for {} server (PID {}): {}", service, pid, e);
                    ProcessExit::WaitFailed
                }
            };
            let _ = exit_tx.send(Some(exit));
        });

        tracing::info!("Started {} server with PID {}: {}", service, pid, spec.command_line());
        Ok(Self { spec, pid, exit_rx })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn service(&self) -> Service {
        self.spec.service
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn is_running(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    /// Ask the process to stop (SIGTERM). No-op once it has exited.
    pub fn terminate(&self) -> Result<(), ProcessError> {
        self.send(Termination::Graceful)
    }

    /// SIGKILL. No-op once it has exited.
    pub fn kill(&self) -> Result<(), ProcessError> {
        self.send(Termination::Forced)
    }

    fn send(&self, how: Termination) -> Result<(), ProcessError> {
        if !self.is_running() {
            return Ok(());
        }
        tracing::info!("Sending {} to {} server (PID {})", how.signal_name(), self.service(), self.pid);
        match signal_pid(self.pid, how) {
            // 시그널 직전에 종료된 경우
            Err(ProcessError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    /// Wait until the process exits.
    pub async fn wait_for_exit(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(exit) = *rx.borrow_and_update() {
                return exit;
            }
            if rx.changed().await.is_err() {
                return (*rx.borrow()).unwrap_or(ProcessExit::WaitFailed);
            }
        }
    }
}

/// Forward child output into `tracing` until EOF.
///
/// The pipe is drained to the end even when a line is not valid UTF-8 or a
/// read fails: dropping the read end would kill the child with SIGPIPE.
async fn forward_output<R>(stream: R, service: Service, source: &'static str, pattern: Option<Arc<Regex>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(|c| c == '\n' || c == '\r');
                match parse_log_level(line, pattern.as_deref()) {
                    LogLevel::Error => tracing::error!(target: "dashkit::child", %service, source, "{}", line),
                    LogLevel::Warn => tracing::warn!(target: "dashkit::child", %service, source, "{}", line),
                    LogLevel::Debug => tracing::debug!(target: "dashkit::child", %service, source, "{}", line),
                    LogLevel::Info => tracing::info!(target: "dashkit::child", %service, source, "{}", line),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot read {} {} output ({}), discarding the rest", service, source, e);
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    tracing::debug!("{} {} pipe closed: {}", service, source, e);
                }
                break;
            }
        }
    }
}

/// Compile a log-level pattern, rejecting patterns without a `level` group.
pub fn compile_log_pattern(pattern: &str) -> Result<Arc<Regex>, SupervisorError> {
    let re = Regex::new(pattern).map_err(|source| SupervisorError::InvalidLogPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    if !re.capture_names().flatten().any(|n| n == "level") {
        return Err(SupervisorError::InvalidLogPattern {
            pattern: pattern.to_string(),
            source: regex::Error::Syntax("missing named group `level`".to_string()),
        });
    }
    Ok(Arc::new(re))
}

/// Parse the log level of a child output line.
///
/// Flask writes its request log to stderr, so stderr is not treated as a
/// warning by itself; only the matched keyword decides.
fn parse_log_level(line: &str, pattern: Option<&Regex>) -> LogLevel {
    if let Some(re) = pattern {
        if let Some(level_match) = re.captures(line).and_then(|caps| caps.name("level")) {
            return match level_match.as_str().to_uppercase().as_str() {
                "ERROR" | "FATAL" | "CRITICAL" => LogLevel::Error,
                "WARN" | "WARNING" => LogLevel::Warn,
                "DEBUG" | "TRACE" => LogLevel::Debug,
                _ => LogLevel::Info,
            };
        }
    }
    LogLevel::Info
}
