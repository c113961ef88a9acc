//! Port reaper: frees a TCP port by terminating whatever process listens on it.
//!
//! Discovery goes through a [`PortProbe`] (`lsof` in production). Each PID found
//! receives SIGTERM; if it is still alive after the grace period it receives
//! SIGKILL. A port with no listener is already in the desired state, so
//! [`PortReaper::free_port`] treats it as success.

pub mod lsof;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::process_monitor;
use crate::supervisor::process::{signal_pid, ProcessError, Termination};

pub use lsof::{parse_pid_list, LsofProbe};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("port discovery tool '{tool}' is not available")]
    ToolUnavailable { tool: String },

    #[error("permission denied while inspecting port {port}")]
    PermissionDenied { port: u16 },

    #[error("port discovery for {port} failed: {reason}")]
    Failed { port: u16, reason: String },

    #[error("unexpected discovery output: '{line}'")]
    InvalidOutput { line: String },
}

/// Platform capability: which processes listen on a port.
pub trait PortProbe: Send + Sync {
    fn pids_on_port(&self, port: u16) -> Result<Vec<u32>, DiscoveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Exited after SIGTERM (or was already gone).
    Terminated,
    /// Needed SIGKILL after the grace period.
    Killed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedProcess {
    pub pid: u32,
    pub name: Option<String>,
    pub outcome: ReapOutcome,
}

#[derive(Debug)]
pub struct PortReport {
    pub port: u16,
    pub result: Result<Vec<ReapedProcess>, DiscoveryError>,
}

impl PortReport {
    pub fn is_busy(&self) -> bool {
        matches!(&self.result, Ok(reaped) if !reaped.is_empty())
    }
}

#[derive(Clone)]
pub struct PortReaper {
    probe: Arc<dyn PortProbe>,
    grace: Option<Duration>,
}

impl PortReaper {
    /// `grace = None` sends SIGTERM only, without waiting or escalating.
    pub fn new(probe: impl PortProbe + 'static, grace: Option<Duration>) -> Self {
        Self {
            probe: Arc::new(probe),
            grace,
        }
    }

    pub fn lsof(grace: Option<Duration>) -> Self {
        Self::new(LsofProbe::new(), grace)
    }

    pub fn discover(&self, port: u16) -> Result<Vec<u32>, DiscoveryError> {
        self.probe.pids_on_port(port)
    }

    /// Terminate every process listening on `port`. Idempotent.
    pub fn free_port(&self, port: u16) -> Result<Vec<ReapedProcess>, DiscoveryError> {
        let pids = self.probe.pids_on_port(port)?;
        if pids.is_empty() {
            tracing::debug!("Port {} is free", port);
            return Ok(Vec::new());
        }

        let own_pid = std::process::id();
        let mut reaped = Vec::with_capacity(pids.len());
        for pid in pids {
            if pid == own_pid {
                tracing::warn!("Port {} is held by this process (PID {}), skipping", port, pid);
                continue;
            }
            let name = process_monitor::process_name(pid);
            tracing::warn!(
                "Port {} is busy (PID {}{}), terminating",
                port,
                pid,
                name.as_deref().map(|n| format!(", {}", n)).unwrap_or_default()
            );
            let outcome = self.reap_pid(pid);
            match &outcome {
                ReapOutcome::Failed(reason) => {
                    tracing::error!("Could not free port {} from PID {}: {}", port, pid, reason)
                }
                other => tracing::info!("PID {} on port {}: {:?}", pid, port, other),
            }
            reaped.push(ReapedProcess { pid, name, outcome });
        }
        Ok(reaped)
    }

    /// Free each port in order. Discovery failures are logged and the
    /// remaining ports are still processed.
    pub fn free_ports(&self, ports: &[u16]) -> Vec<PortReport> {
        ports
            .iter()
            .map(|&port| {
                let result = self.free_port(port);
                if let Err(e) = &result {
                    tracing::warn!("Skipping cleanup of port {}: {}", port, e);
                }
                PortReport { port, result }
            })
            .collect()
    }

    /// [`free_ports`](Self::free_ports) on the blocking thread pool.
    ///
    /// If the blocking task itself dies, every port gets a failed report.
    pub async fn free_ports_async(&self, ports: Vec<u16>) -> Vec<PortReport> {
        let reaper = self.clone();
        let requested = ports.clone();
        match tokio::task::spawn_blocking(move || reaper.free_ports(&ports)).await {
            Ok(reports) => reports,
            Err(e) => {
                tracing::error!("Port reaper task failed: {}", e);
                requested
                    .into_iter()
                    .map(|port| PortReport {
                        port,
                        result: Err(DiscoveryError::Failed {
                            port,
                            reason: format!("reaper task failed: {}", e),
                        }),
                    })
                    .collect()
            }
        }
    }

    fn reap_pid(&self, pid: u32) -> ReapOutcome {
        match signal_pid(pid, Termination::Graceful) {
            Ok(()) => {}
            Err(ProcessError::NotFound { .. }) => return ReapOutcome::Terminated,
            Err(e) => return ReapOutcome::Failed(e.to_string()),
        }

        let Some(grace) = self.grace else {
            return ReapOutcome::Terminated;
        };
        if wait_until_dead(pid, grace) {
            return ReapOutcome::Terminated;
        }

        tracing::warn!("PID {} ignored SIGTERM for {:?}, sending SIGKILL", pid, grace);
        match signal_pid(pid, Termination::Forced) {
            Ok(()) | Err(ProcessError::NotFound { .. }) => ReapOutcome::Killed,
            Err(e) => ReapOutcome::Failed(e.to_string()),
        }
    }
}

fn wait_until_dead(pid: u32, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        if !process_monitor::is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 포트 → PID 고정 매핑. 이미 죽은 PID는 보고하지 않음.
    #[derive(Default)]
    struct FakeProbe {
        listeners: Mutex<HashMap<u16, Vec<u32>>>,
        broken: Vec<u16>,
    }

    impl FakeProbe {
        fn with(port: u16, pids: Vec<u32>) -> Self {
            let probe = Self::default();
            probe.listeners.lock().unwrap().insert(port, pids);
            probe
        }
    }

    impl PortProbe for FakeProbe {
        fn pids_on_port(&self, port: u16) -> Result<Vec<u32>, DiscoveryError> {
            if self.broken.contains(&port) {
                return Err(DiscoveryError::ToolUnavailable { tool: "fake".into() });
            }
            let map = self.listeners.lock().unwrap();
            Ok(map
                .get(&port)
                .map(|pids| pids.iter().copied().filter(|&p| process_monitor::is_alive(p)).collect())
                .unwrap_or_default())
        }
    }

    #[test]
    fn free_port_without_listener_is_noop() {
        let reaper = PortReaper::new(FakeProbe::default(), Some(Duration::from_millis(200)));
        assert!(reaper.free_port(5001).unwrap().is_empty());
        // 두 번 호출해도 동일
        assert!(reaper.free_port(5001).unwrap().is_empty());
    }

    #[test]
    fn never_signals_own_process() {
        let reaper = PortReaper::new(
            FakeProbe::with(5001, vec![std::process::id()]),
            Some(Duration::from_millis(100)),
        );
        assert!(reaper.free_port(5001).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn terminates_listener_and_port_becomes_free() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let reaper = PortReaper::new(
            FakeProbe::with(8501, vec![child.id()]),
            Some(Duration::from_secs(5)),
        );

        let reaped = reaper.free_port(8501).unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].pid, child.id());
        assert_eq!(reaped[0].outcome, ReapOutcome::Terminated);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(nix::libc::SIGTERM));
        assert!(reaper.discover(8501).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn escalates_to_sigkill_when_sigterm_is_ignored() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = std::process::Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .unwrap();
        // trap 설치 전에 시그널이 도착하지 않도록 대기
        std::thread::sleep(Duration::from_millis(300));

        let reaper = PortReaper::new(
            FakeProbe::with(9000, vec![child.id()]),
            Some(Duration::from_millis(300)),
        );
        let reaped = reaper.free_port(9000).unwrap();
        assert_eq!(reaped[0].outcome, ReapOutcome::Killed);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(nix::libc::SIGKILL));
    }

    #[test]
    fn discovery_failure_does_not_stop_other_ports() {
        let probe = FakeProbe {
            broken: vec![5001],
            ..FakeProbe::default()
        };
        let reaper = PortReaper::new(probe, None);

        let reports = reaper.free_ports(&[5001, 8501]);
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].result, Err(DiscoveryError::ToolUnavailable { .. })));
        assert!(reports[1].result.as_ref().unwrap().is_empty());
        assert!(!reports[1].is_busy());
    }

    struct PanickingProbe;

    impl PortProbe for PanickingProbe {
        fn pids_on_port(&self, _port: u16) -> Result<Vec<u32>, DiscoveryError> {
            panic!("probe crashed");
        }
    }

    #[tokio::test]
    async fn crashed_reaper_task_reports_every_port_as_failed() {
        let reaper = PortReaper::new(PanickingProbe, None);
        let reports = reaper.free_ports_async(vec![5001, 8501]).await;

        assert_eq!(reports.iter().map(|r| r.port).collect::<Vec<_>>(), vec![5001, 8501]);
        for report in &reports {
            assert!(matches!(&report.result, Err(DiscoveryError::Failed { reason, .. }) if reason.contains("reaper task failed")));
            assert!(!report.is_busy());
        }
    }

    #[tokio::test]
    async fn async_free_ports() {
        let reaper = PortReaper::new(FakeProbe::default(), None);
        let reports = reaper.free_ports_async(vec![1, 2]).await;
        assert_eq!(reports.iter().map(|r| r.port).collect::<Vec<_>>(), vec![1, 2]);
    }
}
