pub mod error;
pub mod launch;
pub mod managed_process;
pub mod process;
pub mod state_machine;

use std::future::Future;
use std::sync::Arc;

use regex::Regex;

use crate::config::{LauncherConfig, ResolvedPorts, Service};
use crate::python_env;
use crate::reaper::PortReaper;

pub use error::SupervisorError;
pub use launch::{LaunchSpec, Mode};
pub use managed_process::{ManagedProcess, ProcessExit};
pub use state_machine::State;

use managed_process::{compile_log_pattern, DEFAULT_LOG_PATTERN};
use state_machine::StateMachine;

#[derive(Debug, Clone)]
pub struct ExitReport {
    pub service: Service,
    pub pid: u32,
    pub exit: ProcessExit,
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub exits: Vec<ExitReport>,
}

/// Launches the dashboard and auth servers, keeps them until interrupted,
/// then stops both. Single use: once `Stopped` it cannot be started again.
pub struct Supervisor {
    config: LauncherConfig,
    ports: ResolvedPorts,
    reaper: PortReaper,
    machine: StateMachine,
    processes: Vec<ManagedProcess>,
    exits: Vec<ExitReport>,
}

impl Supervisor {
    pub fn new(config: LauncherConfig, ports: ResolvedPorts, reaper: PortReaper) -> Self {
        Self {
            config,
            ports,
            reaper,
            machine: StateMachine::new(),
            processes: Vec::new(),
            exits: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn ports(&self) -> &ResolvedPorts {
        &self.ports
    }

    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    /// Exits of the children stopped so far, including those stopped
    /// because a sibling failed to launch.
    pub fn exit_reports(&self) -> &[ExitReport] {
        &self.exits
    }

    /// Free the ports and launch both servers (dashboard first).
    ///
    /// If either launch fails, the children already started are stopped, the
    /// supervisor ends in `Stopped` and the launch error is returned.
    pub async fn start(&mut self, mode: Mode) -> Result<(), SupervisorError> {
        self.machine.transition(State::Starting)?;
        println!("🚀 Starting dashkit in {} mode...", mode.label());

        if let Err(e) = self.launch_all(mode).await {
            tracing::error!("Startup failed [{}]: {}", e.error_code(), e);
            self.machine.transition(State::Stopping)?;
            let exits = self.stop_children().await;
            if !exits.is_empty() {
                tracing::info!("Stopped {} already launched process(es)", exits.len());
            }
            self.machine.transition(State::Stopped)?;
            return Err(e);
        }

        self.machine.transition(State::Running)?;
        self.print_banner(mode);
        Ok(())
    }

    async fn launch_all(&mut self, mode: Mode) -> Result<(), SupervisorError> {
        let pattern = self.log_pattern()?;

        let reports = self.reaper.free_ports_async(self.ports.ports().to_vec()).await;
        for report in reports.iter().filter(|r| r.is_busy()) {
            tracing::info!("Freed port {} before launch", report.port);
        }

        let python = if launch::needs_python(&self.config) {
            python_env::resolve_interpreter(&self.config).await?
        } else {
            String::new()
        };

        if mode.is_production() {
            println!("📁 Dashboard configured for {} proxy path", self.config.base_path());
        }
        for spec in launch::launch_specs(&self.config, &self.ports, &python, mode) {
            if spec.service == Service::Auth {
                println!(
                    "🌐 Starting auth server (Debug: {})...",
                    if mode.is_production() { "OFF" } else { "ON" }
                );
            }
            let process = ManagedProcess::spawn(spec, pattern.clone()).await?;
            self.processes.push(process);
        }
        Ok(())
    }

    fn log_pattern(&self) -> Result<Option<Arc<Regex>>, SupervisorError> {
        let pattern = self.config.log_pattern.as_deref().unwrap_or(DEFAULT_LOG_PATTERN);
        compile_log_pattern(pattern).map(Some)
    }

    fn print_banner(&self, mode: Mode) {
        println!("\n✅ Systems are running!");
        if mode.is_production() {
            println!("👉 Access via the reverse proxy (dashboard at {})", self.config.base_path());
            println!("⚠️  Warning: In --prod mode, a reverse proxy (e.g. Nginx) is expected in front of both services.");
        } else {
            println!("👉 Access the app at: http://localhost:{}", self.ports.auth.port);
        }
        println!("Press Ctrl+C to stop both servers.");
    }

    /// Stop both servers: SIGTERM, then SIGKILL for anything still alive
    /// after the shutdown grace period.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport, SupervisorError> {
        self.machine.transition(State::Stopping)?;
        println!("\n🛑 Stopping servers...");
        let exits = self.stop_children().await;
        self.machine.transition(State::Stopped)?;
        println!("Done.");
        Ok(ShutdownReport { exits })
    }

    async fn stop_children(&mut self) -> Vec<ExitReport> {
        for process in &self.processes {
            if let Err(e) = process.terminate() {
                tracing::warn!("Failed to terminate {} server: {}", process.service(), e);
            }
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace();
        let mut exits = Vec::with_capacity(self.processes.len());
        for process in self.processes.drain(..) {
            let exit = match tokio::time::timeout_at(deadline, process.wait_for_exit()).await {
                Ok(exit) => exit,
                Err(_) => {
                    tracing::warn!(
                        "{} server (PID {}) did not stop in time, killing",
                        process.service(),
                        process.pid()
                    );
                    if let Err(e) = process.kill() {
                        tracing::error!("Failed to kill {} server: {}", process.service(), e);
                    }
                    tokio::time::timeout(self.config.shutdown_grace(), process.wait_for_exit())
                        .await
                        .unwrap_or(ProcessExit::WaitFailed)
                }
            };
            exits.push(ExitReport {
                service: process.service(),
                pid: process.pid(),
                exit,
            });
        }
        self.exits.extend(exits.iter().cloned());
        exits
    }

    /// Start, wait for `signal`, shut down.
    pub async fn run_until<F>(mut self, mode: Mode, signal: F) -> Result<ShutdownReport, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        self.start(mode).await?;
        signal.await;
        tracing::info!("Shutdown signal received");
        self.shutdown().await
    }

    /// Run until Ctrl+C / SIGTERM.
    pub async fn run(self, mode: Mode) -> Result<ShutdownReport, SupervisorError> {
        self.run_until(mode, shutdown_signal()).await
    }
}

/// Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM ({}), waiting for Ctrl+C only", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
