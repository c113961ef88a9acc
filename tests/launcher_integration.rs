//! 런처 통합 테스트: 실제 `sh`/`sleep` 자식 프로세스로 supervisor 수명주기 검증
#![cfg(unix)]

use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use dashkit::config::{LauncherConfig, ResolvedPorts, Service};
use dashkit::reaper::{DiscoveryError, PortProbe, PortReaper};
use dashkit::supervisor::{Mode, State, Supervisor, SupervisorError};

/// 테스트 환경의 실제 리스너를 건드리지 않도록 항상 비어 있는 probe
struct NoListeners;

impl PortProbe for NoListeners {
    fn pids_on_port(&self, _port: u16) -> Result<Vec<u32>, DiscoveryError> {
        Ok(Vec::new())
    }
}

/// Dashboard flags are appended after the script, so `sh -c` sees them as
/// positional parameters and ignores them.
fn config(dashboard_script: &str, auth_script: &str) -> LauncherConfig {
    let toml = format!(
        r#"
        shutdown_grace_ms = 2000

        [dashboard]
        program = "sh"
        args = ["-c", "{dashboard_script}", "dashboard"]

        [auth]
        program = "sh"
        args = ["-c", "{auth_script}"]
        "#
    );
    LauncherConfig::parse(&toml).unwrap()
}

fn supervisor(cfg: LauncherConfig) -> Supervisor {
    Supervisor::new(cfg, ResolvedPorts::defaults(), PortReaper::new(NoListeners, None))
}

#[tokio::test]
async fn development_run_terminates_both_children_on_interrupt() {
    let cfg = config(
        "exec sleep 30",
        "test \\\"$FLASK_DEBUG\\\" = True && test \\\"$FLASK_PORT\\\" = 5001 && exec sleep 30",
    );

    let report = supervisor(cfg)
        .run_until(Mode::Development, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .expect("supervisor run should succeed");

    assert_eq!(report.exits.len(), 2);
    assert_eq!(report.exits[0].service, Service::Dashboard);
    assert_eq!(report.exits[1].service, Service::Auth);
    for exit in &report.exits {
        let status = exit.exit.status().expect("exit status");
        assert_eq!(
            status.signal(),
            Some(nix::libc::SIGTERM),
            "{} should have been stopped by SIGTERM, got {:?}",
            exit.service,
            status
        );
    }
}

#[tokio::test]
async fn production_mode_disables_auth_debug() {
    // 환경 변수가 기대와 다르면 즉시 종료(코드 1)하므로 SIGTERM 여부로 검증
    let cfg = config("exec sleep 30", "test \\\"$FLASK_DEBUG\\\" = False && exec sleep 30");
    let report = supervisor(cfg)
        .run_until(Mode::Production, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    let auth = report.exits.iter().find(|e| e.service == Service::Auth).unwrap();
    assert_eq!(auth.exit.status().and_then(|s| s.signal()), Some(nix::libc::SIGTERM));
}

#[tokio::test]
async fn children_ignoring_sigterm_are_killed_after_grace() {
    let mut cfg = config("trap '' TERM; exec sleep 30", "exec sleep 30");
    cfg.shutdown_grace_ms = Some(300);

    let report = supervisor(cfg)
        .run_until(Mode::Development, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    let dashboard = &report.exits[0];
    assert_eq!(dashboard.service, Service::Dashboard);
    assert_eq!(dashboard.exit.status().and_then(|s| s.signal()), Some(nix::libc::SIGKILL));
}

#[tokio::test]
async fn auth_launch_failure_stops_dashboard() {
    let mut cfg = config("exec sleep 30", "unused");
    cfg.auth.program = Some("definitely-not-an-auth-server-3b7e".to_string());

    let mut sup = supervisor(cfg);
    let err = sup.start(Mode::Development).await.unwrap_err();

    assert!(matches!(err, SupervisorError::Launch { service: Service::Auth, .. }));
    assert_eq!(sup.state(), State::Stopped);
    assert!(sup.processes().is_empty());

    let stopped = sup.exit_reports();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].service, Service::Dashboard);
    assert!(!stopped[0].exit.status().map(|s| s.success()).unwrap_or(false));
}

#[tokio::test]
async fn dashboard_launch_failure_launches_nothing_else() {
    let mut cfg = config("unused", "exec sleep 30");
    cfg.dashboard.program = Some("definitely-not-a-dashboard-3b7e".to_string());

    let mut sup = supervisor(cfg);
    let err = sup.start(Mode::Development).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Launch { service: Service::Dashboard, .. }));
    assert!(sup.exit_reports().is_empty());
}
