//! Frees the dashboard and auth ports by terminating whatever listens on them.
//!
//! Reads `.env.ports` (or `DASHKIT_PORTS_FILE`) like the launcher does.

use dashkit::config::{self, LauncherConfig};
use dashkit::reaper::{PortReaper, ReapOutcome};

fn main() {
    dashkit::init_tracing();

    let cfg = match LauncherConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    // 잘못된 포트 파일이면 엉뚱한 프로세스를 죽이지 않도록 중단
    let ports = match config::resolve_ports(cfg.ports_file()) {
        Ok(ports) => ports,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let targets = ports.ports();
    println!("🔍 Checking for background processes on ports: {:?}", targets);

    let reaper = PortReaper::lsof(cfg.reap_grace());
    for report in reaper.free_ports(&targets) {
        match report.result {
            Ok(reaped) => {
                for process in reaped {
                    println!("⚠️ Port {} is busy (PID: {}). Killing it...", report.port, process.pid);
                    match process.outcome {
                        ReapOutcome::Terminated => {}
                        ReapOutcome::Killed => println!("   PID {} ignored SIGTERM and was killed", process.pid),
                        ReapOutcome::Failed(reason) => {
                            println!("❌ Error killing process on port {}: {}", report.port, reason)
                        }
                    }
                }
            }
            Err(e) => println!("❌ Error checking port {}: {}", report.port, e),
        }
    }
    println!("✨ Cleanup complete.");
}
