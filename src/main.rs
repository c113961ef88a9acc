use anyhow::Context;

use dashkit::config::{self, LauncherConfig};
use dashkit::reaper::PortReaper;
use dashkit::supervisor::{Mode, Supervisor};

fn print_help() {
    println!("dashkit {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: dashkit [--prod]");
    println!();
    println!("  --prod    mount the dashboard under the reverse-proxy base path and disable auth debug mode");
    println!();
    println!("Environment:");
    println!("  DASHKIT_CONFIG       launcher config (default: config/launcher.toml)");
    println!("  DASHKIT_PORTS_FILE   port file (default: .env.ports)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| matches!(a.as_str(), "help" | "--help" | "-h")) {
        print_help();
        return Ok(());
    }
    for unknown in args.iter().filter(|a| a.as_str() != "--prod") {
        eprintln!("Ignoring unknown argument: {}", unknown);
    }

    dashkit::init_tracing();
    let mode = Mode::from_args(&args);
    tracing::info!("dashkit launcher starting ({:?})", mode);

    let cfg = LauncherConfig::load().context("failed to load launcher config")?;
    let ports = config::resolve_ports(cfg.ports_file())
        .context("refusing to start with an invalid port file")?;
    let reaper = PortReaper::lsof(cfg.reap_grace());

    let report = Supervisor::new(cfg, ports, reaper).run(mode).await?;
    for exit in &report.exits {
        tracing::info!("{} server (PID {}) stopped: {:?}", exit.service, exit.pid, exit.exit);
    }
    Ok(())
}
