//! Launch specifications for the dashboard and auth servers.

use std::path::PathBuf;

use crate::config::{LauncherConfig, ResolvedPorts, Service, ServiceCommand};

const DEFAULT_DASHBOARD_ARGS: &[&str] = &["-m", "streamlit", "run", "dashboard_app.py"];
const DEFAULT_AUTH_ARGS: &[&str] = &["auth_server.py"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// `--prod` anywhere on the command line selects production.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if args.into_iter().any(|a| a.as_ref() == "--prod") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Development => "DEVELOPMENT",
            Self::Production => "PRODUCTION",
        }
    }
}

/// Everything needed to start one service process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub service: Service,
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the launcher's own environment.
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// `true` when at least one service falls back to the python interpreter.
pub fn needs_python(config: &LauncherConfig) -> bool {
    config.dashboard.program.is_none() || config.auth.program.is_none()
}

fn base_command(cmd: &ServiceCommand, python: &str, default_args: &[&str]) -> (String, Vec<String>) {
    let program = cmd.program.clone().unwrap_or_else(|| python.to_string());
    let args = cmd
        .args
        .clone()
        .unwrap_or_else(|| default_args.iter().map(|s| s.to_string()).collect());
    (program, args)
}

pub fn dashboard_spec(config: &LauncherConfig, ports: &ResolvedPorts, python: &str, mode: Mode) -> LaunchSpec {
    let (program, mut args) = base_command(&config.dashboard, python, DEFAULT_DASHBOARD_ARGS);
    args.extend([
        "--server.port".to_string(),
        ports.dashboard.port.to_string(),
        "--server.address".to_string(),
        config.bind_address().to_string(),
        "--server.headless".to_string(),
        "true".to_string(),
    ]);
    // 프로덕션에서는 리버스 프록시 하위 경로에 마운트
    if mode.is_production() {
        args.extend(["--server.baseUrlPath".to_string(), config.base_path().to_string()]);
    }

    LaunchSpec {
        service: Service::Dashboard,
        program,
        args,
        env: Vec::new(),
        working_dir: config.working_dir.clone(),
    }
}

pub fn auth_spec(config: &LauncherConfig, ports: &ResolvedPorts, python: &str, mode: Mode) -> LaunchSpec {
    let (program, args) = base_command(&config.auth, python, DEFAULT_AUTH_ARGS);
    let debug = if mode.is_production() { "False" } else { "True" };

    LaunchSpec {
        service: Service::Auth,
        program,
        args,
        env: vec![
            ("FLASK_DEBUG".to_string(), debug.to_string()),
            (Service::Auth.env_key().to_string(), ports.auth.port.to_string()),
            (Service::Dashboard.env_key().to_string(), ports.dashboard.port.to_string()),
        ],
        working_dir: config.working_dir.clone(),
    }
}

/// Dashboard first, then auth: the order the supervisor launches them in.
pub fn launch_specs(config: &LauncherConfig, ports: &ResolvedPorts, python: &str, mode: Mode) -> [LaunchSpec; 2] {
    [
        dashboard_spec(config, ports, python, mode),
        auth_spec(config, ports, python, mode),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> ResolvedPorts {
        crate::config::ports::parse_ports("FLASK_PORT=6001\nSTREAMLIT_PORT=9501\n").unwrap()
    }

    #[test]
    fn mode_from_args() {
        assert_eq!(Mode::from_args(Vec::<String>::new()), Mode::Development);
        assert_eq!(Mode::from_args(["--prod"]), Mode::Production);
        assert_eq!(Mode::from_args(["-v", "--prod"]), Mode::Production);
        assert_eq!(Mode::from_args(["--production"]), Mode::Development);
    }

    #[test]
    fn development_dashboard_is_headless_on_loopback() {
        let spec = dashboard_spec(&LauncherConfig::default(), &ports(), "python3", Mode::Development);
        assert_eq!(
            spec.command_line(),
            "python3 -m streamlit run dashboard_app.py --server.port 9501 \
             --server.address 127.0.0.1 --server.headless true"
        );
        assert!(spec.env.is_empty());
    }

    #[test]
    fn production_dashboard_gets_base_path() {
        let spec = dashboard_spec(&LauncherConfig::default(), &ports(), "python3", Mode::Production);
        let tail: Vec<&str> = spec.args.iter().rev().take(2).map(String::as_str).collect();
        assert_eq!(tail, vec!["/dashboard-app/", "--server.baseUrlPath"]);
    }

    #[test]
    fn auth_debug_flag_follows_mode() {
        let cfg = LauncherConfig::default();
        let dev = auth_spec(&cfg, &ports(), "python3", Mode::Development);
        let prod = auth_spec(&cfg, &ports(), "python3", Mode::Production);

        assert_eq!(dev.command_line(), "python3 auth_server.py");
        assert_eq!(dev.env_value("FLASK_DEBUG"), Some("True"));
        assert_eq!(prod.env_value("FLASK_DEBUG"), Some("False"));
        assert_eq!(prod.env_value("FLASK_PORT"), Some("6001"));
        assert_eq!(prod.env_value("STREAMLIT_PORT"), Some("9501"));
    }

    #[test]
    fn configured_programs_override_python() {
        let cfg = LauncherConfig::parse(
            r#"
            working_dir = "/srv/app"
            [auth]
            program = "gunicorn"
            args = ["-b", "0.0.0.0:5001", "auth_server:app"]
            "#,
        )
        .unwrap();
        assert!(needs_python(&cfg));

        let [dashboard, auth] = launch_specs(&cfg, &ports(), "py", Mode::Development);
        assert_eq!(dashboard.service, Service::Dashboard);
        assert_eq!(dashboard.program, "py");
        assert_eq!(auth.program, "gunicorn");
        assert_eq!(auth.args[0], "-b");
        assert_eq!(auth.working_dir, Some(PathBuf::from("/srv/app")));
    }
}
