pub mod ports;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use ports::{resolve_ports, PortAssignment, ResolvedPorts, Service};

pub const DEFAULT_CONFIG_PATH: &str = "config/launcher.toml";
pub const DEFAULT_PORTS_FILE: &str = ".env.ports";
pub const DEFAULT_BASE_PATH: &str = "/dashboard-app/";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid port for {key} on line {line}: '{value}' ({source})")]
    InvalidPort {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("port 0 is not a valid listening port for {key} on line {line}")]
    ZeroPort { key: String, line: usize },

    #[error("auth and dashboard are both configured for port {port}")]
    DuplicatePort { port: u16 },

    #[error("invalid launcher config {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Command used to start one service. Missing `program` means "the python interpreter".
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ServiceCommand {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

/// `config/launcher.toml`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LauncherConfig {
    pub python: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub ports_file: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub base_path: Option<String>,
    pub reap_grace_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub log_pattern: Option<String>,
    #[serde(default)]
    pub dashboard: ServiceCommand,
    #[serde(default)]
    pub auth: ServiceCommand,
}

impl LauncherConfig {
    /// Load from `DASHKIT_CONFIG` or `config/launcher.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DASHKIT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Launcher config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&s).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// `DASHKIT_PORTS_FILE` wins over the config file.
    pub fn ports_file(&self) -> PathBuf {
        if let Ok(p) = std::env::var("DASHKIT_PORTS_FILE") {
            return PathBuf::from(p);
        }
        self.ports_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PORTS_FILE))
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or(DEFAULT_BASE_PATH)
    }

    /// `None` disables SIGKILL escalation in the reaper (`reap_grace_ms = 0`).
    pub fn reap_grace(&self) -> Option<Duration> {
        match self.reap_grace_ms.unwrap_or(3_000) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms.unwrap_or(5_000))
    }
}
