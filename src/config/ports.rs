//! `.env.ports` 리더: 두 서비스의 포트를 결정합니다.
//!
//! ```text
//! FLASK_PORT=5001
//! STREAMLIT_PORT=8501
//! ```
//!
//! 파일이 없으면 기본값을 사용합니다. 인식하지 못한 키와 `=`가 없는 줄은
//! 무시하지만, 인식한 키의 값이 포트 번호가 아니면 에러로 처리합니다
//! (잘못된 포트에 바인딩하는 것보다 시작을 중단하는 편이 낫기 때문).

use std::fmt;
use std::path::Path;

use super::ConfigError;

/// The two services the launcher manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Dashboard,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Dashboard => "dashboard",
        }
    }

    /// Key used in `.env.ports` and in the auth server's environment.
    pub fn env_key(self) -> &'static str {
        match self {
            Self::Auth => "FLASK_PORT",
            Self::Dashboard => "STREAMLIT_PORT",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Auth => 5001,
            Self::Dashboard => 8501,
        }
    }

    fn from_env_key(key: &str) -> Option<Self> {
        match key {
            "FLASK_PORT" => Some(Self::Auth),
            "STREAMLIT_PORT" => Some(Self::Dashboard),
            _ => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAssignment {
    pub service: Service,
    pub port: u16,
}

/// Ports for one launcher run. Fixed once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPorts {
    pub auth: PortAssignment,
    pub dashboard: PortAssignment,
}

impl ResolvedPorts {
    pub fn defaults() -> Self {
        Self {
            auth: PortAssignment { service: Service::Auth, port: Service::Auth.default_port() },
            dashboard: PortAssignment {
                service: Service::Dashboard,
                port: Service::Dashboard.default_port(),
            },
        }
    }

    pub fn port_of(&self, service: Service) -> u16 {
        match service {
            Service::Auth => self.auth.port,
            Service::Dashboard => self.dashboard.port,
        }
    }

    /// Auth first, then dashboard.
    pub fn ports(&self) -> [u16; 2] {
        [self.auth.port, self.dashboard.port]
    }
}

impl Default for ResolvedPorts {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Resolve the service ports from a `.env.ports` file.
///
/// A missing file is not an error and yields [`ResolvedPorts::defaults`].
pub fn resolve_ports(path: impl AsRef<Path>) -> Result<ResolvedPorts, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("{} not found, using default ports", path.display());
        return Ok(ResolvedPorts::defaults());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ports = parse_ports(&contents)?;
    tracing::info!(
        "Resolved ports from {}: auth={}, dashboard={}",
        path.display(),
        ports.auth.port,
        ports.dashboard.port
    );
    Ok(ports)
}

/// Pure parser behind [`resolve_ports`].
pub fn parse_ports(contents: &str) -> Result<ResolvedPorts, ConfigError> {
    let mut ports = ResolvedPorts::defaults();

    for (idx, line) in contents.lines().enumerate() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let Some(service) = Service::from_env_key(key) else {
            continue;
        };

        let value = value.trim();
        let port = value.parse::<u16>().map_err(|source| ConfigError::InvalidPort {
            key: key.to_string(),
            value: value.to_string(),
            line: idx + 1,
            source,
        })?;
        if port == 0 {
            return Err(ConfigError::ZeroPort {
                key: key.to_string(),
                line: idx + 1,
            });
        }

        match service {
            Service::Auth => ports.auth.port = port,
            Service::Dashboard => ports.dashboard.port = port,
        }
    }

    // 두 서버가 같은 포트를 두고 경쟁하지 않도록
    if ports.auth.port == ports.dashboard.port {
        return Err(ConfigError::DuplicatePort { port: ports.auth.port });
    }
    Ok(ports)
}
