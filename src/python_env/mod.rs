//! Python 인터프리터 탐색: 두 서비스 모두 Python으로 실행됨
//!
//! 우선순위:
//! 1. launcher 설정의 `python`
//! 2. 활성화된 가상환경 (`VIRTUAL_ENV`)
//! 3. 시스템 Python ≥ 3.9 (`python3`, `python` 순서)

use std::path::PathBuf;
use tokio::process::Command;

use crate::config::LauncherConfig;
use crate::supervisor::error::SupervisorError;

/// 시스템 Python 사용 시 최소 요구 버전 (streamlit 기준)
const MIN_PYTHON_VERSION: (u32, u32) = (3, 9);

pub async fn resolve_interpreter(config: &LauncherConfig) -> Result<String, SupervisorError> {
    if let Some(python) = &config.python {
        return Ok(python.clone());
    }
    if let Some(venv) = std::env::var_os("VIRTUAL_ENV") {
        let exe = venv_python_exe(PathBuf::from(venv));
        if exe.exists() {
            tracing::info!("가상환경 Python 사용: {}", exe.display());
            return Ok(exe.to_string_lossy().into_owned());
        }
    }
    detect_system_python().await.ok_or(SupervisorError::PythonNotFound)
}

fn venv_python_exe(venv: PathBuf) -> PathBuf {
    if cfg!(target_os = "windows") {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// 시스템에서 Python ≥ 3.9 를 탐지합니다.
pub async fn detect_system_python() -> Option<String> {
    for cmd_name in ["python3", "python"] {
        let Ok(output) = Command::new(cmd_name).arg("--version").output().await else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        // Python 2는 버전을 stderr로 출력
        let ver = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        match parse_python_version(&ver) {
            Some(v) if v >= MIN_PYTHON_VERSION => {
                tracing::info!("시스템 Python 발견: {} → {}", cmd_name, ver.trim());
                return Some(cmd_name.to_string());
            }
            Some((major, minor)) => tracing::debug!(
                "{} → {}.{} (최소 {}.{} 필요, 건너뜀)",
                cmd_name,
                major,
                minor,
                MIN_PYTHON_VERSION.0,
                MIN_PYTHON_VERSION.1
            ),
            None => tracing::debug!("{}: 버전 파싱 실패 '{}'", cmd_name, ver.trim()),
        }
    }
    None
}

fn parse_python_version(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let ver_part = s
        .strip_prefix("Python ")
        .or_else(|| s.strip_prefix("python "))
        .unwrap_or(s);
    let mut parts = ver_part.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}
