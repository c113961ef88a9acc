//! `lsof` 기반 포트 → PID 탐색

use std::io::ErrorKind;
use std::process::{Command, Stdio};

use super::{DiscoveryError, PortProbe};

/// Finds listeners with `lsof -t -nP -iTCP:<port> -sTCP:LISTEN`.
#[derive(Debug, Clone)]
pub struct LsofProbe {
    program: String,
}

impl LsofProbe {
    pub fn new() -> Self {
        Self { program: "lsof".to_string() }
    }

    /// Use a different `lsof` binary (e.g. an absolute path).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for LsofProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProbe for LsofProbe {
    fn pids_on_port(&self, port: u16) -> Result<Vec<u32>, DiscoveryError> {
        let output = Command::new(&self.program)
            .args(["-t", "-nP", &format!("-iTCP:{}", port), "-sTCP:LISTEN"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DiscoveryError::ToolUnavailable {
                    tool: self.program.clone(),
                },
                ErrorKind::PermissionDenied => DiscoveryError::PermissionDenied { port },
                _ => DiscoveryError::Failed {
                    port,
                    reason: e.to_string(),
                },
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return parse_pid_list(&stdout);
        }

        // lsof는 일치하는 프로세스가 없으면 1을 반환: 정상 상태
        if output.status.code() == Some(1) && stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DiscoveryError::Failed {
            port,
            reason: format!("lsof exited with {}: {}", output.status, stderr.trim()),
        })
    }
}

/// Parse terse `lsof -t` output: one PID per line.
pub fn parse_pid_list(output: &str) -> Result<Vec<u32>, DiscoveryError> {
    let mut pids = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let pid = line
            .parse::<u32>()
            .map_err(|_| DiscoveryError::InvalidOutput { line: line.to_string() })?;
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }
    Ok(pids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terse_output() {
        assert_eq!(parse_pid_list("1234\n5678\n").unwrap(), vec![1234, 5678]);
    }

    #[test]
    fn empty_output_means_no_listener() {
        assert!(parse_pid_list("").unwrap().is_empty());
        assert!(parse_pid_list("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn duplicates_are_collapsed() {
        // IPv4 + IPv6 리스너가 같은 PID로 두 번 나옴
        assert_eq!(parse_pid_list("42\n42\n7\n").unwrap(), vec![42, 7]);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse_pid_list("1234\nlsof: WARNING\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidOutput { .. }));
    }

    #[test]
    fn missing_tool_is_reported() {
        let probe = LsofProbe::with_program("definitely-not-lsof-7f3a");
        let err = probe.pids_on_port(5001).unwrap_err();
        assert!(matches!(err, DiscoveryError::ToolUnavailable { .. }));
    }
}
