//! PID 단위 시그널 전송 헬퍼 (reaper와 supervisor가 공유)

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("process {pid} not found")]
    NotFound { pid: u32 },
    #[error("permission denied to signal process {pid}")]
    PermissionDenied { pid: u32 },
    #[error("failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM: 프로세스가 스스로 정리할 기회를 줌
    Graceful,
    /// SIGKILL
    Forced,
}

impl Termination {
    pub fn signal_name(self) -> &'static str {
        match self {
            Self::Graceful => "TERM",
            Self::Forced => "KILL",
        }
    }
}

/// Send a termination signal to `pid`. Cross-platform helper.
pub fn signal_pid(pid: u32, how: Termination) -> Result<(), ProcessError> {
    tracing::debug!("Sending {} signal to pid {}", how.signal_name(), pid);

    #[cfg(not(target_os = "windows"))]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| ProcessError::NotFound { pid })?;
        let sig = match how {
            Termination::Graceful => Signal::SIGTERM,
            Termination::Forced => Signal::SIGKILL,
        };
        match signal::kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ProcessError::NotFound { pid }),
            Err(Errno::EPERM) => Err(ProcessError::PermissionDenied { pid }),
            Err(e) => Err(ProcessError::TerminationFailed {
                pid,
                reason: format!("Failed to send signal: {}", e),
            }),
        }
    }

    // Windows에는 SIGTERM이 없으므로 두 경우 모두 TerminateProcess
    #[cfg(target_os = "windows")]
    {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
        use winapi::um::winnt::PROCESS_TERMINATE;

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(ProcessError::NotFound { pid });
            }
            let exit_code = if how == Termination::Forced { 1 } else { 0 };
            let result = TerminateProcess(handle, exit_code);
            CloseHandle(handle);
            if result == 0 {
                return Err(ProcessError::TerminationFailed {
                    pid,
                    reason: "TerminateProcess failed".to_string(),
                });
            }
        }
        Ok(())
    }
}
