use sysinfo::{Pid, ProcessStatus, System};

/// 특정 PID가 살아 있는지 확인 (크로스 플랫폼)
///
/// 좀비 프로세스는 이미 종료된 것으로 봅니다. 시그널을 받은 자식이 아직
/// 부모에게 수거되지 않았을 뿐이므로 더 기다려도 사라지지 않습니다.
pub fn is_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes();
    match sys.process(Pid::from_u32(pid)) {
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}

/// 프로세스 이름 조회 (로그 출력용)
pub fn process_name(pid: u32) -> Option<String> {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.process(Pid::from_u32(pid)).map(|p| p.name().to_string())
}

// ── Async wrappers ─────────────────────────────────────────
// sysinfo는 OS 프로세스 테이블 전체를 동기적으로 스캔하므로
// tokio 워커 스레드를 막지 않도록 spawn_blocking으로 실행합니다.

pub async fn is_alive_async(pid: u32) -> bool {
    tokio::task::spawn_blocking(move || is_alive(pid))
        .await
        .unwrap_or(false)
}

pub async fn process_name_async(pid: u32) -> Option<String> {
    tokio::task::spawn_blocking(move || process_name(pid))
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(process_name(std::process::id()).is_some());
    }

    #[test]
    fn unused_pid_is_not_alive() {
        // PID 상한(pid_max) 바깥 값
        assert!(!is_alive(u32::MAX - 1));
        assert!(process_name(u32::MAX - 1).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn zombie_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        // 수거 전까지 좀비로 남음
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!is_alive(pid));
        child.wait().unwrap();
    }

    #[tokio::test]
    async fn async_wrappers() {
        assert!(is_alive_async(std::process::id()).await);
        assert!(process_name_async(u32::MAX - 1).await.is_none());
    }
}
