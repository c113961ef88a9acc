pub mod accounts;
pub mod config;
pub mod process_monitor;
pub mod python_env;
pub mod reaper;
pub mod supervisor;

/// `tracing` 초기화: stdout은 사용자용 출력에 남겨두고 로그는 stderr로
pub fn init_tracing() {
    init_tracing_with("info");
}

/// `RUST_LOG`가 없을 때 `default_filter`를 사용
pub fn init_tracing_with(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}
