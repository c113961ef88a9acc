//! Supervisor 에러 타입

use crate::config::Service;

use super::state_machine::TransitionError;

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("failed to launch {service} server ('{program}'): {source}")]
    Launch {
        service: Service,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("invalid log pattern '{pattern}': {source}")]
    InvalidLogPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no python interpreter found; set `python` in the launcher config")]
    PythonNotFound,
}

impl SupervisorError {
    /// 머신 리더블 에러 코드
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "LAUNCH_FAILED",
            Self::Transition(_) => "INVALID_TRANSITION",
            Self::InvalidLogPattern { .. } => "INVALID_LOG_PATTERN",
            Self::PythonNotFound => "PYTHON_NOT_FOUND",
        }
    }
}
