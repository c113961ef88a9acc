use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition: {0:?} -> {1:?}")]
    InvalidTransition(State, State),
}

/// Supervisor lifecycle. `Stopped` is terminal: a supervisor runs once.
pub struct StateMachine {
    state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn can_transition(&self, to: State) -> bool {
        matches!(
            (self.state, to),
            (State::Idle, State::Starting)
                | (State::Starting, State::Running)
                // 실행 실패 시 이미 띄운 프로세스 정리
                | (State::Starting, State::Stopping)
                | (State::Running, State::Stopping)
                | (State::Stopping, State::Stopped)
        )
    }

    pub fn transition(&mut self, to: State) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            tracing::info!("State transition: {:?} -> {:?}", self.state, to);
            self.state = to;
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition(self.state, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.state(), State::Idle);
        assert!(sm.transition(State::Starting).is_ok());
        assert!(sm.transition(State::Running).is_ok());
        assert!(sm.transition(State::Stopping).is_ok());
        assert!(sm.transition(State::Stopped).is_ok());
    }

    #[test]
    fn launch_failure_path() {
        let mut sm = StateMachine::new();
        sm.transition(State::Starting).unwrap();
        sm.transition(State::Stopping).unwrap();
        sm.transition(State::Stopped).unwrap();
        assert_eq!(sm.state(), State::Stopped);
    }

    #[test]
    fn invalid_transition() {
        let mut sm = StateMachine::new();
        // Idle -> Running 직행 불가
        assert_eq!(
            sm.transition(State::Running),
            Err(TransitionError::InvalidTransition(State::Idle, State::Running))
        );
    }

    #[test]
    fn stopped_is_terminal() {
        let mut sm = StateMachine::new();
        for s in [State::Starting, State::Running, State::Stopping, State::Stopped] {
            sm.transition(s).unwrap();
        }
        for s in [State::Idle, State::Starting, State::Running, State::Stopping] {
            assert!(!sm.can_transition(s));
        }
    }
}
