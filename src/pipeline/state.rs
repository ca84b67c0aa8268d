//! Stream state management

use std::time::Instant;

/// Run state of the streaming engine.
///
/// A single instance lives behind the StreamManager's mutex. Idle moves
/// to Running only via `start`, Running back to Idle only via `stop`;
/// repeated calls are rejected without touching the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream active.
    Idle,

    /// A capture loop is ticking.
    Running {
        /// When the stream started
        started_at: Instant,
    },
}

impl StreamState {
    /// A fresh Running state stamped with the current instant.
    pub fn running() -> Self {
        StreamState::Running {
            started_at: Instant::now(),
        }
    }

    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &StreamState) -> bool {
        use StreamState::*;

        match (self, target) {
            (Idle, Running { .. }) => true,
            (Running { .. }, Idle) => true,

            // repeat start/stop calls are guarded, not idempotent
            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            StreamState::Idle => "Idle",
            StreamState::Running { .. } => "Running",
        }
    }

    /// Check if a stream is active
    pub fn is_running(&self) -> bool {
        matches!(self, StreamState::Running { .. })
    }

    /// Get the duration since the stream started (if running)
    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let StreamState::Running { started_at } = self {
            Some(started_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let idle = StreamState::Idle;
        let running = StreamState::running();

        assert!(idle.can_transition_to(&running));
        assert!(running.can_transition_to(&idle));
    }

    #[test]
    fn test_repeat_transitions_rejected() {
        let idle = StreamState::Idle;
        let running = StreamState::running();

        assert!(!idle.can_transition_to(&idle));
        assert!(!running.can_transition_to(&StreamState::running()));
    }

    #[test]
    fn test_state_checks() {
        let idle = StreamState::Idle;
        let running = StreamState::running();

        assert!(!idle.is_running());
        assert!(idle.running_duration().is_none());

        assert!(running.is_running());
        assert!(running.running_duration().is_some());
    }
}
