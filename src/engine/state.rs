use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How much of a finished run produced results.
///
/// Only channel transfers, conversion, spectra and the xy transform count. A
/// resonance fit that does not converge leaves the channel's bundle in place
/// and shows up in `RunReport::fit_failures` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every channel (and the xy transform, if requested) succeeded
    Complete,
    /// Some channels failed, others have bundles
    Partial,
    /// No channel produced a bundle
    Failed,
}

/// Acquisition session states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
        channels: usize,
    },
    Completed {
        #[serde(skip)]
        duration: Option<Duration>,
        status: RunStatus,
    },
    /// The run never reached the channels (bad connection or setup)
    Failed { error_msg: String },
}

impl RunState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &RunState) -> bool {
        use RunState::*;

        matches!(
            (self, target),
            (Idle, Running { .. })
                | (Running { .. }, Completed { .. })
                | (Running { .. }, Failed { .. })
                | (Completed { .. }, Running { .. })
                | (Completed { .. }, Idle)
                | (Failed { .. }, Running { .. })
                | (Failed { .. }, Idle)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Completed { .. } => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let idle = RunState::Idle;
        let running = RunState::Running {
            start_time: None,
            channels: 2,
        };

        assert!(idle.can_transition_to(&running));
        assert!(!running.can_transition_to(&idle));
        assert!(!running.can_transition_to(&running));
    }

    #[test]
    fn test_new_run_after_completion() {
        let completed = RunState::Completed {
            duration: None,
            status: RunStatus::Partial,
        };
        let failed = RunState::Failed {
            error_msg: "timeout".to_string(),
        };
        let running = RunState::Running {
            start_time: None,
            channels: 1,
        };

        assert!(completed.can_transition_to(&running));
        assert!(failed.can_transition_to(&running));
        assert!(!RunState::Idle.can_transition_to(&completed));
    }
}
