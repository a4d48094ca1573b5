//! Decoder stage lifecycle

use std::time::Instant;

/// Decoder stage state machine
///
/// A stage is single-use: it starts waiting for a keyframe, runs once the
/// gate opens, and ends either stopped or failed. Nothing leads back to
/// `WaitingForKeyframe` or `Running` once left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// No keyframe seen yet; units are discarded
    WaitingForKeyframe,

    /// Gate opened, units are decoded and frames delivered
    Running {
        /// When the first keyframe was accepted
        started_at: Instant,
    },

    /// The codec context could not be initialized
    Failed,

    /// Shut down; nothing is decoded or delivered anymore
    Stopped,
}

impl StageState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &StageState) -> bool {
        use StageState::*;

        match (self, target) {
            // From WaitingForKeyframe
            (WaitingForKeyframe, Running { .. }) => true,
            (WaitingForKeyframe, Stopped) => true,

            // From Running
            (Running { .. }, Failed) => true,
            (Running { .. }, Stopped) => true,

            // From Failed
            (Failed, Stopped) => true,

            // From Stopped - no transitions allowed
            (Stopped, _) => false,

            // Self-transitions
            (a, b) if a == b => true,

            // All other transitions invalid
            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            StageState::WaitingForKeyframe => "WaitingForKeyframe",
            StageState::Running { .. } => "Running",
            StageState::Failed => "Failed",
            StageState::Stopped => "Stopped",
        }
    }

    /// Check if the stage is decoding and delivering frames
    pub fn is_running(&self) -> bool {
        matches!(self, StageState::Running { .. })
    }

    /// Check if the stage still waits for its first keyframe
    pub fn is_waiting(&self) -> bool {
        matches!(self, StageState::WaitingForKeyframe)
    }

    /// Check if the stage can never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Failed | StageState::Stopped)
    }

    /// Get the duration since the gate opened (if running)
    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let StageState::Running { started_at } = self {
            Some(started_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let waiting = StageState::WaitingForKeyframe;
        let running = StageState::Running {
            started_at: Instant::now(),
        };
        let failed = StageState::Failed;
        let stopped = StageState::Stopped;

        assert!(waiting.can_transition_to(&running));
        assert!(waiting.can_transition_to(&stopped));
        assert!(running.can_transition_to(&failed));
        assert!(running.can_transition_to(&stopped));
        assert!(failed.can_transition_to(&stopped));

        // Self-transitions
        assert!(waiting.can_transition_to(&waiting));
        assert!(running.can_transition_to(&running));
    }

    #[test]
    fn test_invalid_transitions() {
        let waiting = StageState::WaitingForKeyframe;
        let running = StageState::Running {
            started_at: Instant::now(),
        };
        let failed = StageState::Failed;
        let stopped = StageState::Stopped;

        assert!(!running.can_transition_to(&waiting)); // Gate never closes again
        assert!(!failed.can_transition_to(&running)); // Init failure is fatal
        assert!(!stopped.can_transition_to(&running)); // Can't restart after stopped
        assert!(!stopped.can_transition_to(&waiting));
        assert!(!waiting.can_transition_to(&failed)); // Codec is only touched once running
    }

    #[test]
    fn test_state_checks() {
        let running = StageState::Running {
            started_at: Instant::now(),
        };

        assert!(running.is_running());
        assert!(!running.is_terminal());
        assert!(running.running_duration().is_some());

        assert!(StageState::WaitingForKeyframe.is_waiting());
        assert!(StageState::Failed.is_terminal());
        assert!(StageState::Stopped.is_terminal());
        assert!(!StageState::Stopped.is_running());
        assert_eq!(StageState::Failed.to_string(), "Failed");
    }
}
