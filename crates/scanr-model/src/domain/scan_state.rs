use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a scan process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    /// Controller built, nothing prepared yet.
    Created,
    /// Preferences, plugin cache and signals are being set up.
    Initializing,
    /// Control was handed to the attack network.
    Running,
    /// The attack network returned on its own.
    Completed,
    /// A graceful-stop signal ended the scan.
    Stopped,
    /// Initialization or the attack network failed.
    Failed,
}

impl ScanState {
    /// Returns `true` if the scan is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Stopped | ScanState::Failed
        )
    }

    /// Returns `true` while the scan is being prepared or runs.
    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Initializing | ScanState::Running)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Created, Initializing)
                | (Initializing, Running)
                | (Initializing, Failed)
                | (Running, Completed)
                | (Running, Stopped)
                | (Running, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Created => "created",
            ScanState::Initializing => "initializing",
            ScanState::Running => "running",
            ScanState::Completed => "completed",
            ScanState::Stopped => "stopped",
            ScanState::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ScanState::Completed.is_terminal());
        assert!(ScanState::Stopped.is_terminal());
        assert!(ScanState::Failed.is_terminal());

        assert!(!ScanState::Created.is_terminal());
        assert!(!ScanState::Initializing.is_terminal());
        assert!(!ScanState::Running.is_terminal());
    }

    #[test]
    fn transitions_follow_lifecycle() {
        assert!(ScanState::Created.can_transition_to(ScanState::Initializing));
        assert!(ScanState::Initializing.can_transition_to(ScanState::Failed));
        assert!(ScanState::Running.can_transition_to(ScanState::Stopped));

        assert!(!ScanState::Created.can_transition_to(ScanState::Running));
        assert!(!ScanState::Initializing.can_transition_to(ScanState::Stopped));
        assert!(!ScanState::Completed.can_transition_to(ScanState::Running));
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&ScanState::Initializing).unwrap();
        assert_eq!(json, r#""initializing""#);

        let back: ScanState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ScanState::Initializing);
    }
}
