/// Workflow lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Ready,
    Preparing,
    Running,
    Pausing,
    Paused,
    Resuming,
    Finished,
    Canceling,
    Canceled,
    Failed,
    Disposing,
    Disposed,
}

impl WorkflowState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Preparing => "PREPARING",
            Self::Running => "RUNNING",
            Self::Pausing => "PAUSING",
            Self::Paused => "PAUSED",
            Self::Resuming => "RESUMING",
            Self::Finished => "FINISHED",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Disposing => "DISPOSING",
            Self::Disposed => "DISPOSED",
        }
    }

    /// Whether a workflow in this state may move to `next`
    ///
    /// FAILED, FINISHED and CANCELED only leave for disposal; DISPOSED is final.
    pub fn can_become(self, next: WorkflowState) -> bool {
        match self {
            Self::Disposed => false,
            Self::Disposing => next == Self::Disposed,
            Self::Failed | Self::Finished | Self::Canceled => {
                matches!(next, Self::Disposing | Self::Disposed)
            }
            _ => next != self,
        }
    }

    /// States in which component notifications are no longer of interest
    pub fn is_disposal(self) -> bool {
        matches!(self, Self::Disposing | Self::Disposed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_only_leave_for_disposal() {
        for terminal in [WorkflowState::Failed, WorkflowState::Finished, WorkflowState::Canceled] {
            assert!(!terminal.can_become(WorkflowState::Canceling));
            assert!(!terminal.can_become(WorkflowState::Failed));
            assert!(!terminal.can_become(WorkflowState::Running));
            assert!(terminal.can_become(WorkflowState::Disposing));
        }
        assert!(!WorkflowState::Disposed.can_become(WorkflowState::Ready));
        assert!(WorkflowState::Canceling.can_become(WorkflowState::Failed));
    }

    #[test]
    fn serializes_as_upper_case_name() {
        let json = serde_json::to_string(&WorkflowState::Canceling).unwrap();
        assert_eq!(json, "\"CANCELING\"");
        assert_eq!(WorkflowState::Paused.to_string(), "PAUSED");
    }
}
