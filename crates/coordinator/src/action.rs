//! Client seam for the downstream action servers.
//!
//! Navigation, arm, parking, and the robot-level state machines all expose
//! the same goal/result contract: fire a goal, poll its state, cancel it.
//! Everything behind this trait (motion control, path planning, perception)
//! is outside the coordination core.

use async_trait::async_trait;
use fleet_core::{Pose, Task};

/// Lifecycle of a dispatched goal, as reported by the action server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalState {
    Pending,
    Active,
    Succeeded,
    Aborted,
}

impl GoalState {
    /// Terminal either way. Mirrors what the scheduler keys its
    /// dependency rules on: the goal is no longer running.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Aborted)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A dispatched unit of work. Immutable once sent; a new goal replaces the
/// prior one atomically from the server's point of view.
///
/// The sequence number is assigned by the dispatcher and echoed back in
/// `GoalStatus`, so a completion report for an already-replaced goal is
/// never mistaken for the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub task: Task,
    pub pose: Option<Pose>,
    pub sequence: u64,
}

/// Snapshot of the server's view: which goal it is talking about, and where
/// that goal is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalStatus {
    pub sequence: u64,
    pub state: GoalState,
}

impl GoalStatus {
    /// No goal received yet. Sequence zero is never assigned to a real goal.
    pub fn idle() -> Self {
        Self {
            sequence: 0,
            state: GoalState::Pending,
        }
    }
}

/// Handle to one downstream action server.
#[async_trait]
pub trait ActionClient: Send + Sync {
    /// Fire-and-forget goal dispatch.
    fn send_goal(&self, goal: Goal);

    /// Cancel the outstanding goal, if any. Dispatchers call this before
    /// replacing a goal so the prior one is not left running blind.
    fn cancel_goal(&self);

    /// Current status of the most recent goal the server accepted.
    fn status(&self) -> GoalStatus;

    /// Block until the server is reachable. No timeout: the fleet cannot
    /// proceed without its actuators, so startup is fail-stop.
    async fn wait_for_server(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_states() {
        assert!(!GoalState::Pending.is_done());
        assert!(!GoalState::Active.is_done());
        assert!(GoalState::Succeeded.is_done());
        assert!(GoalState::Aborted.is_done());
        assert!(GoalState::Succeeded.succeeded());
        assert!(!GoalState::Aborted.succeeded());
    }

    #[test]
    fn test_idle_status_has_reserved_sequence() {
        let status = GoalStatus::idle();
        assert_eq!(status.sequence, 0);
        assert!(!status.state.is_done());
    }
}
