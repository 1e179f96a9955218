//! Per-robot task executors.
//!
//! Each archetype runs an explicit state machine over its own task graph.
//! Every handler follows the same two-phase pattern: if the relevant
//! sub-executor is idle and the preconditions hold, issue a sub-goal; once
//! the sub-executor reports success, perform the side effect and advance.
//! Preconditions that fail are simply retried on the next tick.

mod excavator;
mod hauler;
mod scout;

pub use excavator::{ExcavatorExecutor, ExcavatorInbox, ExcavatorState};
pub use hauler::{HaulerExecutor, HaulerInbox, HaulerState};
pub use scout::{ScoutExecutor, ScoutInbox};

use std::sync::Arc;

use fleet_core::{CompletionStatus, Pose, RobotId, StatusReport, Task};
use fleet_events::{Event, EventBus};
use tracing::debug;

use crate::action::{ActionClient, Goal};

/// One downstream action server plus the bookkeeping the executor keeps on
/// it: whether we own an in-flight goal, and which sequence number it was
/// dispatched under.
pub(crate) struct SubExecutor {
    name: &'static str,
    client: Arc<dyn ActionClient>,
    idle: bool,
    sequence: u64,
}

impl SubExecutor {
    pub(crate) fn new(name: &'static str, client: Arc<dyn ActionClient>) -> Self {
        Self {
            name,
            client,
            idle: true,
            sequence: 0,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.idle
    }

    pub(crate) fn dispatch(&mut self, task: Task, pose: Option<Pose>) {
        self.sequence += 1;
        debug!(server = self.name, task = %task, "sub-goal dispatched");
        self.client.send_goal(Goal {
            task,
            pose,
            sequence: self.sequence,
        });
        self.idle = false;
    }

    /// Completion phase gate: true exactly once per in-flight goal, when the
    /// server reports success for the goal we dispatched (a stale report for
    /// an older sequence is ignored).
    pub(crate) fn try_complete(&mut self) -> bool {
        if self.idle {
            return false;
        }
        let status = self.client.status();
        if status.sequence == self.sequence && status.state.succeeded() {
            self.idle = true;
            return true;
        }
        false
    }

    /// Abort the in-flight goal before a task switch. The server reports the
    /// aborted result on its own; we stop listening for it.
    pub(crate) fn cancel(&mut self) {
        if !self.idle {
            self.client.cancel_goal();
            self.idle = true;
        }
    }

    pub(crate) async fn wait_ready(&self) {
        self.client.wait_for_server().await;
    }
}

/// Publish a robot's own view of its current task on the status stream.
pub(crate) fn publish_status(bus: &EventBus, robot: RobotId, task: Task, status: CompletionStatus) {
    bus.publish(Event::StatusReported {
        report: StatusReport::new(robot, task, status),
    });
}
