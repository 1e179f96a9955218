use serde::{Deserialize, Serialize};

use super::{RobotId, Task};

/// Completion of the last goal a robot's executor ran.
///
/// `succeeded` is only meaningful while `is_done` is set; an in-flight goal
/// reports `{false, false}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub is_done: bool,
    pub succeeded: bool,
}

impl CompletionStatus {
    pub fn done(succeeded: bool) -> Self {
        Self {
            is_done: true,
            succeeded,
        }
    }

    pub fn in_progress() -> Self {
        Self::default()
    }
}

/// Last-known state of one robot. Last-write-wins, no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotStatusRecord {
    pub robot: RobotId,
    pub task: Option<Task>,
    pub status: CompletionStatus,
}

/// Inbound wire form of a status report. The robot name and task code are
/// untrusted and validated at the tracker boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub robot_name: String,
    pub task_code: i32,
    pub current_state_done: bool,
    pub last_state_succeeded: bool,
}

impl StatusReport {
    pub fn new(robot: RobotId, task: Task, status: CompletionStatus) -> Self {
        Self {
            robot_name: robot.name().to_string(),
            task_code: task.code(),
            current_state_done: status.is_done,
            last_state_succeeded: status.succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_in_progress() {
        let status = CompletionStatus::default();
        assert!(!status.is_done);
        assert!(!status.succeeded);
    }

    #[test]
    fn test_report_wire_form() {
        let report = StatusReport::new(
            RobotId::Scout1,
            Task::ScoutSearchVolatile,
            CompletionStatus::done(true),
        );
        assert_eq!(report.robot_name, "small_scout_1");
        assert_eq!(report.task_code, Task::ScoutSearchVolatile.code());
        assert!(report.current_state_done);
        assert!(report.last_state_succeeded);

        let json = serde_json::to_string(&report).unwrap();
        let back: StatusReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
