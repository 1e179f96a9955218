//! Last-value cache of every robot's reported state.
//!
//! Purely a query/command surface: state only changes through inbound
//! status reports, and `set_desired_state` only publishes a command. There
//! is no state machine here.

use std::collections::HashMap;
use std::sync::Mutex;

use fleet_core::{CompletionStatus, CoreError, RobotId, RobotStatusRecord, StatusReport, Task};
use fleet_events::{Event, EventBus};
use tracing::error;

use crate::error::Result;

pub struct StatusTracker {
    records: Mutex<HashMap<RobotId, RobotStatusRecord>>,
    /// Last finished task per robot. A robot's current record moves on to
    /// the next task almost immediately, so completions are latched here
    /// for observers polling on a slower cadence.
    completed: Mutex<HashMap<RobotId, (Task, bool)>>,
    bus: EventBus,
}

impl StatusTracker {
    pub fn new(bus: EventBus) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Ingest one wire-level status report.
    ///
    /// Unknown robot names and task codes are taxonomy errors: logged,
    /// surfaced on the bus, and dropped without touching any record.
    pub fn report_status(&self, report: &StatusReport) -> Result<()> {
        let robot = match RobotId::parse(&report.robot_name) {
            Some(robot) => robot,
            None => {
                error!(
                    robot_name = %report.robot_name,
                    "status report carries an irregular robot name"
                );
                self.bus.publish(Event::Error {
                    message: format!("irregular robot name: {}", report.robot_name),
                    context: Some("status_tracker".to_string()),
                });
                return Err(CoreError::UnknownRobot(report.robot_name.clone()).into());
            }
        };

        let task = match Task::from_code(report.task_code) {
            Some(task) => task,
            None => {
                error!(
                    robot = %robot,
                    task_code = report.task_code,
                    "status report carries an unknown task code"
                );
                self.bus.publish(Event::Error {
                    message: format!("unknown task code {} from {robot}", report.task_code),
                    context: Some("status_tracker".to_string()),
                });
                return Err(CoreError::UnknownTaskCode(report.task_code).into());
            }
        };

        let record = RobotStatusRecord {
            robot,
            task: Some(task),
            status: CompletionStatus {
                is_done: report.current_state_done,
                succeeded: report.last_state_succeeded,
            },
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(robot, record);
        if report.current_state_done {
            self.completed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(robot, (task, report.last_state_succeeded));
        }
        Ok(())
    }

    /// True once the robot's last reported task finished. False when nothing
    /// has been heard from the robot yet.
    pub fn is_done(&self, robot: RobotId) -> bool {
        self.record(robot)
            .map(|r| r.status.is_done)
            .unwrap_or(false)
    }

    /// True once the robot's last reported task finished successfully.
    pub fn has_succeeded(&self, robot: RobotId) -> bool {
        self.record(robot)
            .map(|r| r.status.is_done && r.status.succeeded)
            .unwrap_or(false)
    }

    /// The robot's last reported task; `None` means idle / never heard from.
    pub fn current_task(&self, robot: RobotId) -> Option<Task> {
        self.record(robot).and_then(|r| r.task)
    }

    /// True if `task` is the most recent task the robot finished, and it
    /// finished successfully. Survives the robot moving on to its next task.
    pub fn has_completed(&self, robot: RobotId, task: Task) -> bool {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&robot)
            == Some(&(task, true))
    }

    pub fn record(&self, robot: RobotId) -> Option<RobotStatusRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&robot)
            .copied()
    }

    /// Command a robot to adopt a task. Side effect only: the local record
    /// is untouched until the robot reports back through `report_status`.
    pub fn set_desired_state(&self, robot: RobotId, task: Task) -> Result<()> {
        if task.archetype() != robot.archetype() {
            error!(robot = %robot, task = %task, "desired task does not fit robot archetype");
            return Err(CoreError::ArchetypeMismatch {
                archetype: robot.archetype(),
                task,
            }
            .into());
        }
        self.bus.publish(Event::DesiredState {
            robot,
            task_code: task.code(),
        });
        Ok(())
    }
}
