//! Scout task executor.
//!
//! Unlike the excavator and hauler, the scout has no fixed cycle: it runs
//! whichever task the scheduler assigns (search, stop, pinpoint, undock).
//! A successful search or locate publishes the volatile location for the
//! rest of the team.

use std::sync::{Arc, Mutex};

use fleet_core::{Archetype, CompletionStatus, CoreError, Pose, RobotId, Task};
use fleet_events::{Event, EventBus};
use tracing::{error, info, warn};

use crate::action::ActionClient;
use crate::error::Result;
use crate::executors::{publish_status, SubExecutor};

/// The scout's own pose, written by the odometry callback. The located
/// volatile is reported at the scout's position once the localiser stops
/// on top of it.
#[derive(Clone, Default)]
pub struct ScoutInbox {
    own_pose: Arc<Mutex<Option<Pose>>>,
}

impl ScoutInbox {
    pub fn receive_pose(&self, pose: Pose) {
        *self.own_pose.lock().unwrap_or_else(|e| e.into_inner()) = Some(pose);
    }

    fn pose(&self) -> Option<Pose> {
        self.own_pose.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub struct ScoutExecutor {
    robot: RobotId,
    task: Option<Task>,
    completed: bool,
    localiser: SubExecutor,
    nav: SubExecutor,
    inbox: ScoutInbox,
    bus: EventBus,
}

impl ScoutExecutor {
    pub fn new(
        robot: RobotId,
        localiser: Arc<dyn ActionClient>,
        nav: Arc<dyn ActionClient>,
        bus: EventBus,
    ) -> Self {
        Self {
            robot,
            task: None,
            completed: false,
            localiser: SubExecutor::new("resource_localiser", localiser),
            nav: SubExecutor::new("navigation", nav),
            inbox: ScoutInbox::default(),
            bus,
        }
    }

    pub fn inbox(&self) -> ScoutInbox {
        self.inbox.clone()
    }

    pub fn current_task(&self) -> Option<Task> {
        self.task
    }

    pub fn is_done(&self) -> bool {
        self.completed
    }

    pub async fn start(&self) {
        self.localiser.wait_ready().await;
        self.nav.wait_ready().await;
        info!(robot = %self.robot, "all scout action servers ready");
    }

    pub fn assign_code(&mut self, code: i32) -> Result<()> {
        let Some(task) = Task::from_code(code) else {
            error!(robot = %self.robot, code, "unhandled task code, holding current task");
            self.bus.publish(Event::Error {
                message: format!("unhandled task code {code} for {}", self.robot),
                context: Some("scout_executor".to_string()),
            });
            return Err(CoreError::UnknownTaskCode(code).into());
        };
        if task.archetype() != Archetype::Scout {
            error!(robot = %self.robot, task = %task, "task does not belong to the scout");
            self.bus.publish(Event::Error {
                message: format!("task {task} is not a scout task"),
                context: Some("scout_executor".to_string()),
            });
            return Err(CoreError::ArchetypeMismatch {
                archetype: Archetype::Scout,
                task,
            }
            .into());
        }
        if self.task != Some(task) {
            self.localiser.cancel();
            self.nav.cancel();
            self.task = Some(task);
            self.completed = false;
            publish_status(&self.bus, self.robot, task, CompletionStatus::in_progress());
        }
        Ok(())
    }

    pub fn step(&mut self) {
        let Some(task) = self.task else {
            return;
        };
        if self.completed {
            return;
        }
        match task {
            Task::ScoutSearchVolatile => self.run_localiser(Task::ScoutSearchVolatile),
            Task::ScoutLocateVolatile => self.run_localiser(Task::ScoutLocateVolatile),
            Task::ScoutStopSearch => self.stop_search(),
            Task::ScoutUndock => self.undock(),
            // Archetype is checked at assignment; anything else here is a bug.
            other => {
                error!(robot = %self.robot, task = %other, "scout cannot run this task");
            }
        }
    }

    /// Search and locate share the localiser; both finish standing on the
    /// volatile, so the find is reported at the scout's own pose.
    fn run_localiser(&mut self, task: Task) {
        if self.localiser.is_idle() {
            self.localiser.dispatch(task, None);
        } else if self.localiser.try_complete() {
            self.finish(task);
            match self.inbox.pose() {
                Some(pose) => {
                    info!(robot = %self.robot, x = pose.point.x, y = pose.point.y, "volatile found");
                    self.bus.publish(Event::VolatileFound {
                        robot: self.robot,
                        pose,
                    });
                }
                None => {
                    warn!(robot = %self.robot, "volatile found but no odometry received yet");
                }
            }
        }
    }

    fn stop_search(&mut self) {
        self.localiser.cancel();
        self.finish(Task::ScoutStopSearch);
    }

    fn undock(&mut self) {
        if self.nav.is_idle() {
            self.nav.dispatch(Task::ScoutUndock, None);
        } else if self.nav.try_complete() {
            self.finish(Task::ScoutUndock);
        }
    }

    fn finish(&mut self, task: Task) {
        self.completed = true;
        publish_status(&self.bus, self.robot, task, CompletionStatus::done(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::GoalState;
    use crate::executors::test_support::FakeClient;

    fn executor_with(
        bus: EventBus,
    ) -> (ScoutExecutor, Arc<FakeClient>, Arc<FakeClient>) {
        let localiser = FakeClient::shared();
        let nav = FakeClient::shared();
        let executor = ScoutExecutor::new(RobotId::Scout1, localiser.clone(), nav.clone(), bus);
        (executor, localiser, nav)
    }

    #[test]
    fn test_no_task_no_dispatch() {
        let (mut executor, localiser, nav) = executor_with(EventBus::new());
        executor.step();
        assert!(localiser.sent_goals().is_empty());
        assert!(nav.sent_goals().is_empty());
    }

    #[tokio::test]
    async fn test_search_publishes_volatile_at_own_pose() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (mut executor, localiser, _nav) = executor_with(bus);

        executor.inbox().receive_pose(Pose::new(12.0, -4.0, 0.0));
        executor
            .assign_code(Task::ScoutSearchVolatile.code())
            .unwrap();
        executor.step(); // dispatch search
        assert_eq!(
            localiser.last_goal().unwrap().task,
            Task::ScoutSearchVolatile
        );

        localiser.set_state(GoalState::Succeeded);
        executor.step();
        assert!(executor.is_done());

        let mut found = None;
        while let Ok(envelope) = rx.try_recv() {
            if let Event::VolatileFound { pose, .. } = envelope.event {
                found = Some(pose);
            }
        }
        let pose = found.expect("volatile location published");
        assert_eq!(pose.point.x, 12.0);
        assert_eq!(pose.point.y, -4.0);

        // Completed task does not refire.
        executor.step();
        assert_eq!(localiser.sent_goals().len(), 1);
    }

    #[test]
    fn test_undock_uses_navigation() {
        let (mut executor, localiser, nav) = executor_with(EventBus::new());
        executor.assign_code(Task::ScoutUndock.code()).unwrap();
        executor.step();
        assert!(localiser.sent_goals().is_empty());
        assert_eq!(nav.last_goal().unwrap().task, Task::ScoutUndock);

        nav.set_state(GoalState::Succeeded);
        executor.step();
        assert!(executor.is_done());
    }

    #[test]
    fn test_reassignment_cancels_search() {
        let (mut executor, localiser, _nav) = executor_with(EventBus::new());
        executor
            .assign_code(Task::ScoutSearchVolatile.code())
            .unwrap();
        executor.step();
        assert_eq!(localiser.cancel_count(), 0);

        executor.assign_code(Task::ScoutUndock.code()).unwrap();
        assert_eq!(localiser.cancel_count(), 1);
        assert!(!executor.is_done());
    }

    #[test]
    fn test_unknown_code_stalls_in_place() {
        let (mut executor, _localiser, _nav) = executor_with(EventBus::new());
        executor
            .assign_code(Task::ScoutSearchVolatile.code())
            .unwrap();
        assert!(executor.assign_code(999).is_err());
        assert_eq!(executor.current_task(), Some(Task::ScoutSearchVolatile));
    }

    #[test]
    fn test_idempotent_reassignment_keeps_progress() {
        let (mut executor, localiser, _nav) = executor_with(EventBus::new());
        executor
            .assign_code(Task::ScoutSearchVolatile.code())
            .unwrap();
        executor.step();
        // Same task again: no cancel, no restart.
        executor
            .assign_code(Task::ScoutSearchVolatile.code())
            .unwrap();
        assert_eq!(localiser.cancel_count(), 0);
        assert_eq!(localiser.sent_goals().len(), 1);
    }
}
