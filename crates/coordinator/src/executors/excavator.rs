//! Excavator task executor.
//!
//! Waits for a scout-reported volatile location, drives to it, parks and
//! announces readiness for the hauler, digs into the parked hauler, then
//! queues up for the next site.

use std::sync::{Arc, Mutex};

use fleet_core::{Archetype, CompletionStatus, CoreError, Pose, RobotId, Task};
use fleet_events::{Event, EventBus};
use tracing::{error, info};

use crate::action::ActionClient;
use crate::error::Result;
use crate::executors::{publish_status, SubExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcavatorState {
    Init,
    GoToVolatile,
    ParkAndPub,
    DigAndDump,
    NextQueTask,
}

impl ExcavatorState {
    pub fn task(&self) -> Option<Task> {
        match self {
            Self::Init => None,
            Self::GoToVolatile => Some(Task::ExcavatorGoToLoc),
            Self::ParkAndPub => Some(Task::ExcavatorParkAndPub),
            Self::DigAndDump => Some(Task::ExcavatorDigAndDumpVolatile),
            Self::NextQueTask => Some(Task::ExcavatorNextQueTask),
        }
    }

    pub fn for_task(task: Task) -> Option<Self> {
        match task {
            Task::ExcavatorGoToLoc | Task::ExcavatorGoToScout => Some(Self::GoToVolatile),
            Task::ExcavatorParkAndPub => Some(Self::ParkAndPub),
            Task::ExcavatorDigAndDumpVolatile => Some(Self::DigAndDump),
            Task::ExcavatorNextQueTask => Some(Self::NextQueTask),
            // Arm homing is a sub-goal, not a state of its own; treat it as
            // the entry point of the cycle.
            Task::ExcavatorGoToDefaultArmPose => Some(Self::Init),
            _ => None,
        }
    }
}

/// Callback-written inputs: the volatile location (flag and payload under
/// one lock) and the hauler's parked signal.
#[derive(Clone, Default)]
pub struct ExcavatorInbox {
    volatile: Arc<Mutex<Option<Pose>>>,
    hauler_parked: Arc<Mutex<bool>>,
}

impl ExcavatorInbox {
    pub fn receive_volatile(&self, pose: Pose) {
        *self.volatile.lock().unwrap_or_else(|e| e.into_inner()) = Some(pose);
    }

    pub fn hauler_parked(&self) {
        *self.hauler_parked.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    fn volatile_pose(&self) -> Option<Pose> {
        self.volatile.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear_volatile(&self) {
        *self.volatile.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn take_hauler_parked(&self) -> bool {
        let mut parked = self.hauler_parked.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *parked)
    }
}

pub struct ExcavatorExecutor {
    robot: RobotId,
    state: ExcavatorState,
    nav: SubExecutor,
    arm: SubExecutor,
    inbox: ExcavatorInbox,
    bus: EventBus,
    ready_published: bool,
    /// Which alias the current drive-out leg was commanded under (GoToLoc
    /// or GoToScout); completion is reported under the same label.
    nav_task: Task,
}

impl ExcavatorExecutor {
    pub fn new(
        robot: RobotId,
        nav: Arc<dyn ActionClient>,
        arm: Arc<dyn ActionClient>,
        bus: EventBus,
    ) -> Self {
        Self {
            robot,
            state: ExcavatorState::Init,
            nav: SubExecutor::new("navigation", nav),
            arm: SubExecutor::new("excavator_arm", arm),
            inbox: ExcavatorInbox::default(),
            bus,
            ready_published: false,
            nav_task: Task::ExcavatorGoToLoc,
        }
    }

    pub fn inbox(&self) -> ExcavatorInbox {
        self.inbox.clone()
    }

    pub fn state(&self) -> ExcavatorState {
        self.state
    }

    pub async fn start(&self) {
        self.nav.wait_ready().await;
        self.arm.wait_ready().await;
        info!(robot = %self.robot, "all excavator action servers ready");
    }

    pub fn assign_code(&mut self, code: i32) -> Result<()> {
        let Some(task) = Task::from_code(code) else {
            error!(robot = %self.robot, code, "unhandled task code, holding current state");
            self.bus.publish(Event::Error {
                message: format!("unhandled task code {code} for {}", self.robot),
                context: Some("excavator_executor".to_string()),
            });
            return Err(CoreError::UnknownTaskCode(code).into());
        };
        let Some(state) = ExcavatorState::for_task(task) else {
            error!(robot = %self.robot, task = %task, "task does not belong to the excavator graph");
            self.bus.publish(Event::Error {
                message: format!("task {task} is not an excavator task"),
                context: Some("excavator_executor".to_string()),
            });
            return Err(CoreError::ArchetypeMismatch {
                archetype: Archetype::Excavator,
                task,
            }
            .into());
        };
        if state == ExcavatorState::GoToVolatile {
            // Relabel only; a drive already in flight keeps going.
            self.nav_task = task;
        }
        if state != self.state {
            self.nav.cancel();
            self.arm.cancel();
            self.advance(state);
        }
        Ok(())
    }

    pub fn step(&mut self) {
        match self.state {
            ExcavatorState::Init => self.init(),
            ExcavatorState::GoToVolatile => self.go_to_volatile(),
            ExcavatorState::ParkAndPub => self.park_and_pub(),
            ExcavatorState::DigAndDump => self.dig_and_dump(),
            ExcavatorState::NextQueTask => self.next_que_task(),
        }
    }

    fn init(&mut self) {
        if self.inbox.volatile_pose().is_some() {
            info!(robot = %self.robot, "volatile located, heading out");
            self.advance(ExcavatorState::GoToVolatile);
        }
    }

    fn go_to_volatile(&mut self) {
        if self.nav.is_idle() {
            if let Some(pose) = self.inbox.volatile_pose() {
                self.nav.dispatch(self.nav_task, Some(pose));
            }
        } else if self.nav.try_complete() {
            self.advance(ExcavatorState::ParkAndPub);
        }
    }

    fn park_and_pub(&mut self) {
        if !self.ready_published {
            info!(robot = %self.robot, "parked, ready to receive hauler");
            self.bus.publish(Event::ExcavatorReady { robot: self.robot });
            self.ready_published = true;
        }
        if self.inbox.take_hauler_parked() {
            self.advance(ExcavatorState::DigAndDump);
        }
    }

    fn dig_and_dump(&mut self) {
        if self.arm.is_idle() {
            self.arm.dispatch(Task::ExcavatorDigAndDumpVolatile, None);
        } else if self.arm.try_complete() {
            info!(robot = %self.robot, "dig cycle complete, hauler filled");
            self.bus.publish(Event::HaulerFilled { robot: self.robot });
            self.advance(ExcavatorState::NextQueTask);
        }
    }

    fn next_que_task(&mut self) {
        self.inbox.clear_volatile();
        self.ready_published = false;
        self.nav_task = Task::ExcavatorGoToLoc;
        self.advance(ExcavatorState::Init);
    }

    /// The reportable task for a state, honoring the commanded alias for
    /// the drive-out leg.
    fn task_of(&self, state: ExcavatorState) -> Option<Task> {
        if state == ExcavatorState::GoToVolatile {
            Some(self.nav_task)
        } else {
            state.task()
        }
    }

    fn advance(&mut self, next: ExcavatorState) {
        if let Some(task) = self.task_of(self.state) {
            publish_status(&self.bus, self.robot, task, CompletionStatus::done(true));
        }
        info!(robot = %self.robot, from = ?self.state, to = ?next, "excavator state advanced");
        self.state = next;
        if let Some(task) = self.task_of(self.state) {
            publish_status(&self.bus, self.robot, task, CompletionStatus::in_progress());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::GoalState;
    use crate::executors::test_support::FakeClient;

    fn executor_with(
        bus: EventBus,
    ) -> (ExcavatorExecutor, Arc<FakeClient>, Arc<FakeClient>) {
        let nav = FakeClient::shared();
        let arm = FakeClient::shared();
        let executor =
            ExcavatorExecutor::new(RobotId::Excavator1, nav.clone(), arm.clone(), bus);
        (executor, nav, arm)
    }

    #[test]
    fn test_init_holds_until_volatile_reported() {
        let (mut executor, nav, _arm) = executor_with(EventBus::new());
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::Init);
        assert!(nav.sent_goals().is_empty());

        executor.inbox().receive_volatile(Pose::new(7.0, 3.0, 0.0));
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::GoToVolatile);
    }

    #[tokio::test]
    async fn test_cycle_publishes_ready_then_filled() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (mut executor, nav, arm) = executor_with(bus);
        let inbox = executor.inbox();

        inbox.receive_volatile(Pose::new(7.0, 3.0, 0.0));
        executor.step(); // Init -> GoToVolatile
        executor.step(); // dispatch nav goal
        assert_eq!(nav.last_goal().unwrap().task, Task::ExcavatorGoToLoc);

        nav.set_state(GoalState::Succeeded);
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::ParkAndPub);

        // First park step announces readiness exactly once.
        executor.step();
        executor.step();
        let mut ready_count = 0;
        while let Ok(envelope) = rx.try_recv() {
            if matches!(envelope.event, Event::ExcavatorReady { .. }) {
                ready_count += 1;
            }
        }
        assert_eq!(ready_count, 1);
        assert_eq!(executor.state(), ExcavatorState::ParkAndPub);

        // The dig waits for the hauler to park.
        inbox.hauler_parked();
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::DigAndDump);

        executor.step(); // dispatch arm goal
        assert_eq!(
            arm.last_goal().unwrap().task,
            Task::ExcavatorDigAndDumpVolatile
        );
        arm.set_state(GoalState::Succeeded);
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::NextQueTask);

        let mut saw_filled = false;
        while let Ok(envelope) = rx.try_recv() {
            if matches!(envelope.event, Event::HaulerFilled { .. }) {
                saw_filled = true;
            }
        }
        assert!(saw_filled);

        // NextQueTask resets for the following site.
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::Init);
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::Init);
    }

    #[test]
    fn test_unknown_code_stalls_in_place() {
        let (mut executor, _nav, _arm) = executor_with(EventBus::new());
        assert!(executor.assign_code(-7).is_err());
        assert_eq!(executor.state(), ExcavatorState::Init);
    }

    #[tokio::test]
    async fn test_goto_scout_completion_reported_under_assigned_label() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (mut executor, nav, _arm) = executor_with(bus);

        executor.inbox().receive_volatile(Pose::new(7.0, 3.0, 0.0));
        executor.step(); // Init -> GoToVolatile
        executor.step(); // nav goal in flight as GoToLoc
        assert_eq!(nav.last_goal().unwrap().task, Task::ExcavatorGoToLoc);

        // The drive gets re-commanded under its GoToScout alias; the goal
        // in flight is kept, not restarted.
        executor
            .assign_code(Task::ExcavatorGoToScout.code())
            .unwrap();
        assert_eq!(nav.sent_goals().len(), 1);
        assert_eq!(nav.cancel_count(), 0);

        nav.set_state(GoalState::Succeeded);
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::ParkAndPub);

        let mut finished = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let Event::StatusReported { report } = envelope.event {
                if report.current_state_done {
                    finished.push(Task::from_code(report.task_code).unwrap());
                }
            }
        }
        assert_eq!(finished, vec![Task::ExcavatorGoToScout]);
    }

    #[test]
    fn test_stale_sub_goal_success_is_ignored() {
        let (mut executor, nav, _arm) = executor_with(EventBus::new());
        executor.inbox().receive_volatile(Pose::new(7.0, 3.0, 0.0));
        executor.step();
        executor.step(); // nav goal seq 1 in flight

        // A success report tagged with an older sequence must not advance
        // the machine.
        nav.set_stale_status(crate::action::GoalStatus {
            sequence: 0,
            state: GoalState::Succeeded,
        });
        executor.step();
        assert_eq!(executor.state(), ExcavatorState::GoToVolatile);
    }
}
