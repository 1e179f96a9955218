//! Hauler task executor.
//!
//! The hauler's cycle: reach a lookout point, move up to the dig site once
//! the scout finds a volatile, close in on the excavator visually, park
//! against it, wait to be filled, then carry the load to the processing
//! plant, park at the hopper, and dump.

use std::sync::{Arc, Mutex};

use fleet_core::{Archetype, CompletionStatus, CoreError, Pose, RobotId, Task};
use fleet_events::{Event, EventBus};
use tracing::{error, info};

use crate::action::ActionClient;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::executors::{publish_status, SubExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaulerState {
    Init,
    GoToLookout,
    GoToDigSite,
    FollowExcavator,
    ParkAtExcavator,
    AcceptVolatile,
    GoToProcPlant,
    ParkAtHopper,
    DumpVolatile,
}

impl HaulerState {
    /// The reportable task for this state. `Init` has nothing to report.
    pub fn task(&self) -> Option<Task> {
        match self {
            Self::Init => None,
            Self::GoToLookout => Some(Task::HaulerGoToLookout),
            Self::GoToDigSite => Some(Task::HaulerGoToDigSite),
            Self::FollowExcavator => Some(Task::HaulerFollowExcavator),
            Self::ParkAtExcavator => Some(Task::HaulerParkAtExcavator),
            Self::AcceptVolatile => Some(Task::HaulerAcceptVolatile),
            Self::GoToProcPlant => Some(Task::HaulerGoToProcPlant),
            Self::ParkAtHopper => Some(Task::HaulerParkAtHopper),
            Self::DumpVolatile => Some(Task::HaulerDumpVolatileToProcPlant),
        }
    }

    pub fn for_task(task: Task) -> Option<Self> {
        match task {
            Task::HaulerGoToLookout => Some(Self::GoToLookout),
            // The scheduler's rendezvous dispatch; same leg of the cycle.
            Task::HaulerGoToDigSite | Task::HaulerGoToLoc => Some(Self::GoToDigSite),
            Task::HaulerFollowExcavator => Some(Self::FollowExcavator),
            Task::HaulerParkAtExcavator => Some(Self::ParkAtExcavator),
            Task::HaulerAcceptVolatile => Some(Self::AcceptVolatile),
            Task::HaulerGoToProcPlant => Some(Self::GoToProcPlant),
            Task::HaulerParkAtHopper => Some(Self::ParkAtHopper),
            Task::HaulerDumpVolatileToProcPlant => Some(Self::DumpVolatile),
            _ => None,
        }
    }
}

/// Asynchronous inputs to the hauler, written by callbacks, read by the
/// polling loop. Each flag and its payload share one lock, so a pose can
/// never be observed with a stale received-flag.
#[derive(Clone, Default)]
pub struct HaulerInbox {
    lookout: Arc<Mutex<Option<Pose>>>,
    dig_site: Arc<Mutex<Option<Pose>>>,
    excavator_ready: Arc<Mutex<bool>>,
    filled: Arc<Mutex<bool>>,
}

impl HaulerInbox {
    pub fn receive_lookout(&self, pose: Pose) {
        *self.lookout.lock().unwrap_or_else(|e| e.into_inner()) = Some(pose);
    }

    pub fn receive_dig_site(&self, pose: Pose) {
        *self.dig_site.lock().unwrap_or_else(|e| e.into_inner()) = Some(pose);
    }

    pub fn excavator_ready(&self) {
        *self.excavator_ready.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn filled(&self) {
        *self.filled.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    fn lookout_pose(&self) -> Option<Pose> {
        self.lookout.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn clear_lookout(&self) {
        *self.lookout.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn dig_site_pose(&self) -> Option<Pose> {
        self.dig_site.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn is_excavator_ready(&self) -> bool {
        *self.excavator_ready.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_filled(&self) -> bool {
        let mut filled = self.filled.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *filled)
    }

    fn reset_cycle(&self) {
        *self.dig_site.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.excavator_ready.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

pub struct HaulerExecutor {
    robot: RobotId,
    state: HaulerState,
    nav: SubExecutor,
    nav_vision: SubExecutor,
    park: SubExecutor,
    dump: SubExecutor,
    inbox: HaulerInbox,
    bus: EventBus,
    dig_site_offset: (f64, f64),
    /// Which alias the dig-site approach was commanded under (GoToDigSite
    /// or the scheduler's GoToLoc); completion is reported under the same
    /// label.
    nav_task: Task,
}

impl HaulerExecutor {
    pub fn new(
        robot: RobotId,
        nav: Arc<dyn ActionClient>,
        nav_vision: Arc<dyn ActionClient>,
        park: Arc<dyn ActionClient>,
        dump: Arc<dyn ActionClient>,
        bus: EventBus,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            robot,
            state: HaulerState::Init,
            nav: SubExecutor::new("navigation", nav),
            nav_vision: SubExecutor::new("navigation_vision", nav_vision),
            park: SubExecutor::new("park_robot", park),
            dump: SubExecutor::new("dump", dump),
            inbox: HaulerInbox::default(),
            bus,
            dig_site_offset: (config.dig_site_offset_x, config.dig_site_offset_y),
            nav_task: Task::HaulerGoToDigSite,
        }
    }

    pub fn inbox(&self) -> HaulerInbox {
        self.inbox.clone()
    }

    pub fn state(&self) -> HaulerState {
        self.state
    }

    /// Block until every sub-executor's server is reachable.
    pub async fn start(&self) {
        self.nav.wait_ready().await;
        self.nav_vision.wait_ready().await;
        self.park.wait_ready().await;
        self.dump.wait_ready().await;
        info!(robot = %self.robot, "all hauler action servers ready");
    }

    /// Jump the state machine to an externally-assigned task. An
    /// out-of-range code or a non-hauler task holds the current state.
    pub fn assign_code(&mut self, code: i32) -> Result<()> {
        let Some(task) = Task::from_code(code) else {
            error!(robot = %self.robot, code, "unhandled task code, holding current state");
            self.bus.publish(Event::Error {
                message: format!("unhandled task code {code} for {}", self.robot),
                context: Some("hauler_executor".to_string()),
            });
            return Err(CoreError::UnknownTaskCode(code).into());
        };
        let Some(state) = HaulerState::for_task(task) else {
            error!(robot = %self.robot, task = %task, "task does not belong to the hauler graph");
            self.bus.publish(Event::Error {
                message: format!("task {task} is not a hauler task"),
                context: Some("hauler_executor".to_string()),
            });
            return Err(CoreError::ArchetypeMismatch {
                archetype: Archetype::Hauler,
                task,
            }
            .into());
        };
        if state == HaulerState::GoToDigSite {
            // Relabel only; an approach already in flight keeps going.
            self.nav_task = task;
        }
        if state != self.state {
            self.cancel_outstanding();
            self.advance(state);
        }
        Ok(())
    }

    /// One pass of the two-phase handler for the current state.
    pub fn step(&mut self) {
        match self.state {
            HaulerState::Init => self.init(),
            HaulerState::GoToLookout => self.go_to_lookout(),
            HaulerState::GoToDigSite => self.go_to_dig_site(),
            HaulerState::FollowExcavator => self.follow_excavator(),
            HaulerState::ParkAtExcavator => self.park_at_excavator(),
            HaulerState::AcceptVolatile => self.accept_volatile(),
            HaulerState::GoToProcPlant => self.go_to_proc_plant(),
            HaulerState::ParkAtHopper => self.park_at_hopper(),
            HaulerState::DumpVolatile => self.dump_volatile(),
        }
    }

    fn init(&mut self) {
        if self.inbox.lookout_pose().is_some() {
            self.advance(HaulerState::GoToLookout);
        }
    }

    fn go_to_lookout(&mut self) {
        if self.nav.try_complete() {
            info!(robot = %self.robot, "lookout reached");
            self.inbox.clear_lookout();
        }
        if !self.nav.is_idle() {
            return;
        }
        match (self.inbox.lookout_pose(), self.inbox.dig_site_pose()) {
            (Some(pose), _) => self.nav.dispatch(Task::HaulerGoToLookout, Some(pose)),
            (None, Some(_)) => self.advance(HaulerState::GoToDigSite),
            // At the lookout; nothing to do until the scout finds something.
            (None, None) => {}
        }
    }

    fn go_to_dig_site(&mut self) {
        if self.nav.is_idle() {
            if let Some(pose) = self.inbox.dig_site_pose() {
                // Park beside the site, not on it; the excavator takes the
                // site itself.
                let goal = pose.offset_by(self.dig_site_offset.0, self.dig_site_offset.1);
                self.nav.dispatch(self.nav_task, Some(goal));
            }
        } else if self.nav.try_complete() {
            self.advance(HaulerState::FollowExcavator);
        }
    }

    fn follow_excavator(&mut self) {
        if self.nav_vision.is_idle() {
            if self.inbox.is_excavator_ready() {
                self.nav_vision.dispatch(Task::HaulerFollowExcavator, None);
            }
        } else if self.nav_vision.try_complete() {
            self.advance(HaulerState::ParkAtExcavator);
        }
    }

    fn park_at_excavator(&mut self) {
        if self.park.is_idle() {
            self.park.dispatch(Task::HaulerParkAtExcavator, None);
        } else if self.park.try_complete() {
            info!(robot = %self.robot, "parked at excavator");
            self.bus.publish(Event::HaulerParked { robot: self.robot });
            self.advance(HaulerState::AcceptVolatile);
        }
    }

    fn accept_volatile(&mut self) {
        if self.inbox.take_filled() {
            self.advance(HaulerState::GoToProcPlant);
        }
    }

    fn go_to_proc_plant(&mut self) {
        if self.nav_vision.is_idle() {
            self.nav_vision.dispatch(Task::HaulerGoToProcPlant, None);
        } else if self.nav_vision.try_complete() {
            self.advance(HaulerState::ParkAtHopper);
        }
    }

    fn park_at_hopper(&mut self) {
        if self.park.is_idle() {
            self.park.dispatch(Task::HaulerParkAtHopper, None);
        } else if self.park.try_complete() {
            self.advance(HaulerState::DumpVolatile);
        }
    }

    fn dump_volatile(&mut self) {
        if self.dump.is_idle() {
            self.dump.dispatch(Task::HaulerDumpVolatileToProcPlant, None);
        } else if self.dump.try_complete() {
            info!(robot = %self.robot, "volatile dumped, cycle complete");
            self.inbox.reset_cycle();
            self.nav_task = Task::HaulerGoToDigSite;
            self.advance(HaulerState::Init);
        }
    }

    fn cancel_outstanding(&mut self) {
        self.nav.cancel();
        self.nav_vision.cancel();
        self.park.cancel();
        self.dump.cancel();
    }

    /// The reportable task for a state, honoring the commanded alias for
    /// the dig-site approach.
    fn task_of(&self, state: HaulerState) -> Option<Task> {
        if state == HaulerState::GoToDigSite {
            Some(self.nav_task)
        } else {
            state.task()
        }
    }

    fn advance(&mut self, next: HaulerState) {
        if let Some(task) = self.task_of(self.state) {
            publish_status(&self.bus, self.robot, task, CompletionStatus::done(true));
        }
        info!(robot = %self.robot, from = ?self.state, to = ?next, "hauler state advanced");
        self.state = next;
        if let Some(task) = self.task_of(self.state) {
            publish_status(&self.bus, self.robot, task, CompletionStatus::in_progress());
        }
    }
}
