//! Mission-phase supervision for one team of robots.
//!
//! This layer sits above the per-robot executors and issues coarse task
//! commands through the [`StatusTracker`]; it never talks to action servers
//! directly. Phases are a tagged enum with per-phase entry, exit, step and
//! done functions keyed on the variant.
//!
//! State changes are atomic with respect to `step()`: a request made while
//! a step is in flight takes effect at the start of the next step, with the
//! old phase's exit point running exactly once before the new phase's entry
//! point.

use std::sync::Arc;

use fleet_core::{RobotId, Task};
use fleet_events::{Event, EventBus};
use tracing::{debug, info};

use crate::error::{CoordinatorError, Result};
use crate::status_tracker::StatusTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamMacroState {
    /// No crew assigned.
    Standby,
    /// Crew assigned, holding.
    Idle,
    /// Scout sweeping for a volatile.
    Search,
    /// Scout found one; excavator and hauler converge while the scout
    /// holds position on the find.
    ScoutWaiting,
    /// Excavator digging into the parked hauler.
    Excavating,
    /// Hauler carrying the load to the processing plant.
    Dumping,
}

/// Sub-phases of [`TeamMacroState::ScoutWaiting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamMicroState {
    /// Excavator and hauler en route to the volatile.
    RobotsToGoal,
    /// Excavator arrived; scout backing off the find.
    UndockScout,
    /// Scout clear; excavator parking on the volatile.
    ParkExcavatorAtScout,
}

pub struct Team {
    scout: Option<RobotId>,
    excavator: Option<RobotId>,
    hauler: Option<RobotId>,
    state: TeamMacroState,
    micro: TeamMicroState,
    requested: Option<TeamMacroState>,
    tracker: Arc<StatusTracker>,
    bus: EventBus,
}

impl Team {
    pub fn new(tracker: Arc<StatusTracker>, bus: EventBus) -> Self {
        Self {
            scout: None,
            excavator: None,
            hauler: None,
            state: TeamMacroState::Standby,
            micro: TeamMicroState::RobotsToGoal,
            requested: None,
            tracker,
            bus,
        }
    }

    /// Assign a robot to the slot matching its archetype.
    pub fn hire(&mut self, robot: RobotId) {
        use fleet_core::Archetype;
        info!(robot = %robot, "robot joins the team");
        match robot.archetype() {
            Archetype::Scout => self.scout = Some(robot),
            Archetype::Excavator => self.excavator = Some(robot),
            Archetype::Hauler => self.hauler = Some(robot),
        }
    }

    /// Release the whole crew and drop back to standby immediately. Any
    /// pending phase request is discarded.
    pub fn disband(&mut self) {
        info!("team disbanded");
        self.scout = None;
        self.excavator = None;
        self.hauler = None;
        self.requested = None;
        if self.state != TeamMacroState::Standby {
            self.publish_change(self.state, TeamMacroState::Standby);
            self.state = TeamMacroState::Standby;
        }
    }

    pub fn state(&self) -> TeamMacroState {
        self.state
    }

    pub fn micro(&self) -> TeamMicroState {
        self.micro
    }

    /// Ask for a phase change. Takes effect at the start of the next
    /// `step()`; a later request before that overrides an earlier one.
    pub fn request_state(&mut self, next: TeamMacroState) {
        debug!(current = ?self.state, requested = ?next, "phase change requested");
        self.requested = Some(next);
    }

    /// Run one supervision pass: apply any pending phase change, then run
    /// the active phase's logic.
    pub fn step(&mut self) -> Result<()> {
        if let Some(next) = self.requested.take() {
            if next != self.state {
                self.transition_to(next)?;
            }
        }
        self.run_phase()
    }

    /// Whether the active phase has reached its goal.
    pub fn is_done(&self) -> bool {
        match self.state {
            TeamMacroState::Standby | TeamMacroState::Idle => false,
            TeamMacroState::Search => self.scout_finished(Task::ScoutSearchVolatile),
            TeamMacroState::ScoutWaiting => {
                self.excavator_finished(Task::ExcavatorParkAndPub)
            }
            TeamMacroState::Excavating => {
                self.excavator_finished(Task::ExcavatorDigAndDumpVolatile)
            }
            TeamMacroState::Dumping => {
                self.hauler_finished(Task::HaulerDumpVolatileToProcPlant)
            }
        }
    }

    /// The phase this team would move to next, once the active one is done.
    /// The supervisor decides whether to follow the recommendation.
    pub fn recommended_transition(&self) -> Option<TeamMacroState> {
        if !self.is_done() {
            return None;
        }
        match self.state {
            TeamMacroState::Standby | TeamMacroState::Idle => None,
            TeamMacroState::Search => Some(TeamMacroState::ScoutWaiting),
            TeamMacroState::ScoutWaiting => Some(TeamMacroState::Excavating),
            TeamMacroState::Excavating => Some(TeamMacroState::Dumping),
            // The gathering loop restarts while the hauler is unloading.
            TeamMacroState::Dumping => Some(TeamMacroState::Search),
        }
    }

    fn transition_to(&mut self, next: TeamMacroState) -> Result<()> {
        // Crew requirements are checked up front so a failed request leaves
        // the current phase fully intact, exit point unrun.
        self.require_crew(next)?;
        self.exit_point();
        let from = self.state;
        self.state = next;
        self.entry_point()?;
        info!(from = ?from, to = ?next, "team phase changed");
        self.publish_change(from, next);
        Ok(())
    }

    fn require_crew(&self, next: TeamMacroState) -> Result<()> {
        let (scout, excavator, hauler) = match next {
            TeamMacroState::Standby => (false, false, false),
            TeamMacroState::Idle => (true, true, true),
            TeamMacroState::Search => (true, false, false),
            TeamMacroState::ScoutWaiting => (true, true, true),
            TeamMacroState::Excavating => (false, true, false),
            TeamMacroState::Dumping => (false, false, true),
        };
        if scout && self.scout.is_none() {
            return Err(CoordinatorError::MissingPrecondition("no scout hired"));
        }
        if excavator && self.excavator.is_none() {
            return Err(CoordinatorError::MissingPrecondition("no excavator hired"));
        }
        if hauler && self.hauler.is_none() {
            return Err(CoordinatorError::MissingPrecondition("no hauler hired"));
        }
        Ok(())
    }

    fn exit_point(&mut self) {
        match self.state {
            // Leaving the search phase always silences the scout's sweep.
            TeamMacroState::Search => {
                if let Some(scout) = self.scout {
                    let _ = self.tracker.set_desired_state(scout, Task::ScoutStopSearch);
                }
            }
            _ => {}
        }
    }

    fn entry_point(&mut self) -> Result<()> {
        match self.state {
            TeamMacroState::Standby | TeamMacroState::Idle => Ok(()),
            TeamMacroState::Search => {
                self.tracker
                    .set_desired_state(self.require_scout()?, Task::ScoutSearchVolatile)
            }
            TeamMacroState::ScoutWaiting => {
                self.micro = TeamMicroState::RobotsToGoal;
                self.tracker
                    .set_desired_state(self.require_excavator()?, Task::ExcavatorGoToScout)?;
                self.tracker
                    .set_desired_state(self.require_hauler()?, Task::HaulerGoToDigSite)
            }
            // The hauler is already parked by the time this phase starts
            // (the excavator's park-and-publish finishes only once the
            // hauler is against it), so only the dig is commanded.
            TeamMacroState::Excavating => self.tracker.set_desired_state(
                self.require_excavator()?,
                Task::ExcavatorDigAndDumpVolatile,
            ),
            // The hauler carries the approach through to the dump on its
            // own once sent toward the plant.
            TeamMacroState::Dumping => self
                .tracker
                .set_desired_state(self.require_hauler()?, Task::HaulerGoToProcPlant),
        }
    }

    fn run_phase(&mut self) -> Result<()> {
        match self.state {
            TeamMacroState::ScoutWaiting => self.step_scout_waiting(),
            // The other phases have no intermediate moves; the executors
            // carry the commanded tasks to completion on their own.
            _ => Ok(()),
        }
    }

    /// Walk the convergence sub-phases: once the excavator reaches the
    /// scout, the scout backs off; once the scout is clear, the excavator
    /// takes its place on the volatile.
    fn step_scout_waiting(&mut self) -> Result<()> {
        match self.micro {
            TeamMicroState::RobotsToGoal => {
                if self.excavator_finished(Task::ExcavatorGoToScout) {
                    debug!("excavator reached the scout, undocking scout");
                    self.micro = TeamMicroState::UndockScout;
                    self.tracker
                        .set_desired_state(self.require_scout()?, Task::ScoutUndock)?;
                }
                Ok(())
            }
            TeamMicroState::UndockScout => {
                if self.scout_finished(Task::ScoutUndock) {
                    debug!("scout clear, parking excavator on the volatile");
                    self.micro = TeamMicroState::ParkExcavatorAtScout;
                    self.tracker
                        .set_desired_state(self.require_excavator()?, Task::ExcavatorParkAndPub)?;
                }
                Ok(())
            }
            TeamMicroState::ParkExcavatorAtScout => Ok(()),
        }
    }

    fn scout_finished(&self, task: Task) -> bool {
        self.robot_finished(self.scout, task)
    }

    fn excavator_finished(&self, task: Task) -> bool {
        self.robot_finished(self.excavator, task)
    }

    fn hauler_finished(&self, task: Task) -> bool {
        self.robot_finished(self.hauler, task)
    }

    fn robot_finished(&self, robot: Option<RobotId>, task: Task) -> bool {
        let Some(robot) = robot else {
            return false;
        };
        // The latched completion, not the live record: executors move on to
        // their next task faster than this layer polls.
        self.tracker.has_completed(robot, task)
    }

    fn require_scout(&self) -> Result<RobotId> {
        self.scout
            .ok_or(CoordinatorError::MissingPrecondition("no scout hired"))
    }

    fn require_excavator(&self) -> Result<RobotId> {
        self.excavator
            .ok_or(CoordinatorError::MissingPrecondition("no excavator hired"))
    }

    fn require_hauler(&self) -> Result<RobotId> {
        self.hauler
            .ok_or(CoordinatorError::MissingPrecondition("no hauler hired"))
    }

    fn publish_change(&self, from: TeamMacroState, to: TeamMacroState) {
        self.bus.publish(Event::TeamPhaseChanged {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        });
    }
}
