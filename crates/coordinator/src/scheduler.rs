//! Cross-robot team scheduler.
//!
//! A fixed-cadence decision loop, not an event loop: each tick refreshes
//! completion flags from the robot-level action servers, evaluates the
//! cross-robot dependency rules in hauler -> excavator -> scout order, and
//! dispatches any changed goals. An event arriving between ticks is picked
//! up one tick later at worst.
//!
//! The essential sequencing: the scout finds a volatile, the excavator
//! drives out and parks on it, the hauler closes in and parks against the
//! excavator, the excavator digs into the hauler, and the hauler carries
//! the load to the processing plant while the scout resumes searching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fleet_core::{standoff_pose, Pose, RobotId, Task};
use tracing::{debug, info, warn};

use crate::action::{ActionClient, Goal, GoalState};
use crate::config::SchedulerConfig;
use crate::error::{CoordinatorError, Result};

/// Shared last-known robot poses, written by the odometry callbacks and
/// read by the scheduler when it computes rendezvous goals.
#[derive(Clone, Default)]
pub struct PoseTable {
    inner: Arc<Mutex<HashMap<RobotId, Pose>>>,
}

impl PoseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, robot: RobotId, pose: Pose) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(robot, pose);
    }

    pub fn get(&self, robot: RobotId) -> Option<Pose> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&robot)
            .cloned()
    }
}

/// Scheduler-side view of one robot: its action client, the last goal we
/// dispatched (with its sequence number), and whether that goal finished.
struct RobotSlot {
    robot: RobotId,
    client: Arc<dyn ActionClient>,
    goal: Option<Task>,
    desired: Option<Task>,
    sequence: u64,
    done: bool,
}

impl RobotSlot {
    fn new(robot: RobotId, client: Arc<dyn ActionClient>) -> Self {
        Self {
            robot,
            client,
            goal: None,
            desired: None,
            sequence: 0,
            done: false,
        }
    }

    /// Pull the completion flag, trusting it only for the goal we actually
    /// dispatched last. A success echoed for an older sequence is stale and
    /// must not drive a transition for the new task.
    fn refresh(&mut self) {
        let status = self.client.status();
        self.done = status.sequence == self.sequence && status.state.is_done();
    }

    fn completed(&self, task: Task) -> bool {
        self.goal == Some(task) && self.done
    }

    /// Idempotent goal send: nothing happens unless the task changed. A
    /// still-running prior goal is cancelled before the replacement goes out.
    fn dispatch(&mut self, task: Task, pose: Option<Pose>) {
        if self.goal == Some(task) {
            return;
        }
        if self.client.status().state == GoalState::Active {
            self.client.cancel_goal();
        }
        self.sequence += 1;
        warn!(robot = %self.robot, task = %task, "scheduler assigning task");
        self.client.send_goal(Goal {
            task,
            pose,
            sequence: self.sequence,
        });
        self.goal = Some(task);
        self.done = false;
    }
}

/// Handle for stopping a running scheduler loop from another task.
#[derive(Clone)]
pub struct SchedulerHandle {
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

pub struct TeamScheduler {
    scout: RobotSlot,
    excavator: RobotSlot,
    hauler: RobotSlot,
    poses: PoseTable,
    config: SchedulerConfig,
    /// Set when the hauler finishes parking at the excavator; consumed when
    /// the dig completes and the hauler is sent off to dump.
    hauler_loaded: bool,
    /// The very first excavation has no prior dig cycle to key off.
    first_excavation: bool,
    running: Arc<AtomicBool>,
}

impl TeamScheduler {
    /// Build the scheduler for team 1 or team 2; each team owns one robot
    /// of every archetype.
    pub fn new(
        team_number: usize,
        scout_client: Arc<dyn ActionClient>,
        excavator_client: Arc<dyn ActionClient>,
        hauler_client: Arc<dyn ActionClient>,
        poses: PoseTable,
        config: SchedulerConfig,
    ) -> Self {
        let (scout, excavator, hauler) = Self::team_robots(team_number);
        Self {
            scout: RobotSlot::new(scout, scout_client),
            excavator: RobotSlot::new(excavator, excavator_client),
            hauler: RobotSlot::new(hauler, hauler_client),
            poses,
            config,
            hauler_loaded: false,
            first_excavation: true,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The scout, excavator, and hauler making up a numbered team.
    pub fn team_robots(team_number: usize) -> (RobotId, RobotId, RobotId) {
        if team_number == 1 {
            (RobotId::Scout1, RobotId::Excavator1, RobotId::Hauler1)
        } else {
            (RobotId::Scout2, RobotId::Excavator2, RobotId::Hauler2)
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            running: self.running.clone(),
        }
    }

    pub fn scout_goal(&self) -> Option<Task> {
        self.scout.goal
    }

    pub fn excavator_goal(&self) -> Option<Task> {
        self.excavator.goal
    }

    pub fn hauler_goal(&self) -> Option<Task> {
        self.hauler.goal
    }

    /// Run the decision loop until stopped. Blocks first on all three robot
    /// state machines becoming reachable; the team cannot proceed without
    /// its actuators, so there is no timeout.
    pub async fn run(&mut self) {
        self.scout.client.wait_for_server().await;
        self.excavator.client.wait_for_server().await;
        self.hauler.client.wait_for_server().await;
        info!("all robot state machines connected");

        self.seed_initial_tasks();
        self.running.store(true, Ordering::Relaxed);
        while self.running.load(Ordering::Relaxed) {
            self.tick();
            tokio::time::sleep(self.config.tick_period()).await;
        }
        info!("scheduler stopped");
    }

    /// The mission opens with the scout searching and the excavator homing
    /// its arm; the hauler waits for the dependency rules to pull it in.
    pub fn seed_initial_tasks(&mut self) {
        self.scout.desired = Some(Task::ScoutSearchVolatile);
        self.excavator.desired = Some(Task::ExcavatorGoToDefaultArmPose);
    }

    /// One decision pass: refresh happens-before evaluation happens-before
    /// dispatch.
    pub fn tick(&mut self) {
        self.scout.refresh();
        self.excavator.refresh();
        self.hauler.refresh();

        self.update_hauler();
        self.update_excavator();
        self.update_scout();

        self.dispatch();
    }

    fn update_hauler(&mut self) {
        debug!(
            scout_goal = ?self.scout.goal, scout_done = self.scout.done,
            excavator_goal = ?self.excavator.goal, excavator_done = self.excavator.done,
            hauler_goal = ?self.hauler.goal, hauler_done = self.hauler.done,
            "tick snapshot"
        );

        let dumping_done = self.hauler.completed(Task::HaulerDumpVolatileToProcPlant);
        let not_dumping = self.hauler.goal != Some(Task::HaulerDumpVolatileToProcPlant);

        // Shadow the excavator while it moves toward the volatile or waits
        // there, unless the hauler is mid-park or mid-dump.
        if (dumping_done || not_dumping) && self.hauler.goal != Some(Task::HaulerParkAtExcavator) {
            let excavator_going = matches!(
                self.excavator.goal,
                Some(Task::ExcavatorGoToScout) | Some(Task::ExcavatorGoToLoc)
            );
            let excavator_waiting = self.excavator.goal == Some(Task::ExcavatorParkAndPub);
            if excavator_going || excavator_waiting {
                self.hauler.desired = Some(Task::HaulerGoToLoc);
            }
        }

        if self.excavator.completed(Task::ExcavatorParkAndPub)
            && self.hauler.completed(Task::HaulerGoToLoc)
        {
            self.hauler.desired = Some(Task::HaulerParkAtExcavator);
        }

        if self.excavator.completed(Task::ExcavatorDigAndDumpVolatile) && self.hauler_loaded {
            self.hauler.desired = Some(Task::HaulerDumpVolatileToProcPlant);
            self.hauler_loaded = false;
        }
    }

    fn update_excavator(&mut self) {
        if self.scout.completed(Task::ScoutSearchVolatile) {
            let previous_dig_done = self.excavator.completed(Task::ExcavatorDigAndDumpVolatile);
            if previous_dig_done || self.first_excavation {
                self.excavator.desired = Some(Task::ExcavatorGoToLoc);
                self.first_excavation = false;
            }
        }
        if self.excavator.completed(Task::ExcavatorGoToLoc) {
            self.excavator.desired = Some(Task::ExcavatorGoToScout);
        }
        if self.excavator.completed(Task::ExcavatorGoToScout) {
            self.excavator.desired = Some(Task::ExcavatorParkAndPub);
        }
        if self.hauler.completed(Task::HaulerParkAtExcavator) {
            self.excavator.desired = Some(Task::ExcavatorDigAndDumpVolatile);
            self.hauler_loaded = true;
        }
    }

    fn update_scout(&mut self) {
        if self.excavator.completed(Task::ExcavatorGoToScout) {
            self.scout.desired = Some(Task::ScoutUndock);
        }
        if self.scout.completed(Task::ScoutUndock) {
            self.scout.desired = Some(Task::ScoutSearchVolatile);
        }
    }

    fn dispatch(&mut self) {
        if let Some(task) = self.hauler.desired {
            match self.hauler_goal_pose(task) {
                Ok(pose) => self.hauler.dispatch(task, pose),
                Err(err) => debug!(%err, "hauler dispatch deferred"),
            }
        }
        if let Some(task) = self.excavator.desired {
            match self.excavator_goal_pose(task) {
                Ok(pose) => self.excavator.dispatch(task, pose),
                Err(err) => debug!(%err, "excavator dispatch deferred"),
            }
        }
        if let Some(task) = self.scout.desired {
            self.scout.dispatch(task, None);
        }
    }

    /// The excavator's rendezvous goal stops short of the scout, offset
    /// toward the excavator's own position so the two never collide.
    fn excavator_goal_pose(&self, task: Task) -> Result<Option<Pose>> {
        if task != Task::ExcavatorGoToLoc {
            return Ok(None);
        }
        let scout_pose = self.require_pose(self.excavator.robot, self.scout.robot)?;
        let own_pose = self.require_pose(self.excavator.robot, self.excavator.robot)?;
        Ok(Some(standoff_pose(
            &scout_pose,
            &own_pose,
            self.config.excavator_standoff,
        )))
    }

    /// The hauler aims past its reference robot (negative offset) so it
    /// ends up on the far side, clear of the parking approach. The
    /// reference switches from the scout to the excavator once the
    /// excavator is parked and publishing.
    fn hauler_goal_pose(&self, task: Task) -> Result<Option<Pose>> {
        if task != Task::HaulerGoToLoc {
            return Ok(None);
        }
        let excavator_waiting = self.excavator.goal == Some(Task::ExcavatorParkAndPub);
        let reference = if excavator_waiting {
            self.excavator.robot
        } else {
            self.scout.robot
        };
        let reference_pose = self.require_pose(self.hauler.robot, reference)?;
        let own_pose = self.require_pose(self.hauler.robot, self.hauler.robot)?;
        Ok(Some(standoff_pose(
            &reference_pose,
            &own_pose,
            self.config.hauler_standoff,
        )))
    }

    fn require_pose(&self, robot: RobotId, missing: RobotId) -> Result<Pose> {
        self.poses
            .get(missing)
            .ok_or(CoordinatorError::PoseUnavailable {
                robot,
                reference: missing,
            })
    }
}
