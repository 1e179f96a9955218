//! Simulated downstream action servers.
//!
//! Every goal "succeeds" after a fixed travel time. Goals that carry a pose
//! move the robot there on completion; pose-less goals can consume a
//! scripted wander point instead, which is how the simulated scout ends up
//! on a fresh volatile after each search.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use coordinator::{ActionClient, Goal, GoalState, GoalStatus, PoseTable};
use fleet_core::{Pose, RobotId};
use tracing::debug;

pub struct SimActionServer {
    robot: RobotId,
    name: &'static str,
    travel_time: Duration,
    poses: PoseTable,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    goal: Option<Goal>,
    started: Option<Instant>,
    state: Option<GoalState>,
    wander: VecDeque<Pose>,
}

impl SimActionServer {
    pub fn shared(
        robot: RobotId,
        name: &'static str,
        travel_time: Duration,
        poses: PoseTable,
    ) -> Arc<Self> {
        Arc::new(Self {
            robot,
            name,
            travel_time,
            poses,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Queue a destination for the next pose-less goal to land on.
    pub fn push_wander(&self, pose: Pose) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .wander
            .push_back(pose);
    }
}

#[async_trait]
impl ActionClient for SimActionServer {
    fn send_goal(&self, goal: Goal) {
        debug!(robot = %self.robot, server = self.name, task = %goal.task, "sim goal accepted");
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.goal = Some(goal);
        inner.started = Some(Instant::now());
        inner.state = Some(GoalState::Active);
    }

    fn cancel_goal(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state == Some(GoalState::Active) {
            debug!(robot = %self.robot, server = self.name, "sim goal cancelled");
            inner.state = Some(GoalState::Aborted);
        }
    }

    fn status(&self) -> GoalStatus {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed_enough = inner
            .started
            .map(|s| s.elapsed() >= self.travel_time)
            .unwrap_or(false);
        if inner.state == Some(GoalState::Active) && elapsed_enough {
            inner.state = Some(GoalState::Succeeded);
            let destination = inner
                .goal
                .as_ref()
                .and_then(|g| g.pose.clone())
                .or_else(|| inner.wander.pop_front());
            if let Some(pose) = destination {
                debug!(
                    robot = %self.robot, server = self.name,
                    x = pose.point.x, y = pose.point.y,
                    "sim robot arrived"
                );
                self.poses.update(self.robot, pose);
            }
        }
        match (&inner.goal, inner.state) {
            (Some(goal), Some(state)) => GoalStatus {
                sequence: goal.sequence,
                state,
            },
            _ => GoalStatus::idle(),
        }
    }

    async fn wait_for_server(&self) {}
}
