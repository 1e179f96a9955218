//! Mission wiring: executors, supervision, and the bus pump.
//!
//! Two demo modes. `run_mission` assembles the full event-driven fleet
//! (executors against simulated action servers, the macro-state supervisor
//! driving coarse commands, tracker and watchdog alongside) and runs whole
//! gathering cycles. `run_schedule_demo` instead drives the cross-robot
//! scheduler directly against scripted robot-level servers, which shows the
//! dependency cadence one dispatched goal at a time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use coordinator::executors::{ExcavatorExecutor, HaulerExecutor, ScoutExecutor};
use coordinator::{
    OutOfCommissionWatch, PoseTable, StatusTracker, Team, TeamMacroState, TeamScheduler,
};
use fleet_core::{Pose, RobotId, Task};
use fleet_events::{Event, EventBus};
use tracing::{debug, info, warn};

use crate::sim::SimActionServer;
use crate::FleetConfig;

/// Mailbox carrying externally assigned task codes into an executor loop.
#[derive(Clone, Default)]
struct CommandCell {
    inner: Arc<Mutex<Option<i32>>>,
}

impl CommandCell {
    fn post(&self, code: i32) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(code);
    }

    fn take(&self) -> Option<i32> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

fn pose_from(xy: [f64; 2]) -> Pose {
    Pose::new(xy[0], xy[1], 0.0)
}

pub async fn run_mission(team_number: usize, cycles: u32, config: &FleetConfig) -> Result<()> {
    let (scout_id, excavator_id, hauler_id) = TeamScheduler::team_robots(team_number);
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let poses = PoseTable::new();
    let tracker = Arc::new(StatusTracker::new(bus.clone()));
    let travel = Duration::from_millis(config.mission.goal_duration_ms);

    poses.update(scout_id, pose_from(config.mission.scout_start));
    poses.update(excavator_id, pose_from(config.mission.excavator_start));
    poses.update(hauler_id, pose_from(config.mission.hauler_start));

    let localiser = SimActionServer::shared(scout_id, "resource_localiser", travel, poses.clone());
    for volatile in &config.mission.volatiles {
        localiser.push_wander(pose_from(*volatile));
    }
    let scout_nav = SimActionServer::shared(scout_id, "navigation", travel, poses.clone());
    let mut scout = ScoutExecutor::new(scout_id, localiser, scout_nav, bus.clone());

    let exc_nav = SimActionServer::shared(excavator_id, "navigation", travel, poses.clone());
    let arm = SimActionServer::shared(excavator_id, "excavator_arm", travel, poses.clone());
    let mut excavator = ExcavatorExecutor::new(excavator_id, exc_nav, arm, bus.clone());

    let hauler_nav = SimActionServer::shared(hauler_id, "navigation", travel, poses.clone());
    let nav_vision = SimActionServer::shared(hauler_id, "navigation_vision", travel, poses.clone());
    let park = SimActionServer::shared(hauler_id, "park_robot", travel, poses.clone());
    let dump = SimActionServer::shared(hauler_id, "dump", travel, poses.clone());
    let mut hauler = HaulerExecutor::new(
        hauler_id,
        hauler_nav,
        nav_vision,
        park,
        dump,
        bus.clone(),
        &config.scheduler,
    );

    let scout_inbox = scout.inbox();
    let excavator_inbox = excavator.inbox();
    let hauler_inbox = hauler.inbox();
    hauler_inbox.receive_lookout(pose_from(config.mission.lookout));

    scout.start().await;
    excavator.start().await;
    hauler.start().await;

    let scout_cmd = CommandCell::default();
    let excavator_cmd = CommandCell::default();
    let hauler_cmd = CommandCell::default();

    let mut team = Team::new(tracker.clone(), bus.clone());
    team.hire(scout_id);
    team.hire(excavator_id);
    team.hire(hauler_id);
    team.request_state(TeamMacroState::Search);

    let mut watchdog = OutOfCommissionWatch::new(tracker.clone(), bus.clone(), &config.scheduler);

    info!(
        team = team_number,
        scout = %scout_id, excavator = %excavator_id, hauler = %hauler_id,
        cycles, "mission started"
    );

    let tick = config.scheduler.tick_period();
    let deadline = Instant::now() + Duration::from_secs(config.mission.max_mission_secs);
    let mut delivered = 0u32;

    loop {
        // Drain the bus: status into the tracker, coordination signals into
        // the executor inboxes, commands into the executor mailboxes.
        while let Ok(envelope) = rx.try_recv() {
            match envelope.event {
                Event::StatusReported { report } => {
                    let finished = report.current_state_done && report.last_state_succeeded;
                    let _ = tracker.report_status(&report);
                    if finished
                        && report.task_code == Task::HaulerDumpVolatileToProcPlant.code()
                    {
                        delivered += 1;
                        info!(cycle = delivered, "volatile delivered to the processing plant");
                    }
                }
                Event::DesiredState { robot, task_code } => {
                    if robot == scout_id {
                        scout_cmd.post(task_code);
                    } else if robot == excavator_id {
                        excavator_cmd.post(task_code);
                    } else if robot == hauler_id {
                        hauler_cmd.post(task_code);
                    }
                }
                Event::VolatileFound { pose, .. } => {
                    excavator_inbox.receive_volatile(pose.clone());
                    hauler_inbox.receive_dig_site(pose);
                }
                Event::ExcavatorReady { .. } => hauler_inbox.excavator_ready(),
                Event::HaulerParked { .. } => excavator_inbox.hauler_parked(),
                Event::HaulerFilled { .. } => hauler_inbox.filled(),
                Event::OutOfCommission { robot } => {
                    warn!(robot = %robot, "robot flagged out of commission")
                }
                Event::TeamPhaseChanged { from, to } => info!(%from, %to, "team phase changed"),
                Event::Error { message, .. } => warn!(%message, "coordination error"),
            }
        }

        if delivered >= cycles {
            break;
        }
        if Instant::now() >= deadline {
            warn!(delivered, "mission timed out before completing all cycles");
            break;
        }

        // Apply commands and run one executor pass.
        if let Some(code) = scout_cmd.take() {
            let _ = scout.assign_code(code);
        }
        if let Some(code) = excavator_cmd.take() {
            let _ = excavator.assign_code(code);
        }
        if let Some(code) = hauler_cmd.take() {
            let _ = hauler.assign_code(code);
        }
        if let Some(pose) = poses.get(scout_id) {
            scout_inbox.receive_pose(pose);
        }
        scout.step();
        excavator.step();
        hauler.step();

        // Supervise: apply pending phase change, then queue the next one.
        if let Err(err) = team.step() {
            debug!(%err, "phase change deferred");
        }
        if let Some(next) = team.recommended_transition() {
            team.request_state(next);
        }

        let now = Instant::now();
        for robot in [scout_id, excavator_id, hauler_id] {
            if let Some(pose) = poses.get(robot) {
                watchdog.observe_pose(robot, &pose, now);
            }
        }
        watchdog.check(now);

        tokio::time::sleep(tick).await;
    }

    println!();
    println!("Mission finished, team {team_number}");
    println!("  volatiles delivered: {delivered}/{cycles}");
    println!("  final phase:         {:?}", team.state());
    Ok(())
}

/// Let the cross-robot scheduler run against scripted robot-level servers
/// for a fixed number of ticks; every assignment it makes is logged.
pub async fn run_schedule_demo(team_number: usize, ticks: u32, config: &FleetConfig) -> Result<()> {
    let (scout_id, excavator_id, hauler_id) = TeamScheduler::team_robots(team_number);
    let poses = PoseTable::new();
    poses.update(scout_id, pose_from(config.mission.scout_start));
    poses.update(excavator_id, pose_from(config.mission.excavator_start));
    poses.update(hauler_id, pose_from(config.mission.hauler_start));

    let travel = Duration::from_millis(config.mission.goal_duration_ms);
    let scout = SimActionServer::shared(scout_id, "state_machine", travel, poses.clone());
    for volatile in &config.mission.volatiles {
        // Each completed search leaves the scout standing on a volatile.
        scout.push_wander(pose_from(*volatile));
    }
    let excavator = SimActionServer::shared(excavator_id, "state_machine", travel, poses.clone());
    let hauler = SimActionServer::shared(hauler_id, "state_machine", travel, poses.clone());

    let mut scheduler = TeamScheduler::new(
        team_number,
        scout,
        excavator,
        hauler,
        poses,
        config.scheduler.clone(),
    );
    let handle = scheduler.handle();
    let run_for = config.scheduler.tick_period() * ticks;
    tokio::spawn(async move {
        tokio::time::sleep(run_for).await;
        handle.stop();
    });

    info!(team = team_number, ticks, "scheduler demo started");
    scheduler.run().await;

    println!();
    println!("Scheduler demo finished, team {team_number}");
    println!("  scout goal:     {:?}", scheduler.scout_goal());
    println!("  excavator goal: {:?}", scheduler.excavator_goal());
    println!("  hauler goal:    {:?}", scheduler.hauler_goal());
    Ok(())
}
