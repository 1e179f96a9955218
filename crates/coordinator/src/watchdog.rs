//! Stall detection over the pose feed.
//!
//! A robot that holds a task but has not displaced itself by more than the
//! configured distance within the stall window is presumed stuck. The alarm
//! latches: one `OutOfCommission` event per incident, re-armed only once
//! the robot moves beyond the threshold again. Robots with no task, or a
//! finished one, are allowed to sit still indefinitely.
//!
//! Time is passed in explicitly so ticks and tests share the same code path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_core::{Point, Pose, RobotId};
use fleet_events::{Event, EventBus};
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::status_tracker::StatusTracker;

struct Anchor {
    point: Point,
    since: Instant,
}

pub struct OutOfCommissionWatch {
    tracker: Arc<StatusTracker>,
    bus: EventBus,
    distance_threshold: f64,
    stall_window: Duration,
    anchors: HashMap<RobotId, Anchor>,
    flagged: HashSet<RobotId>,
}

impl OutOfCommissionWatch {
    pub fn new(tracker: Arc<StatusTracker>, bus: EventBus, config: &SchedulerConfig) -> Self {
        Self {
            tracker,
            bus,
            distance_threshold: config.stall_distance,
            stall_window: config.stall_window(),
            anchors: HashMap::new(),
            flagged: HashSet::new(),
        }
    }

    /// Feed one pose sample. The anchor only moves when the robot has
    /// displaced itself beyond the threshold; jitter under it keeps the
    /// original anchor and its timestamp.
    pub fn observe_pose(&mut self, robot: RobotId, pose: &Pose, now: Instant) {
        match self.anchors.get_mut(&robot) {
            Some(anchor) => {
                if anchor.point.distance(&pose.point) > self.distance_threshold {
                    anchor.point = pose.point;
                    anchor.since = now;
                    if self.flagged.remove(&robot) {
                        info!(robot = %robot, "robot moving again, stall alarm re-armed");
                    }
                }
            }
            None => {
                self.anchors.insert(
                    robot,
                    Anchor {
                        point: pose.point,
                        since: now,
                    },
                );
            }
        }
    }

    /// Evaluate every anchored robot and raise alarms for new stalls.
    /// Returns the robots flagged by this call.
    pub fn check(&mut self, now: Instant) -> Vec<RobotId> {
        let stalled: Vec<RobotId> = self
            .anchors
            .iter()
            .filter(|(robot, anchor)| {
                !self.flagged.contains(*robot)
                    && now.duration_since(anchor.since) >= self.stall_window
                    && self.busy(**robot)
            })
            .map(|(robot, _)| *robot)
            .collect();

        for robot in &stalled {
            warn!(robot = %robot, window = ?self.stall_window, "robot out of commission");
            self.flagged.insert(*robot);
            self.bus.publish(Event::OutOfCommission { robot: *robot });
        }
        stalled
    }

    /// A robot counts as busy while it holds an unfinished task.
    fn busy(&self, robot: RobotId) -> bool {
        self.tracker.current_task(robot).is_some() && !self.tracker.is_done(robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{CompletionStatus, StatusReport, Task};

    fn watch() -> (OutOfCommissionWatch, Arc<StatusTracker>, EventBus) {
        let bus = EventBus::new();
        let tracker = Arc::new(StatusTracker::new(bus.clone()));
        let watch = OutOfCommissionWatch::new(tracker.clone(), bus.clone(), &SchedulerConfig::default());
        (watch, tracker, bus)
    }

    fn mark_busy(tracker: &StatusTracker, robot: RobotId, task: Task) {
        tracker
            .report_status(&StatusReport::new(
                robot,
                task,
                CompletionStatus::in_progress(),
            ))
            .unwrap();
    }

    #[test]
    fn test_stationary_busy_robot_flagged_exactly_once() {
        let (mut watch, tracker, bus) = watch();
        let mut rx = bus.subscribe();
        mark_busy(&tracker, RobotId::Scout1, Task::ScoutSearchVolatile);

        let t0 = Instant::now();
        watch.observe_pose(RobotId::Scout1, &Pose::new(0.0, 0.0, 0.0), t0);

        assert!(watch.check(t0 + Duration::from_secs(29)).is_empty());
        assert_eq!(
            watch.check(t0 + Duration::from_secs(31)),
            vec![RobotId::Scout1]
        );
        // Latched: still stuck a minute later, no second alarm.
        assert!(watch.check(t0 + Duration::from_secs(90)).is_empty());

        let mut alarms = 0;
        while let Ok(envelope) = rx.try_recv() {
            if matches!(envelope.event, Event::OutOfCommission { .. }) {
                alarms += 1;
            }
        }
        assert_eq!(alarms, 1);
    }

    #[test]
    fn test_movement_rearms_the_alarm() {
        let (mut watch, tracker, _bus) = watch();
        mark_busy(&tracker, RobotId::Hauler1, Task::HaulerGoToLoc);

        let t0 = Instant::now();
        watch.observe_pose(RobotId::Hauler1, &Pose::new(0.0, 0.0, 0.0), t0);
        assert_eq!(
            watch.check(t0 + Duration::from_secs(31)),
            vec![RobotId::Hauler1]
        );

        // A real displacement re-anchors and re-arms.
        let t1 = t0 + Duration::from_secs(40);
        watch.observe_pose(RobotId::Hauler1, &Pose::new(3.0, 0.0, 0.0), t1);
        assert!(watch.check(t1 + Duration::from_secs(5)).is_empty());
        assert_eq!(
            watch.check(t1 + Duration::from_secs(31)),
            vec![RobotId::Hauler1]
        );
    }

    #[test]
    fn test_jitter_does_not_reset_the_window() {
        let (mut watch, tracker, _bus) = watch();
        mark_busy(&tracker, RobotId::Excavator1, Task::ExcavatorGoToLoc);

        let t0 = Instant::now();
        watch.observe_pose(RobotId::Excavator1, &Pose::new(0.0, 0.0, 0.0), t0);
        // Sub-threshold wiggle halfway through the window.
        watch.observe_pose(
            RobotId::Excavator1,
            &Pose::new(0.5, 0.0, 0.0),
            t0 + Duration::from_secs(15),
        );
        assert_eq!(
            watch.check(t0 + Duration::from_secs(31)),
            vec![RobotId::Excavator1]
        );
    }

    #[test]
    fn test_idle_robot_is_never_flagged() {
        let (mut watch, _tracker, _bus) = watch();
        let t0 = Instant::now();
        watch.observe_pose(RobotId::Scout2, &Pose::new(0.0, 0.0, 0.0), t0);
        assert!(watch.check(t0 + Duration::from_secs(120)).is_empty());
    }

    #[test]
    fn test_finished_robot_is_never_flagged() {
        let (mut watch, tracker, _bus) = watch();
        tracker
            .report_status(&StatusReport::new(
                RobotId::Hauler2,
                Task::HaulerDumpVolatileToProcPlant,
                CompletionStatus::done(true),
            ))
            .unwrap();

        let t0 = Instant::now();
        watch.observe_pose(RobotId::Hauler2, &Pose::new(0.0, 0.0, 0.0), t0);
        assert!(watch.check(t0 + Duration::from_secs(120)).is_empty());
    }
}
