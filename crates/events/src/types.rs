//! Event types flowing between the coordination layers

use chrono::{DateTime, Utc};
use fleet_core::{Pose, RobotId, StatusReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All events published on the fleet bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A robot executor reported its current task and completion flags
    #[serde(rename = "robot.status")]
    StatusReported { report: StatusReport },

    /// The status tracker commanded a robot to adopt a new task
    #[serde(rename = "robot.desired_state")]
    DesiredState { robot: RobotId, task_code: i32 },

    /// Scout pinpointed a volatile; pose is the dig-site location
    #[serde(rename = "scout.volatile_found")]
    VolatileFound { robot: RobotId, pose: Pose },

    /// Excavator is parked at the volatile and ready to receive the hauler
    #[serde(rename = "excavator.ready")]
    ExcavatorReady { robot: RobotId },

    /// Hauler finished parking at the excavator
    #[serde(rename = "hauler.parked")]
    HaulerParked { robot: RobotId },

    /// Hauler bin was filled by the excavator
    #[serde(rename = "hauler.filled")]
    HaulerFilled { robot: RobotId },

    /// Watchdog flagged a robot that stopped making progress
    #[serde(rename = "robot.out_of_commission")]
    OutOfCommission { robot: RobotId },

    /// Team macro state changed
    #[serde(rename = "team.phase_changed")]
    TeamPhaseChanged { from: String, to: String },

    /// Non-fatal taxonomy error (unknown identity, unhandled task code)
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{CompletionStatus, Task};

    #[test]
    fn test_envelope_has_unique_ids() {
        let a = EventEnvelope::new(Event::HaulerFilled {
            robot: RobotId::Hauler1,
        });
        let b = EventEnvelope::new(Event::HaulerFilled {
            robot: RobotId::Hauler1,
        });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = Event::StatusReported {
            report: StatusReport::new(
                RobotId::Scout1,
                Task::ScoutSearchVolatile,
                CompletionStatus::done(true),
            ),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "robot.status");

        let event = Event::OutOfCommission {
            robot: RobotId::Excavator1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "robot.out_of_commission");
        assert_eq!(json["robot"], "excavator1");
    }
}
