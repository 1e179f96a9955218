pub mod action;
pub mod config;
pub mod error;
pub mod executors;
pub mod scheduler;
pub mod status_tracker;
pub mod team;
pub mod watchdog;

pub use action::{ActionClient, Goal, GoalState, GoalStatus};
pub use config::SchedulerConfig;
pub use error::{CoordinatorError, Result};
pub use scheduler::{PoseTable, SchedulerHandle, TeamScheduler};
pub use status_tracker::StatusTracker;
pub use team::{Team, TeamMacroState, TeamMicroState};
pub use watchdog::OutOfCommissionWatch;
