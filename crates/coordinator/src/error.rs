use fleet_core::RobotId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Core(#[from] fleet_core::CoreError),

    #[error("goal pose for {robot} unavailable: no {reference} pose received yet")]
    PoseUnavailable {
        robot: RobotId,
        reference: RobotId,
    },

    #[error("precondition not met: {0}")]
    MissingPrecondition(&'static str),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
