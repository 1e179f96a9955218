use thiserror::Error;

use crate::domain::{Archetype, Task};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown robot name: {0:?}")]
    UnknownRobot(String),

    #[error("unknown task code: {0}")]
    UnknownTaskCode(i32),

    #[error("task {task} is not valid for a {archetype}")]
    ArchetypeMismatch { archetype: Archetype, task: Task },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownRobot("small_scout_3".to_string());
        assert!(err.to_string().contains("small_scout_3"));

        let err = CoreError::ArchetypeMismatch {
            archetype: Archetype::Scout,
            task: Task::HaulerGoToLoc,
        };
        assert!(err.to_string().contains("hauler_go_to_loc"));
        assert!(err.to_string().contains("scout"));
    }
}
