use serde::{Deserialize, Serialize};
use std::fmt;

use super::Archetype;

/// The fleet-wide vocabulary of dispatchable tasks.
///
/// Every task carries an explicit non-zero wire code. Code zero is reserved:
/// an all-default status message must never decode to a valid task, so
/// "no task assigned yet" is always `Option<Task>` and never a sentinel
/// member of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    // Scout
    ScoutSearchVolatile,
    ScoutStopSearch,
    ScoutLocateVolatile,
    ScoutUndock,

    // Excavator
    ExcavatorGoToLoc,
    ExcavatorGoToScout,
    ExcavatorParkAndPub,
    ExcavatorDigAndDumpVolatile,
    ExcavatorGoToDefaultArmPose,
    ExcavatorNextQueTask,

    // Hauler
    HaulerGoToLookout,
    HaulerGoToDigSite,
    HaulerGoToLoc,
    HaulerFollowExcavator,
    HaulerParkAtExcavator,
    HaulerAcceptVolatile,
    HaulerGoToProcPlant,
    HaulerParkAtHopper,
    HaulerDumpVolatileToProcPlant,
}

impl Task {
    pub fn code(&self) -> i32 {
        match self {
            Self::ScoutSearchVolatile => 1,
            Self::ScoutStopSearch => 2,
            Self::ScoutLocateVolatile => 3,
            Self::ScoutUndock => 4,

            Self::ExcavatorGoToLoc => 10,
            Self::ExcavatorGoToScout => 11,
            Self::ExcavatorParkAndPub => 12,
            Self::ExcavatorDigAndDumpVolatile => 13,
            Self::ExcavatorGoToDefaultArmPose => 14,
            Self::ExcavatorNextQueTask => 15,

            Self::HaulerGoToLookout => 20,
            Self::HaulerGoToDigSite => 28,
            Self::HaulerGoToLoc => 21,
            Self::HaulerFollowExcavator => 22,
            Self::HaulerParkAtExcavator => 23,
            Self::HaulerAcceptVolatile => 24,
            Self::HaulerGoToProcPlant => 25,
            Self::HaulerParkAtHopper => 26,
            Self::HaulerDumpVolatileToProcPlant => 27,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::ScoutSearchVolatile),
            2 => Some(Self::ScoutStopSearch),
            3 => Some(Self::ScoutLocateVolatile),
            4 => Some(Self::ScoutUndock),

            10 => Some(Self::ExcavatorGoToLoc),
            11 => Some(Self::ExcavatorGoToScout),
            12 => Some(Self::ExcavatorParkAndPub),
            13 => Some(Self::ExcavatorDigAndDumpVolatile),
            14 => Some(Self::ExcavatorGoToDefaultArmPose),
            15 => Some(Self::ExcavatorNextQueTask),

            20 => Some(Self::HaulerGoToLookout),
            28 => Some(Self::HaulerGoToDigSite),
            21 => Some(Self::HaulerGoToLoc),
            22 => Some(Self::HaulerFollowExcavator),
            23 => Some(Self::HaulerParkAtExcavator),
            24 => Some(Self::HaulerAcceptVolatile),
            25 => Some(Self::HaulerGoToProcPlant),
            26 => Some(Self::HaulerParkAtHopper),
            27 => Some(Self::HaulerDumpVolatileToProcPlant),
            _ => None,
        }
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            Self::ScoutSearchVolatile
            | Self::ScoutStopSearch
            | Self::ScoutLocateVolatile
            | Self::ScoutUndock => Archetype::Scout,

            Self::ExcavatorGoToLoc
            | Self::ExcavatorGoToScout
            | Self::ExcavatorParkAndPub
            | Self::ExcavatorDigAndDumpVolatile
            | Self::ExcavatorGoToDefaultArmPose
            | Self::ExcavatorNextQueTask => Archetype::Excavator,

            Self::HaulerGoToLookout
            | Self::HaulerGoToDigSite
            | Self::HaulerGoToLoc
            | Self::HaulerFollowExcavator
            | Self::HaulerParkAtExcavator
            | Self::HaulerAcceptVolatile
            | Self::HaulerGoToProcPlant
            | Self::HaulerParkAtHopper
            | Self::HaulerDumpVolatileToProcPlant => Archetype::Hauler,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoutSearchVolatile => "scout_search_volatile",
            Self::ScoutStopSearch => "scout_stop_search",
            Self::ScoutLocateVolatile => "scout_locate_volatile",
            Self::ScoutUndock => "scout_undock",
            Self::ExcavatorGoToLoc => "excavator_go_to_loc",
            Self::ExcavatorGoToScout => "excavator_go_to_scout",
            Self::ExcavatorParkAndPub => "excavator_park_and_pub",
            Self::ExcavatorDigAndDumpVolatile => "excavator_dig_and_dump_volatile",
            Self::ExcavatorGoToDefaultArmPose => "excavator_go_to_default_arm_pose",
            Self::ExcavatorNextQueTask => "excavator_next_que_task",
            Self::HaulerGoToLookout => "hauler_go_to_lookout",
            Self::HaulerGoToDigSite => "hauler_go_to_dig_site",
            Self::HaulerGoToLoc => "hauler_go_to_loc",
            Self::HaulerFollowExcavator => "hauler_follow_excavator",
            Self::HaulerParkAtExcavator => "hauler_park_at_excavator",
            Self::HaulerAcceptVolatile => "hauler_accept_volatile",
            Self::HaulerGoToProcPlant => "hauler_go_to_proc_plant",
            Self::HaulerParkAtHopper => "hauler_park_at_hopper",
            Self::HaulerDumpVolatileToProcPlant => "hauler_dump_volatile_to_proc_plant",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TASKS: [Task; 19] = [
        Task::ScoutSearchVolatile,
        Task::ScoutStopSearch,
        Task::ScoutLocateVolatile,
        Task::ScoutUndock,
        Task::ExcavatorGoToLoc,
        Task::ExcavatorGoToScout,
        Task::ExcavatorParkAndPub,
        Task::ExcavatorDigAndDumpVolatile,
        Task::ExcavatorGoToDefaultArmPose,
        Task::ExcavatorNextQueTask,
        Task::HaulerGoToLookout,
        Task::HaulerGoToDigSite,
        Task::HaulerGoToLoc,
        Task::HaulerFollowExcavator,
        Task::HaulerParkAtExcavator,
        Task::HaulerAcceptVolatile,
        Task::HaulerGoToProcPlant,
        Task::HaulerParkAtHopper,
        Task::HaulerDumpVolatileToProcPlant,
    ];

    #[test]
    fn test_code_roundtrip() {
        for task in ALL_TASKS {
            assert_eq!(Task::from_code(task.code()), Some(task));
        }
    }

    #[test]
    fn test_zero_code_is_reserved() {
        assert_eq!(Task::from_code(0), None);
        for task in ALL_TASKS {
            assert_ne!(task.code(), 0);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in ALL_TASKS.iter().enumerate() {
            for b in &ALL_TASKS[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_archetype_of_task() {
        assert_eq!(Task::ScoutUndock.archetype(), Archetype::Scout);
        assert_eq!(Task::ExcavatorParkAndPub.archetype(), Archetype::Excavator);
        assert_eq!(Task::HaulerGoToLoc.archetype(), Archetype::Hauler);
    }
}
