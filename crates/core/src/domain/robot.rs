use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three robot roles. Each archetype has its own task vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Scout,
    Excavator,
    Hauler,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Excavator => "excavator",
            Self::Hauler => "hauler",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical robot in the fleet. The wire name is the identity used by
/// inbound status reports; anything else is rejected at the tracker boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotId {
    Scout1,
    Scout2,
    Excavator1,
    Excavator2,
    Hauler1,
    Hauler2,
}

impl RobotId {
    pub const ALL: [RobotId; 6] = [
        Self::Scout1,
        Self::Scout2,
        Self::Excavator1,
        Self::Excavator2,
        Self::Hauler1,
        Self::Hauler2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Scout1 => "small_scout_1",
            Self::Scout2 => "small_scout_2",
            Self::Excavator1 => "small_excavator_1",
            Self::Excavator2 => "small_excavator_2",
            Self::Hauler1 => "small_hauler_1",
            Self::Hauler2 => "small_hauler_2",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "small_scout_1" => Some(Self::Scout1),
            "small_scout_2" => Some(Self::Scout2),
            "small_excavator_1" => Some(Self::Excavator1),
            "small_excavator_2" => Some(Self::Excavator2),
            "small_hauler_1" => Some(Self::Hauler1),
            "small_hauler_2" => Some(Self::Hauler2),
            _ => None,
        }
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            Self::Scout1 | Self::Scout2 => Archetype::Scout,
            Self::Excavator1 | Self::Excavator2 => Archetype::Excavator,
            Self::Hauler1 | Self::Hauler2 => Archetype::Hauler,
        }
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for robot in RobotId::ALL {
            assert_eq!(RobotId::parse(robot.name()), Some(robot));
        }
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert_eq!(RobotId::parse("small_scout_3"), None);
        assert_eq!(RobotId::parse(""), None);
    }

    #[test]
    fn test_archetypes() {
        assert_eq!(RobotId::Scout2.archetype(), Archetype::Scout);
        assert_eq!(RobotId::Excavator1.archetype(), Archetype::Excavator);
        assert_eq!(RobotId::Hauler1.archetype(), Archetype::Hauler);
    }
}
