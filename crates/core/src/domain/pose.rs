use serde::{Deserialize, Serialize};

/// Frame every computed goal is expressed in.
pub const MAP_FRAME: &str = "map";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Position plus heading in a named reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub point: Point,
    pub yaw: f64,
    pub frame: String,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            point: Point::new(x, y, z),
            yaw: 0.0,
            frame: MAP_FRAME.to_string(),
        }
    }

    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = yaw;
        self
    }

    /// Shift the position in the frame's x/y plane. Used for the hauler's
    /// dig-site approach, which parks beside the site rather than on it.
    pub fn offset_by(mut self, dx: f64, dy: f64) -> Self {
        self.point.x += dx;
        self.point.y += dy;
        self
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Compute a rendezvous goal `offset` units from `reference` along the
/// `reference -> approaching` direction.
///
/// A positive offset stops the approaching robot short of the reference; a
/// negative offset places the goal on the far side of the reference, away
/// from the approaching robot. If the two points coincide there is no
/// direction to offset along and the reference is returned unchanged.
pub fn standoff_point(reference: &Point, approaching: &Point, offset: f64) -> Point {
    let dx = approaching.x - reference.x;
    let dy = approaching.y - reference.y;
    let dz = approaching.z - reference.z;
    let dist = (dx * dx + dy * dy + dz * dz).sqrt();
    if dist < f64::EPSILON {
        return *reference;
    }
    Point::new(
        reference.x + dx / dist * offset,
        reference.y + dy / dist * offset,
        reference.z + dz / dist * offset,
    )
}

/// Standoff goal in the map frame, heading toward the reference.
pub fn standoff_pose(reference: &Pose, approaching: &Pose, offset: f64) -> Pose {
    let point = standoff_point(&reference.point, &approaching.point, offset);
    let yaw = (reference.point.y - point.y).atan2(reference.point.x - point.x);
    Pose {
        point,
        yaw,
        frame: MAP_FRAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standoff_stops_short_of_reference() {
        let scout = Point::new(0.0, 0.0, 0.0);
        let excavator = Point::new(10.0, 0.0, 0.0);
        let goal = standoff_point(&scout, &excavator, 5.0);
        assert!((goal.distance(&scout) - 5.0).abs() < 1e-9);
        assert!((goal.x - 5.0).abs() < 1e-9);
        assert!(goal.y.abs() < 1e-9);
    }

    #[test]
    fn test_standoff_lies_on_reference_line() {
        let reference = Point::new(1.0, 2.0, 0.0);
        let approaching = Point::new(4.0, 6.0, 0.0);
        let goal = standoff_point(&reference, &approaching, 5.0);
        // 3-4-5 triangle: the goal sits exactly at the approaching robot.
        assert!((goal.x - 4.0).abs() < 1e-9);
        assert!((goal.y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_offset_goes_beyond_reference() {
        let reference = Point::new(0.0, 0.0, 0.0);
        let approaching = Point::new(10.0, 0.0, 0.0);
        let goal = standoff_point(&reference, &approaching, -5.0);
        assert!((goal.x + 5.0).abs() < 1e-9);
        assert!((goal.distance(&reference) - 5.0).abs() < 1e-9);
        // Farther from the approaching robot than the reference is.
        assert!(goal.distance(&approaching) > reference.distance(&approaching));
    }

    #[test]
    fn test_coincident_points_return_reference() {
        let p = Point::new(3.0, 3.0, 0.0);
        assert_eq!(standoff_point(&p, &p, 5.0), p);
    }

    #[test]
    fn test_standoff_pose_faces_reference() {
        let reference = Pose::new(0.0, 0.0, 0.0);
        let approaching = Pose::new(10.0, 0.0, 0.0);
        let goal = standoff_pose(&reference, &approaching, 5.0);
        assert_eq!(goal.frame, MAP_FRAME);
        // Goal is at (5, 0) looking back toward the origin.
        assert!((goal.yaw.abs() - std::f64::consts::PI).abs() < 1e-9);
    }
}
