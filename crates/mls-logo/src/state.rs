//! Turtle local state.

use mls_core::Point2D;

/// What other turtles can perceive: pose and motion.
///
/// Heading is in radians, normalized to `[0, 2π)`; speed in patches per
/// second.  Private state is whatever the turtle's behavior needs — simple
/// turtles use `()`.
#[derive(Clone, Debug, PartialEq)]
pub struct TurtlePublic {
    pub location: Point2D,
    pub heading:  f64,
    pub speed:    f64,
    pub accel:    f64,
}

impl TurtlePublic {
    pub fn new(location: Point2D, heading: f64, speed: f64) -> Self {
        Self {
            location,
            heading: mls_core::math::normalize_angle(heading),
            speed,
            accel: 0.0,
        }
    }

    /// A turtle at rest at `location`.
    pub fn at(location: Point2D) -> Self {
        Self::new(location, 0.0, 0.0)
    }
}
