//! Vehicle states for the microscopic level.

use mls_core::{LaneId, Point2D, RoadId, SimRng};

use crate::idm::{CarFollowing, IdmParams};
use crate::mobil::MobilParams;

// ── Public state ──────────────────────────────────────────────────────────────

/// What other vehicles can perceive: where the vehicle is and how it moves.
#[derive(Clone, Debug, PartialEq)]
pub struct VehiclePublicMicro {
    pub lane:       LaneId,
    /// Index of `lane` within its road (0 = leftmost).
    pub lane_index: u32,
    /// Longitudinal front-bumper position along the lane (m).
    pub pos:        f64,
    pub speed:      f64,
    pub accel:      f64,
    pub length:     f64,
    /// Resolved plane position, updated by the reaction from lane geometry.
    pub position:   Point2D,
    pub heading:    f64,
}

impl VehiclePublicMicro {
    pub fn new(lane: LaneId, lane_index: u32, pos: f64, speed: f64) -> Self {
        Self {
            lane,
            lane_index,
            pos,
            speed,
            accel: 0.0,
            length: 5.0,
            position: Point2D::ORIGIN,
            heading: 0.0,
        }
    }
}

// ── Private state ─────────────────────────────────────────────────────────────

/// Driving style: the car-following law and lane-change parameters this
/// driver reasons with.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverProfile {
    pub car_following:    CarFollowing,
    pub mobil:            MobilParams,
    /// How far ahead/behind the driver perceives neighbors (m).
    pub perception_range: f64,
}

impl Default for DriverProfile {
    fn default() -> Self {
        Self {
            car_following:    CarFollowing::default(),
            mobil:            MobilParams::default(),
            perception_range: 150.0,
        }
    }
}

impl DriverProfile {
    /// A profile with mild driver-to-driver variation: desired speed ±10 %,
    /// headway ±0.3 s, politeness in [0.3, 0.7].  Deterministic for a given
    /// RNG state — population seeding stays reproducible.
    pub fn randomized(rng: &mut SimRng) -> Self {
        let base = IdmParams::default();
        let idm = IdmParams {
            v0:        base.v0 * rng.gen_range(0.9..1.1),
            t_headway: base.t_headway + rng.gen_range(-0.3..0.3),
            ..base
        };
        let mobil = MobilParams {
            politeness: rng.gen_range(0.3..0.7),
            ..MobilParams::default()
        };
        Self {
            car_following:    CarFollowing::Idm(idm),
            mobil,
            perception_range: 150.0,
        }
    }
}

/// What only the driver itself knows: its style and route.
#[derive(Clone, Debug, PartialEq)]
pub struct VehiclePrivateMicro {
    pub driver:      DriverProfile,
    /// Roads still to traverse, front to back.
    pub route:       Vec<RoadId>,
    pub route_index: usize,
}

impl VehiclePrivateMicro {
    pub fn new(driver: DriverProfile) -> Self {
        Self { driver, route: Vec::new(), route_index: 0 }
    }

    /// The next road on the route, if any remains.
    pub fn next_road(&self) -> Option<RoadId> {
        self.route.get(self.route_index).copied()
    }
}
