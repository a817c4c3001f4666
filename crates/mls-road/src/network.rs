//! Road network arena: roads, lanes, geometry, and adjacency.

use mls_core::{LaneId, Point2D, RoadId, VehicleId};

use crate::error::{RoadError, RoadResult};
use crate::vehicle::VehicleArena;

// ── Side ──────────────────────────────────────────────────────────────────────

/// Lateral direction relative to driving direction.
///
/// Lane index 0 is the leftmost lane of its road; `Right` neighbors have
/// higher indices.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Left,
    Right,
}

// ── Geometry ──────────────────────────────────────────────────────────────────

/// End-of-lane semantics, declared per lane.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndBehavior {
    /// The lane is a ring: positions wrap modulo its length.
    #[default]
    Wrap,
    /// The lane is bounded: positions clamp to `[0, length]`; a clamp is a
    /// topology event for the reaction that caused it.
    Clamp,
}

/// A straight lane segment in the plane.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneGeometry {
    pub start: Point2D,
    pub end:   Point2D,
}

impl LaneGeometry {
    /// Plane position at longitudinal offset `s` along a lane of `length`.
    pub fn position_at(&self, s: f64, length: f64) -> Point2D {
        if length <= 0.0 {
            return self.start;
        }
        self.start.lerp(self.end, s / length)
    }

    /// Heading in radians, constant along a straight segment.
    pub fn heading(&self) -> f64 {
        let d = self.end - self.start;
        d.y.atan2(d.x)
    }
}

// ── Lane ──────────────────────────────────────────────────────────────────────

/// A longitudinal section of a road.
///
/// `vehicles` is sorted by position (rear to front) and is maintained by the
/// membership operations on [`RoadNetwork`]; arena-based simulations (the
/// hybridizer) use it as the authoritative ordering for leader lookups.
#[derive(Clone, Debug)]
pub struct Lane {
    pub id:          LaneId,
    pub road:        RoadId,
    /// 0 = leftmost lane of the road.
    pub index:       u32,
    pub length:      f64,
    pub speed_limit: f64,
    pub end:         EndBehavior,
    pub geometry:    LaneGeometry,
    pub vehicles:    Vec<VehicleId>,
}

impl Lane {
    /// Plane position at longitudinal offset `s`.
    pub fn position_at(&self, s: f64) -> Point2D {
        self.geometry.position_at(s, self.length)
    }

    /// Heading at longitudinal offset `s` (constant for straight lanes).
    pub fn heading_at(&self, _s: f64) -> f64 {
        self.geometry.heading()
    }

    /// Normalize a longitudinal position per the lane's end behavior.
    ///
    /// Returns the resolved position and whether a clamp occurred.
    pub fn normalize(&self, s: f64) -> (f64, bool) {
        match self.end {
            EndBehavior::Wrap => {
                let r = s.rem_euclid(self.length);
                (r, false)
            }
            EndBehavior::Clamp => {
                if (0.0..=self.length).contains(&s) {
                    (s, false)
                } else {
                    (s.clamp(0.0, self.length), true)
                }
            }
        }
    }
}

// ── Road ──────────────────────────────────────────────────────────────────────

/// A directed road holding an ordered list of parallel lanes.
#[derive(Clone, Debug)]
pub struct Road {
    pub id:          RoadId,
    pub name:        String,
    pub length:      f64,
    pub speed_limit: f64,
    /// Lanes left to right; `lanes[i]` has `index == i`.
    pub lanes:       Vec<LaneId>,
}

impl Road {
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Arena of roads and lanes with adjacency and lane-membership operations.
#[derive(Clone, Debug, Default)]
pub struct RoadNetwork {
    roads: Vec<Road>,
    lanes: Vec<Lane>,
}

impl RoadNetwork {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_roads(&self) -> usize {
        self.roads.len()
    }

    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }

    pub fn road(&self, id: RoadId) -> RoadResult<&Road> {
        self.roads.get(id.index()).ok_or(RoadError::UnknownRoad(id))
    }

    pub fn lane(&self, id: LaneId) -> RoadResult<&Lane> {
        self.lanes.get(id.index()).ok_or(RoadError::UnknownLane(id))
    }

    pub fn lane_mut(&mut self, id: LaneId) -> RoadResult<&mut Lane> {
        self.lanes.get_mut(id.index()).ok_or(RoadError::UnknownLane(id))
    }

    pub fn lane_ids(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.lanes.iter().map(|l| l.id)
    }

    /// The lane one step to `side` of `lane`, if the road has one.
    pub fn adjacent(&self, lane: LaneId, side: Side) -> Option<LaneId> {
        let lane = self.lanes.get(lane.index())?;
        let road = self.roads.get(lane.road.index())?;
        let target = match side {
            Side::Left  => lane.index.checked_sub(1)? as usize,
            Side::Right => lane.index as usize + 1,
        };
        road.lanes.get(target).copied()
    }

    // ── Lane membership ───────────────────────────────────────────────────
    //
    // Lanes store vehicle ids sorted by position; these operations keep the
    // ordering invariant against the arena's authoritative positions.

    /// Insert `vehicle` into `lane`, keeping position order.
    pub fn insert_vehicle(
        &mut self,
        lane:    LaneId,
        vehicle: VehicleId,
        arena:   &VehicleArena,
    ) -> RoadResult<()> {
        let pos = arena.get(vehicle)?.pos;
        let lane = self.lane_mut(lane)?;
        let at = lane
            .vehicles
            .partition_point(|&v| arena.get(v).map(|o| o.pos <= pos).unwrap_or(false));
        lane.vehicles.insert(at, vehicle);
        Ok(())
    }

    /// Remove `vehicle` from `lane`.  Removing an absent vehicle is a no-op.
    pub fn remove_vehicle(&mut self, lane: LaneId, vehicle: VehicleId) -> RoadResult<()> {
        let lane = self.lane_mut(lane)?;
        lane.vehicles.retain(|&v| v != vehicle);
        Ok(())
    }

    /// Re-sort a lane's membership after positions changed.
    pub fn resort_lane(&mut self, lane: LaneId, arena: &VehicleArena) -> RoadResult<()> {
        let lane = self.lane_mut(lane)?;
        lane.vehicles
            .sort_by(|&a, &b| {
                let pa = arena.get(a).map(|v| v.pos).unwrap_or(0.0);
                let pb = arena.get(b).map(|v| v.pos).unwrap_or(0.0);
                pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
            });
        Ok(())
    }

    /// The nearest vehicle ahead of `pos` in `lane` and the net gap to it
    /// (bumper to bumper: leader rear minus `pos`).
    pub fn leader_of(
        &self,
        lane:  LaneId,
        pos:   f64,
        arena: &VehicleArena,
    ) -> RoadResult<Option<(VehicleId, f64)>> {
        let lane = self.lane(lane)?;
        let mut best: Option<(VehicleId, f64)> = None;
        for &v in &lane.vehicles {
            let Ok(vehicle) = arena.get(v) else { continue };
            if vehicle.pos > pos {
                let gap = vehicle.pos - pos - vehicle.length;
                if best.map(|(_, g)| gap < g).unwrap_or(true) {
                    best = Some((v, gap));
                }
            }
        }
        Ok(best)
    }

    /// The nearest vehicle behind `pos` in `lane` and the net gap to it.
    pub fn follower_of(
        &self,
        lane:  LaneId,
        pos:   f64,
        arena: &VehicleArena,
    ) -> RoadResult<Option<(VehicleId, f64)>> {
        let lane = self.lane(lane)?;
        let mut best: Option<(VehicleId, f64)> = None;
        for &v in &lane.vehicles {
            let Ok(vehicle) = arena.get(v) else { continue };
            if vehicle.pos < pos {
                let gap = pos - vehicle.pos - vehicle.length;
                if best.map(|(_, g)| gap < g).unwrap_or(true) {
                    best = Some((v, gap));
                }
            }
        }
        Ok(best)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent constructor for a [`RoadNetwork`].
///
/// # Example
///
/// ```rust,ignore
/// let mut b = RoadNetworkBuilder::new();
/// let highway = b.add_road("a1", 1000.0, 33.3, 3);
/// let network = b.build();
/// let first_lane = network.road(highway).unwrap().lanes[0];
/// ```
pub struct RoadNetworkBuilder {
    network:    RoadNetwork,
    lane_width: f64,
    end:        EndBehavior,
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self {
            network:    RoadNetwork::empty(),
            lane_width: 3.5,
            end:        EndBehavior::default(),
        }
    }

    /// End behavior applied to lanes of subsequently added roads.
    pub fn end_behavior(mut self, end: EndBehavior) -> Self {
        self.end = end;
        self
    }

    pub fn lane_width(mut self, width: f64) -> Self {
        self.lane_width = width;
        self
    }

    /// Add a straight west-to-east road at `y_offset` with `num_lanes`
    /// parallel lanes (lane 0 leftmost/northmost).
    pub fn add_road_at(
        &mut self,
        name:        impl Into<String>,
        length:      f64,
        speed_limit: f64,
        num_lanes:   u32,
        y_offset:    f64,
    ) -> RoadId {
        let road_id = RoadId(self.network.roads.len() as u32);
        let mut lane_ids = Vec::with_capacity(num_lanes as usize);
        for index in 0..num_lanes {
            let lane_id = LaneId(self.network.lanes.len() as u32);
            let y = y_offset + index as f64 * self.lane_width;
            self.network.lanes.push(Lane {
                id: lane_id,
                road: road_id,
                index,
                length,
                speed_limit,
                end: self.end,
                geometry: LaneGeometry {
                    start: Point2D::new(0.0, y),
                    end:   Point2D::new(length, y),
                },
                vehicles: Vec::new(),
            });
            lane_ids.push(lane_id);
        }
        self.network.roads.push(Road {
            id: road_id,
            name: name.into(),
            length,
            speed_limit,
            lanes: lane_ids,
        });
        road_id
    }

    /// Add a road at the origin.
    pub fn add_road(
        &mut self,
        name:        impl Into<String>,
        length:      f64,
        speed_limit: f64,
        num_lanes:   u32,
    ) -> RoadId {
        self.add_road_at(name, length, speed_limit, num_lanes, 0.0)
    }

    pub fn build(self) -> RoadNetwork {
        self.network
    }
}
