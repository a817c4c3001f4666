//! Vehicle perception: neighbors, lane ends, and speed limits from the
//! public snapshot plus the road network.

use std::any::Any;

use mls_core::{AgentId, Period};
use mls_kernel::{Environment, LocalState, PerceivedData, PerceptionModel, PublicSnapshot};
use mls_road::{RoadNetwork, Side};

use crate::mobil::{LaneView, NeighborInfo};
use crate::state::{VehiclePrivateMicro, VehiclePublicMicro};

// ── Environment ───────────────────────────────────────────────────────────────

/// The microscopic level's environment: the static road topology.
///
/// Vehicle dynamics live in agent public states; the network contributes
/// geometry, adjacency, and speed limits.
pub struct RoadEnvironment {
    pub network: RoadNetwork,
}

impl RoadEnvironment {
    pub fn new(network: RoadNetwork) -> Self {
        Self { network }
    }
}

impl Environment for RoadEnvironment {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Perceived data ────────────────────────────────────────────────────────────

/// A vehicle's frozen view of its surroundings for one tick.
#[derive(Clone, Debug)]
pub struct VehiclePerceivedMicro {
    pub period:               Period,
    pub leader:               Option<NeighborInfo>,
    pub follower:             Option<NeighborInfo>,
    /// `None` when the road has no lane on that side.
    pub left:                 Option<LaneView>,
    pub right:                Option<LaneView>,
    pub distance_to_lane_end: f64,
    pub approaching_lane_end: bool,
    pub speed_limit:          f64,
}

impl VehiclePerceivedMicro {
    fn blind(period: Period) -> Self {
        Self {
            period,
            leader: None,
            follower: None,
            left: None,
            right: None,
            distance_to_lane_end: f64::INFINITY,
            approaching_lane_end: false,
            speed_limit: f64::INFINITY,
        }
    }
}

impl PerceivedData for VehiclePerceivedMicro {
    fn period(&self) -> Period {
        self.period
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Perception model ──────────────────────────────────────────────────────────

/// Scans the snapshot for the nearest leader/follower in the own and
/// adjacent lanes, within the driver's perception range.
///
/// Shared as one `Arc` across the whole vehicle population.
pub struct MicroPerception;

/// Nearest neighbors around `pos` among snapshot vehicles on `lane`.
///
/// Gaps are net (bumper to bumper): ahead uses the neighbor's length,
/// behind measures from the neighbor's front to the ego rear via the ego
/// caller's convention of front-bumper positions.
fn scan_lane(
    snapshot: &PublicSnapshot,
    me:       AgentId,
    lane:     mls_core::LaneId,
    pos:      f64,
    range:    f64,
) -> LaneView {
    let mut view = LaneView::default();
    let mut leader_gap = f64::INFINITY;
    let mut follower_gap = f64::INFINITY;

    for (id, entry) in snapshot.iter() {
        if id == me {
            continue;
        }
        let Some(other) = entry.state.downcast_ref::<VehiclePublicMicro>() else {
            continue;
        };
        if other.lane != lane {
            continue;
        }
        if other.pos > pos {
            let gap = other.pos - pos - other.length;
            if gap < leader_gap && gap < range {
                leader_gap = gap;
                view.leader = Some(NeighborInfo { gap, speed: other.speed });
            }
        } else if other.pos < pos {
            let gap = pos - other.pos - other.length;
            if gap < follower_gap && gap < range {
                follower_gap = gap;
                view.follower = Some(NeighborInfo { gap, speed: other.speed });
            }
        }
    }
    view
}

impl PerceptionModel for MicroPerception {
    fn perceive(
        &self,
        period:   Period,
        agent:    AgentId,
        snapshot: &PublicSnapshot,
        private:  &dyn LocalState,
        env:      Option<&dyn Environment>,
    ) -> Box<dyn PerceivedData> {
        let Some(me) = snapshot
            .get(agent)
            .and_then(|s| s.downcast_ref::<VehiclePublicMicro>())
        else {
            // First tick after insertion: not yet in the snapshot.
            return Box::new(VehiclePerceivedMicro::blind(period));
        };
        let range = private
            .downcast_ref::<VehiclePrivateMicro>()
            .map(|p| p.driver.perception_range)
            .unwrap_or(150.0);
        let network = env
            .and_then(|e| e.downcast_ref::<RoadEnvironment>())
            .map(|e| &e.network);

        let own = scan_lane(snapshot, agent, me.lane, me.pos, range);

        let mut perceived = VehiclePerceivedMicro {
            period,
            leader: own.leader,
            follower: own.follower,
            left: None,
            right: None,
            distance_to_lane_end: f64::INFINITY,
            approaching_lane_end: false,
            speed_limit: f64::INFINITY,
        };

        if let Some(network) = network {
            if let Ok(lane) = network.lane(me.lane) {
                perceived.speed_limit = lane.speed_limit;
                perceived.distance_to_lane_end = lane.length - me.pos;
                perceived.approaching_lane_end = perceived.distance_to_lane_end < range;
            }
            perceived.left = network
                .adjacent(me.lane, Side::Left)
                .map(|lane| scan_lane(snapshot, agent, lane, me.pos, range));
            perceived.right = network
                .adjacent(me.lane, Side::Right)
                .map(|lane| scan_lane(snapshot, agent, lane, me.pos, range));
        }

        Box::new(perceived)
    }
}
