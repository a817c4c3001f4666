//! Per-lane hybridizer state and aggregate statistics.

use mls_core::{LaneId, VehicleId};
use mls_macro::LwrGrid;

/// How a lane is currently simulated.
///
/// `Transitioning` is only ever observable from inside a conversion; between
/// updates a lane is fully `Micro` or fully `Macro`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LaneMode {
    Micro,
    Macro,
    Transitioning,
}

/// Per-vehicle attributes preserved across a macroscopic episode so
/// demotion can restore recognizable vehicles.
#[derive(Clone, Debug)]
pub struct StoredVehicle {
    pub label:     String,
    pub length:    f64,
    pub max_accel: f64,
    pub max_decel: f64,
}

/// The hybridizer's view of one lane.
#[derive(Debug)]
pub struct LaneState {
    pub lane: LaneId,
    pub mode: LaneMode,

    /// Arena vehicles on the lane while micro (mirrors lane membership).
    pub vehicles: Vec<VehicleId>,
    /// The density grid while macro.
    pub lwr: Option<LwrGrid>,
    /// Attributes of absorbed vehicles, reused in order on demotion.
    pub stored: Vec<StoredVehicle>,

    // ── Metrics, refreshed each update ───────────────────────────────────
    pub density:       f64,
    pub avg_speed:     f64,
    pub flow:          f64,
    pub vehicle_count: usize,
    /// Wall-clock cost of the last update (ms).
    pub last_update_ms: f64,

    pub frames_since_transition: u32,
    /// Pinned lanes never switch automatically.
    pub pinned: bool,
}

/// Aggregate hybridizer statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    pub total_lanes:         usize,
    pub micro_lanes:         usize,
    pub macro_lanes:         usize,
    pub transitioning_lanes: usize,
    pub total_vehicles:      usize,
    pub avg_density:         f64,
    pub total_update_ms:     f64,
    /// Estimated gain over all-micro simulation, with macro lanes counted
    /// as `MACRO_COST_RATIO` times cheaper.
    pub speedup_factor:      f64,
}

/// Calibrated cost ratio of a macro lane update versus a micro one.
pub(crate) const MACRO_COST_RATIO: f64 = 50.0;
