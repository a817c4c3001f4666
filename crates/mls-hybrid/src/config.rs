//! Hybridizer thresholds and pinning policy.

/// Mode-switch thresholds and conversion parameters.
///
/// A lane is promoted micro → macro when *any* of the high-side triggers
/// fires, and demoted macro → micro only when *both* low-side conditions
/// hold, with the density threshold additionally divided by the hysteresis
/// factor.  No lane switches twice within `frames_stable` updates.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HybridConfig {
    /// Promote when density exceeds this (veh/m).  Default 0.08 (80 veh/km).
    pub rho_hi: f64,
    /// Demote when density falls below this over hysteresis (veh/m).
    pub rho_lo: f64,
    /// Promote when the lane holds more vehicles than this.
    pub count_hi: usize,
    /// Demote only when fewer vehicles than this.
    pub count_lo: usize,
    /// Promote when a micro update exceeds this wall-clock budget (ms).
    pub budget_ms: f64,
    /// Cells of the macroscopic grid per lane.
    pub macro_num_cells: usize,
    /// Jam density of the macroscopic diagram (veh/m).
    pub rho_jam: f64,
    /// Hysteresis factor `h ≥ 1` applied to the demotion density.
    pub hysteresis: f64,
    /// Updates a lane must stay in its mode after a transition.
    pub frames_stable: u32,
    /// Auto-pin lanes of very short roads (intersection heuristic).
    pub pin_intersections: bool,
    /// Auto-pin lanes of roads whose name marks them as ramps.
    pub pin_ramps: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rho_hi:            0.08,
            rho_lo:            0.04,
            count_hi:          50,
            count_lo:          20,
            budget_ms:         10.0,
            macro_num_cells:   50,
            rho_jam:           0.15,
            hysteresis:        1.2,
            frames_stable:     30,
            pin_intersections: true,
            pin_ramps:         true,
        }
    }
}

/// Roads shorter than this read as intersection stubs.
pub(crate) const INTERSECTION_LENGTH_M: f64 = 50.0;
