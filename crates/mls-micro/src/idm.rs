//! Intelligent Driver Model car-following.
//!
//! Treiber, Hennecke & Helbing (2000): acceleration from ego speed, net gap
//! to the leader, and closing speed.  The IDM+ variant adds an emergency
//! braking override for critically small gaps.

use mls_core::math::square;

/// IDM parameter set.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdmParams {
    /// v₀ — desired free-flow speed (m/s).
    pub v0:        f64,
    /// T — desired time headway (s).
    pub t_headway: f64,
    /// s₀ — minimum gap at standstill (m).
    pub s0:        f64,
    /// a — maximum acceleration (m/s²).
    pub a_max:     f64,
    /// b — comfortable deceleration (m/s²), positive.
    pub b_comf:    f64,
    /// δ — acceleration exponent.
    pub delta:     f64,
}

impl Default for IdmParams {
    /// 120 km/h free speed, 1.5 s headway, 2 m standstill gap.
    fn default() -> Self {
        Self {
            v0:        33.3,
            t_headway: 1.5,
            s0:        2.0,
            a_max:     1.0,
            b_comf:    1.5,
            delta:     4.0,
        }
    }
}

/// Gap below which the interaction term would blow up numerically.
const MIN_GAP: f64 = 1e-3;

/// The built-in car-following laws, dispatched directly in the hot loop.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CarFollowing {
    Idm(IdmParams),
    /// IDM with an emergency-braking override for critical gaps.
    IdmPlus(IdmParams),
}

impl Default for CarFollowing {
    fn default() -> Self {
        CarFollowing::Idm(IdmParams::default())
    }
}

impl CarFollowing {
    pub fn params(&self) -> &IdmParams {
        match self {
            CarFollowing::Idm(p) | CarFollowing::IdmPlus(p) => p,
        }
    }

    /// Desired dynamic gap `s* = s₀ + vT + vΔv / (2√(ab))`, clamped at 0.
    pub fn desired_gap(&self, v: f64, dv: f64) -> f64 {
        let p = self.params();
        let interaction = v * dv / (2.0 * (p.a_max * p.b_comf).sqrt());
        (p.s0 + v * p.t_headway + interaction).max(0.0)
    }

    /// Acceleration for ego speed `v` given the leader as `(net_gap, Δv)`
    /// with `Δv = v − v_leader`, or `None` in free flow.
    pub fn acceleration(&self, v: f64, leader: Option<(f64, f64)>) -> f64 {
        let p = *self.params();
        let free = p.a_max * (1.0 - (v / p.v0).powf(p.delta));

        let Some((gap, dv)) = leader else {
            return free;
        };
        let gap = gap.max(MIN_GAP);
        let nominal = free - p.a_max * square(self.desired_gap(v, dv) / gap);

        match self {
            CarFollowing::Idm(_) => nominal,
            CarFollowing::IdmPlus(_) => {
                // Most-braking override when inside the critical gap and
                // still closing.
                let s_crit = p.s0 + v * p.t_headway;
                if gap < s_crit && dv > 0.0 {
                    let emergency = -p.b_comf * (s_crit - gap) / s_crit;
                    nominal.min(emergency)
                } else {
                    nominal
                }
            }
        }
    }

    /// Net gap at which a follower at steady speed `v` holds its leader:
    /// `s*(v, 0) / √(1 − (v/v₀)^δ)`.  Useful for calibration and platoon
    /// seeding; undefined (∞) at or above the desired speed.
    pub fn equilibrium_gap(&self, v: f64) -> f64 {
        let p = self.params();
        let free_fraction = 1.0 - (v / p.v0).powf(p.delta);
        if free_fraction <= 0.0 {
            return f64::INFINITY;
        }
        self.desired_gap(v, 0.0) / free_fraction.sqrt()
    }
}
