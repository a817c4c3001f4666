//! MOBIL lane-change evaluation.
//!
//! Kesting, Treiber & Helbing (2007): a change is allowed when it is safe
//! for the prospective new follower and the politeness-weighted acceleration
//! balance exceeds a threshold.  Evaluation works purely on perceived gaps
//! and speeds, so it runs against the snapshot without touching lane
//! containers.

use mls_road::Side;

use crate::idm::CarFollowing;

/// MOBIL parameter set.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MobilParams {
    /// p — politeness factor (0 selfish, 1 altruistic).
    pub politeness: f64,
    /// Δa_th — incentive threshold (m/s²).
    pub threshold:  f64,
    /// b_safe — maximum deceleration imposed on the new follower (m/s²).
    pub b_safe:     f64,
    /// Keep-right bias added to the right candidate (m/s²).
    pub bias_right: f64,
}

impl Default for MobilParams {
    fn default() -> Self {
        Self {
            politeness: 0.5,
            threshold:  0.1,
            b_safe:     4.0,
            bias_right: 0.3,
        }
    }
}

/// A perceived neighbor: net gap to it and its speed.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeighborInfo {
    pub gap:   f64,
    pub speed: f64,
}

/// Perceived occupancy of one candidate lane.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneView {
    pub leader:   Option<NeighborInfo>,
    pub follower: Option<NeighborInfo>,
}

impl MobilParams {
    /// Decide a lane change for an ego vehicle.
    ///
    /// `current_leader`/`current_follower` describe the ego's own lane;
    /// `left`/`right` are `None` where no such lane exists.  Returns the
    /// winning direction, ties broken toward the bias (right) side.
    pub fn decide(
        &self,
        cf:               &CarFollowing,
        ego_speed:        f64,
        ego_length:       f64,
        current_leader:   Option<NeighborInfo>,
        current_follower: Option<NeighborInfo>,
        left:             Option<&LaneView>,
        right:            Option<&LaneView>,
    ) -> Option<Side> {
        let left_gain = left.map(|view| {
            self.advantage(cf, ego_speed, ego_length, current_leader, current_follower, view)
        });
        let right_gain = right.map(|view| {
            self.advantage(cf, ego_speed, ego_length, current_leader, current_follower, view)
                + self.bias_right
        });

        match (left_gain, right_gain) {
            (Some(l), Some(r)) if r >= l && r > self.threshold => Some(Side::Right),
            (Some(l), _) if l > self.threshold => Some(Side::Left),
            (_, Some(r)) if r > self.threshold => Some(Side::Right),
            _ => None,
        }
    }

    /// Politeness-weighted acceleration balance for moving into `target`,
    /// or `-∞` if the move fails the safety criterion.
    fn advantage(
        &self,
        cf:               &CarFollowing,
        ego_speed:        f64,
        ego_length:       f64,
        current_leader:   Option<NeighborInfo>,
        current_follower: Option<NeighborInfo>,
        target:           &LaneView,
    ) -> f64 {
        // ── Safety: the new follower must not brake beyond b_safe ─────────
        if let Some(f) = target.follower {
            let decel = cf.acceleration(f.speed, Some((f.gap, f.speed - ego_speed)));
            if decel < -self.b_safe {
                return f64::NEG_INFINITY;
            }
        }

        let ego_accel = |leader: Option<NeighborInfo>| {
            cf.acceleration(ego_speed, leader.map(|l| (l.gap, ego_speed - l.speed)))
        };

        // ── Ego gain ──────────────────────────────────────────────────────
        let own = ego_accel(target.leader) - ego_accel(current_leader);

        // ── New follower's loss in the target lane ────────────────────────
        let new_follower = match target.follower {
            Some(f) => {
                let before = cf.acceleration(
                    f.speed,
                    target.leader.map(|l| (f.gap + ego_length + l.gap, f.speed - l.speed)),
                );
                let after = cf.acceleration(f.speed, Some((f.gap, f.speed - ego_speed)));
                after - before
            }
            None => 0.0,
        };

        // ── Old follower's gain once the ego is gone ──────────────────────
        let old_follower = match current_follower {
            Some(f) => {
                let before = cf.acceleration(f.speed, Some((f.gap, f.speed - ego_speed)));
                let after = cf.acceleration(
                    f.speed,
                    current_leader.map(|l| (f.gap + ego_length + l.gap, f.speed - l.speed)),
                );
                after - before
            }
            None => 0.0,
        };

        own + self.politeness * (new_follower + old_follower)
    }
}
