//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically nondecreasing `TimeStamp` tick counter.  Levels
//! execute over half-open tick intervals `[lo, hi)` represented by `Period`.
//! The mapping to physical seconds lives in `SimClock`:
//!
//!   seconds = tick * seconds_per_tick
//!
//! Using an integer tick as the canonical time unit means all multi-rate
//! arithmetic (level `dt`s, update frequencies) is exact, and only the
//! kinematics and flow integrators ever see floating-point durations.

use std::fmt;

// ── TimeStamp ─────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
///
/// Stored as `u64` to avoid overflow: at 10 ticks per simulated second a u64
/// lasts ~58 billion years of simulated time.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeStamp(pub u64);

impl TimeStamp {
    pub const ZERO: TimeStamp = TimeStamp(0);

    /// The tick `dt` steps after `self` — the end of a level tick that starts
    /// here and advances by `dt`.
    #[inline]
    pub fn next(self, dt: u64) -> TimeStamp {
        TimeStamp(self.0 + dt)
    }

    /// Ticks elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: TimeStamp) -> u64 {
        self.0 - earlier.0
    }
}

impl std::ops::Add<u64> for TimeStamp {
    type Output = TimeStamp;
    #[inline]
    fn add(self, rhs: u64) -> TimeStamp {
        TimeStamp(self.0 + rhs)
    }
}

impl std::ops::Sub for TimeStamp {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: TimeStamp) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── Period ────────────────────────────────────────────────────────────────────

/// A half-open tick interval `[lo, hi)` — one level tick.
///
/// Perception, decision, and reaction all receive the period of the level
/// tick they run in; perceived data carries it so stale perceptions are
/// detectable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Period {
    pub lo: TimeStamp,
    pub hi: TimeStamp,
}

impl Period {
    /// Build `[lo, lo + dt)`.
    #[inline]
    pub fn new(lo: TimeStamp, dt: u64) -> Self {
        Self { lo, hi: lo.next(dt) }
    }

    /// Length of the interval in ticks.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.hi - self.lo
    }

    /// `true` if `t` falls inside `[lo, hi)`.
    #[inline]
    pub fn contains(self, t: TimeStamp) -> bool {
        self.lo <= t && t < self.hi
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between tick counts and physical seconds.
///
/// `SimClock` is cheap to copy and intentionally holds no heap data.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// How many physical seconds one tick represents.  Default: 0.1.
    pub seconds_per_tick: f64,
}

impl SimClock {
    pub fn new(seconds_per_tick: f64) -> Self {
        Self { seconds_per_tick }
    }

    /// Physical duration of a level tick — the `Δt` fed to kinematics and
    /// flow integrators.
    #[inline]
    pub fn dt_secs(&self, period: Period) -> f64 {
        period.ticks() as f64 * self.seconds_per_tick
    }

    /// Physical seconds elapsed at `t` since tick 0.
    #[inline]
    pub fn secs_at(&self, t: TimeStamp) -> f64 {
        t.0 as f64 * self.seconds_per_tick
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self { seconds_per_tick: 0.1 }
    }
}
