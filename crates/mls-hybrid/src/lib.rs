//! `mls-hybrid` — the adaptive micro/macro hybridizer.
//!
//! Each registered lane is simulated either microscopically (individual
//! vehicles in the arena, IDM car-following) or macroscopically (an LWR
//! density grid).  A per-lane controller promotes congested or expensive
//! lanes to the continuum model and demotes them back when traffic thins,
//! with hysteresis and a stability window preventing oscillation.
//! Conversions preserve vehicle count up to per-cell rounding.
//!
//! # Crate layout
//!
//! | Module       | Contents                                           |
//! |--------------|----------------------------------------------------|
//! | [`config`]   | `HybridConfig` thresholds and pinning policy       |
//! | [`state`]    | `LaneMode`, `LaneState`, `Statistics`              |
//! | [`adaptive`] | `AdaptiveSimulator`                                |

pub mod adaptive;
pub mod config;
pub mod error;
pub mod state;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use adaptive::AdaptiveSimulator;
pub use config::HybridConfig;
pub use error::{HybridError, HybridResult};
pub use state::{LaneMode, LaneState, Statistics, StoredVehicle};
