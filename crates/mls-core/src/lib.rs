//! `mls-core` — foundational types for the `rust_mls` multi-level simulation
//! framework.
//!
//! This crate is a dependency of every other `mls-*` crate.  It intentionally
//! has no `mls-*` dependencies and minimal external ones (only `rand`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                  |
//! |-----------|-----------------------------------------------------------|
//! | [`ids`]   | `AgentId`, `LevelId`, `RoadId`, `LaneId`, `VehicleId`, …  |
//! | [`point`] | `Point2D`, planar distance                                |
//! | [`time`]  | `TimeStamp`, `Period`, `SimClock`                         |
//! | [`math`]  | Angle normalization, small numeric helpers                |
//! | [`rng`]   | `SimRng` — seeded, deterministic scenario randomness      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                      |
//! |---------|-------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public plain types.   |

pub mod ids;
pub mod math;
pub mod point;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::{AgentId, LaneId, LevelId, MarkId, PheromoneId, RoadId, VehicleId};
pub use point::Point2D;
pub use rng::SimRng;
pub use time::{Period, SimClock, TimeStamp};
