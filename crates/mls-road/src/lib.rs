//! `mls-road` — the road, lane, and vehicle model.
//!
//! # Design
//!
//! Everything is an arena with stable ids: the network owns `Vec<Road>` and
//! `Vec<Lane>`, vehicles live in a slot arena, and lanes hold their vehicles
//! as a `Vec<VehicleId>` sorted by longitudinal position.  No shared
//! ownership, no cycles — a vehicle knows its lane by id, a lane knows its
//! vehicles by id.
//!
//! Lane geometry is a straight segment: `position_at(s)` and `heading_at(s)`
//! linearly parameterize it.  What happens past the end of a lane is the
//! lane's `EndBehavior` — `Wrap` (ring road, the default for test tracks) or
//! `Clamp` (bounded, clamping emits a topology event upstream).
//!
//! # Crate layout
//!
//! | Module      | Contents                                      |
//! |-------------|-----------------------------------------------|
//! | [`network`] | `RoadNetwork`, `Road`, `Lane`, builder        |
//! | [`vehicle`] | `Vehicle` record and the slot arena           |
//! | [`error`]   | `RoadError`, `RoadResult<T>`                  |

pub mod error;
pub mod network;
pub mod vehicle;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{RoadError, RoadResult};
pub use network::{EndBehavior, Lane, LaneGeometry, Road, RoadNetwork, RoadNetworkBuilder, Side};
pub use vehicle::{Vehicle, VehicleArena};
