//! `mls-logo` — the Logo/turtle instantiation.
//!
//! Turtles are kernel agents on the `"logo"` level, moving over a patch
//! grid that carries pheromone fields (with per-pheromone diffusion and
//! evaporation) and discrete marks.  The Logo reactor implements the full
//! built-in influence policy table: additive speed and direction deltas,
//! overriding stops, additive pheromone deposits, and set-semantics marks.
//!
//! # Crate layout
//!
//! | Module         | Contents                                          |
//! |----------------|---------------------------------------------------|
//! | [`env`]        | `LogoEnv` grid, `Pheromone` definitions, marks    |
//! | [`state`]      | `TurtlePublic` local state                        |
//! | [`perception`] | `LogoPerception`, `TurtlePerceived`               |
//! | [`reaction`]   | `LogoReactor`                                     |

pub mod env;
pub mod error;
pub mod perception;
pub mod reaction;
pub mod state;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use env::{LogoEnv, Pheromone};
pub use error::{LogoError, LogoResult};
pub use perception::{LogoPerception, PerceivedTurtle, TurtlePerceived};
pub use reaction::LogoReactor;
pub use state::TurtlePublic;

/// Conventional name of the Logo level.
pub const LOGO_LEVEL: &str = "logo";
