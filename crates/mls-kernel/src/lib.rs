//! `mls-kernel` — the multi-level simulation kernel.
//!
//! # The influence cycle
//!
//! ```text
//! for each global step:
//!   ① Perception — for every active level, snapshot its public states and
//!                  let every agent build a PerceivedData from it.
//!   ② Decision   — every agent consults its decision model (a DMS tree)
//!                  with its private state and perceived data; decisions
//!                  emit Influences into the bus, never mutating state.
//!   ③ Reaction   — per level: structural system influences first, then the
//!                  level's reactor consumes the regular batch and advances
//!                  state over [t_lo, t_hi).
//!   ④ Advance    — active levels advance by their dt; scheduler time
//!                  advances by the minimum active dt.
//! ```
//!
//! Levels tick at heterogeneous rates (`update_frequency`); slower levels
//! observe faster ones through the next snapshot.
//!
//! # Crate layout
//!
//! | Module          | Contents                                             |
//! |-----------------|------------------------------------------------------|
//! | [`state`]       | `LocalState`, `PerceivedData` type-erased traits     |
//! | [`influence`]   | `Influence`, `Payload`, `AgentSpec`, `Mark`          |
//! | [`bus`]         | Level-keyed system/regular influence queues          |
//! | [`store`]       | `(agent, level) → (public, private)` state store     |
//! | [`category`]    | `AgentCategory` with transitive `is_a`               |
//! | [`perception`]  | `PerceptionModel` trait                              |
//! | [`decision`]    | `DecisionModel`, `InfluenceBuffer`                   |
//! | [`dms`]         | `Dms` composition tree (conjunction / subsumption)   |
//! | [`reactor`]     | `Reactor` trait and `ReactionCtx`                    |
//! | [`environment`] | Type-erased per-level environment                    |
//! | [`probe`]       | `Probe` observer trait, `SimEvent`                   |
//! | [`level`]       | `LevelConfig` and the scheduler-owned registry       |
//! | [`scheduler`]   | `Scheduler` — owns levels, bus, store, and the loop  |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | Perception/decision fan out per agent via Rayon.          |
//! | `serde`    | Serde derives on plain-data public types.                 |

pub mod bus;
pub mod category;
pub mod decision;
pub mod dms;
pub mod environment;
pub mod error;
pub mod influence;
pub mod level;
pub mod perception;
pub mod probe;
pub mod reactor;
pub mod scheduler;
pub mod state;
pub mod store;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use bus::InfluenceBus;
pub use category::AgentCategory;
pub use decision::{DecisionModel, DecisionSubmodel, DmsDecision, InfluenceBuffer, Outcome};
pub use dms::Dms;
pub use environment::Environment;
pub use error::{KernelError, KernelResult};
pub use influence::{AgentLevelSpec, AgentSpec, Influence, LaneChange, Mark, Payload, UserInfluence};
pub use level::LevelConfig;
pub use perception::PerceptionModel;
pub use probe::{NoopProbe, Probe, SimEvent, SimPhase};
pub use reactor::{ReactionCtx, Reactor};
pub use scheduler::Scheduler;
pub use state::{LocalState, PerceivedData};
pub use store::{PublicSnapshot, StateStore};
