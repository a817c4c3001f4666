//! The reaction contract — how a level turns influences into state.

use mls_core::{LevelId, Period};

use crate::environment::Environment;
use crate::error::KernelResult;
use crate::influence::Influence;
use crate::probe::Probe;
use crate::store::{PublicSnapshot, StateStore};

/// Everything a reactor sees besides the store: the tick bounds, the
/// consistent pre-tick snapshot, the level environment, and the probe for
/// event reporting.
pub struct ReactionCtx<'a> {
    pub level:   LevelId,
    pub period:  Period,
    /// Physical duration of the tick, for kinematics and flow integration.
    pub dt_secs: f64,
    /// Public states as they were when the reaction began.  System-influence
    /// effects from this very tick are not in here — they become observable
    /// on the next snapshot.
    pub snapshot: &'a PublicSnapshot,
    pub env:      Option<&'a mut dyn Environment>,
    pub probe:    &'a mut dyn Probe,
}

/// Turns one tick's influence batch into state mutations for one level.
///
/// The scheduler has already applied structural system influences (agent
/// add/remove, level membership) when `react` runs; `natural` holds the
/// natural-tick triggers (`AgentPositionUpdate`, `PheromoneFieldUpdate`) in
/// insertion order and `regular` the regular batch in insertion order.
///
/// A reactor must:
/// 1. apply the regular influences under its per-category conflict policy,
/// 2. advance state over `[t_lo, t_hi)` when the position-update trigger is
///    present,
/// 3. enforce its physical invariants (non-negative speed, topology,
///    ordering),
/// 4. return only influences it cannot consume — those addressed to another
///    level, or re-emissions with later bounds.  Everything else counts as
///    consumed.
///
/// Orphan targets are not errors: report [`SimEvent::OrphanTarget`]
/// [crate::SimEvent::OrphanTarget] and drop the influence.  A returned
/// error rolls the level's public states back to `ctx.snapshot` and aborts
/// the step.
pub trait Reactor: Send {
    fn react(
        &mut self,
        ctx:     &mut ReactionCtx<'_>,
        store:   &mut StateStore,
        natural: &[Influence],
        regular: Vec<Influence>,
    ) -> KernelResult<Vec<Influence>>;
}
