//! Influences — time-bounded, categorized requests addressed to a level.
//!
//! Decisions never mutate state; they emit influences, and the targeted
//! level's reactor turns the batch into state mutations under the per-
//! category conflict policies.  Built-in payloads are enum variants so the
//! reaction hot loop dispatches with a `match`; user extensions go through
//! the [`UserInfluence`] seam.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use mls_core::{AgentId, LevelId, MarkId, Period, PheromoneId, Point2D};

use crate::category::AgentCategory;
use crate::decision::DecisionModel;
use crate::perception::PerceptionModel;
use crate::state::LocalState;

// ── Supporting types ──────────────────────────────────────────────────────────

/// Direction of a requested lane change, relative to driving direction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneChange {
    Left,
    Right,
}

/// A mark dropped on the Logo grid.  Identity (and set semantics in the
/// reaction) is the `id`; category and location are payload.
#[derive(Clone, Debug)]
pub struct Mark {
    pub id:       MarkId,
    pub category: String,
    pub location: Point2D,
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Mark {}

/// Extension seam for instantiation-specific influences.
///
/// Custom influences are always regular (never system) and reach the
/// reactor in the regular batch; a reactor that does not recognize one
/// returns it as a leftover.
pub trait UserInfluence: Send + Sync {
    /// Category tag used in events and diagnostics.
    fn category(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

// ── Agent construction bundles ────────────────────────────────────────────────

/// Everything an agent brings to one level: its two states and, optionally,
/// explicit models (falling back to the level's defaults when `None`).
pub struct AgentLevelSpec {
    pub public:     Box<dyn LocalState>,
    pub private:    Box<dyn LocalState>,
    pub perception: Option<Arc<dyn PerceptionModel>>,
    pub decision:   Option<Arc<dyn DecisionModel>>,
}

impl AgentLevelSpec {
    /// States only; perception and decision fall back to the level defaults.
    pub fn new(public: Box<dyn LocalState>, private: Box<dyn LocalState>) -> Self {
        Self { public, private, perception: None, decision: None }
    }

    pub fn with_models(
        mut self,
        perception: Arc<dyn PerceptionModel>,
        decision:   Arc<dyn DecisionModel>,
    ) -> Self {
        self.perception = Some(perception);
        self.decision = Some(decision);
        self
    }
}

/// A complete agent to be inserted via `Scheduler::add_agent`: one
/// [`AgentLevelSpec`] per level it participates in.
pub struct AgentSpec {
    pub category: Arc<AgentCategory>,
    pub levels:   Vec<(LevelId, AgentLevelSpec)>,
}

impl AgentSpec {
    pub fn new(category: Arc<AgentCategory>) -> Self {
        Self { category, levels: Vec::new() }
    }

    pub fn in_level(mut self, level: LevelId, spec: AgentLevelSpec) -> Self {
        self.levels.push((level, spec));
        self
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// The request carried by an [`Influence`].
///
/// System payloads (agent lifecycle, natural ticks) drain before regular
/// ones within a reaction.  The conflict policy per category is fixed by the
/// consuming reactor: last-write-wins for acceleration, additive for speed/
/// direction/position deltas and pheromone emission, set semantics for marks
/// with removal winning over a drop in the same batch.
pub enum Payload {
    // ── Regular: kinematics ───────────────────────────────────────────────
    /// Command an acceleration.  Last write wins per target.
    ChangeAcceleration { target: AgentId, da: f64 },
    /// Add `ds` to the target's speed.  Deltas sum; negative results clamp
    /// to zero in the reaction.
    ChangeSpeed { target: AgentId, ds: f64 },
    /// Turn by `dd` radians.  Additive modulo 2π.
    ChangeDirection { target: AgentId, dd: f64 },
    /// Displace by `(dx, dy)`, then topology-normalize.
    ChangePosition { target: AgentId, dx: f64, dy: f64 },
    /// Set speed to zero, overriding any `ChangeSpeed` in the same batch.
    Stop { target: AgentId },
    /// Move the target one lane left or right.
    ChangeLane { target: AgentId, direction: LaneChange },

    // ── Regular: environment ──────────────────────────────────────────────
    /// Deposit `amount` of a pheromone at the cell containing `location`.
    EmitPheromone {
        pheromone: PheromoneId,
        location:  Point2D,
        amount:    f64,
    },
    /// Drop a mark on the grid cell containing its location.
    DropMark { mark: Mark },
    /// Remove a mark by identity.  Wins over a `DropMark` of the same mark
    /// in the same batch.
    RemoveMark { mark: MarkId },
    /// Remove several marks by identity.
    RemoveMarks { marks: Vec<MarkId> },

    // ── System: agent lifecycle ───────────────────────────────────────────
    /// Insert a new agent into the target level.  Emitted once per level the
    /// agent participates in; observable from the next snapshot.
    AddAgent {
        agent:    AgentId,
        category: Arc<AgentCategory>,
        spec:     AgentLevelSpec,
    },
    /// Remove an agent from the target level (and from the simulation once
    /// its last level is gone).  Idempotent: removing an absent agent is a
    /// no-op.
    RemoveAgent { agent: AgentId },
    /// Make an existing agent participate in the target level with the
    /// given (usually cloned) states.  Half of a level transition.
    AddAgentToLevel {
        agent:   AgentId,
        public:  Box<dyn LocalState>,
        private: Box<dyn LocalState>,
    },
    /// Withdraw an agent from the target level only.  The other half of a
    /// level transition.
    RemoveAgentFromLevel { agent: AgentId },

    // ── System: natural ticks ─────────────────────────────────────────────
    /// Natural trigger: integrate kinematics for every agent of the level.
    AgentPositionUpdate,
    /// Natural trigger: run pheromone field dynamics for the level.
    PheromoneFieldUpdate,

    // ── Extension seam ────────────────────────────────────────────────────
    Custom(Box<dyn UserInfluence>),
}

impl Payload {
    /// System influences drain before regular ones in a reaction.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            Payload::AddAgent { .. }
                | Payload::RemoveAgent { .. }
                | Payload::AddAgentToLevel { .. }
                | Payload::RemoveAgentFromLevel { .. }
                | Payload::AgentPositionUpdate
                | Payload::PheromoneFieldUpdate
        )
    }

    /// Natural-tick triggers are system influences handed to the reactor
    /// rather than applied structurally by the scheduler.
    pub fn is_natural(&self) -> bool {
        matches!(self, Payload::AgentPositionUpdate | Payload::PheromoneFieldUpdate)
    }

    /// Category tag for events and diagnostics.
    pub fn category(&self) -> &str {
        match self {
            Payload::ChangeAcceleration { .. } => "change-acceleration",
            Payload::ChangeSpeed { .. } => "change-speed",
            Payload::ChangeDirection { .. } => "change-direction",
            Payload::ChangePosition { .. } => "change-position",
            Payload::Stop { .. } => "stop",
            Payload::ChangeLane { .. } => "change-lane",
            Payload::EmitPheromone { .. } => "emit-pheromone",
            Payload::DropMark { .. } => "drop-mark",
            Payload::RemoveMark { .. } => "remove-mark",
            Payload::RemoveMarks { .. } => "remove-marks",
            Payload::AddAgent { .. } => "add-agent",
            Payload::RemoveAgent { .. } => "remove-agent",
            Payload::AddAgentToLevel { .. } => "add-agent-to-level",
            Payload::RemoveAgentFromLevel { .. } => "remove-agent-from-level",
            Payload::AgentPositionUpdate => "agent-position-update",
            Payload::PheromoneFieldUpdate => "pheromone-field-update",
            Payload::Custom(user) => user.category(),
        }
    }

    /// The agent this payload addresses, if any.
    pub fn target(&self) -> Option<AgentId> {
        match self {
            Payload::ChangeAcceleration { target, .. }
            | Payload::ChangeSpeed { target, .. }
            | Payload::ChangeDirection { target, .. }
            | Payload::ChangePosition { target, .. }
            | Payload::Stop { target }
            | Payload::ChangeLane { target, .. } => Some(*target),
            Payload::AddAgent { agent, .. }
            | Payload::RemoveAgent { agent }
            | Payload::AddAgentToLevel { agent, .. }
            | Payload::RemoveAgentFromLevel { agent } => Some(*agent),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("category", &self.category())
            .finish_non_exhaustive()
    }
}

// ── Influence ─────────────────────────────────────────────────────────────────

/// A payload addressed to a level, bounded to the tick `[lo, hi)` it was
/// decided in.  Only the target level's reactor consumes it.
#[derive(Debug)]
pub struct Influence {
    pub target_level: LevelId,
    pub period:       Period,
    pub payload:      Payload,
}

impl Influence {
    pub fn new(target_level: LevelId, period: Period, payload: Payload) -> Self {
        Self { target_level, period, payload }
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.payload.is_system()
    }
}
