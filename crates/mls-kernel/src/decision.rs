//! Decision models and the influence buffer they emit into.
//!
//! Decisions are pure with respect to the store: they read the agent's own
//! states and perceived data, and their only effect is the influences they
//! push into an [`InfluenceBuffer`].  Buffers are per-agent (thread-local in
//! the parallel phase) and flushed to the bus in ascending `AgentId` order,
//! which keeps results independent of worker scheduling.

use mls_core::{AgentId, LevelId, Period};

use crate::influence::{Influence, Payload};
use crate::state::{LocalState, PerceivedData};

// ── InfluenceBuffer ───────────────────────────────────────────────────────────

/// Collects the influences one agent's decision produces during one tick.
pub struct InfluenceBuffer {
    level:  LevelId,
    period: Period,
    items:  Vec<Influence>,
}

impl InfluenceBuffer {
    pub fn new(level: LevelId, period: Period) -> Self {
        Self { level, period, items: Vec::new() }
    }

    /// The level this buffer's decision runs in (the default target).
    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Emit a payload to the decision's own level.
    pub fn emit(&mut self, payload: Payload) {
        self.items.push(Influence::new(self.level, self.period, payload));
    }

    /// Emit a payload to another level (e.g. the two halves of a
    /// transition).
    pub fn emit_to(&mut self, level: LevelId, payload: Payload) {
        self.items.push(Influence::new(level, self.period, payload));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn into_items(self) -> Vec<Influence> {
        self.items
    }
}

// ── DecisionModel ─────────────────────────────────────────────────────────────

/// An agent's decision for one level tick.
///
/// Called after perception with the cached [`PerceivedData`]; must not
/// mutate any state.  Usually implemented by wrapping a [`Dms`][crate::Dms]
/// tree in [`DmsDecision`], but anything emitting influences qualifies.
pub trait DecisionModel: Send + Sync {
    fn decide(
        &self,
        period:    Period,
        agent:     AgentId,
        public:    &dyn LocalState,
        private:   &dyn LocalState,
        perceived: &dyn PerceivedData,
        out:       &mut InfluenceBuffer,
    );
}

// ── Decision sub-models ───────────────────────────────────────────────────────

/// Whether a sub-model took responsibility for the situation.
///
/// Subsumption stops at the first `Handled`; conjunction ORs the outcomes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Outcome {
    Handled,
    Passed,
}

/// The smallest unit of composable behavior — a leaf or inner node of a
/// [`Dms`][crate::Dms] tree.
pub trait DecisionSubmodel: Send + Sync {
    fn manage(
        &self,
        period:    Period,
        agent:     AgentId,
        public:    &dyn LocalState,
        private:   &dyn LocalState,
        perceived: &dyn PerceivedData,
        out:       &mut InfluenceBuffer,
    ) -> Outcome;
}

/// Adapts a [`DecisionSubmodel`] tree into a [`DecisionModel`], discarding
/// the root outcome (an unhandled root simply emits nothing).
pub struct DmsDecision<S>(pub S);

impl<S: DecisionSubmodel> DecisionModel for DmsDecision<S> {
    fn decide(
        &self,
        period:    Period,
        agent:     AgentId,
        public:    &dyn LocalState,
        private:   &dyn LocalState,
        perceived: &dyn PerceivedData,
        out:       &mut InfluenceBuffer,
    ) {
        let _ = self.0.manage(period, agent, public, private, perceived, out);
    }
}
