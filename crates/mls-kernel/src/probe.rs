//! Observer hooks for metrics and visualization.
//!
//! All methods have default no-op implementations so implementors only need
//! to override what they care about.  Probes are the kernel's only
//! side-channel: agent-local failures surface here as [`SimEvent`]s rather
//! than as errors.

use mls_core::{AgentId, LaneId, LevelId, TimeStamp};

/// The three phases of a level tick.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SimPhase {
    Perception,
    Decision,
    Reaction,
}

/// Discrete occurrences reported during reactions.
#[derive(Clone, Debug)]
pub enum SimEvent {
    /// An influence addressed an agent no longer in the level; the
    /// influence was discarded.
    OrphanTarget { agent: AgentId, level: LevelId, category: String },

    /// A position update left a bounded topology and was clamped back.
    TopologyClamped { agent: AgentId, level: LevelId },

    /// An agent became part of a level (observable next snapshot).
    AgentAdded { agent: AgentId, level: LevelId },

    /// An agent left a level.
    AgentRemoved { agent: AgentId, level: LevelId },

    /// A vehicle moved between lanes.
    LaneChanged { agent: AgentId, from: LaneId, to: LaneId },

    /// A leftover influence could not be re-queued and was dropped.
    InfluenceDropped { level: LevelId, category: String },
}

/// Callbacks invoked by the [`Scheduler`][crate::Scheduler] at phase
/// boundaries and whenever a reaction reports an event.
///
/// # Example — event counter
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct EventCounter { orphans: usize }
///
/// impl Probe for EventCounter {
///     fn on_event(&mut self, event: &SimEvent) {
///         if matches!(event, SimEvent::OrphanTarget { .. }) {
///             self.orphans += 1;
///         }
///     }
/// }
/// ```
pub trait Probe: Send {
    /// Called before a phase starts for a level, with the level's current
    /// time.
    fn on_phase_begin(&mut self, _phase: SimPhase, _level: LevelId, _t: TimeStamp) {}

    /// Called after a phase completes for a level.
    fn on_phase_end(&mut self, _phase: SimPhase, _level: LevelId, _t: TimeStamp) {}

    /// Called once at the end of every global step with the new scheduler
    /// time.
    fn on_step(&mut self, _t: TimeStamp) {}

    /// Called for every discrete [`SimEvent`].
    fn on_event(&mut self, _event: &SimEvent) {}
}

/// A [`Probe`] that does nothing.
pub struct NoopProbe;

impl Probe for NoopProbe {}
