//! Type-erased agent state.
//!
//! # Design
//!
//! The kernel never interprets agent state — it only clones it (snapshots,
//! level transitions) and hands it to the instantiation's perception,
//! decision, and reaction code, which downcast to their concrete types.
//!
//! A blanket impl makes every `Clone + Send + Sync + 'static` type a
//! [`LocalState`], so instantiations define plain structs and never touch
//! this machinery directly.

use std::any::Any;

use mls_core::Period;

// ── LocalState ────────────────────────────────────────────────────────────────

/// A public or private local state of an agent in one level.
///
/// Deep-cloneable (snapshots, transitions) and downcastable.  Implemented
/// automatically for every `Clone + Send + Sync + 'static` type.
pub trait LocalState: Any + Send + Sync {
    fn clone_box(&self) -> Box<dyn LocalState>;

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + Send + Sync + 'static> LocalState for T {
    fn clone_box(&self) -> Box<dyn LocalState> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn LocalState> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl dyn LocalState + '_ {
    /// Downcast to a concrete state type.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutable downcast to a concrete state type.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

// ── PerceivedData ─────────────────────────────────────────────────────────────

/// The frozen snapshot an agent's perception produces and its decision
/// consumes within the same level tick.
///
/// Carries the perception period so a stale perception is detectable.
/// Discarded after the decision phase.
pub trait PerceivedData: Send + Sync {
    /// The `[t_lo, t_hi)` interval this data was perceived for.
    fn period(&self) -> Period;

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;
}

impl dyn PerceivedData + '_ {
    /// Downcast to a concrete perceived-data type.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Perceived data for agents whose decisions need no senses.
pub struct EmptyPerceivedData(pub Period);

impl PerceivedData for EmptyPerceivedData {
    fn period(&self) -> Period {
        self.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
