//! Type-erased per-level environment.
//!
//! The kernel treats environments as opaque: it stores one per level, hands
//! it read-only to perception and mutably to the reaction.  Instantiations
//! downcast to their concrete type (a road network, a Logo grid, …).

use std::any::Any;

/// Marker trait for a level's environment object.
pub trait Environment: Send + Sync {
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Environment + '_ {
    /// Downcast to a concrete environment type.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutable downcast to a concrete environment type.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}
