//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  The inner integer is `pub` to allow
//! direct indexing into arena `Vec`s via `id.0 as usize`, but callers should
//! prefer the `.index()` helpers for clarity.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID" — the inner type's `MAX`.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Identity of a simulated agent, stable for the agent's whole lifetime.
    pub struct AgentId(u32);
}

typed_id! {
    /// Dense index of a registered simulation level.
    ///
    /// Assigned by the scheduler's level registry in registration order, so
    /// iterating levels by ascending `LevelId` is deterministic.
    pub struct LevelId(u16);
}

typed_id! {
    /// Index of a road in the road-network arena.
    pub struct RoadId(u32);
}

typed_id! {
    /// Index of a lane in the road-network arena.
    pub struct LaneId(u32);
}

typed_id! {
    /// Slot of a vehicle in the vehicle arena.
    pub struct VehicleId(u32);
}

typed_id! {
    /// Index of a pheromone kind in the Logo environment's registry.
    /// Using `u16` keeps field headers compact (max 65,535 pheromone kinds).
    pub struct PheromoneId(u16);
}

typed_id! {
    /// Identity of a mark dropped in the Logo environment.  Marks compare by
    /// this ID (set semantics), not by location or content.
    pub struct MarkId(u64);
}
