//! The influence bus — typed, level-keyed queues crossing the decision →
//! reaction boundary.
//!
//! Insertion order is preserved within a level; system influences are kept
//! in their own queue so a reaction drains them first without sorting.

use mls_core::LevelId;

use crate::error::{KernelError, KernelResult};
use crate::influence::Influence;

#[derive(Default)]
struct LevelBag {
    system:  Vec<Influence>,
    regular: Vec<Influence>,
}

/// One bag of influences per registered level.
///
/// The scheduler registers levels (growing the queue vector) and is the only
/// drainer; decision buffers and out-of-band injection are the producers.
#[derive(Default)]
pub struct InfluenceBus {
    bags: Vec<LevelBag>,
}

impl InfluenceBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queue for a newly registered level.  Level ids are dense, so
    /// the bag index is the id.
    pub(crate) fn register_level(&mut self) {
        self.bags.push(LevelBag::default());
    }

    fn bag_mut(&mut self, level: LevelId) -> KernelResult<&mut LevelBag> {
        self.bags
            .get_mut(level.index())
            .ok_or(KernelError::UnknownLevel(level))
    }

    /// Push an influence into its target level's bag.  O(1) amortized.
    ///
    /// Emitting to an unregistered level is an error.
    pub fn emit(&mut self, influence: Influence) -> KernelResult<()> {
        let system = influence.is_system();
        let bag = self.bag_mut(influence.target_level)?;
        if system {
            bag.system.push(influence);
        } else {
            bag.regular.push(influence);
        }
        Ok(())
    }

    /// Remove and return everything queued for `level`, partitioned into
    /// `(system, regular)`, each in insertion order.
    ///
    /// The drainer must consume the whole batch; unconsumed influences may
    /// be re-emitted with the same or later bounds.
    pub fn drain(&mut self, level: LevelId) -> KernelResult<(Vec<Influence>, Vec<Influence>)> {
        let bag = self.bag_mut(level)?;
        Ok((std::mem::take(&mut bag.system), std::mem::take(&mut bag.regular)))
    }

    /// `true` if nothing is queued for `level`.
    pub fn is_empty(&self, level: LevelId) -> bool {
        match self.bags.get(level.index()) {
            Some(bag) => bag.system.is_empty() && bag.regular.is_empty(),
            None      => true,
        }
    }

    /// Total queued influences across all levels (diagnostics).
    pub fn len(&self) -> usize {
        self.bags.iter().map(|b| b.system.len() + b.regular.len()).sum()
    }

    pub fn is_fully_empty(&self) -> bool {
        self.len() == 0
    }
}
