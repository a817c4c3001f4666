//! Level configuration and the scheduler-owned registry.
//!
//! Level identity is a name (an opaque tag like `"microscopic"`); the
//! registry assigns each registered name a dense [`LevelId`] in
//! registration order.  There are no process-wide level singletons — all
//! lookups go through the owning scheduler.

use std::sync::Arc;

use mls_core::{LevelId, TimeStamp};

use crate::decision::DecisionModel;
use crate::perception::PerceptionModel;

/// Static configuration of one level.
#[derive(Clone, Debug)]
pub struct LevelConfig {
    /// Opaque identifying tag (`"microscopic"`, `"logo"`, …).  Must be
    /// unique within a scheduler.
    pub name: String,

    /// Ticks this level's clock advances per execution.  May exceed the
    /// global minimum; the scheduler advances by the minimum active dt.
    pub dt: u64,

    /// The level executes on global steps where
    /// `step_count % update_frequency == 0`.
    pub update_frequency: u64,
}

impl LevelConfig {
    /// A level ticking every step with a 1-tick dt.
    pub fn every_step(name: impl Into<String>) -> Self {
        Self { name: name.into(), dt: 1, update_frequency: 1 }
    }

    pub fn new(name: impl Into<String>, dt: u64, update_frequency: u64) -> Self {
        Self { name: name.into(), dt, update_frequency }
    }
}

/// Runtime record of a registered level.
pub(crate) struct Level {
    pub(crate) id:               LevelId,
    pub(crate) name:             String,
    pub(crate) dt:               u64,
    pub(crate) update_frequency: u64,
    pub(crate) current_time:     TimeStamp,

    /// Default models for agents that did not bring their own.
    pub(crate) perception: Option<Arc<dyn PerceptionModel>>,
    pub(crate) decision:   Option<Arc<dyn DecisionModel>>,
}

impl Level {
    pub(crate) fn new(id: LevelId, config: LevelConfig) -> Self {
        Self {
            id,
            name:             config.name,
            dt:               config.dt.max(1),
            update_frequency: config.update_frequency.max(1),
            current_time:     TimeStamp::ZERO,
            perception:       None,
            decision:         None,
        }
    }

    /// `true` on global steps this level executes.
    #[inline]
    pub(crate) fn is_active(&self, step_count: u64) -> bool {
        step_count % self.update_frequency == 0
    }
}
