//! The agent state store — single source of truth for `(agent, level)`
//! public/private states and the per-tick perceived-data cache.
//!
//! # Borrow discipline
//!
//! The store is read-only during perception and decision (shared borrows,
//! possibly across Rayon workers) and write-exclusive during reaction.  The
//! scheduler enforces this by phase ordering; nothing here is internally
//! synchronized.

use std::collections::BTreeMap;
use std::sync::Arc;

use mls_core::{AgentId, LevelId};
use rustc_hash::FxHashMap;

use crate::category::AgentCategory;
use crate::error::{KernelError, KernelResult};
use crate::state::{LocalState, PerceivedData};

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// One agent's entry in a [`PublicSnapshot`].
pub struct SnapshotEntry {
    pub category: Arc<AgentCategory>,
    pub state:    Box<dyn LocalState>,
}

/// The consistent public view of one level, cloned at a phase boundary.
///
/// Entries are in a `BTreeMap` so iteration is in ascending `AgentId` order
/// — the ordering every deterministic guarantee in the kernel leans on.
pub struct PublicSnapshot {
    level:   LevelId,
    entries: BTreeMap<AgentId, SnapshotEntry>,
}

impl PublicSnapshot {
    pub fn level(&self) -> LevelId {
        self.level
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The snapshotted public state of `agent`, if it was in the level.
    pub fn get(&self, agent: AgentId) -> Option<&dyn LocalState> {
        self.entries.get(&agent).map(|e| &*e.state)
    }

    pub fn category(&self, agent: AgentId) -> Option<&Arc<AgentCategory>> {
        self.entries.get(&agent).map(|e| &e.category)
    }

    /// Iterate entries in ascending `AgentId` order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &SnapshotEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Agent ids in ascending order.
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.entries.keys().copied()
    }
}

// ── Store internals ───────────────────────────────────────────────────────────

struct LevelStates {
    public:  Box<dyn LocalState>,
    private: Box<dyn LocalState>,
}

struct AgentEntry {
    category:  Arc<AgentCategory>,
    levels:    FxHashMap<LevelId, LevelStates>,
    perceived: FxHashMap<LevelId, Box<dyn PerceivedData>>,
}

// ── StateStore ────────────────────────────────────────────────────────────────

/// Maps `(agent, level) → (public, private)` plus the perceived-data cache.
///
/// Invariant: every `(agent, level)` entry holds both a public and a private
/// state — `include` takes them together and nothing can remove only one.
pub struct StateStore {
    agents:           FxHashMap<AgentId, AgentEntry>,
    default_category: Arc<AgentCategory>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            agents:           FxHashMap::default(),
            default_category: AgentCategory::new("agent"),
        }
    }

    // ── Membership ────────────────────────────────────────────────────────

    /// Register `agent` with its category, without any level membership yet.
    /// No-op if the agent already exists (the category is not rewritten).
    pub fn insert_agent(&mut self, agent: AgentId, category: Arc<AgentCategory>) {
        self.agents.entry(agent).or_insert_with(|| AgentEntry {
            category,
            levels:    FxHashMap::default(),
            perceived: FxHashMap::default(),
        });
    }

    /// Give `agent` a presence in `level` with the two states.
    ///
    /// Idempotent: if the agent already participates in the level, the call
    /// is a no-op and the existing states are kept.  An unknown agent is
    /// created with the default category.
    pub fn include(
        &mut self,
        agent:   AgentId,
        level:   LevelId,
        public:  Box<dyn LocalState>,
        private: Box<dyn LocalState>,
    ) {
        let default_category = Arc::clone(&self.default_category);
        let entry = self.agents.entry(agent).or_insert_with(|| AgentEntry {
            category:  default_category,
            levels:    FxHashMap::default(),
            perceived: FxHashMap::default(),
        });
        entry
            .levels
            .entry(level)
            .or_insert(LevelStates { public, private });
    }

    /// Withdraw `agent` from `level`.  Returns `true` if it was present.
    /// The agent entry itself is dropped once its last level is gone.
    pub fn exclude(&mut self, agent: AgentId, level: LevelId) -> bool {
        let Some(entry) = self.agents.get_mut(&agent) else {
            return false;
        };
        let removed = entry.levels.remove(&level).is_some();
        entry.perceived.remove(&level);
        if entry.levels.is_empty() {
            self.agents.remove(&agent);
        }
        removed
    }

    pub fn contains(&self, agent: AgentId, level: LevelId) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|e| e.levels.contains_key(&level))
    }

    /// Levels `agent` participates in, ascending.  Empty if unknown.
    pub fn levels_of(&self, agent: AgentId) -> Vec<LevelId> {
        let mut levels: Vec<LevelId> = match self.agents.get(&agent) {
            Some(e) => e.levels.keys().copied().collect(),
            None    => Vec::new(),
        };
        levels.sort_unstable();
        levels
    }

    /// Agents participating in `level`, ascending.
    pub fn agents_in_level(&self, level: LevelId) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, e)| e.levels.contains_key(&level))
            .map(|(id, _)| *id)
            .collect();
        agents.sort_unstable();
        agents
    }

    pub fn category_of(&self, agent: AgentId) -> Option<&Arc<AgentCategory>> {
        self.agents.get(&agent).map(|e| &e.category)
    }

    // ── State access ──────────────────────────────────────────────────────

    fn states(&self, agent: AgentId, level: LevelId) -> KernelResult<&LevelStates> {
        self.agents
            .get(&agent)
            .and_then(|e| e.levels.get(&level))
            .ok_or(KernelError::NotInLevel(agent, level))
    }

    fn states_mut(&mut self, agent: AgentId, level: LevelId) -> KernelResult<&mut LevelStates> {
        self.agents
            .get_mut(&agent)
            .and_then(|e| e.levels.get_mut(&level))
            .ok_or(KernelError::NotInLevel(agent, level))
    }

    pub fn get_public(&self, agent: AgentId, level: LevelId) -> KernelResult<&dyn LocalState> {
        Ok(&*self.states(agent, level)?.public)
    }

    pub fn get_private(&self, agent: AgentId, level: LevelId) -> KernelResult<&dyn LocalState> {
        Ok(&*self.states(agent, level)?.private)
    }

    pub fn public_mut(
        &mut self,
        agent: AgentId,
        level: LevelId,
    ) -> KernelResult<&mut dyn LocalState> {
        Ok(&mut *self.states_mut(agent, level)?.public)
    }

    pub fn private_mut(
        &mut self,
        agent: AgentId,
        level: LevelId,
    ) -> KernelResult<&mut dyn LocalState> {
        Ok(&mut *self.states_mut(agent, level)?.private)
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    /// Clone the public states of every agent in `level` into a consistent,
    /// immutable view.
    pub fn public_snapshot(&self, level: LevelId) -> PublicSnapshot {
        let mut entries = BTreeMap::new();
        for (id, entry) in &self.agents {
            if let Some(states) = entry.levels.get(&level) {
                entries.insert(
                    *id,
                    SnapshotEntry {
                        category: Arc::clone(&entry.category),
                        state:    states.public.clone_box(),
                    },
                );
            }
        }
        PublicSnapshot { level, entries }
    }

    /// Roll public states back to `snapshot` after a failed reaction.
    ///
    /// Agents added since the snapshot keep their fresh state; agents
    /// removed since are not resurrected.
    pub fn restore_public(&mut self, snapshot: &PublicSnapshot) {
        for (id, snap) in &snapshot.entries {
            if let Some(entry) = self.agents.get_mut(id)
                && let Some(states) = entry.levels.get_mut(&snapshot.level)
            {
                states.public = snap.state.clone_box();
            }
        }
    }

    // ── Perceived-data cache ──────────────────────────────────────────────

    pub fn set_perceived(&mut self, agent: AgentId, level: LevelId, data: Box<dyn PerceivedData>) {
        if let Some(entry) = self.agents.get_mut(&agent) {
            entry.perceived.insert(level, data);
        }
    }

    pub fn get_perceived(&self, agent: AgentId, level: LevelId) -> Option<&dyn PerceivedData> {
        self.agents
            .get(&agent)
            .and_then(|e| e.perceived.get(&level))
            .map(|d| &**d)
    }

    /// Drop every cached perception for `level` — called after the decision
    /// phase, since perceived data never outlives its tick.
    pub fn clear_perceived(&mut self, level: LevelId) {
        for entry in self.agents.values_mut() {
            entry.perceived.remove(&level);
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────

    /// Clone both states of `agent` from `from` into `to`, adding `to` if
    /// absent (overwriting its states if present).  Does NOT remove the
    /// agent from `from`; callers compose removal separately so the two
    /// halves of a transition can be scheduled atomically.
    pub fn transition(&mut self, agent: AgentId, from: LevelId, to: LevelId) -> KernelResult<()> {
        let entry = self
            .agents
            .get_mut(&agent)
            .ok_or(KernelError::NotInLevel(agent, from))?;
        let source = entry
            .levels
            .get(&from)
            .ok_or(KernelError::NotInLevel(agent, from))?;
        let cloned = LevelStates {
            public:  source.public.clone_box(),
            private: source.private.clone_box(),
        };
        entry.levels.insert(to, cloned);
        Ok(())
    }

    // ── Counts ────────────────────────────────────────────────────────────

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
