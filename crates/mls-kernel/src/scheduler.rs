//! The multi-level scheduler and its perception → decision → reaction loop.

use std::sync::Arc;

use mls_core::{AgentId, LevelId, Period, SimClock, TimeStamp};
use rustc_hash::FxHashMap;

use crate::bus::InfluenceBus;
use crate::decision::{DecisionModel, InfluenceBuffer};
use crate::environment::Environment;
use crate::error::{KernelError, KernelResult};
use crate::influence::{AgentSpec, Influence, Payload};
use crate::level::{Level, LevelConfig};
use crate::perception::PerceptionModel;
use crate::probe::{NoopProbe, Probe, SimEvent, SimPhase};
use crate::reactor::{ReactionCtx, Reactor};
use crate::state::{EmptyPerceivedData, PerceivedData};
use crate::store::{PublicSnapshot, StateStore};

/// Per-agent, per-level model overrides.  Agents without an entry use the
/// level's default models.
struct AgentModels {
    perception: Option<Arc<dyn PerceptionModel>>,
    decision:   Option<Arc<dyn DecisionModel>>,
}

type ModelMap = FxHashMap<AgentId, FxHashMap<LevelId, AgentModels>>;

fn resolve_perception(
    models:  &ModelMap,
    fallback: &Option<Arc<dyn PerceptionModel>>,
    agent:   AgentId,
    level:   LevelId,
) -> Option<Arc<dyn PerceptionModel>> {
    models
        .get(&agent)
        .and_then(|per_level| per_level.get(&level))
        .and_then(|m| m.perception.clone())
        .or_else(|| fallback.clone())
}

fn resolve_decision(
    models:  &ModelMap,
    fallback: &Option<Arc<dyn DecisionModel>>,
    agent:   AgentId,
    level:   LevelId,
) -> Option<Arc<dyn DecisionModel>> {
    models
        .get(&agent)
        .and_then(|per_level| per_level.get(&level))
        .and_then(|m| m.decision.clone())
        .or_else(|| fallback.clone())
}

/// Owns the registered levels, the influence bus, the state store, and the
/// global clock; drives heterogeneous-rate levels through the
/// perception/decision/reaction cycle.
///
/// # Determinism
///
/// For a fixed scenario the scheduler is deterministic: active levels are
/// visited in ascending [`LevelId`], agents in ascending [`AgentId`], and
/// decision buffers are flushed to the bus in agent order even when the
/// perception/decision phases run on Rayon workers (`parallel` feature).
pub struct Scheduler {
    clock:        SimClock,
    levels:       Vec<Level>,
    reactors:     Vec<Box<dyn Reactor>>,
    environments: Vec<Option<Box<dyn Environment>>>,
    bus:          InfluenceBus,
    store:        StateStore,
    models:       ModelMap,
    next_agent:   u32,
    step_count:   u64,
    time:         TimeStamp,
    probe:        Box<dyn Probe>,
}

impl Scheduler {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            levels:       Vec::new(),
            reactors:     Vec::new(),
            environments: Vec::new(),
            bus:          InfluenceBus::new(),
            store:        StateStore::new(),
            models:       FxHashMap::default(),
            next_agent:   0,
            step_count:   0,
            time:         TimeStamp::ZERO,
            probe:        Box::new(NoopProbe),
        }
    }

    // ── Registration ──────────────────────────────────────────────────────

    /// Register a level with its reactor.  Levels get dense ids in
    /// registration order; names must be unique.
    pub fn register_level(
        &mut self,
        config:  LevelConfig,
        reactor: Box<dyn Reactor>,
    ) -> KernelResult<LevelId> {
        if self.levels.iter().any(|l| l.name == config.name) {
            return Err(KernelError::DuplicateLevel(config.name));
        }
        let id = LevelId::try_from(self.levels.len())
            .map_err(|_| KernelError::Config("level id space exhausted".into()))?;
        self.levels.push(Level::new(id, config));
        self.reactors.push(reactor);
        self.environments.push(None);
        self.bus.register_level();
        Ok(id)
    }

    /// Replace a level's reactor.
    pub fn set_reaction_model(
        &mut self,
        level:   LevelId,
        reactor: Box<dyn Reactor>,
    ) -> KernelResult<()> {
        self.check_level(level)?;
        self.reactors[level.index()] = reactor;
        Ok(())
    }

    /// Set the default perception model for agents of `level` that did not
    /// bring their own.
    pub fn set_perception_model(
        &mut self,
        level: LevelId,
        model: Arc<dyn PerceptionModel>,
    ) -> KernelResult<()> {
        self.check_level(level)?;
        self.levels[level.index()].perception = Some(model);
        Ok(())
    }

    /// Set the default decision model for agents of `level`.
    pub fn set_decision_model(
        &mut self,
        level: LevelId,
        model: Arc<dyn DecisionModel>,
    ) -> KernelResult<()> {
        self.check_level(level)?;
        self.levels[level.index()].decision = Some(model);
        Ok(())
    }

    /// Attach the level's environment object (road network, Logo grid, …).
    pub fn set_environment(
        &mut self,
        level: LevelId,
        env:   Box<dyn Environment>,
    ) -> KernelResult<()> {
        self.check_level(level)?;
        self.environments[level.index()] = Some(env);
        Ok(())
    }

    /// Install the observer probe (replaces the default no-op).
    pub fn set_probe(&mut self, probe: Box<dyn Probe>) {
        self.probe = probe;
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn level_id(&self, name: &str) -> KernelResult<LevelId> {
        self.levels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
            .ok_or_else(|| KernelError::UnknownLevelName(name.to_string()))
    }

    pub fn level_name(&self, level: LevelId) -> KernelResult<&str> {
        self.check_level(level)?;
        Ok(&self.levels[level.index()].name)
    }

    /// A level's own clock (advanced by its `dt` each execution).
    pub fn level_time(&self, level: LevelId) -> KernelResult<TimeStamp> {
        self.check_level(level)?;
        Ok(self.levels[level.index()].current_time)
    }

    pub fn current_time(&self) -> TimeStamp {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn clock(&self) -> SimClock {
        self.clock
    }

    /// Read-only access to the state store (assertions, output writers).
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn environment(&self, level: LevelId) -> Option<&dyn Environment> {
        self.environments.get(level.index())?.as_deref()
    }

    pub fn environment_mut(&mut self, level: LevelId) -> Option<&mut (dyn Environment + '_)> {
        match self.environments.get_mut(level.index()) {
            Some(slot) => slot.as_deref_mut(),
            None       => None,
        }
    }

    /// Read-only public view of a level, cloned from the live store.
    pub fn snapshot_public_state(&self, level: LevelId) -> KernelResult<PublicSnapshot> {
        self.check_level(level)?;
        Ok(self.store.public_snapshot(level))
    }

    /// Influences currently queued across all levels.  Zero between steps
    /// unless something was injected out-of-band or re-emitted with later
    /// bounds.
    pub fn pending_influences(&self) -> usize {
        self.bus.len()
    }

    fn check_level(&self, level: LevelId) -> KernelResult<()> {
        if level.index() < self.levels.len() {
            Ok(())
        } else {
            Err(KernelError::UnknownLevel(level))
        }
    }

    // ── Agent lifecycle ───────────────────────────────────────────────────

    /// Schedule an agent for insertion.  Emits an `AddAgent` system
    /// influence to every level the spec participates in; the agent becomes
    /// observable on those levels' next ticks.
    pub fn add_agent(&mut self, spec: AgentSpec) -> KernelResult<AgentId> {
        for (level, _) in &spec.levels {
            self.check_level(*level)?;
        }
        let agent = AgentId(self.next_agent);
        self.next_agent += 1;

        let AgentSpec { category, levels } = spec;
        for (level, level_spec) in levels {
            let period = self.level_period(level);
            self.bus.emit(Influence::new(
                level,
                period,
                Payload::AddAgent {
                    agent,
                    category: Arc::clone(&category),
                    spec: level_spec,
                },
            ))?;
        }
        Ok(agent)
    }

    /// Schedule removal of an agent from every level it participates in.
    pub fn remove_agent(&mut self, agent: AgentId) -> KernelResult<()> {
        for level in self.store.levels_of(agent) {
            let period = self.level_period(level);
            self.bus
                .emit(Influence::new(level, period, Payload::RemoveAgent { agent }))?;
        }
        Ok(())
    }

    /// Schedule a level transition: the agent's states are cloned from
    /// `from` now, and the membership change applies atomically at the next
    /// tick boundary of the two levels.
    pub fn transition_agent(
        &mut self,
        agent: AgentId,
        from:  LevelId,
        to:    LevelId,
    ) -> KernelResult<()> {
        self.check_level(from)?;
        self.check_level(to)?;
        if !self.store.contains(agent, from) {
            return Err(KernelError::InvalidTransition {
                agent,
                from,
                to,
                reason: "agent does not participate in the source level",
            });
        }
        let public = self.store.get_public(agent, from)?.clone_box();
        let private = self.store.get_private(agent, from)?.clone_box();

        let to_period = self.level_period(to);
        self.bus.emit(Influence::new(
            to,
            to_period,
            Payload::AddAgentToLevel { agent, public, private },
        ))?;
        let from_period = self.level_period(from);
        self.bus.emit(Influence::new(
            from,
            from_period,
            Payload::RemoveAgentFromLevel { agent },
        ))?;
        Ok(())
    }

    /// Out-of-band influence injection (demand sources, control systems).
    pub fn emit_influence(&mut self, influence: Influence) -> KernelResult<()> {
        self.bus.emit(influence)
    }

    fn level_period(&self, level: LevelId) -> Period {
        let l = &self.levels[level.index()];
        Period::new(l.current_time, l.dt)
    }

    // ── Stepping ──────────────────────────────────────────────────────────

    /// One global tick: perception, decision, and reaction for every active
    /// level, then time advance.
    ///
    /// Structural failures (unknown level targets, reactor errors) abort the
    /// step and propagate; the failing level's public states are rolled back
    /// to its reaction-start snapshot first.
    pub fn step(&mut self) -> KernelResult<()> {
        let active: Vec<LevelId> = self
            .levels
            .iter()
            .filter(|l| l.is_active(self.step_count))
            .map(|l| l.id)
            .collect();

        for &level in &active {
            self.perception_phase(level);
        }
        for &level in &active {
            self.decision_phase(level)?;
        }
        for &level in &active {
            self.reaction_phase(level)?;
        }

        // ── Advance time ──────────────────────────────────────────────────
        for &level in &active {
            let l = &mut self.levels[level.index()];
            l.current_time = l.current_time.next(l.dt);
        }
        self.step_count += 1;

        // Scheduler time advances by the minimum active dt so finer levels
        // stay in phase with coarser ones.  On steps where no level is
        // active (co-prime frequencies), fall back to the global minimum.
        let min_dt = active
            .iter()
            .map(|l| self.levels[l.index()].dt)
            .min()
            .or_else(|| self.levels.iter().map(|l| l.dt).min())
            .unwrap_or(1);
        self.time = self.time.next(min_dt);
        self.probe.on_step(self.time);
        Ok(())
    }

    /// Step exactly `n` global ticks.
    pub fn run_steps(&mut self, n: u64) -> KernelResult<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `pred(scheduler_time, step_count)` holds (checked before
    /// each step, so a pred that is true immediately runs nothing).
    pub fn run_until(
        &mut self,
        mut pred: impl FnMut(TimeStamp, u64) -> bool,
    ) -> KernelResult<()> {
        while !pred(self.time, self.step_count) {
            self.step()?;
        }
        Ok(())
    }

    // ── Phase internals ───────────────────────────────────────────────────

    fn perception_phase(&mut self, level: LevelId) {
        let t = self.levels[level.index()].current_time;
        let period = self.level_period(level);
        self.probe.on_phase_begin(SimPhase::Perception, level, t);

        let snapshot = self.store.public_snapshot(level);
        let agents = self.store.agents_in_level(level);

        // Shared borrows only — the closure must be free of `self` so the
        // parallel path sees nothing but Sync captures.
        let store = &self.store;
        let models = &self.models;
        let fallback = &self.levels[level.index()].perception;
        let env = self.environments[level.index()].as_deref();
        let snapshot_ref = &snapshot;

        let perceive_one = |agent: AgentId| -> Option<(AgentId, Box<dyn PerceivedData>)> {
            let model = resolve_perception(models, fallback, agent, level)?;
            let private = store.get_private(agent, level).ok()?;
            Some((agent, model.perceive(period, agent, snapshot_ref, private, env)))
        };

        #[cfg(not(feature = "parallel"))]
        let perceived: Vec<(AgentId, Box<dyn PerceivedData>)> =
            agents.iter().filter_map(|&a| perceive_one(a)).collect();

        #[cfg(feature = "parallel")]
        let perceived: Vec<(AgentId, Box<dyn PerceivedData>)> = {
            use rayon::prelude::*;
            agents.par_iter().filter_map(|&a| perceive_one(a)).collect()
        };

        for (agent, data) in perceived {
            self.store.set_perceived(agent, level, data);
        }

        self.probe.on_phase_end(SimPhase::Perception, level, t);
    }

    fn decision_phase(&mut self, level: LevelId) -> KernelResult<()> {
        let t = self.levels[level.index()].current_time;
        let period = self.level_period(level);
        self.probe.on_phase_begin(SimPhase::Decision, level, t);

        let agents = self.store.agents_in_level(level);

        let store = &self.store;
        let models = &self.models;
        let fallback = &self.levels[level.index()].decision;

        let decide_one = |agent: AgentId| -> Vec<Influence> {
            let Some(model) = resolve_decision(models, fallback, agent, level) else {
                return Vec::new();
            };
            let (Ok(public), Ok(private)) = (
                store.get_public(agent, level),
                store.get_private(agent, level),
            ) else {
                return Vec::new();
            };
            let mut out = InfluenceBuffer::new(level, period);
            match store.get_perceived(agent, level) {
                Some(perceived) => {
                    model.decide(period, agent, public, private, perceived, &mut out)
                }
                None => {
                    let empty = EmptyPerceivedData(period);
                    model.decide(period, agent, public, private, &empty, &mut out)
                }
            }
            out.into_items()
        };

        #[cfg(not(feature = "parallel"))]
        let buffers: Vec<Vec<Influence>> = agents.iter().map(|&a| decide_one(a)).collect();

        #[cfg(feature = "parallel")]
        let buffers: Vec<Vec<Influence>> = {
            use rayon::prelude::*;
            agents.par_iter().map(|&a| decide_one(a)).collect()
        };

        // Flush in ascending AgentId order — `agents` is sorted and the
        // collect preserves it, so results match the serial path exactly.
        for items in buffers {
            for influence in items {
                self.bus.emit(influence)?;
            }
        }
        self.store.clear_perceived(level);

        self.probe.on_phase_end(SimPhase::Decision, level, t);
        Ok(())
    }

    fn reaction_phase(&mut self, level: LevelId) -> KernelResult<()> {
        let t = self.levels[level.index()].current_time;
        let period = self.level_period(level);
        let dt_secs = self.clock.dt_secs(period);
        self.probe.on_phase_begin(SimPhase::Reaction, level, t);

        // Natural action: the kernel itself requests the per-tick position
        // and field updates; reactors treat them as triggers.
        self.bus
            .emit(Influence::new(level, period, Payload::AgentPositionUpdate))?;
        self.bus
            .emit(Influence::new(level, period, Payload::PheromoneFieldUpdate))?;

        let (system, regular) = self.bus.drain(level)?;

        // Rollback point and the reactor's consistent view.  System effects
        // applied below are deliberately not part of it.
        let snapshot = self.store.public_snapshot(level);

        // ── System reaction (structural influences), in insertion order ──
        let mut natural: Vec<Influence> = Vec::new();
        for influence in system {
            if influence.payload.is_natural() {
                natural.push(influence);
                continue;
            }
            match influence.payload {
                Payload::AddAgent { agent, category, spec } => {
                    self.store.insert_agent(agent, category);
                    self.store.include(agent, level, spec.public, spec.private);
                    if spec.perception.is_some() || spec.decision.is_some() {
                        self.models.entry(agent).or_default().insert(
                            level,
                            AgentModels {
                                perception: spec.perception,
                                decision:   spec.decision,
                            },
                        );
                    }
                    self.probe.on_event(&SimEvent::AgentAdded { agent, level });
                }
                Payload::AddAgentToLevel { agent, public, private } => {
                    self.store.include(agent, level, public, private);
                    self.probe.on_event(&SimEvent::AgentAdded { agent, level });
                }
                Payload::RemoveAgent { agent } | Payload::RemoveAgentFromLevel { agent } => {
                    if self.store.exclude(agent, level) {
                        if let Some(per_level) = self.models.get_mut(&agent) {
                            per_level.remove(&level);
                            if per_level.is_empty() {
                                self.models.remove(&agent);
                            }
                        }
                        self.probe.on_event(&SimEvent::AgentRemoved { agent, level });
                    }
                    // Removing an absent agent is a no-op by contract.
                }
                // Regular payloads never land in the system queue.
                _ => {}
            }
        }

        // ── Regular reaction ──────────────────────────────────────────────
        let result = {
            // Disjoint field borrows: the reactor gets the store, the ctx
            // gets the environment and probe.
            let reactor = &mut self.reactors[level.index()];
            let env: Option<&mut (dyn Environment + '_)> = self.environments[level.index()].as_deref_mut();
            let mut ctx = ReactionCtx {
                level,
                period,
                dt_secs,
                snapshot: &snapshot,
                env,
                probe: &mut *self.probe,
            };
            reactor.react(&mut ctx, &mut self.store, &natural, regular)
        };
        match result {
            Ok(leftovers) => {
                for influence in leftovers {
                    // Re-queue leftovers for other levels, or re-emissions
                    // with later bounds; anything else would break level
                    // quiescence and is dropped with an event.
                    if influence.target_level != level || influence.period.lo >= period.hi {
                        self.bus.emit(influence)?;
                    } else {
                        self.probe.on_event(&SimEvent::InfluenceDropped {
                            level,
                            category: influence.payload.category().to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                self.store.restore_public(&snapshot);
                return Err(e);
            }
        }

        self.probe.on_phase_end(SimPhase::Reaction, level, t);
        Ok(())
    }
}
