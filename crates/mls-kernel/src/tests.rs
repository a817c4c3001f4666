//! Integration tests for the kernel: bus, store, composition, scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mls_core::{AgentId, LevelId, Period, SimClock, TimeStamp};

use crate::decision::{DecisionModel, DecisionSubmodel, DmsDecision, InfluenceBuffer, Outcome};
use crate::dms::Dms;
use crate::error::{KernelError, KernelResult};
use crate::influence::{AgentLevelSpec, AgentSpec, Influence, Payload};
use crate::perception::PerceptionModel;
use crate::probe::{Probe, SimEvent};
use crate::reactor::{ReactionCtx, Reactor};
use crate::scheduler::Scheduler;
use crate::state::{LocalState, PerceivedData};
use crate::store::StateStore;
use crate::{AgentCategory, Environment, LevelConfig};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Minimal kinematic public state used by the test level.
#[derive(Clone, Debug, PartialEq)]
struct Kin {
    pos:   f64,
    speed: f64,
    accel: f64,
}

impl Kin {
    fn at_rest() -> Self {
        Kin { pos: 0.0, speed: 0.0, accel: 0.0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct NoPrivate;

/// A reactor implementing the standard conflict policies on `Kin` states:
/// additive `ChangeSpeed`, overriding `Stop`, last-write-wins
/// `ChangeAcceleration`, integration on the natural position trigger.
struct KinReactor;

impl Reactor for KinReactor {
    fn react(
        &mut self,
        ctx:     &mut ReactionCtx<'_>,
        store:   &mut StateStore,
        natural: &[Influence],
        regular: Vec<Influence>,
    ) -> KernelResult<Vec<Influence>> {
        let mut leftovers = Vec::new();

        // Stop overrides any ChangeSpeed in the same batch, regardless of order.
        let stopped: Vec<AgentId> = regular
            .iter()
            .filter_map(|i| match i.payload {
                Payload::Stop { target } => Some(target),
                _ => None,
            })
            .collect();

        for influence in regular {
            let target = influence.payload.target();
            if let Some(agent) = target
                && !store.contains(agent, ctx.level)
            {
                ctx.probe.on_event(&SimEvent::OrphanTarget {
                    agent,
                    level: ctx.level,
                    category: influence.payload.category().to_string(),
                });
                continue;
            }
            match influence.payload {
                Payload::ChangeSpeed { target, ds } => {
                    if !stopped.contains(&target)
                        && let Ok(state) = store.public_mut(target, ctx.level)
                        && let Some(kin) = state.downcast_mut::<Kin>()
                    {
                        kin.speed = (kin.speed + ds).max(0.0);
                    }
                }
                Payload::Stop { target } => {
                    if let Ok(state) = store.public_mut(target, ctx.level)
                        && let Some(kin) = state.downcast_mut::<Kin>()
                    {
                        kin.speed = 0.0;
                    }
                }
                Payload::ChangeAcceleration { target, da } => {
                    if let Ok(state) = store.public_mut(target, ctx.level)
                        && let Some(kin) = state.downcast_mut::<Kin>()
                    {
                        kin.accel = da;
                    }
                }
                Payload::Custom(_) => leftovers.push(influence),
                _ => {}
            }
        }

        // Integrate over the consistent snapshot: agents added this very
        // tick start moving on the next one.
        if natural
            .iter()
            .any(|i| matches!(i.payload, Payload::AgentPositionUpdate))
        {
            for agent in ctx.snapshot.agents() {
                if let Ok(state) = store.public_mut(agent, ctx.level)
                    && let Some(kin) = state.downcast_mut::<Kin>()
                {
                    kin.speed = (kin.speed + kin.accel * ctx.dt_secs).max(0.0);
                    kin.pos += kin.speed * ctx.dt_secs;
                }
            }
        }

        Ok(leftovers)
    }
}

/// A reactor that fails whenever any regular influence arrives.
struct FailingReactor;

impl Reactor for FailingReactor {
    fn react(
        &mut self,
        ctx:      &mut ReactionCtx<'_>,
        _store:   &mut StateStore,
        _natural: &[Influence],
        regular:  Vec<Influence>,
    ) -> KernelResult<Vec<Influence>> {
        if regular.is_empty() {
            Ok(Vec::new())
        } else {
            Err(KernelError::NotInLevel(AgentId(999), ctx.level))
        }
    }
}

/// Probe that collects events and counts phase callbacks.
#[derive(Default)]
struct RecordingProbe {
    events:    Arc<Mutex<Vec<SimEvent>>>,
    reactions: Arc<AtomicUsize>,
}

impl Probe for RecordingProbe {
    fn on_phase_end(&mut self, phase: crate::SimPhase, _level: LevelId, _t: TimeStamp) {
        if phase == crate::SimPhase::Reaction {
            self.reactions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_event(&mut self, event: &SimEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn kin_scheduler() -> (Scheduler, LevelId) {
    let mut sim = Scheduler::new(SimClock::new(0.1));
    let level = sim
        .register_level(LevelConfig::every_step("test"), Box::new(KinReactor))
        .unwrap();
    (sim, level)
}

fn kin_spec(level: LevelId, initial: Kin) -> AgentSpec {
    AgentSpec::new(AgentCategory::new("test-agent"))
        .in_level(level, AgentLevelSpec::new(Box::new(initial), Box::new(NoPrivate)))
}

fn kin_of(sim: &Scheduler, agent: AgentId, level: LevelId) -> Kin {
    sim.store()
        .get_public(agent, level)
        .unwrap()
        .downcast_ref::<Kin>()
        .unwrap()
        .clone()
}

// ── Influence bus ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod bus_tests {
    use super::*;
    use crate::bus::InfluenceBus;

    fn period() -> Period {
        Period::new(TimeStamp(0), 1)
    }

    #[test]
    fn drain_partitions_and_preserves_order() {
        let mut bus = InfluenceBus::new();
        bus.register_level();
        let l = LevelId(0);

        bus.emit(Influence::new(l, period(), Payload::ChangeSpeed { target: AgentId(0), ds: 1.0 }))
            .unwrap();
        bus.emit(Influence::new(l, period(), Payload::RemoveAgent { agent: AgentId(1) }))
            .unwrap();
        bus.emit(Influence::new(l, period(), Payload::ChangeSpeed { target: AgentId(2), ds: 2.0 }))
            .unwrap();

        let (system, regular) = bus.drain(l).unwrap();
        assert_eq!(system.len(), 1);
        assert!(matches!(system[0].payload, Payload::RemoveAgent { .. }));
        assert_eq!(regular.len(), 2);
        assert!(matches!(regular[0].payload, Payload::ChangeSpeed { ds, .. } if ds == 1.0));
        assert!(matches!(regular[1].payload, Payload::ChangeSpeed { ds, .. } if ds == 2.0));
        assert!(bus.is_empty(l));
    }

    #[test]
    fn drain_empty_is_noop() {
        let mut bus = InfluenceBus::new();
        bus.register_level();
        let (system, regular) = bus.drain(LevelId(0)).unwrap();
        assert!(system.is_empty() && regular.is_empty());
    }

    #[test]
    fn emit_to_unknown_level_errors() {
        let mut bus = InfluenceBus::new();
        let result = bus.emit(Influence::new(
            LevelId(3),
            period(),
            Payload::Stop { target: AgentId(0) },
        ));
        assert!(matches!(result, Err(KernelError::UnknownLevel(LevelId(3)))));
    }
}

// ── State store ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod store_tests {
    use super::*;

    fn store_with_agent(level: LevelId) -> StateStore {
        let mut store = StateStore::new();
        store.include(
            AgentId(0),
            level,
            Box::new(Kin { pos: 1.0, speed: 2.0, accel: 0.0 }),
            Box::new(NoPrivate),
        );
        store
    }

    #[test]
    fn include_is_idempotent() {
        let l = LevelId(0);
        let mut store = store_with_agent(l);
        // Second include with different state must not overwrite.
        store.include(AgentId(0), l, Box::new(Kin::at_rest()), Box::new(NoPrivate));
        let kin = store.get_public(AgentId(0), l).unwrap().downcast_ref::<Kin>().unwrap();
        assert_eq!(kin.pos, 1.0);
    }

    #[test]
    fn exclude_drops_agent_with_last_level() {
        let l = LevelId(0);
        let mut store = store_with_agent(l);
        assert!(store.exclude(AgentId(0), l));
        assert!(!store.contains(AgentId(0), l));
        assert_eq!(store.agent_count(), 0);
        // Idempotent.
        assert!(!store.exclude(AgentId(0), l));
    }

    #[test]
    fn missing_access_is_not_in_level() {
        let store = StateStore::new();
        let result = store.get_public(AgentId(5), LevelId(0));
        assert!(matches!(result, Err(KernelError::NotInLevel(AgentId(5), LevelId(0)))));
    }

    #[test]
    fn transition_clones_without_removing() {
        let a = LevelId(0);
        let b = LevelId(1);
        let mut store = store_with_agent(a);
        store.transition(AgentId(0), a, b).unwrap();
        assert!(store.contains(AgentId(0), a));
        assert!(store.contains(AgentId(0), b));
        let in_a = store.get_public(AgentId(0), a).unwrap().downcast_ref::<Kin>().unwrap();
        let in_b = store.get_public(AgentId(0), b).unwrap().downcast_ref::<Kin>().unwrap();
        assert_eq!(in_a, in_b);
    }

    #[test]
    fn transition_roundtrip_restores_states() {
        let a = LevelId(0);
        let b = LevelId(1);
        let mut store = store_with_agent(a);
        store.transition(AgentId(0), a, b).unwrap();
        store.transition(AgentId(0), b, a).unwrap();
        let kin = store.get_public(AgentId(0), a).unwrap().downcast_ref::<Kin>().unwrap();
        assert_eq!(*kin, Kin { pos: 1.0, speed: 2.0, accel: 0.0 });
    }

    #[test]
    fn transition_from_absent_level_errors() {
        let mut store = store_with_agent(LevelId(0));
        let result = store.transition(AgentId(0), LevelId(1), LevelId(2));
        assert!(matches!(result, Err(KernelError::NotInLevel(..))));
    }

    #[test]
    fn snapshot_is_immutable_under_store_mutation() {
        let l = LevelId(0);
        let mut store = store_with_agent(l);
        let snapshot = store.public_snapshot(l);

        store
            .public_mut(AgentId(0), l)
            .unwrap()
            .downcast_mut::<Kin>()
            .unwrap()
            .speed = 99.0;

        let snap_kin = snapshot.get(AgentId(0)).unwrap().downcast_ref::<Kin>().unwrap();
        assert_eq!(snap_kin.speed, 2.0);
    }

    #[test]
    fn snapshot_iterates_in_ascending_id_order() {
        let l = LevelId(0);
        let mut store = StateStore::new();
        for id in [3u32, 1, 2, 0] {
            store.include(AgentId(id), l, Box::new(Kin::at_rest()), Box::new(NoPrivate));
        }
        let snapshot = store.public_snapshot(l);
        let ids: Vec<u32> = snapshot.agents().map(|a| a.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn restore_public_rolls_back() {
        let l = LevelId(0);
        let mut store = store_with_agent(l);
        let snapshot = store.public_snapshot(l);
        store
            .public_mut(AgentId(0), l)
            .unwrap()
            .downcast_mut::<Kin>()
            .unwrap()
            .pos = 500.0;
        store.restore_public(&snapshot);
        let kin = store.get_public(AgentId(0), l).unwrap().downcast_ref::<Kin>().unwrap();
        assert_eq!(kin.pos, 1.0);
    }
}

// ── Categories ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod category_tests {
    use super::*;

    #[test]
    fn is_a_is_reflexive_and_transitive() {
        let vehicle = AgentCategory::new("vehicle");
        let motorized = AgentCategory::with_parents("motorized", vec![Arc::clone(&vehicle)]);
        let truck = AgentCategory::with_parents("truck", vec![Arc::clone(&motorized)]);

        assert!(truck.is_a("truck"));
        assert!(truck.is_a("motorized"));
        assert!(truck.is_a("vehicle"));
        assert!(!truck.is_a("turtle"));
        assert!(!vehicle.is_a("truck"));
    }
}

// ── DMS composition ───────────────────────────────────────────────────────────

#[cfg(test)]
mod dms_tests {
    use super::*;

    /// Leaf that emits one ChangeSpeed and reports the given outcome.
    struct EmitLeaf {
        ds:      f64,
        outcome: Outcome,
        calls:   Arc<AtomicUsize>,
    }

    impl DecisionSubmodel for EmitLeaf {
        fn manage(
            &self,
            _period:    Period,
            agent:      AgentId,
            _public:    &dyn LocalState,
            _private:   &dyn LocalState,
            _perceived: &dyn PerceivedData,
            out:        &mut InfluenceBuffer,
        ) -> Outcome {
            self.calls.fetch_add(1, Ordering::Relaxed);
            out.emit(Payload::ChangeSpeed { target: agent, ds: self.ds });
            self.outcome
        }
    }

    fn leaf(ds: f64, outcome: Outcome, calls: &Arc<AtomicUsize>) -> Dms<EmitLeaf> {
        Dms::Leaf(EmitLeaf { ds, outcome, calls: Arc::clone(calls) })
    }

    fn run(dms: &Dms<EmitLeaf>) -> (Outcome, usize) {
        let period = Period::new(TimeStamp(0), 1);
        let public = Kin::at_rest();
        let private = NoPrivate;
        let perceived = crate::state::EmptyPerceivedData(period);
        let mut out = InfluenceBuffer::new(LevelId(0), period);
        let outcome = dms.manage(period, AgentId(0), &public, &private, &perceived, &mut out);
        (outcome, out.len())
    }

    #[test]
    fn conjunction_runs_all_children_and_ors_outcomes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dms = Dms::Conjunction(vec![
            leaf(1.0, Outcome::Passed, &calls),
            leaf(2.0, Outcome::Handled, &calls),
            leaf(3.0, Outcome::Passed, &calls),
        ]);
        let (outcome, emitted) = run(&dms);
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(emitted, 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn conjunction_of_passed_children_passes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dms = Dms::Conjunction(vec![
            leaf(1.0, Outcome::Passed, &calls),
            leaf(2.0, Outcome::Passed, &calls),
        ]);
        let (outcome, _) = run(&dms);
        assert_eq!(outcome, Outcome::Passed);
    }

    #[test]
    fn subsumption_short_circuits_on_first_handled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dms = Dms::Subsumption(vec![
            leaf(1.0, Outcome::Passed, &calls),
            leaf(2.0, Outcome::Handled, &calls),
            leaf(3.0, Outcome::Handled, &calls),
        ]);
        let (outcome, emitted) = run(&dms);
        assert_eq!(outcome, Outcome::Handled);
        // Third leaf skipped.
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(emitted, 2);
    }

    #[test]
    fn nested_trees_compose() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dms = Dms::Subsumption(vec![
            Dms::Conjunction(vec![
                leaf(1.0, Outcome::Passed, &calls),
                leaf(2.0, Outcome::Passed, &calls),
            ]),
            leaf(3.0, Outcome::Handled, &calls),
        ]);
        let (outcome, emitted) = run(&dms);
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(emitted, 3);
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scheduler_tests {
    use super::*;

    #[test]
    fn duplicate_level_name_errors() {
        let mut sim = Scheduler::new(SimClock::default());
        sim.register_level(LevelConfig::every_step("a"), Box::new(KinReactor))
            .unwrap();
        let result = sim.register_level(LevelConfig::every_step("a"), Box::new(KinReactor));
        assert!(matches!(result, Err(KernelError::DuplicateLevel(_))));
    }

    #[test]
    fn zero_agents_step_advances_time() {
        let (mut sim, _) = kin_scheduler();
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.current_time(), TimeStamp(2));
        assert_eq!(sim.step_count(), 2);
    }

    #[test]
    fn added_agent_becomes_visible_next_tick() {
        let (mut sim, level) = kin_scheduler();
        let agent = sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap();
        assert!(!sim.store().contains(agent, level));
        sim.step().unwrap();
        assert!(sim.store().contains(agent, level));
    }

    #[test]
    fn system_before_regular_in_one_tick() {
        // AddAgent and a ChangeSpeed for the same agent queued in the same
        // tick: the system influence applies first, so the speed delta lands.
        let (mut sim, level) = kin_scheduler();
        let agent = sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap();
        let period = Period::new(TimeStamp(0), 1);
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::ChangeSpeed { target: agent, ds: 5.0 },
        ))
        .unwrap();

        sim.step().unwrap();
        assert!((kin_of(&sim, agent, level).speed - 5.0).abs() < 1e-12);
    }

    #[test]
    fn orphan_target_is_discarded_with_event() {
        let (mut sim, level) = kin_scheduler();
        let events = Arc::new(Mutex::new(Vec::new()));
        sim.set_probe(Box::new(RecordingProbe {
            events:    Arc::clone(&events),
            reactions: Arc::default(),
        }));

        let period = Period::new(TimeStamp(0), 1);
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::ChangeSpeed { target: AgentId(77), ds: 5.0 },
        ))
        .unwrap();
        sim.step().unwrap();

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::OrphanTarget { agent: AgentId(77), .. })));
    }

    #[test]
    fn stop_overrides_change_speed_in_same_batch() {
        let (mut sim, level) = kin_scheduler();
        let agent = sim
            .add_agent(kin_spec(level, Kin { pos: 0.0, speed: 10.0, accel: 0.0 }))
            .unwrap();
        sim.step().unwrap();

        let period = Period::new(TimeStamp(1), 1);
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::Stop { target: agent },
        ))
        .unwrap();
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::ChangeSpeed { target: agent, ds: 4.0 },
        ))
        .unwrap();
        sim.step().unwrap();

        assert_eq!(kin_of(&sim, agent, level).speed, 0.0);
    }

    #[test]
    fn change_acceleration_is_last_write_wins() {
        let (mut sim, level) = kin_scheduler();
        let agent = sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap();
        sim.step().unwrap();

        let period = Period::new(TimeStamp(1), 1);
        for da in [1.0, 2.0, 3.0] {
            sim.emit_influence(Influence::new(
                level,
                period,
                Payload::ChangeAcceleration { target: agent, da },
            ))
            .unwrap();
        }
        sim.step().unwrap();
        assert_eq!(kin_of(&sim, agent, level).accel, 3.0);
    }

    #[test]
    fn natural_trigger_integrates_kinematics() {
        let (mut sim, level) = kin_scheduler(); // dt = 1 tick = 0.1 s
        let agent = sim
            .add_agent(kin_spec(level, Kin { pos: 0.0, speed: 10.0, accel: 0.0 }))
            .unwrap();
        sim.step().unwrap(); // agent appears
        sim.step().unwrap(); // first integrated tick
        let kin = kin_of(&sim, agent, level);
        assert!((kin.pos - 1.0).abs() < 1e-12); // 10 m/s * 0.1 s
    }

    #[test]
    fn multi_rate_levels_execute_on_their_frequency() {
        let mut sim = Scheduler::new(SimClock::new(0.1));
        let fast = sim
            .register_level(LevelConfig::new("fast", 1, 1), Box::new(KinReactor))
            .unwrap();
        let slow = sim
            .register_level(LevelConfig::new("slow", 2, 2), Box::new(KinReactor))
            .unwrap();

        sim.run_steps(4).unwrap();

        // fast ran 4 times (dt 1), slow ran on steps 0 and 2 (dt 2).
        assert_eq!(sim.level_time(fast).unwrap(), TimeStamp(4));
        assert_eq!(sim.level_time(slow).unwrap(), TimeStamp(4));
        // Scheduler advanced by the minimum active dt on every step.
        assert_eq!(sim.current_time(), TimeStamp(4));
    }

    #[test]
    fn slow_level_skips_inactive_steps() {
        let mut sim = Scheduler::new(SimClock::new(0.1));
        let _fast = sim
            .register_level(LevelConfig::new("fast", 1, 1), Box::new(KinReactor))
            .unwrap();
        let slow = sim
            .register_level(LevelConfig::new("slow", 3, 3), Box::new(KinReactor))
            .unwrap();
        let reactions = Arc::new(AtomicUsize::new(0));
        sim.set_probe(Box::new(RecordingProbe {
            events:    Arc::default(),
            reactions: Arc::clone(&reactions),
        }));

        sim.run_steps(3).unwrap();
        // fast reacted 3 times, slow once (step 0).
        assert_eq!(reactions.load(Ordering::Relaxed), 4);
        assert_eq!(sim.level_time(slow).unwrap(), TimeStamp(3));
    }

    #[test]
    fn transition_agent_moves_membership_next_tick() {
        let mut sim = Scheduler::new(SimClock::default());
        let a = sim
            .register_level(LevelConfig::every_step("a"), Box::new(KinReactor))
            .unwrap();
        let b = sim
            .register_level(LevelConfig::every_step("b"), Box::new(KinReactor))
            .unwrap();
        let agent = sim
            .add_agent(kin_spec(a, Kin { pos: 7.0, speed: 0.0, accel: 0.0 }))
            .unwrap();
        sim.step().unwrap();

        sim.transition_agent(agent, a, b).unwrap();
        // Not yet applied.
        assert!(sim.store().contains(agent, a));
        assert!(!sim.store().contains(agent, b));

        sim.step().unwrap();
        assert!(!sim.store().contains(agent, a));
        assert!(sim.store().contains(agent, b));
        assert_eq!(kin_of(&sim, agent, b).pos, 7.0);
    }

    #[test]
    fn transition_from_wrong_level_errors() {
        let mut sim = Scheduler::new(SimClock::default());
        let a = sim
            .register_level(LevelConfig::every_step("a"), Box::new(KinReactor))
            .unwrap();
        let b = sim
            .register_level(LevelConfig::every_step("b"), Box::new(KinReactor))
            .unwrap();
        let result = sim.transition_agent(AgentId(0), a, b);
        assert!(matches!(result, Err(KernelError::InvalidTransition { .. })));
    }

    #[test]
    fn remove_agent_applies_next_tick() {
        let (mut sim, level) = kin_scheduler();
        let agent = sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap();
        sim.step().unwrap();
        assert!(sim.store().contains(agent, level));

        sim.remove_agent(agent).unwrap();
        sim.step().unwrap();
        assert!(!sim.store().contains(agent, level));
        assert_eq!(sim.store().agent_count(), 0);
    }

    #[test]
    fn reactor_error_rolls_back_and_propagates() {
        let mut sim = Scheduler::new(SimClock::default());
        let level = sim
            .register_level(LevelConfig::every_step("fragile"), Box::new(KinReactor))
            .unwrap();
        let agent = sim
            .add_agent(kin_spec(level, Kin { pos: 3.0, speed: 1.0, accel: 0.0 }))
            .unwrap();
        sim.step().unwrap();
        sim.set_reaction_model(level, Box::new(FailingReactor)).unwrap();

        let period = Period::new(TimeStamp(1), 1);
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::ChangeSpeed { target: agent, ds: 1.0 },
        ))
        .unwrap();
        let result = sim.step();
        assert!(result.is_err());
        // Public state is unchanged from before the failing reaction.
        let kin = kin_of(&sim, agent, level);
        assert_eq!(kin.pos, 3.0);
        assert_eq!(kin.speed, 1.0);
    }

    #[test]
    fn unconsumable_leftover_is_dropped_with_event() {
        struct TrafficLightPhase;
        impl crate::UserInfluence for TrafficLightPhase {
            fn category(&self) -> &str {
                "traffic-light-phase"
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        let (mut sim, level) = kin_scheduler();
        let events = Arc::new(Mutex::new(Vec::new()));
        sim.set_probe(Box::new(RecordingProbe {
            events:    Arc::clone(&events),
            reactions: Arc::default(),
        }));

        // KinReactor does not understand this influence and returns it; the
        // scheduler must not re-queue it for the same tick.
        let period = Period::new(TimeStamp(0), 1);
        sim.emit_influence(Influence::new(
            level,
            period,
            Payload::Custom(Box::new(TrafficLightPhase)),
        ))
        .unwrap();
        sim.step().unwrap();

        assert_eq!(sim.pending_influences(), 0);
        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::InfluenceDropped { category, .. } if category == "traffic-light-phase"
        )));
    }

    #[test]
    fn run_until_stops_on_predicate() {
        let (mut sim, _) = kin_scheduler();
        sim.run_until(|t, _| t >= TimeStamp(5)).unwrap();
        assert_eq!(sim.current_time(), TimeStamp(5));
    }

    #[test]
    fn level_id_lookup() {
        let (sim, level) = kin_scheduler();
        assert_eq!(sim.level_id("test").unwrap(), level);
        assert!(matches!(
            sim.level_id("nope"),
            Err(KernelError::UnknownLevelName(_))
        ));
        assert_eq!(sim.level_name(level).unwrap(), "test");
    }
}

// ── Full-cycle determinism with perception and decision ──────────────────────

#[cfg(test)]
mod cycle_tests {
    use super::*;

    struct CountingPerception;

    impl PerceptionModel for CountingPerception {
        fn perceive(
            &self,
            period:    Period,
            _agent:    AgentId,
            snapshot:  &crate::PublicSnapshot,
            _private:  &dyn LocalState,
            _env:      Option<&dyn Environment>,
        ) -> Box<dyn PerceivedData> {
            Box::new(CountPerceived { period, others: snapshot.len() })
        }
    }

    struct CountPerceived {
        period: Period,
        others: usize,
    }

    impl PerceivedData for CountPerceived {
        fn period(&self) -> Period {
            self.period
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    /// Accelerate proportionally to how many agents were perceived.
    struct CrowdDecision;

    impl DecisionModel for CrowdDecision {
        fn decide(
            &self,
            _period:   Period,
            agent:     AgentId,
            _public:   &dyn LocalState,
            _private:  &dyn LocalState,
            perceived: &dyn PerceivedData,
            out:       &mut InfluenceBuffer,
        ) {
            let seen = perceived
                .downcast_ref::<CountPerceived>()
                .map(|p| p.others)
                .unwrap_or(0);
            out.emit(Payload::ChangeSpeed { target: agent, ds: seen as f64 });
        }
    }

    fn full_cycle_sim() -> (Scheduler, LevelId, Vec<AgentId>) {
        let mut sim = Scheduler::new(SimClock::new(0.1));
        let level = sim
            .register_level(LevelConfig::every_step("crowd"), Box::new(KinReactor))
            .unwrap();
        sim.set_perception_model(level, Arc::new(CountingPerception)).unwrap();
        sim.set_decision_model(level, Arc::new(CrowdDecision)).unwrap();
        let mut agents = Vec::new();
        for _ in 0..3 {
            agents.push(sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap());
        }
        (sim, level, agents)
    }

    #[test]
    fn bus_is_quiescent_after_every_step() {
        let (mut sim, _, _) = full_cycle_sim();
        for _ in 0..5 {
            sim.step().unwrap();
            assert_eq!(sim.pending_influences(), 0);
        }
    }

    #[test]
    fn decisions_see_snapshot_of_all_agents() {
        let (mut sim, level, agents) = full_cycle_sim();
        sim.step().unwrap(); // agents appear
        sim.step().unwrap(); // first full cycle: each perceives 3 agents
        for &agent in &agents {
            assert!((kin_of(&sim, agent, level).speed - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn identical_scenarios_produce_identical_states() {
        let run = || {
            let (mut sim, level, agents) = full_cycle_sim();
            sim.run_steps(5).unwrap();
            agents
                .iter()
                .map(|&a| kin_of(&sim, a, level))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn dms_decision_model_wrapper_emits() {
        struct AlwaysAccel;
        impl DecisionSubmodel for AlwaysAccel {
            fn manage(
                &self,
                _period:    Period,
                agent:      AgentId,
                _public:    &dyn LocalState,
                _private:   &dyn LocalState,
                _perceived: &dyn PerceivedData,
                out:        &mut InfluenceBuffer,
            ) -> Outcome {
                out.emit(Payload::ChangeAcceleration { target: agent, da: 2.0 });
                Outcome::Handled
            }
        }

        let mut sim = Scheduler::new(SimClock::new(0.1));
        let level = sim
            .register_level(LevelConfig::every_step("dms"), Box::new(KinReactor))
            .unwrap();
        sim.set_decision_model(
            level,
            Arc::new(DmsDecision(Dms::Subsumption(vec![Dms::Leaf(AlwaysAccel)]))),
        )
        .unwrap();
        let agent = sim.add_agent(kin_spec(level, Kin::at_rest())).unwrap();
        sim.run_steps(2).unwrap();
        assert_eq!(kin_of(&sim, agent, level).accel, 2.0);
    }
}
