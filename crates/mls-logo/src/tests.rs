//! Environment unit tests plus full-cycle turtle scenarios.

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use mls_core::{AgentId, MarkId, Period, Point2D, SimClock, TimeStamp};
use mls_kernel::{
    AgentCategory, AgentLevelSpec, AgentSpec, Influence, LevelConfig, Mark, Payload, Scheduler,
};

use crate::env::LogoEnv;
use crate::perception::{LogoPerception, TurtlePerceived};
use crate::reaction::LogoReactor;
use crate::state::TurtlePublic;
use crate::LOGO_LEVEL;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn grid(toroidal: bool) -> LogoEnv {
    LogoEnv::new(20, 20, toroidal).unwrap()
}

fn logo_sim(env: LogoEnv) -> (Scheduler, mls_core::LevelId) {
    let mut sim = Scheduler::new(SimClock::new(1.0)); // 1 tick = 1 s
    let level = sim
        .register_level(LevelConfig::every_step(LOGO_LEVEL), Box::new(LogoReactor))
        .unwrap();
    sim.set_environment(level, Box::new(env)).unwrap();
    (sim, level)
}

fn hatch(
    sim:     &mut Scheduler,
    level:   mls_core::LevelId,
    turtle:  TurtlePublic,
) -> AgentId {
    sim.add_agent(
        AgentSpec::new(AgentCategory::new("turtle"))
            .in_level(level, AgentLevelSpec::new(Box::new(turtle), Box::new(()))),
    )
    .unwrap()
}

fn turtle_of(sim: &Scheduler, agent: AgentId, level: mls_core::LevelId) -> TurtlePublic {
    sim.store()
        .get_public(agent, level)
        .unwrap()
        .downcast_ref::<TurtlePublic>()
        .unwrap()
        .clone()
}

fn emit(sim: &mut Scheduler, level: mls_core::LevelId, payload: Payload) {
    let period = Period::new(sim.level_time(level).unwrap(), 1);
    sim.emit_influence(Influence::new(level, period, payload)).unwrap();
}

fn logo_env<'a>(sim: &'a Scheduler, level: mls_core::LevelId) -> &'a LogoEnv {
    sim.environment(level).unwrap().downcast_ref::<LogoEnv>().unwrap()
}

// ── Environment ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod env_tests {
    use super::*;

    #[test]
    fn toroidal_normalize_wraps() {
        let env = grid(true);
        let (p, clamped) = env.normalize(Point2D::new(21.5, -0.5));
        assert!((p.x - 1.5).abs() < 1e-12);
        assert!((p.y - 19.5).abs() < 1e-12);
        assert!(!clamped);
    }

    #[test]
    fn bounded_normalize_clamps() {
        let env = grid(false);
        let (p, clamped) = env.normalize(Point2D::new(25.0, 5.0));
        assert!(p.x < 20.0);
        assert!(clamped);
        let (_, clamped) = env.normalize(Point2D::new(3.0, 3.0));
        assert!(!clamped);
    }

    #[test]
    fn torus_distance_takes_the_short_way() {
        let env = grid(true);
        let d = env.distance(Point2D::new(0.5, 10.0), Point2D::new(19.5, 10.0));
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn deposits_are_additive() {
        let mut env = grid(true);
        let p = env.register_pheromone("food", 0.0, 0.0, 0.0, 0.0).unwrap();
        env.deposit(p, Point2D::new(3.2, 4.8), 1.5);
        env.deposit(p, Point2D::new(3.9, 4.1), 2.0);
        assert!((env.pheromone_at(p, 3, 4) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn duplicate_pheromone_name_errors() {
        let mut env = grid(true);
        env.register_pheromone("food", 0.1, 0.1, 0.0, 0.0).unwrap();
        assert!(env.register_pheromone("food", 0.2, 0.2, 0.0, 0.0).is_err());
    }

    #[test]
    fn diffusion_without_evaporation_conserves_mass() {
        let mut env = grid(true);
        let p = env.register_pheromone("trail", 0.4, 0.0, 0.0, 0.0).unwrap();
        env.deposit(p, Point2D::new(10.0, 10.0), 100.0);
        for _ in 0..50 {
            env.diffuse_and_evaporate(0.5);
        }
        assert!((env.total_pheromone(p) - 100.0).abs() < 1e-9);
        // And it actually spread.
        assert!(env.pheromone_at(p, 10, 10) < 100.0);
        assert!(env.pheromone_at(p, 12, 12) > 0.0);
    }

    #[test]
    fn evaporation_decays_toward_the_floor() {
        let mut env = grid(true);
        let p = env.register_pheromone("scent", 0.0, 1.0, 0.0, 0.1).unwrap();
        env.deposit(p, Point2D::new(5.0, 5.0), 8.0);
        for _ in 0..100 {
            env.diffuse_and_evaporate(1.0);
        }
        assert!((env.pheromone_at(p, 5, 5) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn marks_are_keyed_by_identity() {
        let mut env = grid(true);
        let mark = Mark {
            id:       MarkId(1),
            category: "nest".into(),
            location: Point2D::new(2.5, 2.5),
        };
        env.add_mark(mark.clone());
        assert_eq!(env.num_marks(), 1);
        assert_eq!(env.marks_at(Point2D::new(2.1, 2.9)).len(), 1);
        assert!(env.remove_mark(MarkId(1)));
        assert!(!env.remove_mark(MarkId(1)));
        assert_eq!(env.num_marks(), 0);
    }
}

// ── Reaction policies ─────────────────────────────────────────────────────────

#[cfg(test)]
mod reaction_tests {
    use super::*;

    #[test]
    fn direction_deltas_are_additive_modulo_tau() {
        let (mut sim, level) = logo_sim(grid(true));
        let agent = hatch(&mut sim, level, TurtlePublic::at(Point2D::new(5.0, 5.0)));
        sim.step().unwrap();

        emit(&mut sim, level, Payload::ChangeDirection { target: agent, dd: PI });
        emit(&mut sim, level, Payload::ChangeDirection { target: agent, dd: PI + 0.25 });
        sim.step().unwrap();

        // π + π + 0.25 ≡ 0.25 (mod 2π).
        assert!((turtle_of(&sim, agent, level).heading - 0.25).abs() < 1e-12);
    }

    #[test]
    fn stop_overrides_speed_deltas() {
        let (mut sim, level) = logo_sim(grid(true));
        let agent = hatch(
            &mut sim,
            level,
            TurtlePublic::new(Point2D::new(5.0, 5.0), 0.0, 2.0),
        );
        sim.step().unwrap();

        emit(&mut sim, level, Payload::ChangeSpeed { target: agent, ds: 3.0 });
        emit(&mut sim, level, Payload::Stop { target: agent });
        sim.step().unwrap();

        assert_eq!(turtle_of(&sim, agent, level).speed, 0.0);
    }

    #[test]
    fn position_update_moves_along_heading() {
        let (mut sim, level) = logo_sim(grid(true));
        let agent = hatch(
            &mut sim,
            level,
            TurtlePublic::new(Point2D::new(5.0, 5.0), FRAC_PI_2, 1.5),
        );
        sim.step().unwrap(); // insertion
        sim.step().unwrap(); // first integrated tick (1 s)

        let t = turtle_of(&sim, agent, level);
        assert!((t.location.x - 5.0).abs() < 1e-9);
        assert!((t.location.y - 6.5).abs() < 1e-9);
    }

    #[test]
    fn toroidal_motion_wraps_around() {
        let (mut sim, level) = logo_sim(grid(true));
        let agent = hatch(
            &mut sim,
            level,
            TurtlePublic::new(Point2D::new(19.5, 10.0), 0.0, 1.0),
        );
        sim.step().unwrap();
        sim.step().unwrap(); // x: 19.5 + 1 → wraps to 0.5

        let t = turtle_of(&sim, agent, level);
        assert!((t.location.x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bounded_motion_clamps_and_reports() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (mut sim, level) = logo_sim(grid(false));

        #[derive(Default)]
        struct ClampProbe(Arc<AtomicUsize>);
        impl mls_kernel::Probe for ClampProbe {
            fn on_event(&mut self, event: &mls_kernel::SimEvent) {
                if matches!(event, mls_kernel::SimEvent::TopologyClamped { .. }) {
                    self.0.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        let probe = ClampProbe::default();
        let clamps = Arc::clone(&probe.0);
        sim.set_probe(Box::new(probe));

        let agent = hatch(
            &mut sim,
            level,
            TurtlePublic::new(Point2D::new(19.0, 10.0), 0.0, 5.0),
        );
        sim.step().unwrap();
        sim.run_steps(2).unwrap();

        assert!(clamps.load(Ordering::Relaxed) > 0);
        let t = turtle_of(&sim, agent, level);
        assert!(t.location.x < 20.0);
    }

    #[test]
    fn emitted_pheromone_lands_on_the_field() {
        let mut env = grid(true);
        let p = env.register_pheromone("food", 0.0, 0.0, 0.0, 0.0).unwrap();
        let (mut sim, level) = logo_sim(env);
        sim.step().unwrap();

        emit(
            &mut sim,
            level,
            Payload::EmitPheromone {
                pheromone: p,
                location:  Point2D::new(7.5, 7.5),
                amount:    2.0,
            },
        );
        emit(
            &mut sim,
            level,
            Payload::EmitPheromone {
                pheromone: p,
                location:  Point2D::new(7.1, 7.9),
                amount:    1.0,
            },
        );
        sim.step().unwrap();

        assert!((logo_env(&sim, level).pheromone_at(p, 7, 7) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn remove_wins_over_drop_in_the_same_batch() {
        let (mut sim, level) = logo_sim(grid(true));
        sim.step().unwrap();

        let mark = Mark {
            id:       MarkId(42),
            category: "crumb".into(),
            location: Point2D::new(1.5, 1.5),
        };
        emit(&mut sim, level, Payload::DropMark { mark });
        emit(&mut sim, level, Payload::RemoveMark { mark: MarkId(42) });
        sim.step().unwrap();

        assert_eq!(logo_env(&sim, level).num_marks(), 0);
    }

    #[test]
    fn drop_then_remove_in_later_tick() {
        let (mut sim, level) = logo_sim(grid(true));
        sim.step().unwrap();

        let mark = Mark {
            id:       MarkId(7),
            category: "crumb".into(),
            location: Point2D::new(1.5, 1.5),
        };
        emit(&mut sim, level, Payload::DropMark { mark });
        sim.step().unwrap();
        assert_eq!(logo_env(&sim, level).num_marks(), 1);

        emit(&mut sim, level, Payload::RemoveMarks { marks: vec![MarkId(7)] });
        sim.step().unwrap();
        assert_eq!(logo_env(&sim, level).num_marks(), 0);
    }

    #[test]
    fn field_dynamics_run_every_tick() {
        let mut env = grid(true);
        let p = env.register_pheromone("scent", 0.0, 0.5, 0.0, 0.0).unwrap();
        env.deposit(p, Point2D::new(5.0, 5.0), 10.0);
        let (mut sim, level) = logo_sim(env);

        sim.run_steps(3).unwrap(); // 3 s of decay at rate 0.5/s
        let remaining = logo_env(&sim, level).pheromone_at(p, 5, 5);
        let expected = 10.0 * (-0.5f64 * 3.0).exp();
        assert!((remaining - expected).abs() < 1e-9);
    }
}

// ── Perception ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod perception_tests {
    use super::*;
    use mls_kernel::{PerceptionModel, StateStore};

    #[test]
    fn sees_neighbors_within_range_only() {
        let level = mls_core::LevelId(0);
        let mut store = StateStore::new();
        store.include(
            AgentId(0),
            level,
            Box::new(TurtlePublic::at(Point2D::new(10.0, 10.0))),
            Box::new(()),
        );
        store.include(
            AgentId(1),
            level,
            Box::new(TurtlePublic::at(Point2D::new(12.0, 10.0))),
            Box::new(()),
        );
        store.include(
            AgentId(2),
            level,
            Box::new(TurtlePublic::at(Point2D::new(2.0, 2.0))),
            Box::new(()),
        );

        let env = grid(true);
        let snapshot = store.public_snapshot(level);
        let private = store.get_private(AgentId(0), level).unwrap();
        let boxed = LogoPerception::new(5.0).perceive(
            Period::new(TimeStamp(0), 1),
            AgentId(0),
            &snapshot,
            private,
            Some(&env),
        );
        let perceived = boxed.as_any().downcast_ref::<TurtlePerceived>().unwrap();

        assert_eq!(perceived.nearby.len(), 1);
        let seen = &perceived.nearby[0];
        assert_eq!(seen.agent, AgentId(1));
        assert!((seen.distance - 2.0).abs() < 1e-12);
        assert!(seen.bearing.abs() < 1e-12); // due east
        assert!(seen.relative_bearing.abs() < 1e-12); // already facing it
        assert!(seen.category.is_a("turtle") || seen.category.is_a("agent"));
    }

    #[test]
    fn wraparound_neighbor_is_close_on_the_torus() {
        let level = mls_core::LevelId(0);
        let mut store = StateStore::new();
        store.include(
            AgentId(0),
            level,
            Box::new(TurtlePublic::at(Point2D::new(0.5, 10.0))),
            Box::new(()),
        );
        store.include(
            AgentId(1),
            level,
            Box::new(TurtlePublic::at(Point2D::new(19.5, 10.0))),
            Box::new(()),
        );

        let env = grid(true);
        let snapshot = store.public_snapshot(level);
        let private = store.get_private(AgentId(0), level).unwrap();
        let boxed = LogoPerception::new(3.0).perceive(
            Period::new(TimeStamp(0), 1),
            AgentId(0),
            &snapshot,
            private,
            Some(&env),
        );
        let perceived = boxed.as_any().downcast_ref::<TurtlePerceived>().unwrap();
        assert_eq!(perceived.nearby.len(), 1);
        assert!((perceived.nearby[0].distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reads_own_patch_pheromones() {
        let level = mls_core::LevelId(0);
        let mut env = grid(true);
        let p = env.register_pheromone("food", 0.0, 0.0, 0.0, 0.0).unwrap();
        env.deposit(p, Point2D::new(4.5, 4.5), 6.0);

        let mut store = StateStore::new();
        store.include(
            AgentId(0),
            level,
            Box::new(TurtlePublic::at(Point2D::new(4.2, 4.8))),
            Box::new(()),
        );
        let snapshot = store.public_snapshot(level);
        let private = store.get_private(AgentId(0), level).unwrap();
        let boxed = LogoPerception::new(5.0).perceive(
            Period::new(TimeStamp(0), 1),
            AgentId(0),
            &snapshot,
            private,
            Some(&env),
        );
        let perceived = boxed.as_any().downcast_ref::<TurtlePerceived>().unwrap();
        assert_eq!(perceived.patch_pheromones, vec![(p, 6.0)]);
    }
}
