//! The Logo reactor: the built-in influence policy table over turtles and
//! the grid environment.
//!
//! Policies: `ChangeSpeed`/`ChangeDirection`/`ChangePosition` deltas are
//! additive (direction modulo 2π, position topology-normalized), `Stop`
//! overrides any speed delta in the same batch, `ChangeAcceleration` is
//! last-write-wins, pheromone deposits are additive, and marks follow set
//! semantics with removal winning over a drop of the same mark in one
//! batch.

use mls_core::math::normalize_angle;
use mls_core::{AgentId, LevelId, MarkId};
use mls_kernel::{
    Influence, KernelResult, Payload, Probe, PublicSnapshot, ReactionCtx, Reactor, SimEvent,
    StateStore,
};

use crate::env::LogoEnv;
use crate::state::TurtlePublic;

pub struct LogoReactor;

fn with_turtle(
    store: &mut StateStore,
    level: LevelId,
    agent: AgentId,
    f:     impl FnOnce(&mut TurtlePublic),
) {
    if let Ok(state) = store.public_mut(agent, level)
        && let Some(turtle) = state.downcast_mut::<TurtlePublic>()
    {
        f(turtle);
    }
}

/// Advance every snapshot turtle: speed from acceleration, then position
/// along the heading, normalized per the grid topology.
fn integrate(
    probe:    &mut dyn Probe,
    store:    &mut StateStore,
    env:      Option<&LogoEnv>,
    snapshot: &PublicSnapshot,
    level:    LevelId,
    dt:       f64,
) {
    for agent in snapshot.agents() {
        let Ok(state) = store.public_mut(agent, level) else {
            continue;
        };
        let Some(turtle) = state.downcast_mut::<TurtlePublic>() else {
            continue;
        };

        turtle.speed = (turtle.speed + turtle.accel * dt).max(0.0);
        let dx = turtle.heading.cos() * turtle.speed * dt;
        let dy = turtle.heading.sin() * turtle.speed * dt;
        turtle.location.x += dx;
        turtle.location.y += dy;

        if let Some(env) = env {
            let (location, clamped) = env.normalize(turtle.location);
            turtle.location = location;
            if clamped {
                probe.on_event(&SimEvent::TopologyClamped { agent, level });
            }
        }
    }
}

impl Reactor for LogoReactor {
    fn react(
        &mut self,
        ctx:     &mut ReactionCtx<'_>,
        store:   &mut StateStore,
        natural: &[Influence],
        regular: Vec<Influence>,
    ) -> KernelResult<Vec<Influence>> {
        let level = ctx.level;
        let dt = ctx.dt_secs;
        let snapshot = ctx.snapshot;
        let probe = &mut *ctx.probe;
        let mut env = ctx
            .env
            .as_deref_mut()
            .and_then(|e| e.downcast_mut::<LogoEnv>());

        let mut leftovers = Vec::new();

        // Batch-wide overrides: stops beat speed deltas, removals beat drops.
        let stopped: Vec<AgentId> = regular
            .iter()
            .filter_map(|i| match i.payload {
                Payload::Stop { target } => Some(target),
                _ => None,
            })
            .collect();
        let removed_marks: Vec<MarkId> = regular
            .iter()
            .flat_map(|i| match &i.payload {
                Payload::RemoveMark { mark } => vec![*mark],
                Payload::RemoveMarks { marks } => marks.clone(),
                _ => Vec::new(),
            })
            .collect();

        for influence in regular {
            if let Some(target) = influence.payload.target()
                && !store.contains(target, level)
            {
                probe.on_event(&SimEvent::OrphanTarget {
                    agent:    target,
                    level,
                    category: influence.payload.category().to_string(),
                });
                continue;
            }

            match influence.payload {
                Payload::ChangeSpeed { target, ds } => {
                    if !stopped.contains(&target) {
                        with_turtle(store, level, target, |t| {
                            t.speed = (t.speed + ds).max(0.0);
                        });
                    }
                }
                Payload::Stop { target } => {
                    with_turtle(store, level, target, |t| {
                        t.speed = 0.0;
                        t.accel = t.accel.min(0.0);
                    });
                }
                Payload::ChangeAcceleration { target, da } => {
                    with_turtle(store, level, target, |t| t.accel = da);
                }
                Payload::ChangeDirection { target, dd } => {
                    with_turtle(store, level, target, |t| {
                        t.heading = normalize_angle(t.heading + dd);
                    });
                }
                Payload::ChangePosition { target, dx, dy } => {
                    let mut clamped_here = false;
                    if let Some(env) = env.as_deref() {
                        with_turtle(store, level, target, |t| {
                            t.location.x += dx;
                            t.location.y += dy;
                            let (location, clamped) = env.normalize(t.location);
                            t.location = location;
                            clamped_here = clamped;
                        });
                    } else {
                        with_turtle(store, level, target, |t| {
                            t.location.x += dx;
                            t.location.y += dy;
                        });
                    }
                    if clamped_here {
                        probe.on_event(&SimEvent::TopologyClamped { agent: target, level });
                    }
                }
                Payload::EmitPheromone { pheromone, location, amount } => {
                    if let Some(env) = env.as_deref_mut() {
                        env.deposit(pheromone, location, amount);
                    }
                }
                Payload::DropMark { mark } => {
                    if let Some(env) = env.as_deref_mut()
                        && !removed_marks.contains(&mark.id)
                    {
                        env.add_mark(mark);
                    }
                }
                Payload::RemoveMark { mark } => {
                    if let Some(env) = env.as_deref_mut() {
                        env.remove_mark(mark);
                    }
                }
                Payload::RemoveMarks { marks } => {
                    if let Some(env) = env.as_deref_mut() {
                        for mark in marks {
                            env.remove_mark(mark);
                        }
                    }
                }
                // Not a Logo concern — hand it back to the scheduler.
                _ => leftovers.push(influence),
            }
        }

        for trigger in natural {
            match trigger.payload {
                Payload::AgentPositionUpdate => {
                    integrate(probe, store, env.as_deref(), snapshot, level, dt);
                }
                Payload::PheromoneFieldUpdate => {
                    if let Some(env) = env.as_deref_mut() {
                        env.diffuse_and_evaporate(dt);
                    }
                }
                _ => {}
            }
        }

        Ok(leftovers)
    }
}
