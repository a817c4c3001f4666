//! The microscopic reactor: lane moves, acceleration commands, kinematics.
//!
//! Application order within a tick: lane changes first (they decide who is
//! whose leader), then longitudinal commands, then — on the natural
//! position-update trigger — integration and the physical invariants
//! (non-negative speed, topology normalization, no overlap).

use std::collections::BTreeMap;

use mls_core::{AgentId, LaneId, LevelId};
use mls_kernel::{
    Influence, KernelResult, LaneChange, Payload, Probe, PublicSnapshot, ReactionCtx, Reactor,
    SimEvent, StateStore,
};
use mls_road::{RoadNetwork, Side};

use crate::perception::RoadEnvironment;
use crate::state::VehiclePublicMicro;

/// Tolerance on the no-overlap invariant.
const OVERLAP_EPS: f64 = 1e-6;

/// Lateral clearance (m) required on top of vehicle lengths before a lane
/// change is physically executed.
const LANE_CHANGE_CLEARANCE: f64 = 0.5;

/// Speed ceiling factor over the lane limit; decisions regulate *to* the
/// limit, the reactor only caps runaway values.
const SPEED_CAP_FACTOR: f64 = 1.1;

pub struct MicroReactor;

/// All vehicles of the level as `(agent, lane, pos, length)`, read from the
/// live store in ascending agent order.
fn occupancy(store: &StateStore, level: LevelId) -> Vec<(AgentId, LaneId, f64, f64)> {
    store
        .agents_in_level(level)
        .into_iter()
        .filter_map(|agent| {
            let state = store.get_public(agent, level).ok()?;
            let v = state.downcast_ref::<VehiclePublicMicro>()?;
            Some((agent, v.lane, v.pos, v.length))
        })
        .collect()
}

fn apply_lane_change(
    probe:     &mut dyn Probe,
    store:     &mut StateStore,
    network:   &RoadNetwork,
    level:     LevelId,
    agent:     AgentId,
    direction: LaneChange,
) {
    let side = match direction {
        LaneChange::Left  => Side::Left,
        LaneChange::Right => Side::Right,
    };

    let Some((from, pos, length)) = store
        .get_public(agent, level)
        .ok()
        .and_then(|s| s.downcast_ref::<VehiclePublicMicro>())
        .map(|v| (v.lane, v.pos, v.length))
    else {
        return;
    };

    let Some(target) = network.adjacent(from, side) else {
        return;
    };

    // Physical backstop: the slot must be clear.  MOBIL's safety criterion
    // normally guarantees this; simultaneous changes in one tick can still
    // collide here.
    let blocked = occupancy(store, level).iter().any(|&(other, lane, opos, olen)| {
        other != agent
            && lane == target
            && opos > pos - length - LANE_CHANGE_CLEARANCE
            && opos - olen < pos + LANE_CHANGE_CLEARANCE
    });
    if blocked {
        return;
    }

    let Ok(index) = network.lane(target).map(|l| l.index) else {
        return;
    };
    if let Ok(state) = store.public_mut(agent, level)
        && let Some(v) = state.downcast_mut::<VehiclePublicMicro>()
    {
        v.lane = target;
        v.lane_index = index;
        probe.on_event(&SimEvent::LaneChanged { agent, from, to: target });
    }
}

/// Advance kinematics for every snapshot agent: agents added this tick
/// start moving next tick.
fn integrate(
    probe:    &mut dyn Probe,
    store:    &mut StateStore,
    network:  Option<&RoadNetwork>,
    snapshot: &PublicSnapshot,
    level:    LevelId,
    dt:       f64,
) {
    for agent in snapshot.agents() {
        let Ok(state) = store.public_mut(agent, level) else {
            continue; // removed this tick
        };
        let Some(v) = state.downcast_mut::<VehiclePublicMicro>() else {
            continue;
        };

        let lane = network.and_then(|n| n.lane(v.lane).ok());
        let cap = lane
            .map(|l| l.speed_limit * SPEED_CAP_FACTOR)
            .unwrap_or(f64::INFINITY);

        v.speed = (v.speed + v.accel * dt).clamp(0.0, cap);
        v.pos += v.speed * dt;

        if let Some(lane) = lane {
            let (pos, clamped) = lane.normalize(v.pos);
            v.pos = pos;
            v.position = lane.position_at(pos);
            v.heading = lane.heading_at(pos);
            if clamped {
                probe.on_event(&SimEvent::TopologyClamped { agent, level });
            }
        }
    }
}

/// Enforce lane sortedness and the no-overlap invariant: a follower may not
/// poke past its leader's rear bumper; violators are pushed back and slowed
/// to the leader's speed.
fn clamp_overlaps(store: &mut StateStore, level: LevelId) {
    let mut lanes: BTreeMap<LaneId, Vec<(AgentId, f64)>> = BTreeMap::new();
    for (agent, lane, pos, _) in occupancy(store, level) {
        lanes.entry(lane).or_default().push((agent, pos));
    }

    for (_, mut members) in lanes {
        members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        // Front to rear so corrections cascade backwards.
        for i in (0..members.len().saturating_sub(1)).rev() {
            let (front_agent, _) = members[i + 1];
            let Some((front_pos, front_len, front_speed)) = store
                .get_public(front_agent, level)
                .ok()
                .and_then(|s| s.downcast_ref::<VehiclePublicMicro>())
                .map(|v| (v.pos, v.length, v.speed))
            else {
                continue;
            };

            let (rear_agent, _) = members[i];
            if let Ok(state) = store.public_mut(rear_agent, level)
                && let Some(v) = state.downcast_mut::<VehiclePublicMicro>()
                && v.pos > front_pos - front_len + OVERLAP_EPS
            {
                v.pos = front_pos - front_len;
                v.speed = v.speed.min(front_speed);
                members[i].1 = v.pos;
            }
        }
    }
}

impl Reactor for MicroReactor {
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
        let network: Option<&RoadNetwork> = ctx
            .env
            .as_deref()
            .and_then(|e| e.downcast_ref::<RoadEnvironment>())
            .map(|e| &e.network);
        let probe = &mut *ctx.probe;

        let mut leftovers = Vec::new();

        // Stop beats any ChangeSpeed in the same batch.
        let stopped: Vec<AgentId> = regular
            .iter()
            .filter_map(|i| match i.payload {
                Payload::Stop { target } => Some(target),
                _ => None,
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
                Payload::ChangeLane { target, direction } => {
                    if let Some(network) = network {
                        apply_lane_change(probe, store, network, level, target, direction);
                    }
                }
                Payload::ChangeAcceleration { target, da } => {
                    if let Ok(state) = store.public_mut(target, level)
                        && let Some(v) = state.downcast_mut::<VehiclePublicMicro>()
                    {
                        v.accel = da; // last write wins
                    }
                }
                Payload::ChangeSpeed { target, ds } => {
                    if !stopped.contains(&target)
                        && let Ok(state) = store.public_mut(target, level)
                        && let Some(v) = state.downcast_mut::<VehiclePublicMicro>()
                    {
                        v.speed = (v.speed + ds).max(0.0);
                    }
                }
                Payload::Stop { target } => {
                    if let Ok(state) = store.public_mut(target, level)
                        && let Some(v) = state.downcast_mut::<VehiclePublicMicro>()
                    {
                        v.speed = 0.0;
                        v.accel = v.accel.min(0.0);
                    }
                }
                // Not a microscopic concern — hand it back to the scheduler.
                _ => leftovers.push(influence),
            }
        }

        if natural
            .iter()
            .any(|i| matches!(i.payload, Payload::AgentPositionUpdate))
        {
            integrate(probe, store, network, snapshot, level, dt);
            clamp_overlaps(store, level);
        }
        // The pheromone trigger is consumed as a no-op: no fields here.

        Ok(leftovers)
    }
}
