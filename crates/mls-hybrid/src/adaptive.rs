//! The adaptive simulator: per-lane mode control, conversion, and updates.

use std::collections::BTreeMap;
use std::time::Instant;

use mls_core::{LaneId, VehicleId};
use mls_macro::LwrGrid;
use mls_micro::CarFollowing;
use mls_road::{RoadNetwork, Vehicle, VehicleArena};

use crate::config::{HybridConfig, INTERSECTION_LENGTH_M};
use crate::error::{HybridError, HybridResult};
use crate::state::{LaneMode, LaneState, Statistics, StoredVehicle, MACRO_COST_RATIO};

/// Tolerance on the no-overlap invariant.
const OVERLAP_EPS: f64 = 1e-6;

/// Speed ceiling factor over the lane limit in micro updates.
const SPEED_CAP_FACTOR: f64 = 1.1;

/// Runs every registered lane in whichever representation currently fits
/// it, switching representations under the [`HybridConfig`] policy.
///
/// Owns the road network and vehicle arena outright: during a conversion no
/// other code can observe a lane half-converted.
pub struct AdaptiveSimulator {
    config:  HybridConfig,
    network: RoadNetwork,
    arena:   VehicleArena,
    states:  BTreeMap<LaneId, LaneState>,
}

impl AdaptiveSimulator {
    pub fn new(network: RoadNetwork, config: HybridConfig) -> Self {
        Self {
            config,
            network,
            arena: VehicleArena::new(),
            states: BTreeMap::new(),
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn arena(&self) -> &VehicleArena {
        &self.arena
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    // ── Seeding ───────────────────────────────────────────────────────────

    /// Insert a vehicle onto a (micro) lane.
    pub fn add_vehicle(
        &mut self,
        label: impl Into<String>,
        lane:  LaneId,
        pos:   f64,
        speed: f64,
    ) -> HybridResult<VehicleId> {
        if let Some(state) = self.states.get(&lane)
            && state.mode != LaneMode::Micro
        {
            return Err(HybridError::Inconsistent(
                lane,
                "cannot place an individual vehicle on a macro lane",
            ));
        }
        let id = self.arena.insert(Vehicle::new(label, lane, pos, speed));
        self.network.insert_vehicle(lane, id, &self.arena)?;
        if let Some(state) = self.states.get_mut(&lane) {
            state.vehicles = self.network.lane(lane)?.vehicles.clone();
        }
        Ok(id)
    }

    // ── Registration and pinning ──────────────────────────────────────────

    /// Put a lane under hybrid control, starting microscopic.
    ///
    /// `pinned` lanes never switch automatically; short-road and ramp
    /// heuristics may pin a lane regardless, per the config.
    pub fn register_lane(&mut self, lane: LaneId, pinned: bool) -> HybridResult<()> {
        if self.states.contains_key(&lane) {
            return Err(HybridError::AlreadyRegistered(lane));
        }
        let vehicles = self.network.lane(lane)?.vehicles.clone();
        let pinned = pinned || is_critical(&self.network, lane, &self.config)?;
        self.states.insert(
            lane,
            LaneState {
                lane,
                mode: LaneMode::Micro,
                vehicles,
                lwr: None,
                stored: Vec::new(),
                density: 0.0,
                avg_speed: 0.0,
                flow: 0.0,
                vehicle_count: 0,
                last_update_ms: 0.0,
                // A fresh lane has no previous transition to stabilize
                // after: allow switching from the first update on.
                frames_since_transition: self.config.frames_stable,
                pinned,
            },
        );
        Ok(())
    }

    /// Force a lane micro (converting if needed) and pin it there.
    pub fn pin_micro(&mut self, lane: LaneId) -> HybridResult<()> {
        let state = self
            .states
            .get_mut(&lane)
            .ok_or(HybridError::UnknownLane(lane))?;
        if state.mode == LaneMode::Macro {
            to_micro(state, &mut self.network, &mut self.arena)?;
        }
        state.pinned = true;
        Ok(())
    }

    /// Force a lane macro (converting if needed) and pin it there.
    pub fn pin_macro(&mut self, lane: LaneId) -> HybridResult<()> {
        let config = self.config;
        let state = self
            .states
            .get_mut(&lane)
            .ok_or(HybridError::UnknownLane(lane))?;
        if state.mode == LaneMode::Micro {
            to_macro(state, &mut self.network, &mut self.arena, &config)?;
        }
        state.pinned = true;
        Ok(())
    }

    /// Return a lane to automatic control (heuristic pins may remain).
    pub fn unpin(&mut self, lane: LaneId) -> HybridResult<()> {
        let auto_pin = is_critical(&self.network, lane, &self.config)?;
        let state = self
            .states
            .get_mut(&lane)
            .ok_or(HybridError::UnknownLane(lane))?;
        state.pinned = auto_pin;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn mode(&self, lane: LaneId) -> HybridResult<LaneMode> {
        self.states
            .get(&lane)
            .map(|s| s.mode)
            .ok_or(HybridError::UnknownLane(lane))
    }

    pub fn lane_state(&self, lane: LaneId) -> HybridResult<&LaneState> {
        self.states.get(&lane).ok_or(HybridError::UnknownLane(lane))
    }

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            total_lanes: self.states.len(),
            ..Statistics::default()
        };
        for state in self.states.values() {
            match state.mode {
                LaneMode::Micro         => stats.micro_lanes += 1,
                LaneMode::Macro         => stats.macro_lanes += 1,
                LaneMode::Transitioning => stats.transitioning_lanes += 1,
            }
            stats.total_vehicles += state.vehicle_count;
            stats.avg_density += state.density;
            stats.total_update_ms += state.last_update_ms;
        }
        if stats.total_lanes > 0 {
            stats.avg_density /= stats.total_lanes as f64;
            let equivalent =
                stats.micro_lanes as f64 + stats.macro_lanes as f64 * MACRO_COST_RATIO;
            stats.speedup_factor = equivalent / stats.total_lanes as f64;
        } else {
            stats.speedup_factor = 1.0;
        }
        stats
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Advance every lane by `dt` seconds, switching representations where
    /// the policy demands it.
    pub fn update(&mut self, dt: f64, cf: &CarFollowing) -> HybridResult<()> {
        let lanes: Vec<LaneId> = self.states.keys().copied().collect();
        for lane in lanes {
            let Some(state) = self.states.get_mut(&lane) else {
                continue;
            };
            let start = Instant::now();

            update_metrics(state, &self.network, &self.arena)?;

            if should_switch(state, &self.config) {
                match state.mode {
                    LaneMode::Micro => {
                        to_macro(state, &mut self.network, &mut self.arena, &self.config)?
                    }
                    LaneMode::Macro => to_micro(state, &mut self.network, &mut self.arena)?,
                    LaneMode::Transitioning => {}
                }
            }

            match state.mode {
                LaneMode::Micro => {
                    update_micro(state, &mut self.network, &mut self.arena, cf, dt)?
                }
                LaneMode::Macro => update_macro(state, dt)?,
                LaneMode::Transitioning => {
                    return Err(HybridError::Inconsistent(
                        lane,
                        "lane left mid-transition",
                    ));
                }
            }

            state.last_update_ms = start.elapsed().as_secs_f64() * 1e3;
            state.frames_since_transition = state.frames_since_transition.saturating_add(1);
        }
        Ok(())
    }
}

// ── Policy ────────────────────────────────────────────────────────────────────

fn is_critical(network: &RoadNetwork, lane: LaneId, config: &HybridConfig) -> HybridResult<bool> {
    let lane = network.lane(lane)?;
    let road = network.road(lane.road)?;
    if config.pin_intersections && road.length < INTERSECTION_LENGTH_M {
        return Ok(true);
    }
    if config.pin_ramps && road.name.contains("ramp") {
        return Ok(true);
    }
    Ok(false)
}

fn should_switch(state: &LaneState, config: &HybridConfig) -> bool {
    if state.pinned || state.frames_since_transition < config.frames_stable {
        return false;
    }
    match state.mode {
        LaneMode::Micro => {
            state.density > config.rho_hi
                || state.vehicle_count > config.count_hi
                || state.last_update_ms > config.budget_ms
        }
        LaneMode::Macro => {
            state.density < config.rho_lo / config.hysteresis
                && state.vehicle_count < config.count_lo
        }
        LaneMode::Transitioning => false,
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────────

pub(crate) fn update_metrics(
    state:   &mut LaneState,
    network: &RoadNetwork,
    arena:   &VehicleArena,
) -> HybridResult<()> {
    match state.mode {
        LaneMode::Micro => {
            let lane = network.lane(state.lane)?;
            let mut total_speed = 0.0;
            for &vid in &lane.vehicles {
                let vehicle = arena.get(vid).map_err(|_| {
                    HybridError::Inconsistent(state.lane, "lane lists a vehicle the arena lost")
                })?;
                total_speed += vehicle.speed;
            }
            let count = lane.vehicles.len();
            state.vehicle_count = count;
            state.density = count as f64 / lane.length;
            state.avg_speed = if count > 0 { total_speed / count as f64 } else { 0.0 };
            state.flow = state.density * state.avg_speed;
            state.vehicles = lane.vehicles.clone();
        }
        LaneMode::Macro => {
            let grid = state.lwr.as_ref().ok_or(HybridError::Inconsistent(
                state.lane,
                "macro metrics requested without a grid",
            ))?;
            let n = grid.num_cells();
            let mut density = 0.0;
            let mut speed = 0.0;
            let mut flow = 0.0;
            for i in 0..n {
                density += grid.density(i);
                speed += grid.speed(i);
                flow += grid.flow(i);
            }
            state.density = density / n as f64;
            state.avg_speed = speed / n as f64;
            state.flow = flow / n as f64;
            state.vehicle_count = grid.total_vehicles().round() as usize;
        }
        LaneMode::Transitioning => {}
    }
    Ok(())
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Absorb a lane's vehicles into a fresh density grid.
///
/// Cell densities come straight from vehicle counts, so the total mass
/// equals the vehicle count exactly (up to the jam-density clamp).  Vehicle
/// attributes are preserved in the sidecar, rear to front.
pub(crate) fn to_macro(
    state:   &mut LaneState,
    network: &mut RoadNetwork,
    arena:   &mut VehicleArena,
    config:  &HybridConfig,
) -> HybridResult<()> {
    state.mode = LaneMode::Transitioning;

    let (length, speed_limit) = {
        let lane = network.lane(state.lane)?;
        (lane.length, lane.speed_limit)
    };
    let mut grid = LwrGrid::new(speed_limit, config.rho_jam, length, config.macro_num_cells);
    let cell_len = grid.cell_length();
    let cells = grid.num_cells();

    let members = network.lane(state.lane)?.vehicles.clone();
    let mut counts = vec![0usize; cells];
    for &vid in &members {
        let vehicle = arena.get(vid)?;
        let cell = ((vehicle.pos / cell_len) as usize).min(cells - 1);
        counts[cell] += 1;
    }
    for (i, &count) in counts.iter().enumerate() {
        grid.set_density(i, count as f64 / cell_len);
    }

    // Vehicles become density; their identities wait in the sidecar.
    state.stored.clear();
    for &vid in &members {
        if let Some(vehicle) = arena.remove(vid) {
            state.stored.push(StoredVehicle {
                label:     vehicle.label,
                length:    vehicle.length,
                max_accel: vehicle.max_accel,
                max_decel: vehicle.max_decel,
            });
        }
    }
    network.lane_mut(state.lane)?.vehicles.clear();

    state.vehicles.clear();
    state.lwr = Some(grid);
    state.mode = LaneMode::Macro;
    state.frames_since_transition = 0;
    Ok(())
}

/// Materialize vehicles from the density grid, cell by cell.
///
/// Each cell emits `round(ρᵢ · L_cell)` vehicles, evenly spaced, at the
/// cell's diagram speed.  Sidecar attributes are reused in order; fresh
/// vehicles are labelled `{lane}_v{n}`.  If rounding would drop everything
/// while at least half a vehicle of mass exists, one vehicle is still
/// created.
pub(crate) fn to_micro(
    state:   &mut LaneState,
    network: &mut RoadNetwork,
    arena:   &mut VehicleArena,
) -> HybridResult<()> {
    let grid = state.lwr.take().ok_or(HybridError::Inconsistent(
        state.lane,
        "demotion requested without a grid",
    ))?;
    state.mode = LaneMode::Transitioning;

    let cell_len = grid.cell_length();
    let mut stored = std::mem::take(&mut state.stored).into_iter();
    let mut fresh = 0u64;
    let mut created = 0usize;

    for cell in 0..grid.num_cells() {
        let exact = grid.density(cell) * cell_len;
        let k = exact.round() as usize;
        let speed = grid.speed(cell);
        for j in 0..k {
            let pos = (cell as f64 + (j as f64 + 0.5) / k as f64) * cell_len;
            materialize(state.lane, pos, speed, &mut stored, &mut fresh, network, arena)?;
            created += 1;
        }
    }

    // Rounding must not erase a lane that still carries real mass.
    if created == 0 && grid.total_vehicles() >= 0.5 {
        let densest = (0..grid.num_cells())
            .max_by(|&a, &b| {
                grid.density(a)
                    .partial_cmp(&grid.density(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        let pos = (densest as f64 + 0.5) * cell_len;
        materialize(state.lane, pos, grid.speed(densest), &mut stored, &mut fresh, network, arena)?;
    }

    state.vehicles = network.lane(state.lane)?.vehicles.clone();
    state.mode = LaneMode::Micro;
    state.frames_since_transition = 0;
    Ok(())
}

/// Bring one vehicle back from density, reusing sidecar attributes in
/// insertion order and minting `{lane}_v{n}` labels once they run out.
fn materialize(
    lane:    LaneId,
    pos:     f64,
    speed:   f64,
    stored:  &mut std::vec::IntoIter<StoredVehicle>,
    fresh:   &mut u64,
    network: &mut RoadNetwork,
    arena:   &mut VehicleArena,
) -> HybridResult<()> {
    let vehicle = match stored.next() {
        Some(attrs) => {
            let mut v = Vehicle::new(attrs.label, lane, pos, speed);
            v.length = attrs.length;
            v.max_accel = attrs.max_accel;
            v.max_decel = attrs.max_decel;
            v
        }
        None => {
            let label = format!("{}_v{}", lane.0, fresh);
            *fresh += 1;
            Vehicle::new(label, lane, pos, speed)
        }
    };
    let id = arena.insert(vehicle);
    network.insert_vehicle(lane, id, arena)?;
    Ok(())
}

// ── Mode updates ──────────────────────────────────────────────────────────────

/// IDM pass over the lane's sorted vehicles, then kinematics and the
/// overlap clamp.
fn update_micro(
    state:   &mut LaneState,
    network: &mut RoadNetwork,
    arena:   &mut VehicleArena,
    cf:      &CarFollowing,
    dt:      f64,
) -> HybridResult<()> {
    let (members, length, speed_limit) = {
        let lane = network.lane(state.lane)?;
        (lane.vehicles.clone(), lane.length, lane.speed_limit)
    };
    let cap = speed_limit * SPEED_CAP_FACTOR;

    // Acceleration pass against the pre-update state.
    let mut accels = Vec::with_capacity(members.len());
    for (idx, &vid) in members.iter().enumerate() {
        let vehicle = arena.get(vid)?;
        let leader = match members.get(idx + 1) {
            Some(&lid) => {
                let l = arena.get(lid)?;
                Some((l.pos - vehicle.pos - l.length, vehicle.speed - l.speed))
            }
            None => None,
        };
        accels.push(cf.acceleration(vehicle.speed, leader));
    }

    // Kinematics pass.
    for (&vid, &accel) in members.iter().zip(accels.iter()) {
        let vehicle = arena.get_mut(vid)?;
        vehicle.accel = accel.clamp(-vehicle.max_decel, vehicle.max_accel);
        vehicle.speed = (vehicle.speed + vehicle.accel * dt).clamp(0.0, cap);
        vehicle.pos = (vehicle.pos + vehicle.speed * dt).rem_euclid(length);
    }
    network.resort_lane(state.lane, arena)?;

    // No-overlap clamp, front to rear.
    let members = network.lane(state.lane)?.vehicles.clone();
    for i in (0..members.len().saturating_sub(1)).rev() {
        let (front_pos, front_len, front_speed) = {
            let front = arena.get(members[i + 1])?;
            (front.pos, front.length, front.speed)
        };
        let rear = arena.get_mut(members[i])?;
        if rear.pos > front_pos - front_len + OVERLAP_EPS {
            rear.pos = front_pos - front_len;
            rear.speed = rear.speed.min(front_speed);
        }
    }

    state.vehicles = members;
    Ok(())
}

pub(crate) fn update_macro(state: &mut LaneState, dt: f64) -> HybridResult<()> {
    let grid = state.lwr.as_mut().ok_or(HybridError::Inconsistent(
        state.lane,
        "macro update requested without a grid",
    ))?;
    grid.step(dt);
    Ok(())
}
