//! The vehicle record and its slot arena.

use mls_core::{LaneId, VehicleId};

use crate::error::{RoadError, RoadResult};

/// One vehicle in the arena representation used by lane-local simulations.
///
/// Kinematic state is SI: meters, meters per second.  `label` carries the
/// externally meaningful name (materialized vehicles are labelled
/// `"{lane}_v{n}"`); identity for all lookups is the arena [`VehicleId`].
#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id:        VehicleId,
    pub label:     String,
    pub lane:      LaneId,
    /// Longitudinal position of the front bumper along the lane.
    pub pos:       f64,
    pub speed:     f64,
    pub accel:     f64,
    pub length:    f64,
    pub max_accel: f64,
    pub max_decel: f64,
}

impl Vehicle {
    /// A stationary 5 m car with ordinary dynamic limits.
    pub fn new(label: impl Into<String>, lane: LaneId, pos: f64, speed: f64) -> Self {
        Self {
            id: VehicleId::INVALID, // assigned on arena insert
            label: label.into(),
            lane,
            pos,
            speed,
            accel: 0.0,
            length: 5.0,
            max_accel: 2.0,
            max_decel: 8.0,
        }
    }
}

/// Slot arena with a free list: stable ids, O(1) insert/remove/lookup.
#[derive(Clone, Debug, Default)]
pub struct VehicleArena {
    slots: Vec<Option<Vehicle>>,
    free:  Vec<VehicleId>,
    len:   usize,
}

impl VehicleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vehicle, assigning (and returning) its id.
    pub fn insert(&mut self, mut vehicle: Vehicle) -> VehicleId {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(None);
                VehicleId(self.slots.len() as u32 - 1)
            }
        };
        vehicle.id = id;
        self.slots[id.index()] = Some(vehicle);
        self.len += 1;
        id
    }

    pub fn get(&self, id: VehicleId) -> RoadResult<&Vehicle> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_ref())
            .ok_or(RoadError::UnknownVehicle(id))
    }

    pub fn get_mut(&mut self, id: VehicleId) -> RoadResult<&mut Vehicle> {
        self.slots
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or(RoadError::UnknownVehicle(id))
    }

    /// Remove and return a vehicle; its slot is recycled.  Removing an
    /// absent id returns `None`.
    pub fn remove(&mut self, id: VehicleId) -> Option<Vehicle> {
        let slot = self.slots.get_mut(id.index())?;
        let vehicle = slot.take()?;
        self.free.push(id);
        self.len -= 1;
        Some(vehicle)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.slots.get(id.index()).is_some_and(|s| s.is_some())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live vehicles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }
}
