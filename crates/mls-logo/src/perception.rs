//! Turtle perception: nearby turtles and the local pheromone field.

use std::any::Any;
use std::sync::Arc;

use mls_core::math::{angle_diff, normalize_angle};
use mls_core::{AgentId, Period, PheromoneId, Point2D};
use mls_kernel::{
    AgentCategory, Environment, LocalState, PerceivedData, PerceptionModel, PublicSnapshot,
};

use crate::env::LogoEnv;
use crate::state::TurtlePublic;

/// Another turtle as seen by the perceiving one.
#[derive(Clone, Debug)]
pub struct PerceivedTurtle {
    pub agent:    AgentId,
    pub category: Arc<AgentCategory>,
    pub location: Point2D,
    pub heading:  f64,
    pub speed:    f64,
    /// Torus-aware distance from the perceiver.
    pub distance: f64,
    /// Absolute bearing from the perceiver, in `[0, 2π)`.
    pub bearing:  f64,
    /// Signed turn from the perceiver's heading to the neighbor, in
    /// `(-π, π]` — the angle to feed a `ChangeDirection` to face it.
    pub relative_bearing: f64,
}

/// A turtle's frozen view for one tick.
#[derive(Clone, Debug)]
pub struct TurtlePerceived {
    pub period:  Period,
    pub nearby:  Vec<PerceivedTurtle>,
    /// Amount of each registered pheromone on the perceiver's patch.
    pub patch_pheromones: Vec<(PheromoneId, f64)>,
}

impl PerceivedData for TurtlePerceived {
    fn period(&self) -> Period {
        self.period
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Perceives every turtle within `range` patches (torus-aware) plus the
/// pheromone amounts on the own patch.
pub struct LogoPerception {
    pub range: f64,
}

impl LogoPerception {
    pub fn new(range: f64) -> Self {
        Self { range }
    }
}

impl PerceptionModel for LogoPerception {
    fn perceive(
        &self,
        period:   Period,
        agent:    AgentId,
        snapshot: &PublicSnapshot,
        _private: &dyn LocalState,
        env:      Option<&dyn Environment>,
    ) -> Box<dyn PerceivedData> {
        let mut perceived = TurtlePerceived {
            period,
            nearby: Vec::new(),
            patch_pheromones: Vec::new(),
        };
        let Some(me) = snapshot
            .get(agent)
            .and_then(|s| s.downcast_ref::<TurtlePublic>())
        else {
            return Box::new(perceived);
        };
        let env = env.and_then(|e| e.downcast_ref::<LogoEnv>());

        for (id, entry) in snapshot.iter() {
            if id == agent {
                continue;
            }
            let Some(other) = entry.state.downcast_ref::<TurtlePublic>() else {
                continue;
            };
            let distance = match env {
                Some(env) => env.distance(me.location, other.location),
                None      => me.location.distance(other.location),
            };
            if distance > self.range {
                continue;
            }
            let d = other.location - me.location;
            let bearing = normalize_angle(d.y.atan2(d.x));
            perceived.nearby.push(PerceivedTurtle {
                agent:    id,
                category: Arc::clone(&entry.category),
                location: other.location,
                heading:  other.heading,
                speed:    other.speed,
                distance,
                bearing,
                relative_bearing: angle_diff(me.heading, bearing),
            });
        }

        if let Some(env) = env {
            let (x, y) = env.patch_of(me.location);
            perceived.patch_pheromones = env
                .pheromone_ids()
                .map(|p| (p, env.pheromone_at(p, x, y)))
                .collect();
        }

        Box::new(perceived)
    }
}
