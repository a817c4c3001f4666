//! The Logo grid environment: pheromone fields and marks over a patch grid.

use std::any::Any;

use mls_core::{MarkId, PheromoneId, Point2D};
use mls_kernel::{Environment, Mark};
use rustc_hash::FxHashMap;

use crate::error::{LogoError, LogoResult};

// ── Pheromone ─────────────────────────────────────────────────────────────────

/// A pheromone kind with its field dynamics.
#[derive(Clone, Debug)]
pub struct Pheromone {
    pub id:            PheromoneId,
    pub name:          String,
    /// Fraction of a patch's amount spread to its neighbors per second.
    pub diffusion:     f64,
    /// Exponential decay rate per second.
    pub evaporation:   f64,
    /// Initial amount on every patch.
    pub default_value: f64,
    /// Amounts never fall below this floor.
    pub min_value:     f64,
}

struct Field {
    values:  Vec<f64>,
    scratch: Vec<f64>,
}

// ── LogoEnv ───────────────────────────────────────────────────────────────────

/// A `width × height` patch grid, toroidal or bounded, carrying one scalar
/// field per registered pheromone plus a set of marks keyed by identity.
pub struct LogoEnv {
    width:      usize,
    height:     usize,
    toroidal:   bool,
    pheromones: Vec<Pheromone>,
    fields:     Vec<Field>,
    marks:      FxHashMap<MarkId, Mark>,
}

impl LogoEnv {
    pub fn new(width: usize, height: usize, toroidal: bool) -> LogoResult<Self> {
        if width == 0 || height == 0 {
            return Err(LogoError::EmptyGrid { width, height });
        }
        Ok(Self {
            width,
            height,
            toroidal,
            pheromones: Vec::new(),
            fields: Vec::new(),
            marks: FxHashMap::default(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_toroidal(&self) -> bool {
        self.toroidal
    }

    // ── Topology ──────────────────────────────────────────────────────────

    /// Resolve a continuous position per the grid topology.
    ///
    /// Returns the normalized point and whether a clamp occurred (bounded
    /// grids only).
    pub fn normalize(&self, p: Point2D) -> (Point2D, bool) {
        let (w, h) = (self.width as f64, self.height as f64);
        if self.toroidal {
            (Point2D::new(p.x.rem_euclid(w), p.y.rem_euclid(h)), false)
        } else {
            let clamped_x = p.x.clamp(0.0, w - 1e-9);
            let clamped_y = p.y.clamp(0.0, h - 1e-9);
            let clamped = clamped_x != p.x || clamped_y != p.y;
            (Point2D::new(clamped_x, clamped_y), clamped)
        }
    }

    /// The patch containing a (normalized) position.
    pub fn patch_of(&self, p: Point2D) -> (usize, usize) {
        let x = (p.x.floor() as isize).clamp(0, self.width as isize - 1) as usize;
        let y = (p.y.floor() as isize).clamp(0, self.height as isize - 1) as usize;
        (x, y)
    }

    fn cell_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Torus-aware distance between two points (Euclidean when bounded).
    pub fn distance(&self, a: Point2D, b: Point2D) -> f64 {
        if !self.toroidal {
            return a.distance(b);
        }
        let (w, h) = (self.width as f64, self.height as f64);
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        let dx = dx.min(w - dx);
        let dy = dy.min(h - dy);
        dx.hypot(dy)
    }

    // ── Pheromone fields ──────────────────────────────────────────────────

    /// Register a pheromone kind; every patch starts at its default value.
    pub fn register_pheromone(
        &mut self,
        name:          impl Into<String>,
        diffusion:     f64,
        evaporation:   f64,
        default_value: f64,
        min_value:     f64,
    ) -> LogoResult<PheromoneId> {
        let name = name.into();
        if self.pheromones.iter().any(|p| p.name == name) {
            return Err(LogoError::DuplicatePheromone(name));
        }
        let id = PheromoneId(self.pheromones.len() as u16);
        self.pheromones.push(Pheromone {
            id,
            name,
            diffusion,
            evaporation,
            default_value,
            min_value,
        });
        let cells = self.width * self.height;
        self.fields.push(Field {
            values:  vec![default_value; cells],
            scratch: vec![0.0; cells],
        });
        Ok(id)
    }

    pub fn pheromone(&self, id: PheromoneId) -> LogoResult<&Pheromone> {
        self.pheromones
            .get(id.index())
            .ok_or(LogoError::UnknownPheromone(id))
    }

    pub fn pheromone_ids(&self) -> impl Iterator<Item = PheromoneId> + '_ {
        self.pheromones.iter().map(|p| p.id)
    }

    /// Amount at a patch.  Unregistered pheromones read as 0.
    pub fn pheromone_at(&self, id: PheromoneId, x: usize, y: usize) -> f64 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.fields
            .get(id.index())
            .map(|f| f.values[self.cell_index(x, y)])
            .unwrap_or(0.0)
    }

    /// Add `amount` at the patch containing `location` (normalized first).
    /// Deposits are additive.
    pub fn deposit(&mut self, id: PheromoneId, location: Point2D, amount: f64) {
        let (p, _) = self.normalize(location);
        let (x, y) = self.patch_of(p);
        let index = self.cell_index(x, y);
        if let Some(field) = self.fields.get_mut(id.index()) {
            field.values[index] += amount;
        }
    }

    /// Total amount of one pheromone over the whole grid.
    pub fn total_pheromone(&self, id: PheromoneId) -> f64 {
        self.fields
            .get(id.index())
            .map(|f| f.values.iter().sum())
            .unwrap_or(0.0)
    }

    /// One field-dynamics step: diffusion to the 8-neighborhood, then
    /// exponential evaporation, floored at each pheromone's minimum.
    ///
    /// With zero evaporation the step conserves total amount: each patch
    /// sends `value · diffusion · dt` split equally among its existing
    /// neighbors (toroidal grids always have 8; bounded edges fewer).
    pub fn diffuse_and_evaporate(&mut self, dt: f64) {
        let (w, h) = (self.width as isize, self.height as isize);
        for (pheromone, field) in self.pheromones.iter().zip(self.fields.iter_mut()) {
            let spread = (pheromone.diffusion * dt).clamp(0.0, 1.0);
            let decay = (-pheromone.evaporation * dt).exp();

            field.scratch.copy_from_slice(&field.values);
            if spread > 0.0 {
                for y in 0..h {
                    for x in 0..w {
                        let index = (y * w + x) as usize;
                        let outgoing = field.values[index] * spread;
                        if outgoing == 0.0 {
                            continue;
                        }
                        let mut neighbors: Vec<usize> = Vec::with_capacity(8);
                        for dy in -1..=1isize {
                            for dx in -1..=1isize {
                                if dx == 0 && dy == 0 {
                                    continue;
                                }
                                let (mut nx, mut ny) = (x + dx, y + dy);
                                if self.toroidal {
                                    nx = nx.rem_euclid(w);
                                    ny = ny.rem_euclid(h);
                                } else if nx < 0 || ny < 0 || nx >= w || ny >= h {
                                    continue;
                                }
                                neighbors.push((ny * w + nx) as usize);
                            }
                        }
                        if neighbors.is_empty() {
                            continue;
                        }
                        let share = outgoing / neighbors.len() as f64;
                        field.scratch[index] -= outgoing;
                        for n in neighbors {
                            field.scratch[n] += share;
                        }
                    }
                }
            }
            for value in &mut field.scratch {
                *value = (*value * decay).max(pheromone.min_value);
            }
            std::mem::swap(&mut field.values, &mut field.scratch);
        }
    }

    // ── Marks ─────────────────────────────────────────────────────────────

    /// Place a mark (its location is normalized).  Re-dropping an existing
    /// id moves it.
    pub fn add_mark(&mut self, mut mark: Mark) {
        let (p, _) = self.normalize(mark.location);
        mark.location = p;
        self.marks.insert(mark.id, mark);
    }

    /// Remove a mark by identity.  Absent ids are a no-op.
    pub fn remove_mark(&mut self, id: MarkId) -> bool {
        self.marks.remove(&id).is_some()
    }

    pub fn mark(&self, id: MarkId) -> Option<&Mark> {
        self.marks.get(&id)
    }

    pub fn num_marks(&self) -> usize {
        self.marks.len()
    }

    /// Marks on the patch containing `p`.
    pub fn marks_at(&self, p: Point2D) -> Vec<&Mark> {
        let patch = self.patch_of(p);
        self.marks
            .values()
            .filter(|m| self.patch_of(m.location) == patch)
            .collect()
    }
}

impl Environment for LogoEnv {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
