//! Lighthill-Whitham-Richards model with a Godunov update.
//!
//! Density per cell; the Greenshields diagram `v(ρ) = v_f (1 − ρ/ρ_jam)`
//! gives speed and flow.  Boundary fluxes use the demand/supply form of the
//! exact Riemann solution for a concave diagram, so the scheme is
//! conservative and handles shocks and rarefactions without special cases.
//!
//! Stability: callers must respect the CFL condition `v_f · dt ≤ L_cell`.

/// A periodic density grid over one lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LwrGrid {
    v_free:      f64,
    rho_jam:     f64,
    length:      f64,
    cell_length: f64,
    density:     Vec<f64>,
    /// Double buffer for the update sweep.
    scratch:     Vec<f64>,
}

impl LwrGrid {
    /// A zero-density grid of `num_cells` cells over `length` meters.
    pub fn new(v_free: f64, rho_jam: f64, length: f64, num_cells: usize) -> Self {
        let num_cells = num_cells.max(1);
        Self {
            v_free,
            rho_jam,
            length,
            cell_length: length / num_cells as f64,
            density: vec![0.0; num_cells],
            scratch: vec![0.0; num_cells],
        }
    }

    // ── Fundamental diagram ───────────────────────────────────────────────

    /// Greenshields speed: `v_f (1 − ρ/ρ_jam)`, exactly 0 at (or above) jam.
    pub fn speed_from_density(&self, rho: f64) -> f64 {
        if rho >= self.rho_jam {
            return 0.0;
        }
        self.v_free * (1.0 - rho / self.rho_jam)
    }

    /// Flow `q(ρ) = ρ · v(ρ)`.
    pub fn flow_from_density(&self, rho: f64) -> f64 {
        rho * self.speed_from_density(rho)
    }

    /// The density of maximum flow: `ρ_jam / 2` under Greenshields.
    pub fn critical_density(&self) -> f64 {
        self.rho_jam / 2.0
    }

    /// Capacity `q_max = q(ρ_crit)`.
    pub fn max_flow(&self) -> f64 {
        self.flow_from_density(self.critical_density())
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn num_cells(&self) -> usize {
        self.density.len()
    }

    pub fn cell_length(&self) -> f64 {
        self.cell_length
    }

    pub fn lane_length(&self) -> f64 {
        self.length
    }

    pub fn v_free(&self) -> f64 {
        self.v_free
    }

    pub fn rho_jam(&self) -> f64 {
        self.rho_jam
    }

    pub fn density(&self, cell: usize) -> f64 {
        self.density.get(cell).copied().unwrap_or(0.0)
    }

    pub fn speed(&self, cell: usize) -> f64 {
        self.speed_from_density(self.density(cell))
    }

    pub fn flow(&self, cell: usize) -> f64 {
        self.flow_from_density(self.density(cell))
    }

    pub fn densities(&self) -> &[f64] {
        &self.density
    }

    /// Set a cell's density, clamped into `[0, ρ_jam]`.
    pub fn set_density(&mut self, cell: usize, rho: f64) {
        if let Some(slot) = self.density.get_mut(cell) {
            *slot = rho.clamp(0.0, self.rho_jam);
        }
    }

    /// Total vehicle mass on the grid: `Σ ρᵢ · L_cell`.
    pub fn total_vehicles(&self) -> f64 {
        self.density.iter().sum::<f64>() * self.cell_length
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Godunov flux across a boundary: `min(demand(ρ_l), supply(ρ_r))`.
    fn boundary_flux(&self, rho_left: f64, rho_right: f64) -> f64 {
        let rho_c = self.critical_density();
        let demand = if rho_left <= rho_c {
            self.flow_from_density(rho_left)
        } else {
            self.max_flow()
        };
        let supply = if rho_right >= rho_c {
            self.flow_from_density(rho_right)
        } else {
            self.max_flow()
        };
        demand.min(supply)
    }

    /// One conservative step of `dt` seconds, periodic boundary.
    pub fn step(&mut self, dt: f64) {
        let n = self.density.len();
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let inflow = self.boundary_flux(self.density[prev], self.density[i]);
            let outflow = self.boundary_flux(self.density[i], self.density[next]);
            self.scratch[i] = (self.density[i] - (dt / self.cell_length) * (outflow - inflow))
                .clamp(0.0, self.rho_jam);
        }
        std::mem::swap(&mut self.density, &mut self.scratch);
    }
}
