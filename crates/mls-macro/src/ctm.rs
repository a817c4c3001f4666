//! Daganzo's Cell Transmission Model.
//!
//! State is vehicles per cell.  Each boundary moves
//! `min(sending(upstream), receiving(downstream))` vehicles per step, which
//! makes the scheme conservative by construction on the periodic lane.
//!
//! The triangular fundamental diagram is fixed by `(v_free, wave_speed,
//! ρ_jam)`: `ρ_crit = ρ_jam · w / (v_f + w)` and `q_max = ρ_crit · v_f`.

/// A periodic vehicles-per-cell grid over one lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CtmGrid {
    v_free:      f64,
    wave_speed:  f64,
    rho_jam:     f64,
    cell_length: f64,
    rho_crit:    f64,
    q_max:       f64,
    vehicles:    Vec<f64>,
    flows:       Vec<f64>,
}

impl CtmGrid {
    pub fn new(
        v_free:     f64,
        wave_speed: f64,
        rho_jam:    f64,
        length:     f64,
        num_cells:  usize,
    ) -> Self {
        let num_cells = num_cells.max(1);
        let rho_crit = rho_jam * wave_speed / (v_free + wave_speed);
        Self {
            v_free,
            wave_speed,
            rho_jam,
            cell_length: length / num_cells as f64,
            rho_crit,
            q_max: rho_crit * v_free,
            vehicles: vec![0.0; num_cells],
            flows: vec![0.0; num_cells],
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn num_cells(&self) -> usize {
        self.vehicles.len()
    }

    pub fn cell_length(&self) -> f64 {
        self.cell_length
    }

    pub fn critical_density(&self) -> f64 {
        self.rho_crit
    }

    pub fn max_flow(&self) -> f64 {
        self.q_max
    }

    pub fn wave_speed(&self) -> f64 {
        self.wave_speed
    }

    /// Vehicles a single cell can hold: `ρ_jam · L_cell`.
    pub fn cell_capacity(&self) -> f64 {
        self.rho_jam * self.cell_length
    }

    pub fn vehicles_in(&self, cell: usize) -> f64 {
        self.vehicles.get(cell).copied().unwrap_or(0.0)
    }

    pub fn density(&self, cell: usize) -> f64 {
        self.vehicles_in(cell) / self.cell_length
    }

    /// Speed from the triangular diagram: `v_f` below critical, wave-
    /// limited above.
    pub fn speed(&self, cell: usize) -> f64 {
        let rho = self.density(cell);
        if rho <= self.rho_crit {
            self.v_free
        } else if rho >= self.rho_jam {
            0.0
        } else {
            self.wave_speed * (self.rho_jam - rho) / rho
        }
    }

    pub fn set_vehicles(&mut self, cell: usize, n: f64) {
        let cap = self.cell_capacity();
        if let Some(slot) = self.vehicles.get_mut(cell) {
            *slot = n.clamp(0.0, cap);
        }
    }

    pub fn total_vehicles(&self) -> f64 {
        self.vehicles.iter().sum()
    }

    // ── Update ────────────────────────────────────────────────────────────

    /// Vehicles the cell can send downstream in `dt`.
    fn sending(&self, n: f64, dt: f64) -> f64 {
        n.min(self.q_max * dt)
    }

    /// Vehicles the cell can accept in `dt`.
    fn receiving(&self, n: f64, dt: f64) -> f64 {
        (self.cell_capacity() - n).min(self.q_max * dt)
    }

    /// One sending/receiving step of `dt` seconds, periodic boundary.
    pub fn step(&mut self, dt: f64) {
        let n = self.vehicles.len();
        // flows[i] crosses the boundary from cell i into cell (i+1) % n.
        for i in 0..n {
            let next = (i + 1) % n;
            self.flows[i] = self
                .sending(self.vehicles[i], dt)
                .min(self.receiving(self.vehicles[next], dt));
        }
        for i in 0..n {
            let prev = (i + n - 1) % n;
            self.vehicles[i] += self.flows[prev] - self.flows[i];
        }
    }
}
