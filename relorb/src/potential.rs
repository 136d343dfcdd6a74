//! The central potential and its logarithmic radial grid.

use serde::{Deserialize, Serialize};

/// Number of points of the radial grid.
pub const MAX_POINTS: usize = 750;

/// The model central potential: a point-Coulomb nuclear part, a screened
/// core part `Vc(r)` with a tail of asymptotic charge `Z - N + 1`, and the
/// residual part `U(r)` accumulated from the orbital densities.
///
/// A potential is created once per context; the grid is laid down on the
/// first optimization run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Potential {
    pub(crate) z_nucleus: f64,
    pub(crate) n_electrons: f64,
    pub(crate) lambda: f64,
    pub(crate) a: f64,
    pub(crate) r_core: usize,
    pub(crate) grid_set: bool,
    pub(crate) rad: Vec<f64>,
    pub(crate) dr_drho: Vec<f64>,
    pub(crate) z: Vec<f64>,
    pub(crate) vc: Vec<f64>,
    pub(crate) u: Vec<f64>,
    pub(crate) w: Vec<f64>,
    // memory of the previous unscreened accumulation, for damping
    pub(crate) u_accum_prev: Option<Vec<f64>>,
}

impl Potential {
    /// Creates a potential for a nucleus of charge `z_nucleus`. The radial
    /// grid is not laid down yet.
    #[must_use]
    pub fn new(z_nucleus: f64) -> Self {
        Self {
            z_nucleus,
            n_electrons: 0.0,
            lambda: 0.5 * z_nucleus,
            a: 0.0,
            r_core: MAX_POINTS - 5,
            grid_set: false,
            rad: vec![0.0; MAX_POINTS],
            dr_drho: vec![0.0; MAX_POINTS],
            z: vec![z_nucleus; MAX_POINTS],
            vc: vec![0.0; MAX_POINTS],
            u: vec![0.0; MAX_POINTS],
            w: vec![0.0; MAX_POINTS],
            u_accum_prev: None,
        }
    }

    /// Lays down the logarithmic grid between `rmin` and `rmax` (atomic
    /// units).
    pub fn set_radial_grid(&mut self, rmin: f64, rmax: f64) {
        let h = (rmax / rmin).ln() / (MAX_POINTS - 1) as f64;
        for (i, (rad, dr)) in self.rad.iter_mut().zip(&mut self.dr_drho).enumerate() {
            *rad = rmin * (i as f64 * h).exp();
            *dr = *rad * h;
        }
        self.grid_set = true;
    }

    /// Whether the radial grid has been laid down.
    #[must_use]
    pub const fn grid_is_set(&self) -> bool {
        self.grid_set
    }

    /// Sets the effective nuclear charge `Z(r)`, inflated by the fractional
    /// `extra` used to stabilize early self-consistency iterations.
    pub fn set_z(&mut self, extra: f64) {
        let z = self.z_nucleus * (1.0 + extra);
        self.z.fill(z);
    }

    /// Rebuilds the core-screened potential `Vc(r)` from the current
    /// screening parameter.
    pub fn set_vc(&mut self) {
        let screened = (self.n_electrons - 1.0).max(0.0);
        for i in 0..MAX_POINTS {
            let r = self.rad[i];
            self.vc[i] = (-self.z[i] + screened * (1.0 - (-self.lambda * r).exp())) / r;
        }
    }

    /// Clears the residual potential, leaving the bare `Vc(r)`; used when no
    /// occupied orbitals exist yet.
    pub fn set_u_bare(&mut self) {
        self.u.fill(0.0);
        self.u_accum_prev = None;
    }

    /// Installs a freshly accumulated electron-count function `U(r)` (valid
    /// through grid index `jmax`): extends it as a constant, locates the core
    /// radius, damps against the previous iteration, refits the screening
    /// parameter and converts the result into the residual potential.
    pub fn set_u_screened(&mut self, mut u_accum: Vec<f64>, jmax: usize) {
        u_accum[0] = u_accum[1];
        for j in jmax + 1..MAX_POINTS {
            u_accum[j] = u_accum[jmax];
        }

        let mut j = jmax.saturating_sub(5);
        while j > 0 {
            if (u_accum[j] - self.n_electrons + 1.0).abs() > 1e-10 {
                break;
            }
            j -= 1;
        }
        self.r_core = j + 1;

        if let Some(prev) = &self.u_accum_prev {
            for (u, v) in u_accum.iter_mut().zip(prev) {
                *u = 0.5 * (*u + v);
            }
        }
        self.u_accum_prev = Some(u_accum.clone());

        let half = 0.5 * u_accum[MAX_POINTS - 1];
        if let Some(i) = u_accum.iter().position(|&u| u > half) {
            self.lambda = 2.0_f64.ln() / self.rad[i];
        }

        self.set_vc();
        for i in 0..MAX_POINTS {
            self.u[i] = (u_accum[i] - self.z[i] - self.vc[i] * self.rad[i]) / self.rad[i];
        }
    }

    /// The radial grid.
    #[must_use]
    pub fn rad(&self) -> &[f64] {
        &self.rad
    }

    /// The grid measure dr/drho.
    #[must_use]
    pub fn dr_drho(&self) -> &[f64] {
        &self.dr_drho
    }

    /// The total central potential `Vc(r) + U(r)` at grid index `i`.
    #[must_use]
    pub fn v_total(&self, i: usize) -> f64 {
        self.vc[i] + self.u[i]
    }

    /// Residual asymptotic charge seen far outside the core.
    #[must_use]
    pub fn residual_z(&self) -> f64 {
        self.z[MAX_POINTS - 1] - self.n_electrons + 1.0
    }

    /// The largest radius considered reliable for matrix elements.
    #[must_use]
    pub fn r_max(&self) -> f64 {
        self.rad[MAX_POINTS - 10]
    }

    /// Nuclear charge the potential was created with.
    #[must_use]
    pub const fn z_nucleus(&self) -> f64 {
        self.z_nucleus
    }

    /// Total electron count of the current average configuration.
    #[must_use]
    pub const fn n_electrons(&self) -> f64 {
        self.n_electrons
    }

    /// Screening parameter of the core potential.
    #[must_use]
    pub const fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Grid index of the core boundary.
    #[must_use]
    pub const fn r_core(&self) -> usize {
        self.r_core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn grid_is_logarithmic() {
        let mut pot = Potential::new(1.0);
        assert!(!pot.grid_is_set());
        pot.set_radial_grid(1e-5, 1e3);
        assert!(pot.grid_is_set());
        assert_approx_eq!(f64, pot.rad()[0], 1e-5, ulps = 4);
        assert_approx_eq!(f64, pot.rad()[MAX_POINTS - 1], 1e3, epsilon = 1e-9);
        let ratio = pot.rad()[1] / pot.rad()[0];
        for i in 1..MAX_POINTS {
            assert_approx_eq!(f64, pot.rad()[i] / pot.rad()[i - 1], ratio, epsilon = 1e-12);
        }
    }

    #[test]
    fn bare_potential_is_point_coulomb() {
        let mut pot = Potential::new(1.0);
        pot.set_radial_grid(1e-5, 1e3);
        pot.n_electrons = 1.0;
        pot.set_z(0.0);
        pot.set_vc();
        pot.set_u_bare();
        for i in (0..MAX_POINTS).step_by(100) {
            assert_approx_eq!(f64, pot.v_total(i), -1.0 / pot.rad()[i], epsilon = 1e-12);
        }
        assert_approx_eq!(f64, pot.residual_z(), 1.0, ulps = 4);
    }

    #[test]
    fn screened_tail_has_residual_charge() {
        let mut pot = Potential::new(10.0);
        pot.set_radial_grid(1e-5, 1e3);
        pot.n_electrons = 10.0;
        pot.set_z(0.0);
        pot.set_vc();
        // far outside the screening cloud Vc approaches -(Z - N + 1)/r
        let i = MAX_POINTS - 1;
        let asymptotic = -pot.residual_z() / pot.rad()[i];
        assert_approx_eq!(f64, pot.vc[i], asymptotic, epsilon = 1e-9);
    }

    #[test]
    fn fictitious_charge_scales_z() {
        let mut pot = Potential::new(2.0);
        pot.set_radial_grid(1e-5, 1e3);
        pot.set_z(0.5);
        assert_approx_eq!(f64, pot.z[0], 3.0, ulps = 4);
        pot.set_z(0.0);
        assert_approx_eq!(f64, pot.z[0], 2.0, ulps = 4);
    }
}
