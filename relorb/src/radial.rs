//! The radial context: owner of all process-wide radial state.
//!
//! A [`RadialContext`] owns the potential, the append-only orbital store, the
//! configuration groups with their symmetry index and the three integral
//! caches. All public operations hang off this context.

use super::angular::{is_odd, w3j};
use super::average::{AverageConfig, Screening};
use super::config::Configuration;
use super::error::{Error, Result};
use super::integrate::{get_yk, integrate};
use super::orbital::Orbital;
use super::potential::{MAX_POINTS, Potential};
use super::shell::jl_from_kappa;
use super::slater::{MultipoleKey, SlaterKey};
use super::solver;
use super::symmetry::{GroupStore, Symmetry};
use super::{FINE_STRUCTURE_CONST, HARTREE_EV};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Energy agreement required to consider two continuum orbitals identical,
/// in Hartree.
pub const ENERGY_TOL: f64 = 1e-6;

/// Gauge used for electric multipole matrix elements.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Gauge {
    /// Velocity form.
    Coulomb,
    /// Length form.
    #[default]
    Babushkin,
}

/// Knobs of the self-consistency iteration.
#[derive(Clone, Debug)]
pub struct OptimizeControl {
    /// Convergence threshold on the per-shell energy metric.
    pub tolerance: f64,
    /// Upper bound on self-consistency iterations.
    pub max_iterations: usize,
    /// Optional static screening of outer shells.
    pub screening: Option<Screening>,
}

impl Default for OptimizeControl {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            screening: None,
        }
    }
}

/// Outcome of [`RadialContext::optimize_radial`]. Hitting the iteration limit
/// is reported here rather than as an error; the orbitals remain usable.
#[derive(Clone, Copy, Debug)]
pub struct Convergence {
    /// Whether the tolerance was reached.
    pub converged: bool,
    /// Number of iterations taken.
    pub iterations: usize,
    /// Final value of the convergence metric.
    pub tolerance: f64,
}

/// Owner of all radial state; see the module documentation.
#[derive(Debug)]
pub struct RadialContext {
    pub(crate) potential: Potential,
    pub(crate) orbitals: Vec<Orbital>,
    pub(crate) n_continua: usize,
    pub(crate) groups: GroupStore,
    pub(crate) average: AverageConfig,
    pub(crate) control: OptimizeControl,
    pub(crate) rgrid_min: f64,
    pub(crate) rgrid_max: f64,
    pub(crate) gauge: Gauge,
    pub(crate) slater_cache: FxHashMap<SlaterKey, f64>,
    pub(crate) residual_cache: FxHashMap<(usize, usize), f64>,
    pub(crate) multipole_cache: FxHashMap<MultipoleKey, f64>,
    pub(crate) cache_dir: Option<PathBuf>,
}

impl RadialContext {
    /// Creates a context for a nucleus of charge `z`, in-memory only.
    #[must_use]
    pub fn new(z: f64) -> Self {
        Self {
            potential: Potential::new(z),
            orbitals: Vec::new(),
            n_continua: 0,
            groups: GroupStore::new(),
            average: AverageConfig::default(),
            control: OptimizeControl::default(),
            rgrid_min: 1e-5,
            rgrid_max: 1e3,
            gauge: Gauge::default(),
            slater_cache: FxHashMap::default(),
            residual_cache: FxHashMap::default(),
            multipole_cache: FxHashMap::default(),
            cache_dir: None,
        }
    }

    /// Enables wavefunction persistence under `dir`.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Overrides the self-consistency knobs.
    pub fn set_optimize_control(&mut self, control: OptimizeControl) {
        self.control = control;
    }

    /// Installs a static screening description for outer shells.
    pub fn set_screening(&mut self, screening: Option<Screening>) {
        self.control.screening = screening;
    }

    /// Overrides the radial-grid bounds; only effective before the grid is
    /// laid down by the first optimization.
    pub fn set_radial_grid(&mut self, rmin: f64, rmax: f64) {
        self.rgrid_min = rmin;
        self.rgrid_max = rmax;
    }

    /// Selects the gauge for electric multipole matrix elements.
    pub fn set_gauge(&mut self, gauge: Gauge) {
        self.gauge = gauge;
    }

    /// The gauge used for electric multipole matrix elements.
    #[must_use]
    pub const fn gauge(&self) -> Gauge {
        self.gauge
    }

    /// The potential.
    #[must_use]
    pub const fn potential(&self) -> &Potential {
        &self.potential
    }

    /// The configuration groups and their symmetry index.
    #[must_use]
    pub const fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// Registers (or finds) a configuration group by name.
    pub fn add_group(&mut self, name: &str) -> usize {
        self.groups.add_group(name)
    }

    /// Parses `config` in spectroscopic notation and adds it to the named
    /// group, creating the group as needed.
    ///
    /// # Errors
    ///
    /// Fails if the configuration cannot be parsed or coupled.
    pub fn add_config(&mut self, group: &str, config: &str) -> Result<usize> {
        let config: Configuration = config
            .parse()
            .map_err(|err: super::shell::ParseShellError| Error::Other(anyhow::anyhow!(err)))?;
        let kg = self.groups.add_group(group);
        self.groups.add_config_to_group(kg, config)?;
        Ok(kg)
    }

    /// The symmetry block with composite index `k`; see
    /// [`super::symmetry::decode_pj`].
    #[must_use]
    pub fn symmetry(&self, k: usize) -> Option<&Symmetry> {
        self.groups.symmetry(k)
    }

    /// Number of stored orbitals.
    #[must_use]
    pub fn n_orbitals(&self) -> usize {
        self.orbitals.len()
    }

    /// Number of stored continuum orbitals.
    #[must_use]
    pub const fn n_continua(&self) -> usize {
        self.n_continua
    }

    /// Number of stored bound orbitals.
    #[must_use]
    pub fn n_bound(&self) -> usize {
        self.orbitals.len() - self.n_continua
    }

    /// The orbital with index `k`.
    ///
    /// # Errors
    ///
    /// Fails if `k` is out of range.
    pub fn orbital(&self, k: usize) -> Result<&Orbital> {
        self.orbitals.get(k).ok_or(Error::InvalidOrbital(k))
    }

    /// Searches the store for an orbital with the given quantum numbers
    /// without creating one. Bound states (`n > 0`) match on (n, kappa);
    /// continuum requests (`n == 0`) match kappa exactly and the energy
    /// within [`ENERGY_TOL`].
    #[must_use]
    pub fn orbital_exists(&self, n: i32, kappa: i32, energy: f64) -> Option<usize> {
        self.orbitals.iter().position(|orb| {
            if n == 0 {
                orb.kappa == kappa && (orb.energy - energy).abs() < ENERGY_TOL && orb.n <= 0
            } else {
                orb.n == n && orb.kappa == kappa
            }
        })
    }

    /// Finds the orbital with the given quantum numbers, solving the Dirac
    /// equation for it on demand. Continuum orbitals are requested with
    /// `n == 0` and a positive `energy`; on first creation they are assigned
    /// the next negative ordinal.
    ///
    /// # Errors
    ///
    /// Fails if the Dirac solve fails.
    pub fn orbital_index(&mut self, n: i32, kappa: i32, energy: f64) -> Result<usize> {
        if let Some(i) = self.orbital_exists(n, kappa, energy) {
            if self.orbitals[i].has_wavefunction() {
                return Ok(i);
            }
            if self.restore_orbital(i).is_ok() {
                return Ok(i);
            }
            // re-solve the evicted wavefunction and hand back the index of
            // the orbital that was found
            let eps = self.solver_eps();
            solver::radial_solver(&mut self.orbitals[i], &self.potential, eps)?;
            return Ok(i);
        }

        let eps = self.solver_eps();
        let mut orb = Orbital::new(n, kappa, energy);
        solver::radial_solver(&mut orb, &self.potential, eps)?;
        if n == 0 {
            self.n_continua += 1;
            orb.n = -i32::try_from(self.n_continua).unwrap();
        }
        self.orbitals.push(orb);
        Ok(self.orbitals.len() - 1)
    }

    fn solver_eps(&self) -> f64 {
        self.control.tolerance * 0.1
    }

    /// Residual asymptotic charge of the current potential.
    #[must_use]
    pub fn residual_z(&self) -> f64 {
        self.potential.residual_z()
    }

    /// The largest reliable radius of the grid.
    #[must_use]
    pub fn r_max(&self) -> f64 {
        self.potential.r_max()
    }

    /// Rebuilds the central potential from the current average configuration
    /// and the orbitals that exist for it.
    ///
    /// # Errors
    ///
    /// Fails if a radial integration is handed an invalid integrand type,
    /// which would be a programming error.
    pub fn set_potential(&mut self) -> Result<()> {
        let shells = self.average.shells().to_vec();

        let mut w = vec![0.0; MAX_POINTS];
        let mut jmax = 0_usize;
        let mut norbs = 0;
        for shell in &shells {
            let Some(k1) = self.orbital_exists(shell.n, shell.kappa, 0.0) else {
                continue;
            };
            let orb = &self.orbitals[k1];
            if !orb.has_wavefunction() {
                continue;
            }
            for j in 0..=orb.ilast {
                let large = orb.large()[j];
                let small = orb.small()[j];
                w[j] += (large * large + small * small) * shell.nq;
            }
            jmax = jmax.max(orb.ilast);
            norbs += 1;
        }
        self.potential.w.copy_from_slice(&w);

        if norbs == 0 || self.potential.n_electrons <= 1.0 {
            self.potential.set_vc();
            self.potential.set_u_bare();
            return Ok(());
        }

        let mut u = vec![0.0; MAX_POINTS];
        for (i, shell) in shells.iter().enumerate() {
            let Some(k1) = self.orbital_exists(shell.n, shell.kappa, 0.0) else {
                continue;
            };
            if !self.orbitals[k1].has_wavefunction() {
                continue;
            }
            let (j1, kl1) = jl_from_kappa(shell.kappa);
            let nq1 = shell.nq;

            // direct and same-shell exchange terms, even physical ranks only
            let kmax = (2 * j1).min(8);
            for k in (0..=kmax).step_by(2) {
                let t = k / 2;
                if is_odd(t) {
                    continue;
                }
                let orb1 = &self.orbitals[k1];
                let yk = get_yk(&self.potential, t, orb1, orb1, 1)?;
                let w3 = if t > 0 {
                    let w3 = w3j(j1, k, j1, -1, 0, 1);
                    w3 * w3 * f64::from(j1 + 1) / f64::from(j1)
                } else {
                    0.0
                };
                for m in 1..=jmax {
                    let large = orb1.large()[m];
                    let small = orb1.small()[m];
                    let b = large * large + small * small;
                    if t == 0 {
                        u[m] += nq1 * yk[m];
                        u[m] -= yk[m] * b * nq1 / w[m];
                    } else {
                        u[m] -= nq1 * (nq1 - 1.0) * w3 * yk[m] * b / w[m];
                    }
                }
            }

            // exchange with the shells processed before this one
            for other in &shells[..i] {
                let Some(k2) = self.orbital_exists(other.n, other.kappa, 0.0) else {
                    continue;
                };
                if !self.orbitals[k2].has_wavefunction() {
                    continue;
                }
                let (j2, kl2) = jl_from_kappa(other.kappa);
                let kmin = (j1 - j2).abs();
                let kmax = (j1 + j2).min(8);
                for k in (kmin..=kmax).step_by(2) {
                    if is_odd((k + kl1 + kl2) / 2) {
                        continue;
                    }
                    let t = k / 2;
                    let orb1 = &self.orbitals[k1];
                    let orb2 = &self.orbitals[k2];
                    let yk = get_yk(&self.potential, t, orb1, orb2, 1)?;
                    let w3 = w3j(j1, k, j2, -1, 0, 1).powi(2);
                    for m in 1..=jmax {
                        let density = orb1.large()[m] * orb2.large()[m]
                            + orb1.small()[m] * orb2.small()[m];
                        u[m] -= nq1 * other.nq * w3 * yk[m] * density / w[m];
                    }
                }
            }
        }

        self.potential.set_u_screened(u, jmax);
        Ok(())
    }

    /// Optimizes the radial orbitals of the weighted group set `kg` to
    /// self-consistency. Existing orbitals are reused as starting points;
    /// the integral caches are cleared because every wavefunction changes.
    ///
    /// # Errors
    ///
    /// Fails when a Dirac solve diverges. Reaching the iteration limit is
    /// not an error; it is reported in the returned [`Convergence`].
    pub fn optimize_radial(
        &mut self,
        kg: &[usize],
        weights: Option<&[f64]>,
    ) -> Result<Convergence> {
        self.free_slater_cache();
        self.free_residual_cache();
        self.free_multipole_cache();

        self.average =
            AverageConfig::build(&self.groups, kg, weights, self.control.screening.as_ref())?;
        let n_electrons = self.average.n_electrons();
        self.potential.n_electrons = n_electrons;

        if !self.potential.grid_is_set() {
            self.potential.set_radial_grid(self.rgrid_min, self.rgrid_max);
        }
        self.potential.set_z(0.0);
        let mut z_res = self.potential.z[MAX_POINTS - 1];
        if n_electrons > 0.0 {
            z_res = z_res - n_electrons + 1.0;
        }
        self.potential.a = 0.0;
        self.potential.lambda = 0.5 * z_res;
        self.potential.r_core = MAX_POINTS - 5;

        // fictitious extra nuclear charge: a homotopy that keeps heavily
        // over-occupied starting points from diverging
        let mut z = if n_electrons > 2.0 * z_res {
            n_electrons / self.potential.z_nucleus()
        } else {
            0.0
        };

        let mut tol: f64 = 1.0;
        let mut iter = 0;
        while tol > self.control.tolerance || z > 0.0 {
            if iter > self.control.max_iterations {
                break;
            }
            if z > 0.0 && z < 1e-3 {
                z = 0.0;
                self.potential.set_z(0.0);
            } else {
                self.potential.set_z(z);
                z *= 0.5;
            }
            self.set_potential()?;

            tol = 0.0;
            let eps = self.solver_eps();
            let shells = self.average.shells().to_vec();
            for shell in &shells {
                let (k, old_energy) = match self.orbital_exists(shell.n, shell.kappa, 0.0) {
                    Some(k) => (k, Some(self.orbitals[k].energy)),
                    None => {
                        self.orbitals.push(Orbital::new(shell.n, shell.kappa, 0.0));
                        (self.orbitals.len() - 1, None)
                    }
                };
                solver::radial_solver(&mut self.orbitals[k], &self.potential, eps)?;

                match old_energy {
                    None => tol = 1.0,
                    Some(old) => {
                        let metric = (1.0 - old / self.orbitals[k].energy).abs();
                        tol = tol.max(metric);
                    }
                }
            }
            tracing::debug!(iteration = iter, tolerance = tol, homotopy = z, "scf step");
            iter += 1;
        }

        if iter > self.control.max_iterations {
            tracing::warn!(iterations = iter, tolerance = tol, "maximum iteration reached");
            return Ok(Convergence {
                converged: false,
                iterations: iter,
                tolerance: tol,
            });
        }
        Ok(Convergence {
            converged: true,
            iterations: iter,
            tolerance: tol,
        })
    }

    /// Asymptotic phase shift of the continuum orbital `k`, folded into
    /// `[0, 2 pi)`; bound orbitals report zero. The value is computed once
    /// and remembered on the orbital.
    ///
    /// # Errors
    ///
    /// Fails if `k` is not a stored orbital.
    pub fn phase_shift(&mut self, k: usize) -> Result<f64> {
        let residual_z = self.residual_z();
        let orb = self.orbitals.get_mut(k).ok_or(Error::InvalidOrbital(k))?;
        if orb.n > 0 {
            return Ok(0.0);
        }
        if let Some(phase) = orb.phase {
            return Ok(phase);
        }
        if !orb.has_wavefunction() {
            return Err(Error::InvalidOrbital(k));
        }

        let e = orb.energy;
        let a = FINE_STRUCTURE_CONST * FINE_STRUCTURE_CONST * e;
        let ke = (2.0 * e * (1.0 + 0.5 * a)).sqrt();
        let y = (1.0 + a) * residual_z / ke;

        let i = MAX_POINTS - 1;
        let mut phase = orb.large()[i];
        let r = self.potential.rad[i];
        let kr = ke * r;
        phase -= kr + y * (2.0 * kr).ln();
        phase = phase.rem_euclid(2.0 * std::f64::consts::PI);
        orb.phase = Some(phase);
        Ok(phase)
    }

    /// Total configuration-average energy of the group `kg`.
    ///
    /// # Errors
    ///
    /// Fails if the group does not exist or an on-demand orbital solve
    /// fails.
    pub fn total_energy_group(&mut self, kg: usize) -> Result<f64> {
        let n_configs = self.groups.group(kg)?.n_configs();
        let mut total = 0.0;
        for kc in 0..n_configs {
            let config = self.groups.group(kg)?.configs()[kc].clone();
            total += self.average_energy_config(&config)?;
        }
        Ok(total)
    }

    /// Average energy of a single configuration: one-electron energies plus
    /// residual corrections plus averaged direct and exchange two-electron
    /// interactions.
    ///
    /// # Errors
    ///
    /// Fails if an on-demand orbital solve or radial integral fails.
    pub fn average_energy_config(&mut self, config: &Configuration) -> Result<f64> {
        let shells = config.shells().to_vec();
        let mut x = 0.0;
        for (i, shell) in shells.iter().enumerate() {
            let j2 = shell.j2();
            let kl = shell.l2();
            let nq = f64::from(shell.nq);
            let k = self.orbital_index(shell.n, shell.kappa, 0.0)?;

            let b = if shell.nq > 1 {
                let mut t = 0.0;
                for kk in (2..=j2).step_by(2) {
                    let y = self.slater(k, k, k, k, kk, 0)?;
                    let q = w3j(j2, 2 * kk, j2, -1, 0, 1);
                    t += y * q * q;
                }
                let y = self.slater(k, k, k, k, 0, 0)?;
                0.5 * (nq - 1.0) * (y - (1.0 + 1.0 / f64::from(j2)) * t)
            } else {
                0.0
            };

            let mut t = 0.0;
            for other in &shells[..i] {
                let j2p = other.j2();
                let klp = other.l2();
                let nqp = f64::from(other.nq);
                let kp = self.orbital_index(other.n, other.kappa, 0.0)?;

                let mut kkmin = (j2 - j2p).abs();
                let kkmax = j2 + j2p;
                if is_odd((kkmin + kl + klp) / 2) {
                    kkmin += 2;
                }
                let mut a = 0.0;
                let mut kk = kkmin;
                while kk <= kkmax {
                    let y = self.slater(k, kp, kp, k, kk / 2, 0)?;
                    let q = w3j(j2, kk, j2p, -1, 0, 1);
                    a += y * q * q;
                    kk += 4;
                }
                let y = self.slater(k, kp, k, kp, 0, 0)?;
                t += nqp * (y - a);
            }

            let residual = self.residual_potential(k, k)?;
            x += nq * (b + t + self.orbitals[k].energy + residual);
        }
        Ok(x)
    }

    /// Renders the current potential as a diagnostic table: grid radius,
    /// effective nuclear charge, core and residual potentials, and a
    /// Thomas-Fermi-like comparison column.
    #[must_use]
    pub fn potential_table(&self) -> String {
        let pot = &self.potential;
        let mut w = vec![0.0; MAX_POINTS];
        let mut v: Vec<f64> = (0..MAX_POINTS)
            .map(|j| -pot.z[j] / pot.rad[j])
            .collect();

        for shell in self.average.shells() {
            let Some(k1) = self.orbital_exists(shell.n, shell.kappa, 0.0) else {
                continue;
            };
            let orb = &self.orbitals[k1];
            if !orb.has_wavefunction() {
                continue;
            }
            for j in 0..=orb.ilast {
                let large = orb.large()[j];
                let small = orb.small()[j];
                w[j] += (large * large + small * small) * shell.nq;
            }
            if let Ok(yk) = get_yk(pot, 0, orb, orb, 1) {
                for j in 0..MAX_POINTS {
                    v[j] += yk[j] * shell.nq / pot.rad[j];
                }
            }
        }
        for j in 0..MAX_POINTS {
            let density = w[j] / (pot.rad[j] * pot.rad[j]);
            v[j] -= 0.4235655 * density.cbrt();
        }

        let mut out = String::new();
        let _ = writeln!(out, "Lambda = {:10.3E}, A = {:10.3E}", pot.lambda, pot.a);
        for i in 0..MAX_POINTS {
            let _ = writeln!(
                out,
                "{i:<5} {:10.3E} {:10.3E} {:10.3E} {:10.3E} {:10.3E}",
                pot.rad[i], pot.z[i], pot.vc[i], pot.u[i], v[i]
            );
        }
        out
    }

    /// Renders the wavefunction of the orbital with quantum numbers
    /// (`n`, `kappa`) at `energy` (eV, for continuum states) as a table,
    /// solving it on demand.
    ///
    /// # Errors
    ///
    /// Fails if the orbital cannot be solved.
    pub fn wavefunction_table(&mut self, n: i32, kappa: i32, energy: f64) -> Result<String> {
        let k = self.orbital_index(n, kappa, energy / HARTREE_EV)?;
        let orb = &self.orbitals[k];
        let pot = &self.potential;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "#Wave Function for n = {n}, kappa = {kappa}, energy = {:12.6E}\n",
            orb.energy * HARTREE_EV
        );
        for i in 0..=orb.ilast {
            let _ = writeln!(
                out,
                "{i:<4} {:10.3E} {:10.3E} {:10.3E} {:10.3E} {:10.3E}",
                pot.rad[i],
                pot.vc[i] * pot.rad[i],
                pot.u[i] * pot.rad[i],
                orb.large()[i],
                orb.small()[i]
            );
        }
        if !orb.is_bound() {
            let mut i = orb.ilast + 1;
            while i + 1 < MAX_POINTS {
                let _ = writeln!(
                    out,
                    "{i:<4} {:10.3E} {:10.3E} {:10.3E} {:10.3E} {:10.3E}",
                    pot.rad[i],
                    orb.large()[i],
                    orb.large()[i + 1],
                    orb.small()[i],
                    orb.small()[i + 1]
                );
                i += 2;
            }
        }
        Ok(out)
    }

    /// Evicts all memoized Slater integrals.
    pub fn free_slater_cache(&mut self) {
        self.slater_cache.clear();
    }

    /// Evicts all memoized residual-potential integrals.
    pub fn free_residual_cache(&mut self) {
        self.residual_cache.clear();
    }

    /// Evicts all memoized multipole integrals.
    pub fn free_multipole_cache(&mut self) {
        self.multipole_cache.clear();
    }

    fn orbital_path(&self, orb: &Orbital) -> Result<PathBuf> {
        let dir = self.cache_dir.as_ref().ok_or(Error::NoCacheDir)?;
        Ok(dir.join(format!(
            "orb_{}_{}_{:.6e}.bin",
            orb.n, orb.kappa, orb.energy
        )))
    }

    /// Writes the wavefunction of orbital `k` to the cache directory.
    ///
    /// # Errors
    ///
    /// Fails without a cache directory or on I/O problems.
    pub fn save_orbital(&self, k: usize) -> Result<()> {
        let orb = self.orbital(k)?;
        let path = self.orbital_path(orb)?;
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = lz4_flex::frame::FrameEncoder::new(file);
        bincode::serialize_into(&mut encoder, orb)
            .map_err(|err| Error::Other(anyhow::anyhow!(err)))?;
        encoder
            .finish()
            .map_err(|err| Error::Other(anyhow::anyhow!(err)))?;
        Ok(())
    }

    /// Reloads an evicted wavefunction from the cache directory.
    ///
    /// # Errors
    ///
    /// Fails if nothing was saved for this orbital or the stored record does
    /// not match its quantum numbers.
    pub fn restore_orbital(&mut self, k: usize) -> Result<()> {
        let orb = self.orbital(k)?;
        let (n, kappa) = (orb.n, orb.kappa);
        let path = self.orbital_path(orb)?;
        let file = File::open(path).map_err(|_| Error::Restore(k))?;
        let decoder = lz4_flex::frame::FrameDecoder::new(file);
        let restored: Orbital =
            bincode::deserialize_from(decoder).map_err(|_| Error::Restore(k))?;
        if restored.n != n || restored.kappa != kappa || !restored.has_wavefunction() {
            return Err(Error::Restore(k));
        }
        self.orbitals[k] = restored;
        Ok(())
    }

    /// Releases the wavefunction of orbital `k`, keeping its record.
    ///
    /// # Errors
    ///
    /// Fails if `k` is out of range.
    pub fn free_orbital(&mut self, k: usize) -> Result<()> {
        let orb = self.orbitals.get_mut(k).ok_or(Error::InvalidOrbital(k))?;
        orb.free_wavefunction();
        Ok(())
    }

    /// Saves every resident continuum wavefunction; with `evict` they are
    /// released afterwards.
    ///
    /// # Errors
    ///
    /// Fails without a cache directory or on I/O problems.
    pub fn save_all_continua(&mut self, evict: bool) -> Result<()> {
        for k in 0..self.orbitals.len() {
            if self.orbitals[k].n <= 0 && self.orbitals[k].has_wavefunction() {
                self.save_orbital(k)?;
                if evict {
                    self.orbitals[k].free_wavefunction();
                }
            }
        }
        Ok(())
    }

    /// Saves the continuum wavefunctions with energy within `1e-3` Hartree of
    /// `energy`; with `evict` they are released afterwards.
    ///
    /// # Errors
    ///
    /// Fails without a cache directory or on I/O problems.
    pub fn save_continua(&mut self, energy: f64, evict: bool) -> Result<()> {
        for k in 0..self.orbitals.len() {
            let orb = &self.orbitals[k];
            if orb.n <= 0 && orb.has_wavefunction() && (orb.energy - energy).abs() < 1e-3 {
                self.save_orbital(k)?;
                if evict {
                    self.orbitals[k].free_wavefunction();
                }
            }
        }
        Ok(())
    }

    /// Releases every resident continuum wavefunction.
    pub fn free_all_continua(&mut self) {
        for orb in &mut self.orbitals {
            if orb.n <= 0 {
                orb.free_wavefunction();
            }
        }
    }

    /// Releases the continuum wavefunctions with energy within `1e-3`
    /// Hartree of `energy`.
    pub fn free_continua(&mut self, energy: f64) {
        for orb in &mut self.orbitals {
            if orb.n <= 0 && (orb.energy - energy).abs() < 1e-3 {
                orb.free_wavefunction();
            }
        }
    }

    /// Expectation value of the residual potential `-Z/r - Vc - U` between
    /// orbitals `k0` and `k1`, memoized under the sorted index pair.
    ///
    /// # Errors
    ///
    /// Fails if either index is invalid.
    pub fn residual_potential(&mut self, k0: usize, k1: usize) -> Result<f64> {
        let key = (k0.min(k1), k0.max(k1));
        if let Some(&value) = self.residual_cache.get(&key) {
            return Ok(value);
        }

        let orb1 = self.orbitals.get(k0).ok_or(Error::InvalidOrbital(k0))?;
        let orb2 = self.orbitals.get(k1).ok_or(Error::InvalidOrbital(k1))?;
        let pot = &self.potential;
        let f: Vec<f64> = (0..MAX_POINTS)
            .map(|i| -(pot.z[i] / pot.rad[i]) - pot.vc[i] - pot.u[i])
            .collect();
        let value = integrate(pot, &f, orb1, orb2, 1)?;

        self.residual_cache.insert(key, value);
        Ok(value)
    }
}
