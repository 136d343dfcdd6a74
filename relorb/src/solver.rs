//! Bound and continuum integrators for the radial Dirac equation.
//!
//! The equations are integrated in the logarithmic variable rho = ln r, in
//! which the grid is uniform:
//!
//! ```text
//! dP/drho = -kappa P + r (alpha (E - V) + 2/alpha) Q
//! dQ/drho =  kappa Q - r  alpha (E - V) P
//! ```
//!
//! Bound states are found by outward/inward Runge-Kutta integration with
//! node counting and an energy correction derived from the small-component
//! discontinuity at the matching radius. Continuum states are integrated
//! outward through the core and continued with a phase-amplitude (WKB)
//! representation on the sparse outer grid.

use super::FINE_STRUCTURE_CONST;
use super::error::{Error, Result};
use super::orbital::Orbital;
use super::potential::{MAX_POINTS, Potential};
use super::shell::l_from_kappa;

const ALPHA: f64 = FINE_STRUCTURE_CONST;

/// Solves the Dirac equation for `orb` in the potential `pot`. Bound or
/// continuum is selected by the sign of `orb.n`; `eps` is the relative
/// energy tolerance for bound states.
///
/// # Errors
///
/// Fails on invalid quantum numbers or if the energy iteration diverges.
pub fn radial_solver(orb: &mut Orbital, pot: &Potential, eps: f64) -> Result<()> {
    if orb.kappa == 0 {
        return Err(Error::InvalidQuantumNumbers {
            n: orb.n,
            kappa: orb.kappa,
        });
    }
    if orb.n > 0 {
        let l = l_from_kappa(orb.kappa) / 2;
        if l >= orb.n {
            return Err(Error::InvalidQuantumNumbers {
                n: orb.n,
                kappa: orb.kappa,
            });
        }
        solve_bound(orb, pot, eps)
    } else {
        solve_continuum(orb, pot)
    }
}

/// Four-point Lagrange interpolation of a gridded function at fractional
/// index `i + frac`.
fn interp4(v: &[f64], i: usize, frac: f64) -> f64 {
    if frac == 0.0 {
        return v[i];
    }
    if i == 0 || i + 2 >= v.len() {
        let next = (i + 1).min(v.len() - 1);
        return v[i] + frac * (v[next] - v[i]);
    }
    let s = frac;
    let vm = v[i - 1];
    let v0 = v[i];
    let vp = v[i + 1];
    let vpp = v[i + 2];
    let wm = -s * (s - 1.0) * (s - 2.0) / 6.0;
    let w0 = (s + 1.0) * (s - 1.0) * (s - 2.0) / 2.0;
    let wp = -(s + 1.0) * s * (s - 2.0) / 2.0;
    let wpp = (s + 1.0) * s * (s - 1.0) / 6.0;
    wm * vm + w0 * v0 + wp * vp + wpp * vpp
}

struct Equation<'a> {
    veff: &'a [f64],
    rad: &'a [f64],
    h: f64,
    kappa: f64,
    energy: f64,
}

impl Equation<'_> {
    fn radius(&self, i: usize, frac: f64) -> f64 {
        self.rad[i] * (frac * self.h).exp()
    }

    fn derivative(&self, i: usize, frac: f64, p: f64, q: f64) -> (f64, f64) {
        let r = self.radius(i, frac);
        let v = interp4(self.veff, i, frac);
        let ev = ALPHA * (self.energy - v);
        let dp = -self.kappa * p + r * (ev + 2.0 / ALPHA) * q;
        let dq = self.kappa * q - r * ev * p;
        (dp * self.h, dq * self.h)
    }

    /// One Runge-Kutta step of `delta` index units starting at `i + frac`.
    fn rk4_step(&self, i: usize, frac: f64, delta: f64, p: f64, q: f64) -> (f64, f64) {
        let (k1p, k1q) = self.derivative(i, frac, p, q);
        let half = frac + 0.5 * delta;
        let (k2p, k2q) = self.derivative(i, half, p + 0.5 * delta * k1p, q + 0.5 * delta * k1q);
        let (k3p, k3q) = self.derivative(i, half, p + 0.5 * delta * k2p, q + 0.5 * delta * k2q);
        let (k4p, k4q) = self.derivative(i, frac + delta, p + delta * k3p, q + delta * k3q);
        (
            p + delta / 6.0 * (k1p + 2.0 * k2p + 2.0 * k3p + k4p),
            q + delta / 6.0 * (k1q + 2.0 * k2q + 2.0 * k3q + k4q),
        )
    }

    /// Integrates from grid index `from` to `to` (either direction), storing
    /// the components at every integer index.
    fn sweep(&self, from: usize, to: usize, p: &mut [f64], q: &mut [f64]) {
        if from <= to {
            for i in from..to {
                let (p1, q1) = self.rk4_step(i, 0.0, 0.5, p[i], q[i]);
                let (p2, q2) = self.rk4_step(i, 0.5, 0.5, p1, q1);
                p[i + 1] = p2;
                q[i + 1] = q2;
            }
        } else {
            for i in (to..from).rev() {
                let (p1, q1) = self.rk4_step(i, 1.0, -0.5, p[i + 1], q[i + 1]);
                let (p2, q2) = self.rk4_step(i, 0.5, -0.5, p1, q1);
                p[i] = p2;
                q[i] = q2;
            }
        }
    }
}

fn effective_potential(pot: &Potential) -> Vec<f64> {
    (0..MAX_POINTS).map(|i| pot.v_total(i)).collect()
}

/// Local relativistic momentum squared, including the centrifugal term.
fn momentum_sq(veff: f64, e: f64, l: i32, r: f64) -> f64 {
    let ev = e - veff;
    2.0 * ev * (1.0 + 0.5 * ALPHA * ALPHA * ev) - f64::from(l * (l + 1)) / (r * r)
}

fn solve_bound(orb: &mut Orbital, pot: &Potential, eps: f64) -> Result<()> {
    let veff = effective_potential(pot);
    let rad = pot.rad();
    let h = (rad[1] / rad[0]).ln();
    let z0 = pot.z[0];
    let kappa = orb.kappa;
    let l = l_from_kappa(kappa) / 2;
    let nodes_target = orb.n - l - 1;

    let gamma_sq = f64::from(kappa * kappa) - (ALPHA * z0).powi(2);
    if gamma_sq <= 0.0 {
        return Err(Error::InvalidQuantumNumbers {
            n: orb.n,
            kappa: orb.kappa,
        });
    }
    let gamma = gamma_sq.sqrt();

    let mut energy = if orb.energy < 0.0 {
        orb.energy
    } else {
        -0.5 * (z0 / f64::from(orb.n)).powi(2)
    };
    let mut emin = -2.0 * z0 * z0 - 10.0;
    let mut emax = -1e-12;
    energy = energy.clamp(emin, emax);

    let mut p = vec![0.0; MAX_POINTS];
    let mut q = vec![0.0; MAX_POINTS];
    let mut p_in = vec![0.0; MAX_POINTS];
    let mut q_in = vec![0.0; MAX_POINTS];
    let mut converged = false;
    let mut norm = 1.0;
    let mut i_inf = MAX_POINTS - 1;
    let mut im = 0;

    for _ in 0..500 {
        let eq = Equation {
            veff: &veff,
            rad,
            h,
            kappa: f64::from(kappa),
            energy,
        };

        // outer classical turning point
        im = 0;
        for i in (0..MAX_POINTS - 15).rev() {
            if momentum_sq(veff[i], energy, l, rad[i]) > 0.0 {
                im = i;
                break;
            }
        }
        if im < 10 {
            // no classically allowed region resolved at this energy
            emin = energy;
            energy = 0.5 * (energy + emax);
            continue;
        }

        // outward sweep from the power-series start
        p[0] = rad[0].powf(gamma);
        q[0] = p[0] * (gamma + f64::from(kappa)) / (ALPHA * z0);
        eq.sweep(0, im, &mut p, &mut q);

        let mut nodes = 0;
        for i in 1..im {
            if p[i] != 0.0 && p[i + 1] * p[i] < 0.0 {
                nodes += 1;
            }
        }

        if nodes != nodes_target {
            if nodes > nodes_target {
                emax = energy;
            } else {
                emin = energy;
            }
            energy = 0.5 * (emin + emax);
            continue;
        }

        // practical infinity: enough decay beyond the turning point
        i_inf = MAX_POINTS - 1;
        let mut decay = 0.0;
        for i in im..MAX_POINTS - 1 {
            let ksq = -momentum_sq(veff[i], energy, l, rad[i]);
            if ksq > 0.0 {
                decay += ksq.sqrt() * (rad[i + 1] - rad[i]);
            }
            if decay > 45.0 {
                i_inf = i;
                break;
            }
        }

        // inward sweep seeded with the local decaying ratio
        let ksq = (-momentum_sq(veff[i_inf], energy, l, rad[i_inf])).max(1e-10);
        let k_decay = ksq.sqrt();
        p_in[i_inf] = 1e-20;
        q_in[i_inf] = p_in[i_inf] * (-k_decay + f64::from(kappa) / rad[i_inf])
            / (ALPHA * (energy - veff[i_inf]) + 2.0 / ALPHA);
        eq.sweep(i_inf, im, &mut p_in, &mut q_in);

        let scale = p[im] / p_in[im];
        for i in im..=i_inf {
            p_in[i] *= scale;
            q_in[i] *= scale;
        }

        norm = 0.0;
        for i in 0..=i_inf {
            let (pp, qq) = if i < im {
                (p[i], q[i])
            } else {
                (p_in[i], q_in[i])
            };
            norm += (pp * pp + qq * qq) * pot.dr_drho[i];
        }

        let delta_e = p[im] * (q[im] - q_in[im]) / (ALPHA * norm);
        if delta_e > 0.0 {
            emin = emin.max(energy);
        } else {
            emax = emax.min(energy);
        }
        let proposed = energy + delta_e;
        let accepted = if proposed > emin && proposed < emax {
            proposed
        } else {
            0.5 * (emin + emax)
        };

        if (delta_e / energy).abs() < eps {
            converged = true;
            energy = accepted;
            break;
        }
        energy = accepted;
    }

    if !converged {
        return Err(Error::DiracSolver {
            n: orb.n,
            kappa: orb.kappa,
            energy,
        });
    }

    // glue the branches and normalize
    orb.reset_wavefunction();
    let inv = 1.0 / norm.sqrt();
    for i in 0..=i_inf {
        let (pp, qq) = if i < im {
            (p[i], q[i])
        } else {
            (p_in[i], q_in[i])
        };
        orb.large[i] = pp * inv;
        orb.small[i] = qq * inv;
    }
    orb.ilast = i_inf;
    orb.energy = energy;
    orb.qr_norm = 1.0;
    Ok(())
}

fn solve_continuum(orb: &mut Orbital, pot: &Potential) -> Result<()> {
    let energy = orb.energy;
    if energy <= 0.0 {
        return Err(Error::InvalidQuantumNumbers {
            n: orb.n,
            kappa: orb.kappa,
        });
    }
    let veff = effective_potential(pot);
    let rad = pot.rad();
    let h = (rad[1] / rad[0]).ln();
    let z0 = pot.z[0];
    let kappa = orb.kappa;
    let l = l_from_kappa(kappa) / 2;

    let gamma_sq = f64::from(kappa * kappa) - (ALPHA * z0).powi(2);
    if gamma_sq <= 0.0 {
        return Err(Error::InvalidQuantumNumbers {
            n: orb.n,
            kappa: orb.kappa,
        });
    }
    let gamma = gamma_sq.sqrt();

    // switch to the phase-amplitude representation before the grid stops
    // resolving the oscillation
    let mut ilast = MAX_POINTS - 11;
    for i in 5..MAX_POINTS - 11 {
        let ksq = momentum_sq(veff[i], energy, l, rad[i]);
        if ksq > 0.0 && ksq.sqrt() * (rad[i + 1] - rad[i]) > 0.05 {
            ilast = i;
            break;
        }
    }
    if ilast % 2 == 0 {
        ilast += 1;
    }

    let eq = Equation {
        veff: &veff,
        rad,
        h,
        kappa: f64::from(kappa),
        energy,
    };
    let mut p = vec![0.0; MAX_POINTS];
    let mut q = vec![0.0; MAX_POINTS];
    p[0] = rad[0].powf(gamma);
    q[0] = p[0] * (gamma + f64::from(kappa)) / (ALPHA * z0);
    eq.sweep(0, ilast, &mut p, &mut q);

    // match the direct solution onto a unit-momentum-normalized amplitude
    let k_match = momentum_sq(veff[ilast], energy, l, rad[ilast]).max(1e-12).sqrt();
    let dp_dr = {
        let (dp, _) = eq.derivative(ilast, 0.0, p[ilast], q[ilast]);
        dp / (h * rad[ilast])
    };
    let amp = (p[ilast] * p[ilast] + (dp_dr / k_match).powi(2)).sqrt();
    let mut phase = f64::atan2(k_match * p[ilast], dp_dr);
    let scale = 1.0 / (k_match.sqrt() * amp);

    orb.reset_wavefunction();
    for i in 0..=ilast {
        orb.large[i] = p[i] * scale;
        orb.small[i] = q[i] * scale;
    }

    // cumulative WKB phase and local amplitudes on the sparse outer grid,
    // using the gridded potential directly
    let grid_k = |i: usize| -> f64 { momentum_sq(veff[i], energy, l, rad[i]).max(1e-12).sqrt() };
    let segment = |i: usize| -> f64 {
        // Simpson with the potential interpolated at the interval midpoint
        let r_mid = 0.5 * (rad[i] + rad[i + 1]);
        let v_mid = 0.5 * (veff[i] + veff[i + 1]);
        let k_mid = momentum_sq(v_mid, energy, l, r_mid).max(1e-12).sqrt();
        (rad[i + 1] - rad[i]) / 6.0 * (grid_k(i) + 4.0 * k_mid + grid_k(i + 1))
    };

    let mut i = ilast + 1;
    phase += segment(ilast);
    while i < MAX_POINTS {
        let k_here = grid_k(i);
        let denom = ALPHA * (energy - veff[i]) + 2.0 / ALPHA;
        let amplitude = 1.0 / k_here.sqrt();
        orb.large[i] = amplitude;
        orb.small[i] = amplitude * k_here / denom;
        if i + 1 < MAX_POINTS {
            orb.large[i + 1] = phase + segment(i);
            orb.small[i + 1] = amplitude * f64::from(kappa) / rad[i] / denom;
            if i + 2 < MAX_POINTS {
                phase += segment(i) + segment(i + 1);
            }
        }
        i += 2;
    }

    orb.ilast = ilast;
    orb.energy = energy;
    orb.qr_norm = 1.0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn hydrogenic_potential(z: f64) -> Potential {
        let mut pot = Potential::new(z);
        pot.set_radial_grid(1e-5, 1e3);
        pot.n_electrons = 1.0;
        pot.set_z(0.0);
        pot.set_vc();
        pot.set_u_bare();
        pot
    }

    #[test]
    fn hydrogen_ground_state_energy() {
        let pot = hydrogenic_potential(1.0);
        let mut orb = Orbital::new(1, -1, 0.0);
        radial_solver(&mut orb, &pot, 1e-9).unwrap();
        // the Dirac 1s energy of hydrogen, slightly below -0.5 Hartree
        let gamma = (1.0 - ALPHA * ALPHA).sqrt();
        let exact = (gamma - 1.0) / (ALPHA * ALPHA);
        assert_approx_eq!(f64, orb.energy, exact, epsilon = 1e-5);
    }

    #[test]
    fn hydrogen_excited_states_scale_as_inverse_n_squared() {
        let pot = hydrogenic_potential(1.0);
        for n in 2..=3 {
            let mut orb = Orbital::new(n, -1, 0.0);
            radial_solver(&mut orb, &pot, 1e-9).unwrap();
            let expected = -0.5 / f64::from(n * n);
            assert_approx_eq!(f64, orb.energy, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn fine_structure_orders_p_levels() {
        let pot = hydrogenic_potential(10.0);
        let mut p12 = Orbital::new(2, 1, 0.0);
        let mut p32 = Orbital::new(2, -2, 0.0);
        radial_solver(&mut p12, &pot, 1e-9).unwrap();
        radial_solver(&mut p32, &pot, 1e-9).unwrap();
        // j = 1/2 lies below j = 3/2
        assert!(p12.energy < p32.energy);
        assert_approx_eq!(f64, p32.energy, -12.5, epsilon = 0.05);
    }

    #[test]
    fn bound_state_is_normalized() {
        let pot = hydrogenic_potential(2.0);
        let mut orb = Orbital::new(1, -1, 0.0);
        radial_solver(&mut orb, &pot, 1e-9).unwrap();
        let mut norm = 0.0;
        for i in 0..=orb.ilast {
            let p = orb.large()[i];
            let q = orb.small()[i];
            norm += (p * p + q * q) * pot.dr_drho()[i];
        }
        assert_approx_eq!(f64, norm, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn node_counts_match_principal_quantum_number() {
        let pot = hydrogenic_potential(1.0);
        for (n, expected) in [(1, 0), (2, 1), (3, 2)] {
            let mut orb = Orbital::new(n, -1, 0.0);
            radial_solver(&mut orb, &pot, 1e-8).unwrap();
            let mut nodes = 0;
            for i in 1..orb.ilast {
                let a = orb.large()[i];
                let b = orb.large()[i + 1];
                if a != 0.0 && a * b < 0.0 && orb.large()[i].abs() > 1e-12 {
                    nodes += 1;
                }
            }
            assert_eq!(nodes, expected, "n = {n}");
        }
    }

    #[test]
    fn continuum_orbital_has_oscillating_tail() {
        let pot = hydrogenic_potential(1.0);
        let mut orb = Orbital::new(0, -1, 0.5);
        radial_solver(&mut orb, &pot, 1e-8).unwrap();
        assert!(orb.ilast % 2 == 1);
        assert!(orb.ilast < MAX_POINTS - 2);
        // phase slots grow monotonically
        let mut prev = orb.large()[orb.ilast + 2];
        let mut i = orb.ilast + 4;
        while i < MAX_POINTS {
            assert!(orb.large()[i] > prev);
            prev = orb.large()[i];
            i += 2;
        }
        // amplitude tends to 1/sqrt(k_inf)
        let k_inf = (2.0 * 0.5_f64 * (1.0 + 0.5 * ALPHA * ALPHA * 0.5)).sqrt();
        let amp = orb.large()[MAX_POINTS - 2];
        assert_approx_eq!(f64, amp, 1.0 / k_inf.sqrt(), epsilon = 0.05);
    }

    #[test]
    fn invalid_quantum_numbers_are_rejected() {
        let pot = hydrogenic_potential(1.0);
        assert!(radial_solver(&mut Orbital::new(1, 0, 0.0), &pot, 1e-8).is_err());
        assert!(radial_solver(&mut Orbital::new(1, 1, 0.0), &pot, 1e-8).is_err());
        assert!(radial_solver(&mut Orbital::new(0, -1, -1.0), &pot, 1e-8).is_err());
    }
}
