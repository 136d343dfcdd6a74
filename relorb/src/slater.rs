//! Two-electron Slater integrals and one-electron multipole radials, with
//! their canonical-key caches.

use super::angular::{is_even, is_odd, reduced_cl, triangle, w6j};
use super::error::{Error, Result};
use super::integrate::{get_yk, integrate};
use super::potential::MAX_POINTS;
use super::radial::{Gauge, RadialContext};
use super::shell::{j_from_kappa, l_from_kappa};
use super::FINE_STRUCTURE_CONST;

/// Largest doubled rank considered in exchange summations.
pub const MAX_RANK: i32 = 20;

/// Cache key of a Slater radial: four orbital indices, the physical rank and
/// a tag discriminating the evaluation mode.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SlaterKey {
    /// First inner orbital index.
    pub k0: usize,
    /// First outer orbital index.
    pub k1: usize,
    /// Second inner orbital index.
    pub k2: usize,
    /// Second outer orbital index.
    pub k3: usize,
    /// Physical multipole rank.
    pub k: i32,
    /// Mode tag; see [`slater_mode_tag`].
    pub tag: u8,
}

/// Maps a Slater mode selector to its cache tag.
///
/// # Errors
///
/// Fails on a selector outside {0, 1, 2, -1, -2}.
pub fn slater_mode_tag(mode: i32) -> Result<u8> {
    match mode {
        0 | 1 => Ok(0),
        2 => Ok(1),
        -1 => Ok(2),
        -2 => Ok(3),
        _ => Err(Error::InvalidMode(mode)),
    }
}

impl SlaterKey {
    /// Reorders the orbital indices into the canonical form
    /// `k0 <= k2`, `k1 <= k3`, `k0 <= k1`, and `k2 <= k3` when `k0 == k1`,
    /// which is invariant under the permutation symmetries of the integral.
    #[must_use]
    pub const fn sorted(mut self) -> Self {
        if self.k0 > self.k2 {
            let t = self.k0;
            self.k0 = self.k2;
            self.k2 = t;
        }
        if self.k1 > self.k3 {
            let t = self.k1;
            self.k1 = self.k3;
            self.k3 = t;
        }
        if self.k0 > self.k1 {
            let t = self.k0;
            self.k0 = self.k1;
            self.k1 = t;
            let t = self.k2;
            self.k2 = self.k3;
            self.k3 = t;
        } else if self.k0 == self.k1 && self.k2 > self.k3 {
            let t = self.k2;
            self.k2 = self.k3;
            self.k3 = t;
        }
        self
    }
}

/// Which one-electron multipole radial a cache entry holds.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MultipoleKind {
    /// Expectation value of a positive power of r.
    RMoment,
    /// Expectation value of a negative power of r.
    RMomentInverse,
    /// Magnetic multipole in the non-relativistic approximation.
    MagneticNr(Gauge),
    /// Electric multipole in the non-relativistic approximation.
    ElectricNr(Gauge),
    /// Fully relativistic magnetic multipole.
    Magnetic(Gauge),
    /// Fully relativistic electric multipole.
    Electric(Gauge),
}

/// Cache key of a one-electron multipole radial.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MultipoleKey {
    /// Which operator family.
    pub kind: MultipoleKind,
    /// Multipole rank (or the power of r for the moment kinds).
    pub rank: i32,
    /// Bra orbital index.
    pub k1: usize,
    /// Ket orbital index.
    pub k2: usize,
}

impl RadialContext {
    /// Multipole radial in the non-relativistic approximation. Positive `m`
    /// selects magnetic multipoles, negative electric ones; selectors with
    /// `|m| >= 256` request the bare expectation value of `r^(m -+ 256)`
    /// used by the separable Coulomb form.
    ///
    /// # Errors
    ///
    /// Fails if an orbital index is invalid.
    pub fn multipole_radial_nr(&mut self, m: i32, k1: usize, k2: usize) -> Result<f64> {
        if m == 0 {
            return Ok(0.0);
        }
        let gauge = self.gauge();

        let (kind, rank) = if m >= 256 {
            (MultipoleKind::RMoment, m - 256)
        } else if m <= -256 {
            (MultipoleKind::RMomentInverse, -m - 256)
        } else if m > 0 {
            (MultipoleKind::MagneticNr(gauge), m)
        } else {
            (MultipoleKind::ElectricNr(gauge), -m)
        };
        let key = MultipoleKey { kind, rank, k1, k2 };
        if let Some(&value) = self.multipole_cache.get(&key) {
            return Ok(value);
        }

        let orb1 = self.orbital(k1)?;
        let orb2 = self.orbital(k2)?;
        let kappa1 = orb1.kappa;
        let kappa2 = orb2.kappa;
        let pot = &self.potential;

        let power_weight = |power: i32| -> Vec<f64> {
            pot.rad().iter().map(|&r| r.powi(power)).collect()
        };

        let value = match kind {
            MultipoleKind::MagneticNr(_) => {
                let t = kappa1 + kappa2;
                let p = rank - t;
                let mut r = 0.0;
                if p != 0 && t != 0 {
                    let f = power_weight(rank - 1);
                    r = integrate(pot, &f, orb1, orb2, 1)?;
                    r *= f64::from(p) * f64::from(t);
                    r /= (f64::from(rank) * f64::from(rank + 1)).sqrt();
                    r *= -0.5 * FINE_STRUCTURE_CONST;
                    let mut i = 2 * rank - 1;
                    while i > 0 {
                        r /= f64::from(i);
                        i -= 2;
                    }
                }
                r * reduced_cl(j_from_kappa(kappa1), 2 * rank, j_from_kappa(kappa2))
            }
            MultipoleKind::ElectricNr(_) => {
                // the velocity form is not implemented; both gauges use the
                // length form here
                let f = power_weight(rank);
                let mut r = integrate(pot, &f, orb1, orb2, 1)?;
                r *= (f64::from(rank + 1) / f64::from(rank)).sqrt();
                let mut i = 2 * rank - 1;
                while i > 1 {
                    r /= f64::from(i);
                    i -= 2;
                }
                r * reduced_cl(j_from_kappa(kappa1), 2 * rank, j_from_kappa(kappa2))
            }
            _ => {
                let power = if matches!(kind, MultipoleKind::RMoment) {
                    rank
                } else {
                    -rank
                };
                let f = power_weight(power);
                integrate(pot, &f, orb1, orb2, 1)?
            }
        };

        self.multipole_cache.insert(key, value);
        Ok(value)
    }

    /// Fully relativistic multipole radial following Grant's I and J
    /// integrals, at photon energy `aw` (in units of the fine-structure
    /// constant times the transition energy). Positive `m` is magnetic,
    /// negative electric; the electric result depends on the gauge.
    ///
    /// # Errors
    ///
    /// Fails if an orbital index is invalid.
    pub fn multipole_radial(&mut self, aw: f64, m: i32, k1: usize, k2: usize) -> Result<f64> {
        if m == 0 {
            return Ok(0.0);
        }
        let gauge = self.gauge();

        let (kind, rank) = if m > 0 {
            (MultipoleKind::Magnetic(gauge), m)
        } else {
            (MultipoleKind::Electric(gauge), -m)
        };
        let key = MultipoleKey { kind, rank, k1, k2 };
        if let Some(&value) = self.multipole_cache.get(&key) {
            return Ok(value);
        }

        let kappa1 = self.orbital(k1)?.kappa;
        let kappa2 = self.orbital(k2)?.kappa;

        let mut r = 0.0;
        if m > 0 {
            let t = kappa1 + kappa2;
            if t != 0 {
                r = f64::from(t) * self.multipole_ij(aw, rank, k1, k2, 4)?;
                r *= f64::from(2 * rank + 1) / (f64::from(rank) * f64::from(rank + 1)).sqrt();
                r /= aw.powi(rank);
            }
        } else {
            let am = rank;
            match gauge {
                Gauge::Coulomb => {
                    let t = kappa1 - kappa2;
                    let q = (f64::from(am) / f64::from(am + 1)).sqrt();
                    if t != 0 {
                        let ip = self.multipole_ij(aw, am + 1, k1, k2, 4)?;
                        let ipm = self.multipole_ij(aw, am - 1, k1, k2, 4)?;
                        r = f64::from(t) * ip * q - f64::from(t) * ipm / q;
                    }
                    let im = self.multipole_ij(aw, am + 1, k1, k2, 5)?;
                    let imm = self.multipole_ij(aw, am - 1, k1, k2, 5)?;
                    r += f64::from(am + 1) * im * q + f64::from(am) * imm / q;
                    r /= aw.powi(am);
                }
                Gauge::Babushkin => {
                    let t = kappa1 - kappa2;
                    if t != 0 {
                        let ip = self.multipole_ij(aw, am + 1, k1, k2, 4)?;
                        r = f64::from(t) * ip;
                    }
                    let im = self.multipole_ij(aw, am + 1, k1, k2, 5)?;
                    let imm = self.multipole_ij(aw, am, k1, k2, 1)?;
                    r += f64::from(am + 1) * (imm + im);
                    let q = f64::from(2 * am + 1) / (f64::from(am) * f64::from(am + 1)).sqrt();
                    r = r * q / aw.powi(am);
                }
            }
        }

        r *= reduced_cl(j_from_kappa(kappa1), 2 * rank, j_from_kappa(kappa2));

        self.multipole_cache.insert(key, r);
        Ok(r)
    }

    /// Grant's spherical-Bessel-weighted radial integral of order `m`.
    fn multipole_ij(&self, aw: f64, m: i32, k1: usize, k2: usize, t: i32) -> Result<f64> {
        let orb1 = self.orbital(k1)?;
        let orb2 = self.orbital(k2)?;
        let pot = &self.potential;
        let f: Vec<f64> = pot
            .rad()
            .iter()
            .map(|&r| super::numerics::besljn(1, m, aw * r))
            .collect();
        integrate(pot, &f, orb1, orb2, t)
    }

    /// Slater radial integral of physical rank `k` over the orbital indices
    /// `(k0, k1, k2, k3)`; `(k0, k2)` is the inner pair. Modes: 0/1 fully
    /// relativistic, -1 quasirelativistic, 2/-2 the separable Coulomb
    /// factorization with the inner pair first/second.
    ///
    /// # Errors
    ///
    /// Fails on an unknown mode or invalid orbital index.
    pub fn slater(
        &mut self,
        k0: usize,
        k1: usize,
        k2: usize,
        k3: usize,
        k: i32,
        mode: i32,
    ) -> Result<f64> {
        let tag = slater_mode_tag(mode)?;
        let key = SlaterKey {
            k0,
            k1,
            k2,
            k3,
            k,
            tag,
        }
        .sorted();
        if let Some(&value) = self.slater_cache.get(&key) {
            return Ok(value);
        }

        let value = match mode {
            0 | 1 | -1 => {
                let orb0 = self.orbital(k0)?;
                let orb1 = self.orbital(k1)?;
                let orb2 = self.orbital(k2)?;
                let orb3 = self.orbital(k3)?;
                let pot = &self.potential;

                let (density, integrand) = if mode == -1 { (2, 2) } else { (1, 1) };
                let yk = get_yk(pot, k, orb0, orb2, density)?;
                let f: Vec<f64> = (0..MAX_POINTS).map(|i| yk[i] / pot.rad()[i]).collect();
                let mut s = integrate(pot, &f, orb1, orb3, integrand)?;
                if mode == -1 {
                    s *= orb0.qr_norm * orb1.qr_norm * orb2.qr_norm * orb3.qr_norm;
                }
                s
            }
            2 => {
                let mut s = if k == 0 {
                    if k0 == k2 { 1.0 } else { 0.0 }
                } else {
                    self.multipole_radial_nr(k + 256, k0, k2)?
                };
                if s != 0.0 {
                    s *= self.multipole_radial_nr(-k - 1 - 256, k1, k3)?;
                }
                s
            }
            _ => {
                let mut s = if k == 0 {
                    if k0 == k2 { 1.0 } else { 0.0 }
                } else {
                    self.multipole_radial_nr(k + 256, k1, k3)?
                };
                if s != 0.0 {
                    s *= self.multipole_radial_nr(-k - 1 - 256, k0, k2)?;
                }
                s
            }
        };

        self.slater_cache.insert(key, value);
        Ok(value)
    }

    /// Antisymmetrized direct and exchange Slater combinations of doubled
    /// rank `k` for the orbital indices `ks`, optionally overriding the
    /// coupled momenta with `j` (entries `<= 0` fall back to the orbital
    /// momenta). Returns `(direct, exchange)`.
    ///
    /// Exchange is suppressed for equal-index pairs involving a bound
    /// orbital, where the Pauli principle already excludes it, and for the
    /// separable modes.
    ///
    /// # Errors
    ///
    /// Fails on an unknown mode or invalid orbital index.
    pub fn slater_total(
        &mut self,
        j: Option<[i32; 4]>,
        ks: [usize; 4],
        k: i32,
        mode: i32,
    ) -> Result<(f64, f64)> {
        let [k0, k1, k2, k3] = ks;
        let kk = k / 2;

        let mut js = j.unwrap_or([0; 4]);
        let mut kappas = [0; 4];
        let mut bound = [false; 4];
        for (slot, &index) in ks.iter().enumerate() {
            let orb = self.orbital(index)?;
            kappas[slot] = orb.kappa;
            bound[slot] = orb.is_bound();
            if js[slot] <= 0 {
                js[slot] = j_from_kappa(orb.kappa);
            }
        }
        let kl = kappas.map(l_from_kappa);

        let mut sd = 0.0;
        if is_even((kl[0] + kl[2]) / 2 + kk)
            && is_even((kl[1] + kl[3]) / 2 + kk)
            && triangle(js[0], js[2], k)
            && triangle(js[1], js[3], k)
        {
            let mut d = self.slater(k0, k1, k2, k3, kk, mode)?;
            d *= reduced_cl(js[0], k, js[2]);
            d *= reduced_cl(js[1], k, js[3]);
            if k0 == k1 && k2 == k3 {
                d *= 0.5;
            }
            sd = d;
        }

        if mode.abs() == 2 {
            return Ok((sd, 0.0));
        }
        if k0 == k1 && (bound[0] || bound[1]) {
            return Ok((sd, 0.0));
        }
        if k2 == k3 && (bound[2] || bound[3]) {
            return Ok((sd, 0.0));
        }

        let mut tmin = (js[0] - js[3]).abs().max((js[1] - js[2]).abs());
        let tmax = (js[0] + js[3]).min(js[1] + js[2]).min(MAX_RANK);
        if is_odd(tmin) {
            tmin += 1;
        }

        let mut se = 0.0;
        let mut t = tmin;
        while t <= tmax {
            if is_odd((kl[0] + kl[3] + t) / 2) || is_odd((kl[1] + kl[2] + t) / 2) {
                t += 2;
                continue;
            }
            let a = w6j(js[0], js[2], k, js[1], js[3], t);
            if a.abs() > 1e-10 {
                let mut e = self.slater(k0, k1, k3, k2, t / 2, mode)?;
                e *= reduced_cl(js[0], t, js[3]);
                e *= reduced_cl(js[1], t, js[2]);
                e *= a * f64::from(k + 1);
                if is_odd(t / 2 + kk) {
                    e = -e;
                }
                se += e;
            }
            t += 2;
        }

        Ok((sd, se))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k0: usize, k1: usize, k2: usize, k3: usize) -> SlaterKey {
        SlaterKey {
            k0,
            k1,
            k2,
            k3,
            k: 1,
            tag: 0,
        }
    }

    #[test]
    fn sort_is_idempotent() {
        for (a, b, c, d) in [(3, 1, 4, 1), (5, 9, 2, 6), (0, 0, 7, 3), (2, 2, 2, 2)] {
            let once = key(a, b, c, d).sorted();
            assert_eq!(once.sorted(), once);
        }
    }

    #[test]
    fn sort_respects_permutation_symmetries() {
        let reference = key(2, 3, 5, 7).sorted();
        // (k0 <-> k2), (k1 <-> k3) and the pair swap all describe the same
        // integral
        assert_eq!(key(5, 3, 2, 7).sorted(), reference);
        assert_eq!(key(2, 7, 5, 3).sorted(), reference);
        assert_eq!(key(3, 2, 7, 5).sorted(), reference);
        assert_eq!(key(5, 7, 2, 3).sorted(), reference);
    }

    #[test]
    fn sort_orders_equal_leading_indices() {
        let sorted = key(1, 1, 9, 4).sorted();
        assert!(sorted.k2 <= sorted.k3);
        assert_eq!((sorted.k0, sorted.k1), (1, 1));
    }

    #[test]
    fn mode_tags() {
        assert_eq!(slater_mode_tag(0).unwrap(), slater_mode_tag(1).unwrap());
        assert!(slater_mode_tag(2).is_ok());
        assert!(slater_mode_tag(-1).is_ok());
        assert!(slater_mode_tag(-2).is_ok());
        assert!(slater_mode_tag(3).is_err());
    }
}
