//! Radial integration of operator kernels between orbital pairs.
//!
//! [`integrate`] evaluates `int f(r) O[orb1, orb2](r) dr` where the bilinear
//! combination `O` of large (P) and small (Q) components is selected by an
//! integer type:
//!
//! | type | integrand            |
//! |------|----------------------|
//! | 1    | P1 P2 + Q1 Q2        |
//! | 2    | P1 P2                |
//! | 3    | Q1 Q2                |
//! | 4    | P1 Q2 + Q1 P2        |
//! | 5    | P1 Q2 - Q1 P2        |
//!
//! The domain is split into sub-regions according to which operand is in its
//! directly integrated range and which has switched to the oscillatory
//! amplitude/phase representation; oscillatory stretches are integrated with
//! an analytic sin/cos quadrature over a cubic spline in the phase variable.

use super::error::{Error, Result};
use super::numerics::{newton_cotes, spline};
use super::orbital::Orbital;
use super::potential::{MAX_POINTS, Potential};

/// Integrates `f` against the component combination `t` of the two orbitals
/// and returns the value of the full radial integral.
///
/// # Errors
///
/// Fails if `t` is not one of the five supported integrand types.
pub fn integrate(
    pot: &Potential,
    f: &[f64],
    orb1: &Orbital,
    orb2: &Orbital,
    t: i32,
) -> Result<f64> {
    let mut r = vec![0.0; MAX_POINTS];
    let last = integrate_impl(pot, f, orb1, orb2, t, &mut r)?;
    Ok(r[last])
}

/// Integrates like [`integrate`] but returns the running integral on the full
/// grid, extended as a constant beyond the last integrated point.
///
/// # Errors
///
/// Fails if `t` is not one of the five supported integrand types.
pub fn integrate_running(
    pot: &Potential,
    f: &[f64],
    orb1: &Orbital,
    orb2: &Orbital,
    t: i32,
) -> Result<Vec<f64>> {
    let mut r = vec![0.0; MAX_POINTS];
    let last = integrate_impl(pot, f, orb1, orb2, t, &mut r)?;
    let tail = r[last];
    for value in &mut r[last + 1..] {
        *value = tail;
    }
    Ok(r)
}

fn integrate_impl(
    pot: &Potential,
    f: &[f64],
    orb1: &Orbital,
    orb2: &Orbital,
    t: i32,
    r: &mut [f64],
) -> Result<usize> {
    if !(1..=5).contains(&t) {
        return Err(Error::InvalidType(t));
    }
    if !orb1.has_wavefunction() || !orb2.has_wavefunction() {
        return Err(Error::MissingWavefunction);
    }

    let bound1 = orb1.is_bound();
    let bound2 = orb2.is_bound();
    let shared = orb1.ilast.min(orb2.ilast);

    dense_region(pot, f, orb1, orb2, 0, shared, t, r);

    if bound1 && bound2 {
        return Ok(shared);
    }

    if bound1 {
        // orb2 oscillates beyond its switch point
        oscillatory_region(pot, f, orb1, orb2, shared + 1, orb1.ilast, t, false, r);
        return Ok(orb1.ilast);
    }

    if bound2 {
        oscillatory_region(pot, f, orb2, orb1, shared + 1, orb2.ilast, t, true, r);
        return Ok(orb2.ilast);
    }

    // both continuum: finish the partially direct stretch first
    let i0 = shared + 1;
    if i0 > orb1.ilast {
        oscillatory_region(pot, f, orb2, orb1, i0, orb2.ilast, t, true, r);
    } else {
        oscillatory_region(pot, f, orb1, orb2, i0, orb1.ilast, t, false, r);
    }
    let i0 = orb1.ilast.max(orb2.ilast) + 1;
    both_oscillatory_region(pot, f, orb1, orb2, i0, MAX_POINTS - 1, t, r);
    Ok(MAX_POINTS - 1)
}

/// Newton-Cotes over a stretch where both operands are directly integrated.
fn dense_region(
    pot: &Potential,
    f: &[f64],
    orb1: &Orbital,
    orb2: &Orbital,
    i0: usize,
    i1: usize,
    t: i32,
    r: &mut [f64],
) {
    if i1 <= i0 {
        return;
    }
    let p1 = orb1.large();
    let p2 = orb2.large();
    let q1 = orb1.small();
    let q2 = orb2.small();
    let mut x = vec![0.0; i1 + 1];
    for i in i0..=i1 {
        let value = match t {
            1 => p1[i] * p2[i] + q1[i] * q2[i],
            2 => p1[i] * p2[i],
            3 => q1[i] * q2[i],
            4 => p1[i] * q2[i] + q1[i] * p2[i],
            _ => p1[i] * q2[i] - q1[i] * p2[i],
        };
        x[i] = value * f[i] * pot.dr_drho[i];
    }
    newton_cotes(r, &x, i0, i1);
}

/// The direct values of an operand at grid index `i`, reconstructed from the
/// amplitude/phase slots when `i` lies beyond its switch point.
fn direct_values(orb: &Orbital, i: usize) -> (f64, f64) {
    if i > orb.ilast && i + 1 < MAX_POINTS {
        let phase = orb.large()[i + 1];
        let (sin, cos) = phase.sin_cos();
        (
            orb.large()[i] * sin,
            orb.small()[i] * cos + orb.small()[i + 1] * sin,
        )
    } else {
        (orb.large()[i], orb.small()[i])
    }
}

/// Fills the unwritten odd sample offsets of an oscillatory stretch by
/// averaging their neighbours.
fn average_odd_points(r: &mut [f64], i0: usize, i1: usize) {
    let mut i = i0 + 1;
    while i <= i1 {
        r[i] = if i + 1 < MAX_POINTS {
            0.5 * (r[i - 1] + r[i + 1])
        } else {
            r[i - 1]
        };
        i += 2;
    }
}

/// Integrates a stretch where `direct` is in its solved range and `osc` has
/// switched to the amplitude/phase representation. `swapped` records that the
/// operands arrived in reverse order, which flips the sign of the
/// antisymmetric type 5.
#[allow(clippy::too_many_arguments)]
fn oscillatory_region(
    pot: &Potential,
    f: &[f64],
    direct: &Orbital,
    osc: &Orbital,
    i0: usize,
    i1: usize,
    t: i32,
    swapped: bool,
    r: &mut [f64],
) {
    if i1 < i0 {
        return;
    }
    if i0 > 0 {
        r[i0] = r[i0 - 1];
    }
    let po = osc.large();
    let qo = osc.small();

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut phase = Vec::new();
    let mut dphase = Vec::new();

    let mut push_sample = |i: usize, pd: f64, qd: f64| {
        let ip = i + 1;
        let (xv, yv) = match t {
            1 => (pd * po[i] + qd * qo[ip], qd * qo[i]),
            2 => (pd * po[i], 0.0),
            3 => (qd * qo[ip], qd * qo[i]),
            4 => (pd * qo[ip] + qd * po[i], pd * qo[i]),
            _ => (pd * qo[ip] - qd * po[i], -pd * qo[i]),
        };
        x.push(xv * f[i]);
        y.push(yv * f[i]);
        phase.push(po[ip]);
        dphase.push(1.0 / (po[i] * po[i]));
    };

    let mut i = i0;
    while i <= i1 && i + 1 < MAX_POINTS {
        let (pd, qd) = (direct.large()[i], direct.small()[i]);
        push_sample(i, pd, qd);
        i += 2;
    }
    // one trailing sample keeps the running integral continuous into the
    // next region
    if i + 1 < MAX_POINTS {
        let (pd, qd) = direct_values(direct, i);
        push_sample(i, pd, qd);
    }

    let y = (t != 2).then_some(y.as_mut_slice());
    integrate_sin_cos(pot, &mut x, y, &phase, &dphase, i0, r);

    if swapped && t == 5 {
        // flip this region's contribution, not the accumulated base
        let base = r[i0];
        let mut k = i0 + 2;
        while k <= i1 + 2 && k < MAX_POINTS {
            r[k] = 2.0 * base - r[k];
            k += 2;
        }
    }
    average_odd_points(r, i0, i1);
}

/// Integrates a stretch where both operands are oscillatory, by splitting the
/// product into sum-phase and difference-phase parts.
#[allow(clippy::too_many_arguments)]
fn both_oscillatory_region(
    pot: &Potential,
    f: &[f64],
    orb1: &Orbital,
    orb2: &Orbital,
    i0: usize,
    i1: usize,
    t: i32,
    r: &mut [f64],
) {
    if i1 < i0 {
        return;
    }
    if i0 > 0 {
        r[i0] = r[i0 - 1];
    }
    let p1 = orb1.large();
    let q1 = orb1.small();
    let p2 = orb2.large();
    let q2 = orb2.small();

    let mut x_sum = Vec::new();
    let mut y_sum = Vec::new();
    let mut x_diff = Vec::new();
    let mut y_diff = Vec::new();
    let mut phase_sum = Vec::new();
    let mut phase_diff = Vec::new();
    let mut dphase_sum = Vec::new();
    let mut dphase_diff = Vec::new();

    let mut i = i0;
    while i <= i1 && i + 1 < MAX_POINTS {
        let ip = i + 1;
        let half_f = 0.5 * f[i];
        match t {
            1 => {
                let x1 = q1[i] * q2[ip];
                let x2 = q1[ip] * q2[i];
                let y1 = q1[i] * q2[i];
                let y2 = q1[ip] * q2[ip] + p1[i] * p2[i];
                x_sum.push((x1 + x2) * half_f);
                y_sum.push((y1 - y2) * half_f);
                x_diff.push((-x1 + x2) * half_f);
                y_diff.push((y1 + y2) * half_f);
            }
            2 => {
                let y2 = -p1[i] * p2[i];
                x_sum.push(0.0);
                y_sum.push(y2 * half_f);
                x_diff.push(0.0);
                y_diff.push(-y2 * half_f);
            }
            3 => {
                let x1 = q1[i] * q2[ip];
                let x2 = q1[ip] * q2[i];
                let y1 = q1[i] * q2[i];
                let y2 = q1[ip] * q2[ip];
                x_sum.push((x1 + x2) * half_f);
                y_sum.push((y1 - y2) * half_f);
                x_diff.push((-x1 + x2) * half_f);
                y_diff.push((y1 + y2) * half_f);
            }
            4 => {
                let x1 = p1[i] * q2[i];
                let x2 = q1[i] * p2[i];
                let y2 = -p1[i] * q2[ip] - q1[ip] * p2[i];
                x_sum.push((x1 + x2) * half_f);
                y_sum.push(y2 * half_f);
                x_diff.push((x1 - x2) * half_f);
                y_diff.push(-y2 * half_f);
            }
            _ => {
                let x1 = p1[i] * q2[i];
                let x2 = q1[i] * p2[i];
                let y2 = -p1[i] * q2[ip] + q1[ip] * p2[i];
                x_sum.push((x1 - x2) * half_f);
                y_sum.push(y2 * half_f);
                x_diff.push((x1 + x2) * half_f);
                y_diff.push(-y2 * half_f);
            }
        }
        phase_sum.push(p1[ip] + p2[ip]);
        phase_diff.push(p1[ip] - p2[ip]);
        dphase_sum.push(1.0 / (p1[i] * p1[i]) + 1.0 / (p2[i] * p2[i]));
        dphase_diff.push(1.0 / (p1[i] * p1[i]) - 1.0 / (p2[i] * p2[i]));
        i += 2;
    }

    integrate_sin_cos(
        pot,
        &mut x_sum,
        Some(y_sum.as_mut_slice()),
        &phase_sum,
        &dphase_sum,
        i0,
        r,
    );
    let mut r1 = vec![0.0; MAX_POINTS];
    integrate_sin_cos(
        pot,
        &mut x_diff,
        Some(y_diff.as_mut_slice()),
        &phase_diff,
        &dphase_diff,
        i0,
        &mut r1,
    );

    let mut k = i0;
    while k <= i1 && k < MAX_POINTS {
        r[k] += r1[k];
        k += 2;
    }
    average_odd_points(r, i0, i1);
}

/// Analytic quadrature of `x sin(phase) + y cos(phase)` over an oscillatory
/// stretch sampled at every other grid point starting at `i0`.
///
/// Where the accumulated phase per step is small the samples are integrated
/// directly with Newton-Cotes; elsewhere `x/phase'` and `y/phase'` are
/// interpolated by a cubic spline in the phase variable and each spline
/// interval is integrated against sin and cos in closed form.
fn sin_cos_sample(x: &[f64], y: Option<&[f64]>, phase: &[f64], idx: usize) -> f64 {
    let mut value = x[idx] * phase[idx].sin();
    if let Some(y) = y {
        value += y[idx] * phase[idx].cos();
    }
    value
}

fn integrate_sin_cos(
    pot: &Potential,
    x: &mut [f64],
    mut y: Option<&mut [f64]>,
    phase: &[f64],
    dphase: &[f64],
    i0: usize,
    r: &mut [f64],
) {
    let j = phase.len();
    if j == 0 {
        return;
    }

    // slow-phase prefix handled by ordinary quadrature
    let mut i = 1;
    let mut k = i0 + 2;
    let mut z = vec![0.0; j];
    while i < j {
        let h = dphase[i - 1] + dphase[i];
        let dr = pot.rad[k] - pot.rad[k - 2];
        if h * dr > 0.1 {
            break;
        }
        z[i] = sin_cos_sample(x, y.as_deref(), phase, i) * pot.dr_drho[k];
        i += 1;
        k += 2;
    }
    if i > 1 {
        z[0] = sin_cos_sample(x, y.as_deref(), phase, 0) * pot.dr_drho[i0];
        let mut u = vec![0.0; i];
        newton_cotes(&mut u, &z[..i], 0, i - 1);
        // samples sit on every other grid point
        for (m, slot) in u.iter().enumerate().skip(1) {
            r[i0 + 2 * m] = r[i0] + 2.0 * slot;
        }
    }

    if j - i + 1 < 2 {
        // nothing oscillatory left
        if k < MAX_POINTS {
            r[k] = r[k - 2];
        }
        return;
    }

    // include the last slow samples for spline continuity
    let q = if i > 1 { i - 2 } else { i - 1 };

    for n in q..j {
        x[n] /= dphase[n];
    }
    let x_deriv = spline(&phase[q..], &x[q..], 1e30, 1e30);
    let y_deriv = y.as_deref_mut().map(|y| {
        for n in q..j {
            y[n] /= dphase[n];
        }
        spline(&phase[q..], &y[q..], 1e30, 1e30)
    });
    let y = y.as_deref();

    let mut sin0 = phase[i - 1].sin();
    let mut cos0 = phase[i - 1].cos();
    while i < j {
        let delta = phase[i] - phase[i - 1];
        let sin1 = phase[i].sin();
        let cos1 = phase[i].cos();
        let mut is = [0.0; 4];
        let mut ic = [0.0; 4];
        is[0] = -(cos1 - cos0);
        ic[0] = sin1 - sin0;
        let mut p = delta;
        for m in 1..4 {
            is[m] = -p * cos1 + m as f64 * ic[m - 1];
            ic[m] = p * sin1 - m as f64 * is[m - 1];
            p *= delta;
        }

        r[k] = r[k - 2];
        {
            let z0 = x_deriv[i - 1 - q];
            let z1 = x_deriv[i - q];
            let a = [
                x[i - 1],
                (x[i] - x[i - 1]) / delta - (z1 + z0) * delta / 6.0,
                z0 / 3.0,
                (z1 - z0) / (6.0 * delta),
            ];
            r[k] += a[0] * is[0] + a[1] * is[1] + a[2] * is[2] + a[3] * is[3];
        }
        if let (Some(y), Some(y_deriv)) = (y, y_deriv.as_ref()) {
            let z0 = y_deriv[i - 1 - q];
            let z1 = y_deriv[i - q];
            let b = [
                y[i - 1],
                (y[i] - y[i - 1]) / delta - (z1 + z0) * delta / 6.0,
                z0 / 3.0,
                (z1 - z0) / (6.0 * delta),
            ];
            r[k] += b[0] * ic[0] + b[1] * ic[1] + b[2] * ic[2] + b[3] * ic[3];
        }

        sin0 = sin1;
        cos0 = cos1;
        i += 1;
        k += 2;
    }
}

/// Computes the screening function `Y^k(orb1, orb2; r)`, the two-sided
/// radial accumulation of the pair density against `(r'< / r>)` powers.
/// `t` selects the pair density: 1 for `P P + Q Q`, 2 for `P P` only.
///
/// For k > 2 the small-r part of the inner integrand is floored to zero
/// while the pair density is negligible, which would otherwise cancel
/// catastrophically against the r^k weight.
///
/// # Errors
///
/// Fails if `t` is invalid; see [`integrate`].
pub fn get_yk(
    pot: &Potential,
    k: i32,
    orb1: &Orbital,
    orb2: &Orbital,
    t: i32,
) -> Result<Vec<f64>> {
    let mut weight = vec![0.0; MAX_POINTS];
    for (w, &rad) in weight.iter_mut().zip(pot.rad()) {
        *w = rad.powi(k);
    }

    let zk = integrate_running(pot, &weight, orb1, orb2, t)?;
    let mut yk = vec![0.0; MAX_POINTS];
    for i in 0..MAX_POINTS {
        yk[i] = zk[i] / weight[i];
    }

    let i0 = if k > 2 {
        let floor = yk.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs())) * 1e-3;
        let shared = orb1.ilast.min(orb2.ilast);
        let mut i0 = 0;
        for i in 0..shared {
            let density = orb1.large()[i] * orb2.large()[i] * pot.rad[i];
            if density.abs() > floor {
                break;
            }
            i0 = i + 1;
        }
        i0
    } else {
        0
    };

    weight.fill(0.0);
    for i in i0..MAX_POINTS {
        weight[i] = (pot.rad[i0] / pot.rad[i]).powi(k + 1);
    }
    let xk = integrate_running(pot, &weight, orb1, orb2, t)?;
    let tail = xk[MAX_POINTS - 1];
    for i in i0..MAX_POINTS {
        yk[i] += (tail - xk[i]) / weight[i];
    }
    Ok(yk)
}
