//! Wigner 3-j and 6-j symbols and reduced Clebsch-Gordan coefficients.
//!
//! All angular momenta are passed as twice their physical value, so that
//! half-integer momenta stay integral. Symbols are evaluated from the Racah
//! closed forms with precomputed natural-log factorials; for the ranks
//! appearing in radial integrals (k <= 10 or so) this is accurate to well
//! below 1e-12.

use std::sync::LazyLock;

const MAX_FACTORIAL: usize = 256;

static LN_FACTORIAL: LazyLock<[f64; MAX_FACTORIAL]> = LazyLock::new(|| {
    let mut table = [0.0; MAX_FACTORIAL];
    for i in 2..MAX_FACTORIAL {
        table[i] = table[i - 1] + f64::ln(i as f64);
    }
    table
});

pub(crate) const fn is_odd(x: i32) -> bool {
    x & 1 != 0
}

pub(crate) const fn is_even(x: i32) -> bool {
    x & 1 == 0
}

fn ln_fact(n: i32) -> f64 {
    // the triangle and projection gates keep every factorial argument
    // non-negative; enforce it unconditionally rather than only in debug
    assert!(n >= 0, "negative factorial argument {n}");
    LN_FACTORIAL[n as usize]
}

/// Whether the doubled momenta `j1`, `j2` and `j3` satisfy the triangle rule
/// and add up to an integral total.
#[must_use]
pub const fn triangle(j1: i32, j2: i32, j3: i32) -> bool {
    !is_odd(j1 + j2 + j3) && j3 >= (j1 - j2).abs() && j3 <= j1 + j2
}

/// Wigner 3-j symbol over doubled momenta and projections.
#[must_use]
pub fn w3j(j1: i32, j2: i32, j3: i32, m1: i32, m2: i32, m3: i32) -> f64 {
    if m1 + m2 + m3 != 0 || !triangle(j1, j2, j3) {
        return 0.0;
    }
    if m1.abs() > j1 || m2.abs() > j2 || m3.abs() > j3 {
        return 0.0;
    }
    if is_odd(j1 + m1) || is_odd(j2 + m2) || is_odd(j3 + m3) {
        return 0.0;
    }

    // all of these are integral once the selection rules above hold
    let jpm1 = (j1 + m1) / 2;
    let jmm1 = (j1 - m1) / 2;
    let jpm2 = (j2 + m2) / 2;
    let jmm2 = (j2 - m2) / 2;
    let jpm3 = (j3 + m3) / 2;
    let jmm3 = (j3 - m3) / 2;
    let j12m3 = (j1 + j2 - j3) / 2;
    let j13m2 = (j1 + j3 - j2) / 2;
    let j23m1 = (j2 + j3 - j1) / 2;
    let jsum = (j1 + j2 + j3) / 2;

    let prefactor = 0.5
        * (ln_fact(j12m3) + ln_fact(j13m2) + ln_fact(j23m1) - ln_fact(jsum + 1)
            + ln_fact(jpm1)
            + ln_fact(jmm1)
            + ln_fact(jpm2)
            + ln_fact(jmm2)
            + ln_fact(jpm3)
            + ln_fact(jmm3));

    let kmin = 0.max(-(j3 - j2 + m1) / 2).max(-(j3 - j1 - m2) / 2);
    let kmax = j12m3.min(jmm1).min(jpm2);

    let mut sum = 0.0;
    for k in kmin..=kmax {
        let ln_term = prefactor
            - (ln_fact(k)
                + ln_fact(j12m3 - k)
                + ln_fact(jmm1 - k)
                + ln_fact(jpm2 - k)
                + ln_fact((j3 - j2 + m1) / 2 + k)
                + ln_fact((j3 - j1 - m2) / 2 + k));
        let term = ln_term.exp();
        sum += if is_odd(k) { -term } else { term };
    }

    if is_odd((j1 - j2 - m3) / 2) { -sum } else { sum }
}

fn ln_triangle_coefficient(j1: i32, j2: i32, j3: i32) -> f64 {
    ln_fact((j1 + j2 - j3) / 2) + ln_fact((j1 - j2 + j3) / 2) + ln_fact((j2 + j3 - j1) / 2)
        - ln_fact((j1 + j2 + j3) / 2 + 1)
}

/// Wigner 6-j symbol over doubled momenta.
#[must_use]
pub fn w6j(j1: i32, j2: i32, j3: i32, j4: i32, j5: i32, j6: i32) -> f64 {
    if !triangle(j1, j2, j3)
        || !triangle(j1, j5, j6)
        || !triangle(j4, j2, j6)
        || !triangle(j4, j5, j3)
    {
        return 0.0;
    }

    let a1 = (j1 + j2 + j3) / 2;
    let a2 = (j1 + j5 + j6) / 2;
    let a3 = (j4 + j2 + j6) / 2;
    let a4 = (j4 + j5 + j3) / 2;
    let b1 = (j1 + j2 + j4 + j5) / 2;
    let b2 = (j2 + j3 + j5 + j6) / 2;
    let b3 = (j3 + j1 + j6 + j4) / 2;

    let prefactor = 0.5
        * (ln_triangle_coefficient(j1, j2, j3)
            + ln_triangle_coefficient(j1, j5, j6)
            + ln_triangle_coefficient(j4, j2, j6)
            + ln_triangle_coefficient(j4, j5, j3));

    let tmin = a1.max(a2).max(a3).max(a4);
    let tmax = b1.min(b2).min(b3);

    let mut sum = 0.0;
    for t in tmin..=tmax {
        let ln_term = prefactor + ln_fact(t + 1)
            - (ln_fact(t - a1)
                + ln_fact(t - a2)
                + ln_fact(t - a3)
                + ln_fact(t - a4)
                + ln_fact(b1 - t)
                + ln_fact(b2 - t)
                + ln_fact(b3 - t));
        let term = ln_term.exp();
        sum += if is_odd(t) { -term } else { term };
    }
    sum
}

/// Reduced Clebsch-Gordan coefficient of the spherical tensor `C^k` between
/// the spin-angular states `ja` and `jb` (doubled momenta).
#[must_use]
pub fn reduced_cl(ja: i32, k: i32, jb: i32) -> f64 {
    let phase = if is_odd((ja + 1) / 2) { -1.0 } else { 1.0 };
    phase * (f64::from(ja + 1) * f64::from(jb + 1)).sqrt() * w3j(ja, k, jb, 1, 0, -1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn w3j_known_values() {
        // (1/2 1/2 0; 1/2 -1/2 0) = 1/sqrt(2)
        assert_approx_eq!(f64, w3j(1, 1, 0, 1, -1, 0), 1.0 / 2.0_f64.sqrt(), ulps = 4);
        // (1 1 2; 1 -1 0) = 1/sqrt(30)
        assert_approx_eq!(f64, w3j(2, 2, 4, 2, -2, 0), 1.0 / 30.0_f64.sqrt(), ulps = 8);
        // (1 1 0; 0 0 0) = -1/sqrt(3)
        assert_approx_eq!(f64, w3j(2, 2, 0, 0, 0, 0), -1.0 / 3.0_f64.sqrt(), ulps = 4);
        // selection rules
        assert_approx_eq!(f64, w3j(2, 2, 2, 0, 0, 0), 0.0, ulps = 2);
        assert_approx_eq!(f64, w3j(1, 1, 4, 1, -1, 0), 0.0, ulps = 2);
    }

    #[test]
    fn w3j_symmetry_under_cyclic_permutation() {
        let a = w3j(3, 4, 5, 1, 2, -3);
        let b = w3j(4, 5, 3, 2, -3, 1);
        let c = w3j(5, 3, 4, -3, 1, 2);
        assert_approx_eq!(f64, a, b, ulps = 8);
        assert_approx_eq!(f64, b, c, ulps = 8);
    }

    #[test]
    fn w6j_known_values() {
        // {1/2 1/2 1; 1/2 1/2 1} = 1/6
        assert_approx_eq!(f64, w6j(1, 1, 2, 1, 1, 2), 1.0 / 6.0, ulps = 8);
        // {1 1 1; 1 1 1} = 1/6
        assert_approx_eq!(f64, w6j(2, 2, 2, 2, 2, 2), 1.0 / 6.0, ulps = 8);
        // {2 1 1; 1 1 1} = 1/6 * ... check against the orthogonality sum instead
        let mut sum = 0.0;
        for x in (0..=4).step_by(2) {
            sum += f64::from(x + 1) * w6j(2, 2, x, 2, 2, x);
        }
        // sum_x (2x+1) {j1 j2 x; j1 j2 x} = (-1)^(2(j1+j2)) = 1 for j1 = j2 = 1
        assert_approx_eq!(f64, sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn w6j_triangle_violations_vanish() {
        assert_approx_eq!(f64, w6j(1, 1, 3, 1, 1, 2), 0.0, ulps = 2);
        assert_approx_eq!(f64, w6j(2, 2, 8, 2, 2, 2), 0.0, ulps = 2);
    }

    #[test]
    fn reduced_cl_triangle_violation() {
        assert_approx_eq!(f64, reduced_cl(1, 6, 1), 0.0, ulps = 2);
    }

    #[test]
    fn reduced_cl_monopole_diagonal() {
        // <j||C^0||j> = -+sqrt(2j+1)
        for j2 in [1, 3, 5, 7] {
            let value = reduced_cl(j2, 0, j2);
            assert_approx_eq!(f64, value.abs(), f64::from(j2 + 1).sqrt(), ulps = 8);
        }
    }
}
