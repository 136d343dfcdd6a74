//! Quadrature, spline and spherical-Bessel kernels shared by the radial
//! integration routines.
//!
//! All quadrature here works on the index of the logarithmic grid with unit
//! spacing; integrands are expected to carry the measure `dr/drho` already.

/// Accumulates the running integral of `x` over `[i0, i1]` into `r`, with
/// `r[i0]` as the starting value. Third/fourth-order closed Newton-Cotes
/// formulas are used once enough points are available.
pub fn newton_cotes(r: &mut [f64], x: &[f64], i0: usize, i1: usize) {
    if i1 <= i0 {
        return;
    }

    match i1 - i0 {
        1 => {
            r[i0 + 1] = r[i0] + 0.5 * (x[i0] + x[i0 + 1]);
            return;
        }
        2 => {
            r[i0 + 1] = r[i0] + (5.0 * x[i0] + 8.0 * x[i0 + 1] - x[i0 + 2]) / 12.0;
            r[i0 + 2] = r[i0 + 1] + (-x[i0] + 8.0 * x[i0 + 1] + 5.0 * x[i0 + 2]) / 12.0;
            return;
        }
        _ => {}
    }

    // startup panels from four-point formulas, then the three-step
    // Adams-Moulton corrector
    r[i0 + 1] = r[i0]
        + (9.0 * x[i0] + 19.0 * x[i0 + 1] - 5.0 * x[i0 + 2] + x[i0 + 3]) / 24.0;
    r[i0 + 2] = r[i0 + 1]
        + (-x[i0] + 13.0 * x[i0 + 1] + 13.0 * x[i0 + 2] - x[i0 + 3]) / 24.0;
    for i in i0 + 3..=i1 {
        r[i] = r[i - 1] + (x[i - 3] - 5.0 * x[i - 2] + 19.0 * x[i - 1] + 9.0 * x[i]) / 24.0;
    }
}

/// Second derivatives of the interpolating cubic spline through
/// `(x[i], y[i])`. End conditions follow the usual convention: a boundary
/// derivative of `1e30` or larger requests a natural spline.
#[must_use]
pub fn spline(x: &[f64], y: &[f64], yp1: f64, ypn: f64) -> Vec<f64> {
    let n = x.len();
    debug_assert_eq!(n, y.len());
    let mut y2 = vec![0.0; n];
    if n < 3 {
        return y2;
    }
    let mut work = vec![0.0; n];

    if yp1 < 0.99e30 {
        y2[0] = -0.5;
        work[0] = (3.0 / (x[1] - x[0])) * ((y[1] - y[0]) / (x[1] - x[0]) - yp1);
    }

    for i in 1..n - 1 {
        let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;
        let d = (y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
        work[i] = (6.0 * d / (x[i + 1] - x[i - 1]) - sig * work[i - 1]) / p;
    }

    let (qn, un) = if ypn < 0.99e30 {
        let h = x[n - 1] - x[n - 2];
        (0.5, (3.0 / h) * (ypn - (y[n - 1] - y[n - 2]) / h))
    } else {
        (0.0, 0.0)
    };
    y2[n - 1] = (un - qn * work[n - 2]) / (qn * y2[n - 2] + 1.0);
    for i in (0..n - 1).rev() {
        y2[i] = y2[i] * y2[i + 1] + work[i];
    }
    y2
}

/// Spherical Bessel function of order `n`: `j_n(x)` for `jy = 1`, `y_n(x)`
/// for `jy = 2`.
#[must_use]
pub fn besljn(jy: i32, n: i32, x: f64) -> f64 {
    debug_assert!(n >= 0);
    if jy == 2 {
        return bessel_y(n, x);
    }
    bessel_j(n, x)
}

fn bessel_j(n: i32, x: f64) -> f64 {
    if x == 0.0 {
        return if n == 0 { 1.0 } else { 0.0 };
    }
    if x.abs() < 1e-6 {
        // leading term of the ascending series, x^n / (2n + 1)!!
        let mut term = 1.0;
        for k in 0..n {
            term *= x / f64::from(2 * k + 3);
        }
        return term * (1.0 - x * x / f64::from(2 * (2 * n + 3)));
    }

    let j0 = x.sin() / x;
    if n == 0 {
        return j0;
    }
    let j1 = x.sin() / (x * x) - x.cos() / x;
    if n == 1 {
        return j1;
    }

    if x > f64::from(n) {
        // upward recursion is stable above the turning point
        let mut jm = j0;
        let mut j = j1;
        for k in 1..n {
            let next = f64::from(2 * k + 1) / x * j - jm;
            jm = j;
            j = next;
        }
        j
    } else {
        // downward Miller recursion, normalized against j0
        let start = n + 16 + (x.abs() as i32);
        let mut jp = 0.0;
        let mut j = 1e-30;
        let mut result = 0.0;
        for k in (0..=start).rev() {
            let jm = f64::from(2 * k + 3) / x * j - jp;
            jp = j;
            j = jm;
            if k == n {
                result = j;
            }
            // rescale to avoid overflow
            if j.abs() > 1e100 {
                jp /= 1e100;
                j /= 1e100;
                result /= 1e100;
            }
        }
        result * j0 / j
    }
}

fn bessel_y(n: i32, x: f64) -> f64 {
    let y0 = -x.cos() / x;
    if n == 0 {
        return y0;
    }
    let y1 = -x.cos() / (x * x) - x.sin() / x;
    if n == 1 {
        return y1;
    }
    let mut ym = y0;
    let mut y = y1;
    for k in 1..n {
        let next = f64::from(2 * k + 1) / x * y - ym;
        ym = y;
        y = next;
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn newton_cotes_integrates_a_cubic_exactly() {
        // f(t) = t^3 over [0, 10]: cumulative t^4/4
        let x: Vec<f64> = (0..=10).map(|i| (i as f64).powi(3)).collect();
        let mut r = vec![0.0; 11];
        newton_cotes(&mut r, &x, 0, 10);
        for (i, &value) in r.iter().enumerate() {
            let exact = (i as f64).powi(4) / 4.0;
            assert_approx_eq!(f64, value, exact, epsilon = 1e-9);
        }
    }

    #[test]
    fn newton_cotes_matches_sine_integral() {
        let n = 100;
        let h = std::f64::consts::PI / n as f64;
        let x: Vec<f64> = (0..=n).map(|i| (i as f64 * h).sin() * h).collect();
        let mut r = vec![0.0; n + 1];
        newton_cotes(&mut r, &x, 0, n);
        assert_approx_eq!(f64, r[n], 2.0, epsilon = 1e-7);
    }

    #[test]
    fn spline_reconstructs_a_parabola() {
        let x: Vec<f64> = (0..20).map(|i| f64::from(i) * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&t| t * t).collect();
        let y2 = spline(&x, &y, 1e30, 1e30);
        // away from the natural ends, the second derivative must be 2
        for &d in &y2[6..14] {
            assert_approx_eq!(f64, d, 2.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn bessel_j_known_values() {
        let x = 1.5;
        assert_approx_eq!(f64, besljn(1, 0, x), x.sin() / x, ulps = 4);
        assert_approx_eq!(
            f64,
            besljn(1, 1, x),
            x.sin() / (x * x) - x.cos() / x,
            ulps = 8
        );
        // j2 via the recurrence from the two explicit orders
        let j2 = 3.0 / x * besljn(1, 1, x) - besljn(1, 0, x);
        assert_approx_eq!(f64, besljn(1, 2, x), j2, epsilon = 1e-12);
    }

    #[test]
    fn bessel_j_small_argument() {
        // j3(x) ~ x^3/105 for small x
        let x = 1e-4;
        assert_approx_eq!(f64, besljn(1, 3, x), x.powi(3) / 105.0, epsilon = 1e-18);
    }

    #[test]
    fn bessel_y_known_values() {
        let x = 2.0;
        assert_approx_eq!(f64, besljn(2, 0, x), -x.cos() / x, ulps = 4);
        assert_approx_eq!(
            f64,
            besljn(2, 1, x),
            -x.cos() / (x * x) - x.sin() / x,
            ulps = 8
        );
    }
}
