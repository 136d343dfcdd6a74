//! Single-electron Dirac orbitals.

use super::potential::MAX_POINTS;
use serde::{Deserialize, Serialize};

/// A solved Dirac orbital on the radial grid.
///
/// Bound states have `n > 0` and negative energy. Continuum states have
/// positive energy and a negated auto-assigned ordinal as `n`; their large
/// and small component arrays switch beyond `ilast` to an alternating
/// amplitude/phase representation: at even index `i` the large slot holds the
/// local amplitude and the following odd slot the cumulative phase, while the
/// small slots hold the cosine and sine coefficients of the small component.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Orbital {
    /// Principal quantum number; `n < 0` labels continuum states.
    pub n: i32,
    /// Relativistic angular quantum number.
    pub kappa: i32,
    /// Orbital energy in Hartree.
    pub energy: f64,
    /// Last grid index of the directly integrated region.
    pub ilast: usize,
    /// Quasirelativistic normalization factor.
    pub qr_norm: f64,
    pub(crate) large: Vec<f64>,
    pub(crate) small: Vec<f64>,
    // asymptotic phase shift, computed on first request
    pub(crate) phase: Option<f64>,
}

impl Orbital {
    /// Creates an unsolved orbital with the given quantum numbers.
    #[must_use]
    pub const fn new(n: i32, kappa: i32, energy: f64) -> Self {
        Self {
            n,
            kappa,
            energy,
            ilast: 0,
            qr_norm: 1.0,
            large: Vec::new(),
            small: Vec::new(),
            phase: None,
        }
    }

    /// Whether this is a bound state.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.n > 0
    }

    /// Whether the wavefunction is resident in memory.
    #[must_use]
    pub fn has_wavefunction(&self) -> bool {
        !self.large.is_empty()
    }

    /// The large component (or, for a continuum tail, the amplitude/phase
    /// slots).
    #[must_use]
    pub fn large(&self) -> &[f64] {
        &self.large
    }

    /// The small component (or, for a continuum tail, its cosine/sine
    /// coefficient slots).
    #[must_use]
    pub fn small(&self) -> &[f64] {
        &self.small
    }

    /// Allocates zeroed component arrays, dropping any previous solution.
    pub(crate) fn reset_wavefunction(&mut self) {
        self.large = vec![0.0; MAX_POINTS];
        self.small = vec![0.0; MAX_POINTS];
        self.phase = None;
    }

    /// Releases the wavefunction storage, keeping the quantum numbers and
    /// energy.
    pub fn free_wavefunction(&mut self) {
        self.large = Vec::new();
        self.small = Vec::new();
    }

    /// Doubled total angular momentum.
    #[must_use]
    pub const fn j2(&self) -> i32 {
        super::shell::j_from_kappa(self.kappa)
    }

    /// Doubled orbital angular momentum.
    #[must_use]
    pub const fn l2(&self) -> i32 {
        super::shell::l_from_kappa(self.kappa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavefunction_lifecycle() {
        let mut orb = Orbital::new(1, -1, -0.5);
        assert!(orb.is_bound());
        assert!(!orb.has_wavefunction());
        orb.reset_wavefunction();
        assert!(orb.has_wavefunction());
        assert_eq!(orb.large().len(), MAX_POINTS);
        orb.free_wavefunction();
        assert!(!orb.has_wavefunction());
    }

    #[test]
    fn continuum_labels() {
        let orb = Orbital::new(-1, -1, 0.25);
        assert!(!orb.is_bound());
        assert_eq!(orb.j2(), 1);
        assert_eq!(orb.l2(), 0);
    }
}
