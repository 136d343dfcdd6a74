//! Catch-all error for this crate.

use thiserror::Error;

/// Errors that can be raised while building configurations, optimizing
/// orbitals or evaluating radial integrals.
#[derive(Debug, Error)]
pub enum Error {
    /// The Dirac integrator failed to converge for the named orbital. This is
    /// fatal for the enclosing self-consistency run.
    #[error("Dirac solver diverged for orbital n = {n}, kappa = {kappa}, energy = {energy}")]
    DiracSolver {
        /// Principal quantum number of the failing orbital.
        n: i32,
        /// Relativistic angular quantum number of the failing orbital.
        kappa: i32,
        /// Energy estimate at the point of failure, in Hartree.
        energy: f64,
    },
    /// An orbital index that does not refer to a stored orbital.
    #[error("no orbital with index {0}")]
    InvalidOrbital(usize),
    /// A Slater mode selector outside {0, 1, -1, 2, -2}.
    #[error("unrecognized Slater mode {0}")]
    InvalidMode(i32),
    /// A radial integral was requested over an orbital whose wavefunction is
    /// not resident in memory.
    #[error("orbital wavefunction is not resident")]
    MissingWavefunction,
    /// An integrand type selector outside 1..=5.
    #[error("unrecognized integrand type {0}")]
    InvalidType(i32),
    /// A shell occupation for which no coupling table exists.
    #[error("no coupling table for occupation {nq} of a 2j = {j2} shell")]
    UnsupportedShell {
        /// Doubled total angular momentum of the shell.
        j2: i32,
        /// Occupation number of the shell.
        nq: i32,
    },
    /// A quantum-number combination that cannot label an orbital, for example
    /// `kappa = 0` or `l >= n` for a bound state.
    #[error("invalid quantum numbers n = {n}, kappa = {kappa}")]
    InvalidQuantumNumbers {
        /// Principal quantum number.
        n: i32,
        /// Relativistic angular quantum number.
        kappa: i32,
    },
    /// A configuration-group index that does not refer to a registered group.
    #[error("no configuration group with index {0}")]
    InvalidGroup(usize),
    /// Orbital persistence was requested but the context has no cache
    /// directory.
    #[error("no cache directory configured for orbital persistence")]
    NoCacheDir,
    /// A stored wavefunction could not be read back.
    #[error("failed to restore orbital {0}")]
    Restore(usize),
    /// I/O error raised while saving or restoring wavefunctions.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type definition for results with an [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
