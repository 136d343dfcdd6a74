//! Weighted average configurations driving the self-consistent potential.

use super::error::Result;
use super::shell::kappa_from_jl;
use super::symmetry::GroupStore;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Static screening of outer shells: the listed principal quantum numbers
/// carry `charge / n` electrons each in an orbital of angular momentum `kl`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Screening {
    /// Principal quantum numbers of the screening orbitals.
    pub n: Vec<i32>,
    /// Total fractional charge distributed over the screening orbitals.
    pub charge: f64,
    /// Orbital angular momentum (physical l) requested for the screening
    /// orbitals; clamped to `n - 1`.
    pub kl: i32,
}

/// One entry of an average configuration: a shell with fractional occupation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AverageShell {
    /// Principal quantum number.
    pub n: i32,
    /// Relativistic angular quantum number.
    pub kappa: i32,
    /// Fractional occupation.
    pub nq: f64,
}

/// A deduplicated list of fractionally occupied shells aggregated over a set
/// of configuration groups.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AverageConfig {
    shells: Vec<AverageShell>,
}

impl AverageConfig {
    /// Builds the weighted average of the given groups. Occupations are
    /// averaged uniformly over the configurations within each group and then
    /// combined with the group weights; missing weights mean a uniform
    /// average over groups. Screening orbitals, when given, are appended with
    /// their fractional charge.
    ///
    /// # Errors
    ///
    /// Fails if a group index is not registered.
    pub fn build(
        store: &GroupStore,
        groups: &[usize],
        weights: Option<&[f64]>,
        screening: Option<&Screening>,
    ) -> Result<Self> {
        let uniform = 1.0 / groups.len().max(1) as f64;
        let weight_of = |i: usize| weights.map_or(uniform, |w| w[i]);
        let total_weight: f64 = (0..groups.len()).map(weight_of).sum();

        let mut entries: Vec<(i32, i32, f64)> = Vec::new();
        for (i, &kg) in groups.iter().enumerate() {
            let group = store.group(kg)?;
            if group.n_configs() == 0 {
                continue;
            }
            let scale = weight_of(i) / (total_weight * group.n_configs() as f64);
            for config in group.configs() {
                for shell in config.shells() {
                    entries.push((shell.n, shell.kappa, f64::from(shell.nq) * scale));
                }
            }
        }

        // deterministic order: innermost shells first
        entries.sort_unstable_by_key(|&(n, kappa, _)| (n, kappa.abs(), kappa.signum()));
        let grouped = entries.into_iter().chunk_by(|&(n, kappa, _)| (n, kappa));
        let mut shells: Vec<AverageShell> = grouped
            .into_iter()
            .map(|((n, kappa), chunk)| AverageShell {
                n,
                kappa,
                nq: chunk.map(|(_, _, nq)| nq).sum(),
            })
            .collect();

        if let Some(screening) = screening {
            let charge = screening.charge / screening.n.len().max(1) as f64;
            for &n in &screening.n {
                let l = screening.kl.min(n - 1).max(0);
                let kappa = kappa_from_jl(2 * l + 1, 2 * l);
                shells.push(AverageShell { n, kappa, nq: charge });
            }
        }

        Ok(Self { shells })
    }

    /// The averaged shells, innermost first.
    #[must_use]
    pub fn shells(&self) -> &[AverageShell] {
        &self.shells
    }

    /// Total (fractional) electron count.
    #[must_use]
    pub fn n_electrons(&self) -> f64 {
        self.shells.iter().map(|shell| shell.nq).sum()
    }
}
