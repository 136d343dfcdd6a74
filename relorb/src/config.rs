//! Electronic configurations and the angular-momentum coupling engine.
//!
//! A [`Configuration`] is an ordered sequence of relativistic shells, outer
//! shells first. Coupling proceeds from the innermost shell outward, so the
//! shell sequence is traversed in reverse; this ordering is a hard invariant
//! relied upon throughout the crate.

use super::error::{Error, Result};
use super::shell::{Shell, ShellState};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::shell::ParseShellError;

/// Allowed (2J, seniority, Nr) states of a partially filled shell, tabulated
/// for the occupations that the simple pairing rules do not cover. States
/// with equal (2J, nu) are distinguished by Nr.
const J5_Q3: &[(i32, i32, i32)] = &[(3, 3, 0), (5, 1, 0), (9, 3, 0)];
const J7_Q3: &[(i32, i32, i32)] = &[
    (3, 3, 0),
    (5, 3, 0),
    (7, 1, 0),
    (9, 3, 0),
    (11, 3, 0),
    (15, 3, 0),
];
const J7_Q4: &[(i32, i32, i32)] = &[
    (0, 0, 0),
    (4, 2, 0),
    (4, 4, 0),
    (8, 2, 0),
    (8, 4, 0),
    (10, 4, 0),
    (12, 2, 0),
    (16, 4, 0),
];
const J9_Q3: &[(i32, i32, i32)] = &[
    (3, 3, 0),
    (5, 3, 0),
    (7, 3, 0),
    (9, 1, 0),
    (9, 3, 0),
    (11, 3, 0),
    (13, 3, 0),
    (15, 3, 0),
    (17, 3, 0),
    (21, 3, 0),
];
const J9_Q4: &[(i32, i32, i32)] = &[
    (0, 0, 0),
    (0, 4, 0),
    (4, 2, 0),
    (4, 4, 0),
    (6, 4, 0),
    (8, 2, 0),
    (8, 4, 0),
    (8, 4, 1),
    (10, 4, 0),
    (12, 2, 0),
    (12, 4, 0),
    (12, 4, 1),
    (14, 4, 0),
    (16, 2, 0),
    (16, 4, 0),
    (18, 4, 0),
    (20, 4, 0),
    (24, 4, 0),
];
const J9_Q5: &[(i32, i32, i32)] = &[
    (1, 5, 0),
    (3, 3, 0),
    (5, 3, 0),
    (5, 5, 0),
    (7, 3, 0),
    (7, 5, 0),
    (9, 1, 0),
    (9, 3, 0),
    (9, 5, 0),
    (11, 3, 0),
    (11, 5, 0),
    (13, 3, 0),
    (13, 5, 0),
    (15, 3, 0),
    (15, 5, 0),
    (17, 3, 0),
    (17, 5, 0),
    (19, 5, 0),
    (21, 3, 0),
    (25, 5, 0),
];

/// Enumerates the allowed (2J, seniority, Nr) states of a single shell with
/// doubled momentum `j2` and occupation `nq`.
///
/// # Errors
///
/// Occupations of high-j shells that fall outside the tabulated range (more
/// than two particles or holes in a shell with 2j > 9) are rejected.
pub fn single_shell_states(j2: i32, nq: i32) -> Result<Vec<(i32, i32, i32)>> {
    let capacity = j2 + 1;
    if nq < 0 || nq > capacity {
        return Err(Error::UnsupportedShell { j2, nq });
    }
    // particle-hole conjugate shells share their coupled states
    let q = nq.min(capacity - nq);

    match q {
        0 => Ok(vec![(0, 0, 0)]),
        1 => Ok(vec![(j2, 1, 0)]),
        2 => {
            let mut states = vec![(0, 0, 0)];
            states.extend((1..).map(|k| (4 * k, 2, 0)).take_while(|&(t, _, _)| t < 2 * j2));
            Ok(states)
        }
        _ => match (j2, q) {
            (5, 3) => Ok(J5_Q3.to_vec()),
            (7, 3) => Ok(J7_Q3.to_vec()),
            (7, 4) => Ok(J7_Q4.to_vec()),
            (9, 3) => Ok(J9_Q3.to_vec()),
            (9, 4) => Ok(J9_Q4.to_vec()),
            (9, 5) => Ok(J9_Q5.to_vec()),
            _ => Err(Error::UnsupportedShell { j2, nq }),
        },
    }
}

/// Builds every coupled configuration state function of the shell sequence
/// `shells` (outer shells first) and returns them as a fresh table of shape
/// `n_csfs x n_shells`, rows ordered by the enumeration of the recursion.
///
/// # Errors
///
/// Fails if any shell occupation has no coupling table; see
/// [`single_shell_states`].
pub fn couple(shells: &[Shell]) -> Result<Array2<ShellState>> {
    if shells.is_empty() {
        return Ok(Array2::from_shape_vec((0, 0), vec![]).unwrap());
    }

    // start from the innermost shell and work outward
    let innermost = shells[shells.len() - 1];
    let mut partial: Vec<Vec<ShellState>> = single_shell_states(innermost.j2(), innermost.nq)?
        .into_iter()
        .map(|(j, nu, nr)| vec![ShellState::new(j, j, nu, nr)])
        .collect();

    for shell in shells.iter().rev().skip(1) {
        let states = single_shell_states(shell.j2(), shell.nq)?;
        let mut extended = Vec::new();
        for csf in &partial {
            let inner_j = csf.last().map_or(0, |state| state.total_j);
            for &(shell_j, nu, nr) in &states {
                let mut total = (inner_j - shell_j).abs();
                while total <= inner_j + shell_j {
                    let mut row = csf.clone();
                    row.push(ShellState::new(shell_j, total, nu, nr));
                    extended.push(row);
                    total += 2;
                }
            }
        }
        partial = extended;
    }

    let n_csfs = partial.len();
    let n_shells = shells.len();
    let mut flat = Vec::with_capacity(n_csfs * n_shells);
    for mut row in partial {
        // rows were built innermost-first; configurations store outer first
        row.reverse();
        flat.extend(row);
    }

    Ok(Array2::from_shape_vec((n_csfs, n_shells), flat).unwrap())
}

/// An electronic configuration: an ordered shell sequence together with all
/// of its coupled configuration state functions.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Configuration {
    shells: Vec<Shell>,
    csfs: Array2<ShellState>,
}

impl Configuration {
    /// Couples the given shells into a configuration. Shells are sorted outer
    /// first and equal (n, kappa) entries are merged before coupling.
    ///
    /// # Errors
    ///
    /// Fails if a merged occupation exceeds the shell capacity or has no
    /// coupling table.
    pub fn new(mut shells: Vec<Shell>) -> Result<Self> {
        shells.sort_unstable_by(|a, b| b.cmp(a));
        shells.dedup_by(|inner, outer| {
            if inner.n == outer.n && inner.kappa == outer.kappa {
                outer.nq += inner.nq;
                true
            } else {
                false
            }
        });
        for shell in &shells {
            if shell.nq > shell.capacity() {
                return Err(Error::UnsupportedShell {
                    j2: shell.j2(),
                    nq: shell.nq,
                });
            }
        }
        let csfs = couple(&shells)?;
        Ok(Self { shells, csfs })
    }

    /// The shell sequence, outer shells first.
    #[must_use]
    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    /// Number of shells.
    #[must_use]
    pub fn n_shells(&self) -> usize {
        self.shells.len()
    }

    /// Number of coupled configuration state functions.
    #[must_use]
    pub fn n_csfs(&self) -> usize {
        self.csfs.nrows()
    }

    /// The coupled states of CSF number `csf`, aligned with [`Self::shells`].
    ///
    /// # Panics
    ///
    /// Panics if `csf` is out of range.
    #[must_use]
    pub fn csf(&self, csf: usize) -> &[ShellState] {
        self.csfs
            .row(csf)
            .to_slice()
            .expect("CSF table rows are contiguous")
    }

    /// Doubled total angular momentum of CSF number `csf`.
    #[must_use]
    pub fn total_j(&self, csf: usize) -> i32 {
        if self.shells.is_empty() {
            0
        } else {
            self.csfs[[csf, 0]].total_j
        }
    }

    /// Parity of the configuration, `sum_i l_i nq_i mod 2`.
    #[must_use]
    pub fn parity(&self) -> i32 {
        self.shells.iter().map(Shell::parity).sum::<i32>() & 1
    }

    /// Total electron count.
    #[must_use]
    pub fn n_electrons(&self) -> i32 {
        self.shells.iter().map(|shell| shell.nq).sum()
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for shell in &self.shells {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{shell}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Configuration {
    type Err = ParseShellError;

    /// Parses a whitespace-separated shell list such as `"1s+2 2s+2 2p+4"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let shells = s
            .split_whitespace()
            .map(Shell::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(shells).map_err(|err| ParseShellError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angular::triangle;

    fn csf_count(j2: i32, nq: i32) -> usize {
        let kappa = -(j2 + 1) / 2;
        Configuration::new(vec![Shell::new(9, kappa, nq)])
            .unwrap()
            .n_csfs()
    }

    #[test]
    fn single_shell_state_counts() {
        // closed and almost-closed shells
        assert_eq!(csf_count(3, 0), 1);
        assert_eq!(csf_count(3, 4), 1);
        assert_eq!(csf_count(3, 1), 1);
        // pairing rule
        assert_eq!(csf_count(3, 2), 2);
        assert_eq!(csf_count(5, 2), 3);
        assert_eq!(csf_count(7, 2), 4);
        // tabulated occupations
        assert_eq!(csf_count(5, 3), 3);
        assert_eq!(csf_count(7, 3), 6);
        assert_eq!(csf_count(7, 4), 8);
        assert_eq!(csf_count(9, 3), 10);
        assert_eq!(csf_count(9, 4), 18);
        assert_eq!(csf_count(9, 5), 20);
        // particle-hole symmetry
        assert_eq!(csf_count(9, 7), csf_count(9, 3));
    }

    #[test]
    fn state_dimensions_sum_to_binomial() {
        // sum over states of (2J + 1) must equal C(2j + 1, q)
        for (j2, nq, expected) in [(5, 3, 20), (7, 4, 70), (9, 4, 210), (9, 5, 252)] {
            let total: i32 = single_shell_states(j2, nq)
                .unwrap()
                .iter()
                .map(|&(j, _, _)| j + 1)
                .sum();
            assert_eq!(total, expected, "2j = {j2}, q = {nq}");
        }
    }

    #[test]
    fn unsupported_occupation_is_rejected() {
        assert!(single_shell_states(11, 3).is_err());
        assert!(single_shell_states(9, 11).is_err());
    }

    #[test]
    fn closed_shells_couple_to_zero() {
        let cfg: Configuration = "1s+2 2s+2 2p-2 2p+4".parse().unwrap();
        assert_eq!(cfg.n_csfs(), 1);
        assert_eq!(cfg.total_j(0), 0);
        assert_eq!(cfg.parity(), 0);
        for state in cfg.csf(0) {
            assert_eq!(state.shell_j, 0);
            assert_eq!(state.nu, 0);
        }
    }

    #[test]
    fn coupling_respects_triangle_rule() {
        let cfg: Configuration = "2p+1 3d+1".parse().unwrap();
        // 3/2 x 5/2 -> J in {1, 2, 3, 4}
        assert_eq!(cfg.n_csfs(), 4);
        for csf in 0..cfg.n_csfs() {
            let states = cfg.csf(csf);
            // outermost entry couples the shell momentum with the inner total
            assert!(triangle(states[0].shell_j, states[1].total_j, states[0].total_j));
        }
    }

    #[test]
    fn shells_are_ordered_outer_first() {
        let cfg: Configuration = "1s+2 2p+1 2s+1".parse().unwrap();
        let ns: Vec<_> = cfg.shells().iter().map(|shell| shell.n).collect();
        assert_eq!(ns, [2, 2, 1]);
        assert!(cfg.shells()[0].l2() > cfg.shells()[1].l2());
    }

    #[test]
    fn duplicate_shells_merge() {
        let cfg = Configuration::new(vec![Shell::new(2, -2, 2), Shell::new(2, -2, 1)]).unwrap();
        assert_eq!(cfg.n_shells(), 1);
        assert_eq!(cfg.shells()[0].nq, 3);
    }

    #[test]
    fn open_p_shell_parity() {
        let cfg: Configuration = "1s+2 2p+3".parse().unwrap();
        assert_eq!(cfg.parity(), 1);
        assert_eq!(cfg.n_electrons(), 5);
    }
}
