//! Relativistic shells and their quantum-number utilities.
//!
//! A shell is the quantum triple (n, kappa, nq). All angular momenta handled
//! by this crate, including orbital ones, are stored as twice their physical
//! value so that half-integral momenta stay integral.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Spectroscopic symbols for orbital angular momenta up to l = 13.
pub const SPEC_SYMBOLS: [char; 14] = [
    's', 'p', 'd', 'f', 'g', 'h', 'i', 'k', 'l', 'm', 'n', 'o', 'q', 'r',
];

/// Doubled total angular momentum 2j for a given `kappa`.
#[must_use]
pub const fn j_from_kappa(kappa: i32) -> i32 {
    2 * kappa.abs() - 1
}

/// Doubled orbital angular momentum 2l for a given `kappa`.
#[must_use]
pub const fn l_from_kappa(kappa: i32) -> i32 {
    if kappa < 0 { -2 * kappa - 2 } else { 2 * kappa }
}

/// Doubled (2j, 2l) for a given `kappa`.
#[must_use]
pub const fn jl_from_kappa(kappa: i32) -> (i32, i32) {
    (j_from_kappa(kappa), l_from_kappa(kappa))
}

/// The `kappa` encoding the doubled momenta 2j and 2l.
#[must_use]
pub const fn kappa_from_jl(j2: i32, l2: i32) -> i32 {
    if j2 < l2 { (j2 + 1) / 2 } else { -(j2 + 1) / 2 }
}

/// A relativistic shell: principal quantum number, relativistic angular
/// quantum number and occupation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Shell {
    /// Principal quantum number.
    pub n: i32,
    /// Relativistic angular quantum number; the sign encodes whether
    /// j = l + 1/2 (negative) or j = l - 1/2 (positive).
    pub kappa: i32,
    /// Number of electrons in the shell.
    pub nq: i32,
}

impl Shell {
    /// Constructor.
    #[must_use]
    pub const fn new(n: i32, kappa: i32, nq: i32) -> Self {
        Self { n, kappa, nq }
    }

    /// Constructor from the doubled momenta 2j and 2l.
    #[must_use]
    pub const fn from_jl(n: i32, j2: i32, l2: i32, nq: i32) -> Self {
        Self::new(n, kappa_from_jl(j2, l2), nq)
    }

    /// Doubled total angular momentum of this shell.
    #[must_use]
    pub const fn j2(&self) -> i32 {
        j_from_kappa(self.kappa)
    }

    /// Doubled orbital angular momentum of this shell.
    #[must_use]
    pub const fn l2(&self) -> i32 {
        l_from_kappa(self.kappa)
    }

    /// Maximum occupation, 2j + 1.
    #[must_use]
    pub const fn capacity(&self) -> i32 {
        self.j2() + 1
    }

    /// Whether the shell is completely filled.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.nq == self.capacity()
    }

    /// Parity contribution of the shell, l * nq mod 2.
    #[must_use]
    pub const fn parity(&self) -> i32 {
        (self.l2() / 2 * self.nq) & 1
    }
}

/// Orders shells by (n, |kappa|, sign), innermost smallest.
impl Ord for Shell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.n, self.kappa.abs(), self.kappa.signum())
            .cmp(&(other.n, other.kappa.abs(), other.kappa.signum()))
    }
}

impl PartialOrd for Shell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = self.l2() / 2;
        let symbol = SPEC_SYMBOLS
            .get(usize::try_from(l).unwrap_or(SPEC_SYMBOLS.len()))
            .copied()
            .unwrap_or('?');
        let sign = if self.kappa > 0 { "-" } else { "+" };
        write!(f, "{}{symbol}{sign}{}", self.n, self.nq)
    }
}

/// Error type keeping information if [`Shell::from_str`] went wrong.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct ParseShellError(pub(crate) String);

impl FromStr for Shell {
    type Err = ParseShellError;

    /// Parses spectroscopic notation such as `"1s"`, `"2p-"`, `"3d+4"`. The
    /// optional sign selects j = l - 1/2 (`-`) or j = l + 1/2 (`+`, the
    /// default); the trailing number is the occupation (default 1).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars().peekable();

        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let n: i32 = digits
            .parse()
            .map_err(|_| ParseShellError(format!("missing principal quantum number in '{s}'")))?;

        let symbol = chars
            .next()
            .ok_or_else(|| ParseShellError(format!("missing orbital symbol in '{s}'")))?;
        let l = SPEC_SYMBOLS
            .iter()
            .position(|&c| c == symbol.to_ascii_lowercase())
            .ok_or_else(|| ParseShellError(format!("unknown orbital symbol '{symbol}'")))?;
        let l = i32::try_from(l).unwrap();
        if l >= n {
            return Err(ParseShellError(format!("l = {l} is not below n = {n} in '{s}'")));
        }

        let kappa = match chars.peek().copied() {
            Some('+') => {
                chars.next();
                -(l + 1)
            }
            Some('-') => {
                chars.next();
                if l == 0 {
                    return Err(ParseShellError(format!("no j = l - 1/2 state for '{s}'")));
                }
                l
            }
            _ => -(l + 1),
        };

        let rest: String = chars.collect();
        let nq = if rest.is_empty() {
            1
        } else {
            rest.parse()
                .map_err(|_| ParseShellError(format!("bad occupation '{rest}' in '{s}'")))?
        };
        let shell = Self::new(n, kappa, nq);
        if nq < 0 || nq > shell.capacity() {
            return Err(ParseShellError(format!(
                "occupation {nq} exceeds capacity {} of '{s}'",
                shell.capacity()
            )));
        }

        Ok(shell)
    }
}

/// The coupled state of a shell within a configuration state function.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ShellState {
    /// Doubled total angular momentum of the shell itself.
    pub shell_j: i32,
    /// Doubled total angular momentum of this shell coupled with all inner
    /// shells. For the innermost shell this equals `shell_j`.
    pub total_j: i32,
    /// Seniority of the shell state.
    pub nu: i32,
    /// Auxiliary quantum number resolving states that share (J, nu).
    pub nr: i32,
}

impl ShellState {
    /// Constructor.
    #[must_use]
    pub const fn new(shell_j: i32, total_j: i32, nu: i32, nr: i32) -> Self {
        Self {
            shell_j,
            total_j,
            nu,
            nr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kappa_round_trip() {
        for kappa in (-20..=20).filter(|&k| k != 0) {
            let (j2, l2) = jl_from_kappa(kappa);
            assert_eq!(kappa_from_jl(j2, l2), kappa, "kappa = {kappa}");
            assert_eq!(j2, 2 * kappa.abs() - 1);
            assert_eq!((j2 - l2).abs(), 1);
        }
    }

    #[test]
    fn momenta_from_kappa() {
        // s1/2, p1/2, p3/2, d3/2, d5/2
        assert_eq!(jl_from_kappa(-1), (1, 0));
        assert_eq!(jl_from_kappa(1), (1, 2));
        assert_eq!(jl_from_kappa(-2), (3, 2));
        assert_eq!(jl_from_kappa(2), (3, 4));
        assert_eq!(jl_from_kappa(-3), (5, 4));
    }

    #[test]
    fn parse_spectroscopic_notation() {
        assert_eq!("1s".parse(), Ok(Shell::new(1, -1, 1)));
        assert_eq!("1s2".parse(), Ok(Shell::new(1, -1, 2)));
        assert_eq!("2p-".parse(), Ok(Shell::new(2, 1, 1)));
        assert_eq!("2p+3".parse(), Ok(Shell::new(2, -2, 3)));
        assert_eq!("3d-4".parse(), Ok(Shell::new(3, 2, 4)));
        assert!("p2".parse::<Shell>().is_err());
        assert!("1p".parse::<Shell>().is_err());
        assert!("1s-".parse::<Shell>().is_err());
        assert!("2p+9".parse::<Shell>().is_err());
    }

    #[test]
    fn closed_shell_capacity() {
        assert!(Shell::new(1, -1, 2).is_closed());
        assert!(Shell::new(2, -2, 4).is_closed());
        assert!(!Shell::new(2, -2, 3).is_closed());
    }

    #[test]
    fn shell_parity() {
        assert_eq!(Shell::new(2, 1, 1).parity(), 1);
        assert_eq!(Shell::new(2, 1, 2).parity(), 0);
        assert_eq!(Shell::new(3, 2, 3).parity(), 0);
    }

    #[test]
    fn display_round_trip() {
        for text in ["1s+2", "2p-1", "3d+4"] {
            let shell: Shell = text.parse().unwrap();
            assert_eq!(shell.to_string(), text);
        }
    }
}
