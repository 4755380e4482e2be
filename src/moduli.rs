//! Moduli types: which partial compactification of `\bar M_{g,n}` is in play.

use std::fmt;

/// The open subsets of `\bar M_{g,n}` that strata can live in, in
/// increasing order of how much boundary they contain.
///
/// `Small` is an internal-only degenerate case used by the
/// relation-derivation machinery; it never appears at the top-level API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuliType {
    Small,
    /// Smooth curves.
    Sm,
    /// Rational tails.
    Rt,
    /// Compact type.
    Ct,
    /// All stable curves.
    St,
}

pub use ModuliType::{Ct, Rt, Sm, Small, St};

impl ModuliType {
    /// The ordinal level, with `Small = -1` and `Sm..St = 0..3`. Boundary
    /// legality checks and the sub-level bucketing are phrased in terms of
    /// this value.
    pub fn level(self) -> i32 {
        match self {
            Small => -1,
            Sm => 0,
            Rt => 1,
            Ct => 2,
            St => 3,
        }
    }

    pub fn from_level(level: i32) -> Self {
        match level {
            -1 => Small,
            0 => Sm,
            1 => Rt,
            2 => Ct,
            3 => St,
            _ => panic!("no moduli type of level {level}"),
        }
    }

    /// Number of sub-level buckets the enumerator tracks for this type.
    pub fn bucket_count(self) -> usize {
        match self {
            Small | Sm => 1,
            Rt => 2,
            Ct => 3,
            St => 4,
        }
    }
}

impl fmt::Display for ModuliType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Small => "small",
            Sm => "sm",
            Rt => "rt",
            Ct => "ct",
            St => "st",
        };
        write!(f, "{s}")
    }
}

/// Dimension of the part of `M_{g,n}` of the given moduli type; the socle
/// degree of the corresponding tautological ring.
pub fn dim_form(g: i64, n: i64, moduli_type: ModuliType) -> i64 {
    match moduli_type {
        St | Small => 3 * g - 3 + n,
        Ct => 2 * g - 3 + n,
        Rt => {
            if g > 0 {
                g - 2 + n
            } else {
                n - 3
            }
        }
        Sm => {
            if g == 0 {
                n - 3
            } else if n == 0 {
                g - 2
            } else {
                g - 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        assert!(Small < Sm && Sm < Rt && Rt < Ct && Ct < St);
        assert_eq!(ModuliType::from_level(St.level()), St);
    }

    #[test]
    fn test_dim_form() {
        assert_eq!(dim_form(2, 2, St), 5);
        assert_eq!(dim_form(2, 2, Ct), 3);
        assert_eq!(dim_form(2, 2, Rt), 2);
        assert_eq!(dim_form(2, 2, Sm), 1);
        assert_eq!(dim_form(0, 5, Sm), 2);
        assert_eq!(dim_form(3, 0, Sm), 1);
    }
}
