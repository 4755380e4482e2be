//! Decoration polynomials.
//!
//! Every cell of a stratum's incidence data is a polynomial in one formal
//! variable `X` with integer coefficients: genus plus kappa multiplicities
//! on a vertex, incidence plus psi exponents on a half-edge. Comparisons
//! look at the highest-degree terms first, which is the order the graph
//! invariant and the enumeration rely on.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// An integer polynomial in `X`, constant term first, no trailing zeros.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Poly(Vec<i64>);

impl Poly {
    pub fn zero() -> Self {
        Self(Vec::new())
    }

    pub fn constant(c: i64) -> Self {
        if c == 0 {
            Self::zero()
        } else {
            Self(vec![c])
        }
    }

    /// `c * X^k`.
    pub fn monomial(c: i64, k: usize) -> Self {
        if c == 0 {
            return Self::zero();
        }
        let mut coeffs = vec![0; k + 1];
        coeffs[k] = c;
        Self(coeffs)
    }

    pub fn x(k: usize) -> Self {
        Self::monomial(1, k)
    }

    /// The coefficient of `X^k`.
    pub fn coeff(&self, k: usize) -> i64 {
        self.0.get(k).copied().unwrap_or(0)
    }

    pub fn degree(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Add `c * X^k` in place.
    pub fn add_monomial(&mut self, c: i64, k: usize) {
        if c == 0 {
            return;
        }
        if self.0.len() <= k {
            self.0.resize(k + 1, 0);
        }
        self.0[k] += c;
        self.trim();
    }

    fn trim(&mut self) {
        while self.0.last() == Some(&0) {
            self.0.pop();
        }
    }
}

impl From<i64> for Poly {
    fn from(c: i64) -> Self {
        Self::constant(c)
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, rhs: &Poly) {
        if self.0.len() < rhs.0.len() {
            self.0.resize(rhs.0.len(), 0);
        }
        for (k, c) in rhs.0.iter().enumerate() {
            self.0[k] += c;
        }
        self.trim();
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, rhs: &Poly) {
        if self.0.len() < rhs.0.len() {
            self.0.resize(rhs.0.len(), 0);
        }
        for (k, c) in rhs.0.iter().enumerate() {
            self.0[k] -= c;
        }
        self.trim();
    }
}

impl Add<&Poly> for Poly {
    type Output = Poly;
    fn add(mut self, rhs: &Poly) -> Poly {
        self += rhs;
        self
    }
}

impl Sub<&Poly> for Poly {
    type Output = Poly;
    fn sub(mut self, rhs: &Poly) -> Poly {
        self -= rhs;
        self
    }
}

impl Ord for Poly {
    fn cmp(&self, other: &Self) -> Ordering {
        let d = self.0.len().max(other.0.len());
        for k in (0..d).rev() {
            match self.coeff(k).cmp(&other.coeff(k)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Poly {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut first = true;
        for k in (0..=self.degree()).rev() {
            let c = self.coeff(k);
            if c == 0 {
                continue;
            }
            if !first {
                write!(f, " {} ", if c < 0 { "-" } else { "+" })?;
            } else if c < 0 {
                write!(f, "-")?;
            }
            let a = c.abs();
            match k {
                0 => write!(f, "{a}")?,
                _ => {
                    if a != 1 {
                        write!(f, "{a}*")?;
                    }
                    if k == 1 {
                        write!(f, "X")?;
                    } else {
                        write!(f, "X^{k}")?;
                    }
                }
            }
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        // Highest-degree terms decide: X^2 > 5*X > 2, X + 5 > X + 3
        let x2 = Poly::x(2);
        let five_x = Poly::monomial(5, 1);
        assert!(x2 > five_x);
        assert!(five_x > Poly::constant(2));
        assert!(Poly::x(1) + &Poly::constant(5) > Poly::x(1) + &Poly::constant(3));
        assert!(Poly::zero() < Poly::constant(1));
    }

    #[test]
    fn test_arith() {
        let mut p = Poly::constant(2);
        p.add_monomial(1, 1);
        p.add_monomial(3, 2);
        assert_eq!(p.coeff(0), 2);
        assert_eq!(p.coeff(1), 1);
        assert_eq!(p.coeff(2), 3);
        assert_eq!(p.degree(), 2);
        p -= &Poly::monomial(3, 2);
        assert_eq!(p.degree(), 1);
        assert_eq!(format!("{p}"), "X + 2");
    }
}
