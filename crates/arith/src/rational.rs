//! Big-integer and rational helpers: factorials, binomial coefficients,
//! Bernoulli numbers.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// `n` as an exact rational.
pub fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// `num/den` as an exact rational.
pub fn frac(num: i64, den: i64) -> BigRational {
    BigRational::new(BigInt::from(num), BigInt::from(den))
}

pub fn factorial(n: u64) -> BigInt {
    (1..=n).map(BigInt::from).product()
}

/// Binomial coefficient, with the usual extension to a negative upper
/// argument: `binomial(-n, k) = (-1)^k binomial(n + k - 1, k)`.
pub fn binomial(n: i64, k: i64) -> BigInt {
    if k < 0 {
        return BigInt::zero();
    }
    if n < 0 {
        let val = binomial(k - n - 1, k);
        return if k % 2 == 0 { val } else { -val };
    }
    if k > n {
        return BigInt::zero();
    }
    let k = k.min(n - k);
    let mut num = BigInt::one();
    let mut den = BigInt::one();
    for i in 0..k {
        num *= n - i;
        den *= i + 1;
    }
    num / den
}

/// The Bernoulli number `B_n`, with the convention `B_1 = -1/2`.
pub fn bernoulli(n: u64) -> BigRational {
    let mut b: Vec<BigRational> = Vec::with_capacity(n as usize + 1);
    for m in 0..=n {
        let mut acc = BigRational::zero();
        for (k, bk) in b.iter().enumerate() {
            acc += BigRational::from_integer(binomial(m as i64 + 1, k as i64)) * bk;
        }
        b.push(-acc / rat(m as i64 + 1));
        if m == 0 {
            b[0] = BigRational::one();
        }
    }
    b.pop().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factorial() {
        assert_eq!(factorial(0), BigInt::from(1));
        assert_eq!(factorial(5), BigInt::from(120));
        assert_eq!(factorial(12), BigInt::from(479001600u64));
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(7, 3), BigInt::from(35));
        assert_eq!(binomial(7, 0), BigInt::from(1));
        assert_eq!(binomial(3, 5), BigInt::from(0));
        assert_eq!(binomial(3, -1), BigInt::from(0));
        // (-2 choose 3) = -binomial(4, 3)
        assert_eq!(binomial(-2, 3), BigInt::from(-4));
        assert_eq!(binomial(-1, 2), BigInt::from(1));
    }

    #[test]
    fn test_bernoulli() {
        assert_eq!(bernoulli(0), rat(1));
        assert_eq!(bernoulli(1), frac(-1, 2));
        assert_eq!(bernoulli(2), frac(1, 6));
        assert_eq!(bernoulli(3), rat(0));
        assert_eq!(bernoulli(12), frac(-691, 2730));
    }
}
