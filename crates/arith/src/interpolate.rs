//! Lagrange interpolation over the rationals.

use num_rational::BigRational;
use num_traits::{One, Zero};

/// Coefficients (constant term first) of the unique polynomial of degree
/// `< xs.len()` through the points `(xs[i], ys[i])`. The `xs` must be
/// pairwise distinct.
pub fn interpolate(xs: &[BigRational], ys: &[BigRational]) -> Vec<BigRational> {
    assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    let mut result = vec![BigRational::zero(); n];
    for i in 0..n {
        let mut num = vec![BigRational::one()];
        let mut den = BigRational::one();
        for (j, xj) in xs.iter().enumerate() {
            if j == i {
                continue;
            }
            num = mul_linear(&num, xj);
            den *= &xs[i] - xj;
        }
        let scale = &ys[i] / den;
        for (k, c) in num.iter().enumerate() {
            result[k] += c * &scale;
        }
    }
    result
}

/// Multiply by `(x - root)`.
fn mul_linear(poly: &[BigRational], root: &BigRational) -> Vec<BigRational> {
    let mut out = vec![BigRational::zero(); poly.len() + 1];
    for (k, c) in poly.iter().enumerate() {
        out[k + 1] += c;
        out[k] -= c * root;
    }
    out
}

pub fn poly_eval(coeffs: &[BigRational], x: &BigRational) -> BigRational {
    let mut acc = BigRational::zero();
    for c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::{frac, rat};

    #[test]
    fn test_interpolate_quadratic() {
        // x^2 - 1/2 through three points
        let xs = [rat(0), rat(1), rat(2)];
        let ys = [frac(-1, 2), frac(1, 2), frac(7, 2)];
        let coeffs = interpolate(&xs, &ys);
        assert_eq!(coeffs, vec![frac(-1, 2), rat(0), rat(1)]);
        assert_eq!(poly_eval(&coeffs, &rat(3)), frac(17, 2));
    }

    #[test]
    fn test_interpolate_constant() {
        let xs = [rat(5)];
        let ys = [frac(2, 3)];
        assert_eq!(interpolate(&xs, &ys), vec![frac(2, 3)]);
    }
}
