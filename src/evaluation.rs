//! Socle evaluation: the isomorphism `R^d(M) -> Q` in the top tautological
//! degree, for each moduli type.
//!
//! A generator evaluates to the product over its vertices of a closed
//! formula in the local genus and the psi/kappa decorations. Stable curves
//! use Witten-Kontsevich intersection numbers, compact type integrates
//! against `lambda_g`, rational tails and smooth curves against
//! `lambda_g lambda_{g-1}`. Kappa classes are first traded for psi classes
//! at extra marked points by the set-partition conversion.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use arith::{bernoulli, factorial, frac, rat, setparts_with_auts};

use crate::moduli::{dim_form, ModuliType};
use crate::strata::StrataCache;

/// Double factorial of an odd integer, with `(-1)!! = 1`.
fn odd_double_factorial(m: i64) -> BigInt {
    let mut result = BigInt::one();
    let mut k = 3;
    while k <= m {
        result *= k;
        k += 2;
    }
    result
}

fn multinomial(exps: &[usize]) -> BigInt {
    let total: usize = exps.iter().sum();
    let mut result = factorial(total as u64);
    for &e in exps {
        result /= factorial(e as u64);
    }
    result
}

/// Trade a multiset of kappa indices for psi exponents at new marked
/// points: one term per set partition, a point of exponent `sum(B) + 1`
/// per block `B`, with coefficient `prod_B (-1)^(|B|-1) (|B|-1)!`.
fn kappa_tau_terms(kappa_list: &[usize]) -> Vec<(Vec<usize>, BigRational)> {
    if kappa_list.is_empty() {
        return vec![(Vec::new(), BigRational::one())];
    }
    let symlist: Vec<u32> = kappa_list.iter().map(|&k| k as u32).collect();
    let mut terms = Vec::new();
    for (parts, mult) in setparts_with_auts(&symlist) {
        let mut coeff = rat(mult);
        let mut extra = Vec::new();
        for block in &parts {
            let size = block.len() as i64;
            let sign = if size % 2 == 1 { 1 } else { -1 };
            coeff *= rat(sign) * BigRational::from(factorial((size - 1) as u64));
            extra.push(block.iter().map(|&x| x as usize).sum::<usize>() + 1);
        }
        terms.push((extra, coeff));
    }
    terms
}

impl StrataCache {
    /// Evaluate generator `num` of the top tautological degree against the
    /// socle. The value is the product of the per-vertex formulas; a vertex
    /// whose decorations miss its local socle degree is an internal error.
    pub fn socle_evaluation(
        &self,
        num: usize,
        g: i64,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> BigRational {
        let r = dim_form(g, markings.len() as i64, moduli_type) as usize;
        let graph = self.all_strata(g, r, markings, moduli_type)[num].clone();
        let mut answer = BigRational::one();
        for i in 0..graph.num_vertices() {
            let g_local = graph.genus[i].coeff(0);
            let mut psi_list = Vec::new();
            for e in &graph.edges {
                if e.ends[i].coeff(0) > 0 {
                    psi_list.push(e.ends[i].coeff(1) as usize);
                    if e.ends[i].coeff(0) == 2 {
                        psi_list.push(e.ends[i].coeff(2) as usize);
                    }
                }
            }
            let mut kappa_list = Vec::new();
            for j in 1..=graph.genus[i].degree() {
                for _ in 0..graph.genus[i].coeff(j) {
                    kappa_list.push(j);
                }
            }
            let total = psi_list.iter().sum::<usize>() + kappa_list.iter().sum::<usize>();
            assert_eq!(
                total as i64,
                dim_form(g_local, psi_list.len() as i64, moduli_type),
                "vertex decorations do not fill the local socle degree"
            );
            answer *= self.socle_formula(g_local, &psi_list, &kappa_list, moduli_type);
        }
        answer
    }

    /// The per-vertex socle value for local genus `g` with the given psi
    /// exponents and kappa indices. Genus 0 always reduces to plain
    /// genus-0 intersection numbers.
    pub fn socle_formula(
        &self,
        g: i64,
        psi_list: &[usize],
        kappa_list: &[usize],
        moduli_type: ModuliType,
    ) -> BigRational {
        if g == 0 {
            return self.stable_formula(g, psi_list, kappa_list);
        }
        match moduli_type {
            ModuliType::St | ModuliType::Small => self.stable_formula(g, psi_list, kappa_list),
            ModuliType::Ct => self.compact_type_formula(g, psi_list, kappa_list),
            ModuliType::Rt => self.rational_tails_formula(g, psi_list, kappa_list),
            ModuliType::Sm => self.smooth_formula(g, psi_list, kappa_list),
        }
    }

    fn stable_formula(&self, g: i64, psi_list: &[usize], kappa_list: &[usize]) -> BigRational {
        let mut total = BigRational::zero();
        for (extra, coeff) in kappa_tau_terms(kappa_list) {
            let mut exps = psi_list.to_vec();
            exps.extend(extra);
            total += coeff * self.tau_intersection(g, exps);
        }
        total
    }

    /// `<tau_{a_1} ... tau_{a_n}>_g`, by the genus-0 closed formula and the
    /// Witten-Kontsevich (DVV) recursion above it.
    fn tau_intersection(&self, g: i64, mut exps: Vec<usize>) -> BigRational {
        let n = exps.len() as i64;
        if g < 0 || exps.iter().map(|&a| a as i64).sum::<i64>() != 3 * g - 3 + n {
            return BigRational::zero();
        }
        if g == 0 {
            if n < 3 {
                return BigRational::zero();
            }
            let mut den = BigInt::one();
            for &a in &exps {
                den *= factorial(a as u64);
            }
            return BigRational::new(factorial((n - 3) as u64), den);
        }
        exps.sort_unstable_by(|a, b| b.cmp(a));
        if exps.is_empty() {
            // only reachable as <>_1, which never pairs with anything
            return BigRational::zero();
        }
        if g == 1 && exps == [1] {
            return frac(1, 24);
        }
        let key = (g, exps.clone());
        if let Some(v) = self.socle_recursions.get(&key) {
            return v.clone();
        }
        let answer = if exps[exps.len() - 1] == 0 {
            // string equation on a tau_0 factor
            let rest = &exps[..exps.len() - 1];
            let mut total = BigRational::zero();
            for j in 0..rest.len() {
                if rest[j] == 0 {
                    continue;
                }
                let mut e = rest.to_vec();
                e[j] -= 1;
                total += self.tau_intersection(g, e);
            }
            total
        } else {
            self.dvv_step(g, &exps)
        };
        self.socle_recursions.insert(key, answer.clone());
        answer
    }

    /// One step of the DVV recursion, removing the largest exponent
    /// `k + 1 = exps[0]`. All exponents are positive here.
    fn dvv_step(&self, g: i64, exps: &[usize]) -> BigRational {
        let k = exps[0] as i64 - 1;
        let rest = &exps[1..];
        let mut total = BigRational::zero();
        for j in 0..rest.len() {
            let aj = rest[j] as i64;
            let mut e = rest.to_vec();
            e.remove(j);
            e.push((aj + k) as usize);
            let coeff = BigRational::new(
                odd_double_factorial(2 * k + 2 * aj + 1),
                odd_double_factorial(2 * aj - 1),
            );
            total += coeff * self.tau_intersection(g, e);
        }
        for a in 0..k.max(0) {
            let b = k - 1 - a;
            let coeff = BigRational::from(
                odd_double_factorial(2 * a + 1) * odd_double_factorial(2 * b + 1),
            );
            let mut e = rest.to_vec();
            e.push(a as usize);
            e.push(b as usize);
            let mut part = self.tau_intersection(g - 1, e);
            for g1 in 0..=g {
                for mask in 0u32..(1 << rest.len()) {
                    let mut e1 = vec![a as usize];
                    let mut e2 = vec![b as usize];
                    for (j, &x) in rest.iter().enumerate() {
                        if mask & (1 << j) != 0 {
                            e1.push(x);
                        } else {
                            e2.push(x);
                        }
                    }
                    let left = self.tau_intersection(g1, e1);
                    if left.is_zero() {
                        continue;
                    }
                    part += left * self.tau_intersection(g - g1, e2);
                }
            }
            total += coeff * part * frac(1, 2);
        }
        total / BigRational::from(odd_double_factorial(2 * k + 3))
    }

    /// Integration against `lambda_g` on compact type. The constant is
    /// `(2^{2g-1} - 1)/2^{2g-1} * |B_{2g}|/(2g)!` by the lambda_g theorem.
    fn compact_type_formula(
        &self,
        g: i64,
        psi_list: &[usize],
        kappa_list: &[usize],
    ) -> BigRational {
        let two_pow = BigInt::from(2).pow((2 * g - 1) as u32);
        let c_g = BigRational::new(&two_pow - 1, two_pow)
            * bernoulli(2 * g as u64).abs()
            / BigRational::from(factorial(2 * g as u64));
        let mut total = BigRational::zero();
        for (extra, coeff) in kappa_tau_terms(kappa_list) {
            let mut exps = psi_list.to_vec();
            exps.extend(extra);
            total += coeff * BigRational::from(multinomial(&exps));
        }
        c_g * total
    }

    /// Integration against `lambda_g lambda_{g-1}` on rational tails:
    /// `int psi^{b_1}..psi^{b_n} = (2g+n-3)! |B_{2g}| /
    /// (2^{2g-1} (2g)! prod (2b_i-1)!!)`.
    fn rational_tails_formula(
        &self,
        g: i64,
        psi_list: &[usize],
        kappa_list: &[usize],
    ) -> BigRational {
        let scale = bernoulli(2 * g as u64).abs()
            / BigRational::from(BigInt::from(2).pow((2 * g - 1) as u32) * factorial(2 * g as u64));
        let mut total = BigRational::zero();
        for (extra, coeff) in kappa_tau_terms(kappa_list) {
            let mut exps = psi_list.to_vec();
            exps.extend(extra);
            let mut den = BigInt::one();
            for &b in &exps {
                den *= odd_double_factorial(2 * b as i64 - 1);
            }
            let n = exps.len() as i64;
            total += coeff * BigRational::new(factorial((2 * g + n - 3) as u64), den);
        }
        scale * total
    }

    /// On smooth curves with markings, all psi classes restrict to the one
    /// pulled back from `M_{g,1}` and `kappa_a` picks up `(n-1) psi^a`
    /// from the forgetful comparisons, so everything reduces to the
    /// one-pointed rational-tails value.
    fn smooth_formula(&self, g: i64, psi_list: &[usize], kappa_list: &[usize]) -> BigRational {
        if psi_list.is_empty() {
            return self.rational_tails_formula(g, &[], kappa_list);
        }
        let n = psi_list.len() as i64;
        let c: usize = psi_list.iter().sum();
        let mut total = BigRational::zero();
        for mask in 0u32..(1 << kappa_list.len()) {
            let mut exp = c;
            let mut kept = Vec::new();
            let mut weight = BigRational::one();
            for (j, &a) in kappa_list.iter().enumerate() {
                if mask & (1 << j) != 0 {
                    exp += a;
                    weight *= rat(n - 1);
                } else {
                    kept.push(a);
                }
            }
            total += weight * self.rational_tails_formula(g, &[exp], &kept);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::{Ct, Rt, Sm, St};

    #[test]
    fn test_tau_intersections() {
        let c = StrataCache::new();
        assert_eq!(c.socle_formula(0, &[0, 0, 0], &[], St), rat(1));
        assert_eq!(c.socle_formula(0, &[0, 0, 0, 1, 1], &[], St), rat(2));
        assert_eq!(c.socle_formula(1, &[1], &[], St), frac(1, 24));
        assert_eq!(c.socle_formula(1, &[0, 2], &[], St), frac(1, 24));
        assert_eq!(c.socle_formula(1, &[1, 1], &[], St), frac(1, 24));
        assert_eq!(c.socle_formula(2, &[4], &[], St), frac(1, 1152));
        assert_eq!(c.socle_formula(2, &[1, 4], &[], St), frac(1, 384));
        assert_eq!(c.socle_formula(2, &[2, 3], &[], St), frac(29, 5760));
    }

    #[test]
    fn test_kappa_conversion() {
        let c = StrataCache::new();
        // kappa_1 on \bar M_{1,1} equals psi there
        assert_eq!(c.socle_formula(1, &[0], &[1], St), frac(1, 24));
        // <kappa_a kappa_b> = <tau_{a+1} tau_{b+1}> - <tau_{a+b+1}>
        assert_eq!(
            c.socle_formula(2, &[], &[1, 2], St),
            c.socle_formula(2, &[2, 3], &[], St) - c.socle_formula(2, &[4], &[], St)
        );
    }

    #[test]
    fn test_compact_type() {
        let c = StrataCache::new();
        // int lambda_1 over \bar M_{1,1}
        assert_eq!(c.socle_formula(1, &[0], &[], Ct), frac(1, 24));
        // kappa_2 against lambda_2 on compact type M_{2,1}
        assert_eq!(c.socle_formula(2, &[0], &[2], Ct), frac(7, 5760));
    }

    #[test]
    fn test_rational_tails_and_smooth() {
        let c = StrataCache::new();
        assert_eq!(c.socle_formula(1, &[0], &[], Rt), frac(1, 24));
        assert_eq!(c.socle_formula(3, &[2], &[], Rt), frac(1, 120960));
        // int lambda_2 lambda_1 over \bar M_2
        assert_eq!(c.socle_formula(2, &[], &[], Sm), frac(1, 5760));
        // one-pointed smooth agrees with rational tails
        assert_eq!(c.socle_formula(3, &[2], &[], Sm), frac(1, 120960));
    }

    #[test]
    fn test_socle_evaluation_genus_one() {
        let c = StrataCache::new();
        // gens of degree 1 on \bar M_{1,1}: kappa_1, psi_1, the boundary
        let n = c.num_strata(1, 1, &[1], St);
        let mut vals: Vec<BigRational> =
            (0..n).map(|i| c.socle_evaluation(i, 1, &[1], St)).collect();
        vals.sort();
        assert_eq!(vals, vec![frac(1, 24), frac(1, 24), rat(1)]);
    }
}
