//! Double ramification cycle coefficients.
//!
//! [`StrataCache::dr_compute`] expands Pixton's formula for the DR cycle in
//! the stratum generator basis. Per stratum the coefficient is a sum over
//! edge weightings mod `m`, divisible by a fixed power of `m`; the quotient
//! is a polynomial in `m` whose constant term is the answer, recovered by
//! Lagrange interpolation. [`StrataCache::dr_compute_m`] gives the value at
//! a fixed modulus instead, and [`StrataCache::dr_reduced`] simplifies the
//! result with the 3-spin relations.
//!
//! For genus 1 with weights `(2, -2)` the five generators of degree 1 on
//! `\bar M_{1,2}` are kappa_1, psi_1, psi_2, delta_{12} and delta_{irr}
//! (the pushforward of 1 from `\bar M_{0,4}`, twice the physical locus),
//! and the cycle is `(0, 2, 2, 0, -1/24)`.

use anyhow::{bail, Result};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Pow, Zero};

use arith::{factorial, frac, interpolate, rat};
use rustc_hash::FxHashSet;

use crate::moduli::ModuliType;
use crate::strata::{SparseRel, StrataCache};

/// Walk all assignments of a weight in `0..m` to each of `ne` edges.
fn for_each_assignment(ne: usize, m: i64, mut f: impl FnMut(&[i64])) {
    let mut wd = vec![0i64; ne];
    loop {
        f(&wd);
        let mut idx = 0;
        while idx < ne {
            wd[idx] += 1;
            if wd[idx] < m {
                break;
            }
            wd[idx] = 0;
            idx += 1;
        }
        if idx == ne {
            return;
        }
    }
}

fn int_pow(base: i64, exp: usize) -> BigInt {
    BigInt::from(base).pow(exp as u32)
}

/// Reduce `vec` against a row-echelon basis of relations.
pub fn reduce_with_rels(basis: &[Vec<BigRational>], vec: &[BigRational]) -> Vec<BigRational> {
    let mut vec2 = vec.to_vec();
    for row in basis {
        if let Some(i) = row.iter().position(|x| !x.is_zero()) {
            if !vec2[i].is_zero() {
                let factor = &vec2[i] / &row[i];
                for (v, r) in vec2.iter_mut().zip(row) {
                    *v -= &factor * r;
                }
            }
        }
    }
    vec2
}

impl StrataCache {
    /// Vertex pairs joined by an edge that also lie on a cycle through a
    /// third vertex, as ordered pairs `(low, high)`.
    pub fn find_nonsep_pairs(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<(usize, usize)> {
        let graph = self.single_stratum(num, g, r, markings, moduli_type);
        let nv = graph.num_vertices();
        let mut answer = Vec::new();
        for v1 in 1..nv {
            for v2 in 0..v1 {
                let found_edge = graph
                    .edges
                    .iter()
                    .any(|e| e.ends[v1].coeff(0) != 0 && e.ends[v2].coeff(0) != 0);
                if !found_edge {
                    continue;
                }
                // flood fill from v1, never stepping straight to v2
                let mut seen = FxHashSet::default();
                seen.insert(v1);
                let mut did_something = true;
                while did_something {
                    did_something = false;
                    for v3 in seen.clone() {
                        for e in &graph.edges {
                            if e.ends[v3].coeff(0) == 0 {
                                continue;
                            }
                            for v4 in 0..nv {
                                if e.ends[v4].coeff(0) != 0
                                    && !seen.contains(&v4)
                                    && !(v3 == v1 && v4 == v2)
                                {
                                    seen.insert(v4);
                                    did_something = true;
                                }
                            }
                        }
                    }
                }
                if seen.contains(&v2) {
                    answer.push((v2, v1));
                }
            }
        }
        answer
    }

    /// Whether the DR coefficient of this stratum vanishes for structural
    /// reasons: a kappa decoration, a self loop, or a vertex whose removal
    /// separates the unmarked part of the graph.
    pub fn veto_for_dr(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> bool {
        let graph = self.single_stratum(num, g, r, markings, moduli_type);
        let nv = graph.num_vertices();
        let mut marked_vertices = Vec::new();
        for i in 0..nv {
            if graph.genus[i].degree() > 0 {
                return true;
            }
            for e in &graph.edges {
                if e.ends[i].coeff(0) == 2 {
                    return true;
                }
                if e.marking != 0 && e.ends[i].coeff(0) != 0 {
                    marked_vertices.push(i);
                }
            }
        }
        for ii in 0..nv {
            let mut seen: FxHashSet<usize> = marked_vertices.iter().copied().collect();
            seen.insert(ii);
            let mut did_something = true;
            while did_something {
                did_something = false;
                for i in seen.clone() {
                    if i == ii {
                        continue;
                    }
                    for e in &graph.edges {
                        if e.ends[i].coeff(0) == 0 {
                            continue;
                        }
                        for i2 in 0..nv {
                            if e.ends[i2].coeff(0) != 0 && !seen.contains(&i2) {
                                seen.insert(i2);
                                did_something = true;
                            }
                        }
                    }
                }
            }
            if seen.len() < nv {
                return true;
            }
        }
        false
    }

    /// Strata whose coefficient the interpolation-free closed forms do not
    /// cover; empty through cohomological degree 4.
    pub fn dr_uncomputed(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<usize> {
        if r <= 4 {
            return Vec::new();
        }
        (0..self.num_strata(g, r, markings, moduli_type))
            .filter(|&i| !self.veto_for_dr(i, g, r, markings, moduli_type))
            .collect()
    }

    /// Edge data and the weight-independent prefactor for one stratum:
    /// internal edges as vertex pairs, the psi exponent sum per edge, the
    /// twist each vertex must absorb, and the scalar in front of the
    /// weighted sum.
    fn dr_coeff_setup(
        &self,
        num: usize,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> (Vec<(usize, usize)>, Vec<usize>, Vec<i64>, BigRational) {
        let markings: Vec<u32> = (1..=n as u32).collect();
        let graph = self.single_stratum(num, g, r, &markings, moduli_type);
        let nv = graph.num_vertices();
        let mut edge_list = Vec::new();
        let mut exp_list = Vec::new();
        let mut scalar_factor =
            BigRational::new(1.into(), self.autom_count(num, g, r, &markings, moduli_type).into());
        for i in 0..nv {
            for j in 1..=graph.genus[i].degree() {
                let c = graph.genus[i].coeff(j);
                scalar_factor /= BigRational::from_integer(factorial(c as u64));
                scalar_factor /= BigRational::from_integer(factorial(j as u64).pow(c as u32));
                if c % 2 == 1 {
                    scalar_factor = -scalar_factor;
                }
                scalar_factor *= BigRational::from_integer(int_pow(kval * kval, j * c as usize));
            }
        }
        let mut given_weights: Vec<i64> = (0..nv)
            .map(|i| -kval * (2 * graph.genus[i].coeff(0) - 2 + graph.degree(i)))
            .collect();
        for e in &graph.edges {
            let ilist: Vec<usize> = (0..nv).filter(|&i| e.ends[i].coeff(0) != 0).collect();
            if e.marking == 0 {
                let (i1, i2, exp1, exp2) = if ilist.len() == 1 {
                    (ilist[0], ilist[0], e.ends[ilist[0]].coeff(1), e.ends[ilist[0]].coeff(2))
                } else {
                    (ilist[0], ilist[1], e.ends[ilist[0]].coeff(1), e.ends[ilist[1]].coeff(1))
                };
                edge_list.push((i1, i2));
                exp_list.push((exp1 + exp2 + 1) as usize);
                scalar_factor /= BigRational::from_integer(
                    -factorial(exp1 as u64) * factorial(exp2 as u64) * BigInt::from(exp1 + exp2 + 1),
                );
            } else {
                let i1 = ilist[0];
                let exp1 = e.ends[i1].coeff(1);
                let dval = dvector[e.marking as usize - 1];
                scalar_factor *= BigRational::new(
                    int_pow(dval, 2 * exp1 as usize),
                    factorial(exp1 as u64),
                );
                given_weights[i1] += dval;
            }
        }
        (edge_list, exp_list, given_weights, scalar_factor)
    }

    /// Coefficient of one stratum in the DR cycle, before the overall
    /// division by `2^r`.
    pub fn dr_coeff(
        &self,
        num: usize,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> BigRational {
        let markings: Vec<u32> = (1..=n as u32).collect();
        let graph = self.single_stratum(num, g, r, &markings, moduli_type);
        let (edge_list, exp_list, given_weights, scalar_factor) =
            self.dr_coeff_setup(num, g, r, n, dvector, kval, moduli_type);
        let m0 = (dvector.iter().map(|d| d.abs()).sum::<i64>() + 1) / 2 + g * kval.abs();
        let h0 = (graph.num_edges() - n) as i64 - graph.num_vertices() as i64 + 1;
        let deg = 2 * exp_list.iter().sum::<usize>();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for m in (m0 + 1)..=(m0 + deg as i64 + 1) {
            let mut total = BigInt::zero();
            for_each_assignment(edge_list.len(), m, |wd| {
                let mut vertex_weights = given_weights.clone();
                for (i, &(a, b)) in edge_list.iter().enumerate() {
                    vertex_weights[a] += wd[i];
                    vertex_weights[b] -= wd[i];
                }
                if vertex_weights.iter().any(|w| w.rem_euclid(m) != 0) {
                    return;
                }
                let mut term = BigInt::one();
                for (i, &e) in exp_list.iter().enumerate() {
                    term *= int_pow(wd[i], 2 * e);
                }
                total += term;
            });
            xs.push(rat(m));
            ys.push(BigRational::new(total, BigInt::from(m).pow(h0 as u32)));
        }
        let mpoly = interpolate(&xs, &ys);
        &mpoly[0] * &scalar_factor
    }

    /// The DR cycle of genus `g` and weight vector `dvector` in degree `r`
    /// (set `r = g` for the cycle itself; higher `r` yields relations).
    /// A nonzero `kval` twists by that many copies of the log canonical
    /// bundle.
    pub fn dr_compute(
        &self,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> Vec<BigRational> {
        let markings: Vec<u32> = (1..=n as u32).collect();
        let scale = BigRational::from_integer(int_pow(2, r));
        (0..self.num_strata(g, r, &markings, moduli_type))
            .map(|i| self.dr_coeff(i, g, r, n, dvector, kval, moduli_type) / &scale)
            .collect()
    }

    fn dr_coeff_setup_m(
        &self,
        m: i64,
        num: usize,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> (Vec<(usize, usize)>, Vec<usize>, Vec<i64>, BigRational) {
        let markings: Vec<u32> = (1..=n as u32).collect();
        let graph = self.single_stratum(num, g, r, &markings, moduli_type);
        let nv = graph.num_vertices();
        let mut edge_list = Vec::new();
        let mut exp_list = Vec::new();
        // x^2 - x*m + m^2/6, the mod-m replacement for x^2
        let quad = |x: i64| rat(x * x - x * m) + frac(m * m, 6);
        let mut scalar_factor =
            BigRational::new(1.into(), self.autom_count(num, g, r, &markings, moduli_type).into());
        for i in 0..nv {
            for j in 1..=graph.genus[i].degree() {
                let c = graph.genus[i].coeff(j);
                scalar_factor /= BigRational::from_integer(factorial(c as u64));
                scalar_factor /= BigRational::from_integer(factorial(j as u64).pow(c as u32));
                if c % 2 == 1 {
                    scalar_factor = -scalar_factor;
                }
                scalar_factor *= quad(kval).pow((j * c as usize) as i32);
            }
        }
        let mut given_weights: Vec<i64> = (0..nv)
            .map(|i| -kval * (2 * graph.genus[i].coeff(0) - 2 + graph.degree(i)))
            .collect();
        for e in &graph.edges {
            let ilist: Vec<usize> = (0..nv).filter(|&i| e.ends[i].coeff(0) != 0).collect();
            if e.marking == 0 {
                let (i1, i2, exp1, exp2) = if ilist.len() == 1 {
                    (ilist[0], ilist[0], e.ends[ilist[0]].coeff(1), e.ends[ilist[0]].coeff(2))
                } else {
                    (ilist[0], ilist[1], e.ends[ilist[0]].coeff(1), e.ends[ilist[1]].coeff(1))
                };
                edge_list.push((i1, i2));
                exp_list.push((exp1 + exp2 + 1) as usize);
                scalar_factor /= BigRational::from_integer(
                    -factorial(exp1 as u64) * factorial(exp2 as u64) * BigInt::from(exp1 + exp2 + 1),
                );
            } else {
                let i1 = ilist[0];
                let exp1 = e.ends[i1].coeff(1);
                let mut dval = dvector[e.marking as usize - 1];
                if dval < 0 {
                    dval += m;
                }
                scalar_factor *= quad(dval).pow(exp1 as i32)
                    / BigRational::from_integer(factorial(exp1 as u64));
                given_weights[i1] += dvector[e.marking as usize - 1];
            }
        }
        (edge_list, exp_list, given_weights, scalar_factor)
    }

    /// Coefficient of one stratum at a fixed modulus `m`, without the
    /// polynomial interpolation.
    pub fn dr_coeff_m(
        &self,
        m: i64,
        num: usize,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> BigRational {
        let markings: Vec<u32> = (1..=n as u32).collect();
        let graph = self.single_stratum(num, g, r, &markings, moduli_type);
        let (edge_list, exp_list, given_weights, scalar_factor) =
            self.dr_coeff_setup_m(m, num, g, r, n, dvector, kval, moduli_type);
        let h0 = (graph.num_edges() - n) as i64 - graph.num_vertices() as i64 + 1;
        let quad = |x: i64| rat(x * x - x * m) + frac(m * m, 6);
        let mut total = BigRational::zero();
        for_each_assignment(edge_list.len(), m, |wd| {
            let mut vertex_weights = given_weights.clone();
            for (i, &(a, b)) in edge_list.iter().enumerate() {
                vertex_weights[a] += wd[i];
                vertex_weights[b] -= wd[i];
            }
            if vertex_weights.iter().any(|w| w.rem_euclid(m) != 0) {
                return;
            }
            let mut term = BigRational::one();
            for (i, &e) in exp_list.iter().enumerate() {
                term *= quad(wd[i]).pow(e as i32);
            }
            total += term;
        });
        total / BigRational::from_integer(BigInt::from(m).pow(h0 as u32)) * scalar_factor
    }

    pub fn dr_compute_m(
        &self,
        m: i64,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> Vec<BigRational> {
        let markings: Vec<u32> = (1..=n as u32).collect();
        (0..self.num_strata(g, r, &markings, moduli_type))
            .map(|i| self.dr_coeff_m(m, i, g, r, n, dvector, kval, moduli_type))
            .collect()
    }

    /// [`Self::dr_compute`] with zero entries dropped.
    pub fn dr_sparse(
        &self,
        g: i64,
        r: usize,
        n: usize,
        dvector: &[i64],
        kval: i64,
        moduli_type: ModuliType,
    ) -> SparseRel {
        self.dr_compute(g, r, n, dvector, kval, moduli_type)
            .into_iter()
            .enumerate()
            .filter(|(_, c)| !c.is_zero())
            .collect()
    }

    /// Pair the DR cycle with a power of one psi class down to the socle.
    pub fn dr_psi_check(&self, g: i64, n: usize, dvector: &[i64], which_psi: u32) -> BigRational {
        let mut vec = self.dr_sparse(g, g as usize, n, dvector, 0, ModuliType::St);
        let markings: Vec<u32> = (1..=n as u32).collect();
        let mut r = g as usize;
        while (r as i64) < 3 * g - 3 + n as i64 {
            vec = self.psi_multiple(&vec, which_psi, g, r, n, 0, ModuliType::St);
            r += 1;
        }
        let mut total = BigRational::zero();
        for (a, b) in &vec {
            total += b * self.socle_evaluation(*a, g, &markings, ModuliType::St);
        }
        total / BigRational::from_integer(int_pow(2, g as usize))
    }

    /// The DR cycle with the twist forced by the weight vector, simplified
    /// modulo the 3-spin relations.
    pub fn dr_reduced(&self, g: i64, dvector: &[i64]) -> Result<Vec<BigRational>> {
        let n = dvector.len();
        let r = g as usize;
        let total: i64 = dvector.iter().sum();
        let denom = 2 * g - 2 + n as i64;
        if total % denom != 0 {
            bail!("weight sum {total} is not a multiple of 2g - 2 + n = {denom}");
        }
        let kval = total / denom;
        let vec = self.dr_compute(g, r, n, dvector, kval, ModuliType::St);
        let markings: Vec<u32> = (1..=n as u32).collect();
        let rels = self.fz_rels(g, r, &markings, ModuliType::St);
        Ok(reduce_with_rels(&rels, &vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::St;

    #[test]
    fn test_dr_compute_genus_one() {
        let c = StrataCache::new();
        let v = c.dr_compute(1, 1, 2, &[2, -2], 0, St);
        assert_eq!(v, vec![rat(0), rat(2), rat(2), rat(0), frac(-1, 24)]);
        // psi and marking coefficients scale with the square of the weights;
        // the delta_irr term sums over loop flows that never see them
        let v4 = c.dr_compute(1, 1, 2, &[4, -4], 0, St);
        assert_eq!(v4, vec![rat(0), rat(8), rat(8), rat(0), frac(-1, 24)]);
    }

    #[test]
    fn test_dr_sparse() {
        let c = StrataCache::new();
        assert_eq!(
            c.dr_sparse(1, 1, 2, &[2, -2], 0, St),
            vec![(1, rat(2)), (2, rat(2)), (4, frac(-1, 24))]
        );
    }

    #[test]
    fn test_dr_reduced_genus_one() {
        let c = StrataCache::new();
        assert_eq!(
            c.dr_reduced(1, &[2, -2]).unwrap(),
            vec![rat(0), rat(0), rat(0), rat(4), frac(1, 8)]
        );
        assert!(c.dr_reduced(1, &[3, -2]).is_err());
    }

    #[test]
    fn test_dr_psi_check_genus_one() {
        let c = StrataCache::new();
        // integral of DR_1(2,-2) psi_1 over \bar M_{1,2} is 1/8; the check
        // value carries the extra division by 2^g
        assert_eq!(c.dr_psi_check(1, 2, &[2, -2], 1), frac(1, 16));
    }

    #[test]
    fn test_fz_rels_genus_two() {
        let c = StrataCache::new();
        let rels = c.fz_rels(2, 2, &[], St);
        let expect = vec![
            vec![rat(1), rat(0), rat(0), rat(0), rat(0), rat(0), frac(-1, 20), frac(-1, 480)],
            vec![rat(0), rat(1), rat(0), rat(0), rat(0), rat(0), frac(-5, 24), frac(-1, 96)],
            vec![rat(0), rat(0), rat(1), rat(0), rat(0), rat(0), frac(-1, 24), rat(0)],
            vec![rat(0), rat(0), rat(0), rat(1), rat(0), rat(0), frac(-1, 24), rat(0)],
            vec![rat(0), rat(0), rat(0), rat(0), rat(1), rat(0), rat(-1), frac(-1, 12)],
            vec![rat(0), rat(0), rat(0), rat(0), rat(0), rat(1), rat(-1), frac(-1, 24)],
        ];
        assert_eq!(rels, expect);
    }

    #[test]
    fn test_nonsep_pairs_need_a_triangle() {
        let c = StrataCache::new();
        // with at most two edges no pair can be joined off the direct edge
        for num in 0..c.num_strata(2, 2, &[], St) {
            assert!(c.find_nonsep_pairs(num, 2, 2, &[], St).is_empty());
        }
        // no unmarked triangle is stable: its three valence-2 vertices
        // would need genus at least 1 each
        for num in 0..c.num_strata(2, 3, &[], St) {
            assert!(c.find_nonsep_pairs(num, 2, 3, &[], St).is_empty());
        }
        // on \bar M_{1,3} one leg per vertex makes the triangle stable,
        // and it is the only codimension 3 stratum with such pairs
        let marks = [1u32, 2, 3];
        let with_pairs: Vec<usize> = (0..c.num_strata(1, 3, &marks, St))
            .filter(|&num| !c.find_nonsep_pairs(num, 1, 3, &marks, St).is_empty())
            .collect();
        assert_eq!(with_pairs.len(), 1);
        assert_eq!(c.find_nonsep_pairs(with_pairs[0], 1, 3, &marks, St).len(), 3);
    }

    #[test]
    fn test_veto_and_uncomputed() {
        let c = StrataCache::new();
        // kappa_1 is vetoed, psi_1 is not
        assert!(c.veto_for_dr(0, 1, 1, &[1, 2], St));
        assert!(!c.veto_for_dr(1, 1, 1, &[1, 2], St));
        assert!(c.dr_uncomputed(2, 3, &[], St).is_empty());
    }
}
