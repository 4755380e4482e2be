//! Tautological relations and ring-structure consequences.
//!
//! The [`spin`] module produces the 3-spin relations directly; [`derived`]
//! regenerates the same span from a small chosen basis. On top of both sit
//! the socle pairing, predicted Betti numbers and the rank of the
//! Gorenstein quotient.

pub mod derived;
pub mod spin;

pub use spin::fz_param_list;

use num_rational::BigRational;
use num_traits::Zero;
use std::sync::Arc;

use arith::{
    choose_orders_sparse, compute_rank, compute_rank_sparse, kernel_basis, remove_duplicates,
    simplify_sparse, SparseMatrix,
};

use crate::algebra::get_marks;
use crate::moduli::{dim_form, ModuliType};
use crate::relations::spin::undecorated_vertex;
use crate::strata::{SparseRel, StrataCache, StrataKey};

impl StrataCache {
    /// Warm the tables the pairing computation will hit, so that the
    /// expensive enumeration happens in a predictable order.
    pub fn gorenstein_precompute(&self, g: i64, r1: usize, markings: &[u32], moduli_type: ModuliType) {
        let r3 = dim_form(g, markings.len() as i64, moduli_type) as usize;
        let r2 = r3 - r1;
        self.all_strata(g, r1, markings, moduli_type);
        self.all_strata(g, r2, markings, moduli_type);
        self.contraction_table(g, r3, markings, moduli_type);
        self.unpurify_map(g, r3, markings, moduli_type);
    }

    /// The full socle pairing between degrees `r1` and `dim - r1`.
    ///
    /// For `\bar M_{1,2}` in degree 1 this is
    /// `[[1/4, 1/6, 1/12, 2], [1/6, 1/12, 0, 2], [1/12, 0, -1/12, 2], [2, 2, 2, 0]]`.
    pub fn pairing_matrix(
        &self,
        g: i64,
        r1: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        let ngens1 = self.num_strata(g, r1, markings, moduli_type);
        let s1: Vec<usize> = (0..ngens1).collect();
        self.pairing_submatrix(&s1, &s1, g, r1, markings, moduli_type)
            .to_vec()
    }

    /// The socle pairing restricted to the generators in `s1` and `s2`.
    pub fn pairing_submatrix(
        &self,
        s1: &[usize],
        s2: &[usize],
        g: i64,
        r1: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<Vec<BigRational>>> {
        let key = (
            s1.to_vec(),
            s2.to_vec(),
            StrataKey::new(g, r1, markings, moduli_type),
        );
        if let Some(v) = self.pairings.get(&key) {
            return v.clone();
        }
        let r3 = dim_form(g, markings.len() as i64, moduli_type) as usize;
        let r2 = r3 - r1;
        let ngens3 = self.num_strata(g, r3, markings, moduli_type);
        let socle_evaluations: Vec<BigRational> = (0..ngens3)
            .map(|i| self.socle_evaluation(i, g, markings, moduli_type))
            .collect();
        let mut pairings =
            vec![vec![BigRational::zero(); s2.len()]; s1.len()];
        let sym = r1 == r2 && s1 == s2;
        for i1 in 0..s1.len() {
            for i2 in 0..s2.len() {
                if sym && i1 > i2 {
                    pairings[i1][i2] = pairings[i2][i1].clone();
                    continue;
                }
                let l = self.multiply(r1, s1[i1], r2, s2[i2], g, r3, markings, moduli_type);
                pairings[i1][i2] = l
                    .iter()
                    .zip(&socle_evaluations)
                    .map(|(a, b)| a * b)
                    .sum();
            }
        }
        let arc = Arc::new(pairings);
        self.pairings.insert(key, arc.clone());
        arc
    }

    /// The full 3-spin relation matrix, one generator per column.
    pub fn fz_matrix(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        self.list_all_fz(g, r, markings, moduli_type)
    }

    /// Row-echelon basis for the span of the 3-spin relations.
    pub fn fz_rels(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        let mut rows = self.list_all_fz(g, r, markings, moduli_type);
        arith::row_reduce(&mut rows);
        rows
    }

    /// Predicted rank of the degree `r` graded piece: generators minus the
    /// rank of the 3-spin relation matrix.
    pub fn betti(&self, g: i64, r: usize, markings: &[u32], moduli_type: ModuliType) -> usize {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.betti.get(&key) {
            return *v;
        }
        let mut rows = self.list_all_fz(g, r, markings, moduli_type);
        rows.reverse();
        let ngen = rows[0].len();
        let result = ngen - compute_rank(&mut rows);
        self.betti.insert(key, result);
        result
    }

    /// Rank of the degree `r` piece of the Gorenstein quotient, computed
    /// from the pairing restricted to good generators on both sides.
    pub fn gorenstein(&self, g: i64, r: usize, markings: &[u32], moduli_type: ModuliType) -> usize {
        self.gorenstein_precompute(g, r, markings, moduli_type);
        let r3 = dim_form(g, markings.len() as i64, moduli_type) as usize;
        let r2 = r3 - r;
        let s1 = self.good_generator_list(g, r, markings, moduli_type);
        let s2 = self.good_generator_list(g, r2, markings, moduli_type);
        let mut m = self
            .pairing_submatrix(&s1, &s2, g, r, markings, moduli_type)
            .to_vec();
        compute_rank(&mut m)
    }

    /// Kernel of the pairing in degree `r`: the relations that hold in the
    /// Gorenstein quotient.
    pub fn goren_rels(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        self.gorenstein_precompute(g, r, markings, moduli_type);
        let r3 = dim_form(g, markings.len() as i64, moduli_type) as usize;
        let r2 = r3 - r;
        let s1: Vec<usize> = (0..self.num_strata(g, r, markings, moduli_type)).collect();
        let s2 = self.good_generator_list(g, r2, markings, moduli_type);
        let m = self.pairing_submatrix(&s1, &s2, g, r, markings, moduli_type);
        kernel_basis(&m)
    }

    /// Indices of strata that suffice to generate degree `r`: outer
    /// vertices may not carry a kappa class above its vanishing bound or
    /// decorations of total codimension at least their genus.
    pub fn good_generator_list(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<usize> {
        let gens = self.all_strata(g, r, markings, moduli_type);
        let mut good_gens = Vec::new();
        'outer: for (num, graph) in gens.iter().enumerate() {
            for i in 0..graph.num_vertices() {
                let g_local = graph.genus[i].coeff(0);
                let mut codim = 0i64;
                for d in 1..=r {
                    let c = graph.genus[i].coeff(d);
                    if c != 0 && 3 * d as i64 > g_local {
                        continue 'outer;
                    }
                    codim += d as i64 * c;
                }
                for e in &graph.edges {
                    codim += e.ends[i].coeff(1);
                    codim += e.ends[i].coeff(2);
                }
                if codim > 0 && codim >= g_local {
                    continue 'outer;
                }
            }
            good_gens.push(num);
        }
        good_gens
    }

    /// Betti number computed from the derived-relation machinery instead
    /// of the full 3-spin matrix, keeping everything sparse.
    pub fn recursive_betti(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> usize {
        let n = markings.len();
        if (r as i64) > dim_form(g, n as i64, moduli_type) {
            return 0;
        }
        let ngen = self.num_strata(g, r, markings, moduli_type);
        let mut relations: Vec<SparseRel> = Vec::new();
        let unsym_marks = get_marks(n, 0);
        let partial_sym_map = self.symmetrize_map(g, r, &unsym_marks, markings, moduli_type);
        let remap = |rel: SparseRel| -> SparseRel {
            simplify_sparse(
                rel.into_iter()
                    .map(|(idx, c)| (partial_sym_map[idx], c))
                    .collect(),
            )
        };
        for br in self.choose_basic_rels(g, r, n, moduli_type).iter() {
            let rel = self.unsymmetrize_vec(br, g, r, &unsym_marks, moduli_type);
            relations.push(remap(rel));
        }
        for rel in self.interior_derived_rels(g, r, n, 0, moduli_type).iter() {
            relations.push(remap(rel.clone()));
        }
        if moduli_type > ModuliType::Sm {
            for r0 in 1..r {
                let strata = self.all_strata(g, r0, markings, moduli_type);
                for graph in strata.iter() {
                    for orbit in crate::isomorphism::vertex_orbits(graph) {
                        let i = orbit[0];
                        if !undecorated_vertex(graph, i) {
                            continue;
                        }
                        let g2 = graph.genus[i].coeff(0);
                        if 3 * (r - r0) < (g2 + 1) as usize {
                            continue;
                        }
                        let d = graph.degree(i) as usize;
                        if dim_form(g2, d as i64, moduli_type) < (r - r0) as i64 {
                            continue;
                        }
                        let sub_marks = get_marks(d, 0);
                        let strata2 = self.all_strata(g2, r - r0, &sub_marks, moduli_type);
                        let which_gen: Vec<usize> = strata2
                            .iter()
                            .map(|s| {
                                let mut g_copy = graph.clone();
                                g_copy.replace_vertex_with_graph(i, s);
                                self.num_of_stratum(g_copy, g, r, markings, moduli_type)
                            })
                            .collect();
                        let mut rel_list: Vec<SparseRel> = self
                            .choose_basic_rels(g2, r - r0, d, moduli_type)
                            .iter()
                            .map(|br| {
                                self.unsymmetrize_vec(br, g2, r - r0, &sub_marks, moduli_type)
                            })
                            .collect();
                        rel_list.extend(
                            self.interior_derived_rels(g2, r - r0, d, 0, moduli_type)
                                .iter()
                                .cloned(),
                        );
                        for rel0 in &rel_list {
                            let relation: SparseRel = rel0
                                .iter()
                                .map(|(idx, c)| (which_gen[*idx], c.clone()))
                                .collect();
                            relations.push(simplify_sparse(relation));
                        }
                    }
                }
            }
        }
        let relations = remove_duplicates(relations);
        let nrels = relations.len();
        let mut rank = 0;
        if nrels > 0 {
            let mut d = SparseMatrix::default();
            for (i, rel) in relations.iter().enumerate() {
                for (j, c) in rel {
                    d.insert((i, *j), c.clone());
                }
            }
            let (row_order, col_order) = choose_orders_sparse(&d, nrels, ngen);
            rank = compute_rank_sparse(&mut d, &row_order, &col_order);
        }
        ngen - rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::{Ct, St};
    use arith::frac;

    fn q(num: i64, den: i64) -> BigRational {
        frac(num, den)
    }

    #[test]
    fn test_pairing_matrix_genus_one() {
        let c = StrataCache::new();
        let m = c.pairing_matrix(1, 1, &[1, 1], St);
        let expect = vec![
            vec![q(1, 4), q(1, 6), q(1, 12), q(2, 1)],
            vec![q(1, 6), q(1, 12), q(0, 1), q(2, 1)],
            vec![q(1, 12), q(0, 1), q(-1, 12), q(2, 1)],
            vec![q(2, 1), q(2, 1), q(2, 1), q(0, 1)],
        ];
        assert_eq!(m, expect);
    }

    #[test]
    fn test_betti_genus_two() {
        let c = StrataCache::new();
        assert_eq!(c.betti(2, 2, &[], St), 2);
        assert_eq!(c.betti(2, 3, &[], St), 1);
        assert_eq!(c.betti(1, 1, &[1], St), 1);
    }

    #[test]
    fn test_recursive_betti_matches() {
        let c = StrataCache::new();
        assert_eq!(c.recursive_betti(2, 2, &[], St), 2);
        assert_eq!(c.recursive_betti(1, 1, &[1], St), 1);
    }

    #[test]
    fn test_gorenstein_small() {
        let c = StrataCache::new();
        // in these ranges the pairing is perfect, so the Gorenstein rank
        // agrees with the predicted Betti number
        assert_eq!(c.gorenstein(2, 1, &[], St), c.betti(2, 1, &[], St));
        assert_eq!(c.gorenstein(1, 1, &[1], St), 1);
        assert_eq!(c.gorenstein(2, 1, &[], Ct), c.betti(2, 1, &[], Ct));
    }

    #[test]
    fn test_goren_rels_dimensions() {
        let c = StrataCache::new();
        let ngen = c.num_strata(2, 2, &[], St);
        let rels = c.goren_rels(2, 2, &[], St);
        assert_eq!(rels.len(), ngen - c.gorenstein(2, 2, &[], St));
    }

    #[test]
    fn test_good_generators_genus_three() {
        let c = StrataCache::new();
        assert_eq!(c.good_generator_list(3, 1, &[], St), vec![0, 1, 2]);
        assert_eq!(
            c.good_generator_list(3, 2, &[], St),
            vec![1, 3, 4, 8, 9, 10, 11, 12]
        );
    }
}
