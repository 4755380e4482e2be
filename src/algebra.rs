//! Multiplication in the strata algebra and basis conversions.
//!
//! Products of generators are computed through the contraction table: each
//! pair of pure strata contracting to a common degeneration contributes
//! excess-intersection terms, with psi classes from the shared edges and
//! kappa/psi decorations redistributed over the common graph in every
//! possible way.

use std::sync::Arc;

use anyhow::{bail, Result};
use num_rational::BigRational;
use num_traits::{One, Zero};

use arith::{rat, simplify_sparse};

use crate::graph::Graph;
use crate::isomorphism::graph_isomorphic;
use crate::moduli::{dim_form, ModuliType};
use crate::poly::Poly;
use crate::strata::{SparseRel, StrataCache, StrataKey};

/// The marking tuple for `n` points with the first `symm` symmetrized:
/// `symm` copies of label 1 followed by distinct labels starting at 2.
pub fn get_marks(n: usize, symm: usize) -> Vec<u32> {
    if symm == 0 {
        (1..=n as u32).collect()
    } else {
        let mut v = vec![1u32; symm];
        v.extend(2..=(n.saturating_sub(symm) + 1) as u32);
        v
    }
}

/// Cartesian product of independent choice lists. An empty list of lists
/// yields a single empty choice.
pub(crate) fn choice_products<T: Clone>(choices: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = vec![Vec::new()];
    for c in choices {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                c.iter().map(move |x| {
                    let mut p = prefix.clone();
                    p.push(x.clone());
                    p
                })
            })
            .collect();
    }
    out
}

fn vertex_degree_and_dim_used(graph: &Graph, i: usize, r: usize) -> (i64, i64) {
    let mut deg = 0;
    let mut dim_used = 0;
    for j in 1..=r {
        dim_used += j as i64 * graph.genus[i].coeff(j);
    }
    for e in &graph.edges {
        dim_used += e.ends[i].coeff(1) + e.ends[i].coeff(2);
        deg += e.ends[i].coeff(0);
    }
    (deg, dim_used)
}

impl StrataCache {
    /// Multiply generator `(r1, i1)` by `(r2, i2)`, expressed in the
    /// generators of codimension `r1 + r2`. The contraction table is built
    /// at codimension `rmax`, which must be at least `r1 + r2`.
    pub fn multiply(
        &self,
        r1: usize,
        i1: usize,
        r2: usize,
        i2: usize,
        g: i64,
        rmax: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<BigRational>> {
        let memo_key = (r1, i1, r2, i2, StrataKey::new(g, rmax, markings, moduli_type));
        if let Some(v) = self.products.get(&memo_key) {
            return v.clone();
        }
        let unpurify = self.unpurify_map(g, r1 + r2, markings, moduli_type);
        let gens = self.all_strata(g, r1 + r2, markings, moduli_type);
        let mut answer = vec![BigRational::zero(); gens.len()];
        let pure_strata: Vec<Arc<Vec<Graph>>> = (0..=rmax)
            .map(|r| self.all_pure_strata(g, r, markings, moduli_type))
            .collect();
        let contraction_dict = self.contraction_table(g, rmax, markings, moduli_type);
        let strata1 = self.all_strata(g, r1, markings, moduli_type);
        let strata2 = self.all_strata(g, r2, markings, moduli_type);
        let g1 = &strata1[i1];
        let g2 = &strata2[i2];
        let mut g1_pure = g1.clone();
        let mut g2_pure = g2.clone();
        g1_pure.purify();
        g2_pure.purify();
        let pure_r1 = g1_pure.num_edges() - markings.len();
        let pure_r2 = g2_pure.num_edges() - markings.len();
        let g1_key = (
            pure_r1,
            pure_strata[pure_r1]
                .iter()
                .position(|p| *p == g1_pure)
                .expect("purification failed"),
        );
        let g2_key = (
            pure_r2,
            pure_strata[pure_r2]
                .iter()
                .position(|p| *p == g2_pure)
                .expect("purification failed"),
        );
        if g1_key > g2_key {
            let ans = self.multiply(r2, i2, r1, i1, g, rmax, markings, moduli_type);
            self.products.insert(memo_key, ans.clone());
            return ans;
        }
        let entries = match contraction_dict.get(&(g1_key, g2_key)) {
            Some(entries) => entries,
            None => {
                let arc = Arc::new(answer);
                self.products.insert(memo_key, arc.clone());
                return arc;
            }
        };
        let cosets1 = self.automorphism_cosets(i1, g, r1, markings, moduli_type);
        let cosets2 = self.automorphism_cosets(i2, g, r2, markings, moduli_type);
        for l in entries {
            let h = &pure_strata[l.source.0][l.source.1];
            let mut h_loops: Vec<(usize, usize)> = Vec::new();
            if moduli_type > ModuliType::Ct {
                for i in 0..h.num_vertices() {
                    for j in 0..h.num_edges() {
                        if h.edges[j].ends[i].coeff(0) == 2 {
                            h_loops.push((i, j));
                        }
                    }
                }
            }
            let mut auts = rat(self.pure_strata_autom_count(
                l.source.1,
                g,
                l.source.0,
                markings,
                moduli_type,
            ));
            let b = &l.shared;
            if b.len() == pure_r1 && b.len() == pure_r2 {
                auts *= rat(2);
            }
            auts /= rat(cosets1.0 * cosets2.0);
            let sign = if b.len() % 2 == 1 { -rat(1) } else { rat(1) };
            for isom1 in &cosets1.1 {
                for isom2 in &cosets2.1 {
                    // pure decorations of G1 and G2 transported into a copy of H
                    let mut h_deco = h.clone();
                    let vmap1: Vec<&Vec<usize>> = (0..g1.num_vertices())
                        .map(|i| &l.vmap1[l.isom1.0[isom1.0[i]]])
                        .collect();
                    let emap1: Vec<usize> = (0..g1.num_edges())
                        .map(|j| l.emap1[l.isom1.1[isom1.1[j]]])
                        .collect();
                    let vmap2: Vec<&Vec<usize>> = (0..g2.num_vertices())
                        .map(|i| &l.vmap2[l.isom2.0[isom2.0[i]]])
                        .collect();
                    let emap2: Vec<usize> = (0..g2.num_edges())
                        .map(|j| l.emap2[l.isom2.1[isom2.1[j]]])
                        .collect();

                    // each decorated loop contributes both orderings of its
                    // psi powers; targets are (column, end, other end) in H
                    let mut psi_loop_choices: Vec<Vec<(i64, i64)>> = Vec::new();
                    let mut psi_loop_targets: Vec<(usize, usize, usize)> = Vec::new();
                    let mut loop_factor = BigRational::one();
                    for (graph, vmap, emap) in
                        [(g1, &vmap1, &emap1), (g2, &vmap2, &emap2)]
                    {
                        for i in 0..graph.num_vertices() {
                            for j in 0..graph.num_edges() {
                                let cell = &graph.edges[j].ends[i];
                                match cell.coeff(0) {
                                    0 => {}
                                    1 => {
                                        if cell.coeff(1) != 0 {
                                            let jj = emap[j];
                                            for &ii in vmap[i] {
                                                if !h.edges[jj].ends[ii].is_zero() {
                                                    h_deco.edges[jj].ends[ii]
                                                        .add_monomial(cell.coeff(1), 1);
                                                    break;
                                                }
                                            }
                                        }
                                    }
                                    _ => {
                                        if cell.coeff(1) == 0 {
                                            loop_factor *= rat(2);
                                        } else {
                                            let jj = emap[j];
                                            psi_loop_choices.push(vec![
                                                (cell.coeff(1), cell.coeff(2)),
                                                (cell.coeff(2), cell.coeff(1)),
                                            ]);
                                            let mut vs = Vec::new();
                                            for &ii in vmap[i] {
                                                for _ in 0..h.edges[jj].ends[ii].coeff(0) {
                                                    vs.push(ii);
                                                }
                                            }
                                            psi_loop_targets.push((jj, vs[0], vs[1]));
                                        }
                                    }
                                }
                            }
                        }
                    }

                    // kappa classes go to any vertex their old vertex split into
                    let mut kappa_choices: Vec<Vec<usize>> = Vec::new();
                    let mut kappa_indices: Vec<usize> = Vec::new();
                    for (graph, vmap) in [(g1, &vmap1), (g2, &vmap2)] {
                        for i in 0..graph.num_vertices() {
                            for r in 1..=rmax {
                                for _ in 0..graph.genus[i].coeff(r) {
                                    kappa_choices.push(vmap[i].clone());
                                    kappa_indices.push(r);
                                }
                            }
                        }
                    }

                    // each shared edge carries an extra psi on one of its sides
                    let mut psi_b_choices: Vec<Vec<(usize, usize)>> = Vec::new();
                    for &j in b {
                        let s: Vec<usize> = (0..h.num_vertices())
                            .filter(|&i| h.edges[j].ends[i].coeff(0) != 0)
                            .collect();
                        if s.len() == 2 {
                            psi_b_choices.push(vec![(s[0], j), (s[1], j)]);
                        } else {
                            psi_loop_choices.push(vec![(0, 1), (1, 0)]);
                            psi_loop_targets.push((j, s[0], s[0]));
                        }
                    }

                    let contrib = sign.clone() * loop_factor.clone() / auts.clone();
                    for loop_vals in choice_products(&psi_loop_choices) {
                        for k_locs in choice_products(&kappa_choices) {
                            for psi_locs in choice_products(&psi_b_choices) {
                                let mut cand = h_deco.clone();
                                for (t, val) in psi_loop_targets.iter().zip(&loop_vals) {
                                    cand.edges[t.0].ends[t.1].add_monomial(val.0, 1);
                                    if t.1 == t.2 {
                                        cand.edges[t.0].ends[t.1].add_monomial(val.1, 2);
                                    } else {
                                        cand.edges[t.0].ends[t.2].add_monomial(val.1, 1);
                                    }
                                }
                                for (i, &r) in kappa_indices.iter().enumerate() {
                                    cand.genus[k_locs[i]].add_monomial(1, r);
                                }
                                for &(v, j) in &psi_locs {
                                    cand.edges[j].ends[v].add_monomial(1, 1);
                                }
                                // restore the canonical psi order on loops
                                for &(i, j) in &h_loops {
                                    let c1 = cand.edges[j].ends[i].coeff(1);
                                    let c2 = cand.edges[j].ends[i].coeff(2);
                                    if c2 > c1 {
                                        cand.edges[j].ends[i].add_monomial(c2 - c1, 1);
                                        cand.edges[j].ends[i].add_monomial(c1 - c2, 2);
                                    }
                                }
                                cand.compute_invariant();
                                let candidates = unpurify
                                    .get(&l.source)
                                    .expect("missing unpurify entry");
                                for &which_gen in candidates {
                                    if graph_isomorphic(&cand, &gens[which_gen]) {
                                        answer[which_gen] += contrib.clone();
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        let arc = Arc::new(answer);
        self.products.insert(memo_key, arc.clone());
        arc
    }

    /// Verify associativity on all triples of generators in the given
    /// codimensions.
    pub fn check_associativity(
        &self,
        g: i64,
        r1: usize,
        r2: usize,
        r3: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Result<()> {
        let rtot = r1 + r2 + r3;
        let ngens1 = self.num_strata(g, r1, markings, moduli_type);
        let ngens2 = self.num_strata(g, r2, markings, moduli_type);
        let ngens3 = self.num_strata(g, r3, markings, moduli_type);
        let ntot = self.num_strata(g, rtot, markings, moduli_type);
        for i1 in 0..ngens1 {
            for i2 in 0..ngens2 {
                for i3 in 0..ngens3 {
                    let a = self.multiply(r1, i1, r2, i2, g, rtot, markings, moduli_type);
                    let mut answer1 = vec![BigRational::zero(); ntot];
                    for (j, aj) in a.iter().enumerate() {
                        if aj.is_zero() {
                            continue;
                        }
                        let m = self.multiply(r1 + r2, j, r3, i3, g, rtot, markings, moduli_type);
                        for k in 0..ntot {
                            answer1[k] += aj * &m[k];
                        }
                    }
                    let a = self.multiply(r1, i1, r3, i3, g, rtot, markings, moduli_type);
                    let mut answer2 = vec![BigRational::zero(); ntot];
                    for (j, aj) in a.iter().enumerate() {
                        if aj.is_zero() {
                            continue;
                        }
                        let m = self.multiply(r1 + r3, j, r2, i2, g, rtot, markings, moduli_type);
                        for k in 0..ntot {
                            answer2[k] += aj * &m[k];
                        }
                    }
                    if answer1 != answer2 {
                        bail!("associativity failed at i1={i1} i2={i2} i3={i3}");
                    }
                }
            }
        }
        Ok(())
    }

    /// Expansion of a multi-indexed kappa class in kappa monomials: one
    /// term per set partition of the index multiset.
    pub fn kappa_conversion(&self, sigma: &[u32]) -> Arc<Vec<(Poly, i64)>> {
        if let Some(v) = self.kappa_conversions.get(sigma) {
            return v.clone();
        }
        let mut answer = Vec::new();
        for (blocks, mult) in arith::setparts_with_auts(sigma) {
            let mut coeff = mult;
            let mut poly = Poly::zero();
            for part in &blocks {
                coeff *= (1..part.len() as i64).product::<i64>();
                poly.add_monomial(1, part.iter().sum::<u32>() as usize);
            }
            answer.push((poly, coeff));
        }
        let arc = Arc::new(answer);
        self.kappa_conversions.insert(sigma.to_vec(), arc.clone());
        arc
    }

    /// Inverse expansion, with alternating signs by the number of merged
    /// blocks.
    pub fn kappa_conversion_inverse(&self, sigma: &[u32]) -> Vec<(Poly, i64)> {
        let mut answer = Vec::new();
        for (blocks, mult) in arith::setparts_with_auts(sigma) {
            let coeff = mult * if (sigma.len() - blocks.len()) % 2 == 1 { -1 } else { 1 };
            let mut poly = Poly::zero();
            for part in &blocks {
                poly.add_monomial(1, part.iter().sum::<u32>() as usize);
            }
            answer.push((poly, coeff));
        }
        answer
    }

    /// Rewrite one pushforward-basis generator in the monomial basis, as a
    /// sparse vector of (generator, coefficient).
    pub fn convert_to_monomial_basis(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<(usize, i64)>> {
        let key = (num, StrataKey::new(g, r, markings, moduli_type));
        if let Some(v) = self.monomial_conversions.get(&key) {
            return v.clone();
        }
        let graph = self.all_strata(g, r, markings, moduli_type)[num].clone();
        let nv = graph.num_vertices();
        let mut genus_vec = Vec::with_capacity(nv);
        let mut kappa_vecs: Vec<Vec<(Poly, i64)>> = Vec::with_capacity(nv);
        for i in 0..nv {
            genus_vec.push(graph.genus[i].coeff(0));
            let mut indices = Vec::new();
            for j in 1..=r {
                for _ in 0..graph.genus[i].coeff(j) {
                    indices.push(j as u32);
                }
            }
            kappa_vecs.push(self.kappa_conversion(&indices).as_ref().clone());
        }
        let mut answer = Vec::new();
        for choice in choice_products(&kappa_vecs) {
            let mut coeff = 1;
            let mut gg = graph.clone();
            for i in 0..nv {
                gg.genus[i] = Poly::constant(genus_vec[i]) + &choice[i].0;
                coeff *= choice[i].1;
            }
            answer.push((self.num_of_stratum(gg, g, r, markings, moduli_type), coeff));
        }
        let arc = Arc::new(answer);
        self.monomial_conversions.insert(key, arc.clone());
        arc
    }

    /// Rewrite a dense vector from the pushforward basis to the monomial
    /// basis.
    pub fn convert_vector_to_monomial_basis(
        &self,
        vec: &[BigRational],
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<BigRational> {
        let mut vec2 = vec![BigRational::zero(); vec.len()];
        for (i, v) in vec.iter().enumerate() {
            if v.is_zero() {
                continue;
            }
            for &(num, coeff) in self
                .convert_to_monomial_basis(i, g, r, markings, moduli_type)
                .iter()
            {
                vec2[num] += rat(coeff) * v;
            }
        }
        vec2
    }

    /// Multiply a sparse vector by a kappa class.
    pub fn kappa_multiple(
        &self,
        vec: &[(usize, BigRational)],
        which_kappa: usize,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> SparseRel {
        let mut vec2 = Vec::new();
        for (num, coeff) in vec {
            for &(num2, coeff2) in self
                .single_kappa_multiple(*num, which_kappa, g, r, n, symm, moduli_type)
                .iter()
            {
                vec2.push((num2, coeff * rat(coeff2)));
            }
        }
        simplify_sparse(vec2)
    }

    /// Multiply a sparse vector by the psi class at a marking.
    pub fn psi_multiple(
        &self,
        vec: &[(usize, BigRational)],
        which_psi: u32,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> SparseRel {
        let mut vec2 = Vec::new();
        for (num, coeff) in vec {
            for &(num2, coeff2) in self
                .single_psi_multiple(*num, which_psi, g, r, n, symm, moduli_type)
                .iter()
            {
                vec2.push((num2, coeff * rat(coeff2)));
            }
        }
        simplify_sparse(vec2)
    }

    /// Pull a sparse vector back along the map forgetting a marked point.
    pub fn insertion_pullback(
        &self,
        vec: &[(usize, BigRational)],
        new_mark: u32,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
        from_small: bool,
    ) -> SparseRel {
        let mut vec2 = Vec::new();
        for (num, coeff) in vec {
            for &(num2, coeff2) in self
                .single_insertion_pullback(*num, new_mark, g, r, n, symm, moduli_type, from_small)
                .iter()
            {
                vec2.push((num2, coeff * rat(coeff2)));
            }
        }
        simplify_sparse(vec2)
    }

    pub(crate) fn single_psi_multiple(
        &self,
        num: usize,
        which_psi: u32,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<(usize, i64)>> {
        let key = (num, which_psi as usize, g, r, n, symm, moduli_type);
        if let Some(v) = self.single_psi.get(&key) {
            return v.clone();
        }
        let markings = get_marks(n, symm);
        let graph = self.all_strata(g, r, &markings, moduli_type)[num].clone();
        let mut answer = Vec::new();
        let good_j = graph
            .edges
            .iter()
            .position(|e| e.marking == which_psi)
            .expect("marking not present");
        if let Some(i) =
            (0..graph.num_vertices()).find(|&i| !graph.edges[good_j].ends[i].is_zero())
        {
            let (deg, dim_used) = vertex_degree_and_dim_used(&graph, i, r);
            if dim_used < dim_form(graph.genus[i].coeff(0), deg, moduli_type) {
                let mut gg = graph.clone();
                gg.edges[good_j].ends[i].add_monomial(1, 1);
                answer.push((self.num_of_stratum(gg, g, r + 1, &markings, moduli_type), 1));
            }
        }
        let arc = Arc::new(answer);
        self.single_psi.insert(key, arc.clone());
        arc
    }

    /// One generator times a multi-indexed kappa class. The correction
    /// terms merge the new index with each existing kappa index in turn.
    pub(crate) fn single_kappa_multiple(
        &self,
        num: usize,
        which_kappa: usize,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<(usize, i64)>> {
        let key = (num, which_kappa, g, r, n, symm, moduli_type);
        if let Some(v) = self.single_kappa.get(&key) {
            return v.clone();
        }
        let markings = get_marks(n, symm);
        let graph = self.all_strata(g, r, &markings, moduli_type)[num].clone();
        let mut answer = Vec::new();
        for i in 0..graph.num_vertices() {
            let (deg, dim_used) = vertex_degree_and_dim_used(&graph, i, r);
            if dim_used + which_kappa as i64 > dim_form(graph.genus[i].coeff(0), deg, moduli_type)
            {
                continue;
            }
            let mut gg = graph.clone();
            gg.genus[i].add_monomial(1, which_kappa);
            answer.push((
                self.num_of_stratum(gg, g, r + which_kappa, &markings, moduli_type),
                1,
            ));
            for j in 1..=r {
                let count = graph.genus[i].coeff(j);
                if count > 0 {
                    let mut gg = graph.clone();
                    gg.genus[i].add_monomial(1, j + which_kappa);
                    gg.genus[i].add_monomial(-1, j);
                    answer.push((
                        self.num_of_stratum(gg, g, r + which_kappa, &markings, moduli_type),
                        -count,
                    ));
                }
            }
        }
        let arc = Arc::new(answer);
        self.single_kappa.insert(key, arc.clone());
        arc
    }

    /// Pullback of one generator along the forgetful map, inserting the
    /// marking `new_mark`. Correction terms subtract the loci where the
    /// new point collides with a kappa class, a psi-decorated half-edge,
    /// or a psi-decorated loop end.
    pub(crate) fn single_insertion_pullback(
        &self,
        num: usize,
        new_mark: u32,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
        from_small: bool,
    ) -> Arc<Vec<(usize, i64)>> {
        let key = (num, new_mark, g, r, n, symm, moduli_type, from_small);
        if let Some(v) = self.single_pullback.get(&key) {
            return v.clone();
        }
        let markings = get_marks(n, symm);
        let new_markings = if new_mark == 1 {
            get_marks(n + 1, symm + 1)
        } else {
            get_marks(n + 1, symm)
        };
        let source_moduli = if from_small {
            ModuliType::Small
        } else {
            moduli_type
        };
        let graph = self.all_strata(g, r, &markings, source_moduli)[num].clone();
        let mut answer = Vec::new();
        for i in 0..graph.num_vertices() {
            let mut gg = graph.clone();
            if !(new_mark == 1 && symm > 0) {
                for e in &mut gg.edges {
                    if e.marking >= new_mark {
                        e.marking += 1;
                    }
                }
            }
            gg.add_edge(Some(i), None, new_mark);
            let leg = gg.num_edges() - 1;
            answer.push((
                self.num_of_stratum(gg.clone(), g, r, &new_markings, moduli_type),
                1,
            ));
            for j in 1..=r {
                for _ in 0..gg.genus[i].coeff(j) {
                    let mut ggg = gg.clone();
                    ggg.genus[i].add_monomial(-1, j);
                    ggg.edges[leg].ends[i].add_monomial(j as i64, 1);
                    answer.push((
                        self.num_of_stratum(ggg, g, r, &new_markings, moduli_type),
                        -1,
                    ));
                }
            }
            if moduli_type <= ModuliType::Sm {
                continue;
            }
            for j in 0..graph.num_edges() {
                let x = graph.edges[j].ends[i].coeff(1);
                let y = graph.edges[j].ends[i].coeff(2);
                match graph.edges[j].ends[i].coeff(0) {
                    1 if x >= 1 => {
                        let (row1, row2) = split_rows(&gg, i, j, leg);
                        let mut ggg = gg.clone();
                        ggg.split_vertex(i, &row1, &row2);
                        let nv = ggg.num_vertices();
                        let ne = ggg.num_edges();
                        ggg.edges[ne - 1].ends[nv - 2].add_monomial(x - 1, 1);
                        answer.push((
                            self.num_of_stratum(ggg, g, r, &new_markings, moduli_type),
                            -1,
                        ));
                    }
                    2 if !from_small && (x >= 1 || y >= 1) => {
                        let (mut row1, row2) = split_rows(&gg, i, j, leg);
                        if y >= 1 {
                            row1[j + 1] = Poly::constant(1) + &Poly::monomial(x, 1);
                            let mut ggg = gg.clone();
                            ggg.split_vertex(i, &row1, &row2);
                            let nv = ggg.num_vertices();
                            let ne = ggg.num_edges();
                            ggg.edges[ne - 1].ends[nv - 2].add_monomial(y - 1, 1);
                            answer.push((
                                self.num_of_stratum(ggg, g, r, &new_markings, moduli_type),
                                -1,
                            ));
                        }
                        if x >= 1 {
                            row1[j + 1] = Poly::constant(1) + &Poly::monomial(y, 1);
                            let mut ggg = gg.clone();
                            ggg.split_vertex(i, &row1, &row2);
                            let nv = ggg.num_vertices();
                            let ne = ggg.num_edges();
                            ggg.edges[ne - 1].ends[nv - 2].add_monomial(x - 1, 1);
                            answer.push((
                                self.num_of_stratum(ggg, g, r, &new_markings, moduli_type),
                                -1,
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }
        let arc = Arc::new(answer);
        self.single_pullback.insert(key, arc.clone());
        arc
    }
}

/// Rows splitting off a genus-zero vertex carrying the half-edge in
/// column `j` and the freshly inserted leg.
fn split_rows(gg: &Graph, i: usize, j: usize, leg: usize) -> (Vec<Poly>, Vec<Poly>) {
    let mut row1 = Vec::with_capacity(gg.num_edges() + 1);
    row1.push(gg.genus[i].clone());
    for e in &gg.edges {
        row1.push(e.ends[i].clone());
    }
    let mut row2 = vec![Poly::zero(); gg.num_edges() + 1];
    row1[j + 1] = Poly::zero();
    row1[leg + 1] = Poly::zero();
    row2[j + 1] = Poly::constant(1);
    row2[leg + 1] = Poly::constant(1);
    (row1, row2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::St;

    #[test]
    fn test_get_marks() {
        assert_eq!(get_marks(3, 0), vec![1, 2, 3]);
        assert_eq!(get_marks(4, 2), vec![1, 1, 2, 3]);
        assert_eq!(get_marks(3, 3), vec![1, 1, 1]);
    }

    #[test]
    fn test_kappa_conversion() {
        let cache = StrataCache::new();
        let conv = cache.kappa_conversion(&[1, 1, 1]);
        let display: Vec<(String, i64)> =
            conv.iter().map(|(p, c)| (format!("{p}"), *c)).collect();
        assert_eq!(
            display,
            vec![
                ("3*X".to_string(), 1),
                ("X^2 + X".to_string(), 3),
                ("X^3".to_string(), 2),
            ]
        );
        let conv = cache.kappa_conversion_inverse(&[1, 1, 1]);
        let display: Vec<(String, i64)> =
            conv.iter().map(|(p, c)| (format!("{p}"), *c)).collect();
        assert_eq!(
            display,
            vec![
                ("3*X".to_string(), 1),
                ("X^2 + X".to_string(), -3),
                ("X^3".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_convert_to_monomial_basis() {
        let cache = StrataCache::new();
        assert_eq!(
            *cache.convert_to_monomial_basis(1, 2, 3, &[1, 2, 3], St),
            vec![(1, 1), (0, 1)]
        );
        assert_eq!(
            *cache.convert_to_monomial_basis(2, 2, 3, &[1, 2, 3], St),
            vec![(2, 1), (1, 3), (0, 2)]
        );
    }

    #[test]
    fn test_multiply_by_kappa1() {
        let cache = StrataCache::new();
        // kappa_1 times the kappa_2 monomial in genus 2
        let product = cache.multiply(1, 0, 2, 0, 2, 3, &[], St);
        let expected: Vec<i64> = vec![0, 1, 0, 0, 0, 0, 0, 0];
        let expected: Vec<BigRational> = expected.into_iter().map(rat).collect();
        assert_eq!(product[..expected.len()], expected[..]);
        assert!(product[expected.len()..].iter().all(BigRational::is_zero));
    }

    #[test]
    fn test_multiply_table() {
        let cache = StrataCache::new();
        // products of the codimension 1 and 2 generators on \bar M_2,
        // given as (i1, i2) -> sparse expected result in codimension 3
        let expected: Vec<(usize, usize, Vec<(usize, i64)>)> = vec![
            (1, 0, vec![]),
            (1, 1, vec![(3, 2)]),
            (1, 2, vec![(4, -2)]),
            (1, 3, vec![(5, -2)]),
            (1, 4, vec![(11, 2)]),
            (1, 5, vec![]),
            (1, 6, vec![(12, -2)]),
            (1, 7, vec![(15, 2)]),
            (2, 0, vec![(6, 1)]),
            (2, 1, vec![(7, 1)]),
            (2, 2, vec![(11, 1)]),
            (2, 3, vec![(12, 1)]),
            (2, 4, vec![(8, -4), (13, 1)]),
            (2, 5, vec![(9, -2), (10, -2), (14, 1)]),
            (2, 6, vec![(15, 1)]),
            (2, 7, vec![(14, -8), (16, 4)]),
        ];
        let n3 = cache.num_strata(2, 3, &[], St);
        assert_eq!(n3, 17);
        for (i1, i2, sparse) in expected {
            let row = cache.multiply(1, i1, 2, i2, 2, 3, &[], St);
            let mut dense = vec![BigRational::zero(); n3];
            for (k, c) in sparse {
                dense[k] = rat(c);
            }
            assert_eq!(*row, dense, "i1={i1} i2={i2}");
        }
    }

    #[test]
    fn test_single_psi_multiple() {
        let cache = StrataCache::new();
        assert_eq!(
            *cache.single_psi_multiple(5, 1, 2, 2, 2, 0, St),
            vec![(11, 1)]
        );
    }

    #[test]
    fn test_single_insertion_pullback() {
        let cache = StrataCache::new();
        assert_eq!(
            *cache.single_insertion_pullback(0, 1, 5, 2, 0, 0, ModuliType::Rt, false),
            vec![(0, 1), (3, -1)]
        );
        assert_eq!(
            *cache.single_insertion_pullback(1, 1, 5, 2, 0, 0, ModuliType::Rt, false),
            vec![(1, 1), (2, -1), (2, -1)]
        );
        assert_eq!(
            *cache.single_insertion_pullback(10, 1, 2, 2, 1, 0, St, false),
            vec![(25, 1), (27, -1)]
        );
    }

    #[test]
    fn test_associativity_small() {
        let cache = StrataCache::new();
        cache.check_associativity(2, 1, 1, 1, &[], St).unwrap();
    }
}
