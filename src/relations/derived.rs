//! Relations derived from smaller ones.
//!
//! A basis of genuinely new relations per `(g, r, n)` is chosen with a
//! sparse rank computation; everything else is generated from those by
//! pulling back along forgetful maps, multiplying by psi and kappa
//! classes, and inserting relations at vertices of boundary strata.
//! Symmetrized marking sets keep the intermediate lists small.

use num_rational::BigRational;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use arith::{
    choose_orders_sparse, compute_rank_sparse, integer_vectors, partitions, rat,
    remove_duplicates, simplify_sparse, SparseMatrix,
};
use itertools::Itertools;

use crate::algebra::get_marks;
use crate::moduli::{dim_form, ModuliType};
use crate::relations::spin::undecorated_vertex;
use crate::strata::{SparseRel, StrataCache, StrataKey};

fn count_ones(marks: &[u32]) -> usize {
    marks.iter().filter(|&&m| m == 1).count()
}

/// The possible label multisets for `l` points inserted into a relation,
/// as sub-multisets of the final marking set.
fn mark_subsequences(n: usize, l: usize, symm: usize) -> Vec<Vec<u32>> {
    let marks = get_marks(n, symm.max(1));
    let subs: Vec<Vec<u32>> = (0..n)
        .combinations(l)
        .map(|c| c.into_iter().map(|i| marks[i]).collect())
        .collect();
    remove_duplicates(subs)
}

impl StrataCache {
    /// For each stratum with `markings`, its index after replacing the
    /// labels by the more symmetric `symm_markings`.
    pub(crate) fn symmetrize_map(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        symm_markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<usize>> {
        let key = (
            StrataKey::new(g, r, markings, moduli_type),
            symm_markings.to_vec(),
        );
        if let Some(v) = self.sym_maps.get(&key) {
            return v.clone();
        }
        let gens = self.all_strata(g, r, markings, moduli_type);
        let dif = count_ones(markings) as i64 - 2;
        let mut map = Vec::with_capacity(gens.len());
        for graph in gens.iter() {
            let mut gg = graph.clone();
            for e in &mut gg.edges {
                if e.marking > 0 {
                    e.marking = symm_markings[(e.marking as i64 + dif) as usize];
                }
            }
            map.push(self.num_of_stratum(gg, g, r, symm_markings, moduli_type));
        }
        let arc = Arc::new(map);
        self.sym_maps.insert(key, arc.clone());
        arc
    }

    /// Inverse of [`Self::symmetrize_map`] by one symmetry step: each
    /// stratum with `symm_markings` maps to its orbit of strata with
    /// `markings`, weighted by orbit multiplicities.
    fn partial_unsymmetrize_map(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        symm_markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<SparseRel>> {
        let key = (
            StrataKey::new(g, r, markings, moduli_type),
            symm_markings.to_vec(),
        );
        if let Some(v) = self.partial_unsym_maps.get(&key) {
            return v.clone();
        }
        let target_symm = count_ones(markings);
        let symm = count_ones(symm_markings);
        let n = markings.len();
        let result = if target_symm + 1 < symm {
            let mid = get_marks(n, target_symm + 1);
            let upper = self.partial_unsymmetrize_map(g, r, &mid, symm_markings, moduli_type);
            upper
                .iter()
                .map(|us| self.partial_unsymmetrize_vec(us, g, r, markings, &mid, moduli_type))
                .collect()
        } else {
            let gens = self.all_strata(g, r, markings, moduli_type);
            let mut orbits: FxHashMap<usize, i64> = FxHashMap::default();
            for i in 0..gens.len() {
                if orbits.contains_key(&i) {
                    continue;
                }
                orbits.insert(i, 1);
                let graph = &gens[i];
                let pt2 = graph
                    .edges
                    .iter()
                    .position(|e| e.marking == 2)
                    .expect("no second marking to unsymmetrize");
                for j in 0..graph.num_edges() {
                    if graph.edges[j].marking == 1 {
                        let mut gg = graph.clone();
                        gg.edges[j].marking = 2;
                        gg.edges[pt2].marking = 1;
                        let num = self.num_of_stratum(gg, g, r, markings, moduli_type);
                        *orbits.entry(num).or_insert(0) += 1;
                    }
                }
            }
            let sym_map = self.symmetrize_map(g, r, markings, symm_markings, moduli_type);
            let mut result: Vec<SparseRel> =
                vec![Vec::new(); self.num_strata(g, r, symm_markings, moduli_type)];
            let mut keys: Vec<usize> = orbits.keys().copied().collect();
            keys.sort_unstable();
            for k in keys {
                result[sym_map[k]].push((k, rat(orbits[&k])));
            }
            result
        };
        let arc = Arc::new(result);
        self.partial_unsym_maps.insert(key, arc.clone());
        arc
    }

    /// Rewrite a relation over the `symm_markings` strata as one over the
    /// `markings` strata, splitting each coefficient over the orbit.
    pub(crate) fn partial_unsymmetrize_vec(
        &self,
        vec: &SparseRel,
        g: i64,
        r: usize,
        markings: &[u32],
        symm_markings: &[u32],
        moduli_type: ModuliType,
    ) -> SparseRel {
        if markings == symm_markings {
            return vec.clone();
        }
        let unsym_map = self.partial_unsymmetrize_map(g, r, markings, symm_markings, moduli_type);
        let mut vec2 = Vec::new();
        for (idx, coeff) in vec {
            let total: BigRational = unsym_map[*idx].iter().map(|x| x.1.clone()).sum();
            for (j, weight) in &unsym_map[*idx] {
                vec2.push((*j, coeff * weight / &total));
            }
        }
        simplify_sparse(vec2)
    }

    /// Orbit lists for unsymmetrizing from full symmetry in one go.
    fn unsymmetrize_map(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<Vec<usize>>> {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.full_unsym_maps.get(&key) {
            return v.clone();
        }
        let all_ones = vec![1u32; markings.len()];
        let sym_map = self.symmetrize_map(g, r, markings, &all_ones, moduli_type);
        let mut map: Vec<Vec<usize>> =
            vec![Vec::new(); self.num_strata(g, r, &all_ones, moduli_type)];
        for (i, &s) in sym_map.iter().enumerate() {
            map[s].push(i);
        }
        let arc = Arc::new(map);
        self.full_unsym_maps.insert(key, arc.clone());
        arc
    }

    pub(crate) fn unsymmetrize_vec(
        &self,
        vec: &SparseRel,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> SparseRel {
        let unsym_map = self.unsymmetrize_map(g, r, markings, moduli_type);
        let mut vec2 = Vec::new();
        for (idx, coeff) in vec {
            let share = coeff / rat(unsym_map[*idx].len() as i64);
            for &j in &unsym_map[*idx] {
                vec2.push((j, share.clone()));
            }
        }
        simplify_sparse(vec2)
    }

    /// Relations pulled back along forgetful maps from fewer points.
    pub(crate) fn pullback_derived_rels(
        &self,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<SparseRel>> {
        let key = (g, r, n, symm, moduli_type);
        if let Some(v) = self.pullback_derived.get(&key) {
            return v.clone();
        }
        let mut answer: Vec<SparseRel> = Vec::new();
        if r > 0 {
            for n0 in 0..n {
                if dim_form(g, n0 as i64, moduli_type) >= r as i64 {
                    let basic_rels = self.choose_basic_rels(g, r, n0, moduli_type);
                    for rel in basic_rels.iter() {
                        for vec in mark_subsequences(n, n - n0, symm) {
                            let mut local_symm = symm.max(1) - count_ones(&vec);
                            let mut rel2 = if local_symm < n0 {
                                self.partial_unsymmetrize_vec(
                                    rel,
                                    g,
                                    r,
                                    &get_marks(n0, local_symm),
                                    &get_marks(n0, n0),
                                    moduli_type,
                                )
                            } else {
                                rel.clone()
                            };
                            for (i, &mark) in vec.iter().enumerate() {
                                rel2 = self.insertion_pullback(
                                    &rel2,
                                    mark,
                                    g,
                                    r,
                                    n0 + i,
                                    local_symm,
                                    moduli_type,
                                    false,
                                );
                                if mark == 1 {
                                    local_symm += 1;
                                }
                            }
                            answer.push(simplify_sparse(rel2));
                        }
                    }
                } else {
                    // relations living beyond the dimension bound come in
                    // from the formal graded piece above it
                    if moduli_type == ModuliType::St
                        && !((g == 0 && n0 < 3) || (g == 1 && n0 == 0))
                    {
                        continue;
                    }
                    let basic_rels = self.choose_basic_rels(g, r, n0, ModuliType::Small);
                    let k = (r as i64 - dim_form(g, n0 as i64, moduli_type)) as usize;
                    if n < n0 + k {
                        continue;
                    }
                    for rel in basic_rels.iter() {
                        for vec2 in mark_subsequences(n, n - n0 - k + 1, symm) {
                            let local_symm2 = symm.max(1) - count_ones(&vec2);
                            for vec in mark_subsequences(n0 + k - 1, k - 1, local_symm2) {
                                let mut local_symm = local_symm2.max(1) - count_ones(&vec);
                                let mut rel2 = if local_symm < n0 {
                                    self.partial_unsymmetrize_vec(
                                        rel,
                                        g,
                                        r,
                                        &get_marks(n0, local_symm),
                                        &get_marks(n0, n0),
                                        ModuliType::Small,
                                    )
                                } else {
                                    rel.clone()
                                };
                                for (i, &mark) in vec.iter().enumerate() {
                                    rel2 = self.insertion_pullback(
                                        &rel2,
                                        mark,
                                        g,
                                        r,
                                        n0 + i,
                                        local_symm,
                                        ModuliType::Small,
                                        false,
                                    );
                                    if mark == 1 {
                                        local_symm += 1;
                                    }
                                }
                                local_symm = local_symm2;
                                rel2 = self.insertion_pullback(
                                    &rel2,
                                    vec2[0],
                                    g,
                                    r,
                                    n0 + k - 1,
                                    local_symm,
                                    moduli_type,
                                    true,
                                );
                                if vec2[0] == 1 {
                                    local_symm += 1;
                                }
                                for (i, &mark) in vec2[1..].iter().enumerate() {
                                    rel2 = self.insertion_pullback(
                                        &rel2,
                                        mark,
                                        g,
                                        r,
                                        n0 + k + i,
                                        local_symm,
                                        moduli_type,
                                        false,
                                    );
                                    if mark == 1 {
                                        local_symm += 1;
                                    }
                                }
                                answer.push(simplify_sparse(rel2));
                            }
                        }
                    }
                }
            }
        }
        let arc = Arc::new(remove_duplicates(answer));
        self.pullback_derived.insert(key, arc.clone());
        arc
    }

    /// Pullback relations together with their psi and kappa multiples.
    pub(crate) fn interior_derived_rels(
        &self,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<SparseRel>> {
        let key = (g, r, n, symm, moduli_type);
        if let Some(v) = self.interior_derived.get(&key) {
            return v.clone();
        }
        let mut answer: Vec<SparseRel> =
            self.pullback_derived_rels(g, r, n, symm, moduli_type).to_vec();
        for r0 in 0..r {
            let local_symm = symm.saturating_sub(r - r0);
            let sym_map = if local_symm < symm {
                Some(self.symmetrize_map(
                    g,
                    r,
                    &get_marks(n, local_symm),
                    &get_marks(n, symm),
                    moduli_type,
                ))
            } else {
                None
            };
            let mut pullback_rels: Vec<SparseRel> = self
                .choose_basic_rels(g, r0, n, moduli_type)
                .iter()
                .map(|v| {
                    self.partial_unsymmetrize_vec(
                        v,
                        g,
                        r0,
                        &get_marks(n, local_symm),
                        &get_marks(n, n),
                        moduli_type,
                    )
                })
                .collect();
            pullback_rels
                .extend(self.pullback_derived_rels(g, r0, n, local_symm, moduli_type).iter().cloned());
            let marks = get_marks(n, local_symm);
            for rel in &pullback_rels {
                for i in 0..=(r - r0) {
                    for sigma in partitions(i as u32) {
                        for tau in integer_vectors((r - r0 - i) as u32, n - local_symm) {
                            let mut rel2 = rel.clone();
                            let mut rcur = r0;
                            for (m, &count) in tau.iter().enumerate() {
                                for _ in 0..count {
                                    rel2 = self.psi_multiple(
                                        &rel2,
                                        marks[n - 1 - m],
                                        g,
                                        rcur,
                                        n,
                                        local_symm,
                                        moduli_type,
                                    );
                                    rcur += 1;
                                }
                            }
                            for &m in &sigma {
                                rel2 = self.kappa_multiple(
                                    &rel2,
                                    m as usize,
                                    g,
                                    rcur,
                                    n,
                                    local_symm,
                                    moduli_type,
                                );
                                rcur += m as usize;
                            }
                            if let Some(map) = &sym_map {
                                rel2 = rel2.into_iter().map(|(idx, c)| (map[idx], c)).collect();
                            }
                            answer.push(simplify_sparse(rel2));
                        }
                    }
                }
            }
        }
        let arc = Arc::new(remove_duplicates(answer));
        self.interior_derived.insert(key, arc.clone());
        arc
    }

    /// All relations derived from lower genus, codimension or point count,
    /// including vertex insertions into boundary strata.
    pub fn derived_rels(
        &self,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<SparseRel>> {
        let key = (g, r, n, symm, moduli_type);
        if let Some(v) = self.derived.get(&key) {
            return v.clone();
        }
        if dim_form(g, n as i64, moduli_type) < r as i64 {
            let arc = Arc::new(Vec::new());
            self.derived.insert(key, arc.clone());
            return arc;
        }
        let markings = get_marks(n, symm);
        let mut answer: Vec<SparseRel> =
            self.interior_derived_rels(g, r, n, symm, moduli_type).to_vec();
        if moduli_type > ModuliType::Sm {
            for r0 in 1..r {
                let strata = self.all_strata(g, r0, &markings, moduli_type);
                for graph in strata.iter() {
                    for orbit in crate::isomorphism::vertex_orbits(graph) {
                        let i = orbit[0];
                        if !undecorated_vertex(graph, i) {
                            continue;
                        }
                        let localsymm = graph
                            .edges
                            .iter()
                            .filter(|e| e.marking == 1 && e.ends[i].coeff(0) == 1)
                            .count();
                        let g2 = graph.genus[i].coeff(0);
                        if 3 * (r - r0) < (g2 + 1) as usize {
                            continue;
                        }
                        let d = graph.degree(i) as usize;
                        if dim_form(g2, d as i64, moduli_type) < (r - r0) as i64 {
                            continue;
                        }
                        let sub_marks = get_marks(d, localsymm);
                        let strata2 = self.all_strata(g2, r - r0, &sub_marks, moduli_type);
                        let which_gen: Vec<usize> = strata2
                            .iter()
                            .map(|s| {
                                let mut g_copy = graph.clone();
                                g_copy.replace_vertex_with_graph(i, s);
                                self.num_of_stratum(g_copy, g, r, &markings, moduli_type)
                            })
                            .collect();
                        let mut rel_list: Vec<SparseRel> = self
                            .choose_basic_rels(g2, r - r0, d, moduli_type)
                            .iter()
                            .map(|br| {
                                self.partial_unsymmetrize_vec(
                                    br,
                                    g2,
                                    r - r0,
                                    &sub_marks,
                                    &get_marks(d, d),
                                    moduli_type,
                                )
                            })
                            .collect();
                        rel_list.extend(
                            self.interior_derived_rels(g2, r - r0, d, localsymm, moduli_type)
                                .iter()
                                .cloned(),
                        );
                        for rel0 in &rel_list {
                            let relation: SparseRel = rel0
                                .iter()
                                .map(|(idx, c)| (which_gen[*idx], c.clone()))
                                .collect();
                            answer.push(simplify_sparse(relation));
                        }
                    }
                }
            }
        }
        let arc = Arc::new(remove_duplicates(answer));
        self.derived.insert(key, arc.clone());
        arc
    }

    /// A minimal set of relations in the fully symmetrized piece that are
    /// independent from everything derived from smaller pieces.
    pub fn choose_basic_rels(
        &self,
        g: i64,
        r: usize,
        n: usize,
        moduli_type: ModuliType,
    ) -> Arc<Vec<SparseRel>> {
        let key = (g, r, n, moduli_type);
        if let Some(v) = self.basic_rels.get(&key) {
            return v.clone();
        }
        if 3 * (r as i64) < g + n as i64 + 1 {
            let arc = Arc::new(Vec::new());
            self.basic_rels.insert(key, arc.clone());
            return arc;
        }
        let ones = vec![1u32; n];
        let sym_ngen = self.num_strata(g, r, &ones, moduli_type);
        let sym_possible_rels: Vec<SparseRel> = if moduli_type == ModuliType::Small
            && r as i64 > dim_form(g, n as i64, ModuliType::Sm)
        {
            (0..sym_ngen).map(|i| vec![(i, BigRational::one())]).collect()
        } else {
            self.possibly_new_fz(g, r, n, moduli_type)
        };
        if sym_possible_rels.is_empty() {
            let arc = Arc::new(Vec::new());
            self.basic_rels.insert(key, arc.clone());
            return arc;
        }
        let previous_rels = self.derived_rels(g, r, n, n, moduli_type);
        let mut nrels = previous_rels.len();
        let mut d = SparseMatrix::default();
        for (i, rel) in previous_rels.iter().enumerate() {
            for (j, c) in rel {
                d.insert((i, *j), c.clone());
            }
        }
        let (mut row_order, col_order);
        let mut previous_rank;
        if nrels > 0 {
            let orders = choose_orders_sparse(&d, nrels, sym_ngen);
            row_order = orders.0;
            col_order = orders.1;
            previous_rank = compute_rank_sparse(&mut d, &row_order, &col_order);
        } else {
            previous_rank = 0;
            row_order = Vec::new();
            col_order = (0..sym_ngen).collect();
        }
        let mut answer = Vec::new();
        for rel in &sym_possible_rels {
            for (j, c) in rel {
                d.insert((nrels, *j), c.clone());
            }
            row_order.push(nrels);
            nrels += 1;
            if compute_rank_sparse(&mut d, &row_order, &col_order) > previous_rank {
                answer.push(rel.clone());
                previous_rank += 1;
            }
        }
        let arc = Arc::new(answer);
        self.basic_rels.insert(key, arc.clone());
        arc
    }

    pub fn num_new_rels(&self, g: i64, r: usize, n: usize, moduli_type: ModuliType) -> usize {
        self.choose_basic_rels(g, r, n, moduli_type).len()
    }

    /// All relations for `(g, r, n)` with the first `symm` points
    /// symmetrized, either via the 3-spin formula directly or via the
    /// derived machinery, as sparse rows plus the generator count.
    pub fn rels_matrix(
        &self,
        g: i64,
        r: usize,
        n: usize,
        symm: usize,
        moduli_type: ModuliType,
        use_spin: bool,
    ) -> (Vec<SparseRel>, usize) {
        let markings = get_marks(n, symm);
        let ngen = self.num_strata(g, r, &markings, moduli_type);
        if use_spin {
            assert_eq!(symm, 0, "3-spin matrix not implemented with symmetry");
            let rows = self
                .list_all_fz(g, r, &markings, moduli_type)
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .enumerate()
                        .filter(|(_, c)| !c.is_zero())
                        .collect()
                })
                .collect();
            return (rows, ngen);
        }
        let mut rels: Vec<SparseRel> = self.derived_rels(g, r, n, symm, moduli_type).to_vec();
        let pnrels = self.possibly_new_fz(g, r, n, moduli_type);
        if symm != n {
            if symm == 0 {
                rels.extend(
                    pnrels
                        .iter()
                        .map(|p| self.unsymmetrize_vec(p, g, r, &markings, moduli_type)),
                );
            } else {
                rels.extend(pnrels.iter().map(|p| {
                    self.partial_unsymmetrize_vec(
                        p,
                        g,
                        r,
                        &markings,
                        &get_marks(n, n),
                        moduli_type,
                    )
                }));
            }
        } else {
            rels.extend(pnrels);
        }
        (rels, ngen)
    }

    /// Whether the 3-spin relations and the derived relations span the
    /// same row space.
    pub fn fz_methods_sanity_check(
        &self,
        g: i64,
        r: usize,
        n: usize,
        moduli_type: ModuliType,
    ) -> bool {
        let (spin, ngen) = self.rels_matrix(g, r, n, 0, moduli_type, true);
        let (newrels, _) = self.rels_matrix(g, r, n, 0, moduli_type, false);
        let rank = |rows: &[SparseRel]| -> usize {
            let mut d = SparseMatrix::default();
            for (i, row) in rows.iter().enumerate() {
                for (j, c) in row {
                    d.insert((i, *j), c.clone());
                }
            }
            let (ro, co) = choose_orders_sparse(&d, rows.len(), ngen);
            compute_rank_sparse(&mut d, &ro, &co)
        };
        let mut combined = spin.clone();
        combined.extend(newrels.iter().cloned());
        let r1 = rank(&spin);
        let r2 = rank(&newrels);
        r1 == r2 && r1 == rank(&combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::{Ct, Rt, Sm, St};

    #[test]
    fn test_mark_subsequences() {
        // one insertion into three unsymmetrized points: any label
        assert_eq!(
            mark_subsequences(3, 1, 0),
            vec![vec![1], vec![2], vec![3]]
        );
        // fully symmetric: only label 1 sequences
        assert_eq!(mark_subsequences(3, 2, 3), vec![vec![1, 1]]);
    }

    #[test]
    fn test_choose_basic_rels_genus_two() {
        let c = StrataCache::new();
        let rels = c.choose_basic_rels(2, 2, 0, St);
        let expect: SparseRel = vec![
            (0, rat(115920)),
            (1, rat(-12240)),
            (2, rat(13536)),
            (3, rat(-5040)),
            (4, rat(1584)),
            (5, rat(-5040)),
            (6, rat(-144)),
            (7, rat(-36)),
        ];
        assert_eq!(rels.as_slice(), &[expect]);
    }

    #[test]
    fn test_methods_agree_small_cases() {
        let c = StrataCache::new();
        for moduli_type in [Sm, Rt, Ct, St] {
            for r in 0..3 {
                assert!(
                    c.fz_methods_sanity_check(1, r, 1, moduli_type),
                    "mismatch at g=1, r={r}, {moduli_type}"
                );
            }
        }
        assert!(c.fz_methods_sanity_check(2, 2, 0, St));
        assert!(c.fz_methods_sanity_check(0, 1, 5, St));
    }
}
