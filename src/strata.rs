//! Stratum enumeration and the memoization context.
//!
//! For fixed `(g, r, markings, moduli_type)` the strata of that codimension
//! form an ordered list of isomorphism-class representatives; the position
//! in this list is the canonical generator number used everywhere else as
//! a compact handle. The enumeration order is therefore part of the
//! contract: one-vertex graphs first bucketed by the number of self-loops
//! and edges, degenerations within a bucket deduplicated in discovery
//! order, buckets concatenated by increasing moduli sub-level.
//!
//! All derived tables (index lookups, automorphism counts, contraction
//! tables, products) are memoized in a [`StrataCache`], constructed once
//! per top-level computation and passed by reference. Tables are
//! append-only for the lifetime of the cache.

use std::sync::Arc;

use dashmap::DashMap;
use itertools::Itertools;
use num_rational::BigRational;
use rustc_hash::FxHashMap;

use crate::graph::{Graph, GraphInvariant};
use crate::isomorphism::{graph_isomorphic, graph_list_isomorphisms, Isomorphism};
use crate::moduli::{dim_form, ModuliType};
use crate::poly::Poly;

/// Key of one graded piece of the strata algebra.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StrataKey {
    pub g: i64,
    pub r: usize,
    pub markings: Vec<u32>,
    pub moduli: ModuliType,
}

impl StrataKey {
    pub fn new(g: i64, r: usize, markings: &[u32], moduli: ModuliType) -> Self {
        Self {
            g,
            r,
            markings: markings.to_vec(),
            moduli,
        }
    }
}

/// Identifier of a pure stratum: codimension and index in the pure list.
pub type PureKey = (usize, usize);

/// One way two pure strata glue along a common degeneration: the common
/// stratum, the shared boundary edges, and for each factor the
/// vertex/edge maps from the contracted graph back into the common one.
#[derive(Clone, Debug)]
pub struct Gluing {
    pub source: PureKey,
    /// Column ids of the shared boundary edges in the common stratum.
    pub shared: Vec<usize>,
    /// For each vertex of the first contracted graph, the vertices of the
    /// common stratum merged into it; and the original column id of each
    /// surviving edge.
    pub vmap1: Vec<Vec<usize>>,
    pub emap1: Vec<usize>,
    pub vmap2: Vec<Vec<usize>>,
    pub emap2: Vec<usize>,
    /// Isomorphisms from the canonical pure strata to the contracted graphs.
    pub isom1: Isomorphism,
    pub isom2: Isomorphism,
}

pub type ContractionTable = FxHashMap<(PureKey, PureKey), Vec<Gluing>>;
pub type UnpurifyMap = FxHashMap<PureKey, Vec<usize>>;

/// Memoization context for everything keyed by `(g, r, markings, moduli)`.
///
/// Tables are concurrent maps so the cache can be shared; they are only
/// ever inserted into, never evicted.
#[derive(Default)]
pub struct StrataCache {
    strata: DashMap<StrataKey, Arc<Vec<Graph>>>,
    pure_strata: DashMap<StrataKey, Arc<Vec<Graph>>>,
    strata_lookup: DashMap<StrataKey, Arc<FxHashMap<GraphInvariant, Vec<usize>>>>,
    autom_counts: DashMap<(usize, StrataKey), i64>,
    pure_autom_counts: DashMap<(usize, StrataKey), i64>,
    aut_cosets: DashMap<(usize, StrataKey), Arc<(i64, Vec<Isomorphism>)>>,
    unpurify: DashMap<StrataKey, Arc<UnpurifyMap>>,
    contraction: DashMap<StrataKey, Arc<ContractionTable>>,
    pub(crate) products: DashMap<(usize, usize, usize, usize, StrataKey), Arc<Vec<BigRational>>>,
    pub(crate) kappa_conversions: DashMap<Vec<u32>, Arc<Vec<(Poly, i64)>>>,
    pub(crate) monomial_conversions: DashMap<(usize, StrataKey), Arc<Vec<(usize, i64)>>>,
    pub(crate) single_kappa:
        DashMap<(usize, usize, i64, usize, usize, usize, ModuliType), Arc<Vec<(usize, i64)>>>,
    pub(crate) single_psi:
        DashMap<(usize, usize, i64, usize, usize, usize, ModuliType), Arc<Vec<(usize, i64)>>>,
    pub(crate) single_pullback: DashMap<
        (usize, u32, i64, usize, usize, usize, ModuliType, bool),
        Arc<Vec<(usize, i64)>>,
    >,
    pub(crate) fz_rows: DashMap<(FzParam, StrataKey), Arc<Vec<BigRational>>>,
    pub(crate) basic_rels: DashMap<(i64, usize, usize, ModuliType), Arc<Vec<SparseRel>>>,
    pub(crate) pullback_derived: DashMap<(i64, usize, usize, usize, ModuliType), Arc<Vec<SparseRel>>>,
    pub(crate) interior_derived: DashMap<(i64, usize, usize, usize, ModuliType), Arc<Vec<SparseRel>>>,
    pub(crate) derived: DashMap<(i64, usize, usize, usize, ModuliType), Arc<Vec<SparseRel>>>,
    pub(crate) sym_maps: DashMap<(StrataKey, Vec<u32>), Arc<Vec<usize>>>,
    pub(crate) partial_unsym_maps: DashMap<(StrataKey, Vec<u32>), Arc<Vec<SparseRel>>>,
    pub(crate) full_unsym_maps: DashMap<StrataKey, Arc<Vec<Vec<usize>>>>,
    pub(crate) betti: DashMap<StrataKey, usize>,
    pub(crate) pairings: DashMap<(Vec<usize>, Vec<usize>, StrataKey), Arc<Vec<Vec<BigRational>>>>,
    pub(crate) socle_recursions: DashMap<(i64, Vec<usize>), BigRational>,
}

/// A relation as a sparse vector over the generators.
pub type SparseRel = Vec<(usize, BigRational)>;

/// A 3-spin relation parameter: a partition with parts not 2 mod 3,
/// together with a sub-partition for each marking.
pub type FzParam = (Vec<u32>, Vec<Vec<u32>>);

/// Return isomorphism-class representatives, keeping the first graph of
/// each class in list order. Computes invariants as a side effect.
pub fn remove_isomorphic(g_list: Vec<Graph>) -> Vec<Graph> {
    let mut g_list_new: Vec<Graph> = Vec::new();
    let mut inv_dict: FxHashMap<GraphInvariant, Vec<usize>> = FxHashMap::default();
    for mut g1 in g_list {
        g1.compute_invariant();
        let seen = inv_dict.entry(g1.invariant().clone()).or_default();
        if seen.iter().any(|&i| graph_isomorphic(&g1, &g_list_new[i])) {
            continue;
        }
        seen.push(g_list_new.len());
        g_list_new.push(g1);
    }
    g_list_new
}

/// All one-step boundary degenerations of the bucketed graphs, up to
/// isomorphism, rebucketed by moduli sub-level.
pub fn degenerate(g_list: &[Vec<Graph>], moduli_type: ModuliType) -> Vec<Vec<Graph>> {
    let mod_size = moduli_type.bucket_count();
    let mut g_list_new: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
    for (which_type, bucket) in g_list.iter().enumerate() {
        for g in bucket {
            for i in 0..g.num_vertices() {
                // row = genus followed by the incidence entries; all
                // constants since the graph is undecorated
                let mut row = vec![g.genus[i].coeff(0)];
                row.extend(g.edges.iter().map(|e| e.ends[i].coeff(0)));
                let m: i64 = row[0] + row.iter().sum::<i64>();
                if m < 4 {
                    continue;
                }
                let len = row.len();
                let mut row1 = vec![0i64; len];
                loop {
                    let doubled: Vec<i64> = row1.iter().map(|&x| 2 * x).collect();
                    if doubled > row {
                        break;
                    }
                    if row1[0] == 1 && moduli_type.level() <= ModuliType::Rt.level() {
                        break;
                    }
                    let weight: i64 = row1[0] + row1.iter().sum::<i64>();
                    if weight >= 2 && weight <= m - 2 {
                        let row2: Vec<i64> = (0..len).map(|j| row[j] - row1[j]).collect();
                        let mut g_copy = g.clone();
                        g_copy.split_vertex(
                            i,
                            &row1.iter().map(|&x| Poly::constant(x)).collect::<Vec<_>>(),
                            &row2.iter().map(|&x| Poly::constant(x)).collect::<Vec<_>>(),
                        );
                        let mut new_type = which_type;
                        if new_type == 0 {
                            new_type = 1; // smooth becomes rational tails
                        }
                        if new_type == 1 && row1[0] > 0 {
                            new_type = 2; // genus on both sides: compact type
                        }
                        g_list_new[new_type].push(g_copy);
                    }
                    row1[len - 1] += 1;
                    for j in 1..len {
                        if row1[len - j] <= row[len - j] {
                            break;
                        }
                        row1[len - j] = 0;
                        row1[len - j - 1] += 1;
                    }
                }
            }
        }
    }
    g_list_new.into_iter().map(remove_isomorphic).collect()
}

/// Distribute exactly `r` extra degree over the bucketed graphs as kappa
/// classes on vertices and psi powers on half-edges, dropping assignments
/// that exceed the local dimension at each moduli sub-level.
pub fn decorate(g_list: &[Vec<Graph>], r: usize, moduli_type: ModuliType) -> Vec<Vec<Graph>> {
    let mod_size = moduli_type.bucket_count();
    let mut g_list_new: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
    for (which_type, bucket) in g_list.iter().enumerate() {
        for g in bucket {
            let mut g_deco: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
            let mut two_list = Vec::new();
            let mut one_list = Vec::new();
            for i in 0..g.num_vertices() {
                for (j, e) in g.edges.iter().enumerate() {
                    if e.ends[i] == Poly::constant(2) {
                        two_list.push((i, j));
                    } else if e.ends[i] == Poly::constant(1) {
                        one_list.push((i, j));
                    }
                }
            }
            let a = g.num_vertices();
            let b = two_list.len();
            let c = one_list.len();
            let dims: Vec<Vec<i64>> = (0..mod_size)
                .map(|mod_type| {
                    (0..a)
                        .map(|i| {
                            dim_form(
                                g.genus[i].coeff(0),
                                g.degree(i),
                                ModuliType::from_level(mod_type as i32),
                            )
                        })
                        .collect()
                })
                .collect();
            for vec in arith::integer_vectors(r as u32, a + b + c) {
                let mut new_type = which_type;
                if moduli_type > ModuliType::Small {
                    let mut test_dims: Vec<i64> =
                        vec.iter().take(a).map(|&x| x as i64).collect();
                    for i in 0..b {
                        test_dims[two_list[i].0] += vec[a + i] as i64;
                    }
                    for i in 0..c {
                        test_dims[one_list[i].0] += vec[a + b + i] as i64;
                    }
                    for (mod_type, dim_row) in dims.iter().enumerate().skip(which_type) {
                        if (0..a).any(|i| test_dims[i] > dim_row[i]) {
                            new_type = mod_type + 1;
                        }
                    }
                    if new_type >= mod_size {
                        continue;
                    }
                }
                let mut s_list: Vec<Vec<Vec<u32>>> = Vec::with_capacity(a + b);
                for i in 0..a {
                    s_list.push(arith::partitions(vec[i]));
                }
                for i in a..a + b {
                    s_list.push(
                        (0..=vec[i] / 2).map(|j| vec![vec[i] - j, j]).collect(),
                    );
                }
                for vec2 in s_list.iter().map(|choices| choices.iter()).multi_cartesian_product() {
                    let mut g_copy = g.clone();
                    for i in 0..a {
                        for &j in vec2[i] {
                            g_copy.genus[i].add_monomial(1, j as usize);
                        }
                    }
                    for i in a..a + b {
                        let (vi, ji) = two_list[i - a];
                        g_copy.edges[ji].ends[vi].add_monomial(vec2[i][0] as i64, 1);
                        g_copy.edges[ji].ends[vi].add_monomial(vec2[i][1] as i64, 2);
                    }
                    for i in 0..c {
                        let (vi, ji) = one_list[i];
                        g_copy.edges[ji].ends[vi].add_monomial(vec[i + a + b] as i64, 1);
                    }
                    g_deco[new_type].push(g_copy);
                }
            }
            for (mod_type, deco) in g_deco.into_iter().enumerate() {
                g_list_new[mod_type].extend(remove_isomorphic(deco));
            }
        }
    }
    g_list_new
}

impl StrataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordered list of strata of codimension `r`, one per isomorphism
    /// class. The index in this list is the canonical generator number.
    pub fn all_strata(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<Graph>> {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.strata.get(&key) {
            return v.clone();
        }
        let mod_size = moduli_type.bucket_count();
        let mut big_list: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
        for loops in 0..=(g as usize) {
            if loops == 1 && moduli_type <= ModuliType::Ct {
                break;
            }
            if loops > r {
                break;
            }
            for edges in 0..=(r - loops) {
                if edges == 1 && moduli_type <= ModuliType::Sm {
                    break;
                }
                let base = base_graph(g, loops, markings);
                let mut buckets: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
                let bucket = if loops == 0 {
                    if edges == 0 {
                        0
                    } else {
                        1
                    }
                } else {
                    3
                };
                buckets[bucket].push(base);
                for _ in 0..edges {
                    buckets = degenerate(&buckets, moduli_type);
                }
                buckets = decorate(&buckets, r - loops - edges, moduli_type);
                for (i, bucket) in buckets.into_iter().enumerate() {
                    big_list[i].extend(bucket);
                }
            }
        }
        let combined: Vec<Graph> = big_list.into_iter().flatten().collect();
        let arc = Arc::new(combined);
        self.strata.insert(key, arc.clone());
        arc
    }

    /// The undecorated analogue: codimension equals edge count.
    pub fn all_pure_strata(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<Vec<Graph>> {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.pure_strata.get(&key) {
            return v.clone();
        }
        let mod_size = moduli_type.bucket_count();
        let mut big_list: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
        for loops in 0..=(g as usize) {
            if loops == 1 && moduli_type <= ModuliType::Ct {
                break;
            }
            if loops > r {
                break;
            }
            let edges = r - loops;
            if edges >= 1 && moduli_type <= ModuliType::Sm {
                break;
            }
            let mut base = base_graph(g, loops, markings);
            base.compute_invariant();
            let mut buckets: Vec<Vec<Graph>> = vec![Vec::new(); mod_size];
            let bucket = if loops == 0 {
                if edges == 0 {
                    0
                } else {
                    1
                }
            } else {
                3
            };
            buckets[bucket].push(base);
            for _ in 0..edges {
                buckets = degenerate(&buckets, moduli_type);
            }
            for (i, bucket) in buckets.into_iter().enumerate() {
                big_list[i].extend(bucket);
            }
        }
        let combined: Vec<Graph> = big_list.into_iter().flatten().collect();
        let arc = Arc::new(combined);
        self.pure_strata.insert(key, arc.clone());
        arc
    }

    pub fn num_strata(&self, g: i64, r: usize, markings: &[u32], moduli_type: ModuliType) -> usize {
        self.all_strata(g, r, markings, moduli_type).len()
    }

    pub fn num_pure_strata(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> usize {
        self.all_pure_strata(g, r, markings, moduli_type).len()
    }

    pub fn single_stratum(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Graph {
        self.all_strata(g, r, markings, moduli_type)[num].clone()
    }

    pub fn single_pure_stratum(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Graph {
        self.all_pure_strata(g, r, markings, moduli_type)[num].clone()
    }

    fn strata_invariant_lookup(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<FxHashMap<GraphInvariant, Vec<usize>>> {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.strata_lookup.get(&key) {
            return v.clone();
        }
        let l = self.all_strata(g, r, markings, moduli_type);
        let mut inv_dict: FxHashMap<GraphInvariant, Vec<usize>> = FxHashMap::default();
        for (i, graph) in l.iter().enumerate() {
            inv_dict.entry(graph.invariant().clone()).or_default().push(i);
        }
        let arc = Arc::new(inv_dict);
        self.strata_lookup.insert(key, arc.clone());
        arc
    }

    /// Canonical index of `graph` among the strata of its graded piece.
    /// Panics if no representative is isomorphic to it; that signals a
    /// bookkeeping bug, not bad input.
    pub fn num_of_stratum(
        &self,
        mut graph: Graph,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> usize {
        graph.compute_invariant();
        let l = self.all_strata(g, r, markings, moduli_type);
        let lookup = self.strata_invariant_lookup(g, r, markings, moduli_type);
        let candidates = lookup.get(graph.invariant()).unwrap_or_else(|| {
            panic!("stratum not found with g={g}, r={r}, markings={markings:?}, moduli_type={moduli_type}")
        });
        if candidates.len() == 1 {
            return candidates[0];
        }
        for &i in candidates {
            if graph_isomorphic(&graph, &l[i]) {
                return i;
            }
        }
        panic!("stratum not found with g={g}, r={r}, markings={markings:?}, moduli_type={moduli_type}")
    }

    pub fn autom_count(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> i64 {
        let key = (num, StrataKey::new(g, r, markings, moduli_type));
        if let Some(v) = self.autom_counts.get(&key) {
            return *v;
        }
        let count =
            crate::isomorphism::count_automorphisms(&self.all_strata(g, r, markings, moduli_type)[num]);
        self.autom_counts.insert(key, count);
        count
    }

    pub fn pure_strata_autom_count(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> i64 {
        let key = (num, StrataKey::new(g, r, markings, moduli_type));
        if let Some(v) = self.pure_autom_counts.get(&key) {
            return *v;
        }
        let count = crate::isomorphism::count_automorphisms(
            &self.all_pure_strata(g, r, markings, moduli_type)[num],
        );
        self.pure_autom_counts.insert(key, count);
        count
    }

    /// Coset representatives of the decorated automorphism group inside
    /// the automorphism group of the underlying pure stratum, together
    /// with the order of the decorated group.
    pub fn automorphism_cosets(
        &self,
        num: usize,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<(i64, Vec<Isomorphism>)> {
        let key = (num, StrataKey::new(g, r, markings, moduli_type));
        if let Some(v) = self.aut_cosets.get(&key) {
            return v.clone();
        }
        let graph = &self.all_strata(g, r, markings, moduli_type)[num];
        let mut pure = graph.clone();
        pure.purify();
        pure.compute_invariant();
        let pure_auts = graph_list_isomorphisms(&pure, &pure, false);
        let impure_auts = graph_list_isomorphisms(graph, graph, false);
        let num_impure = impure_auts.len() as i64;
        let v = graph.num_vertices();
        let e = graph.num_edges();
        let mut chosen_auts = Vec::new();
        let mut used = vec![false; pure_auts.len()];
        for i in 0..pure_auts.len() {
            if used[i] {
                continue;
            }
            chosen_auts.push(pure_auts[i].clone());
            for aut in &impure_auts {
                let sigma: Isomorphism = (
                    (0..v).map(|k| pure_auts[i].0[aut.0[k]]).collect(),
                    (0..e).map(|k| pure_auts[i].1[aut.1[k]]).collect(),
                );
                if let Some(ii) = pure_auts.iter().position(|x| *x == sigma) {
                    used[ii] = true;
                }
            }
        }
        let arc = Arc::new((num_impure, chosen_auts));
        self.aut_cosets.insert(key, arc.clone());
        arc
    }

    /// Map from pure strata to the decorated strata lying over them.
    pub fn unpurify_map(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<UnpurifyMap> {
        let key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.unpurify.get(&key) {
            return v.clone();
        }
        let pure_strata: Vec<Arc<Vec<Graph>>> = (0..=r)
            .map(|r0| self.all_pure_strata(g, r0, markings, moduli_type))
            .collect();
        let impure_strata = self.all_strata(g, r, markings, moduli_type);
        let mut unpurify = UnpurifyMap::default();
        for (i, stratum) in impure_strata.iter().enumerate() {
            let mut pure = stratum.clone();
            pure.purify();
            let r0 = pure.num_edges() - markings.len();
            let j = pure_strata[r0]
                .iter()
                .position(|p| *p == pure)
                .expect("failed purification");
            unpurify.entry((r0, j)).or_default().push(i);
        }
        let arc = Arc::new(unpurify);
        self.unpurify.insert(key, arc.clone());
        arc
    }

    /// For every pure stratum at every intermediate codimension, all ways
    /// of contracting edge subsets, assembled into the gluing catalogue
    /// keyed by ordered pairs of contracted pure strata.
    pub fn contraction_table(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Arc<ContractionTable> {
        let cache_key = StrataKey::new(g, r, markings, moduli_type);
        if let Some(v) = self.contraction.get(&cache_key) {
            return v.clone();
        }
        let pure_strata: Vec<Arc<Vec<Graph>>> = (0..=r)
            .map(|r0| self.all_pure_strata(g, r0, markings, moduli_type))
            .collect();
        let mut table = ContractionTable::default();
        for r0 in 0..=r {
            for ii in 0..pure_strata[r0].len() {
                let graph = &pure_strata[r0][ii];
                let s: Vec<usize> = (0..graph.num_edges())
                    .filter(|&j| graph.edges[j].marking == 0)
                    .collect();
                // every subset of the non-marking edges, by which ones survive
                let mut contractions: FxHashMap<Vec<usize>, Contraction> = FxHashMap::default();
                for subset in 0..(1u32 << r0) {
                    let key: Vec<usize> = (0..r0).filter(|i| subset & (1 << i) == 0).collect();
                    let mut contracted: Vec<usize> = key.iter().map(|&i| s[i]).collect();
                    contracted.reverse();
                    let mut vlist: Vec<Vec<usize>> =
                        (0..graph.num_vertices()).map(|i| vec![i]).collect();
                    let mut elist: Vec<usize> = (0..graph.num_edges()).collect();
                    let mut g_copy = graph.clone();
                    for e in contracted.iter().copied() {
                        g_copy
                            .contract(e, &mut vlist, &mut elist)
                            .expect("non-marking edge");
                    }
                    g_copy.compute_invariant();
                    let rnew = r0 - key.len();
                    let mut result = None;
                    for i in 0..pure_strata[rnew].len() {
                        let l =
                            graph_list_isomorphisms(&pure_strata[rnew][i], &g_copy, true);
                        if let Some(isom) = l.into_iter().next() {
                            result = Some(((rnew, i), isom));
                            break;
                        }
                    }
                    let ((rk, ri), isom) = result.expect("contraction not found");
                    contractions.insert(
                        key,
                        Contraction {
                            key: (rk, ri),
                            isom,
                            vlist,
                            elist,
                        },
                    );
                }

                // partition the edges: contract-for-1 / shared / contract-for-2
                for assignment in ternary_vectors(r0) {
                    if assignment.iter().filter(|&&x| x == 1).count() > r - r0 {
                        continue;
                    }
                    let key1: Vec<usize> =
                        (0..r0).filter(|&i| assignment[i] == 0).collect();
                    let b: Vec<usize> = (0..r0)
                        .filter(|&i| assignment[i] == 1)
                        .map(|i| s[i])
                        .collect();
                    let key2: Vec<usize> =
                        (0..r0).filter(|&i| assignment[i] == 2).collect();
                    if key1 > key2 {
                        continue;
                    }
                    let c1 = &contractions[&key1];
                    let c2 = &contractions[&key2];
                    let (first, second) = if c1.key > c2.key { (c2, c1) } else { (c1, c2) };
                    let gluing = Gluing {
                        source: (r0, ii),
                        shared: b.clone(),
                        vmap1: first.vlist.clone(),
                        emap1: first.elist.clone(),
                        vmap2: second.vlist.clone(),
                        emap2: second.elist.clone(),
                        isom1: first.isom.clone(),
                        isom2: second.isom.clone(),
                    };
                    let entry = table.entry((first.key, second.key)).or_default();
                    entry.push(gluing.clone());
                    if first.key == second.key {
                        entry.push(Gluing {
                            vmap1: gluing.vmap2.clone(),
                            emap1: gluing.emap2.clone(),
                            vmap2: gluing.vmap1.clone(),
                            emap2: gluing.emap1.clone(),
                            isom1: gluing.isom2.clone(),
                            isom2: gluing.isom1.clone(),
                            ..gluing
                        });
                    }
                }
            }
        }
        let arc = Arc::new(table);
        self.contraction.insert(cache_key, arc.clone());
        arc
    }
}

struct Contraction {
    key: PureKey,
    isom: Isomorphism,
    vlist: Vec<Vec<usize>>,
    elist: Vec<usize>,
}

/// One-vertex graph of genus `g - loops` with the given self-loops and
/// one leg per marking.
fn base_graph(g: i64, loops: usize, markings: &[u32]) -> Graph {
    let mut graph = Graph::new();
    graph.add_vertex(g - loops as i64);
    for _ in 0..loops {
        graph.add_edge(Some(0), Some(0), 0);
    }
    for &k in markings {
        graph.add_edge(Some(0), None, k);
    }
    graph
}

/// All vectors in `{0,1,2}^len`, counting up with the first digit most
/// significant.
fn ternary_vectors(len: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::with_capacity(3usize.pow(len as u32));
    let mut v = vec![0u8; len];
    loop {
        out.push(v.clone());
        let mut i = len;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if v[i] < 2 {
                v[i] += 1;
                break;
            }
            v[i] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moduli::{Ct, Rt, Sm, St};

    #[test]
    fn test_num_strata_table() {
        let cache = StrataCache::new();
        let marks = [1, 1];
        let expected = [
            [1, 1, 1, 1],
            [2, 3, 5, 6],
            [0, 7, 16, 28],
            [0, 0, 38, 113],
        ];
        for (r, row) in expected.iter().enumerate() {
            assert_eq!(cache.num_strata(2, r, &marks, Sm), row[0], "r={r} sm");
            assert_eq!(cache.num_strata(2, r, &marks, Rt), row[1], "r={r} rt");
            assert_eq!(cache.num_strata(2, r, &marks, Ct), row[2], "r={r} ct");
            assert_eq!(cache.num_strata(2, r, &marks, St), row[3], "r={r} st");
        }
    }

    #[test]
    fn test_num_pure_strata_table() {
        let cache = StrataCache::new();
        let marks = [1, 1];
        let expected = [
            [1, 1, 1, 1],
            [0, 1, 3, 4],
            [0, 0, 3, 10],
            [0, 0, 2, 19],
        ];
        for (r, row) in expected.iter().enumerate() {
            assert_eq!(cache.num_pure_strata(2, r, &marks, Sm), row[0], "r={r} sm");
            assert_eq!(cache.num_pure_strata(2, r, &marks, Rt), row[1], "r={r} rt");
            assert_eq!(cache.num_pure_strata(2, r, &marks, Ct), row[2], "r={r} ct");
            assert_eq!(cache.num_pure_strata(2, r, &marks, St), row[3], "r={r} st");
        }
    }

    #[test]
    fn test_unpurify_map() {
        let cache = StrataCache::new();
        let map = cache.unpurify_map(2, 2, &[], St);
        let mut entries: Vec<(PureKey, Vec<usize>)> =
            map.iter().map(|(k, v)| (*k, v.clone())).collect();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ((0, 0), vec![0, 1]),
                ((1, 0), vec![2, 3]),
                ((1, 1), vec![4, 5]),
                ((2, 0), vec![6]),
                ((2, 1), vec![7]),
            ]
        );
    }

    #[test]
    fn test_round_trip_indices() {
        let cache = StrataCache::new();
        for moduli in [Sm, Rt, Ct, St] {
            for r in 0..3 {
                let n = cache.num_strata(2, r, &[1], moduli);
                for i in 0..n {
                    let graph = cache.single_stratum(i, 2, r, &[1], moduli);
                    assert_eq!(cache.num_of_stratum(graph, 2, r, &[1], moduli), i);
                }
            }
        }
    }

    #[test]
    fn test_strata_pairwise_non_isomorphic() {
        let cache = StrataCache::new();
        let strata = cache.all_strata(2, 2, &[], St);
        for i in 0..strata.len() {
            assert!(graph_isomorphic(&strata[i], &strata[i]));
            for j in 0..i {
                assert!(!graph_isomorphic(&strata[i], &strata[j]), "{i} vs {j}");
            }
        }
    }

    #[test]
    fn test_dedup_idempotent() {
        let cache = StrataCache::new();
        let strata = cache.all_strata(2, 2, &[1, 1], Ct).as_ref().clone();
        let n = strata.len();
        let deduped = remove_isomorphic(strata);
        assert_eq!(deduped.len(), n);
    }
}
