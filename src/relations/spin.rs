//! Pixton's 3-spin relations.
//!
//! Each relation is indexed by a parameter: a partition `sigma` with no
//! part congruent to 2 mod 3, plus a partition of psi exponents for each
//! marking label. The coefficient of a generator is assembled from three
//! parity-graded factors (markings, kappas, half-edges) built out of the
//! hypergeometric series `A` and `B`.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use arith::{aut, binomial, factorial, integer_vectors, multiset_permutations, partitions, rat};
use itertools::Itertools;

use crate::algebra::{choice_products, get_marks};
use crate::graph::Graph;
use crate::isomorphism::graph_isomorphic;
use crate::moduli::{dim_form, ModuliType};
use crate::poly::Poly;
use crate::strata::{FzParam, SparseRel, StrataCache, StrataKey};

fn a_value(n: i64) -> BigRational {
    BigRational::from(
        factorial(6 * n as u64) / (factorial(3 * n as u64) * factorial(2 * n as u64)),
    )
}

fn b_value(n: i64) -> BigRational {
    a_value(n) * BigRational::new(BigInt::from(6 * n + 1), BigInt::from(6 * n - 1))
}

/// Coefficient of `psi^term` in the series attached to a part `m` of
/// `sigma`; `m` is taken mod 3 to pick the `A` or `B` branch.
pub fn c_coeff(m: i64, term: i64) -> BigRational {
    let n = term - m.div_euclid(3);
    if n < 0 {
        return BigRational::zero();
    }
    if m.rem_euclid(3) == 0 {
        a_value(n)
    } else {
        b_value(n)
    }
}

/// The edge factor: pairing of the two half-edge series with psi
/// exponents `i` and `j` and the given parity.
pub fn dual_c_coeff(i: i64, j: i64, parity: i64) -> BigRational {
    let mut total = BigRational::zero();
    let mut k = parity.rem_euclid(2);
    while k / 3 <= i {
        if k % 3 != 2 {
            let term = c_coeff(k, i) * c_coeff(-2 - k, j);
            if (k / 3) % 2 == 0 {
                total += term;
            } else {
                total -= term;
            }
        }
        k += 2;
    }
    total
}

/// Kappa decoration of a vertex as an ascending list of indices.
fn poly_to_partition(f: &Poly) -> Vec<usize> {
    let mut target = Vec::new();
    for i in 1..=f.degree() {
        for _ in 0..f.coeff(i) {
            target.push(i);
        }
    }
    target
}

/// Vertex factor for assigning the parts `sigma` (ascending, ones first)
/// to a vertex with kappa-0 value `kappa_0` and kappa decoration
/// `target_partition`.
fn kappa_coeff(sigma: &[u32], kappa_0: i64, target_partition: &[usize]) -> BigRational {
    let s = sigma.len();
    let t = target_partition.len();
    let num_ones = sigma.iter().filter(|&&x| x == 1).count();
    let mut total = BigRational::zero();
    for i in 0..=num_ones {
        for injection in (0..t).permutations(s - i) {
            let mut term = BigRational::from(
                binomial(num_ones as i64, i as i64)
                    * binomial(kappa_0 + t as i64 + i as i64 - 1, i as i64)
                    * factorial(i as u64),
            );
            for j in 0..(s - i) {
                term *= c_coeff(sigma[j + i] as i64, target_partition[injection[j]] as i64);
            }
            for j in 0..t {
                if !injection.contains(&j) {
                    term *= c_coeff(0, target_partition[j] as i64);
                }
            }
            total += term;
        }
    }
    if (t + s) % 2 == 1 {
        total = -total;
    }
    total / rat(aut(target_partition.to_vec()))
}

/// Distinct marking labels with multiplicities, ascending.
fn marking_groups(markings: &[u32]) -> Vec<(u32, usize)> {
    let mut groups: Vec<(u32, usize)> = Vec::new();
    let mut sorted = markings.to_vec();
    sorted.sort_unstable();
    for m in sorted {
        match groups.last_mut() {
            Some(last) if last.0 == m => last.1 += 1,
            _ => groups.push((m, 1)),
        }
    }
    groups
}

/// All 3-spin parameters of total weight `n` for the given markings.
pub fn fz_param_list(n: i64, markings: &[u32]) -> Vec<FzParam> {
    if n < 0 {
        return Vec::new();
    }
    let groups = marking_groups(markings);
    let mut final_list = Vec::new();
    for j in 0..=(n / 2) {
        for n_vec in integer_vectors((n - 2 * j) as u32, 1 + groups.len()) {
            let mut s_list: Vec<Vec<Vec<u32>>> = vec![partitions(n_vec[0])
                .into_iter()
                .filter(|sigma| sigma.iter().all(|&l| l % 3 != 2))
                .collect()];
            for (i, &(_, count)) in groups.iter().enumerate() {
                s_list.push(
                    partitions(n_vec[i + 1] + count as u32)
                        .into_iter()
                        .filter(|sigma| {
                            sigma.len() == count && sigma.iter().all(|&l| l % 3 != 0)
                        })
                        .map(|sigma| sigma.iter().map(|&k| k - 1).collect())
                        .collect(),
                );
            }
            for s in choice_products(&s_list) {
                final_list.push((s[0].clone(), s[1..].to_vec()));
            }
        }
    }
    final_list
}

/// Marking factor per vertex-parity mask: sum over distinct assignments
/// of each label's psi-exponent partition to its marked legs.
fn fz_marking_factor(
    graph: &Graph,
    markings: &[u32],
    marking_partitions: &[Vec<u32>],
) -> Vec<BigRational> {
    let nv = graph.num_vertices();
    let groups = marking_groups(markings);
    let perm_lists: Vec<Vec<Vec<u32>>> = marking_partitions
        .iter()
        .map(|p| multiset_permutations(p))
        .collect();
    let mut incident_vertices: Vec<Vec<(usize, i64)>> = Vec::new();
    for &(label, _) in &groups {
        let mut inc = Vec::new();
        for e in &graph.edges {
            if e.marking == label {
                for i in 0..nv {
                    if !e.ends[i].is_zero() {
                        inc.push((i, e.ends[i].coeff(1)));
                        break;
                    }
                }
            }
        }
        incident_vertices.push(inc);
    }
    let mut marking_factors = vec![BigRational::zero(); 1 << nv];
    for perms in choice_products(&perm_lists) {
        let mut parity = 0usize;
        let mut marking_factor = BigRational::one();
        for (mi, perm) in perms.iter().enumerate() {
            for (count, &(v, exp)) in incident_vertices[mi].iter().enumerate() {
                marking_factor *= c_coeff(perm[count] as i64, exp);
                parity ^= ((perm[count] as usize) % 2) << v;
            }
        }
        marking_factors[parity] += marking_factor;
    }
    marking_factors
}

/// Kappa factor per vertex-parity mask: sum over distributions of the
/// parts of `sigma` among the vertices.
fn fz_kappa_factor(graph: &Graph, sigma: &[u32]) -> Vec<BigRational> {
    let nv = graph.num_vertices();
    let vertex_data: Vec<(i64, Vec<usize>)> = (0..nv)
        .map(|i| {
            (
                2 * graph.genus[i].coeff(0) + graph.degree(i) - 2,
                poly_to_partition(&graph.genus[i]),
            )
        })
        .collect();
    let mmm = sigma.iter().copied().max().unwrap_or(0);
    let mut sigma_grouped = vec![0u32; mmm as usize];
    for &i in sigma {
        sigma_grouped[i as usize - 1] += 1;
    }
    let s_list: Vec<Vec<Vec<u32>>> = sigma_grouped
        .iter()
        .map(|&count| integer_vectors(count, nv))
        .collect();
    let mut kappa_factors = vec![BigRational::zero(); 1 << nv];
    for assignment in choice_products(&s_list) {
        let mut assigned_sigma: Vec<Vec<u32>> = vec![Vec::new(); nv];
        for (i, row) in assignment.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                for _ in 0..count {
                    assigned_sigma[j].push(i as u32 + 1);
                }
            }
        }
        let mut parity = 0usize;
        let mut kappa_factor = BigRational::one();
        for (j, assigned) in assigned_sigma.iter().enumerate() {
            let total: u32 = assigned.iter().sum();
            parity ^= ((total as usize) % 2) << j;
            kappa_factor *= kappa_coeff(assigned, vertex_data[j].0, &vertex_data[j].1)
                / rat(aut(assigned.clone()));
        }
        kappa_factors[parity] += kappa_factor;
    }
    kappa_factors
}

/// Half-edge factor per vertex-parity mask: product of `dual_c_coeff`
/// over the internal edges, summed over edge parities.
fn fz_hedge_factor(graph: &Graph) -> Vec<BigRational> {
    let nv = graph.num_vertices();
    let mut edge_list: Vec<(usize, usize, usize)> = Vec::new();
    for (k, e) in graph.edges.iter().enumerate() {
        if e.marking != 0 {
            continue;
        }
        let mut ends = Vec::new();
        for i in 0..nv {
            if !e.ends[i].is_zero() {
                ends.push(i);
                if e.ends[i].coeff(0) == 2 {
                    ends.push(i);
                }
            }
        }
        edge_list.push((k, ends[0], ends[1]));
    }
    let parity_choices: Vec<Vec<u8>> = edge_list.iter().map(|_| vec![0u8, 1u8]).collect();
    let mut hedge_factors = vec![BigRational::zero(); 1 << nv];
    for edge_parities in choice_products(&parity_choices) {
        let mut parity = 0usize;
        for (i, &(_, v1, v2)) in edge_list.iter().enumerate() {
            if edge_parities[i] == 1 {
                parity ^= 1 << v1;
                parity ^= 1 << v2;
            }
        }
        let mut hedge_factor = BigRational::one();
        for (i, &(k, v1, v2)) in edge_list.iter().enumerate() {
            let e = &graph.edges[k];
            let (a, b) = if v1 == v2 {
                (e.ends[v1].coeff(1), e.ends[v1].coeff(2))
            } else {
                (e.ends[v1].coeff(1), e.ends[v2].coeff(1))
            };
            hedge_factor *= dual_c_coeff(a, b, edge_parities[i] as i64);
        }
        hedge_factors[parity] += hedge_factor;
    }
    hedge_factors
}

impl StrataCache {
    /// Coefficient of generator `num` in the 3-spin relation for `param`.
    pub fn fz_coeff(
        &self,
        num: usize,
        param: &FzParam,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> BigRational {
        self.fz_row(param, g, r, markings, moduli_type)[num].clone()
    }

    /// The full relation row for `param` over all generators.
    pub(crate) fn fz_row(
        &self,
        param: &FzParam,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> std::sync::Arc<Vec<BigRational>> {
        let key = (param.clone(), StrataKey::new(g, r, markings, moduli_type));
        if let Some(v) = self.fz_rows.get(&key) {
            return v.clone();
        }
        let gens = self.all_strata(g, r, markings, moduli_type);
        let mut row = Vec::with_capacity(gens.len());
        for (num, graph) in gens.iter().enumerate() {
            let nv = graph.num_vertices();
            let auts = self.autom_count(num, g, r, markings, moduli_type);
            let h1_factor = BigInt::from(2).pow(graph.h1() as u32);
            let marking_factors = fz_marking_factor(graph, markings, &param.1);
            let kappa_factors = fz_kappa_factor(graph, &param.0);
            let hedge_factors = fz_hedge_factor(graph);
            let tp = graph.target_parity() as usize;
            let mut total = BigRational::zero();
            for i in 0..(1usize << nv) {
                if marking_factors[i].is_zero() {
                    continue;
                }
                for j in 0..(1usize << nv) {
                    total += &marking_factors[i] * &kappa_factors[j] * &hedge_factors[i ^ j ^ tp];
                }
            }
            row.push(total / BigRational::from(h1_factor * BigInt::from(auts)));
        }
        let arc = std::sync::Arc::new(row);
        self.fz_rows.insert(key, arc.clone());
        arc
    }

    /// Relations supported on the interior (no boundary insertions).
    pub fn interior_fz(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        fz_param_list(3 * r as i64 - g - 1, markings)
            .iter()
            .map(|param| self.fz_row(param, g, r, markings, moduli_type).to_vec())
            .collect()
    }

    /// Relations obtained by inserting lower-codimension 3-spin relations
    /// at an undecorated vertex of a boundary stratum.
    pub fn boundary_fz(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        if moduli_type <= ModuliType::Sm {
            return Vec::new();
        }
        let ngen = self.num_strata(g, r, markings, moduli_type);
        let mut relations = Vec::new();
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
                    let sub_markings = get_marks(d, 0);
                    let strata2 = self.all_strata(g2, r - r0, &sub_markings, moduli_type);
                    let which_gen: Vec<usize> = strata2
                        .iter()
                        .map(|s| {
                            let mut g_copy = graph.clone();
                            g_copy.replace_vertex_with_graph(i, s);
                            self.num_of_stratum(g_copy, g, r, markings, moduli_type)
                        })
                        .collect();
                    let params = self.reduced_fz_param_list(
                        graph,
                        i,
                        g2,
                        d,
                        3 * (r - r0) as i64 - g2 - 1,
                    );
                    for param in &params {
                        let row =
                            self.fz_row(param, g2, r - r0, &sub_markings, moduli_type);
                        let mut relation = vec![BigRational::zero(); ngen];
                        for (num, coeff) in row.iter().enumerate() {
                            relation[which_gen[num]] += coeff;
                        }
                        relations.push(relation);
                    }
                }
            }
        }
        relations
    }

    /// Parameters for vertex insertion, pruned so that parameters giving
    /// isomorphic decorated graphs appear once.
    fn reduced_fz_param_list(
        &self,
        graph: &Graph,
        v: usize,
        g2: i64,
        d: usize,
        n: i64,
    ) -> Vec<FzParam> {
        let params = fz_param_list(n, &get_marks(d, 0));
        let mut params_reduced = Vec::new();
        let mut graphs_seen: Vec<Graph> = Vec::new();
        for p in params {
            // fake vertex encoding the parameter, for isomorphism testing
            let mut g_p = Graph::from_genus_list(&[-g2 - 1]);
            for &j in &p.0 {
                g_p.genus[0].add_monomial(1, j as usize);
            }
            for i in 1..=d {
                g_p.add_edge(Some(0), None, i as u32);
                let k = g_p.num_edges() - 1;
                g_p.edges[k].ends[0].add_monomial(p.1[i - 1][0] as i64, 1);
            }
            let mut g_copy = graph.clone();
            g_copy.replace_vertex_with_graph(v, &g_p);
            g_copy.compute_invariant();
            if graphs_seen.iter().any(|gg| graph_isomorphic(&g_copy, gg)) {
                continue;
            }
            graphs_seen.push(g_copy);
            params_reduced.push(p);
        }
        params_reduced
    }

    /// The sparse relations whose parameters are not products of smaller
    /// ones: `sigma` with all parts 1 mod 3 and all markings equal.
    pub fn possibly_new_fz(
        &self,
        g: i64,
        r: usize,
        n: usize,
        moduli_type: ModuliType,
    ) -> Vec<SparseRel> {
        let m = 3 * r as i64 - g - 1 - n as i64;
        if m < 0 {
            return Vec::new();
        }
        let markings = vec![1u32; n];
        let mut relations = Vec::new();
        for i in 0..=m {
            if (m - i) % 2 == 1 {
                continue;
            }
            for sigma in partitions(i as u32) {
                if sigma.iter().any(|&j| j % 3 != 1) {
                    continue;
                }
                let param: FzParam = if n > 0 {
                    (sigma, vec![markings.clone()])
                } else {
                    (sigma, Vec::new())
                };
                let row = self.fz_row(&param, g, r, &markings, moduli_type);
                let relation: SparseRel = row
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_zero())
                    .map(|(j, c)| (j, c.clone()))
                    .collect();
                relations.push(relation);
            }
        }
        relations
    }

    /// Every 3-spin relation in this graded piece, as dense rows. A zero
    /// row stands in when there are none, so the rank computations always
    /// see the generator count.
    pub fn list_all_fz(
        &self,
        g: i64,
        r: usize,
        markings: &[u32],
        moduli_type: ModuliType,
    ) -> Vec<Vec<BigRational>> {
        let mut relations = self.interior_fz(g, r, markings, moduli_type);
        if moduli_type > ModuliType::Sm {
            relations.extend(self.boundary_fz(g, r, markings, moduli_type));
        }
        if relations.is_empty() {
            let ngen = self.num_strata(g, r, markings, moduli_type);
            relations.push(vec![BigRational::zero(); ngen]);
        }
        relations
    }
}

/// Whether vertex `i` carries no kappa or psi decorations.
pub(crate) fn undecorated_vertex(graph: &Graph, i: usize) -> bool {
    graph.genus[i].degree() == 0
        && graph
            .edges
            .iter()
            .all(|e| e.ends[i].coeff(1) == 0 && e.ends[i].coeff(2) == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arith::frac;
    use crate::moduli::{Ct, Rt, Sm, St};

    #[test]
    fn test_series_values() {
        assert_eq!(c_coeff(0, 1), rat(60));
        assert_eq!(c_coeff(1, 1), rat(84));
        assert_eq!(c_coeff(0, 2), rat(27720));
        assert_eq!(c_coeff(1, 2), rat(32760));
        assert_eq!(b_value(0), rat(-1));
    }

    #[test]
    fn test_fz_param_list() {
        assert_eq!(
            fz_param_list(3, &[]),
            vec![
                (vec![3], vec![]),
                (vec![1, 1, 1], vec![]),
                (vec![1], vec![]),
            ]
        );
    }

    #[test]
    fn test_interior_rows_genus_two() {
        let c = StrataCache::new();
        let rows = c.interior_fz(2, 2, &[], St);
        let expect: Vec<Vec<i64>> = vec![
            vec![60, -60, 84, 0, 6, 0, 0, 0],
            vec![473760, -100512, 33984, -10080, 6624, -10080, -288, -72],
            vec![115920, -12240, 13536, -5040, 1584, -5040, -144, -36],
        ];
        let expect: Vec<Vec<BigRational>> = expect
            .into_iter()
            .map(|r| r.into_iter().map(rat).collect())
            .collect();
        assert_eq!(rows, expect);
    }

    #[test]
    fn test_boundary_rows_genus_two() {
        let c = StrataCache::new();
        let rows = c.boundary_fz(2, 2, &[], St);
        let expect: Vec<Vec<BigRational>> = vec![
            vec![0, 0, 102, -30, 0, 0, -3, 0]
                .into_iter()
                .map(rat)
                .collect(),
            vec![0, 0, 30, 42, 0, 0, -3, 0].into_iter().map(rat).collect(),
            vec![0, 0, 0, 0, 66, -60, -6, -3].into_iter().map(rat).collect(),
            vec![
                rat(0),
                rat(0),
                rat(0),
                rat(0),
                rat(15),
                rat(6),
                rat(-21),
                frac(-3, 2),
            ],
        ];
        assert_eq!(rows, expect);
    }

    #[test]
    fn test_fz_matrix_compact_type() {
        let c = StrataCache::new();
        let rows = c.list_all_fz(2, 2, &[1], Ct);
        let expect: Vec<Vec<i64>> = vec![
            vec![30, -30, 30, 0, 42, 0, 0, 0],
            vec![441000, -78120, 61200, -138600, 37296, -7920, -42840, 1368],
            vec![204120, -27864, -39312, 98280, 20304, 9072, -37800, -3672],
            vec![0, 0, -30, 30, 0, 42, 0, 0],
            vec![71820, -7020, 9720, -41580, 9288, -3240, -18900, 756],
            vec![13860, -900, -2520, 16380, 2520, 3528, -16380, -1764],
            vec![0, 0, 0, 0, 66, -30, -30, -6],
            vec![0, 0, 0, 0, 15, 21, -15, -21],
            vec![0, 0, 0, 0, 15, -15, 21, -21],
        ];
        let expect: Vec<Vec<BigRational>> = expect
            .into_iter()
            .map(|r| r.into_iter().map(rat).collect())
            .collect();
        assert_eq!(rows, expect);
    }

    #[test]
    fn test_fz_matrix_rational_tails_and_smooth() {
        let c = StrataCache::new();
        let rows = c.list_all_fz(3, 2, &[1, 2], Rt);
        let expect: Vec<Vec<i64>> = vec![
            vec![-251370, 27162, -34020, -34020, 145530, 18900, 145530, 18036, -69930],
            vec![-56700, 4860, 10584, -7560, -49140, -7560, 41580, -8424, 34020],
            vec![-56700, 4860, -7560, 10584, 41580, -7560, -49140, -8424, 34020],
            vec![-6930, 450, 1260, 1260, -8190, 1764, -8190, 900, -6930],
            vec![-6930, 450, -900, -900, 6930, 900, 6930, 900, -6930],
        ];
        let expect: Vec<Vec<BigRational>> = expect
            .into_iter()
            .map(|r| r.into_iter().map(rat).collect())
            .collect();
        assert_eq!(rows, expect);

        let rows = c.list_all_fz(3, 2, &[1, 1], Sm);
        let expect: Vec<Vec<i64>> = vec![
            vec![-125685, 13581, -34020, 145530, 9450],
            vec![-56700, 4860, 3024, -7560, -7560],
            vec![-3465, 225, 1260, -8190, 882],
            vec![-3465, 225, -900, 6930, 450],
        ];
        let expect: Vec<Vec<BigRational>> = expect
            .into_iter()
            .map(|r| r.into_iter().map(rat).collect())
            .collect();
        assert_eq!(rows, expect);
    }
}
