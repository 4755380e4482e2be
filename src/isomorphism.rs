//! Isomorphism and automorphism search on decorated graphs.
//!
//! Both graphs must have their invariants computed. The search enumerates
//! only vertex permutations that respect the invariant partition, then
//! checks that every pairwise incidence-decoration multiset matches. This
//! is worst-case factorial in the group sizes but the invariant partition
//! prunes it hard in practice.

use itertools::Itertools;

use crate::graph::Graph;
use crate::poly::Poly;

/// A graph isomorphism as a vertex map together with an induced edge map.
pub type Isomorphism = (Vec<usize>, Vec<usize>);

fn vertex_maps<'a>(g1: &'a Graph, g2: &'a Graph) -> impl Iterator<Item = Vec<usize>> + 'a {
    let group1 = g1.vertex_groupings();
    let group2 = g2.vertex_groupings();
    let nv = g1.num_vertices();
    group1
        .iter()
        .map(|group| (0..group.len()).permutations(group.len()).collect_vec())
        .multi_cartesian_product()
        .map(move |sigma_data| {
            let mut sigma = vec![0; nv];
            for (i, group) in group1.iter().enumerate() {
                for (j, &v) in group.iter().enumerate() {
                    sigma[v] = group2[i][sigma_data[i][j]];
                }
            }
            sigma
        })
}

/// The sorted multiset of decorated incidences between vertices `i` and `j`.
fn pair_profile(g: &Graph, i: usize, j: usize) -> Vec<(Poly, Poly)> {
    let mut l: Vec<(Poly, Poly)> = g
        .edges
        .iter()
        .filter(|e| !e.ends[i].is_zero() && !e.ends[j].is_zero())
        .map(|e| (e.ends[i].clone(), e.ends[j].clone()))
        .collect();
    l.sort();
    l
}

fn respects_incidences(g1: &Graph, g2: &Graph, sigma: &[usize]) -> bool {
    let nv = g1.num_vertices();
    for i in 0..nv {
        for j in 0..i {
            if pair_profile(g1, i, j) != pair_profile(g2, sigma[i], sigma[j]) {
                return false;
            }
        }
    }
    true
}

/// Whether two graphs with precomputed invariants are isomorphic.
pub fn graph_isomorphic(g1: &Graph, g2: &Graph) -> bool {
    if g1.invariant() != g2.invariant() {
        return false;
    }
    vertex_maps(g1, g2).any(|sigma| respects_incidences(g1, g2, &sigma))
}

/// All isomorphisms from `g1` to `g2`, as vertex maps with the induced
/// edge maps. Edge columns that are indistinguishable (identical marking
/// and incidence data) are permuted in all ways, so parallel edges yield
/// multiple isomorphisms per vertex map. With `only_one` the search stops
/// at the first hit.
pub fn graph_list_isomorphisms(g1: &Graph, g2: &Graph, only_one: bool) -> Vec<Isomorphism> {
    if g1.invariant() != g2.invariant() {
        return Vec::new();
    }
    let nc = g1.num_edges();
    let mut isom_list = Vec::new();
    for sigma in vertex_maps(g1, g2) {
        if !respects_incidences(g1, g2, &sigma) {
            continue;
        }
        // Column signatures: marking plus incidence entries, g2's rows
        // permuted through sigma so equal signatures mean matchable edges.
        let cols1: Vec<(u32, Vec<Poly>)> = g1
            .edges
            .iter()
            .map(|e| (e.marking, e.ends.clone()))
            .collect();
        let cols2: Vec<(u32, Vec<Poly>)> = g2
            .edges
            .iter()
            .map(|e| {
                (
                    e.marking,
                    (0..g1.num_vertices()).map(|i| e.ends[sigma[i]].clone()).collect(),
                )
            })
            .collect();
        let mut edge_group1: Vec<Vec<usize>> = Vec::new();
        let mut edge_group2: Vec<Vec<usize>> = Vec::new();
        let mut used = vec![false; nc];
        for j in 0..nc {
            if used[j] {
                continue;
            }
            let mut grp1 = Vec::new();
            let mut grp2 = Vec::new();
            for k in 0..nc {
                if cols1[k] == cols1[j] {
                    grp1.push(k);
                    used[k] = true;
                }
                if cols2[k] == cols1[j] {
                    grp2.push(k);
                }
            }
            edge_group1.push(grp1);
            edge_group2.push(grp2);
        }
        for edge_sigma_data in edge_group1
            .iter()
            .map(|group| (0..group.len()).permutations(group.len()).collect_vec())
            .multi_cartesian_product()
        {
            let mut edge_sigma = vec![0; nc];
            for (i, group) in edge_group1.iter().enumerate() {
                for (j, &e) in group.iter().enumerate() {
                    edge_sigma[e] = edge_group2[i][edge_sigma_data[i][j]];
                }
            }
            isom_list.push((sigma.clone(), edge_sigma));
            if only_one {
                return isom_list;
            }
        }
    }
    isom_list
}

/// Order of the automorphism group, including the factor 2 per symmetric
/// loop and the multiset automorphisms of indistinguishable parallel
/// edges and legs that the vertex-permutation count misses.
pub fn count_automorphisms(g: &Graph) -> i64 {
    let nv = g.num_vertices();
    let mut count = vertex_maps(g, g)
        .filter(|sigma| respects_incidences(g, g, sigma))
        .count() as i64;
    for i in 0..nv {
        for e in &g.edges {
            if e.ends[i].coeff(0) == 2 && e.ends[i].coeff(1) == e.ends[i].coeff(2) {
                count *= 2;
            }
        }
        let local: Vec<(u32, Poly)> = g
            .edges
            .iter()
            .filter(|e| {
                !e.ends[i].is_zero() && (0..nv).filter(|&v| !e.ends[v].is_zero()).count() == 1
            })
            .map(|e| (e.marking, e.ends[i].clone()))
            .collect();
        count *= arith::aut(local);
        for j in 0..i {
            count *= arith::aut(pair_profile(g, i, j));
        }
    }
    count
}

/// Orbits of the vertices under the automorphism group.
pub fn vertex_orbits(g: &Graph) -> Vec<Vec<usize>> {
    let nv = g.num_vertices();
    let isom_list: Vec<Vec<usize>> = vertex_maps(g, g)
        .filter(|sigma| respects_incidences(g, g, sigma))
        .collect();
    let mut orbit_list = Vec::new();
    let mut used = vec![false; nv];
    while let Some(i) = (0..nv).find(|&v| !used[v]) {
        let mut orbit = Vec::new();
        for sigma in &isom_list {
            if !orbit.contains(&sigma[i]) {
                orbit.push(sigma[i]);
                used[sigma[i]] = true;
            }
        }
        orbit.sort_unstable();
        orbit_list.push(orbit);
    }
    orbit_list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertex_chain(g1: i64, g2: i64) -> Graph {
        let mut g = Graph::from_genus_list(&[g1, g2]);
        g.add_edge(Some(0), Some(1), 0);
        g.compute_invariant();
        g
    }

    #[test]
    fn test_isomorphic_relabeled() {
        let g1 = two_vertex_chain(1, 2);
        let g2 = two_vertex_chain(2, 1);
        assert!(graph_isomorphic(&g1, &g2));
        assert!(graph_isomorphic(&g1, &g1));
        let g3 = two_vertex_chain(1, 3);
        assert!(!graph_isomorphic(&g1, &g3));
    }

    #[test]
    fn test_count_automorphisms() {
        // two genus-1 vertices joined by an edge: swap symmetry only
        let g = two_vertex_chain(1, 1);
        assert_eq!(count_automorphisms(&g), 2);
        assert_eq!(vertex_orbits(&g), vec![vec![0, 1]]);

        // distinct genera: rigid
        let g = two_vertex_chain(1, 2);
        assert_eq!(count_automorphisms(&g), 1);

        // a plain loop: the two half-edges swap
        let mut g = Graph::from_genus_list(&[1]);
        g.add_edge(Some(0), Some(0), 0);
        g.compute_invariant();
        assert_eq!(count_automorphisms(&g), 2);

        // double edge between two genus-1 vertices: 2 (vertices) * 2 (edges)
        let mut g = Graph::from_genus_list(&[1, 1]);
        g.add_edge(Some(0), Some(1), 0);
        g.add_edge(Some(0), Some(1), 0);
        g.compute_invariant();
        assert_eq!(count_automorphisms(&g), 4);
    }

    #[test]
    fn test_list_isomorphisms_parallel_edges() {
        let mut g = Graph::from_genus_list(&[1, 1]);
        g.add_edge(Some(0), Some(1), 0);
        g.add_edge(Some(0), Some(1), 0);
        g.compute_invariant();
        // 2 vertex maps x 2 edge relabelings
        assert_eq!(graph_list_isomorphisms(&g, &g, false).len(), 4);
        assert_eq!(graph_list_isomorphisms(&g, &g, true).len(), 1);
    }
}
