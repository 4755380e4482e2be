//! Decorated stable graphs.
//!
//! A stratum of the tautological ring is a stable graph whose vertices
//! carry a genus and kappa decorations and whose half-edges carry psi
//! decorations. A vertex stores a single polynomial: the constant term is
//! the genus, the `X^k` coefficient counts `kappa_k` insertions. An edge
//! end stores `1 + a*X` for `psi^a` on that half-edge, and a self-loop
//! stores `2 + a*X + b*X^2` for the psi powers on its two sides. A leg is
//! an edge column with a nonzero marking label.

use anyhow::{bail, Result};

use crate::poly::Poly;

/// An edge or leg column of a stratum.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Marking label; zero for internal edges.
    pub marking: u32,
    /// Incidence polynomial per vertex.
    pub ends: Vec<Poly>,
}

/// Per-vertex summary used to prune isomorphism search: the genus/kappa
/// polynomial, the unmarked local columns (loops and free half-edges), the
/// marked legs, and the decorated incidences with every other vertex.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexInvariant {
    pub genus: Poly,
    pub local: Vec<Poly>,
    pub marked: Vec<(u32, Poly)>,
    pub pairs: Vec<Vec<(Poly, Poly)>>,
}

/// Isomorphism-respecting summary of a whole graph, usable as a map key.
pub type GraphInvariant = Vec<VertexInvariant>;

#[derive(Clone, Debug, Default)]
pub struct Graph {
    /// Genus-and-kappa polynomial per vertex.
    pub genus: Vec<Poly>,
    pub edges: Vec<Edge>,
    invariant: Option<(GraphInvariant, Vec<Vec<usize>>)>,
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.genus == other.genus && self.edges == other.edges
    }
}

impl Eq for Graph {}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_genus_list(genus_list: &[i64]) -> Self {
        Self {
            genus: genus_list.iter().map(|&g| Poly::constant(g)).collect(),
            edges: Vec::new(),
            invariant: None,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.genus.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// First Betti number of the underlying graph.
    pub fn h1(&self) -> i64 {
        self.edges.len() as i64 - self.genus.len() as i64 + 1
    }

    /// Number of half-edges and legs at each vertex.
    pub fn degree_vec(&self) -> Vec<i64> {
        let mut res = vec![0; self.num_vertices()];
        for e in &self.edges {
            for (i, end) in e.ends.iter().enumerate() {
                res[i] += end.coeff(0);
            }
        }
        res
    }

    pub fn degree(&self, i: usize) -> i64 {
        self.edges.iter().map(|e| e.ends[i].coeff(0)).sum()
    }

    /// Per-vertex parity bitmask of genus plus decoration degrees, used by
    /// the 3-spin relation machinery.
    pub fn target_parity(&self) -> u64 {
        let mut ans = 0u64;
        for i in 0..self.num_vertices() {
            let mut local_parity = 1 + self.genus[i].coeff(0);
            for e in &self.edges {
                local_parity += e.ends[i].coeff(1) + e.ends[i].coeff(2);
            }
            for j in 1..=self.genus[i].degree() {
                local_parity += j as i64 * self.genus[i].coeff(j);
            }
            ans += ((local_parity.rem_euclid(2)) as u64) << i;
        }
        ans
    }

    pub fn add_vertex(&mut self, g: i64) {
        self.genus.push(Poly::constant(g));
        for e in &mut self.edges {
            e.ends.push(Poly::zero());
        }
        self.invariant = None;
    }

    /// Append an edge column. `None` endpoints leave the column dangling
    /// (used transiently while assembling graphs); the same vertex twice
    /// makes a loop.
    pub fn add_edge(&mut self, i1: Option<usize>, i2: Option<usize>, marking: u32) {
        let mut ends = vec![Poly::zero(); self.num_vertices()];
        if let Some(i) = i1 {
            ends[i].add_monomial(1, 0);
        }
        if let Some(i) = i2 {
            ends[i].add_monomial(1, 0);
        }
        self.edges.push(Edge { marking, ends });
        self.invariant = None;
    }

    pub fn del_vertex(&mut self, i: usize) {
        self.genus.remove(i);
        for e in &mut self.edges {
            e.ends.remove(i);
        }
        self.invariant = None;
    }

    pub fn del_edge(&mut self, j: usize) {
        self.edges.remove(j);
        self.invariant = None;
    }

    /// Replace vertex `i` by two vertices with incidence rows `row1` and
    /// `row2` joined by a new edge. Each row is the genus polynomial
    /// followed by one entry per existing edge column.
    pub fn split_vertex(&mut self, i: usize, row1: &[Poly], row2: &[Poly]) {
        assert_eq!(row1.len(), self.num_edges() + 1);
        self.genus.push(row1[0].clone());
        self.genus.push(row2[0].clone());
        for (k, e) in self.edges.iter_mut().enumerate() {
            e.ends.push(row1[k + 1].clone());
            e.ends.push(row2[k + 1].clone());
        }
        let nv = self.num_vertices();
        self.add_edge(Some(nv - 2), Some(nv - 1), 0);
        self.del_vertex(i);
    }

    /// Substitute the graph `g` for vertex `i`, reattaching `g`'s legs to
    /// the edges at `i` by matching marking labels. `g` must have one leg
    /// per half-edge at `i` and no decorations near `i` on either side.
    pub fn replace_vertex_with_graph(&mut self, i: usize, g: &Graph) {
        let nv = self.num_vertices();
        let ne = self.num_edges();
        // Slot assignment for g's legs: marking-1 legs are mutually
        // interchangeable and get consecutive slots in column order.
        let mut unsym_cols = vec![0u32; g.num_edges()];
        let mut mark_nr: i64 = -1;
        for (k, e) in g.edges.iter().enumerate() {
            if e.marking > 0 {
                if e.marking == 1 {
                    mark_nr += 1;
                }
                unsym_cols[k] = (e.marking as i64 + mark_nr) as u32;
            }
        }
        let mut hedge_list_ones = Vec::new();
        let mut hedge_list_others = Vec::new();
        for (k, e) in self.edges.iter().enumerate() {
            for _ in 0..e.ends[i].coeff(0) {
                if e.marking == 1 {
                    hedge_list_ones.push(k);
                } else {
                    hedge_list_others.push(k);
                }
            }
        }
        let mut hedge_list = hedge_list_ones;
        hedge_list.append(&mut hedge_list_others);
        self.del_vertex(i);
        for _ in 0..g.num_edges() - hedge_list.len() {
            self.add_edge(None, None, 0);
        }
        for j in 0..g.num_vertices() {
            self.add_vertex(0);
            let idx = self.num_vertices() - 1;
            self.genus[idx] = g.genus[j].clone();
        }
        let base = nv - 1;
        let mut col = ne;
        for (k, e) in g.edges.iter().enumerate() {
            if e.marking > 0 {
                let slot = hedge_list[unsym_cols[k] as usize - 1];
                for j in 0..g.num_vertices() {
                    if self.edges[slot].ends[base + j].is_zero() {
                        self.edges[slot].ends[base + j] = e.ends[j].clone();
                    } else if !e.ends[j].is_zero() {
                        let a = self.edges[slot].ends[base + j].coeff(1);
                        let b = e.ends[j].coeff(1);
                        let mut merged = Poly::constant(2);
                        merged.add_monomial(a.max(b), 1);
                        merged.add_monomial(a.min(b), 2);
                        self.edges[slot].ends[base + j] = merged;
                    }
                }
            } else {
                for j in 0..g.num_vertices() {
                    self.edges[col].ends[base + j] = e.ends[j].clone();
                }
                col += 1;
            }
        }
        self.invariant = None;
    }

    /// Strip all kappa and psi decorations, leaving the topological type.
    pub fn purify(&mut self) {
        for p in &mut self.genus {
            *p = Poly::constant(p.coeff(0));
        }
        for e in &mut self.edges {
            for p in &mut e.ends {
                *p = Poly::constant(p.coeff(0));
            }
        }
        self.invariant = None;
    }

    /// Contract the undecorated edge `e`, merging its endpoints (or bumping
    /// the genus for a loop), and update the vertex/edge tracking lists.
    /// Contracting a leg is an error.
    pub fn contract(
        &mut self,
        e: usize,
        vlist: &mut Vec<Vec<usize>>,
        elist: &mut Vec<usize>,
    ) -> Result<()> {
        if self.edges[e].marking != 0 {
            bail!("cannot contract a marking");
        }
        let s: Vec<usize> = (0..self.num_vertices())
            .filter(|&v| !self.edges[e].ends[v].is_zero())
            .collect();
        if s.len() == 1 {
            self.genus[s[0]].add_monomial(1, 0);
            self.del_edge(e);
            elist.remove(e);
        } else {
            self.del_edge(e);
            elist.remove(e);
            let merged_genus = self.genus[s[0]].clone() + &self.genus[s[1]];
            let merged_ends: Vec<Poly> = self
                .edges
                .iter()
                .map(|edge| edge.ends[s[0]].clone() + &edge.ends[s[1]])
                .collect();
            self.genus.push(merged_genus);
            for (edge, end) in self.edges.iter_mut().zip(merged_ends) {
                edge.ends.push(end);
            }
            self.del_vertex(s[1]);
            self.del_vertex(s[0]);
            let v1 = vlist.remove(s[1]);
            let mut v0 = vlist.remove(s[0]);
            v0.extend(v1);
            vlist.push(v0);
        }
        self.invariant = None;
        Ok(())
    }

    /// Build the per-vertex invariants and the grouping of vertices into
    /// classes with equal invariant (candidate orbits for the permutation
    /// search).
    pub fn compute_invariant(&mut self) {
        let nv = self.num_vertices();
        let mut inv: Vec<VertexInvariant> = (0..nv)
            .map(|i| VertexInvariant {
                genus: self.genus[i].clone(),
                local: Vec::new(),
                marked: Vec::new(),
                pairs: vec![Vec::new(); nv],
            })
            .collect();
        for e in &self.edges {
            let l: Vec<usize> = (0..nv).filter(|&v| !e.ends[v].is_zero()).collect();
            if l.len() == 1 {
                if e.marking != 0 {
                    inv[l[0]].marked.push((e.marking, e.ends[l[0]].clone()));
                } else {
                    inv[l[0]].local.push(e.ends[l[0]].clone());
                }
            } else {
                inv[l[0]].pairs[l[1]].push((e.ends[l[0]].clone(), e.ends[l[1]].clone()));
                inv[l[1]].pairs[l[0]].push((e.ends[l[1]].clone(), e.ends[l[0]].clone()));
            }
        }
        for v in &mut inv {
            v.pairs.retain(|term| !term.is_empty());
            for term in &mut v.pairs {
                term.sort();
            }
            v.pairs.sort();
            v.marked.sort();
            v.local.sort();
        }
        let mut vertex_invariants: Vec<(usize, VertexInvariant)> =
            inv.iter().cloned().enumerate().collect();
        let mut invariant = inv;
        invariant.sort();
        vertex_invariants.sort_by(|a, b| a.1.cmp(&b.1));
        let mut groupings: Vec<Vec<usize>> = Vec::new();
        for i in 0..nv {
            if i == 0 || vertex_invariants[i].1 != vertex_invariants[i - 1].1 {
                groupings.push(Vec::new());
            }
            groupings.last_mut().unwrap().push(vertex_invariants[i].0);
        }
        self.invariant = Some((invariant, groupings));
    }

    /// The graph invariant; `compute_invariant` must have been called.
    pub fn invariant(&self) -> &GraphInvariant {
        &self.invariant.as_ref().expect("invariant not computed").0
    }

    pub fn vertex_groupings(&self) -> &[Vec<usize>] {
        &self.invariant.as_ref().expect("invariant not computed").1
    }

    pub fn has_invariant(&self) -> bool {
        self.invariant.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One vertex of genus 1 with a loop and two legs marked 1, 2.
    fn base_graph() -> Graph {
        let mut g = Graph::from_genus_list(&[1]);
        g.add_edge(Some(0), Some(0), 0);
        g.add_edge(Some(0), None, 1);
        g.add_edge(Some(0), None, 2);
        g
    }

    #[test]
    fn test_counts() {
        let g = base_graph();
        assert_eq!(g.num_vertices(), 1);
        assert_eq!(g.num_edges(), 3);
        assert_eq!(g.h1(), 3);
        assert_eq!(g.degree_vec(), vec![4]);
    }

    #[test]
    fn test_split_and_contract() {
        let mut g = Graph::from_genus_list(&[2]);
        g.add_edge(Some(0), None, 1);
        // split into genus 1 with the leg + genus 1 bare
        let row1 = vec![Poly::constant(1), Poly::constant(1)];
        let row2 = vec![Poly::constant(1), Poly::zero()];
        g.split_vertex(0, &row1, &row2);
        assert_eq!(g.num_vertices(), 2);
        assert_eq!(g.num_edges(), 2);
        assert_eq!(g.h1(), 1);

        let mut vlist: Vec<Vec<usize>> = vec![vec![0], vec![1]];
        let mut elist: Vec<usize> = vec![0, 1];
        // contracting the leg is refused
        assert!(g.contract(0, &mut vlist, &mut elist).is_err());
        g.contract(1, &mut vlist, &mut elist).unwrap();
        assert_eq!(g.num_vertices(), 1);
        assert_eq!(g.genus[0], Poly::constant(2));
        assert_eq!(vlist, vec![vec![0, 1]]);
        assert_eq!(elist, vec![0]);
    }

    #[test]
    fn test_contract_loop() {
        let mut g = Graph::from_genus_list(&[1]);
        g.add_edge(Some(0), Some(0), 0);
        let mut vlist = vec![vec![0]];
        let mut elist = vec![0];
        g.contract(0, &mut vlist, &mut elist).unwrap();
        assert_eq!(g.genus[0], Poly::constant(2));
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    fn test_invariant_groups_equal_vertices() {
        let mut g = Graph::from_genus_list(&[1, 1]);
        g.add_edge(Some(0), Some(1), 0);
        g.compute_invariant();
        assert_eq!(g.vertex_groupings().len(), 1);
        assert_eq!(g.vertex_groupings()[0].len(), 2);

        let mut g = Graph::from_genus_list(&[1, 2]);
        g.add_edge(Some(0), Some(1), 0);
        g.compute_invariant();
        assert_eq!(g.vertex_groupings().len(), 2);
    }
}
