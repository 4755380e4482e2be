//! Partition, integer-vector and set-partition enumeration.
//!
//! Enumeration orders here are load-bearing: the stratum enumerator derives
//! its generator numbering from them, so they must stay fixed.

use std::collections::BTreeMap;

use itertools::Itertools;

/// Order of the automorphism group of a multiset: the product of the
/// factorials of the multiplicities.
pub fn aut<T: Ord>(mut items: Vec<T>) -> i64 {
    items.sort();
    let mut count = 1i64;
    let mut run = 1i64;
    for i in 1..items.len() {
        if items[i] == items[i - 1] {
            run += 1;
            count *= run;
        } else {
            run = 1;
        }
    }
    count
}

/// All partitions of `n`, largest part first, in reverse-lexicographic
/// order: `[n], [n-1, 1], ..., [1, 1, ..., 1]`.
pub fn partitions(n: u32) -> Vec<Vec<u32>> {
    partitions_bounded(n, n)
}

/// Partitions of `n` with every part at most `max_part`.
pub fn partitions_bounded(n: u32, max_part: u32) -> Vec<Vec<u32>> {
    if n == 0 {
        return vec![vec![]];
    }
    let mut out = Vec::new();
    for first in (1..=max_part.min(n)).rev() {
        for rest in partitions_bounded(n - first, first) {
            let mut p = Vec::with_capacity(rest.len() + 1);
            p.push(first);
            p.extend(rest);
            out.push(p);
        }
    }
    out
}

/// All length-`len` vectors of nonnegative integers summing to `n`, in
/// lexicographically decreasing order: `[n, 0, ...], [n-1, 1, 0, ...], ...`.
pub fn integer_vectors(n: u32, len: usize) -> Vec<Vec<u32>> {
    if len == 0 {
        return if n == 0 { vec![vec![]] } else { vec![] };
    }
    let mut out = Vec::new();
    for first in (0..=n).rev() {
        for rest in integer_vectors(n - first, len - 1) {
            let mut v = Vec::with_capacity(len);
            v.push(first);
            v.extend(rest);
            out.push(v);
        }
    }
    out
}

/// All subsets of `items`, by increasing size, positions in
/// lexicographic order within each size.
pub fn subsequences<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    (0..=items.len())
        .flat_map(|k| items.iter().cloned().combinations(k))
        .collect()
}

/// Sort and deduplicate.
pub fn remove_duplicates<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items.dedup();
    items
}

/// Set partitions of the multiset `symlist`, up to permutations of equal
/// entries. Each result is a canonical block list (blocks sorted, entries
/// sorted within a block) together with the number of labeled set
/// partitions realizing it.
///
/// For `[1, 1, 1]` this gives `[[1], [1], [1]]` once, `[[1], [1, 1]]` with
/// multiplicity 3 and `[[1, 1, 1]]` once.
pub fn setparts_with_auts(symlist: &[u32]) -> Vec<(Vec<Vec<u32>>, i64)> {
    let mut counts: BTreeMap<Vec<Vec<u32>>, i64> = BTreeMap::new();
    let mut blocks: Vec<Vec<u32>> = Vec::new();
    place(symlist, &mut blocks, &mut counts);
    counts.into_iter().collect()
}

fn place(rest: &[u32], blocks: &mut Vec<Vec<u32>>, counts: &mut BTreeMap<Vec<Vec<u32>>, i64>) {
    let Some((&x, rest)) = rest.split_first() else {
        let mut shape: Vec<Vec<u32>> = blocks
            .iter()
            .map(|b| {
                let mut b = b.clone();
                b.sort();
                b
            })
            .collect();
        shape.sort();
        *counts.entry(shape).or_insert(0) += 1;
        return;
    };
    for i in 0..blocks.len() {
        blocks[i].push(x);
        place(rest, blocks, counts);
        blocks[i].pop();
    }
    blocks.push(vec![x]);
    place(rest, blocks, counts);
    blocks.pop();
}

/// Distinct permutations of a multiset.
pub fn multiset_permutations<T: Clone + Ord>(items: &[T]) -> Vec<Vec<T>> {
    let mut pool = items.to_vec();
    pool.sort();
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(items.len());
    fn rec<T: Clone + Ord>(pool: &[T], current: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if pool.is_empty() {
            out.push(current.clone());
            return;
        }
        for i in 0..pool.len() {
            if i > 0 && pool[i] == pool[i - 1] {
                continue;
            }
            let mut rest = pool.to_vec();
            rest.remove(i);
            current.push(pool[i].clone());
            rec(&rest, current, out);
            current.pop();
        }
    }
    rec(&pool, &mut current, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aut() {
        assert_eq!(aut(Vec::<u32>::new()), 1);
        assert_eq!(aut(vec![3, 1, 2]), 1);
        assert_eq!(aut(vec![2, 1, 2, 2]), 6);
        assert_eq!(aut(vec![1, 1, 2, 2]), 4);
    }

    #[test]
    fn test_partitions_order() {
        assert_eq!(partitions(0), vec![Vec::<u32>::new()]);
        assert_eq!(
            partitions(4),
            vec![
                vec![4],
                vec![3, 1],
                vec![2, 2],
                vec![2, 1, 1],
                vec![1, 1, 1, 1]
            ]
        );
        assert_eq!(
            partitions_bounded(4, 2),
            vec![vec![2, 2], vec![2, 1, 1], vec![1, 1, 1, 1]]
        );
    }

    #[test]
    fn test_integer_vectors_order() {
        assert_eq!(
            integer_vectors(2, 2),
            vec![vec![2, 0], vec![1, 1], vec![0, 2]]
        );
        assert_eq!(integer_vectors(0, 3), vec![vec![0, 0, 0]]);
        assert_eq!(integer_vectors(1, 0), Vec::<Vec<u32>>::new());
        assert_eq!(integer_vectors(2, 3).len(), 6);
    }

    #[test]
    fn test_setparts() {
        let parts = setparts_with_auts(&[1, 1, 1]);
        assert_eq!(
            parts,
            vec![
                (vec![vec![1], vec![1], vec![1]], 1),
                (vec![vec![1], vec![1, 1]], 3),
                (vec![vec![1, 1, 1]], 1),
            ]
        );
        // Bell number 5 split into shapes for a 3-element multiset with one repeat
        let parts = setparts_with_auts(&[1, 1, 2]);
        let total: i64 = parts.iter().map(|x| x.1).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_multiset_permutations() {
        assert_eq!(multiset_permutations::<u32>(&[]), vec![Vec::<u32>::new()]);
        assert_eq!(multiset_permutations(&[2, 1, 1]).len(), 3);
        assert_eq!(multiset_permutations(&[1, 2, 3]).len(), 6);
    }

    #[test]
    fn test_subsequences() {
        let subs = subsequences(&[1, 2, 3]);
        assert_eq!(subs.len(), 8);
        assert_eq!(subs[0], Vec::<i32>::new());
        assert_eq!(subs[1], vec![1]);
        assert_eq!(subs[7], vec![1, 2, 3]);
    }
}
