//! Sparse vectors and exact Gaussian elimination over the rationals.
//!
//! The rank routines never materialize dense matrices: relation matrices
//! are huge but very sparse, and elimination in a good pivot order (fewest
//! nonzeros first) keeps them sparse.

use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::{FxHashMap, FxHashSet};

/// A tautological class in a fixed graded piece: generator index to
/// rational coefficient, sorted by index.
pub type SparseVec = Vec<(usize, BigRational)>;

/// A sparse matrix as a dictionary of keys `(row, col)`.
pub type SparseMatrix = FxHashMap<(usize, usize), BigRational>;

/// Sort by index, coalesce repeated indices, drop zero coefficients.
pub fn simplify_sparse(mut vec: SparseVec) -> SparseVec {
    vec.sort_by_key(|x| x.0);
    let mut out: SparseVec = Vec::with_capacity(vec.len());
    for (idx, coeff) in vec {
        match out.last_mut() {
            Some(last) if last.0 == idx => last.1 += coeff,
            _ => out.push((idx, coeff)),
        }
    }
    out.retain(|x| !x.1.is_zero());
    out
}

pub fn matrix_from_rows(rows: &[SparseVec]) -> SparseMatrix {
    let mut d = SparseMatrix::default();
    for (i, row) in rows.iter().enumerate() {
        for (j, coeff) in row {
            d.insert((i, *j), coeff.clone());
        }
    }
    d
}

/// Row and column elimination orders sorted by nonzero count, fewest first.
pub fn choose_orders_sparse(d: &SparseMatrix, nrows: usize, ncols: usize) -> (Vec<usize>, Vec<usize>) {
    let mut row_nums = vec![0usize; nrows];
    let mut col_nums = vec![0usize; ncols];
    for (r, c) in d.keys() {
        row_nums[*r] += 1;
        col_nums[*c] += 1;
    }
    let mut row_order: Vec<usize> = (0..nrows).collect();
    let mut col_order: Vec<usize> = (0..ncols).collect();
    row_order.sort_by_key(|&x| row_nums[x]);
    col_order.sort_by_key(|&x| col_nums[x]);
    (row_order, col_order)
}

/// Rank of `d` by destructive elimination in the given row/column orders.
pub fn compute_rank_sparse(d: &mut SparseMatrix, row_order: &[usize], col_order: &[usize]) -> usize {
    let nrows = row_order.len();
    let ncols = col_order.len();
    let mut row_rank = vec![0usize; nrows];
    let mut col_rank = vec![0usize; ncols];
    for (i, &r) in row_order.iter().enumerate() {
        row_rank[r] = i;
    }
    for (i, &c) in col_order.iter().enumerate() {
        col_rank[c] = i;
    }

    let mut row_contents: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); nrows];
    let mut col_contents: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); ncols];
    for (r, c) in d.keys() {
        row_contents[*r].insert(*c);
        col_contents[*c].insert(*r);
    }

    let mut count = 0;
    for &i in row_order {
        let mut s: Vec<usize> = row_contents[i].iter().copied().collect();
        if s.is_empty() {
            continue;
        }
        count += 1;
        s.sort_by_key(|&x| col_rank[x]);
        let j = s[0];
        let t: Vec<usize> = col_contents[j]
            .iter()
            .copied()
            .filter(|&ii| row_rank[ii] > row_rank[i])
            .collect();
        for &k in &s[1..] {
            let rat = &d[&(i, k)] / &d[&(i, j)];
            for &ii in &t {
                let delta = &rat * &d[&(ii, j)];
                let entry = d.entry((ii, k)).or_insert_with(BigRational::zero);
                *entry -= delta;
                if entry.is_zero() {
                    d.remove(&(ii, k));
                    row_contents[ii].remove(&k);
                    col_contents[k].remove(&ii);
                } else {
                    row_contents[ii].insert(k);
                    col_contents[k].insert(ii);
                }
            }
        }
        for &ii in &t {
            d.remove(&(ii, j));
            row_contents[ii].remove(&j);
            col_contents[j].remove(&ii);
        }
    }
    count
}

pub fn choose_orders(l: &[Vec<BigRational>]) -> (Vec<usize>, Vec<usize>) {
    let rows = l.len();
    if rows == 0 {
        return (Vec::new(), Vec::new());
    }
    let cols = l[0].len();
    let mut row_nums = vec![0usize; rows];
    let mut col_nums = vec![0usize; cols];
    for (i, row) in l.iter().enumerate() {
        for (j, x) in row.iter().enumerate() {
            if !x.is_zero() {
                row_nums[i] += 1;
                col_nums[j] += 1;
            }
        }
    }
    let mut row_order: Vec<usize> = (0..rows).collect();
    let mut col_order: Vec<usize> = (0..cols).collect();
    row_order.sort_by_key(|&x| row_nums[x]);
    col_order.sort_by_key(|&x| col_nums[x]);
    (row_order, col_order)
}

/// Rank of a dense matrix by destructive elimination in row order.
pub fn compute_rank(l: &mut [Vec<BigRational>]) -> usize {
    let rows = l.len();
    if rows == 0 {
        return 0;
    }
    let cols = l[0].len();
    let mut count = 0;
    for i in 0..rows {
        let Some(j) = (0..cols).find(|&j| !l[i][j].is_zero()) else {
            continue;
        };
        count += 1;
        for k in (j + 1)..cols {
            if l[i][k].is_zero() {
                continue;
            }
            let rat = &l[i][k] / &l[i][j];
            for ii in (i + 1)..rows {
                if !l[ii][j].is_zero() {
                    let delta = &rat * &l[ii][j];
                    l[ii][k] -= delta;
                }
            }
        }
        for row in l.iter_mut().skip(i + 1) {
            row[j] = BigRational::zero();
        }
    }
    count
}

/// Like [`compute_rank`] but eliminating in the given row/column orders.
pub fn compute_rank2(l: &mut [Vec<BigRational>], row_order: &[usize], col_order: &[usize]) -> usize {
    let mut count = 0;
    for (irow, &i) in row_order.iter().enumerate() {
        let s: Vec<usize> = col_order.iter().copied().filter(|&j| !l[i][j].is_zero()).collect();
        if s.is_empty() {
            continue;
        }
        count += 1;
        let j = s[0];
        let t: Vec<usize> = row_order[irow + 1..]
            .iter()
            .copied()
            .filter(|&ii| !l[ii][j].is_zero())
            .collect();
        for &k in &s[1..] {
            let rat = &l[i][k] / &l[i][j];
            for &ii in &t {
                let delta = &rat * &l[ii][j];
                l[ii][k] -= delta;
            }
        }
        for &ii in &t {
            l[ii][j] = BigRational::zero();
        }
    }
    count
}

/// Reduced-echelon basis of the left kernel of `m`, i.e. of the space of
/// `v` with `v * m = 0`.
pub fn kernel_basis(m: &[Vec<BigRational>]) -> Vec<Vec<BigRational>> {
    let nrows = m.len();
    if nrows == 0 {
        return Vec::new();
    }
    let ncols = m[0].len();
    let mut t = vec![vec![BigRational::zero(); nrows]; ncols];
    for (i, row) in m.iter().enumerate() {
        for (j, x) in row.iter().enumerate() {
            t[j][i] = x.clone();
        }
    }
    let pivots = row_reduce(&mut t);
    let pivot_set: FxHashSet<usize> = pivots.iter().copied().collect();
    let mut basis = Vec::new();
    for f in 0..nrows {
        if pivot_set.contains(&f) {
            continue;
        }
        let mut v = vec![BigRational::zero(); nrows];
        v[f] = BigRational::from_integer(1.into());
        for (row, &p) in pivots.iter().enumerate() {
            v[p] = -t[row][f].clone();
        }
        basis.push(v);
    }
    row_reduce(&mut basis);
    basis
}

/// In-place reduced row echelon form; returns the pivot columns.
pub fn row_reduce(m: &mut Vec<Vec<BigRational>>) -> Vec<usize> {
    let nrows = m.len();
    if nrows == 0 {
        return Vec::new();
    }
    let ncols = m[0].len();
    let mut pivots = Vec::new();
    let mut pivot_row = 0;
    for col in 0..ncols {
        let Some(found) = (pivot_row..nrows).find(|&r| !m[r][col].is_zero()) else {
            continue;
        };
        m.swap(pivot_row, found);
        let inv = m[pivot_row][col].recip();
        for x in m[pivot_row].iter_mut() {
            *x *= &inv;
        }
        for r in 0..nrows {
            if r != pivot_row && !m[r][col].is_zero() {
                let factor = m[r][col].clone();
                for c in 0..ncols {
                    let delta = &factor * &m[pivot_row][c];
                    m[r][c] -= delta;
                }
            }
        }
        pivots.push(col);
        pivot_row += 1;
        if pivot_row == nrows {
            break;
        }
    }
    m.retain(|row| row.iter().any(|x| !x.is_zero()));
    pivots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::rat;
    use proptest::prelude::*;

    fn dense(rows: &[&[i64]]) -> Vec<Vec<BigRational>> {
        rows.iter().map(|r| r.iter().map(|&x| rat(x)).collect()).collect()
    }

    #[test]
    fn test_simplify_sparse() {
        let v = vec![(3, rat(1)), (1, rat(2)), (3, rat(-1)), (0, rat(5))];
        assert_eq!(simplify_sparse(v), vec![(0, rat(5)), (1, rat(2))]);
    }

    #[test]
    fn test_compute_rank() {
        assert_eq!(compute_rank(&mut dense(&[&[1, 2], &[3, 4]])), 2);
        assert_eq!(compute_rank(&mut dense(&[&[1, 2], &[2, 4]])), 1);
        assert_eq!(compute_rank(&mut dense(&[&[0, 0], &[0, 0]])), 0);
    }

    #[test]
    fn test_compute_rank_sparse() {
        let mut d = SparseMatrix::default();
        d.insert((0, 1), rat(1));
        d.insert((1, 0), rat(2));
        assert_eq!(compute_rank_sparse(&mut d, &[0, 1], &[0, 1]), 2);
    }

    #[test]
    fn test_kernel_basis() {
        // rows (1,2) and (2,4): kernel spanned by (2, -1), normalized (1, -1/2)
        let basis = kernel_basis(&dense(&[&[1, 2], &[2, 4]]));
        assert_eq!(basis, vec![vec![rat(1), crate::rational::frac(-1, 2)]]);
        for v in &basis {
            // v * m = 0
            let m = dense(&[&[1, 2], &[2, 4]]);
            for c in 0..2 {
                let mut acc = BigRational::zero();
                for r in 0..2 {
                    acc += &v[r] * &m[r][c];
                }
                assert!(acc.is_zero());
            }
        }
    }

    proptest! {
        #[test]
        fn rank_independent_of_order(entries in proptest::collection::vec((0usize..5, 0usize..5, -4i64..5), 0..12)) {
            let mut l = vec![vec![BigRational::zero(); 5]; 5];
            for (r, c, x) in entries {
                l[r][c] = rat(x);
            }
            let mut l2 = l.clone();
            let (row_order, col_order) = choose_orders(&l);
            let r1 = compute_rank(&mut l);
            let r2 = compute_rank2(&mut l2, &row_order, &col_order);
            prop_assert_eq!(r1, r2);
        }
    }
}
