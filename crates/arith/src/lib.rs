//! Exact-arithmetic and combinatorics substrate for the strata algebra.
//!
//! Everything here is independent of the moduli-space layer: rational and
//! big-integer helpers, partition/multiset enumeration in fixed orders,
//! Lagrange interpolation, and sparse rational linear algebra. All
//! arithmetic is exact; floating point never appears.

pub mod interpolate;
pub mod partitions;
pub mod rational;
pub mod sparse;

pub use interpolate::{interpolate, poly_eval};
pub use partitions::{
    aut, integer_vectors, multiset_permutations, partitions, partitions_bounded,
    remove_duplicates, setparts_with_auts, subsequences,
};
pub use rational::{bernoulli, binomial, factorial, frac, rat};
pub use sparse::{
    choose_orders, choose_orders_sparse, compute_rank, compute_rank2, compute_rank_sparse,
    kernel_basis, matrix_from_rows, row_reduce, simplify_sparse, SparseMatrix, SparseVec,
};
