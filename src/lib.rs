//! Tautological rings of moduli of curves, after Pixton's 3-spin relations.
//!
//! The core objects are decorated stable graphs ([`graph::Graph`])
//! representing additive generators of the strata algebra, enumerated in a
//! canonical order by [`strata::StrataCache`]. On top of that sit the
//! multiplication of generators, evaluation against the socle, the
//! Faber-Zagier relations and their derived variants, and coefficients of
//! the double ramification cycle.

#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![warn(clippy::if_not_else)]
#![warn(clippy::needless_continue)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::explicit_iter_loop)]

pub mod algebra;
pub mod dr;
pub mod evaluation;
pub mod graph;
pub mod isomorphism;
pub mod moduli;
pub mod poly;
pub mod relations;
pub mod strata;

pub use graph::Graph;
pub use moduli::ModuliType;
pub use strata::StrataCache;
