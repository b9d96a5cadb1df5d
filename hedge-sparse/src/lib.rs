//! Linear operators and iterative solvers used by `hedge`.
//!
//! The elliptic operators in `hedge` are only available matrix-free, so the solvers here
//! work with anything implementing [`LinearOperator`], including dense and CSR matrices.

pub extern crate nalgebra_sparse;

pub mod cg;
pub mod operator;

pub use operator::{DiagonalOperator, IdentityOperator, LinearOperator, NegatedOperator};
