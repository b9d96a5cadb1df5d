//! Discontinuous Galerkin discretizations on axis-aligned box meshes.
//!
//! Operators are written as templates ([`optemplate::Expr`]) combining volume operators with
//! numerical fluxes ([`flux`]), and compiled against a [`discretization::Discretization`]
//! for evaluation. The [`models`] module provides Poisson, Helmholtz and wave operators.
pub mod data;
pub mod discretization;
pub mod element;
pub mod error;
pub mod flux;
pub mod iterative;
pub mod mesh;
pub mod models;
pub mod optemplate;
pub mod polynomial;
pub mod second_order;

pub mod quadrature {
    pub use hedge_quadrature::*;
}

pub mod sparse {
    pub use hedge_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
