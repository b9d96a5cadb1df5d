//! Operators for specific partial differential equations.
pub mod poisson;
pub mod wave;

pub use poisson::{BoundPoissonOperator, DiffusionTensor, HelmholtzOperator, LaplacianOperatorBase, PoissonOperator};
pub use wave::{BoundWaveOperator, StrongWaveOperator};
