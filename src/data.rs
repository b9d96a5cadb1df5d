//! Functions given by the user, e.g. boundary data and right-hand sides.
use crate::discretization::Discretization;
use crate::mesh::BoundaryTag;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// A scalar function of position.
pub trait GivenFunction {
    fn value_at(&self, x: &DVector<f64>) -> f64;

    /// Nodal interpolant on all volume nodes.
    fn volume_interpolant(&self, discretization: &Discretization) -> DVector<f64> {
        discretization.interpolate_volume_function(|x| self.value_at(x))
    }

    /// Nodal interpolant on the nodes of the given boundary.
    fn boundary_interpolant(&self, discretization: &Discretization, tag: &BoundaryTag) -> DVector<f64> {
        discretization.interpolate_boundary_function(|x| self.value_at(x), tag)
    }
}

impl<F> GivenFunction for F
where
    F: Fn(&DVector<f64>) -> f64,
{
    fn value_at(&self, x: &DVector<f64>) -> f64 {
        self(x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstantGivenFunction {
    value: f64,
}

impl ConstantGivenFunction {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl GivenFunction for ConstantGivenFunction {
    fn value_at(&self, _x: &DVector<f64>) -> f64 {
        self.value
    }

    fn volume_interpolant(&self, discretization: &Discretization) -> DVector<f64> {
        DVector::repeat(discretization.num_nodes(), self.value)
    }

    fn boundary_interpolant(&self, discretization: &Discretization, tag: &BoundaryTag) -> DVector<f64> {
        DVector::repeat(discretization.boundary(tag).num_nodes(), self.value)
    }
}
