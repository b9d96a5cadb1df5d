//! Tensor-product nodal reference element on `[-1, 1]^d`.
use crate::polynomial::{grad_vandermonde, vandermonde};
use eyre::eyre;
use hedge_quadrature::univariate::try_gauss_lobatto;
use nalgebra::DMatrix;

/// Nodal reference element with Gauss-Lobatto nodes along every axis.
///
/// Nodes are numbered by their tensor index `(i_0, ..., i_{d-1})` with axis 0 varying fastest.
/// Face `2a` is the side `r_a = -1` and face `2a + 1` the side `r_a = 1`.
#[derive(Debug, Clone)]
pub struct TensorProductElement {
    dimensions: usize,
    order: usize,
    nodes_1d: Vec<f64>,
    mass: DMatrix<f64>,
    inverse_mass: DMatrix<f64>,
    differentiation: Vec<DMatrix<f64>>,
    stiffness: Vec<DMatrix<f64>>,
    stiffness_transpose: Vec<DMatrix<f64>>,
    face_nodes: Vec<Vec<usize>>,
    face_mass: DMatrix<f64>,
}

/// Kronecker product of the per-axis factors, ordered so that axis 0 varies fastest.
fn tensor_product(factors: &[&DMatrix<f64>]) -> DMatrix<f64> {
    factors
        .iter()
        .rev()
        .fold(DMatrix::from_element(1, 1, 1.0), |acc, factor| acc.kronecker(*factor))
}

impl TensorProductElement {
    /// Constructs the element of the given polynomial order in 1, 2 or 3 dimensions.
    pub fn new(dimensions: usize, order: usize) -> eyre::Result<Self> {
        if !(1..=3).contains(&dimensions) {
            return Err(eyre!("Only 1, 2 or 3 dimensions are supported, got {}", dimensions));
        }
        let (_, points) =
            try_gauss_lobatto(order + 1).ok_or_else(|| eyre!("Element order must be at least 1, got {}", order))?;
        let nodes_1d: Vec<f64> = points.iter().map(|p| p[0]).collect();

        let v = vandermonde(&nodes_1d, order);
        let v_r = grad_vandermonde(&nodes_1d, order);
        let v_inv = v
            .clone()
            .try_inverse()
            .ok_or_else(|| eyre!("Vandermonde matrix of order {} is singular", order))?;

        let inverse_mass_1d = &v * v.transpose();
        let mass_1d = inverse_mass_1d
            .clone()
            .try_inverse()
            .ok_or_else(|| eyre!("Mass matrix of order {} is singular", order))?;
        let differentiation_1d = &v_r * &v_inv;
        let identity = DMatrix::identity(order + 1, order + 1);

        let mass = tensor_product(&vec![&mass_1d; dimensions]);
        let inverse_mass = tensor_product(&vec![&inverse_mass_1d; dimensions]);
        let differentiation: Vec<_> = (0..dimensions)
            .map(|axis| {
                let factors: Vec<_> = (0..dimensions)
                    .map(|b| if b == axis { &differentiation_1d } else { &identity })
                    .collect();
                tensor_product(&factors)
            })
            .collect();
        let stiffness: Vec<_> = differentiation.iter().map(|d| &mass * d).collect();
        let stiffness_transpose = stiffness.iter().map(|s| s.transpose()).collect();
        let face_mass = tensor_product(&vec![&mass_1d; dimensions - 1]);

        let mut element = Self {
            dimensions,
            order,
            nodes_1d,
            mass,
            inverse_mass,
            differentiation,
            stiffness,
            stiffness_transpose,
            face_nodes: Vec::new(),
            face_mass,
        };
        element.face_nodes = (0..2 * dimensions)
            .map(|face| {
                let axis = face / 2;
                let index = if face % 2 == 0 { 0 } else { order };
                (0..element.num_nodes())
                    .filter(|&node| element.tensor_index(node)[axis] == index)
                    .collect()
            })
            .collect();
        Ok(element)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of nodes per axis, `order + 1`.
    pub fn nodes_per_axis(&self) -> usize {
        self.order + 1
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes_per_axis().pow(self.dimensions as u32)
    }

    pub fn num_faces(&self) -> usize {
        2 * self.dimensions
    }

    pub fn num_face_nodes(&self) -> usize {
        self.nodes_per_axis().pow(self.dimensions as u32 - 1)
    }

    /// The Gauss-Lobatto nodes on `[-1, 1]`, in increasing order.
    pub fn nodes_1d(&self) -> &[f64] {
        &self.nodes_1d
    }

    /// The per-axis node indices of the given local node.
    pub fn tensor_index(&self, node: usize) -> Vec<usize> {
        let n = self.nodes_per_axis();
        (0..self.dimensions)
            .map(|axis| (node / n.pow(axis as u32)) % n)
            .collect()
    }

    /// Coordinates of the given local node in the reference domain.
    pub fn reference_coordinates(&self, node: usize) -> Vec<f64> {
        self.tensor_index(node)
            .into_iter()
            .map(|i| self.nodes_1d[i])
            .collect()
    }

    pub fn mass(&self) -> &DMatrix<f64> {
        &self.mass
    }

    pub fn inverse_mass(&self) -> &DMatrix<f64> {
        &self.inverse_mass
    }

    /// Nodal differentiation matrix along the given reference axis.
    pub fn differentiation(&self, axis: usize) -> &DMatrix<f64> {
        &self.differentiation[axis]
    }

    /// Reference stiffness matrix `M D_axis`.
    pub fn stiffness(&self, axis: usize) -> &DMatrix<f64> {
        &self.stiffness[axis]
    }

    pub fn stiffness_transpose(&self, axis: usize) -> &DMatrix<f64> {
        &self.stiffness_transpose[axis]
    }

    /// Local indices of the nodes on the given face, in increasing order.
    pub fn face_nodes(&self, face: usize) -> &[usize] {
        &self.face_nodes[face]
    }

    /// Reference mass matrix of a face. All faces share the same matrix.
    pub fn face_mass(&self) -> &DMatrix<f64> {
        &self.face_mass
    }
}
