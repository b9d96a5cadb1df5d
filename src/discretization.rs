//! Nodal DG discretization of a [`BoxMesh`].
//!
//! Global nodes are numbered cell by cell. Within a cell, the numbering of the
//! [`TensorProductElement`] is used. Every field is a `DVector<f64>` over these nodes, and
//! boundary fields are vectors over the nodes of a [`Boundary`].
use crate::element::TensorProductElement;
use crate::error::OperatorError;
use crate::flux::FaceGeometry;
use crate::mesh::{face_axis, face_orientation, BoundaryTag, BoxMesh, FaceNeighbor};
use crate::optemplate::compiler::{compile, CompiledOperator};
use crate::optemplate::{Expr, OperatorKind};
use eyre::eyre;
use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

/// A cell face seen from the cell it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfFace {
    pub cell: usize,
    pub face: usize,
    /// Outward unit normal.
    pub normal: Vec<f64>,
    /// Ratio of the physical face measure to the reference face measure.
    pub jacobian: f64,
    /// `(N + 1)(N + d) / (d h)`, maximized over both sides of interior faces.
    pub penalty: f64,
    /// The matching face of the neighboring cell, if any.
    pub neighbor: Option<(usize, usize)>,
}

impl HalfFace {
    pub fn geometry(&self) -> FaceGeometry<'_> {
        FaceGeometry {
            normal: &self.normal,
            penalty: self.penalty,
        }
    }
}

/// The boundary faces carrying a tag, along with their nodes.
///
/// Nodes are listed face by face, in the order of [`TensorProductElement::face_nodes`].
/// A volume node on several boundary faces appears once per face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundary {
    faces: Vec<usize>,
    nodes: Vec<usize>,
}

impl Boundary {
    fn push_face(&mut self, half_face: usize, nodes: &[usize]) {
        self.faces.push(half_face);
        self.nodes.extend_from_slice(nodes);
    }

    /// Indices into [`Discretization::half_faces`].
    pub fn faces(&self) -> &[usize] {
        &self.faces
    }

    /// Global volume node indices.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone)]
pub struct Discretization {
    mesh: BoxMesh,
    element: TensorProductElement,
    nodes: Vec<DVector<f64>>,
    // Per cell: volume Jacobian and the reference-to-physical derivative scale 2/h per axis
    jacobians: Vec<f64>,
    axis_scales: Vec<Vec<f64>>,
    half_faces: Vec<HalfFace>,
    boundaries: FxHashMap<BoundaryTag, Boundary>,
    empty_boundary: Boundary,
    mass_ones: DVector<f64>,
}

fn extents_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * (1.0 + a.abs().max(b.abs()))
}

impl Discretization {
    /// Discretizes the mesh with elements of the given polynomial order.
    ///
    /// Fails if the order is zero or if interior faces are not conforming.
    pub fn new(mesh: BoxMesh, order: usize) -> eyre::Result<Self> {
        let dimensions = mesh.dimensions();
        let element = TensorProductElement::new(dimensions, order)?;
        let num_local_nodes = element.num_nodes();
        let num_faces = element.num_faces();
        let cells = mesh.cells();

        let reference_nodes: Vec<_> = (0..num_local_nodes)
            .map(|local| element.reference_coordinates(local))
            .collect();
        let mut nodes = Vec::with_capacity(cells.len() * num_local_nodes);
        for cell in cells {
            for r in &reference_nodes {
                nodes.push(DVector::from_vec(cell.map_reference_coords(r)));
            }
        }

        let jacobians: Vec<f64> = cells
            .iter()
            .map(|cell| (0..dimensions).map(|axis| 0.5 * cell.extent(axis)).product())
            .collect();
        let axis_scales: Vec<Vec<f64>> = cells
            .iter()
            .map(|cell| (0..dimensions).map(|axis| 2.0 / cell.extent(axis)).collect())
            .collect();

        let penalty_factor = |cell: usize, axis: usize| {
            ((order + 1) * (order + dimensions)) as f64 / (dimensions as f64 * cells[cell].extent(axis))
        };

        let mut half_faces = Vec::with_capacity(cells.len() * num_faces);
        for (cell_index, cell) in cells.iter().enumerate() {
            for face in 0..num_faces {
                let axis = face_axis(face);
                let mut normal = vec![0.0; dimensions];
                normal[axis] = face_orientation(face);
                let jacobian: f64 = (0..dimensions)
                    .filter(|&b| b != axis)
                    .map(|b| 0.5 * cell.extent(b))
                    .product();

                let (neighbor, penalty) = match mesh.neighbor(cell_index, face) {
                    FaceNeighbor::Interior {
                        cell: other,
                        face: other_face,
                    } => {
                        let other_cell = &cells[*other];
                        let conforming = (0..dimensions).filter(|&b| b != axis).all(|b| {
                            extents_match(cell.min()[b], other_cell.min()[b])
                                && extents_match(cell.max()[b], other_cell.max()[b])
                        });
                        if !conforming {
                            return Err(eyre!(
                                "Face {} of cell {} does not conform to face {} of cell {}",
                                face,
                                cell_index,
                                other_face,
                                other
                            ));
                        }
                        let penalty = penalty_factor(cell_index, axis).max(penalty_factor(*other, axis));
                        (Some((*other, *other_face)), penalty)
                    }
                    FaceNeighbor::Boundary { .. } => (None, penalty_factor(cell_index, axis)),
                };

                half_faces.push(HalfFace {
                    cell: cell_index,
                    face,
                    normal,
                    jacobian,
                    penalty,
                    neighbor,
                });
            }
        }

        let mut boundaries: FxHashMap<BoundaryTag, Boundary> = FxHashMap::default();
        let mut all = Boundary::default();
        for boundary_face in mesh.boundary_faces() {
            let half_face = boundary_face.cell * num_faces + boundary_face.face;
            let face_nodes: Vec<usize> = element
                .face_nodes(boundary_face.face)
                .iter()
                .map(|local| boundary_face.cell * num_local_nodes + local)
                .collect();
            all.push_face(half_face, &face_nodes);
            let named_tags = boundary_face
                .tags
                .iter()
                .filter(|tag| matches!(tag, BoundaryTag::Named(_)))
                .unique();
            for tag in named_tags {
                boundaries
                    .entry(tag.clone())
                    .or_default()
                    .push_face(half_face, &face_nodes);
            }
        }
        boundaries.insert(BoundaryTag::All, all);

        let num_nodes = nodes.len();
        let mut discretization = Self {
            mesh,
            element,
            nodes,
            jacobians,
            axis_scales,
            half_faces,
            boundaries,
            empty_boundary: Boundary::default(),
            mass_ones: DVector::zeros(num_nodes),
        };
        discretization.mass_ones = discretization.apply_mass(&DVector::repeat(num_nodes, 1.0));

        debug!(
            "Discretized {}-dimensional mesh with {} cells at order {}: {} nodes, {} boundary nodes",
            dimensions,
            discretization.mesh.num_cells(),
            order,
            num_nodes,
            discretization.boundary(&BoundaryTag::All).num_nodes()
        );
        Ok(discretization)
    }

    pub fn mesh(&self) -> &BoxMesh {
        &self.mesh
    }

    pub fn element(&self) -> &TensorProductElement {
        &self.element
    }

    pub fn dimensions(&self) -> usize {
        self.mesh.dimensions()
    }

    pub fn order(&self) -> usize {
        self.element.order()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Physical coordinates of all nodes.
    pub fn nodes(&self) -> &[DVector<f64>] {
        &self.nodes
    }

    pub fn half_faces(&self) -> &[HalfFace] {
        &self.half_faces
    }

    /// The boundary with the given tag. Unknown tags and [`BoundaryTag::None`] yield an empty
    /// boundary.
    pub fn boundary(&self, tag: &BoundaryTag) -> &Boundary {
        match tag {
            BoundaryTag::None => &self.empty_boundary,
            _ => self.boundaries.get(tag).unwrap_or(&self.empty_boundary),
        }
    }

    pub fn mesh_volume(&self) -> f64 {
        self.mesh.volume()
    }

    /// `M 1`. Its dot product with a field is the integral of the field.
    pub fn mass_ones(&self) -> &DVector<f64> {
        &self.mass_ones
    }

    /// Integral of a volume field over the mesh.
    pub fn integral(&self, u: &DVector<f64>) -> f64 {
        self.mass_ones.dot(u)
    }

    pub fn volume_zeros(&self) -> DVector<f64> {
        DVector::zeros(self.num_nodes())
    }

    pub fn interpolate_volume_function(&self, f: impl Fn(&DVector<f64>) -> f64) -> DVector<f64> {
        DVector::from_iterator(self.nodes.len(), self.nodes.iter().map(f))
    }

    pub fn interpolate_boundary_function(&self, f: impl Fn(&DVector<f64>) -> f64, tag: &BoundaryTag) -> DVector<f64> {
        let boundary = self.boundary(tag);
        DVector::from_iterator(
            boundary.num_nodes(),
            boundary.nodes().iter().map(|&node| f(&self.nodes[node])),
        )
    }

    /// Restricts a volume field to the nodes of the given boundary.
    ///
    /// # Panics
    ///
    /// Panics if the field length does not match the number of nodes.
    pub fn boundarize_volume_field(&self, u: &DVector<f64>, tag: &BoundaryTag) -> DVector<f64> {
        assert_eq!(u.len(), self.num_nodes(), "Field length must match the number of nodes");
        let boundary = self.boundary(tag);
        DVector::from_iterator(boundary.num_nodes(), boundary.nodes().iter().map(|&node| u[node]))
    }

    fn apply_cellwise<'s>(
        &'s self,
        u: &DVector<f64>,
        operator: impl Fn(usize) -> (f64, &'s DMatrix<f64>),
    ) -> DVector<f64> {
        assert_eq!(u.len(), self.num_nodes(), "Field length must match the number of nodes");
        let n = self.element.num_nodes();
        let mut result = DVector::zeros(u.len());
        for cell in 0..self.mesh.num_cells() {
            let (scale, matrix) = operator(cell);
            result
                .rows_mut(cell * n, n)
                .gemv(scale, matrix, &u.rows(cell * n, n), 0.0);
        }
        result
    }

    /// # Panics
    ///
    /// Panics if the field length does not match the number of nodes.
    pub fn apply_mass(&self, u: &DVector<f64>) -> DVector<f64> {
        self.apply_cellwise(u, |cell| (self.jacobians[cell], self.element.mass()))
    }

    pub fn apply_inverse_mass(&self, u: &DVector<f64>) -> DVector<f64> {
        self.apply_cellwise(u, |cell| (1.0 / self.jacobians[cell], self.element.inverse_mass()))
    }

    /// Nodal derivative of a field along the given axis.
    pub fn apply_differentiation(&self, axis: usize, u: &DVector<f64>) -> DVector<f64> {
        self.apply_cellwise(u, |cell| (self.axis_scales[cell][axis], self.element.differentiation(axis)))
    }

    pub fn apply_stiffness(&self, axis: usize, u: &DVector<f64>) -> DVector<f64> {
        self.apply_cellwise(u, |cell| {
            (
                self.jacobians[cell] * self.axis_scales[cell][axis],
                self.element.stiffness(axis),
            )
        })
    }

    pub fn apply_stiffness_transpose(&self, axis: usize, u: &DVector<f64>) -> DVector<f64> {
        self.apply_cellwise(u, |cell| {
            (
                self.jacobians[cell] * self.axis_scales[cell][axis],
                self.element.stiffness_transpose(axis),
            )
        })
    }

    pub fn apply_operator(&self, operator: OperatorKind, u: &DVector<f64>) -> DVector<f64> {
        match operator {
            OperatorKind::Mass => self.apply_mass(u),
            OperatorKind::InverseMass => self.apply_inverse_mass(u),
            OperatorKind::Differentiation(axis) => self.apply_differentiation(axis, u),
            OperatorKind::Stiffness(axis) => self.apply_stiffness(axis, u),
            OperatorKind::StiffnessTranspose(axis) => self.apply_stiffness_transpose(axis, u),
        }
    }

    /// Adds `M_face values` to the nodes of the half-face in `result`.
    pub(crate) fn lift_face_values(&self, half_face: &HalfFace, values: &DVector<f64>, result: &mut DVector<f64>) {
        let lifted = self.element.face_mass() * values * half_face.jacobian;
        let offset = half_face.cell * self.element.num_nodes();
        for (&local, value) in self.element.face_nodes(half_face.face).iter().zip(lifted.iter()) {
            result[offset + local] += value;
        }
    }

    /// Compiles operator templates against this discretization.
    pub fn compile(&self, outputs: &[Expr]) -> Result<CompiledOperator<'_>, OperatorError> {
        compile(self, outputs)
    }
}
