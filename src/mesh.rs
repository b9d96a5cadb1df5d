use crate::error::OperatorError;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub mod procedural;

/// Identifies a set of boundary faces.
///
/// `All` refers to every boundary face of a mesh and `None` to no face at all. Named tags are
/// attached to individual boundary faces by the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryTag {
    All,
    None,
    Named(String),
}

impl BoundaryTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<&str> for BoundaryTag {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for BoundaryTag {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for BoundaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "<all>"),
            Self::None => write!(f, "<none>"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// An axis-aligned box `[min_0, max_0] x ... x [min_{d-1}, max_{d-1}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl AxisAlignedBox {
    /// # Panics
    ///
    /// Panics if the corners have different dimensions or if `min[a] >= max[a]` for some axis.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        assert_eq!(min.len(), max.len(), "Corners must have the same dimension");
        assert!(
            min.iter().zip(&max).all(|(a, b)| a < b),
            "Box must have positive extent along every axis"
        );
        Self { min, max }
    }

    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    pub fn volume(&self) -> f64 {
        (0..self.dimensions()).map(|axis| self.extent(axis)).product()
    }

    /// Maps a point of the reference box `[-1, 1]^d` to this box.
    ///
    /// Reference coordinates `±1` are mapped exactly onto the corners, so boxes sharing a face
    /// produce identical coordinates on that face.
    pub fn map_reference_coords(&self, r: &[f64]) -> Vec<f64> {
        r.iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(r, (min, max))| {
                let t = 0.5 * (r + 1.0);
                (1.0 - t) * min + t * max
            })
            .collect()
    }

    /// Center of the given face.
    pub fn face_center(&self, face: usize) -> Vec<f64> {
        let axis = face_axis(face);
        let mut center: Vec<f64> = self
            .min
            .iter()
            .zip(&self.max)
            .map(|(a, b)| 0.5 * (a + b))
            .collect();
        center[axis] = if face % 2 == 0 { self.min[axis] } else { self.max[axis] };
        center
    }
}

/// The axis orthogonal to the given face of a box.
pub fn face_axis(face: usize) -> usize {
    face / 2
}

/// The sign of the outward normal of the given face along its axis.
pub fn face_orientation(face: usize) -> f64 {
    if face % 2 == 0 {
        -1.0
    } else {
        1.0
    }
}

/// The face on the opposite side of a box.
pub fn opposite_face(face: usize) -> usize {
    face ^ 1
}

/// What lies on the other side of a cell face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaceNeighbor {
    Interior { cell: usize, face: usize },
    Boundary { tags: Vec<BoundaryTag> },
}

/// A boundary face of a [`BoxMesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryFace<'a> {
    pub cell: usize,
    pub face: usize,
    pub tags: &'a [BoundaryTag],
}

impl<'a> BoundaryFace<'a> {
    pub fn has_tag(&self, tag: &BoundaryTag) -> bool {
        match tag {
            BoundaryTag::All => true,
            BoundaryTag::None => false,
            named => self.tags.contains(named),
        }
    }
}

/// Conforming mesh of axis-aligned boxes with explicit face neighbors.
///
/// Faces are numbered per cell as in [`TensorProductElement`](crate::element::TensorProductElement):
/// face `2a` is the lower side along axis `a` and face `2a + 1` the upper side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxMesh {
    dimensions: usize,
    cells: Vec<AxisAlignedBox>,
    neighbors: Vec<Vec<FaceNeighbor>>,
}

impl BoxMesh {
    /// Constructs a mesh from cells and their face neighbors.
    ///
    /// Interior connectivity must be reciprocal and must pair a face with a face
    /// of the opposite orientation along the same axis.
    pub fn from_cells_and_neighbors(
        dimensions: usize,
        cells: Vec<AxisAlignedBox>,
        neighbors: Vec<Vec<FaceNeighbor>>,
    ) -> eyre::Result<Self> {
        if cells.len() != neighbors.len() {
            return Err(eyre!(
                "Got {} cells but neighbor information for {} cells",
                cells.len(),
                neighbors.len()
            ));
        }
        for (cell_index, (cell, cell_neighbors)) in cells.iter().zip(&neighbors).enumerate() {
            if cell.dimensions() != dimensions {
                return Err(eyre!("Cell {} is not {}-dimensional", cell_index, dimensions));
            }
            if cell_neighbors.len() != 2 * dimensions {
                return Err(eyre!("Cell {} must have exactly {} face neighbors", cell_index, 2 * dimensions));
            }
            for (face, neighbor) in cell_neighbors.iter().enumerate() {
                if let FaceNeighbor::Interior {
                    cell: other,
                    face: other_face,
                } = neighbor
                {
                    let reciprocal = neighbors
                        .get(*other)
                        .and_then(|other_neighbors| other_neighbors.get(*other_face));
                    let expected = FaceNeighbor::Interior { cell: cell_index, face };
                    if reciprocal != Some(&expected) {
                        return Err(eyre!(
                            "Face {} of cell {} is not reciprocally connected to face {} of cell {}",
                            face,
                            cell_index,
                            other_face,
                            other
                        ));
                    }
                    if *other_face != opposite_face(face) {
                        return Err(eyre!(
                            "Face {} of cell {} can not be connected to face {} of cell {}",
                            face,
                            cell_index,
                            other_face,
                            other
                        ));
                    }
                }
            }
        }

        Ok(Self {
            dimensions,
            cells,
            neighbors,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[AxisAlignedBox] {
        &self.cells
    }

    pub fn neighbor(&self, cell: usize, face: usize) -> &FaceNeighbor {
        &self.neighbors[cell][face]
    }

    /// Total volume of all cells.
    pub fn volume(&self) -> f64 {
        self.cells.iter().map(AxisAlignedBox::volume).sum()
    }

    /// All boundary faces, ordered by cell and then by face.
    pub fn boundary_faces(&self) -> impl Iterator<Item = BoundaryFace<'_>> {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(cell, cell_neighbors)| {
                cell_neighbors
                    .iter()
                    .enumerate()
                    .filter_map(move |(face, neighbor)| match neighbor {
                        FaceNeighbor::Boundary { tags } => Some(BoundaryFace { cell, face, tags }),
                        FaceNeighbor::Interior { .. } => None,
                    })
            })
    }

    /// Replaces the tags of every boundary face by those returned from the tagger.
    ///
    /// The tagger is given the center of the face and its outward unit normal.
    pub fn with_boundary_tagger(mut self, tagger: impl Fn(&[f64], &[f64]) -> Vec<BoundaryTag>) -> Self {
        for (cell, cell_neighbors) in self.cells.iter().zip(&mut self.neighbors) {
            for (face, neighbor) in cell_neighbors.iter_mut().enumerate() {
                if let FaceNeighbor::Boundary { tags } = neighbor {
                    let mut normal = vec![0.0; self.dimensions];
                    normal[face_axis(face)] = face_orientation(face);
                    *tags = tagger(&cell.face_center(face), &normal);
                }
            }
        }
        self
    }
}

/// Checks that every boundary face of the mesh is covered by exactly one of the given tags.
pub fn check_bc_coverage(mesh: &BoxMesh, bc_tags: &[BoundaryTag]) -> Result<(), OperatorError> {
    let mut num_uncovered = 0;
    let mut uncovered_tags = BTreeSet::new();
    let mut num_multiply_covered = 0;
    let mut multiply_covering_tags = BTreeSet::new();

    for face in mesh.boundary_faces() {
        let covering: Vec<_> = bc_tags.iter().filter(|tag| face.has_tag(tag)).collect();
        match covering.len() {
            0 => {
                num_uncovered += 1;
                uncovered_tags.extend(face.tags.iter().cloned());
            }
            1 => {}
            _ => {
                num_multiply_covered += 1;
                multiply_covering_tags.extend(covering.into_iter().cloned());
            }
        }
    }

    if num_uncovered > 0 {
        Err(OperatorError::UncoveredBoundary {
            num_faces: num_uncovered,
            tags: uncovered_tags.into_iter().collect(),
        })
    } else if num_multiply_covered > 0 {
        Err(OperatorError::MultiplyCoveredBoundary {
            num_faces: num_multiply_covered,
            tags: multiply_covering_tags.into_iter().collect(),
        })
    } else {
        Ok(())
    }
}
