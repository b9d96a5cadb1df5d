//! Basic procedural mesh generation routines.
use crate::mesh::{AxisAlignedBox, BoundaryTag, BoxMesh, FaceNeighbor};

const AXIS_NAMES: [char; 3] = ['x', 'y', 'z'];

/// The tag given to boundary faces on the lower or upper side of an axis, e.g. `-x` or `+y`.
pub fn side_tag(axis: usize, upper: bool) -> BoundaryTag {
    let sign = if upper { '+' } else { '-' };
    BoundaryTag::Named(format!("{}{}", sign, AXIS_NAMES[axis]))
}

pub fn create_unit_interval_uniform_mesh(cells: usize) -> BoxMesh {
    create_rectangular_uniform_box_mesh(&[0.0], &[1.0], &[cells], &[false])
}

pub fn create_unit_square_uniform_mesh(cells_per_dim: usize) -> BoxMesh {
    create_rectangular_uniform_box_mesh(&[0.0, 0.0], &[1.0, 1.0], &[cells_per_dim; 2], &[false; 2])
}

pub fn create_unit_cube_uniform_mesh(cells_per_dim: usize) -> BoxMesh {
    create_rectangular_uniform_box_mesh(&[0.0; 3], &[1.0; 3], &[cells_per_dim; 3], &[false; 3])
}

/// Unit box which is periodic along every axis, and therefore has no boundary.
pub fn create_periodic_unit_box_mesh(dimensions: usize, cells_per_dim: usize) -> BoxMesh {
    create_rectangular_uniform_box_mesh(
        &vec![0.0; dimensions],
        &vec![1.0; dimensions],
        &vec![cells_per_dim; dimensions],
        &vec![true; dimensions],
    )
}

/// Generates a uniform mesh of the box `[lower, upper]` with the given number of cells per axis.
///
/// Cells are numbered with axis 0 varying fastest. Boundary faces are tagged by their side
/// (see [`side_tag`]). Periodic axes wrap around and have no boundary faces.
///
/// # Panics
///
/// Panics if the input slices have different lengths, if the dimension is not 1, 2 or 3,
/// if any axis has zero cells or if `lower[a] >= upper[a]` for some axis.
pub fn create_rectangular_uniform_box_mesh(
    lower: &[f64],
    upper: &[f64],
    cells_per_axis: &[usize],
    periodic: &[bool],
) -> BoxMesh {
    let dimensions = lower.len();
    assert!((1..=3).contains(&dimensions), "Only 1, 2 or 3 dimensions are supported");
    assert_eq!(upper.len(), dimensions);
    assert_eq!(cells_per_axis.len(), dimensions);
    assert_eq!(periodic.len(), dimensions);
    assert!(cells_per_axis.iter().all(|&n| n > 0), "Every axis needs at least one cell");

    let num_cells: usize = cells_per_axis.iter().product();
    let strides: Vec<usize> = (0..dimensions)
        .map(|axis| cells_per_axis[..axis].iter().product())
        .collect();
    let cell_index = |multi_index: &[usize]| -> usize { multi_index.iter().zip(&strides).map(|(i, s)| i * s).sum() };
    let coordinate = |axis: usize, i: usize| {
        let t = i as f64 / cells_per_axis[axis] as f64;
        (1.0 - t) * lower[axis] + t * upper[axis]
    };

    let mut cells = Vec::with_capacity(num_cells);
    let mut neighbors = Vec::with_capacity(num_cells);
    for cell in 0..num_cells {
        let multi_index: Vec<usize> = (0..dimensions)
            .map(|axis| (cell / strides[axis]) % cells_per_axis[axis])
            .collect();
        let min = (0..dimensions)
            .map(|axis| coordinate(axis, multi_index[axis]))
            .collect();
        let max = (0..dimensions)
            .map(|axis| coordinate(axis, multi_index[axis] + 1))
            .collect();
        cells.push(AxisAlignedBox::new(min, max));

        let mut cell_neighbors = Vec::with_capacity(2 * dimensions);
        for axis in 0..dimensions {
            let n = cells_per_axis[axis];
            let i = multi_index[axis];
            for upper_side in [false, true] {
                let at_boundary = if upper_side { i + 1 == n } else { i == 0 };
                let neighbor = if at_boundary && !periodic[axis] {
                    FaceNeighbor::Boundary {
                        tags: vec![side_tag(axis, upper_side)],
                    }
                } else {
                    let mut other = multi_index.clone();
                    other[axis] = if upper_side { (i + 1) % n } else { (i + n - 1) % n };
                    FaceNeighbor::Interior {
                        cell: cell_index(&other),
                        face: 2 * axis + usize::from(!upper_side),
                    }
                };
                cell_neighbors.push(neighbor);
            }
        }
        neighbors.push(cell_neighbors);
    }

    BoxMesh {
        dimensions,
        cells,
        neighbors,
    }
}
