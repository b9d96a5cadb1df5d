use hedge::discretization::Discretization;
use hedge::mesh::procedural::{
    create_periodic_unit_box_mesh, create_rectangular_uniform_box_mesh, create_unit_cube_uniform_mesh,
    create_unit_square_uniform_mesh, side_tag,
};
use hedge::mesh::{AxisAlignedBox, BoundaryTag, BoxMesh, FaceNeighbor};
use hedge::optemplate::OperatorKind;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;
use proptest::prelude::*;

#[test]
fn node_and_boundary_counts() {
    let discretization = Discretization::new(create_unit_square_uniform_mesh(2), 3).unwrap();
    assert_eq!(discretization.dimensions(), 2);
    assert_eq!(discretization.order(), 3);
    assert_eq!(discretization.num_nodes(), 64);
    assert_eq!(discretization.nodes().len(), 64);
    assert_eq!(discretization.half_faces().len(), 16);
    assert_eq!(discretization.boundary(&BoundaryTag::All).num_nodes(), 32);
    assert_eq!(discretization.boundary(&BoundaryTag::All).faces().len(), 8);
    assert_eq!(discretization.boundary(&side_tag(0, false)).num_nodes(), 8);
    assert_eq!(discretization.boundary(&BoundaryTag::None).num_nodes(), 0);
    assert_eq!(discretization.boundary(&BoundaryTag::named("unknown")).num_nodes(), 0);

    let interior = discretization
        .half_faces()
        .iter()
        .filter(|half_face| half_face.neighbor.is_some())
        .count();
    assert_eq!(interior, 8);
}

#[test]
fn boundary_nodes_lie_on_the_boundary() {
    let discretization = Discretization::new(create_unit_cube_uniform_mesh(2), 2).unwrap();
    let tag = side_tag(2, true);
    let boundary = discretization.boundary(&tag);
    assert_eq!(boundary.num_nodes(), 4 * 9);
    for &node in boundary.nodes() {
        assert_eq!(discretization.nodes()[node][2], 1.0);
    }
}

#[test]
fn mass_ones_integrates_fields() {
    let mesh = create_rectangular_uniform_box_mesh(&[0.0, -1.0], &[2.0, 1.0], &[3, 2], &[false, false]);
    let discretization = Discretization::new(mesh, 2).unwrap();
    assert_scalar_eq!(discretization.mesh_volume(), 4.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(discretization.mass_ones().sum(), 4.0, comp = abs, tol = 1e-12);

    // Integral of x^2 y^2 over [0, 2] x [-1, 1]
    let u = discretization.interpolate_volume_function(|x| x[0] * x[0] * x[1] * x[1]);
    assert_scalar_eq!(discretization.integral(&u), 16.0 / 9.0, comp = abs, tol = 1e-12);
}

#[test]
fn differentiation_is_exact_in_physical_coordinates() {
    let mesh = create_rectangular_uniform_box_mesh(&[0.0, 0.0], &[3.0, 1.0], &[3, 4], &[false, false]);
    let discretization = Discretization::new(mesh, 2).unwrap();
    let u = discretization.interpolate_volume_function(|x| x[0] * x[0] + x[0] * x[1]);
    let du_dx = discretization.interpolate_volume_function(|x| 2.0 * x[0] + x[1]);
    let du_dy = discretization.interpolate_volume_function(|x| x[0]);

    assert_matrix_eq!(discretization.apply_differentiation(0, &u), du_dx, comp = abs, tol = 1e-11);
    assert_matrix_eq!(
        discretization.apply_operator(OperatorKind::Differentiation(1), &u),
        du_dy,
        comp = abs,
        tol = 1e-11
    );
}

#[test]
fn operators_are_consistent() {
    let discretization = Discretization::new(create_periodic_unit_box_mesh(2, 3), 2).unwrap();
    let u = discretization.interpolate_volume_function(|x| (x[0] * 3.0).sin() + x[1]);
    let v = discretization.interpolate_volume_function(|x| x[0] * x[1] - 0.5);

    let mass_inverse_mass = discretization.apply_mass(&discretization.apply_inverse_mass(&u));
    assert_matrix_eq!(mass_inverse_mass, u, comp = abs, tol = 1e-12);

    let stiffness = discretization.apply_stiffness(1, &u);
    let mass_differentiation = discretization.apply_mass(&discretization.apply_differentiation(1, &u));
    assert_matrix_eq!(stiffness, mass_differentiation, comp = abs, tol = 1e-12);

    let lhs = v.dot(&discretization.apply_stiffness(0, &u));
    let rhs = u.dot(&discretization.apply_stiffness_transpose(0, &v));
    assert_scalar_eq!(lhs, rhs, comp = abs, tol = 1e-12);
}

#[test]
fn boundarize_matches_boundary_interpolation() {
    let discretization = Discretization::new(create_unit_square_uniform_mesh(3), 2).unwrap();
    let f = |x: &DVector<f64>| x[0] - 3.0 * x[1];
    let volume = discretization.interpolate_volume_function(f);
    for tag in [BoundaryTag::All, side_tag(1, false)] {
        assert_eq!(
            discretization.boundarize_volume_field(&volume, &tag),
            discretization.interpolate_boundary_function(f, &tag)
        );
    }
}

#[test]
fn invalid_discretizations_are_rejected() {
    assert!(Discretization::new(create_unit_square_uniform_mesh(1), 0).is_err());

    // Two cells sharing a face of different extents
    let cells = vec![
        AxisAlignedBox::new(vec![0.0, 0.0], vec![1.0, 1.0]),
        AxisAlignedBox::new(vec![1.0, 0.0], vec![2.0, 2.0]),
    ];
    let boundary = || FaceNeighbor::Boundary { tags: vec![] };
    let neighbors = vec![
        vec![boundary(), FaceNeighbor::Interior { cell: 1, face: 0 }, boundary(), boundary()],
        vec![FaceNeighbor::Interior { cell: 0, face: 1 }, boundary(), boundary(), boundary()],
    ];
    let mesh = BoxMesh::from_cells_and_neighbors(2, cells, neighbors).unwrap();
    assert!(Discretization::new(mesh, 1).is_err());
}

proptest! {
    #[test]
    fn mass_ones_sums_to_mesh_volume(
        extents in prop::collection::vec(0.1f64..3.0, 1..=3),
        cells in 1usize..4,
        order in 1usize..4,
    ) {
        let dimensions = extents.len();
        let mesh = create_rectangular_uniform_box_mesh(
            &vec![-1.0; dimensions],
            &extents.iter().map(|e| e - 1.0).collect::<Vec<_>>(),
            &vec![cells; dimensions],
            &vec![false; dimensions],
        );
        let discretization = Discretization::new(mesh, order).unwrap();
        let volume: f64 = extents.iter().product();
        prop_assert!((discretization.mass_ones().sum() - volume).abs() <= 1e-10 * volume.max(1.0));
        prop_assert!((discretization.mesh_volume() - volume).abs() <= 1e-10 * volume.max(1.0));
    }
}
