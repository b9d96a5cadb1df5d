use hedge::element::TensorProductElement;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};

fn nodal_values(element: &TensorProductElement, f: impl Fn(&[f64]) -> f64) -> DVector<f64> {
    DVector::from_fn(element.num_nodes(), |node, _| f(&element.reference_coordinates(node)))
}

#[test]
fn element_sizes() {
    let element = TensorProductElement::new(3, 2).unwrap();
    assert_eq!(element.dimensions(), 3);
    assert_eq!(element.order(), 2);
    assert_eq!(element.nodes_per_axis(), 3);
    assert_eq!(element.num_nodes(), 27);
    assert_eq!(element.num_faces(), 6);
    assert_eq!(element.num_face_nodes(), 9);
    assert_eq!(element.mass().shape(), (27, 27));
    assert_eq!(element.face_mass().shape(), (9, 9));
}

#[test]
fn element_rejects_invalid_parameters() {
    assert!(TensorProductElement::new(2, 0).is_err());
    assert!(TensorProductElement::new(0, 2).is_err());
    assert!(TensorProductElement::new(4, 2).is_err());
}

#[test]
fn lobatto_nodes_include_endpoints() {
    let element = TensorProductElement::new(1, 4).unwrap();
    let nodes = element.nodes_1d();
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[0], -1.0);
    assert_eq!(nodes[4], 1.0);
    assert!(nodes.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn mass_matrix_integrates_polynomials_exactly() {
    for dimensions in 1..=3 {
        let element = TensorProductElement::new(dimensions, 3).unwrap();
        let ones = DVector::repeat(element.num_nodes(), 1.0);
        let volume = ones.dot(&(element.mass() * &ones));
        assert_scalar_eq!(volume, 2f64.powi(dimensions as i32), comp = abs, tol = 1e-12);

        // Integral of x^3 * x^3 over [-1, 1]^d is 2/7 * 2^(d-1)
        let u = nodal_values(&element, |r| r[0].powi(3));
        let integral = u.dot(&(element.mass() * &u));
        let expected = 2.0 / 7.0 * 2f64.powi(dimensions as i32 - 1);
        assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-12);
    }
}

#[test]
fn inverse_mass_inverts_mass() {
    let element = TensorProductElement::new(2, 3).unwrap();
    let product = element.inverse_mass() * element.mass();
    let identity = DMatrix::identity(element.num_nodes(), element.num_nodes());
    assert_matrix_eq!(product, identity, comp = abs, tol = 1e-10);
}

#[test]
fn differentiation_is_exact_for_polynomials() {
    let element = TensorProductElement::new(2, 2).unwrap();
    let u = nodal_values(&element, |r| r[0] * r[0] * r[1]);
    let du_dx = nodal_values(&element, |r| 2.0 * r[0] * r[1]);
    let du_dy = nodal_values(&element, |r| r[0] * r[0]);
    assert_matrix_eq!(element.differentiation(0) * &u, du_dx, comp = abs, tol = 1e-12);
    assert_matrix_eq!(element.differentiation(1) * &u, du_dy, comp = abs, tol = 1e-12);
}

#[test]
fn stiffness_satisfies_summation_by_parts() {
    let element = TensorProductElement::new(1, 5).unwrap();
    let s = element.stiffness(0);
    let sum = s + element.stiffness_transpose(0);
    let mut boundary = DMatrix::zeros(6, 6);
    boundary[(0, 0)] = -1.0;
    boundary[(5, 5)] = 1.0;
    assert_matrix_eq!(sum, boundary, comp = abs, tol = 1e-12);
}

#[test]
fn face_nodes_follow_tensor_ordering() {
    let element = TensorProductElement::new(2, 2).unwrap();
    assert_eq!(element.face_nodes(0), &[0, 3, 6]);
    assert_eq!(element.face_nodes(1), &[2, 5, 8]);
    assert_eq!(element.face_nodes(2), &[0, 1, 2]);
    assert_eq!(element.face_nodes(3), &[6, 7, 8]);
    assert_eq!(element.tensor_index(5), vec![2, 1]);
    assert_eq!(element.reference_coordinates(8), vec![1.0, 1.0]);
}
