use crate::integration_tests::tag_mixed;
use hedge::discretization::Discretization;
use hedge::iterative::{assemble_operator_matrix, solve_negative_definite};
use hedge::mesh::procedural::create_unit_square_uniform_mesh;
use hedge::models::poisson::{HelmholtzOperator, LaplacianOperatorBase, PoissonOperator};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

fn discretization() -> Discretization {
    Discretization::new(tag_mixed(create_unit_square_uniform_mesh(2)), 2).unwrap()
}

#[test]
fn helmholtz_with_zero_wave_number_equals_poisson() {
    let discretization = discretization();
    let poisson = PoissonOperator::new(2);
    let helmholtz = HelmholtzOperator::new(0.0, poisson.clone());
    assert_eq!(
        helmholtz.op_template(false, None, None, None).unwrap(),
        poisson.op_template(false, None, None, None).unwrap()
    );

    let u = discretization.interpolate_volume_function(|x| (x[0] - 0.3).powi(2) * x[1]);
    let poisson_result = poisson.bind(&discretization).unwrap().op(&u).unwrap();
    let helmholtz_result = helmholtz.bind(&discretization).unwrap().op(&u).unwrap();
    assert_eq!(helmholtz_result, poisson_result);
}

#[test]
fn helmholtz_adds_mass_term() {
    let discretization = discretization();
    let k = 2.0;
    let poisson = PoissonOperator::new(2);
    let helmholtz = HelmholtzOperator::new(k, poisson.clone());
    assert_eq!(helmholtz.k(), k);

    let u = discretization.interpolate_volume_function(|x| x[0] * x[1] + 1.0);
    let poisson_result = poisson.bind(&discretization).unwrap().op(&u).unwrap();
    let helmholtz_result = helmholtz.bind(&discretization).unwrap().op(&u).unwrap();
    let expected = poisson_result + k * k * discretization.apply_mass(&u);
    assert_matrix_eq!(helmholtz_result, expected, comp = abs, tol = 1e-10);
}

#[test]
fn helmholtz_round_trip() {
    // u = x^2 - y^2 is harmonic, so ∇²u + k² u = k² u
    let k = 1.5;
    let u_exact = |x: &DVector<f64>| x[0] * x[0] - x[1] * x[1];
    let normal_derivative = |x: &DVector<f64>| if x[1] < 0.5 { 2.0 * x[1] } else { -2.0 * x[1] };

    let discretization = discretization();
    let poisson = PoissonOperator::new(2)
        .with_dirichlet("dirichlet", u_exact)
        .with_neumann("neumann", normal_derivative);
    let bound = HelmholtzOperator::new(k, poisson).bind(&discretization).unwrap();

    let u = discretization.interpolate_volume_function(u_exact);
    let f = k * k * &u;
    let rhs = bound.prepare_rhs(&f).unwrap();
    assert_matrix_eq!(bound.op(&u).unwrap(), rhs, comp = abs, tol = 1e-10);

    // Small k keeps the operator negative definite
    let n = discretization.num_nodes();
    let matrix = DMatrix::from(&assemble_operator_matrix(&bound, n).unwrap());
    assert_matrix_eq!(matrix, matrix.transpose(), comp = abs, tol = 1e-9);
    let solution = solve_negative_definite(&bound, &rhs, 1e-12, Some(1000)).unwrap();
    assert_matrix_eq!(solution, u, comp = abs, tol = 1e-6);
}
