use crate::integration_tests::{tag_all, tag_mixed};
use hedge::data::GivenFunction;
use hedge::discretization::Discretization;
use hedge::error::OperatorError;
use hedge::iterative::{assemble_operator_matrix, solve_negative_definite};
use hedge::mesh::procedural::{
    create_periodic_unit_box_mesh, create_unit_interval_uniform_mesh, create_unit_square_uniform_mesh,
};
use hedge::models::poisson::{DiffusionTensor, LaplacianOperatorBase, PoissonOperator};
use hedge::optemplate::compiler::FieldContext;
use hedge::second_order::LdgSecondDerivative;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// u = x^2 + xy + 3y^2 with Δu = 8.
fn quadratic(x: &DVector<f64>) -> f64 {
    x[0] * x[0] + x[0] * x[1] + 3.0 * x[1] * x[1]
}

/// Outward normal derivative of `quadratic` on the faces y = 0 and y = 1.
fn quadratic_normal_derivative(x: &DVector<f64>) -> f64 {
    let du_dy = x[0] + 6.0 * x[1];
    if x[1] < 0.5 {
        -du_dy
    } else {
        du_dy
    }
}

fn mixed_square_discretization(cells: usize, order: usize) -> Discretization {
    Discretization::new(tag_mixed(create_unit_square_uniform_mesh(cells)), order).unwrap()
}

#[test]
fn homogeneous_laplacian_is_exact_in_1d() {
    let mesh = tag_all(create_unit_interval_uniform_mesh(3), "dirichlet");
    let discretization = Discretization::new(mesh, 2).unwrap();
    let bound = PoissonOperator::new(1).bind(&discretization).unwrap();
    assert!(!bound.uses_mean_value_correction());

    let u = discretization.interpolate_volume_function(|x| x[0] * (1.0 - x[0]));
    let result = bound.op(&u).unwrap();
    let expected = -2.0 * discretization.mass_ones();
    assert_matrix_eq!(result, expected, comp = abs, tol = 1e-10);
}

#[test]
fn homogeneous_laplacian_is_exact_in_2d() {
    let mesh = tag_all(create_unit_square_uniform_mesh(2), "dirichlet");
    let discretization = Discretization::new(mesh, 2).unwrap();
    let bound = PoissonOperator::new(2).bind(&discretization).unwrap();

    let u = discretization.interpolate_volume_function(|x| x[0] * (1.0 - x[0]) * x[1] * (1.0 - x[1]));
    let laplacian_u = discretization
        .interpolate_volume_function(|x| -2.0 * x[1] * (1.0 - x[1]) - 2.0 * x[0] * (1.0 - x[0]));
    let result = bound.op(&u).unwrap();
    assert_matrix_eq!(result, discretization.apply_mass(&laplacian_u), comp = abs, tol = 1e-10);
}

#[test]
fn boundary_template_reproduces_laplacian_with_consistent_data() {
    let discretization = mixed_square_discretization(2, 2);
    let poisson = PoissonOperator::new(2);
    let template = poisson.op_template(false, None, None, None).unwrap();
    let compiled = discretization.compile(&[template]).unwrap();

    let dirichlet = poisson.dirichlet_tag();
    let neumann = poisson.neumann_tag();
    let u = quadratic.volume_interpolant(&discretization);
    let dir_bc = quadratic.boundary_interpolant(&discretization, dirichlet);
    let neu_bc = quadratic_normal_derivative.boundary_interpolant(&discretization, neumann);
    let context = FieldContext::new()
        .with_scalar("u", &u)
        .with_scalar("dir_bc", &dir_bc)
        .with_scalar("neu_bc", &neu_bc);

    let result = compiled.evaluate_single(&context).unwrap();
    let expected = 8.0 * discretization.mass_ones();
    assert_matrix_eq!(result, expected, comp = abs, tol = 1e-10);
}

#[test]
fn inverse_mass_template_yields_nodal_laplacian() {
    let discretization = mixed_square_discretization(2, 2);
    let poisson = PoissonOperator::new(2);
    let template = poisson.op_template(true, None, None, None).unwrap();
    let compiled = discretization.compile(&[template]).unwrap();

    let u = quadratic.volume_interpolant(&discretization);
    let dir_bc = quadratic.boundary_interpolant(&discretization, poisson.dirichlet_tag());
    let neu_bc = quadratic_normal_derivative.boundary_interpolant(&discretization, poisson.neumann_tag());
    let context = FieldContext::new()
        .with_scalar("u", &u)
        .with_scalar("dir_bc", &dir_bc)
        .with_scalar("neu_bc", &neu_bc);

    let result = compiled.evaluate_single(&context).unwrap();
    assert_matrix_eq!(result, DVector::repeat(u.len(), 8.0), comp = abs, tol = 1e-9);
}

#[test]
fn mixed_problem_round_trip() {
    let discretization = mixed_square_discretization(2, 2);
    let poisson = PoissonOperator::new(2)
        .with_dirichlet("dirichlet", quadratic)
        .with_neumann("neumann", quadratic_normal_derivative);
    let bound = poisson.bind(&discretization).unwrap();
    assert!(!bound.uses_mean_value_correction());

    let u_exact = discretization.interpolate_volume_function(quadratic);
    let f = DVector::repeat(discretization.num_nodes(), 8.0);
    let rhs = bound.prepare_rhs(&f).unwrap();
    assert_matrix_eq!(bound.op(&u_exact).unwrap(), rhs, comp = abs, tol = 1e-10);

    let solution = solve_negative_definite(&bound, &rhs, 1e-12, Some(1000)).unwrap();
    assert_matrix_eq!(solution, u_exact, comp = abs, tol = 1e-6);
}

#[test]
fn pure_neumann_problem_uses_mean_value_correction() {
    let mesh = tag_all(create_unit_interval_uniform_mesh(4), "neumann");
    let discretization = Discretization::new(mesh, 3).unwrap();
    let bound = PoissonOperator::new(1).bind(&discretization).unwrap();
    assert!(bound.uses_mean_value_correction());

    // u' vanishes at both ends and the mean value of u is 1/2
    let u = discretization.interpolate_volume_function(|x| x[0] * x[0] * (3.0 - 2.0 * x[0]));
    let f = discretization.interpolate_volume_function(|x| 6.0 - 12.0 * x[0]);
    assert_scalar_eq!(discretization.integral(&u), 0.5, comp = abs, tol = 1e-14);

    let c = 0.75;
    let shifted = u.add_scalar(c);
    let expected = bound.op(&u).unwrap() - c * discretization.mass_ones();
    assert_matrix_eq!(bound.op(&shifted).unwrap(), expected, comp = abs, tol = 1e-10);

    let rhs = bound.prepare_rhs(&f).unwrap();
    assert_matrix_eq!(rhs, discretization.apply_mass(&f), comp = abs, tol = 1e-14);
    let zero_mean = u.add_scalar(-0.5);
    assert_matrix_eq!(bound.op(&zero_mean).unwrap(), rhs, comp = abs, tol = 1e-9);

    let solution = solve_negative_definite(&bound, &rhs, 1e-12, Some(1000)).unwrap();
    assert_matrix_eq!(solution, zero_mean, comp = abs, tol = 1e-6);
    assert_scalar_eq!(discretization.integral(&solution), 0.0, comp = abs, tol = 1e-7);
}

#[test]
fn periodic_problem_uses_mean_value_correction() {
    let discretization = Discretization::new(create_periodic_unit_box_mesh(2, 3), 3).unwrap();
    let bound = PoissonOperator::new(2).bind(&discretization).unwrap();
    assert!(bound.uses_mean_value_correction());

    let n = discretization.num_nodes();
    let dense = DMatrix::from(&assemble_operator_matrix(&bound, n).unwrap());
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-9);

    let u = discretization.interpolate_volume_function(|x| (2.0 * PI * x[0]).sin() * (2.0 * PI * x[1]).cos());
    let c = -1.25;
    let expected = bound.op(&u).unwrap() - c * discretization.mass_ones();
    assert_matrix_eq!(bound.op(&u.add_scalar(c)).unwrap(), expected, comp = abs, tol = 1e-10);

    let f = -8.0 * PI * PI * &u;
    let rhs = bound.prepare_rhs(&f).unwrap();
    assert_matrix_eq!(rhs, discretization.apply_mass(&f), comp = abs, tol = 1e-12);
    let solution = solve_negative_definite(&bound, &rhs, 1e-12, Some(2000)).unwrap();
    assert_matrix_eq!(solution, u, comp = abs, tol = 1e-2);
    assert_scalar_eq!(discretization.integral(&solution), 0.0, comp = abs, tol = 1e-6);
}

#[test]
fn bound_operator_is_symmetric_negative_definite() {
    let discretization = mixed_square_discretization(2, 2);
    let bound = PoissonOperator::new(2).bind(&discretization).unwrap();
    let n = discretization.num_nodes();
    assert_eq!(bound.shape(), (n, n));
    assert_eq!(bound.dtype(), "f64");

    let matrix = assemble_operator_matrix(&bound, n).unwrap();
    let dense = DMatrix::from(&matrix);
    assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-9);
    assert!(dense.diagonal().iter().all(|&d| d < 0.0));
}

#[test]
fn scheme_parameters_are_used() {
    let discretization = mixed_square_discretization(2, 2);
    let u = discretization.interpolate_volume_function(|x| (3.0 * x[0]).sin() * x[1]);

    let default_op = PoissonOperator::new(2).bind(&discretization).unwrap().op(&u).unwrap();
    let central_op = PoissonOperator::new(2)
        .with_scheme(LdgSecondDerivative::default().with_beta(0.0))
        .bind(&discretization)
        .unwrap()
        .op(&u)
        .unwrap();
    assert!((default_op - central_op).norm() > 1e-6);
}

#[test]
fn varying_diffusion_tensor_matches_constant_tensor() {
    let discretization = mixed_square_discretization(2, 3);
    let u = discretization.interpolate_volume_function(|x| (2.0 * x[0]).cos() + x[0] * x[1]);

    let constant = PoissonOperator::new(2).bind(&discretization).unwrap();
    let varying = PoissonOperator::new(2)
        .with_diffusion_tensor(DiffusionTensor::varying(|_| DMatrix::identity(2, 2)))
        .bind(&discretization)
        .unwrap();
    assert_matrix_eq!(varying.op(&u).unwrap(), constant.op(&u).unwrap(), comp = abs, tol = 1e-12);

    let interpolant = DiffusionTensor::varying(|x| DMatrix::from_element(2, 2, x[0]))
        .volume_interpolant(&discretization)
        .unwrap()
        .unwrap();
    assert_eq!(interpolant.len(), 4);
    assert_eq!(interpolant[3], discretization.interpolate_volume_function(|x| x[0]));
    assert!(DiffusionTensor::identity(2)
        .volume_interpolant(&discretization)
        .unwrap()
        .is_none());
}

#[test]
fn bind_validates_boundary_coverage() {
    // Only the side tags -x, +x, -y, +y are present
    let discretization = Discretization::new(create_unit_square_uniform_mesh(2), 1).unwrap();
    let result = PoissonOperator::new(2).bind(&discretization);
    assert!(matches!(result, Err(OperatorError::UncoveredBoundary { num_faces: 8, .. })));

    let result = PoissonOperator::new(2)
        .with_dirichlet("-x", |_: &DVector<f64>| 0.0)
        .with_neumann(hedge::mesh::BoundaryTag::All, |_: &DVector<f64>| 0.0)
        .bind(&discretization);
    assert!(matches!(
        result,
        Err(OperatorError::MultiplyCoveredBoundary { num_faces: 2, .. })
    ));

    let result = PoissonOperator::new(3).bind(&discretization);
    assert_eq!(
        result.err(),
        Some(OperatorError::DimensionMismatch {
            operator: 3,
            discretization: 2
        })
    );
}

#[test]
fn bind_rejects_diffusion_tensor_of_wrong_size() {
    let discretization = mixed_square_discretization(2, 1);
    let mismatch = Some(OperatorError::DimensionMismatch {
        operator: 1,
        discretization: 2,
    });

    let result = PoissonOperator::new(2)
        .with_diffusion_tensor(DiffusionTensor::Constant(DMatrix::identity(1, 1)))
        .bind(&discretization);
    assert_eq!(result.err(), mismatch);

    let result = PoissonOperator::new(2)
        .with_diffusion_tensor(DiffusionTensor::varying(|_| DMatrix::identity(1, 1)))
        .bind(&discretization);
    assert_eq!(result.err(), mismatch);

    let result = PoissonOperator::new(2)
        .with_diffusion_tensor(DiffusionTensor::Constant(DMatrix::zeros(2, 3)))
        .op_template(false, None, None, None);
    assert_eq!(
        result.err(),
        Some(OperatorError::DimensionMismatch {
            operator: 3,
            discretization: 2
        })
    );
}
