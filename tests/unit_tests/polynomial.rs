use hedge::polynomial::{grad_jacobi, jacobi, legendre, vandermonde};
use hedge::quadrature::integrate;
use hedge::quadrature::univariate::{gauss, gauss_lobatto};
use matrixcompare::assert_scalar_eq;

#[test]
fn jacobi_polynomials_are_orthonormal() {
    // Exact for polynomials of degree up to 23
    let rule = gauss(12);
    for (alpha, beta) in [(0, 0), (1, 1), (2, 0)] {
        let weight = |x: f64| (1.0 - x).powi(alpha as i32) * (1.0 + x).powi(beta as i32);
        for m in 0..6 {
            for n in 0..6 {
                let inner = integrate(&rule, |x| {
                    weight(x[0]) * jacobi(alpha, beta, m, x[0]) * jacobi(alpha, beta, n, x[0])
                });
                let expected = if m == n { 1.0 } else { 0.0 };
                assert_scalar_eq!(inner, expected, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn legendre_matches_closed_form() {
    for x in [-1.0, -0.7, 0.0, 0.3, 1.0] {
        assert_scalar_eq!(legendre(0, x), (0.5f64).sqrt(), comp = abs, tol = 1e-14);
        assert_scalar_eq!(legendre(1, x), (1.5f64).sqrt() * x, comp = abs, tol = 1e-14);
        let p2 = (2.5f64).sqrt() * 0.5 * (3.0 * x * x - 1.0);
        assert_scalar_eq!(legendre(2, x), p2, comp = abs, tol = 1e-14);
    }
}

#[test]
fn grad_jacobi_matches_finite_differences() {
    let h = 1e-6;
    for n in 0..8 {
        for x in [-0.9, -0.25, 0.1, 0.8] {
            let fd = (jacobi(0, 0, n, x + h) - jacobi(0, 0, n, x - h)) / (2.0 * h);
            assert_scalar_eq!(grad_jacobi(0, 0, n, x), fd, comp = abs, tol = 1e-6);
        }
    }
}

#[test]
fn vandermonde_on_lobatto_nodes_is_invertible() {
    for degree in 1..8 {
        let (_, points) = gauss_lobatto(degree + 1).unwrap();
        let nodes: Vec<f64> = points.iter().map(|p| p[0]).collect();
        let v = vandermonde(&nodes, degree);
        assert_eq!(v.shape(), (degree + 1, degree + 1));
        assert!(v.try_inverse().is_some());
    }
}
