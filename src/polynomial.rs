//! Orthonormal Jacobi polynomials on the reference interval `[-1, 1]`.
//!
//! The nodal reference element is built from a Vandermonde matrix of orthonormal Legendre
//! polynomials, which makes the mass matrix `(V Vᵀ)⁻¹` exact for the polynomial space.
use nalgebra::DMatrix;

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// Evaluates the normalized Jacobi polynomial $P_n^{(\alpha, \beta)}(x)$.
///
/// The polynomials are orthonormal on `[-1, 1]` with respect to the weight
/// $(1 - x)^\alpha (1 + x)^\beta$.
pub fn jacobi(alpha: u32, beta: u32, n: usize, x: f64) -> f64 {
    let a = f64::from(alpha);
    let b = f64::from(beta);

    let gamma0 = 2f64.powf(a + b + 1.0) / (a + b + 1.0) * factorial(alpha) * factorial(beta)
        / factorial(alpha + beta);
    let p0 = 1.0 / gamma0.sqrt();
    if n == 0 {
        return p0;
    }

    let gamma1 = (a + 1.0) * (b + 1.0) / (a + b + 3.0) * gamma0;
    let p1 = ((a + b + 2.0) * x / 2.0 + (a - b) / 2.0) / gamma1.sqrt();
    if n == 1 {
        return p1;
    }

    // Three-term recurrence for the normalized polynomials
    let mut a_old = 2.0 / (2.0 + a + b) * ((a + 1.0) * (b + 1.0) / (a + b + 3.0)).sqrt();
    let (mut p_prev, mut p) = (p0, p1);
    for i in 1..n {
        let i = i as f64;
        let h1 = 2.0 * i + a + b;
        let a_new = 2.0 / (h1 + 2.0)
            * ((i + 1.0) * (i + 1.0 + a + b) * (i + 1.0 + a) * (i + 1.0 + b) / (h1 + 1.0) / (h1 + 3.0)).sqrt();
        let b_new = -(a * a - b * b) / h1 / (h1 + 2.0);
        let p_next = (-a_old * p_prev + (x - b_new) * p) / a_new;
        p_prev = p;
        p = p_next;
        a_old = a_new;
    }
    p
}

/// Evaluates the derivative of the normalized Jacobi polynomial $P_n^{(\alpha, \beta)}$ at `x`.
pub fn grad_jacobi(alpha: u32, beta: u32, n: usize, x: f64) -> f64 {
    if n == 0 {
        0.0
    } else {
        let scale = (n as f64 * (n as f64 + f64::from(alpha + beta) + 1.0)).sqrt();
        scale * jacobi(alpha + 1, beta + 1, n - 1, x)
    }
}

/// Evaluates the orthonormal Legendre polynomial of degree `n` at `x`.
pub fn legendre(n: usize, x: f64) -> f64 {
    jacobi(0, 0, n, x)
}

/// The Vandermonde matrix `V_ij = P_j(r_i)` of orthonormal Legendre polynomials
/// up to the given degree.
pub fn vandermonde(points: &[f64], degree: usize) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), degree + 1, |i, j| legendre(j, points[i]))
}

/// The derivative Vandermonde matrix `V_ij = P_j'(r_i)`.
pub fn grad_vandermonde(points: &[f64], degree: usize) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), degree + 1, |i, j| grad_jacobi(0, 0, j, points[i]))
}
