//! Iterative solution of linear systems given by bound operators.
use eyre::eyre;
use hedge_sparse::cg::{ConjugateGradient, RelativeResidualCriterion};
use hedge_sparse::{LinearOperator, NegatedOperator};
use log::info;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Solves `A x = b` for a symmetric negative definite operator `A` with conjugate gradients.
///
/// Discrete Laplacians are negative definite, so the solver works with `-A` and `-b`.
/// The iteration stops once the residual relative to `b` falls below `tol`.
pub fn solve_negative_definite(
    operator: &impl LinearOperator<f64>,
    rhs: &DVector<f64>,
    tol: f64,
    max_iter: Option<usize>,
) -> eyre::Result<DVector<f64>> {
    let negated_rhs = -rhs;
    let mut solver =
        ConjugateGradient::new(NegatedOperator(operator)).with_stopping_criterion(RelativeResidualCriterion::new(tol));
    if let Some(max_iter) = max_iter {
        solver = solver.with_max_iter(max_iter);
    }
    let (solution, output) = solver
        .solve(&negated_rhs)
        .map_err(|err| eyre!("Failed to solve negative definite system: {}", err))?;
    info!(
        "CG converged in {} iterations for {} unknowns (residual {:.3e})",
        output.num_iterations,
        rhs.len(),
        output.residual_norm
    );
    Ok(solution)
}

/// Assembles the matrix of a linear operator on `R^n` by applying it to unit vectors.
///
/// Entries that are exactly zero are not stored.
pub fn assemble_operator_matrix(operator: &impl LinearOperator<f64>, n: usize) -> eyre::Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(n, n);
    let mut unit = DVector::zeros(n);
    let mut column = DVector::zeros(n);
    for j in 0..n {
        unit[j] = 1.0;
        operator
            .apply((&mut column).into(), (&unit).into())
            .map_err(|err| eyre!("Failed to apply operator to unit vector {}: {}", j, err))?;
        unit[j] = 0.0;
        for (i, &value) in column.iter().enumerate() {
            if value != 0.0 {
                coo.push(i, j, value);
            }
        }
    }
    Ok(CsrMatrix::from(&coo))
}
