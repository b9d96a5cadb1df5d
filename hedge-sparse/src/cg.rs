//! Preconditioned conjugate gradients for symmetric positive definite operators.
use crate::operator::{IdentityOperator, LinearOperator};
use core::fmt;
use num::{One, Zero};
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use std::error::Error;

/// Convergence state handed to a [`StoppingCriterion`] before each iteration.
#[derive(Debug)]
pub struct CgStatus<'a, T: Scalar> {
    pub iteration: usize,
    pub rhs_norm: T,
    /// The recursively updated residual, which may drift from `b - Ax` for
    /// ill-conditioned problems.
    pub residual: DVectorView<'a, T>,
}

pub trait StoppingCriterion<T: Scalar> {
    fn has_converged(&self, status: &CgStatus<T>) -> bool;
}

/// Stops once `||r|| <= tol ||b||`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeResidualCriterion<T> {
    tol: T,
}

impl<T> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<T: RealField> StoppingCriterion<T> for RelativeResidualCriterion<T> {
    fn has_converged(&self, status: &CgStatus<T>) -> bool {
        status.residual.norm() <= self.tol.clone() * status.rhs_norm.clone()
    }
}

/// Stops once `||r|| <= tol`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteResidualCriterion<T> {
    tol: T,
}

impl<T> AbsoluteResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl<T: RealField> StoppingCriterion<T> for AbsoluteResidualCriterion<T> {
    fn has_converged(&self, status: &CgStatus<T>) -> bool {
        status.residual.norm() <= self.tol
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => write!(f, "error applying operator: {err}"),
            Self::PreconditionerError(err) => write!(f, "error applying preconditioner: {err}"),
            Self::IndefiniteOperator => write!(f, "operator is not positive definite"),
            Self::IndefinitePreconditioner => write!(f, "preconditioner is not positive definite"),
            Self::MaxIterationsReached { max_iter } => write!(f, "reached maximum of {max_iter} iterations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CgOutput<T> {
    /// Number of updates made to the solution vector.
    pub num_iterations: usize,
    /// Norm of the last recursively updated residual.
    pub residual_norm: T,
}

#[derive(Debug)]
pub struct SolveError<T> {
    pub output: CgOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CG failed after {} iterations: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl<T: fmt::Debug> Error for SolveError<T> {}

/// Buffers reused across solves with the same solver.
#[derive(Debug, Clone)]
struct Workspace<T: Scalar> {
    residual: DVector<T>,
    preconditioned: DVector<T>,
    direction: DVector<T>,
    operator_direction: DVector<T>,
}

impl<T: RealField> Workspace<T> {
    fn empty() -> Self {
        Self {
            residual: DVector::zeros(0),
            preconditioned: DVector::zeros(0),
            direction: DVector::zeros(0),
            operator_direction: DVector::zeros(0),
        }
    }

    fn resize(&mut self, n: usize) {
        for buffer in [
            &mut self.residual,
            &mut self.preconditioned,
            &mut self.direction,
            &mut self.operator_direction,
        ] {
            if buffer.len() != n {
                *buffer = DVector::zeros(n);
            }
        }
    }
}

/// Conjugate gradient solver for `A x = b`, with `A` and the preconditioner `P`
/// symmetric positive definite.
///
/// ```ignore
/// let output = ConjugateGradient::new(&a)
///     .with_stopping_criterion(RelativeResidualCriterion::new(1e-10))
///     .solve_with_guess(&b, &mut x)?;
/// ```
#[derive(Debug)]
pub struct ConjugateGradient<T: Scalar, A, P = IdentityOperator, C = RelativeResidualCriterion<T>> {
    operator: A,
    preconditioner: P,
    criterion: C,
    max_iter: Option<usize>,
    workspace: Workspace<T>,
}

impl<A> ConjugateGradient<f64, A> {
    /// Solver with no preconditioner and the default relative tolerance.
    pub fn new(operator: A) -> Self {
        Self {
            operator,
            preconditioner: IdentityOperator,
            criterion: RelativeResidualCriterion::default(),
            max_iter: None,
            workspace: Workspace::empty(),
        }
    }
}

impl<T: RealField, A, P, C> ConjugateGradient<T, A, P, C> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<T, A, P2, C> {
        ConjugateGradient {
            operator: self.operator,
            preconditioner,
            criterion: self.criterion,
            max_iter: self.max_iter,
            workspace: self.workspace,
        }
    }

    pub fn with_stopping_criterion<C2>(self, criterion: C2) -> ConjugateGradient<T, A, P, C2> {
        ConjugateGradient {
            operator: self.operator,
            preconditioner: self.preconditioner,
            criterion,
            max_iter: self.max_iter,
            workspace: self.workspace,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<T, A, P, C> ConjugateGradient<T, A, P, C>
where
    T: RealField,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    C: StoppingCriterion<T>,
{
    /// Solves starting from the initial guess in `x`, which is overwritten by the solution.
    ///
    /// # Panics
    ///
    /// Panics if `b` and `x` have different lengths.
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<CgOutput<T>, SolveError<T>> {
        let b = b.into();
        let mut x = x.into();
        assert_eq!(b.len(), x.len(), "Right-hand side and solution must have equal length");

        let rhs_norm = b.norm();
        let mut output = CgOutput {
            num_iterations: 0,
            residual_norm: rhs_norm.clone(),
        };
        if rhs_norm.is_zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        self.workspace.resize(x.len());
        let Workspace {
            residual: r,
            preconditioned: z,
            direction: p,
            operator_direction: ap,
        } = &mut self.workspace;
        let fail = |output: &CgOutput<T>, kind| SolveError {
            output: output.clone(),
            kind,
        };

        // r = b - Ax
        self.operator
            .apply((&mut *r).into(), (&x).into())
            .map_err(|err| fail(&output, SolveErrorKind::OperatorError(err)))?;
        r.neg_mut();
        *r += &b;

        self.preconditioner
            .apply((&mut *z).into(), (&*r).into())
            .map_err(|err| fail(&output, SolveErrorKind::PreconditionerError(err)))?;
        p.copy_from(&*z);
        let mut z_dot_r = z.dot(&*r);

        loop {
            output.residual_norm = r.norm();
            let status = CgStatus {
                iteration: output.num_iterations,
                rhs_norm: rhs_norm.clone(),
                residual: (&*r).into(),
            };
            if self.criterion.has_converged(&status) {
                return Ok(output);
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(fail(&output, SolveErrorKind::MaxIterationsReached { max_iter }));
                }
            }
            if z_dot_r <= T::zero() {
                return Err(fail(&output, SolveErrorKind::IndefinitePreconditioner));
            }

            self.operator
                .apply((&mut *ap).into(), (&*p).into())
                .map_err(|err| fail(&output, SolveErrorKind::OperatorError(err)))?;
            let p_dot_ap = p.dot(&*ap);
            if p_dot_ap <= T::zero() {
                return Err(fail(&output, SolveErrorKind::IndefiniteOperator));
            }

            let alpha = z_dot_r.clone() / p_dot_ap;
            x.axpy(alpha.clone(), &*p, T::one());
            r.axpy(-alpha, &*ap, T::one());
            output.num_iterations += 1;

            self.preconditioner
                .apply((&mut *z).into(), (&*r).into())
                .map_err(|err| fail(&output, SolveErrorKind::PreconditionerError(err)))?;
            let z_dot_r_next = z.dot(&*r);
            let beta = z_dot_r_next.clone() / z_dot_r;
            // p <- z + beta p
            p.axpy(T::one(), &*z, beta);
            z_dot_r = z_dot_r_next;
        }
    }

    /// Solves from a zero initial guess.
    pub fn solve(&mut self, b: &DVector<T>) -> Result<(DVector<T>, CgOutput<T>), SolveError<T>> {
        let mut x = DVector::zeros(b.len());
        let output = self.solve_with_guess(b, &mut x)?;
        Ok((x, output))
    }
}
