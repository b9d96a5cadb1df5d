//! Matrix-free linear operators.
use nalgebra::base::constraint::AreMultipliable;
use nalgebra::constraint::{DimEq, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, Dim, Dyn, Matrix, RealField, Scalar, U1};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;

/// A linear map `y = A x` on `R^n`.
///
/// Implementations overwrite `y` completely.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<T, A> LinearOperator<T> for &A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        (**self).apply(y, x)
    }
}

impl<T, R, C, S> LinearOperator<T> for Matrix<T, R, C, S>
where
    T: Scalar + One + Zero + ClosedMul + ClosedAdd,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
    ShapeConstraint: DimEq<Dyn, R> + DimEq<C, Dyn> + AreMultipliable<R, C, Dyn, U1>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// The operator `y = -A x`.
///
/// Discrete Laplacians are negative definite; negating them gives an operator that
/// [`ConjugateGradient`](crate::cg::ConjugateGradient) accepts.
#[derive(Debug, Clone, Copy)]
pub struct NegatedOperator<A>(pub A);

impl<T, A> LinearOperator<T> for NegatedOperator<A>
where
    T: RealField,
    A: LinearOperator<T>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.0.apply((&mut y).into(), x)?;
        y.neg_mut();
        Ok(())
    }
}

/// Multiplication by a diagonal matrix, e.g. a Jacobi preconditioner.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalOperator<T: Scalar> {
    diagonal: DVector<T>,
}

impl<T: RealField> DiagonalOperator<T> {
    pub fn new(diagonal: DVector<T>) -> Self {
        Self { diagonal }
    }

    /// The Jacobi preconditioner `diag(A)⁻¹` of a matrix with non-zero diagonal.
    ///
    /// Rows without a stored diagonal entry get the factor one.
    pub fn jacobi(matrix: &CsrMatrix<T>) -> Self {
        let diagonal = DVector::from_fn(matrix.nrows(), |i, _| {
            let row = matrix.row(i);
            row.col_indices()
                .iter()
                .zip(row.values())
                .find(|(j, _)| **j == i)
                .map(|(_, a_ii)| a_ii.clone())
                .filter(|a_ii| !a_ii.is_zero())
                .map(|a_ii| T::one() / a_ii)
                .unwrap_or_else(T::one)
        });
        Self { diagonal }
    }

    pub fn diagonal(&self) -> &DVector<T> {
        &self.diagonal
    }
}

impl<T: RealField> LinearOperator<T> for DiagonalOperator<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if x.len() != self.diagonal.len() {
            return Err(format!(
                "Diagonal operator of size {} applied to vector of length {}",
                self.diagonal.len(),
                x.len()
            )
            .into());
        }
        y.copy_from(&x);
        y.component_mul_assign(&self.diagonal);
        Ok(())
    }
}
