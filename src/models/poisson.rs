//! Operators for Poisson and Helmholtz problems.
use crate::data::{ConstantGivenFunction, GivenFunction};
use crate::discretization::Discretization;
use crate::error::OperatorError;
use crate::mesh::{check_bc_coverage, BoundaryTag};
use crate::optemplate::compiler::{CompiledOperator, FieldContext};
use crate::optemplate::{dot, make_vector_field, Expr};
use crate::second_order::{LdgSecondDerivative, SecondDerivativeScheme, SecondDerivativeTarget};
use hedge_sparse::LinearOperator;
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The coefficient `A` of the operator `∇·(A ∇u)`.
#[derive(Clone)]
pub enum DiffusionTensor {
    Constant(DMatrix<f64>),
    /// A matrix-valued function of position, interpolated at the nodes when bound.
    Varying(Arc<dyn Fn(&DVector<f64>) -> DMatrix<f64>>),
}

impl fmt::Debug for DiffusionTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(matrix) => f.debug_tuple("Constant").field(matrix).finish(),
            Self::Varying(_) => f.debug_tuple("Varying").finish_non_exhaustive(),
        }
    }
}

impl DiffusionTensor {
    pub fn identity(dimensions: usize) -> Self {
        Self::Constant(DMatrix::identity(dimensions, dimensions))
    }

    pub fn varying(tensor: impl Fn(&DVector<f64>) -> DMatrix<f64> + 'static) -> Self {
        Self::Varying(Arc::new(tensor))
    }

    /// Applies the tensor to a vector of templates.
    ///
    /// A varying tensor is represented by the vector field `diffusion` with `d²` components
    /// in row-major order.
    fn apply(&self, v: &[Expr]) -> Vec<Expr> {
        let d = v.len();
        match self {
            Self::Constant(matrix) => (0..d)
                .map(|i| Expr::sum((0..d).map(|j| matrix[(i, j)] * v[j].clone())))
                .collect(),
            Self::Varying(_) => {
                let components = make_vector_field("diffusion", d * d);
                components
                    .chunks(d)
                    .map(|row| dot(row, v))
                    .collect()
            }
        }
    }

    /// Nodal interpolants of the `d²` tensor components in row-major order, or `None` for
    /// a constant tensor.
    ///
    /// Fails if the tensor is not `d×d` at some node.
    pub fn volume_interpolant(
        &self,
        discretization: &Discretization,
    ) -> Result<Option<Vec<DVector<f64>>>, OperatorError> {
        let d = discretization.dimensions();
        match self {
            Self::Constant(matrix) => {
                check_tensor_shape(matrix, d)?;
                Ok(None)
            }
            Self::Varying(tensor) => {
                let values: Vec<_> = discretization.nodes().iter().map(|x| tensor(x)).collect();
                for value in &values {
                    check_tensor_shape(value, d)?;
                }
                let components = (0..d * d)
                    .map(|k| DVector::from_iterator(values.len(), values.iter().map(|a| a[(k / d, k % d)])))
                    .collect();
                Ok(Some(components))
            }
        }
    }
}

fn check_tensor_shape(tensor: &DMatrix<f64>, dimensions: usize) -> Result<(), OperatorError> {
    match tensor.shape() {
        (rows, cols) if rows == dimensions && cols == dimensions => Ok(()),
        (rows, cols) => Err(OperatorError::DimensionMismatch {
            operator: if rows != dimensions { rows } else { cols },
            discretization: dimensions,
        }),
    }
}

/// Local discontinuous Galerkin discretization of the Poisson operator `∇·(A ∇u)`.
///
/// See P. Castillo et al., "Local discontinuous Galerkin methods for elliptic problems",
/// Communications in Numerical Methods in Engineering 18, no. 1 (2002): 69-75.
#[derive(Clone)]
pub struct PoissonOperator {
    dimensions: usize,
    diffusion_tensor: DiffusionTensor,
    dirichlet_bc: Arc<dyn GivenFunction>,
    dirichlet_tag: BoundaryTag,
    neumann_bc: Arc<dyn GivenFunction>,
    neumann_tag: BoundaryTag,
    scheme: Arc<dyn SecondDerivativeScheme>,
}

impl fmt::Debug for PoissonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoissonOperator")
            .field("dimensions", &self.dimensions)
            .field("diffusion_tensor", &self.diffusion_tensor)
            .field("dirichlet_tag", &self.dirichlet_tag)
            .field("neumann_tag", &self.neumann_tag)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl PoissonOperator {
    /// Poisson operator with identity diffusion, zero boundary data on the tags
    /// `dirichlet` and `neumann`, and the default LDG scheme.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            diffusion_tensor: DiffusionTensor::identity(dimensions),
            dirichlet_bc: Arc::new(ConstantGivenFunction::default()),
            dirichlet_tag: BoundaryTag::named("dirichlet"),
            neumann_bc: Arc::new(ConstantGivenFunction::default()),
            neumann_tag: BoundaryTag::named("neumann"),
            scheme: Arc::new(LdgSecondDerivative::default()),
        }
    }

    pub fn with_diffusion_tensor(self, diffusion_tensor: DiffusionTensor) -> Self {
        Self {
            diffusion_tensor,
            ..self
        }
    }

    pub fn with_dirichlet(self, tag: impl Into<BoundaryTag>, bc: impl GivenFunction + 'static) -> Self {
        Self {
            dirichlet_tag: tag.into(),
            dirichlet_bc: Arc::new(bc),
            ..self
        }
    }

    pub fn with_neumann(self, tag: impl Into<BoundaryTag>, bc: impl GivenFunction + 'static) -> Self {
        Self {
            neumann_tag: tag.into(),
            neumann_bc: Arc::new(bc),
            ..self
        }
    }

    pub fn with_scheme(self, scheme: impl SecondDerivativeScheme + 'static) -> Self {
        Self {
            scheme: Arc::new(scheme),
            ..self
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn diffusion_tensor(&self) -> &DiffusionTensor {
        &self.diffusion_tensor
    }

    pub fn dirichlet_tag(&self) -> &BoundaryTag {
        &self.dirichlet_tag
    }

    pub fn neumann_tag(&self) -> &BoundaryTag {
        &self.neumann_tag
    }

    pub fn dirichlet_bc(&self) -> &dyn GivenFunction {
        self.dirichlet_bc.as_ref()
    }

    pub fn neumann_bc(&self) -> &dyn GivenFunction {
        self.neumann_bc.as_ref()
    }

    /// Template of the discrete Laplacian `∇·(A ∇u)`.
    ///
    /// Missing `u`, `dir_bc` and `neu_bc` default to fields of the same names. With
    /// `apply_minv = false` the final inverse mass is omitted, which turns `M⁻¹ S u = f`
    /// into the symmetric system `S u = M f`.
    pub fn laplacian_template(
        &self,
        apply_minv: bool,
        u: Option<Expr>,
        dir_bc: Option<Expr>,
        neu_bc: Option<Expr>,
    ) -> Result<Expr, OperatorError> {
        let u = u.unwrap_or_else(|| Expr::field("u"));
        let dir_bc = dir_bc.unwrap_or_else(|| Expr::field("dir_bc"));
        let neu_bc = neu_bc.unwrap_or_else(|| Expr::field("neu_bc"));
        if let DiffusionTensor::Constant(matrix) = &self.diffusion_tensor {
            check_tensor_shape(matrix, self.dimensions)?;
        }
        let dirichlet_tags = [self.dirichlet_tag.clone()];
        let neumann_tags = [self.neumann_tag.clone()];

        // The strong form lets the gradient be reused unmodified as divergence operand
        let grad_target = SecondDerivativeTarget::new(self.dimensions, true, u.clone());
        let grad_bc_getter = |tag: &BoundaryTag| (*tag == self.dirichlet_tag).then(|| dir_bc.clone());
        let grad = self
            .scheme
            .grad(&grad_target, &grad_bc_getter, &dirichlet_tags, &neumann_tags)?;

        let div_target = SecondDerivativeTarget::new(
            self.dimensions,
            false,
            self.diffusion_tensor.apply(&grad.minv_all),
        )
        .with_primal(u);
        let div_bc_getter = |tag: &BoundaryTag| {
            if *tag == self.dirichlet_tag {
                Some(dir_bc.clone())
            } else if *tag == self.neumann_tag {
                Some(neu_bc.clone())
            } else {
                None
            }
        };
        let div = self
            .scheme
            .div(&div_target, &div_bc_getter, &dirichlet_tags, &neumann_tags)?;

        Ok(if apply_minv { div.minv_all } else { div.all })
    }

    /// Binds the operator to a discretization.
    ///
    /// Fails if the dimensions do not match or if the Dirichlet and Neumann tags do not
    /// cover every boundary face exactly once.
    pub fn bind<'a>(&self, discretization: &'a Discretization) -> Result<BoundPoissonOperator<'a>, OperatorError> {
        BoundPoissonOperator::new(self, discretization)
    }
}

/// Operators built on a discrete Laplacian.
pub trait LaplacianOperatorBase {
    fn poisson(&self) -> &PoissonOperator;

    /// Template of the operator. See [`PoissonOperator::laplacian_template`].
    fn op_template(
        &self,
        apply_minv: bool,
        u: Option<Expr>,
        dir_bc: Option<Expr>,
        neu_bc: Option<Expr>,
    ) -> Result<Expr, OperatorError> {
        self.poisson().laplacian_template(apply_minv, u, dir_bc, neu_bc)
    }
}

impl LaplacianOperatorBase for PoissonOperator {
    fn poisson(&self) -> &PoissonOperator {
        self
    }
}

/// The Helmholtz operator `∇·(A ∇u) + k² u`.
#[derive(Debug, Clone)]
pub struct HelmholtzOperator {
    k: f64,
    poisson: PoissonOperator,
}

impl HelmholtzOperator {
    pub fn new(k: f64, poisson: PoissonOperator) -> Self {
        Self { k, poisson }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn bind<'a>(&self, discretization: &'a Discretization) -> Result<BoundPoissonOperator<'a>, OperatorError> {
        BoundPoissonOperator::new(self, discretization)
    }
}

impl LaplacianOperatorBase for HelmholtzOperator {
    fn poisson(&self) -> &PoissonOperator {
        &self.poisson
    }

    fn op_template(
        &self,
        apply_minv: bool,
        u: Option<Expr>,
        dir_bc: Option<Expr>,
        neu_bc: Option<Expr>,
    ) -> Result<Expr, OperatorError> {
        let u = u.unwrap_or_else(|| Expr::field("u"));
        let laplacian = self
            .poisson
            .laplacian_template(apply_minv, Some(u.clone()), dir_bc, neu_bc)?;
        let k_squared = self.k * self.k;
        Ok(if apply_minv {
            laplacian + k_squared * u
        } else {
            laplacian + k_squared * u.mass()
        })
    }
}

/// A Laplacian-based operator bound to a discretization, ready for use in a linear solver.
#[derive(Debug)]
pub struct BoundPoissonOperator<'a> {
    discretization: &'a Discretization,
    poisson: PoissonOperator,
    compiled_op: CompiledOperator<'a>,
    compiled_bc_op: CompiledOperator<'a>,
    diffusion: Option<Vec<DVector<f64>>>,
    poincare_mean_value_hack: bool,
}

impl<'a> BoundPoissonOperator<'a> {
    pub fn new(
        operator: &impl LaplacianOperatorBase,
        discretization: &'a Discretization,
    ) -> Result<Self, OperatorError> {
        let poisson = operator.poisson();
        if poisson.dimensions() != discretization.dimensions() {
            return Err(OperatorError::DimensionMismatch {
                operator: poisson.dimensions(),
                discretization: discretization.dimensions(),
            });
        }
        check_bc_coverage(
            discretization.mesh(),
            &[poisson.dirichlet_tag().clone(), poisson.neumann_tag().clone()],
        )?;
        let diffusion = poisson.diffusion_tensor().volume_interpolant(discretization)?;

        let op = operator.op_template(false, None, Some(Expr::zero()), Some(Expr::zero()))?;
        let bc_op = operator.op_template(false, None, None, None)?;
        let compiled_op = discretization.compile(&[op])?;
        let compiled_bc_op = discretization.compile(&[bc_op])?;

        // Pure Neumann or fully periodic problems determine u only up to a constant
        let poincare_mean_value_hack = discretization.boundary(&BoundaryTag::All).num_nodes()
            == discretization.boundary(poisson.neumann_tag()).num_nodes();
        debug!(
            "Bound Laplacian operator on {} nodes (mean value correction: {})",
            discretization.num_nodes(),
            poincare_mean_value_hack
        );

        Ok(Self {
            discretization,
            poisson: poisson.clone(),
            compiled_op,
            compiled_bc_op,
            diffusion,
            poincare_mean_value_hack,
        })
    }

    pub fn discretization(&self) -> &'a Discretization {
        self.discretization
    }

    /// Whether `op` subtracts the mean value of its argument.
    pub fn uses_mean_value_correction(&self) -> bool {
        self.poincare_mean_value_hack
    }

    /// Name of the scalar type the operator acts on.
    pub fn dtype(&self) -> &'static str {
        std::any::type_name::<f64>()
    }

    pub fn shape(&self) -> (usize, usize) {
        let n = self.discretization.num_nodes();
        (n, n)
    }

    fn context<'c>(&'c self, u: &'c DVector<f64>) -> FieldContext<'c> {
        let mut context = FieldContext::new().with_scalar("u", u);
        if let Some(diffusion) = &self.diffusion {
            context.insert_vector("diffusion", diffusion);
        }
        context
    }

    /// Applies the operator with homogeneous boundary data.
    ///
    /// If the problem is singular, the mean value `(∫u / |Ω|) M 1` is subtracted, which makes
    /// the operator invertible.
    pub fn op(&self, u: &DVector<f64>) -> Result<DVector<f64>, OperatorError> {
        let mut result = self.compiled_op.evaluate_single(&self.context(u))?;
        if self.poincare_mean_value_hack {
            let mean_state = self.discretization.integral(u) / self.discretization.mesh_volume();
            result.axpy(-mean_state, self.discretization.mass_ones(), 1.0);
        }
        Ok(result)
    }

    /// The right-hand side of `op(u) = prepare_rhs(f)` for the problem `∇·(A ∇u) = f`.
    ///
    /// In matrix form the scheme reads `M v = C u + g` and `M f = A v + B u + h`, with `g` and
    /// `h` containing boundary data. Eliminating `v` gives
    /// `M f - A M⁻¹ g - h = (A M⁻¹ C + B) u`, so the right-hand side is `M f` minus the
    /// operator applied to the boundary data alone. It must not be multiplied by the
    /// inverse mass, as the system would no longer be symmetric.
    pub fn prepare_rhs(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, OperatorError> {
        let discretization = self.discretization;
        let poisson = &self.poisson;
        let zeros = discretization.volume_zeros();
        let dir_bc = poisson
            .dirichlet_bc()
            .boundary_interpolant(discretization, poisson.dirichlet_tag());
        let neu_bc = poisson
            .neumann_bc()
            .boundary_interpolant(discretization, poisson.neumann_tag());

        let context = self
            .context(&zeros)
            .with_scalar("dir_bc", &dir_bc)
            .with_scalar("neu_bc", &neu_bc);
        let boundary_part = self.compiled_bc_op.evaluate_single(&context)?;
        Ok(discretization.apply_mass(rhs) - boundary_part)
    }
}

impl<'a> LinearOperator<f64> for BoundPoissonOperator<'a> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let result = self.op(&x.clone_owned())?;
        y.copy_from(&result);
        Ok(())
    }
}
