//! The scalar wave equation as a first-order hyperbolic system.
use crate::discretization::Discretization;
use crate::error::OperatorError;
use crate::flux::{self, make_normal, FluxExpr, FluxType, FluxVectorPlaceholder};
use crate::mesh::{check_bc_coverage, BoundaryTag};
use crate::optemplate::compiler::{CompiledOperator, FieldContext};
use crate::optemplate::{boundary_flux_operator, flux_operator, make_vector_field, Expr};
use itertools::Itertools;
use log::debug;
use nalgebra::DVector;
use std::fmt;
use std::iter::once;
use std::sync::Arc;

/// Source term added to the `u` component of the right-hand side at time `t`.
pub type WaveSource = Arc<dyn Fn(f64) -> DVector<f64>>;

/// Strong-form DG discretization of `∂t u + c ∇·v = 0`, `∂t v + c ∇u = 0`.
///
/// The state is `w = (u, v_0, ..., v_{d-1})`. Boundaries are treated by mirroring,
/// with exterior data `(-u⁻, v⁻)`, which imposes `u = 0`. The upwind flux adds the
/// penalty `0.5 |c| (w⁻ - w⁺)` to every component of the central flux.
#[derive(Clone)]
pub struct StrongWaveOperator {
    dimensions: usize,
    flux_type: FluxType,
    speed: f64,
    boundary_tag: BoundaryTag,
    source: Option<WaveSource>,
}

impl fmt::Debug for StrongWaveOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongWaveOperator")
            .field("dimensions", &self.dimensions)
            .field("flux_type", &self.flux_type)
            .field("speed", &self.speed)
            .field("boundary_tag", &self.boundary_tag)
            .field("source", &self.source.is_some())
            .finish()
    }
}

impl StrongWaveOperator {
    pub fn new(dimensions: usize, flux_type: FluxType) -> Self {
        Self {
            dimensions,
            flux_type,
            speed: 1.0,
            boundary_tag: BoundaryTag::All,
            source: None,
        }
    }

    /// Constructs the operator from a flux type name, `central` or `upwind`.
    pub fn from_flux_name(dimensions: usize, flux_type: &str) -> Result<Self, OperatorError> {
        Ok(Self::new(dimensions, flux_type.parse()?))
    }

    pub fn with_speed(self, speed: f64) -> Self {
        Self { speed, ..self }
    }

    pub fn with_boundary_tag(self, tag: impl Into<BoundaryTag>) -> Self {
        Self {
            boundary_tag: tag.into(),
            ..self
        }
    }

    pub fn with_source(self, source: impl Fn(f64) -> DVector<f64> + 'static) -> Self {
        Self {
            source: Some(Arc::new(source)),
            ..self
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn flux_type(&self) -> FluxType {
        self.flux_type
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn boundary_tag(&self) -> &BoundaryTag {
        &self.boundary_tag
    }

    /// Largest eigenvalue of the flux Jacobian, for time step estimates.
    pub fn max_eigenvalue(&self) -> f64 {
        self.speed.abs()
    }

    /// Strong-form fluxes `c n·(w⁻) - f*`, one per state component.
    ///
    /// The upwind penalty is scaled by `|c|`, so it dissipates for either sign of the speed.
    pub fn flux(&self) -> Vec<FluxExpr> {
        let d = self.dimensions;
        let c = self.speed;
        let w = FluxVectorPlaceholder::new(d + 1);
        let u = w.component(0);
        let v: Vec<_> = (1..=d).map(|i| w.component(i)).collect();
        let normal = make_normal(d);

        let v_avg = v.iter().map(|v| v.avg()).collect_vec();
        let mut weak: Vec<FluxExpr> = once(c * flux::dot(&v_avg, &normal))
            .chain(normal.iter().map(|n| c * (u.avg() * n.clone())))
            .collect();
        if self.flux_type == FluxType::Upwind {
            let penalty = 0.5 * c.abs();
            for (f, component) in weak.iter_mut().zip(w.components()) {
                *f = f.clone() + penalty * (component.int() - component.ext());
            }
        }

        let v_int = v.iter().map(|v| v.int()).collect_vec();
        once(c * flux::dot(&v_int, &normal))
            .chain(normal.iter().map(|n| c * (u.int() * n.clone())))
            .zip(weak)
            .map(|(interior, weak)| interior - weak)
            .collect()
    }

    /// Template of the right-hand side. Without a state, the vector field `w` is used.
    ///
    /// # Panics
    ///
    /// Panics if the given state does not have `d + 1` components.
    pub fn op_template(&self, w: Option<Vec<Expr>>) -> Vec<Expr> {
        let d = self.dimensions;
        let w = w.unwrap_or_else(|| make_vector_field("w", d + 1));
        assert_eq!(w.len(), d + 1, "Wave state must have one more component than dimensions");
        let u = &w[0];
        let v = &w[1..];

        let tag = &self.boundary_tag;
        let bc: Vec<Expr> = once(-u.clone().restrict_to_boundary(tag.clone()))
            .chain(v.iter().map(|v| v.clone().restrict_to_boundary(tag.clone())))
            .collect();

        let volume: Vec<Expr> = once(Expr::sum(v.iter().enumerate().map(|(a, v)| v.clone().differentiate(a))))
            .chain((0..d).map(|a| u.clone().differentiate(a)))
            .collect();

        self.flux()
            .iter()
            .zip(volume)
            .map(|(flux, volume)| {
                let lifted = flux_operator(flux, &w) + boundary_flux_operator(flux, &w, tag, &bc);
                lifted.inverse_mass() - self.speed * volume
            })
            .collect()
    }

    /// Binds the operator to a discretization.
    ///
    /// Fails if the dimensions do not match or if the boundary tag does not cover every
    /// boundary face.
    pub fn bind<'a>(&self, discretization: &'a Discretization) -> Result<BoundWaveOperator<'a>, OperatorError> {
        if self.dimensions != discretization.dimensions() {
            return Err(OperatorError::DimensionMismatch {
                operator: self.dimensions,
                discretization: discretization.dimensions(),
            });
        }
        check_bc_coverage(discretization.mesh(), &[self.boundary_tag.clone()])?;
        let compiled = discretization.compile(&self.op_template(None))?;
        debug!(
            "Bound {} wave operator with {} instructions",
            self.flux_type,
            compiled.num_instructions()
        );
        Ok(BoundWaveOperator {
            compiled,
            source: self.source.clone(),
            max_eigenvalue: self.max_eigenvalue(),
        })
    }
}

/// A wave operator bound to a discretization.
pub struct BoundWaveOperator<'a> {
    compiled: CompiledOperator<'a>,
    source: Option<WaveSource>,
    max_eigenvalue: f64,
}

impl fmt::Debug for BoundWaveOperator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundWaveOperator")
            .field("compiled", &self.compiled)
            .field("max_eigenvalue", &self.max_eigenvalue)
            .finish_non_exhaustive()
    }
}

impl<'a> BoundWaveOperator<'a> {
    pub fn discretization(&self) -> &'a Discretization {
        self.compiled.discretization()
    }

    pub fn max_eigenvalue(&self) -> f64 {
        self.max_eigenvalue
    }

    /// Right-hand side of the semi-discrete system `dw/dt = rhs(t, w)`.
    ///
    /// # Panics
    ///
    /// Panics if the source returns a vector of the wrong length.
    pub fn rhs(&self, t: f64, w: &[DVector<f64>]) -> Result<Vec<DVector<f64>>, OperatorError> {
        let context = FieldContext::new().with_vector("w", w);
        let mut rhs = self.compiled.evaluate(&context)?;
        if let Some(source) = &self.source {
            rhs[0] += source(t);
        }
        Ok(rhs)
    }
}
