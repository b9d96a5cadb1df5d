//! Discretizations of second derivatives as a gradient followed by a divergence.
//!
//! A scheme turns an operand into operator templates for its gradient or divergence,
//! including the boundary fluxes that inject Dirichlet and Neumann data.
use crate::error::OperatorError;
use crate::flux::{self, make_normal, penalty, FluxExpr, FluxScalarPlaceholder, FluxVectorPlaceholder};
use crate::mesh::BoundaryTag;
use crate::optemplate::{boundary_flux_operator, flux_operator, Expr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::once;

/// The operand of a gradient or divergence.
#[derive(Debug, Clone)]
pub struct SecondDerivativeTarget<O> {
    pub dimensions: usize,
    pub strong_form: bool,
    pub operand: O,
    /// The primal unknown, used for penalizing jumps in divergence fluxes.
    pub primal: Option<Expr>,
}

impl<O> SecondDerivativeTarget<O> {
    pub fn new(dimensions: usize, strong_form: bool, operand: O) -> Self {
        Self {
            dimensions,
            strong_form,
            operand,
            primal: None,
        }
    }

    pub fn with_primal(self, primal: Expr) -> Self {
        Self {
            primal: Some(primal),
            ..self
        }
    }
}

/// Templates for a derivative, before and after application of the inverse mass.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeResult<R> {
    pub all: R,
    pub minv_all: R,
}

/// Provides the boundary data expression for a boundary tag.
pub trait BoundaryConditionGetter {
    fn boundary_condition(&self, tag: &BoundaryTag) -> Option<Expr>;
}

impl<F> BoundaryConditionGetter for F
where
    F: Fn(&BoundaryTag) -> Option<Expr>,
{
    fn boundary_condition(&self, tag: &BoundaryTag) -> Option<Expr> {
        self(tag)
    }
}

pub trait SecondDerivativeScheme: fmt::Debug {
    fn grad(
        &self,
        target: &SecondDerivativeTarget<Expr>,
        bc_getter: &dyn BoundaryConditionGetter,
        dirichlet_tags: &[BoundaryTag],
        neumann_tags: &[BoundaryTag],
    ) -> Result<DerivativeResult<Vec<Expr>>, OperatorError>;

    fn div(
        &self,
        target: &SecondDerivativeTarget<Vec<Expr>>,
        bc_getter: &dyn BoundaryConditionGetter,
        dirichlet_tags: &[BoundaryTag],
        neumann_tags: &[BoundaryTag],
    ) -> Result<DerivativeResult<Expr>, OperatorError>;
}

fn lookup_boundary_conditions(
    operation: &'static str,
    bc_getter: &dyn BoundaryConditionGetter,
    tags: &[BoundaryTag],
    operand: impl Fn() -> String,
) -> Result<Vec<(BoundaryTag, Expr)>, OperatorError> {
    tags.iter()
        .map(|tag| {
            bc_getter
                .boundary_condition(tag)
                .map(|bc| (tag.clone(), bc))
                .ok_or_else(|| OperatorError::BoundaryRouting {
                    operation,
                    tag: tag.clone(),
                    operand: operand(),
                })
        })
        .collect()
}

/// Local discontinuous Galerkin scheme.
///
/// Uses the numerical traces `û = {u} - (β·n)(u⁻ - u⁺)` and
/// `σ̂·n = {σ}·n + (β·n)(σ⁻ - σ⁺)·n - η (u⁻ - u⁺)`, where `η` is the stabilization
/// coefficient times the face penalty factor. With these traces the discrete Laplacian
/// is symmetric.
///
/// See P. Castillo et al., "Local discontinuous Galerkin methods for elliptic problems",
/// Communications in Numerical Methods in Engineering 18, no. 1 (2002): 69-75.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LdgSecondDerivative {
    beta: f64,
    stab_coefficient: f64,
}

impl Default for LdgSecondDerivative {
    fn default() -> Self {
        Self {
            beta: 0.5,
            stab_coefficient: 10.0,
        }
    }
}

impl LdgSecondDerivative {
    pub fn new(beta: f64, stab_coefficient: f64) -> Self {
        Self { beta, stab_coefficient }
    }

    pub fn with_beta(self, beta: f64) -> Self {
        Self { beta, ..self }
    }

    pub fn with_stab_coefficient(self, stab_coefficient: f64) -> Self {
        Self {
            stab_coefficient,
            ..self
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn stab_coefficient(&self) -> f64 {
        self.stab_coefficient
    }

    /// `β·n` for the constant vector `β = (beta, ..., beta)`.
    fn beta_dot_normal(&self, dimensions: usize) -> FluxExpr {
        let beta = vec![FluxExpr::Constant(self.beta); dimensions];
        flux::dot(&beta, &make_normal(dimensions))
    }
}

impl SecondDerivativeScheme for LdgSecondDerivative {
    fn grad(
        &self,
        target: &SecondDerivativeTarget<Expr>,
        bc_getter: &dyn BoundaryConditionGetter,
        dirichlet_tags: &[BoundaryTag],
        neumann_tags: &[BoundaryTag],
    ) -> Result<DerivativeResult<Vec<Expr>>, OperatorError> {
        let dimensions = target.dimensions;
        let dirichlet = lookup_boundary_conditions("gradient", bc_getter, dirichlet_tags, || {
            target.operand.to_string()
        })?;

        let u = FluxScalarPlaceholder::new(0);
        let normal = make_normal(dimensions);
        let trace = u.avg() - self.beta_dot_normal(dimensions) * (u.int() - u.ext());
        let operands = [target.operand.clone()];

        let all: Vec<Expr> = normal
            .iter()
            .enumerate()
            .map(|(axis, n)| {
                let mut terms = Vec::new();
                if target.strong_form {
                    terms.push(target.operand.clone().stiffness(axis));
                    terms.push(-flux_operator(&(n.clone() * (u.int() - trace.clone())), &operands));
                    // On Dirichlet faces û = g, given as the exterior value
                    let boundary_flux = n.clone() * (u.int() - u.ext());
                    for (tag, bc) in &dirichlet {
                        terms.push(-boundary_flux_operator(&boundary_flux, &operands, tag, &[bc.clone()]));
                    }
                    // On Neumann faces û = u⁻, so the strong-form correction vanishes
                } else {
                    terms.push(-target.operand.clone().stiffness_transpose(axis));
                    terms.push(flux_operator(&(n.clone() * trace.clone()), &operands));
                    for (tag, bc) in &dirichlet {
                        terms.push(boundary_flux_operator(&(n.clone() * u.ext()), &operands, tag, &[bc.clone()]));
                    }
                    for tag in neumann_tags {
                        terms.push(boundary_flux_operator(&(n.clone() * u.int()), &operands, tag, &[Expr::zero()]));
                    }
                }
                Expr::sum(terms)
            })
            .collect();

        let minv_all = all.iter().map(|a| a.clone().inverse_mass()).collect();
        Ok(DerivativeResult { all, minv_all })
    }

    fn div(
        &self,
        target: &SecondDerivativeTarget<Vec<Expr>>,
        bc_getter: &dyn BoundaryConditionGetter,
        dirichlet_tags: &[BoundaryTag],
        neumann_tags: &[BoundaryTag],
    ) -> Result<DerivativeResult<Expr>, OperatorError> {
        let dimensions = target.dimensions;
        assert_eq!(
            target.operand.len(),
            dimensions,
            "Divergence operand must have one component per dimension"
        );
        let describe_operand = || format!("[{}]", target.operand.iter().join(", "));
        let dirichlet = lookup_boundary_conditions("divergence", bc_getter, dirichlet_tags, describe_operand)?;
        let neumann = lookup_boundary_conditions("divergence", bc_getter, neumann_tags, describe_operand)?;

        // Flux operands are the components of σ followed by the primal unknown u
        let w = FluxVectorPlaceholder::new(dimensions + 1);
        let sigma: Vec<_> = (0..dimensions).map(|i| w.component(i)).collect();
        let u = w.component(dimensions);
        let normal = make_normal(dimensions);
        let beta_n = self.beta_dot_normal(dimensions);

        let sigma_int_n = flux::dot(&sigma.iter().map(|s| s.int()).collect_vec(), &normal);
        let sigma_avg_n = flux::dot(&sigma.iter().map(|s| s.avg()).collect_vec(), &normal);
        let sigma_jump_n = flux::dot(&sigma.iter().map(|s| s.int() - s.ext()).collect_vec(), &normal);
        let stabilization = match target.primal {
            Some(_) => self.stab_coefficient * penalty() * (u.int() - u.ext()),
            None => FluxExpr::zero(),
        };

        let interior_flux = sigma_avg_n + beta_n * sigma_jump_n - stabilization.clone();
        let dirichlet_flux = sigma_int_n.clone() - stabilization;
        // The Neumann data replaces σ̂·n and is passed as exterior component 0
        let neumann_flux = w.component(0).ext();

        let operands: Vec<Expr> = target
            .operand
            .iter()
            .cloned()
            .chain(once(target.primal.clone().unwrap_or_else(Expr::zero)))
            .collect();
        let zeros = vec![Expr::zero(); dimensions];
        let dirichlet_exterior = |bc: &Expr| zeros.iter().cloned().chain(once(bc.clone())).collect_vec();
        let neumann_exterior = |bc: &Expr| once(bc.clone()).chain(zeros.iter().cloned()).collect_vec();

        let mut terms = Vec::new();
        if target.strong_form {
            for (axis, sigma_a) in target.operand.iter().enumerate() {
                terms.push(sigma_a.clone().stiffness(axis));
            }
            terms.push(-flux_operator(&(sigma_int_n.clone() - interior_flux), &operands));
            for (tag, bc) in &dirichlet {
                let flux = sigma_int_n.clone() - dirichlet_flux.clone();
                terms.push(-boundary_flux_operator(&flux, &operands, tag, &dirichlet_exterior(bc)));
            }
            for (tag, bc) in &neumann {
                let flux = sigma_int_n.clone() - neumann_flux.clone();
                terms.push(-boundary_flux_operator(&flux, &operands, tag, &neumann_exterior(bc)));
            }
        } else {
            for (axis, sigma_a) in target.operand.iter().enumerate() {
                terms.push(-sigma_a.clone().stiffness_transpose(axis));
            }
            terms.push(flux_operator(&interior_flux, &operands));
            for (tag, bc) in &dirichlet {
                terms.push(boundary_flux_operator(
                    &dirichlet_flux,
                    &operands,
                    tag,
                    &dirichlet_exterior(bc),
                ));
            }
            for (tag, bc) in &neumann {
                terms.push(boundary_flux_operator(&neumann_flux, &operands, tag, &neumann_exterior(bc)));
            }
        }

        let all = Expr::sum(terms);
        let minv_all = all.clone().inverse_mass();
        Ok(DerivativeResult { all, minv_all })
    }
}
