//! Symbolic numerical fluxes.
//!
//! A flux is an expression over the interior (`int`) and exterior (`ext`) traces of operand
//! components on a face, the components of the outward unit normal and a per-face penalty
//! factor. Fluxes must be affine in the traces. At compile time they are turned into
//! per-face coefficients with [`FluxExpr::linearize`].
use crate::error::OperatorError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum FluxExpr {
    Constant(f64),
    /// Interior trace of the operand component with the given index.
    Interior(usize),
    /// Exterior trace of the operand component with the given index.
    Exterior(usize),
    /// Component of the outward unit normal.
    Normal(usize),
    /// The penalty factor `(N + 1)(N + d) / (d h)` of the face.
    Penalty,
    Sum(Vec<FluxExpr>),
    Product(Vec<FluxExpr>),
}

impl FluxExpr {
    pub fn zero() -> Self {
        Self::Constant(0.0)
    }

    fn is_zero(&self) -> bool {
        matches!(self, Self::Constant(c) if *c == 0.0)
    }

    /// Evaluates the flux symbolically on a face with the given geometry.
    ///
    /// `num_interior` and `num_exterior` are the number of components available for
    /// interior and exterior traces.
    pub fn linearize(
        &self,
        num_interior: usize,
        num_exterior: usize,
        face: &FaceGeometry,
    ) -> Result<AffineFlux, OperatorError> {
        let invalid = |available| OperatorError::InvalidFluxComponent {
            flux: self.to_string(),
            available,
        };
        let mut result = AffineFlux::constant(0.0, num_interior, num_exterior);
        match self {
            Self::Constant(c) => result.constant = *c,
            Self::Interior(i) => *result.interior.get_mut(*i).ok_or_else(|| invalid(num_interior))? = 1.0,
            Self::Exterior(i) => *result.exterior.get_mut(*i).ok_or_else(|| invalid(num_exterior))? = 1.0,
            Self::Normal(axis) => {
                result.constant = *face
                    .normal
                    .get(*axis)
                    .ok_or_else(|| invalid(face.normal.len()))?
            }
            Self::Penalty => result.constant = face.penalty,
            Self::Sum(terms) => {
                for term in terms {
                    result.add_assign(&term.linearize(num_interior, num_exterior, face)?);
                }
            }
            Self::Product(factors) => {
                result.constant = 1.0;
                for factor in factors {
                    let mut factor = factor.linearize(num_interior, num_exterior, face)?;
                    if result.is_constant() {
                        factor.scale(result.constant);
                        result = factor;
                    } else if factor.is_constant() {
                        result.scale(factor.constant);
                    } else {
                        return Err(OperatorError::NonlinearFlux { flux: self.to_string() });
                    }
                }
            }
        }
        Ok(result)
    }
}

impl fmt::Display for FluxExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(c) => write!(f, "{}", c),
            Self::Interior(i) => write!(f, "int[{}]", i),
            Self::Exterior(i) => write!(f, "ext[{}]", i),
            Self::Normal(axis) => write!(f, "n[{}]", axis),
            Self::Penalty => write!(f, "penalty"),
            Self::Sum(terms) => write!(f, "({})", terms.iter().join(" + ")),
            Self::Product(factors) => write!(f, "{}", factors.iter().join("*")),
        }
    }
}

impl Add for FluxExpr {
    type Output = FluxExpr;

    fn add(self, rhs: FluxExpr) -> FluxExpr {
        if self.is_zero() {
            return rhs;
        } else if rhs.is_zero() {
            return self;
        }
        let mut terms = match self {
            Self::Sum(terms) => terms,
            other => vec![other],
        };
        match rhs {
            Self::Sum(rhs_terms) => terms.extend(rhs_terms),
            other => terms.push(other),
        }
        Self::Sum(terms)
    }
}

impl Sub for FluxExpr {
    type Output = FluxExpr;

    fn sub(self, rhs: FluxExpr) -> FluxExpr {
        self + (-rhs)
    }
}

impl Neg for FluxExpr {
    type Output = FluxExpr;

    fn neg(self) -> FluxExpr {
        -1.0 * self
    }
}

impl Mul for FluxExpr {
    type Output = FluxExpr;

    fn mul(self, rhs: FluxExpr) -> FluxExpr {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        let mut factors = match self {
            Self::Product(factors) => factors,
            other => vec![other],
        };
        match rhs {
            Self::Product(rhs_factors) => factors.extend(rhs_factors),
            other => factors.push(other),
        }
        Self::Product(factors)
    }
}

impl Mul<FluxExpr> for f64 {
    type Output = FluxExpr;

    fn mul(self, rhs: FluxExpr) -> FluxExpr {
        FluxExpr::Constant(self) * rhs
    }
}

impl Mul<f64> for FluxExpr {
    type Output = FluxExpr;

    fn mul(self, rhs: f64) -> FluxExpr {
        self * FluxExpr::Constant(rhs)
    }
}

/// Geometric data of a face needed to evaluate a flux.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry<'a> {
    pub normal: &'a [f64],
    pub penalty: f64,
}

/// A flux evaluated on a particular face: `constant + Σ interior_i int_i + Σ exterior_i ext_i`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineFlux {
    pub constant: f64,
    pub interior: Vec<f64>,
    pub exterior: Vec<f64>,
}

impl AffineFlux {
    fn constant(constant: f64, num_interior: usize, num_exterior: usize) -> Self {
        Self {
            constant,
            interior: vec![0.0; num_interior],
            exterior: vec![0.0; num_exterior],
        }
    }

    pub fn is_constant(&self) -> bool {
        self.interior.iter().chain(&self.exterior).all(|&c| c == 0.0)
    }

    fn scale(&mut self, factor: f64) {
        self.constant *= factor;
        self.interior.iter_mut().for_each(|c| *c *= factor);
        self.exterior.iter_mut().for_each(|c| *c *= factor);
    }

    fn add_assign(&mut self, other: &AffineFlux) {
        self.constant += other.constant;
        self.interior
            .iter_mut()
            .zip(&other.interior)
            .for_each(|(a, b)| *a += b);
        self.exterior
            .iter_mut()
            .zip(&other.exterior)
            .for_each(|(a, b)| *a += b);
    }

    /// Evaluates the flux given accessors for the interior and exterior trace components.
    pub fn evaluate(&self, interior: impl Fn(usize) -> f64, exterior: impl Fn(usize) -> f64) -> f64 {
        let interior_part: f64 = self
            .interior
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(|(i, c)| c * interior(i))
            .sum();
        let exterior_part: f64 = self
            .exterior
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 0.0)
            .map(|(i, c)| c * exterior(i))
            .sum();
        self.constant + interior_part + exterior_part
    }
}

/// Trace placeholder for a scalar operand component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluxScalarPlaceholder {
    index: usize,
}

impl FluxScalarPlaceholder {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn int(&self) -> FluxExpr {
        FluxExpr::Interior(self.index)
    }

    pub fn ext(&self) -> FluxExpr {
        FluxExpr::Exterior(self.index)
    }

    pub fn avg(&self) -> FluxExpr {
        0.5 * (self.int() + self.ext())
    }
}

/// Trace placeholder for a vector of operand components `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluxVectorPlaceholder {
    len: usize,
}

impl FluxVectorPlaceholder {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn component(&self, index: usize) -> FluxScalarPlaceholder {
        assert!(index < self.len, "Component {} out of bounds for vector of length {}", index, self.len);
        FluxScalarPlaceholder::new(index)
    }

    pub fn components(&self) -> impl Iterator<Item = FluxScalarPlaceholder> {
        (0..self.len).map(FluxScalarPlaceholder::new)
    }

    pub fn int(&self) -> Vec<FluxExpr> {
        self.components().map(|c| c.int()).collect()
    }

    pub fn ext(&self) -> Vec<FluxExpr> {
        self.components().map(|c| c.ext()).collect()
    }

    pub fn avg(&self) -> Vec<FluxExpr> {
        self.components().map(|c| c.avg()).collect()
    }
}

/// The components of the outward unit normal.
pub fn make_normal(dimensions: usize) -> Vec<FluxExpr> {
    (0..dimensions).map(FluxExpr::Normal).collect()
}

/// The per-face penalty factor.
pub fn penalty() -> FluxExpr {
    FluxExpr::Penalty
}

pub fn dot(a: &[FluxExpr], b: &[FluxExpr]) -> FluxExpr {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");
    a.iter()
        .zip(b)
        .fold(FluxExpr::zero(), |sum, (a, b)| sum + a.clone() * b.clone())
}

/// How a hyperbolic flux blends interior and exterior traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluxType {
    Central,
    Upwind,
}

impl FromStr for FluxType {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "central" => Ok(Self::Central),
            "upwind" => Ok(Self::Upwind),
            other => Err(OperatorError::InvalidFluxType(other.to_string())),
        }
    }
}

impl fmt::Display for FluxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Central => write!(f, "central"),
            Self::Upwind => write!(f, "upwind"),
        }
    }
}
