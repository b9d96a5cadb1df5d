//! Operator templates: symbolic, mesh-independent descriptions of DG operators.
//!
//! A template is an immutable expression DAG over named fields. Nodes are reference-counted,
//! and a node that is reachable along several paths is evaluated only once by the
//! [compiled operator](compiler::CompiledOperator).
use crate::flux::FluxExpr;
use crate::mesh::BoundaryTag;
use itertools::Itertools;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::rc::Rc;

pub mod compiler;

/// A placeholder for a scalar field, or for one component of a vector field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub component: Option<usize>,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            None => write!(f, "{}", self.name),
            Some(i) => write!(f, "{}[{}]", self.name, i),
        }
    }
}

/// Element-local linear operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Mass,
    InverseMass,
    /// Nodal derivative along an axis.
    Differentiation(usize),
    /// `M D_axis`.
    Stiffness(usize),
    /// `(M D_axis)ᵀ`.
    StiffnessTranspose(usize),
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mass => write!(f, "M"),
            Self::InverseMass => write!(f, "MInv"),
            Self::Differentiation(axis) => write!(f, "Diff{}", axis),
            Self::Stiffness(axis) => write!(f, "S{}", axis),
            Self::StiffnessTranspose(axis) => write!(f, "ST{}", axis),
        }
    }
}

/// Exterior data for a flux evaluated on boundary faces.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPair {
    pub tag: BoundaryTag,
    /// One expression per exterior trace component, each defined on the boundary of `tag`.
    pub exterior: Vec<Expr>,
}

/// A flux lifted to the volume: `Σ_faces lift(flux(int, ext))`.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxApplication {
    pub flux: FluxExpr,
    /// Volume expressions providing the traces of the flux operand components.
    pub operands: Vec<Expr>,
    /// `None` for interior faces, otherwise the boundary faces of the tag.
    pub boundary: Option<BoundaryPair>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Constant(f64),
    Field(Field),
    Sum(Vec<Expr>),
    Product(Expr, Expr),
    Scaled(f64, Expr),
    Operator(OperatorKind, Expr),
    BoundaryRestriction(BoundaryTag, Expr),
    Flux(FluxApplication),
}

/// A node in an operator template.
#[derive(Clone)]
pub struct Expr(Rc<ExprNode>);

impl Expr {
    fn new(node: ExprNode) -> Self {
        Self(Rc::new(node))
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    pub(crate) fn id(&self) -> *const ExprNode {
        Rc::as_ptr(&self.0)
    }

    pub fn constant(value: f64) -> Self {
        Self::new(ExprNode::Constant(value))
    }

    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.node(), ExprNode::Constant(c) if *c == 0.0)
    }

    /// A scalar field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(ExprNode::Field(Field {
            name: name.into(),
            component: None,
        }))
    }

    /// A component of a vector field.
    pub fn field_component(name: impl Into<String>, component: usize) -> Self {
        Self::new(ExprNode::Field(Field {
            name: name.into(),
            component: Some(component),
        }))
    }

    /// Sum of the given expressions. The empty sum is zero.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut terms: Vec<_> = terms.into_iter().filter(|term| !term.is_zero()).collect();
        match terms.len() {
            0 => Self::zero(),
            1 => terms.remove(0),
            _ => Self::new(ExprNode::Sum(terms)),
        }
    }

    pub fn apply(self, operator: OperatorKind) -> Self {
        Self::new(ExprNode::Operator(operator, self))
    }

    pub fn mass(self) -> Self {
        self.apply(OperatorKind::Mass)
    }

    pub fn inverse_mass(self) -> Self {
        self.apply(OperatorKind::InverseMass)
    }

    pub fn differentiate(self, axis: usize) -> Self {
        self.apply(OperatorKind::Differentiation(axis))
    }

    pub fn stiffness(self, axis: usize) -> Self {
        self.apply(OperatorKind::Stiffness(axis))
    }

    pub fn stiffness_transpose(self, axis: usize) -> Self {
        self.apply(OperatorKind::StiffnessTranspose(axis))
    }

    /// Restricts a volume expression to the boundary nodes of the given tag.
    pub fn restrict_to_boundary(self, tag: BoundaryTag) -> Self {
        Self::new(ExprNode::BoundaryRestriction(tag, self))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::Constant(c) => write!(f, "{}", c),
            ExprNode::Field(field) => write!(f, "{}", field),
            ExprNode::Sum(terms) => write!(f, "({})", terms.iter().join(" + ")),
            ExprNode::Product(a, b) => write!(f, "{}*{}", a, b),
            ExprNode::Scaled(c, e) => write!(f, "{}*{}", c, e),
            ExprNode::Operator(op, e) => write!(f, "{}({})", op, e),
            ExprNode::BoundaryRestriction(tag, e) => write!(f, "{}|{}", e, tag),
            ExprNode::Flux(application) => {
                write!(f, "Flux[{}]({}", application.flux, application.operands.iter().join(", "))?;
                if let Some(pair) = &application.boundary {
                    write!(f, " | {}: {}", pair.tag, pair.exterior.iter().join(", "))?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The `n` components of the vector field with the given name.
pub fn make_vector_field(name: &str, n: usize) -> Vec<Expr> {
    (0..n).map(|i| Expr::field_component(name, i)).collect()
}

/// Lifts a flux on all interior faces.
pub fn flux_operator(flux: &FluxExpr, operands: &[Expr]) -> Expr {
    Expr::new(ExprNode::Flux(FluxApplication {
        flux: flux.clone(),
        operands: operands.to_vec(),
        boundary: None,
    }))
}

/// Lifts a flux on the boundary faces of `tag`, with exterior traces given by `exterior`.
pub fn boundary_flux_operator(flux: &FluxExpr, operands: &[Expr], tag: &BoundaryTag, exterior: &[Expr]) -> Expr {
    Expr::new(ExprNode::Flux(FluxApplication {
        flux: flux.clone(),
        operands: operands.to_vec(),
        boundary: Some(BoundaryPair {
            tag: tag.clone(),
            exterior: exterior.to_vec(),
        }),
    }))
}

pub fn dot(a: &[Expr], b: &[Expr]) -> Expr {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");
    Expr::sum(a.iter().zip(b).map(|(a, b)| a.clone() * b.clone()))
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self + (-rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -1.0 * self
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        if let ExprNode::Constant(c) = *rhs.node() {
            Expr::constant(self * c)
        } else if self == 0.0 {
            Expr::zero()
        } else if self == 1.0 {
            rhs
        } else {
            Expr::new(ExprNode::Scaled(self, rhs))
        }
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        rhs * self
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        if let ExprNode::Constant(c) = *self.node() {
            c * rhs
        } else if let ExprNode::Constant(c) = *rhs.node() {
            c * self
        } else {
            Expr::new(ExprNode::Product(self, rhs))
        }
    }
}
