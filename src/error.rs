//! Errors raised while building, compiling and evaluating operators.
use crate::mesh::BoundaryTag;
use crate::optemplate::compiler::Domain;
use itertools::Itertools;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum OperatorError {
    /// A flux blending policy other than `central` or `upwind` was requested.
    InvalidFluxType(String),
    /// Some boundary faces are not covered by any of the boundary tags of an operator.
    UncoveredBoundary { num_faces: usize, tags: Vec<BoundaryTag> },
    /// Some boundary faces are covered by more than one of the boundary tags of an operator.
    MultiplyCoveredBoundary { num_faces: usize, tags: Vec<BoundaryTag> },
    /// An operator was bound to a discretization of different dimension.
    DimensionMismatch { operator: usize, discretization: usize },
    /// A boundary condition getter has no condition for the requested tag.
    BoundaryRouting {
        operation: &'static str,
        tag: BoundaryTag,
        operand: String,
    },
    /// A flux is not affine in the trace values.
    NonlinearFlux { flux: String },
    /// A flux refers to an operand component or normal component that does not exist.
    InvalidFluxComponent { flux: String, available: usize },
    /// An expression was used in a domain where it is not defined.
    DomainMismatch {
        expression: String,
        expected: Domain,
        found: Domain,
    },
    /// A field referenced by a compiled operator was not supplied.
    MissingField(String),
    /// A field was supplied as a scalar where a vector field was expected, or vice versa.
    FieldKind { field: String },
    FieldLengthMismatch { field: String, expected: usize, actual: usize },
}

fn describe_tags(tags: &[BoundaryTag]) -> String {
    if tags.is_empty() {
        "untagged".to_string()
    } else {
        tags.iter().join(", ")
    }
}

impl Display for OperatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFluxType(name) => {
                write!(f, "Invalid flux type '{}'. Expected 'central' or 'upwind'", name)
            }
            Self::UncoveredBoundary { num_faces, tags } => write!(
                f,
                "Found {} boundary faces without boundary conditions (tags: {})",
                num_faces,
                describe_tags(tags)
            ),
            Self::MultiplyCoveredBoundary { num_faces, tags } => write!(
                f,
                "Found {} boundary faces with more than one boundary condition (tags: {})",
                num_faces,
                describe_tags(tags)
            ),
            Self::DimensionMismatch {
                operator,
                discretization,
            } => write!(
                f,
                "Operator is {}-dimensional but the discretization is {}-dimensional",
                operator, discretization
            ),
            Self::BoundaryRouting { operation, tag, operand } => write!(
                f,
                "{} boundary condition getter has no condition for tag '{}' (operand {})",
                operation, tag, operand
            ),
            Self::NonlinearFlux { flux } => write!(f, "Flux is not affine in the trace values: {}", flux),
            Self::InvalidFluxComponent { flux, available } => write!(
                f,
                "Flux {} refers to a component that does not exist ({} available)",
                flux, available
            ),
            Self::DomainMismatch {
                expression,
                expected,
                found,
            } => write!(
                f,
                "Expression {} is needed on {} but is only defined on {}",
                expression, found, expected
            ),
            Self::MissingField(name) => write!(f, "No value supplied for field '{}'", name),
            Self::FieldKind { field } => {
                write!(f, "Field '{}' was supplied with the wrong kind (scalar/vector)", field)
            }
            Self::FieldLengthMismatch { field, expected, actual } => write!(
                f,
                "Field '{}' has length {}, expected {}",
                field, actual, expected
            ),
        }
    }
}

impl std::error::Error for OperatorError {}
