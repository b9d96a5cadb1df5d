//! Compilation of operator templates against a [`Discretization`].
//!
//! Compiling turns the template DAG into a flat instruction list in evaluation order.
//! Every distinct node is compiled once per domain it is needed on, so shared
//! subexpressions are evaluated once. Fluxes are linearized per face at this stage.
use crate::discretization::Discretization;
use crate::error::OperatorError;
use crate::flux::AffineFlux;
use crate::mesh::BoundaryTag;
use crate::optemplate::{Expr, ExprNode, Field, FluxApplication, OperatorKind};
use itertools::izip;
use log::debug;
use nalgebra::DVector;
use rustc_hash::FxHashMap;
use std::fmt;

/// Where the values of an expression live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// All volume nodes of the discretization.
    Volume,
    /// The boundary nodes of the tag, face by face.
    Boundary(BoundaryTag),
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => write!(f, "the volume"),
            Self::Boundary(tag) => write!(f, "boundary '{}'", tag),
        }
    }
}

/// Value supplied for a field when evaluating a compiled operator.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Scalar(&'a DVector<f64>),
    Vector(&'a [DVector<f64>]),
}

/// Binds field names to values.
#[derive(Debug, Clone, Default)]
pub struct FieldContext<'a> {
    fields: FxHashMap<String, FieldValue<'a>>,
}

impl<'a> FieldContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: &'a DVector<f64>) -> Self {
        self.insert_scalar(name, value);
        self
    }

    pub fn with_vector(mut self, name: impl Into<String>, components: &'a [DVector<f64>]) -> Self {
        self.insert_vector(name, components);
        self
    }

    pub fn insert_scalar(&mut self, name: impl Into<String>, value: &'a DVector<f64>) {
        self.fields.insert(name.into(), FieldValue::Scalar(value));
    }

    pub fn insert_vector(&mut self, name: impl Into<String>, components: &'a [DVector<f64>]) {
        self.fields.insert(name.into(), FieldValue::Vector(components));
    }

    pub fn get(&self, name: &str) -> Option<FieldValue<'a>> {
        self.fields.get(name).copied()
    }
}

#[derive(Debug)]
enum Instruction {
    Constant(f64),
    Field(Field),
    Sum(Vec<usize>),
    Product(usize, usize),
    Scaled(f64, usize),
    Operator(OperatorKind, usize),
    Restrict(BoundaryTag, usize),
    Flux(CompiledFlux),
}

#[derive(Debug)]
struct Step {
    instruction: Instruction,
    domain: Domain,
}

#[derive(Debug)]
struct CompiledFlux {
    operands: Vec<usize>,
    // Values providing exterior traces. For interior faces these are the operands themselves.
    exterior_sources: Vec<usize>,
    faces: Vec<FaceFlux>,
}

#[derive(Debug)]
struct FaceFlux {
    half_face: usize,
    // One index into the exterior sources per face node
    exterior_nodes: Vec<usize>,
    flux: AffineFlux,
}

/// Operator templates compiled against a discretization.
#[derive(Debug)]
pub struct CompiledOperator<'a> {
    discretization: &'a Discretization,
    steps: Vec<Step>,
    outputs: Vec<usize>,
}

struct Compiler<'a> {
    discretization: &'a Discretization,
    steps: Vec<Step>,
    memo: FxHashMap<(*const ExprNode, Domain), usize>,
    field_domains: FxHashMap<Field, Domain>,
}

impl<'a> Compiler<'a> {
    fn push(&mut self, instruction: Instruction, domain: Domain) -> usize {
        self.steps.push(Step { instruction, domain });
        self.steps.len() - 1
    }

    fn require_volume(expr: &Expr, domain: &Domain) -> Result<(), OperatorError> {
        match domain {
            Domain::Volume => Ok(()),
            Domain::Boundary(_) => Err(OperatorError::DomainMismatch {
                expression: expr.to_string(),
                expected: Domain::Volume,
                found: domain.clone(),
            }),
        }
    }

    fn lower_all(&mut self, exprs: &[Expr], domain: &Domain) -> Result<Vec<usize>, OperatorError> {
        exprs.iter().map(|expr| self.lower(expr, domain)).collect()
    }

    fn lower(&mut self, expr: &Expr, domain: &Domain) -> Result<usize, OperatorError> {
        let key = (expr.id(), domain.clone());
        if let Some(&index) = self.memo.get(&key) {
            return Ok(index);
        }

        let instruction = match expr.node() {
            ExprNode::Constant(c) => Instruction::Constant(*c),
            ExprNode::Field(field) => {
                match self.field_domains.get(field) {
                    Some(existing) if existing != domain => {
                        return Err(OperatorError::DomainMismatch {
                            expression: field.to_string(),
                            expected: existing.clone(),
                            found: domain.clone(),
                        })
                    }
                    Some(_) => {}
                    None => {
                        self.field_domains.insert(field.clone(), domain.clone());
                    }
                }
                Instruction::Field(field.clone())
            }
            ExprNode::Sum(terms) => Instruction::Sum(self.lower_all(terms, domain)?),
            ExprNode::Product(a, b) => Instruction::Product(self.lower(a, domain)?, self.lower(b, domain)?),
            ExprNode::Scaled(c, operand) => Instruction::Scaled(*c, self.lower(operand, domain)?),
            ExprNode::Operator(kind, operand) => {
                Self::require_volume(expr, domain)?;
                Instruction::Operator(*kind, self.lower(operand, &Domain::Volume)?)
            }
            ExprNode::BoundaryRestriction(tag, operand) => {
                let target = Domain::Boundary(tag.clone());
                if *domain != target {
                    return Err(OperatorError::DomainMismatch {
                        expression: expr.to_string(),
                        expected: target,
                        found: domain.clone(),
                    });
                }
                Instruction::Restrict(tag.clone(), self.lower(operand, &Domain::Volume)?)
            }
            ExprNode::Flux(application) => {
                Self::require_volume(expr, domain)?;
                Instruction::Flux(self.compile_flux(application)?)
            }
        };

        let index = self.push(instruction, domain.clone());
        self.memo.insert(key, index);
        Ok(index)
    }

    fn compile_flux(&mut self, application: &FluxApplication) -> Result<CompiledFlux, OperatorError> {
        let operands = self.lower_all(&application.operands, &Domain::Volume)?;
        let discretization = self.discretization;
        let element = discretization.element();
        let num_local_nodes = element.num_nodes();
        let num_face_nodes = element.num_face_nodes();

        let mut faces = Vec::new();
        let exterior_sources = match &application.boundary {
            None => {
                for (index, half_face) in discretization.half_faces().iter().enumerate() {
                    if let Some((cell, face)) = half_face.neighbor {
                        let exterior_nodes = element
                            .face_nodes(face)
                            .iter()
                            .map(|local| cell * num_local_nodes + local)
                            .collect();
                        let flux = application
                            .flux
                            .linearize(operands.len(), operands.len(), &half_face.geometry())?;
                        faces.push(FaceFlux {
                            half_face: index,
                            exterior_nodes,
                            flux,
                        });
                    }
                }
                operands.clone()
            }
            Some(pair) => {
                let exterior = self.lower_all(&pair.exterior, &Domain::Boundary(pair.tag.clone()))?;
                let boundary = discretization.boundary(&pair.tag);
                for (i, &index) in boundary.faces().iter().enumerate() {
                    let half_face = &discretization.half_faces()[index];
                    let flux = application
                        .flux
                        .linearize(operands.len(), exterior.len(), &half_face.geometry())?;
                    faces.push(FaceFlux {
                        half_face: index,
                        exterior_nodes: (i * num_face_nodes..(i + 1) * num_face_nodes).collect(),
                        flux,
                    });
                }
                exterior
            }
        };

        Ok(CompiledFlux {
            operands,
            exterior_sources,
            faces,
        })
    }
}

/// Compiles the given templates. Every output is a volume field.
pub fn compile<'a>(
    discretization: &'a Discretization,
    outputs: &[Expr],
) -> Result<CompiledOperator<'a>, OperatorError> {
    let mut compiler = Compiler {
        discretization,
        steps: Vec::new(),
        memo: FxHashMap::default(),
        field_domains: FxHashMap::default(),
    };
    let outputs = compiler.lower_all(outputs, &Domain::Volume)?;
    debug!(
        "Compiled {} operator outputs into {} instructions",
        outputs.len(),
        compiler.steps.len()
    );
    Ok(CompiledOperator {
        discretization,
        steps: compiler.steps,
        outputs,
    })
}

impl<'a> CompiledOperator<'a> {
    pub fn discretization(&self) -> &'a Discretization {
        self.discretization
    }

    pub fn num_instructions(&self) -> usize {
        self.steps.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The fields referenced by the operator and the domain each must be supplied on.
    pub fn fields(&self) -> impl Iterator<Item = (&Field, &Domain)> {
        self.steps.iter().filter_map(|step| match &step.instruction {
            Instruction::Field(field) => Some((field, &step.domain)),
            _ => None,
        })
    }

    fn domain_len(&self, domain: &Domain) -> usize {
        match domain {
            Domain::Volume => self.discretization.num_nodes(),
            Domain::Boundary(tag) => self.discretization.boundary(tag).num_nodes(),
        }
    }

    fn field_value(
        &self,
        context: &FieldContext<'_>,
        field: &Field,
        domain: &Domain,
    ) -> Result<DVector<f64>, OperatorError> {
        let value = context
            .get(&field.name)
            .ok_or_else(|| OperatorError::MissingField(field.name.clone()))?;
        let vector = match (value, field.component) {
            (FieldValue::Scalar(vector), None) => vector,
            (FieldValue::Vector(components), Some(i)) => components
                .get(i)
                .ok_or_else(|| OperatorError::MissingField(field.to_string()))?,
            _ => {
                return Err(OperatorError::FieldKind {
                    field: field.name.clone(),
                })
            }
        };
        let expected = self.domain_len(domain);
        if vector.len() != expected {
            return Err(OperatorError::FieldLengthMismatch {
                field: field.to_string(),
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector.clone())
    }

    fn evaluate_flux(&self, flux: &CompiledFlux, values: &[DVector<f64>]) -> DVector<f64> {
        let discretization = self.discretization;
        let element = discretization.element();
        let num_local_nodes = element.num_nodes();
        let mut result = DVector::zeros(discretization.num_nodes());
        let mut face_values = DVector::zeros(element.num_face_nodes());

        for face in &flux.faces {
            let half_face = &discretization.half_faces()[face.half_face];
            let face_nodes = element.face_nodes(half_face.face);
            for (value, &local, &exterior_node) in izip!(face_values.iter_mut(), face_nodes, &face.exterior_nodes) {
                let interior_node = half_face.cell * num_local_nodes + local;
                *value = face.flux.evaluate(
                    |i| values[flux.operands[i]][interior_node],
                    |i| values[flux.exterior_sources[i]][exterior_node],
                );
            }
            discretization.lift_face_values(half_face, &face_values, &mut result);
        }
        result
    }

    /// Evaluates all outputs with the given field values.
    pub fn evaluate(&self, context: &FieldContext<'_>) -> Result<Vec<DVector<f64>>, OperatorError> {
        let discretization = self.discretization;
        let mut values: Vec<DVector<f64>> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let value = match &step.instruction {
                Instruction::Constant(c) => DVector::repeat(self.domain_len(&step.domain), *c),
                Instruction::Field(field) => self.field_value(context, field, &step.domain)?,
                Instruction::Sum(terms) => terms
                    .iter()
                    .fold(DVector::zeros(self.domain_len(&step.domain)), |sum, &term| sum + &values[term]),
                Instruction::Product(a, b) => values[*a].component_mul(&values[*b]),
                Instruction::Scaled(c, operand) => &values[*operand] * *c,
                Instruction::Operator(kind, operand) => discretization.apply_operator(*kind, &values[*operand]),
                Instruction::Restrict(tag, operand) => discretization.boundarize_volume_field(&values[*operand], tag),
                Instruction::Flux(flux) => self.evaluate_flux(flux, &values),
            };
            values.push(value);
        }
        Ok(self.outputs.iter().map(|&i| values[i].clone()).collect())
    }

    /// Evaluates an operator with a single output.
    ///
    /// # Panics
    ///
    /// Panics if the operator does not have exactly one output.
    pub fn evaluate_single(&self, context: &FieldContext<'_>) -> Result<DVector<f64>, OperatorError> {
        assert_eq!(self.outputs.len(), 1, "Operator must have exactly one output");
        let mut outputs = self.evaluate(context)?;
        Ok(outputs.swap_remove(0))
    }
}
