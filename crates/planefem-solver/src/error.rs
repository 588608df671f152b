//! Error types for planefem-solver

use crate::backend::BackendError;
use crate::mesh::{DofKind, ElementId, NodeId};
use crate::quadrature::ElementShape;
use planefem_expr::ExprError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FemError>;

#[derive(Error, Debug)]
pub enum FemError {
    #[error("Unsupported domain type '{0}' (supported: plane_strain)")]
    UnsupportedDomainType(String),

    #[error("Boundary conditions apply to node sets only, got {kind} set '{set}'")]
    WrongSetKind { set: String, kind: &'static str },

    #[error("Unknown node set '{0}'")]
    UnknownNodeSet(String),

    #[error("Unknown element set '{0}'")]
    UnknownElementSet(String),

    #[error("Unknown node {node} referenced by {context}")]
    UnknownNode { node: NodeId, context: String },

    #[error("Unknown element {0}")]
    UnknownElement(ElementId),

    #[error("Elements without section: {0:?}")]
    MissingSection(Vec<ElementId>),

    #[error("Invalid value expression: {0}")]
    Expression(#[from] ExprError),

    #[error(
        "Boundary conditions #{first} and #{second} both target node {node}, DOF {dof}"
    )]
    BcConflict {
        node: NodeId,
        dof: DofKind,
        first: usize,
        second: usize,
    },

    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    #[error("Invalid section thickness {0} (must be positive and finite)")]
    InvalidThickness(f64),

    #[error("Element {element}: {reason}")]
    InvalidConnectivity { element: ElementId, reason: String },

    #[error("Element {element} is degenerate (det J = {det_j:e})")]
    DegenerateElement { element: ElementId, det_j: f64 },

    #[error("No {points}-point quadrature rule for {shape} elements")]
    MissingQuadrature { shape: ElementShape, points: usize },

    #[error("Linear solve failed: {0}")]
    LinearSolve(#[from] BackendError),

    #[error(
        "Step {step} (t = {time}) did not converge after {iterations} iterations (relative residual {residual:e})"
    )]
    ConvergenceFailure {
        step: usize,
        time: f64,
        iterations: usize,
        residual: f64,
    },

    #[error("Invalid analysis state: {0}")]
    InvalidState(String),

    #[error("Invalid time schedule: {0}")]
    InvalidTimeSchedule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
