//! Plane-strain finite element solver.
//!
//! A [`Mesh`] of linear triangles and bilinear quadrilaterals, with
//! [`Section`]s bound through element sets and [`BoundaryCondition`]s bound
//! through node sets, is wrapped in a [`Domain`]. The domain creates and
//! numbers DOFs, assembles the tangent stiffness and internal forces over the
//! free equations, and is driven to equilibrium step by step by a
//! [`StepSolver`] over the times of a [`TimeAssistant`]. [`Analysis`] ties it
//! together.

pub mod analysis;
pub mod backend;
pub mod boundary_conditions;
pub mod domain;
pub mod elements;
pub mod error;
pub mod export;
pub mod interpolation;
pub mod materials;
pub mod mesh;
pub mod quadrature;
pub mod section;
pub mod sets;
pub mod solvers;
pub mod time;

pub use analysis::{Analysis, AnalysisConfig, AnalysisResults, MaxIterPolicy, SolverKind};
pub use backend::{
    BackendError, CholeskyBackend, LinearBackendKind, LinearSolver, NativeBackend, SolveInfo,
    backend_for, default_backend,
};
pub use boundary_conditions::{BcKind, BoundaryCondition, ValueSpec};
pub use domain::{BcConflictPolicy, Domain, DomainType};
pub use elements::{Element, ElementKind};
pub use error::{FemError, Result};
pub use export::{
    JsonWriter, MemoryWriter, NodeSnapshot, ResultWriter, StepSnapshot, VtkWriter,
};
pub use interpolation::Interpolator;
pub use materials::{LinearIsotropic, Material, MaterialState, MaterialStatus};
pub use mesh::{Dof, DofKind, ElementId, Equation, Mesh, MeshStatistics, Node, NodeId};
pub use planefem_expr::{Bindings, ExprError, Expression};
pub use quadrature::{ElementShape, GaussIntegration, GaussPoint};
pub use section::Section;
pub use sets::{ElementSet, NodeSet, SetRef};
pub use solvers::{
    ConvergenceStatus, LinearStepSolver, NewtonRaphson, NonlinearConfig, StepReport, StepSolver,
};
pub use time::{StepContext, TimeAssistant};
