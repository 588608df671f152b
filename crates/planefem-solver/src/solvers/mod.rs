//! Step solvers: drive a [`Domain`] to equilibrium at one time/load value.

use nalgebra::DVector;

use crate::backend::LinearSolver;
use crate::domain::Domain;
use crate::error::Result;
use crate::time::StepContext;

pub mod linear;
pub mod newton;

pub use linear::LinearStepSolver;
pub use newton::{NewtonRaphson, NonlinearConfig};

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Relative residual below tolerance
    Converged,
    /// Residual force below the small-force threshold
    SmallForceExit,
    /// Iteration limit reached without meeting either criterion
    MaxIterExceeded,
    /// One-shot linear solve (residual is diagnostic only)
    SinglePass,
}

impl ConvergenceStatus {
    pub fn is_converged(self) -> bool {
        self != ConvergenceStatus::MaxIterExceeded
    }
}

/// Outcome of one solved step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    pub status: ConvergenceStatus,
    /// Tangent solves performed
    pub iterations: usize,
    /// Relative residual after each internal-force evaluation
    pub residual_history: Vec<f64>,
    /// Last relative residual
    pub relative_residual: f64,
    /// Internal force vector over the free equations at the final state
    pub internal_forces: DVector<f64>,
}

pub trait StepSolver {
    fn solve_step(
        &self,
        domain: &mut Domain,
        ctx: &StepContext,
        backend: &dyn LinearSolver,
    ) -> Result<StepReport>;

    fn name(&self) -> &str;
}

/// ‖r‖₂ / sqrt(Σ f_int² + Σ f_ext²); infinite when the denominator is zero.
pub fn relative_residual(
    residual: &DVector<f64>,
    internal_sq: &DVector<f64>,
    external_sq: &DVector<f64>,
) -> f64 {
    let denom = (internal_sq.sum() + external_sq.sum()).sqrt();
    if denom > 0.0 {
        residual.norm() / denom
    } else {
        f64::INFINITY
    }
}
