//! Backend trait definitions for the global linear solve.
//!
//! Element-level computations stay in nalgebra (small, dense matrices);
//! only the reduced system `K · Δu = r` goes through this interface.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

/// Solver convergence and diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// ‖K·x − b‖₂ of the returned solution
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-LU")
    pub solver_name: String,
}

/// Trait for a linear solver backend.
///
/// Implementations solve K · x = b for a square sparse K. A singular or
/// numerically unsolvable system is an error, never a garbage vector.
pub trait LinearSolver: Send + Sync {
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}

/// Shape checks shared by the backends
pub(crate) fn check_dimensions(
    matrix: &CsrMatrix<f64>,
    rhs: &DVector<f64>,
) -> Result<(), BackendError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(format!(
            "Matrix is not square ({}×{})",
            matrix.nrows(),
            matrix.ncols()
        )
        .into());
    }
    if matrix.nrows() != rhs.len() {
        return Err(format!(
            "Right-hand side has {} entries, matrix has {} rows",
            rhs.len(),
            matrix.nrows()
        )
        .into());
    }
    Ok(())
}

/// ‖K·x − b‖₂
pub(crate) fn residual_norm(matrix: &CsrMatrix<f64>, x: &DVector<f64>, rhs: &DVector<f64>) -> f64 {
    let mut r = -rhs.clone();
    for (i, j, v) in matrix.triplet_iter() {
        r[i] += v * x[j];
    }
    r.norm()
}
