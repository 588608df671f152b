//! Native backends using nalgebra and nalgebra-sparse.
//!
//! - [`NativeBackend`]: dense LU (small-to-medium problems, any non-singular K)
//! - [`CholeskyBackend`]: sparse Cholesky (symmetric positive definite K)

use super::traits::*;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Dense LU backend.
///
/// Suitable for small-to-medium problems (up to ~10,000 DOFs).
pub struct NativeBackend;

impl LinearSolver for NativeBackend {
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        check_dimensions(matrix, rhs)?;
        let n = rhs.len();
        if n == 0 {
            return Ok((DVector::zeros(0), info(self.name(), Some(0.0))));
        }

        // Reconstruct dense matrix from the sparse triplets
        let mut k = DMatrix::zeros(n, n);
        for (r, c, v) in matrix.triplet_iter() {
            k[(r, c)] += *v;
        }

        // LU decomposition and solve
        let u = k
            .lu()
            .solve(rhs)
            .ok_or(BackendError("Singular matrix in LU decomposition".into()))?;

        if u.iter().any(|x| !x.is_finite()) {
            return Err("LU solution is not finite (ill-conditioned matrix)".into());
        }

        let residual = residual_norm(matrix, &u, rhs);
        Ok((u, info(self.name(), Some(residual))))
    }

    fn name(&self) -> &str {
        "nalgebra-LU"
    }
}

/// Sparse Cholesky backend for symmetric positive definite systems.
pub struct CholeskyBackend;

impl LinearSolver for CholeskyBackend {
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        check_dimensions(matrix, rhs)?;
        let n = rhs.len();
        if n == 0 {
            return Ok((DVector::zeros(0), info(self.name(), Some(0.0))));
        }

        let csc = CscMatrix::from(matrix);
        let chol = CscCholesky::factor(&csc).map_err(|err| {
            BackendError(format!("Cholesky factorization failed: {err:?}"))
        })?;

        let b = DMatrix::from_column_slice(n, 1, rhs.as_slice());
        let x = chol.solve(&b);
        let u = DVector::from_column_slice(x.as_slice());

        if u.iter().any(|x| !x.is_finite()) {
            return Err("Cholesky solution is not finite (ill-conditioned matrix)".into());
        }

        let residual = residual_norm(matrix, &u, rhs);
        Ok((u, info(self.name(), Some(residual))))
    }

    fn name(&self) -> &str {
        "nalgebra-sparse-Cholesky"
    }
}

fn info(name: &str, residual_norm: Option<f64>) -> SolveInfo {
    SolveInfo {
        iterations: 1,
        residual_norm,
        solver_name: name.to_string(),
    }
}
