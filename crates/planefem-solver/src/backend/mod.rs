//! Linear-solve backend abstraction.
//!
//! ```text
//! Element library (nalgebra DMatrix, small and dense)
//!         │
//!         ▼
//! Domain assembly (COO triplets → CSR, free equations only)
//!         │
//!         ▼
//! LinearSolver trait
//!    ┌────┴─────┐
//!    ▼          ▼
//! Dense LU   Sparse Cholesky
//! ```

pub mod native;
pub mod traits;

use serde::{Deserialize, Serialize};

pub use native::{CholeskyBackend, NativeBackend};
pub use traits::*;

/// Selectable linear backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearBackendKind {
    #[default]
    Lu,
    Cholesky,
}

/// Returns the default solver backend (dense LU).
pub fn default_backend() -> Box<dyn LinearSolver> {
    Box::new(NativeBackend)
}

pub fn backend_for(kind: LinearBackendKind) -> Box<dyn LinearSolver> {
    match kind {
        LinearBackendKind::Lu => default_backend(),
        LinearBackendKind::Cholesky => Box::new(CholeskyBackend),
    }
}
