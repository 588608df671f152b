//! One-shot solver for linear problems: assemble, solve once, apply.

use nalgebra::DVector;

use super::{ConvergenceStatus, StepReport, StepSolver, relative_residual};
use crate::backend::LinearSolver;
use crate::domain::Domain;
use crate::error::Result;
use crate::time::StepContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearStepSolver {
    pub verbose: bool,
}

impl StepSolver for LinearStepSolver {
    fn solve_step(
        &self,
        domain: &mut Domain,
        ctx: &StepContext,
        backend: &dyn LinearSolver,
    ) -> Result<StepReport> {
        let n = domain.num_free();
        let (f_ext, f_ext_sq) = domain.compute_load_vector(ctx)?;
        domain.update_dof_values(&DVector::zeros(n), ctx)?;

        let (f_int, f_int_sq) = domain.assemble_internal_forces(ctx)?;
        let residual = &f_ext - &f_int;
        let mut history = vec![relative_residual(&residual, &f_int_sq, &f_ext_sq)];

        let mut iterations = 0;
        if n > 0 {
            let k = domain.assemble_stiffness_matrix(ctx)?;
            let (du, info) = backend.solve_linear(&k, &residual)?;
            domain.update_dof_values(&du, ctx)?;
            iterations = info.iterations;
        }

        // diagnostic only: residual at the updated state
        let (f_int, f_int_sq) = domain.assemble_internal_forces(ctx)?;
        let rel = relative_residual(&(&f_ext - &f_int), &f_int_sq, &f_ext_sq);
        history.push(rel);

        if self.verbose {
            println!("  single pass: relative residual {rel:.6e}");
        }

        Ok(StepReport {
            step: ctx.step,
            time: ctx.time,
            status: ConvergenceStatus::SinglePass,
            iterations,
            residual_history: history,
            relative_residual: rel,
            internal_forces: f_int,
        })
    }

    fn name(&self) -> &str {
        "linear"
    }
}
