//! Analysis configuration and driver.
//!
//! `Analysis::go` runs: configuration checks, DOF creation, equation
//! numbering, material-status creation, then one solved and committed step
//! per time value.

use std::fs;
use std::path::Path;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::backend::{LinearBackendKind, LinearSolver, backend_for};
use crate::boundary_conditions::BoundaryCondition;
use crate::domain::{BcConflictPolicy, Domain, DomainType};
use crate::error::{FemError, Result};
use crate::export::ResultWriter;
use crate::mesh::Mesh;
use crate::solvers::{
    ConvergenceStatus, LinearStepSolver, NewtonRaphson, NonlinearConfig, StepReport, StepSolver,
};
use crate::time::TimeAssistant;

/// Step solver selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverKind {
    /// Newton-Raphson iteration
    Newton(NonlinearConfig),
    /// Single assemble-solve-apply pass
    Linear,
}

impl Default for SolverKind {
    fn default() -> Self {
        SolverKind::Newton(NonlinearConfig::default())
    }
}

/// What to do when Newton hits its iteration limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxIterPolicy {
    /// Record the step as unconverged and carry on
    #[default]
    Continue,
    /// Stop the analysis with `FemError::ConvergenceFailure`
    Abort,
}

/// Analysis configuration and control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub domain_type: DomainType,
    pub solver: SolverKind,
    pub max_iter_policy: MaxIterPolicy,
    pub bc_conflict_policy: BcConflictPolicy,
    pub linear_backend: LinearBackendKind,
    /// Evaluate element matrices and vectors in parallel
    pub parallel_elements: bool,
    /// Whether to write progress output
    pub verbose: bool,
}

impl AnalysisConfig {
    /// Newton-Raphson with default tolerances
    pub fn nonlinear_static() -> Self {
        Self::default()
    }

    /// One solve per step
    pub fn linear_static() -> Self {
        Self {
            solver: SolverKind::Linear,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(name) = value.get("domain_type").and_then(|v| v.as_str()) {
            name.parse::<DomainType>()?;
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.solver {
            SolverKind::Newton(config) => config.validate(),
            SolverKind::Linear => Ok(()),
        }
    }

    fn step_solver(&self) -> Box<dyn StepSolver> {
        match self.solver {
            SolverKind::Newton(config) => {
                Box::new(NewtonRaphson::new(config).verbose(self.verbose))
            }
            SolverKind::Linear => Box::new(LinearStepSolver {
                verbose: self.verbose,
            }),
        }
    }
}

/// Analysis results and statistics
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResults {
    /// One report per solved step
    pub steps: Vec<StepReport>,
    /// Number of degrees of freedom
    pub num_dofs: usize,
    /// Number of free equations
    pub num_equations: usize,
    pub num_prescribed: usize,
    /// All DOF values after the last step, indexed by DOF number - 1
    pub dof_values: DVector<f64>,
}

impl AnalysisResults {
    /// True unless some step exceeded the iteration limit
    pub fn all_converged(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_converged())
    }

    /// Indices of steps that exceeded the iteration limit
    pub fn unconverged_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| !s.status.is_converged())
            .map(|s| s.step)
            .collect()
    }

    pub fn total_iterations(&self) -> usize {
        self.steps.iter().map(|s| s.iterations).sum()
    }
}

/// Static analysis over a time schedule
pub struct Analysis {
    pub domain: Domain,
    pub time: TimeAssistant,
    config: AnalysisConfig,
}

impl Analysis {
    pub fn new(
        mesh: Mesh,
        bcs: Vec<BoundaryCondition>,
        time: TimeAssistant,
        config: AnalysisConfig,
    ) -> Self {
        let domain = Domain::new(mesh, bcs, config.domain_type)
            .with_conflict_policy(config.bc_conflict_policy)
            .with_parallel_elements(config.parallel_elements);
        Self {
            domain,
            time,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Configuration checks; nothing is solved if these fail
    pub fn check(&self) -> Result<()> {
        self.config.validate()?;
        self.domain.check()
    }

    /// Run the analysis without result output
    pub fn go(&mut self) -> Result<AnalysisResults> {
        self.run(None)
    }

    /// Run the analysis, handing recovered nodal fields to `writer` after
    /// every step
    pub fn go_with_writer(&mut self, writer: &mut dyn ResultWriter) -> Result<AnalysisResults> {
        self.run(Some(writer))
    }

    fn run(&mut self, mut writer: Option<&mut dyn ResultWriter>) -> Result<AnalysisResults> {
        let verbose = self.config.verbose;

        self.check()?;
        self.domain.create_dofs()?;
        self.domain.set_dof_numbering();
        self.domain.create_material_statuses()?;

        if verbose {
            println!("{}", self.domain.statistics().format());
            println!(
                "Equations: {} free, {} prescribed",
                self.domain.num_free(),
                self.domain.num_prescribed()
            );
        }

        let solver = self.config.step_solver();
        let backend: Box<dyn LinearSolver> = backend_for(self.config.linear_backend);
        let mut steps = Vec::with_capacity(self.time.len());

        self.time.reset();
        while let Some(ctx) = self.time.advance() {
            if verbose {
                println!(
                    "Step {} (t = {}, dt = {}) [{} / {}]",
                    ctx.step,
                    ctx.time,
                    ctx.dt,
                    solver.name(),
                    backend.name()
                );
            }

            let report = solver.solve_step(&mut self.domain, &ctx, backend.as_ref())?;

            if report.status == ConvergenceStatus::MaxIterExceeded {
                eprintln!(
                    "Warning: step {} (t = {}) did not converge in {} iterations (relative residual {:e})",
                    ctx.step, ctx.time, report.iterations, report.relative_residual
                );
                if self.config.max_iter_policy == MaxIterPolicy::Abort {
                    return Err(FemError::ConvergenceFailure {
                        step: ctx.step,
                        time: ctx.time,
                        iterations: report.iterations,
                        residual: report.relative_residual,
                    });
                }
            } else if verbose {
                println!(
                    "  {:?} after {} iterations (relative residual {:e})",
                    report.status, report.iterations, report.relative_residual
                );
            }

            self.domain.update();

            if let Some(w) = writer.as_deref_mut() {
                self.domain.recover_fields_in_nodes()?;
                w.write_step(&self.domain.mesh, ctx.step, ctx.time)?;
            }

            steps.push(report);
        }

        let results = AnalysisResults {
            steps,
            num_dofs: self.domain.num_dofs(),
            num_equations: self.domain.num_free(),
            num_prescribed: self.domain.num_prescribed(),
            dof_values: self.domain.get_all_dof_values(),
        };
        if verbose {
            println!(
                "Analysis finished: {} steps, {} iterations, {} unconverged",
                results.steps.len(),
                results.total_iterations(),
                results.unconverged_steps().len()
            );
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.domain_type, DomainType::PlaneStrain);
        assert_eq!(config.solver, SolverKind::Newton(NonlinearConfig::default()));
        assert_eq!(config.max_iter_policy, MaxIterPolicy::Continue);
        assert_eq!(config.bc_conflict_policy, BcConflictPolicy::Reject);
        assert_eq!(config.linear_backend, LinearBackendKind::Lu);
        assert!(!config.parallel_elements);

        let nl = NonlinearConfig::default();
        assert_eq!(nl.max_iterations, 10);
        assert_eq!(nl.tol_force, 1e-5);
        assert_eq!(nl.small_force_threshold, 1e-3);
    }

    #[test]
    fn config_from_partial_json() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "solver": {"type": "newton", "max_iterations": 25},
                "max_iter_policy": "abort",
                "linear_backend": "cholesky"
            }"#,
        )
        .unwrap();

        let SolverKind::Newton(nl) = config.solver else {
            panic!("expected newton solver");
        };
        assert_eq!(nl.max_iterations, 25);
        assert_eq!(nl.tol_force, 1e-5);
        assert_eq!(config.max_iter_policy, MaxIterPolicy::Abort);
        assert_eq!(config.linear_backend, LinearBackendKind::Cholesky);
        assert_eq!(config.bc_conflict_policy, BcConflictPolicy::Reject);
    }

    #[test]
    fn config_json_roundtrip() {
        let config = AnalysisConfig {
            solver: SolverKind::Linear,
            bc_conflict_policy: BcConflictPolicy::LastWins,
            parallel_elements: true,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"linear\""));
        assert_eq!(AnalysisConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn invalid_tolerance_in_json() {
        let err = AnalysisConfig::from_json_str(r#"{"solver": {"type": "newton", "tol_force": -1.0}}"#)
            .unwrap_err();
        assert!(matches!(err, FemError::Config(_)));
    }

    #[test]
    fn unsupported_domain_type_in_json() {
        let err = AnalysisConfig::from_json_str(r#"{"domain_type": "axisymmetric"}"#).unwrap_err();
        assert!(matches!(err, FemError::UnsupportedDomainType(ref name) if name == "axisymmetric"));
        assert!(err.to_string().contains("axisymmetric"));

        // a non-string value is a plain JSON type error
        let err = AnalysisConfig::from_json_str(r#"{"domain_type": 3}"#).unwrap_err();
        assert!(matches!(err, FemError::Json(_)));

        let config = AnalysisConfig::from_json_str(r#"{"domain_type": "Plane-Strain"}"#).unwrap();
        assert_eq!(config.domain_type, DomainType::PlaneStrain);
    }
}
