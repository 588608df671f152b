//! Constitutive models and per-integration-point material state.
//!
//! Strain and stress use the plane Voigt layout `[xx, yy, zz, xy]` with
//! engineering shear strain `γxy`. Under plane strain `ε_zz` stays zero but
//! `σ_zz` does not.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{FemError, Result};
use crate::time::StepContext;

/// Number of stress/strain components
pub const VOIGT_SIZE: usize = 4;

/// Stress and strain at one integration point
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub stress: DVector<f64>,
    pub strain: DVector<f64>,
}

impl MaterialState {
    pub fn zeros(size: usize) -> Self {
        Self {
            stress: DVector::zeros(size),
            strain: DVector::zeros(size),
        }
    }
}

/// Two generations of material state.
///
/// `trial` is overwritten by every stress evaluation; `committed` only
/// changes on [`MaterialStatus::commit`], at the end of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStatus {
    pub trial: MaterialState,
    pub committed: MaterialState,
}

impl MaterialStatus {
    pub fn new(size: usize) -> Self {
        Self {
            trial: MaterialState::zeros(size),
            committed: MaterialState::zeros(size),
        }
    }

    pub fn set_trial(&mut self, stress: DVector<f64>, strain: DVector<f64>) {
        self.trial.stress = stress;
        self.trial.strain = strain;
    }

    /// Copy trial state into the committed slot
    pub fn commit(&mut self) {
        self.committed.clone_from(&self.trial);
    }
}

/// Isotropic linear elasticity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearIsotropic {
    /// Young's modulus (E) [Pa]
    pub elastic_modulus: f64,
    /// Poisson's ratio (ν) [-]
    pub poissons_ratio: f64,
}

impl LinearIsotropic {
    /// Get the shear modulus (G) from E and ν
    pub fn shear_modulus(&self) -> f64 {
        self.elastic_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Get the bulk modulus (K) from E and ν
    pub fn bulk_modulus(&self) -> f64 {
        self.elastic_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// Plane-strain elasticity matrix (4×4)
    fn plane_strain_tangent(&self) -> DMatrix<f64> {
        let e = self.elastic_modulus;
        let nu = self.poissons_ratio;
        let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));

        let mut d = DMatrix::zeros(VOIGT_SIZE, VOIGT_SIZE);
        for i in 0..3 {
            for j in 0..3 {
                d[(i, j)] = if i == j { factor * (1.0 - nu) } else { factor * nu };
            }
        }
        d[(3, 3)] = self.shear_modulus();
        d
    }
}

/// A constitutive model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Material {
    LinearIsotropic(LinearIsotropic),
}

impl Material {
    /// Linear isotropic material with validated parameters
    pub fn linear_isotropic(elastic_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        let material = Material::LinearIsotropic(LinearIsotropic {
            elastic_modulus,
            poissons_ratio,
        });
        material.validate()?;
        Ok(material)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Material::LinearIsotropic(m) => {
                if !(m.elastic_modulus.is_finite() && m.elastic_modulus > 0.0) {
                    return Err(FemError::InvalidMaterial(format!(
                        "Young's modulus must be positive, got {}",
                        m.elastic_modulus
                    )));
                }
                if !(m.poissons_ratio > -1.0 && m.poissons_ratio < 0.5) {
                    return Err(FemError::InvalidMaterial(format!(
                        "Poisson's ratio must lie in (-1, 0.5), got {}",
                        m.poissons_ratio
                    )));
                }
                Ok(())
            }
        }
    }

    /// Fresh state for one integration point
    pub fn create_status(&self) -> MaterialStatus {
        MaterialStatus::new(VOIGT_SIZE)
    }

    /// Material tangent D at the given state
    pub fn tangent(&self, _status: &MaterialStatus, _ctx: &StepContext) -> DMatrix<f64> {
        match self {
            Material::LinearIsotropic(m) => m.plane_strain_tangent(),
        }
    }

    /// Stress for `strain`. Records the pair as the trial state of `status`.
    pub fn compute_stress(
        &self,
        strain: &DVector<f64>,
        status: &mut MaterialStatus,
        ctx: &StepContext,
    ) -> DVector<f64> {
        let stress = self.tangent(status, ctx) * strain;
        status.set_trial(stress.clone(), strain.clone());
        stress
    }
}
