//! Domain: DOF creation and numbering, boundary-condition bookkeeping and
//! global assembly.
//!
//! Equation numbering:
//! - free DOFs get `1..=n_free`, prescribed DOFs get `1..=n_prescribed`,
//!   both in node-id order, then DOF-kind order within a node
//! - `eq_map[k]` is the global DOF number of free equation `k + 1`
//! - `pres_eq_map[k]` is the global DOF number of prescribed slot `k + 1`
//!
//! Global assembly scatters only (free, free) pairs into the stiffness
//! matrix. Internal forces are scattered into a full vector indexed by
//! global DOF number, then projected onto the free equations.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::boundary_conditions::{BcKind, BoundaryCondition};
use crate::elements::Element;
use crate::error::{FemError, Result};
use crate::mesh::{Dof, DofKind, ElementId, Equation, Mesh, MeshStatistics, Node, NodeId};
use crate::time::StepContext;

/// Analysis domain type
///
/// Deserialized through [`FromStr`], so spelling variants such as
/// `"plane-strain"` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum DomainType {
    #[default]
    PlaneStrain,
}

impl FromStr for DomainType {
    type Err = FemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "plane_strain" | "planestrain" => Ok(DomainType::PlaneStrain),
            _ => Err(FemError::UnsupportedDomainType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DomainType {
    type Error = FemError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// What to do when two boundary conditions target the same (node, DOF kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BcConflictPolicy {
    /// Fail DOF creation
    #[default]
    Reject,
    /// The later condition in list order replaces the earlier one
    LastWins,
}

pub struct Domain {
    pub mesh: Mesh,
    bcs: Vec<BoundaryCondition>,
    domain_type: DomainType,
    conflict_policy: BcConflictPolicy,
    parallel: bool,
    /// Active boundary condition (index into `bcs`) per (node, DOF kind)
    dof_bc: BTreeMap<(NodeId, DofKind), usize>,
    num_dofs: usize,
    eq_map: Vec<usize>,
    pres_eq_map: Vec<usize>,
    numbered: bool,
}

impl Domain {
    pub fn new(mesh: Mesh, bcs: Vec<BoundaryCondition>, domain_type: DomainType) -> Self {
        Self {
            mesh,
            bcs,
            domain_type,
            conflict_policy: BcConflictPolicy::default(),
            parallel: false,
            dof_bc: BTreeMap::new(),
            num_dofs: 0,
            eq_map: Vec::new(),
            pres_eq_map: Vec::new(),
            numbered: false,
        }
    }

    /// Like [`Domain::new`], with the domain type given by name
    pub fn with_type_name(
        mesh: Mesh,
        bcs: Vec<BoundaryCondition>,
        domain_type: &str,
    ) -> Result<Self> {
        Ok(Self::new(mesh, bcs, domain_type.parse()?))
    }

    pub fn with_conflict_policy(mut self, policy: BcConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Evaluate element matrices and vectors on the rayon pool
    pub fn with_parallel_elements(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn domain_type(&self) -> DomainType {
        self.domain_type
    }

    pub fn boundary_conditions(&self) -> &[BoundaryCondition] {
        &self.bcs
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_free(&self) -> usize {
        self.eq_map.len()
    }

    pub fn num_prescribed(&self) -> usize {
        self.pres_eq_map.len()
    }

    /// Global DOF number of each free equation
    pub fn equation_map(&self) -> &[usize] {
        &self.eq_map
    }

    /// Global DOF number of each prescribed slot
    pub fn prescribed_equation_map(&self) -> &[usize] {
        &self.pres_eq_map
    }

    /// Boundary condition active on (node, kind), if any
    pub fn active_bc(&self, node: NodeId, kind: DofKind) -> Option<&BoundaryCondition> {
        self.dof_bc.get(&(node, kind)).map(|&i| &self.bcs[i])
    }

    pub fn statistics(&self) -> MeshStatistics {
        self.mesh.statistics()
    }

    /// Configuration checks that must pass before any DOF work
    pub fn check(&self) -> Result<()> {
        self.mesh.validate()?;

        let unsectioned: Vec<ElementId> = self
            .mesh
            .elements
            .values()
            .filter(|e| e.section.is_none())
            .map(|e| e.id)
            .collect();
        if !unsectioned.is_empty() {
            return Err(FemError::MissingSection(unsectioned));
        }

        for bc in &self.bcs {
            self.mesh.node_set(bc.node_set())?;
        }
        Ok(())
    }

    /// Create one DOF per (node, required kind) and resolve the active
    /// boundary condition of each.
    pub fn create_dofs(&mut self) -> Result<()> {
        // union of element DOF masks per node
        let mut required: BTreeMap<NodeId, BTreeSet<DofKind>> = BTreeMap::new();
        for element in self.mesh.elements.values() {
            for &node in &element.vertices {
                if !self.mesh.nodes.contains_key(&node) {
                    return Err(FemError::UnknownNode {
                        node,
                        context: format!("element {}", element.id),
                    });
                }
                required
                    .entry(node)
                    .or_default()
                    .extend(element.dof_mask().iter().copied());
            }
        }

        let mut dof_bc: BTreeMap<(NodeId, DofKind), usize> = BTreeMap::new();
        for (index, bc) in self.bcs.iter().enumerate() {
            let set = self.mesh.node_set(bc.node_set())?;
            for &node in &set.nodes {
                for &kind in bc.dof_kinds() {
                    if let Some(previous) = dof_bc.insert((node, kind), index)
                        && previous != index
                        && self.conflict_policy == BcConflictPolicy::Reject
                    {
                        return Err(FemError::BcConflict {
                            node,
                            dof: kind,
                            first: previous,
                            second: index,
                        });
                    }
                }
            }
        }

        let mut number = 0;
        for node in self.mesh.nodes.values_mut() {
            node.dofs.clear();
            let Some(kinds) = required.get(&node.id) else {
                continue;
            };
            for &kind in kinds {
                number += 1;
                let prescribed = dof_bc
                    .get(&(node.id, kind))
                    .is_some_and(|&i| self.bcs[i].essential());
                node.dofs.push(Dof::new(number, node.id, kind, prescribed));
            }
        }

        self.dof_bc = dof_bc;
        self.num_dofs = number;
        self.eq_map.clear();
        self.pres_eq_map.clear();
        self.numbered = false;
        Ok(())
    }

    /// Assign free and prescribed equation numbers
    pub fn set_dof_numbering(&mut self) {
        let mut eq_map = Vec::new();
        let mut pres_eq_map = Vec::new();

        for node in self.mesh.nodes.values_mut() {
            for dof in &mut node.dofs {
                if dof.prescribed {
                    pres_eq_map.push(dof.number);
                    dof.equation = Equation::Prescribed(pres_eq_map.len());
                } else {
                    eq_map.push(dof.number);
                    dof.equation = Equation::Free(eq_map.len());
                }
            }
        }

        self.eq_map = eq_map;
        self.pres_eq_map = pres_eq_map;
        self.numbered = true;
    }

    /// Fresh material state at every integration point
    pub fn create_material_statuses(&mut self) -> Result<()> {
        for element in self.mesh.elements.values_mut() {
            element.create_material_statuses()?;
        }
        Ok(())
    }

    fn require_numbering(&self, operation: &str) -> Result<()> {
        if self.numbered {
            Ok(())
        } else {
            Err(FemError::InvalidState(format!(
                "{operation} called before DOF numbering"
            )))
        }
    }

    /// External load vector over the free equations, and its per-entry squares
    pub fn compute_load_vector(&self, ctx: &StepContext) -> Result<(DVector<f64>, DVector<f64>)> {
        self.require_numbering("compute_load_vector")?;
        let n = self.num_free();
        let mut f = DVector::zeros(n);
        let mut f_sq = DVector::zeros(n);

        for (&(node_id, kind), &index) in &self.dof_bc {
            let bc = &self.bcs[index];
            if bc.kind() != BcKind::PointLoad {
                continue;
            }
            let Some(node) = self.mesh.nodes.get(&node_id) else {
                continue;
            };
            let Some(eq) = node.dof(kind).and_then(|d| d.equation.free_index()) else {
                continue;
            };
            let value = bc.give_value(ctx.time, node);
            f[eq] = value;
            f_sq[eq] = value * value;
        }

        Ok((f, f_sq))
    }

    /// Equation numbers of an element's local DOFs
    fn location(element: &Element, nodes: &BTreeMap<NodeId, Node>) -> Result<Vec<Equation>> {
        Ok(element
            .local_dofs(nodes)?
            .iter()
            .map(|d| d.equation)
            .collect())
    }

    /// Global DOF numbers of an element's local DOFs
    fn dof_numbers(element: &Element, nodes: &BTreeMap<NodeId, Node>) -> Result<Vec<usize>> {
        Ok(element
            .local_dofs(nodes)?
            .iter()
            .map(|d| d.number)
            .collect())
    }

    fn element_stiffness(&self, ctx: &StepContext) -> Result<Vec<(DMatrix<f64>, Vec<Equation>)>> {
        let nodes = &self.mesh.nodes;
        let eval = |element: &Element| -> Result<(DMatrix<f64>, Vec<Equation>)> {
            Ok((
                element.stiffness_matrix(nodes, ctx)?,
                Self::location(element, nodes)?,
            ))
        };

        if self.parallel {
            self.mesh.elements.par_iter().map(|(_, e)| eval(e)).collect()
        } else {
            self.mesh.elements.values().map(eval).collect()
        }
    }

    /// Tangent stiffness over the free equations (n_free × n_free)
    pub fn assemble_stiffness_matrix(&self, ctx: &StepContext) -> Result<CsrMatrix<f64>> {
        self.require_numbering("assemble_stiffness_matrix")?;
        let n = self.num_free();
        let mut coo = CooMatrix::new(n, n);

        for (ke, location) in self.element_stiffness(ctx)? {
            for (i, row) in location.iter().enumerate() {
                let Some(r) = row.free_index() else { continue };
                for (j, col) in location.iter().enumerate() {
                    if let Some(c) = col.free_index() {
                        coo.push(r, c, ke[(i, j)]);
                    }
                }
            }
        }

        Ok(CsrMatrix::from(&coo))
    }

    /// Internal forces over all DOFs, indexed by global DOF number - 1,
    /// with the sum of squared element contributions per entry.
    ///
    /// Advances the trial material state of every integration point.
    pub fn get_internal_forces(
        &mut self,
        ctx: &StepContext,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        self.require_numbering("get_internal_forces")?;
        let Mesh {
            nodes, elements, ..
        } = &mut self.mesh;
        let nodes = &*nodes;

        let eval = |element: &mut Element| -> Result<(DVector<f64>, Vec<usize>)> {
            let fe = element.internal_forces(nodes, ctx)?;
            Ok((fe, Self::dof_numbers(element, nodes)?))
        };

        let contributions: Vec<(DVector<f64>, Vec<usize>)> = if self.parallel {
            elements
                .par_iter_mut()
                .map(|(_, e)| eval(e))
                .collect::<Result<_>>()?
        } else {
            elements.values_mut().map(eval).collect::<Result<_>>()?
        };

        let mut f = DVector::zeros(self.num_dofs);
        let mut f_sq = DVector::zeros(self.num_dofs);
        for (fe, numbers) in contributions {
            for (i, &number) in numbers.iter().enumerate() {
                f[number - 1] += fe[i];
                f_sq[number - 1] += fe[i] * fe[i];
            }
        }

        Ok((f, f_sq))
    }

    /// Internal forces projected onto the free equations
    pub fn assemble_internal_forces(
        &mut self,
        ctx: &StepContext,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let (f_full, sq_full) = self.get_internal_forces(ctx)?;
        let f = DVector::from_iterator(self.eq_map.len(), self.eq_map.iter().map(|&n| f_full[n - 1]));
        let f_sq =
            DVector::from_iterator(self.eq_map.len(), self.eq_map.iter().map(|&n| sq_full[n - 1]));
        Ok((f, f_sq))
    }

    /// Apply a free-DOF increment and reset prescribed DOFs to their
    /// boundary-condition value at `ctx.time`.
    pub fn update_dof_values(&mut self, du: &DVector<f64>, ctx: &StepContext) -> Result<()> {
        self.require_numbering("update_dof_values")?;
        if du.len() != self.num_free() {
            return Err(FemError::InvalidState(format!(
                "increment has {} entries, {} free equations",
                du.len(),
                self.num_free()
            )));
        }

        let Self {
            mesh, bcs, dof_bc, ..
        } = self;

        for node in mesh.nodes.values_mut() {
            let coords = node.coords();
            let node_id = node.id;
            for dof in &mut node.dofs {
                match dof.equation {
                    Equation::Free(n) => dof.value += du[n - 1],
                    Equation::Prescribed(_) => {
                        let index = dof_bc.get(&(node_id, dof.kind)).ok_or_else(|| {
                            FemError::InvalidState(format!(
                                "prescribed DOF {} of node {node_id} has no boundary condition",
                                dof.kind
                            ))
                        })?;
                        dof.value = bcs[*index].value().eval_at(ctx.time, coords);
                    }
                    Equation::Unassigned => {}
                }
            }
        }
        Ok(())
    }

    /// Values of all DOFs, indexed by global DOF number - 1
    pub fn get_all_dof_values(&self) -> DVector<f64> {
        let mut values = DVector::zeros(self.num_dofs);
        for node in self.mesh.nodes.values() {
            for dof in &node.dofs {
                values[dof.number - 1] = dof.value;
            }
        }
        values
    }

    /// Values of the free DOFs in equation order
    pub fn free_dof_values(&self) -> DVector<f64> {
        let all = self.get_all_dof_values();
        DVector::from_iterator(self.eq_map.len(), self.eq_map.iter().map(|&n| all[n - 1]))
    }

    /// Committed integration-point fields averaged onto the nodes
    pub fn recover_fields_in_nodes(&mut self) -> Result<()> {
        let Mesh {
            nodes, elements, ..
        } = &mut self.mesh;

        for node in nodes.values_mut() {
            node.stress_samples.clear();
            node.strain_samples.clear();
        }
        for element in elements.values() {
            element.recover_fields_in_nodes(nodes)?;
        }
        for node in nodes.values_mut() {
            node.average_samples();
        }
        Ok(())
    }

    /// Commit the step: DOFs and integration-point material state
    pub fn update(&mut self) {
        for node in self.mesh.nodes.values_mut() {
            node.commit();
        }
        for element in self.mesh.elements.values_mut() {
            element.commit();
        }
    }
}
