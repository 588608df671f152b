//! Mesh data structures: nodes, degrees of freedom and the mesh container.
//!
//! The mesh exclusively owns nodes, elements and sets. Elements refer to
//! nodes by id and resolve them through the mesh on every access.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::elements::{Element, ElementKind};
use crate::error::{FemError, Result};
use crate::sets::{ElementSet, NodeSet, SetRef};

pub type NodeId = usize;
pub type ElementId = usize;

/// Physical kind of a degree of freedom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DofKind {
    /// Displacement along x
    #[serde(rename = "u")]
    Ux,
    /// Displacement along y
    #[serde(rename = "v")]
    Uy,
}

impl DofKind {
    pub const ALL: [DofKind; 2] = [DofKind::Ux, DofKind::Uy];

    pub fn name(self) -> &'static str {
        match self {
            DofKind::Ux => "u",
            DofKind::Uy => "v",
        }
    }
}

impl fmt::Display for DofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equation number of a DOF.
///
/// Free and prescribed DOFs are numbered independently, each from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equation {
    #[default]
    Unassigned,
    Free(usize),
    Prescribed(usize),
}

impl Equation {
    /// Signed form: positive for free, negative for prescribed, zero when unassigned.
    pub fn as_signed(self) -> i64 {
        match self {
            Equation::Unassigned => 0,
            Equation::Free(n) => n as i64,
            Equation::Prescribed(n) => -(n as i64),
        }
    }

    /// Zero-based row in the reduced (free) system.
    pub fn free_index(self) -> Option<usize> {
        match self {
            Equation::Free(n) => Some(n - 1),
            _ => None,
        }
    }

    /// Zero-based slot among the prescribed values.
    pub fn prescribed_index(self) -> Option<usize> {
        match self {
            Equation::Prescribed(n) => Some(n - 1),
            _ => None,
        }
    }
}

/// A scalar unknown owned by a node
#[derive(Debug, Clone, PartialEq)]
pub struct Dof {
    /// Global sequence number (1-based, creation order)
    pub number: usize,
    /// Owning node
    pub node: NodeId,
    /// Physical kind
    pub kind: DofKind,
    /// True if an essential boundary condition is active on this DOF
    pub prescribed: bool,
    /// Equation number assigned by the numbering pass
    pub equation: Equation,
    /// Current value
    pub value: f64,
}

impl Dof {
    pub fn new(number: usize, node: NodeId, kind: DofKind, prescribed: bool) -> Self {
        Self {
            number,
            node,
            kind,
            prescribed,
            equation: Equation::Unassigned,
            value: 0.0,
        }
    }

    /// Commit hook for converged steps. DOF values carry no trial state.
    pub fn commit(&mut self) {}
}

/// A node in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node ID
    pub id: NodeId,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Degrees of freedom, in creation order
    pub dofs: Vec<Dof>,
    /// Stress samples pushed by incident elements during recovery
    pub stress_samples: Vec<DVector<f64>>,
    /// Strain samples pushed by incident elements during recovery
    pub strain_samples: Vec<DVector<f64>>,
    /// Averaged stress from the last recovery pass
    pub stress: Option<DVector<f64>>,
    /// Averaged strain from the last recovery pass
    pub strain: Option<DVector<f64>>,
}

impl Node {
    /// Create a new node
    pub fn new(id: NodeId, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            dofs: Vec::new(),
            stress_samples: Vec::new(),
            strain_samples: Vec::new(),
            stress: None,
            strain: None,
        }
    }

    /// Create a node from 2 or 3 coordinates; missing components are zero.
    pub fn from_coords(id: NodeId, coords: &[f64]) -> Self {
        let c = |i: usize| coords.get(i).copied().unwrap_or(0.0);
        Self::new(id, c(0), c(1), c(2))
    }

    /// Get coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dof(&self, kind: DofKind) -> Option<&Dof> {
        self.dofs.iter().find(|d| d.kind == kind)
    }

    pub fn dof_mut(&mut self, kind: DofKind) -> Option<&mut Dof> {
        self.dofs.iter_mut().find(|d| d.kind == kind)
    }

    /// Current value of the DOF of `kind`, zero if the node has none.
    pub fn dof_value(&self, kind: DofKind) -> f64 {
        self.dof(kind).map_or(0.0, |d| d.value)
    }

    /// Displacement `[u, v]`
    pub fn displacement(&self) -> [f64; 2] {
        [self.dof_value(DofKind::Ux), self.dof_value(DofKind::Uy)]
    }

    pub fn commit(&mut self) {
        for dof in &mut self.dofs {
            dof.commit();
        }
    }

    /// Replace the averaged fields with the mean of the accumulated samples
    /// and clear the accumulators.
    pub fn average_samples(&mut self) {
        self.stress = mean(&self.stress_samples);
        self.strain = mean(&self.strain_samples);
        self.stress_samples.clear();
        self.strain_samples.clear();
    }
}

fn mean(samples: &[DVector<f64>]) -> Option<DVector<f64>> {
    let first = samples.first()?;
    let mut sum = DVector::zeros(first.len());
    for s in samples {
        sum += s;
    }
    Some(sum / samples.len() as f64)
}

/// Complete finite element mesh
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// All nodes, ordered by node ID
    pub nodes: BTreeMap<NodeId, Node>,
    /// All elements, ordered by element ID
    pub elements: BTreeMap<ElementId, Element>,
    /// Node sets by name
    pub node_sets: BTreeMap<String, NodeSet>,
    /// Element sets by name
    pub element_sets: BTreeMap<String, ElementSet>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the mesh, replacing any node with the same ID
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    /// Add an element to the mesh. Every vertex must already exist.
    pub fn add_element(&mut self, element: Element) -> Result<()> {
        for &node in &element.vertices {
            if !self.nodes.contains_key(&node) {
                return Err(FemError::UnknownNode {
                    node,
                    context: format!("element {}", element.id),
                });
            }
        }
        self.elements.insert(element.id, element);
        Ok(())
    }

    pub fn add_node_set(&mut self, set: NodeSet) -> Result<()> {
        for &node in &set.nodes {
            if !self.nodes.contains_key(&node) {
                return Err(FemError::UnknownNode {
                    node,
                    context: format!("node set '{}'", set.name),
                });
            }
        }
        self.node_sets.insert(set.name.clone(), set);
        Ok(())
    }

    pub fn add_element_set(&mut self, set: ElementSet) -> Result<()> {
        for &element in &set.elements {
            if !self.elements.contains_key(&element) {
                return Err(FemError::UnknownElement(element));
            }
        }
        self.element_sets.insert(set.name.clone(), set);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn node_set(&self, name: &str) -> Result<&NodeSet> {
        self.node_sets
            .get(name)
            .ok_or_else(|| FemError::UnknownNodeSet(name.to_string()))
    }

    pub fn element_set(&self, name: &str) -> Result<&ElementSet> {
        self.element_sets
            .get(name)
            .ok_or_else(|| FemError::UnknownElementSet(name.to_string()))
    }

    /// Node IDs of a node set. Element sets are rejected.
    pub fn resolve_nodes(&self, set: &SetRef) -> Result<&[NodeId]> {
        match set {
            SetRef::Nodes(name) => Ok(self.node_set(name)?.nodes.as_slice()),
            SetRef::Elements(name) => Err(FemError::WrongSetKind {
                set: name.clone(),
                kind: set.kind(),
            }),
        }
    }

    /// Check that every element vertex and set member exists
    pub fn validate(&self) -> Result<()> {
        for (elem_id, element) in &self.elements {
            for &node in &element.vertices {
                if !self.nodes.contains_key(&node) {
                    return Err(FemError::UnknownNode {
                        node,
                        context: format!("element {elem_id}"),
                    });
                }
            }
        }
        for set in self.node_sets.values() {
            for &node in &set.nodes {
                if !self.nodes.contains_key(&node) {
                    return Err(FemError::UnknownNode {
                        node,
                        context: format!("node set '{}'", set.name),
                    });
                }
            }
        }
        for set in self.element_sets.values() {
            for &element in &set.elements {
                if !self.elements.contains_key(&element) {
                    return Err(FemError::UnknownElement(element));
                }
            }
        }
        Ok(())
    }

    /// Get mesh statistics
    pub fn statistics(&self) -> MeshStatistics {
        let mut element_kind_counts = BTreeMap::new();
        for element in self.elements.values() {
            *element_kind_counts.entry(element.kind).or_insert(0) += 1;
        }

        MeshStatistics {
            num_nodes: self.nodes.len(),
            num_elements: self.elements.len(),
            num_dofs: self.nodes.values().map(|n| n.dofs.len()).sum(),
            num_node_sets: self.node_sets.len(),
            num_element_sets: self.element_sets.len(),
            element_kind_counts,
        }
    }
}

/// Mesh statistics for reporting
#[derive(Debug, Clone)]
pub struct MeshStatistics {
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of elements
    pub num_elements: usize,
    /// DOFs created so far (zero before DOF creation)
    pub num_dofs: usize,
    pub num_node_sets: usize,
    pub num_element_sets: usize,
    /// Count of each element kind
    pub element_kind_counts: BTreeMap<ElementKind, usize>,
}

impl MeshStatistics {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!("Nodes: {}", self.num_nodes),
            format!("Elements: {}", self.num_elements),
            format!("DOFs: {}", self.num_dofs),
            format!(
                "Sets: {} node, {} element",
                self.num_node_sets, self.num_element_sets
            ),
        ];

        if !self.element_kind_counts.is_empty() {
            lines.push("Element types:".to_string());
            for (kind, count) in &self.element_kind_counts {
                lines.push(format!("  {kind}: {count}"));
            }
        }

        lines.join("\n")
    }
}
