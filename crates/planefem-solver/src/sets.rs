//! Node sets and element sets for grouping entities.

use crate::mesh::{ElementId, NodeId};

/// A named set of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    /// Set name
    pub name: String,
    /// Node IDs in the set, in insertion order
    pub nodes: Vec<NodeId>,
}

impl NodeSet {
    pub fn new(name: impl Into<String>, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            name: name.into(),
            nodes: nodes.into_iter().collect(),
        }
    }
}

/// A named set of elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSet {
    /// Set name
    pub name: String,
    /// Element IDs in the set, in insertion order
    pub elements: Vec<ElementId>,
}

impl ElementSet {
    pub fn new(name: impl Into<String>, elements: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            name: name.into(),
            elements: elements.into_iter().collect(),
        }
    }
}

/// Reference to a set by kind and name.
///
/// Boundary conditions and sections are bound through a `SetRef`, so the
/// kind of set is known before the name is resolved against a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetRef {
    Nodes(String),
    Elements(String),
}

impl SetRef {
    pub fn nodes(name: impl Into<String>) -> Self {
        SetRef::Nodes(name.into())
    }

    pub fn elements(name: impl Into<String>) -> Self {
        SetRef::Elements(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            SetRef::Nodes(name) | SetRef::Elements(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SetRef::Nodes(_) => "node",
            SetRef::Elements(_) => "element",
        }
    }
}

impl From<&str> for SetRef {
    /// Bare names refer to node sets
    fn from(name: &str) -> Self {
        SetRef::Nodes(name.to_string())
    }
}

impl From<&NodeSet> for SetRef {
    fn from(set: &NodeSet) -> Self {
        SetRef::Nodes(set.name.clone())
    }
}

impl From<&ElementSet> for SetRef {
    fn from(set: &ElementSet) -> Self {
        SetRef::Elements(set.name.clone())
    }
}
