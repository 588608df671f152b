//! Boundary conditions: prescribed displacements and point loads.
//!
//! Values are expressions of time `t` and the node coordinates `x, y, z`,
//! compiled once at construction and evaluated per query.

use planefem_expr::Expression;

use crate::error::{FemError, Result};
use crate::mesh::{DofKind, Node};
use crate::sets::SetRef;

/// Kind of boundary condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BcKind {
    /// Essential: fixes the DOF value
    Dirichlet,
    /// Natural: contributes external force
    PointLoad,
}

/// Value specification accepted by the constructors
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    Constant(f64),
    Text(String),
    Compiled(Expression),
}

impl ValueSpec {
    fn compile(self) -> Result<Expression> {
        match self {
            ValueSpec::Constant(v) => Ok(Expression::constant(v)),
            ValueSpec::Text(src) => Ok(Expression::parse(&src)?),
            ValueSpec::Compiled(expr) => Ok(expr),
        }
    }
}

impl From<f64> for ValueSpec {
    fn from(v: f64) -> Self {
        ValueSpec::Constant(v)
    }
}

impl From<&str> for ValueSpec {
    fn from(s: &str) -> Self {
        ValueSpec::Text(s.to_string())
    }
}

impl From<String> for ValueSpec {
    fn from(s: String) -> Self {
        ValueSpec::Text(s)
    }
}

impl From<Expression> for ValueSpec {
    fn from(e: Expression) -> Self {
        ValueSpec::Compiled(e)
    }
}

/// A boundary condition on the DOFs of a node set
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition {
    kind: BcKind,
    value: Expression,
    dof_kinds: Vec<DofKind>,
    node_set: String,
}

impl BoundaryCondition {
    /// Prescribed value on `dofs` of every node in `target`
    pub fn dirichlet(
        value: impl Into<ValueSpec>,
        dofs: &[DofKind],
        target: impl Into<SetRef>,
    ) -> Result<Self> {
        Self::new(BcKind::Dirichlet, value.into(), dofs, target.into())
    }

    /// Concentrated force on `dofs` of every node in `target`
    pub fn point_load(
        value: impl Into<ValueSpec>,
        dofs: &[DofKind],
        target: impl Into<SetRef>,
    ) -> Result<Self> {
        Self::new(BcKind::PointLoad, value.into(), dofs, target.into())
    }

    pub fn new(kind: BcKind, value: ValueSpec, dofs: &[DofKind], target: SetRef) -> Result<Self> {
        let node_set = match target {
            SetRef::Nodes(name) => name,
            SetRef::Elements(name) => {
                return Err(FemError::WrongSetKind {
                    set: name,
                    kind: "element",
                });
            }
        };

        let mut dof_kinds = Vec::with_capacity(dofs.len());
        for &d in dofs {
            if !dof_kinds.contains(&d) {
                dof_kinds.push(d);
            }
        }

        Ok(Self {
            kind,
            value: value.compile()?,
            dof_kinds,
            node_set,
        })
    }

    /// Value at time `t` and the coordinates of `node`
    pub fn give_value(&self, t: f64, node: &Node) -> f64 {
        self.value.eval_at(t, node.coords())
    }

    /// True for conditions that fix DOF values
    pub fn essential(&self) -> bool {
        self.kind == BcKind::Dirichlet
    }

    pub fn kind(&self) -> BcKind {
        self.kind
    }

    pub fn value(&self) -> &Expression {
        &self.value
    }

    pub fn dof_kinds(&self) -> &[DofKind] {
        &self.dof_kinds
    }

    /// Name of the target node set
    pub fn node_set(&self) -> &str {
        &self.node_set
    }
}
