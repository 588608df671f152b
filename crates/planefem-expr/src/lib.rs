//! Scalar expressions of time and position.
//!
//! Boundary-condition values are either constants or short formulas such as
//! `y + 1.0*t` or `1e6 * sin(pi * t)`. An [`Expression`] is compiled once and
//! evaluated many times against [`Bindings`].

pub mod ast;
pub mod error;
mod parser;

use std::fmt;
use std::str::FromStr;

pub use ast::{Bindings, Variable};
pub use error::{ExprError, Result};
pub use parser::MAX_DEPTH;

/// A compiled scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    tree: ast::Expr,
}

impl Expression {
    /// Compiles `source`. Variable-free subtrees are folded.
    pub fn parse(source: &str) -> Result<Self> {
        let tree = parser::parse(source)?.fold_constants();
        Ok(Self {
            source: source.trim().to_string(),
            tree,
        })
    }

    /// An expression that always evaluates to `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            source: format!("{value}"),
            tree: ast::Expr::Number(value),
        }
    }

    pub fn eval(&self, bindings: &Bindings) -> f64 {
        self.tree.eval(bindings)
    }

    /// Shorthand for evaluating at time `t` and point `coords`.
    pub fn eval_at(&self, t: f64, coords: [f64; 3]) -> f64 {
        self.eval(&Bindings::at(t, coords))
    }

    /// The literal value if the expression references no variable.
    pub fn as_constant(&self) -> Option<f64> {
        match self.tree {
            ast::Expr::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn depends_on(&self, var: Variable) -> bool {
        self.tree.references(var)
    }

    pub fn is_time_dependent(&self) -> bool {
        self.depends_on(Variable::T)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        Expression::parse(s)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::constant(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
