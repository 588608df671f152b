//! Expression tree and evaluation.

/// Free variables an expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    T,
    X,
    Y,
    Z,
}

impl Variable {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "t" => Some(Variable::T),
            "x" => Some(Variable::X),
            "y" => Some(Variable::Y),
            "z" => Some(Variable::Z),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variable::T => "t",
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Z => "z",
        }
    }
}

/// Values bound to the free variables during evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bindings {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Bindings {
    /// Time `t` at point `coords`.
    pub fn at(t: f64, coords: [f64; 3]) -> Self {
        Self {
            t,
            x: coords[0],
            y: coords[1],
            z: coords[2],
        }
    }

    fn get(&self, var: Variable) -> f64 {
        match var {
            Variable::T => self.t,
            Variable::X => self.x,
            Variable::Y => self.y,
            Variable::Z => self.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Atan2,
    Pow,
    Min,
    Max,
    Hypot,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "atan2" => Function::Atan2,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            "hypot" => Function::Hypot,
            _ => return None,
        };
        Some(f)
    }

    /// Inclusive (min, max) argument count.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::Log => (1, 2),
            Function::Atan2 | Function::Pow | Function::Hypot => (2, 2),
            Function::Min | Function::Max => (2, usize::MAX),
            _ => (1, 1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(f64::NAN);
        let b = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            // log(x) is natural, log(x, base) uses the given base
            Function::Log => {
                if args.len() == 2 {
                    a.log(b)
                } else {
                    a.ln()
                }
            }
            Function::Log10 => a.log10(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
            Function::Floor => a.floor(),
            Function::Ceil => a.ceil(),
            Function::Atan2 => a.atan2(b),
            Function::Pow => a.powf(b),
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::Hypot => a.hypot(b),
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(Variable),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    pub fn eval(&self, bindings: &Bindings) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Var(v) => bindings.get(*v),
            Expr::Neg(inner) => -inner.eval(bindings),
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(bindings);
                let r = rhs.eval(bindings);
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Rem => l % r,
                    BinaryOp::Pow => l.powf(r),
                }
            }
            Expr::Call(f, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(bindings)).collect();
                f.apply(&values)
            }
        }
    }

    /// True if `var` occurs anywhere in the tree.
    pub fn references(&self, var: Variable) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Var(v) => *v == var,
            Expr::Neg(inner) => inner.references(var),
            Expr::Binary(_, lhs, rhs) => lhs.references(var) || rhs.references(var),
            Expr::Call(_, args) => args.iter().any(|a| a.references(var)),
        }
    }

    /// Collapses every variable-free subtree into a literal.
    pub fn fold_constants(self) -> Expr {
        let folded = match self {
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.fold_constants())),
            Expr::Binary(op, lhs, rhs) => Expr::Binary(
                op,
                Box::new(lhs.fold_constants()),
                Box::new(rhs.fold_constants()),
            ),
            Expr::Call(f, args) => {
                Expr::Call(f, args.into_iter().map(Expr::fold_constants).collect())
            }
            leaf => return leaf,
        };

        let all_literal = match &folded {
            Expr::Neg(inner) => matches!(**inner, Expr::Number(_)),
            Expr::Binary(_, lhs, rhs) => {
                matches!(**lhs, Expr::Number(_)) && matches!(**rhs, Expr::Number(_))
            }
            Expr::Call(_, args) => args.iter().all(|a| matches!(a, Expr::Number(_))),
            _ => false,
        };

        if all_literal {
            Expr::Number(folded.eval(&Bindings::default()))
        } else {
            folded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_keeps_variables() {
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Var(Variable::Y)),
            Box::new(Expr::Binary(
                BinaryOp::Mul,
                Box::new(Expr::Number(2.0)),
                Box::new(Expr::Number(3.0)),
            )),
        );
        let folded = expr.fold_constants();
        assert_eq!(
            folded,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Var(Variable::Y)),
                Box::new(Expr::Number(6.0)),
            )
        );
        assert!(folded.references(Variable::Y));
        assert!(!folded.references(Variable::T));
    }

    #[test]
    fn min_max_accept_many_arguments() {
        let args = [3.0, -1.0, 7.5];
        assert_eq!(Function::Min.apply(&args), -1.0);
        assert_eq!(Function::Max.apply(&args), 7.5);
    }
}
