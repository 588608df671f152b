//! Tokenizer and recursive-descent parser.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '%') unary)*
//! unary          := ('-' | '+') unary | power
//! power          := primary (('^' | '**') unary)?
//! primary        := number | constant | variable | call | '(' additive ')'
//! call           := function '(' additive (',' additive)* ')'
//! ```
//!
//! `^` binds tighter than unary minus and associates to the right, so
//! `-2^2 == -4` and `2^3^2 == 512`.
//!
//! Tree height is capped at [`MAX_DEPTH`]: parentheses, unary signs, powers,
//! call arguments and every chained binary operator count one level.

use crate::ast::{BinaryOp, Expr, Function, Variable};
use crate::error::{ExprError, Result};

/// Maximum nesting depth of a parsed expression
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Comma,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("identifier '{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    pos: usize,
}

/// Parses `input` into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_additive()?;

    if let Some(extra) = parser.peek() {
        return Err(ExprError::UnexpectedToken {
            found: extra.token.describe(),
            pos: extra.pos,
        });
    }

    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let (token, next) = lex_number(input, &chars, i)?;
            tokens.push(Spanned { token, pos });
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let end = chars.get(i).map_or(input.len(), |(p, _)| *p);
            tokens.push(Spanned {
                token: Token::Identifier(input[chars[start].0..end].to_string()),
                pos,
            });
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                if chars.get(i + 1).is_some_and(|(_, n)| *n == '*') {
                    i += 1;
                    Token::Caret
                } else {
                    Token::Star
                }
            }
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(ExprError::UnexpectedChar { ch: other, pos }),
        };
        tokens.push(Spanned { token, pos });
        i += 1;
    }

    Ok(tokens)
}

/// Lexes a decimal literal with optional exponent (`10e8`, `2.5E-3`, `.5`).
fn lex_number(input: &str, chars: &[(usize, char)], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
        i += 1;
    }

    // exponent only when digits follow: `2e` lexes as `2` then `e`
    if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j].1, '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].1.is_ascii_digit() {
            while j < chars.len() && chars[j].1.is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    let begin = chars[start].0;
    let end = chars.get(i).map_or(input.len(), |(p, _)| *p);
    let text = &input[begin..end];
    let value: f64 = text.parse().map_err(|_| ExprError::InvalidNumber {
        text: text.to_string(),
        pos: begin,
    })?;

    Ok((Token::Number(value), i))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn consume(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Enters one nesting level at token position `pos`
    fn descend(&mut self, pos: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { pos });
        }
        Ok(())
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;

        while let Some(token) = self.peek() {
            let op = match token.token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            let pos = token.pos;
            self.consume();
            self.descend(pos)?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token.token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => break,
            };
            let pos = token.pos;
            self.consume();
            self.descend(pos)?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let Some(Spanned { token, pos }) = self.peek().cloned() else {
            return self.parse_power();
        };
        let negate = match token {
            Token::Minus => true,
            Token::Plus => false,
            _ => return self.parse_power(),
        };

        self.consume();
        self.descend(pos)?;
        let operand = self.parse_unary()?;
        self.depth -= 1;

        if negate {
            Ok(Expr::Neg(Box::new(operand)))
        } else {
            Ok(operand)
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;

        if let Some(Spanned {
            token: Token::Caret,
            pos,
        }) = self.peek().cloned()
        {
            self.consume();
            self.descend(pos)?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(Spanned { token, pos }) = self.consume() else {
            return Err(ExprError::UnexpectedEnd);
        };

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Identifier(name) => {
                if let Some(Token::LParen) = self.peek_token() {
                    self.parse_call(name, pos)
                } else {
                    resolve_name(&name, pos)
                }
            }
            Token::LParen => {
                self.descend(pos)?;
                let inner = self.parse_additive()?;
                self.expect_close(pos)?;
                self.depth -= 1;
                Ok(inner)
            }
            other => Err(ExprError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }

    fn parse_call(&mut self, name: String, pos: usize) -> Result<Expr> {
        let function = Function::from_name(&name)
            .ok_or_else(|| ExprError::UnknownIdentifier { name: name.clone(), pos })?;

        let open = self.consume().map_or(pos, |s| s.pos);
        self.descend(open)?;
        let mut args = Vec::new();

        if let Some(Token::RParen) = self.peek_token() {
            self.consume();
        } else {
            loop {
                args.push(self.parse_additive()?);
                match self.peek_token() {
                    Some(Token::Comma) => {
                        self.consume();
                    }
                    _ => break,
                }
            }
            self.expect_close(open)?;
        }
        self.depth -= 1;

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(ExprError::Arity {
                name,
                expected,
                found: args.len(),
                pos,
            });
        }

        Ok(Expr::Call(function, args))
    }

    fn expect_close(&mut self, open: usize) -> Result<()> {
        match self.consume() {
            Some(Spanned {
                token: Token::RParen,
                ..
            }) => Ok(()),
            Some(Spanned { token, pos }) => Err(ExprError::UnexpectedToken {
                found: token.describe(),
                pos,
            }),
            None => Err(ExprError::UnclosedParen { pos: open }),
        }
    }
}

fn resolve_name(name: &str, pos: usize) -> Result<Expr> {
    if let Some(var) = Variable::from_name(name) {
        return Ok(Expr::Var(var));
    }
    match name {
        "pi" => Ok(Expr::Number(std::f64::consts::PI)),
        "e" => Ok(Expr::Number(std::f64::consts::E)),
        "tau" => Ok(Expr::Number(std::f64::consts::TAU)),
        _ => Err(ExprError::UnknownIdentifier {
            name: name.to_string(),
            pos,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scientific_literals() {
        assert_eq!(parse("10e8").unwrap(), Expr::Number(10e8));
        assert_eq!(parse("2.5E-3").unwrap(), Expr::Number(2.5e-3));
        assert_eq!(parse(".5").unwrap(), Expr::Number(0.5));
    }

    #[test]
    fn number_followed_by_constant_e_is_not_an_exponent() {
        // "2e" has no exponent digits, so the trailing "e" is a separate identifier.
        let err = parse("2e").unwrap_err();
        assert!(matches!(err, ExprError::UnexpectedToken { pos: 1, .. }));
    }

    #[test]
    fn double_star_is_power() {
        assert_eq!(parse("x**2").unwrap(), parse("x^2").unwrap());
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let expr = parse("-2^2").unwrap();
        assert_eq!(
            expr,
            Expr::Neg(Box::new(Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Number(2.0)),
                Box::new(Expr::Number(2.0)),
            )))
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        assert_eq!(
            parse("x $ 2").unwrap_err(),
            ExprError::UnexpectedChar { ch: '$', pos: 2 }
        );
    }

    #[test]
    fn rejects_unknown_identifiers() {
        assert_eq!(
            parse("1 + w").unwrap_err(),
            ExprError::UnknownIdentifier {
                name: "w".to_string(),
                pos: 4
            }
        );
        assert!(matches!(
            parse("foo(1)").unwrap_err(),
            ExprError::UnknownIdentifier { .. }
        ));
    }

    #[test]
    fn reports_unclosed_parenthesis() {
        assert_eq!(parse("(1 + 2").unwrap_err(), ExprError::UnclosedParen { pos: 0 });
        assert_eq!(parse("sin(1").unwrap_err(), ExprError::UnclosedParen { pos: 3 });
    }

    #[test]
    fn reports_trailing_tokens_and_empty_input() {
        assert!(matches!(
            parse("1 2").unwrap_err(),
            ExprError::UnexpectedToken { pos: 2, .. }
        ));
        assert_eq!(parse("   ").unwrap_err(), ExprError::Empty);
        assert_eq!(parse("1 +").unwrap_err(), ExprError::UnexpectedEnd);
    }

    #[test]
    fn checks_function_arity() {
        assert!(matches!(
            parse("sin(1, 2)").unwrap_err(),
            ExprError::Arity { found: 2, .. }
        ));
        assert!(matches!(
            parse("atan2(1)").unwrap_err(),
            ExprError::Arity { found: 1, .. }
        ));
        assert!(parse("log(8, 2)").is_ok());
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let nested = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(parse(&nested).unwrap_err(), ExprError::TooDeep { pos: MAX_DEPTH });

        let signs = format!("{}x", "-".repeat(10_000));
        assert!(matches!(parse(&signs).unwrap_err(), ExprError::TooDeep { .. }));

        let powers = vec!["2"; 10_000].join("^");
        assert!(matches!(parse(&powers).unwrap_err(), ExprError::TooDeep { .. }));

        let calls = format!("{}x{}", "sin(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse(&calls).unwrap_err(), ExprError::TooDeep { .. }));
    }

    #[test]
    fn long_operator_chains_are_capped() {
        // a left-leaning chain grows one level per operator
        let sum = vec!["1"; 10_000].join(" + ");
        assert!(matches!(parse(&sum).unwrap_err(), ExprError::TooDeep { .. }));

        let product = vec!["x"; 10_000].join("*");
        assert!(matches!(parse(&product).unwrap_err(), ExprError::TooDeep { .. }));
    }

    #[test]
    fn nesting_below_the_limit_parses() {
        let nested = format!("{}t{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse(&nested).unwrap(), Expr::Var(Variable::T));
        assert!(parse(&vec!["1"; 100].join(" + ")).is_ok());
        assert!(parse(&format!("{}1", "-".repeat(200))).is_ok());
    }
}
