//! Operand expressions
//!
//! Expressions appear in immediates, memory operands, jump targets and data
//! directives. The grammar is deliberately small:
//!
//! ```text
//! expr  := ['<' | '>'] sum
//! sum   := unary (('+' | '-') unary)*
//! unary := '-' unary | term
//! term  := number | char | symbol | '*'
//! ```
//!
//! `<` and `>` apply to the whole expression and select its low or high byte,
//! so `LD R0, #>screen + 1` loads the high byte of `screen + 1`.

use super::lexer::{TokenStream, TokenType};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
}

/// An unevaluated expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i32),
    Symbol(String),
    /// `*`, the address of the current line
    Current,
    Neg(Box<Expr>),
    LowByte(Box<Expr>),
    HighByte(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Evaluation failure: the first symbol that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undefined(pub String);

impl Expr {
    /// Evaluates the expression.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Resolves a symbol name to its value
    /// * `current` - Value of `*`
    ///
    /// Arithmetic is done in `i32` with wrapping; range checks belong to the
    /// caller, which knows the width of the field being filled.
    ///
    /// # Examples
    ///
    /// ```
    /// use vconsole::assembler::expr::{parse_expr, Expr};
    /// use vconsole::assembler::lexer::{tokenize, TokenStream};
    ///
    /// let mut tokens = TokenStream::new(tokenize(">table + 2").unwrap());
    /// let expr = parse_expr(&mut tokens).unwrap();
    /// let lookup = |name: &str| (name == "table").then_some(0x12FF);
    /// assert_eq!(expr.evaluate(&lookup, 0), Ok(0x13));
    /// ```
    pub fn evaluate(
        &self,
        lookup: &dyn Fn(&str) -> Option<i32>,
        current: u32,
    ) -> Result<i32, Undefined> {
        Ok(match self {
            Self::Number(value) => *value,
            Self::Symbol(name) => lookup(name).ok_or_else(|| Undefined(name.clone()))?,
            Self::Current => current as i32,
            Self::Neg(inner) => inner.evaluate(lookup, current)?.wrapping_neg(),
            Self::LowByte(inner) => inner.evaluate(lookup, current)? & 0xFF,
            Self::HighByte(inner) => (inner.evaluate(lookup, current)? >> 8) & 0xFF,
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(lookup, current)?;
                let rhs = rhs.evaluate(lookup, current)?;
                match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                }
            }
        })
    }

    /// True if the expression mentions no symbols (and not `*`).
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::Symbol(_) | Self::Current => false,
            Self::Neg(inner) | Self::LowByte(inner) | Self::HighByte(inner) => inner.is_constant(),
            Self::Binary(_, lhs, rhs) => lhs.is_constant() && rhs.is_constant(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if *value < 0 => write!(f, "-${:X}", value.unsigned_abs()),
            Self::Number(value) => write!(f, "${value:X}"),
            Self::Symbol(name) => f.write_str(name),
            Self::Current => f.write_str("*"),
            Self::Neg(inner) => write!(f, "-{inner}"),
            Self::LowByte(inner) => write!(f, "<{inner}"),
            Self::HighByte(inner) => write!(f, ">{inner}"),
            Self::Binary(BinaryOp::Add, lhs, rhs) => write!(f, "{lhs} + {rhs}"),
            Self::Binary(BinaryOp::Sub, lhs, rhs) => write!(f, "{lhs} - {rhs}"),
        }
    }
}

/// Parses an expression, stopping at the first token that cannot continue it.
///
/// Returns a message describing the problem on failure; the caller attaches
/// the location.
pub fn parse_expr(tokens: &mut TokenStream) -> Result<Expr, String> {
    if tokens.eat(&TokenType::Less) {
        return Ok(Expr::LowByte(Box::new(parse_sum(tokens)?)));
    }
    if tokens.eat(&TokenType::Greater) {
        return Ok(Expr::HighByte(Box::new(parse_sum(tokens)?)));
    }
    parse_sum(tokens)
}

fn parse_sum(tokens: &mut TokenStream) -> Result<Expr, String> {
    let mut expr = parse_unary(tokens)?;
    loop {
        let op = match tokens.peek_type() {
            TokenType::Plus => BinaryOp::Add,
            TokenType::Minus => BinaryOp::Sub,
            _ => return Ok(expr),
        };
        // `[$80 + R2]` is an indexed operand, not an addition
        if let Some(TokenType::Identifier(name)) = tokens.peek_n(1).map(|t| &t.token_type) {
            if crate::Register::parse(name).is_some() {
                return Ok(expr);
            }
        }
        tokens.advance();
        let rhs = parse_unary(tokens)?;
        expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
    }
}

fn parse_unary(tokens: &mut TokenStream) -> Result<Expr, String> {
    if tokens.eat(&TokenType::Minus) {
        return Ok(Expr::Neg(Box::new(parse_unary(tokens)?)));
    }

    let token = tokens
        .consume()
        .ok_or_else(|| "expected expression".to_string())?;
    match token.token_type {
        TokenType::Number(value) => i32::try_from(value)
            .map(Expr::Number)
            .map_err(|_| format!("number ${value:X} is too large")),
        TokenType::Char(value) => Ok(Expr::Number(value as i32)),
        TokenType::Star => Ok(Expr::Current),
        TokenType::Identifier(name) => {
            if crate::Register::parse(&name).is_some() {
                Err(format!("register {name} is not allowed in an expression"))
            } else {
                Ok(Expr::Symbol(name))
            }
        }
        TokenType::Eof => Err("expected expression".to_string()),
        other => Err(format!("unexpected {other:?} in expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::tokenize;

    fn parse(text: &str) -> Expr {
        parse_expr(&mut TokenStream::new(tokenize(text).unwrap())).unwrap()
    }

    fn eval(text: &str) -> Result<i32, Undefined> {
        let lookup = |name: &str| match name {
            "start" => Some(0x8000),
            "count" => Some(3),
            _ => None,
        };
        parse(text).evaluate(&lookup, 0x0200)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 - 4"), Ok(-1));
        assert_eq!(eval("-count"), Ok(-3));
        assert_eq!(eval("start + count"), Ok(0x8003));
        assert_eq!(eval("* + 2"), Ok(0x0202));
    }

    #[test]
    fn test_byte_selectors() {
        assert_eq!(eval("<start"), Ok(0x00));
        assert_eq!(eval(">start"), Ok(0x80));
        assert_eq!(eval(">$1234 + 1"), Ok(0x12));
        assert_eq!(eval("<$1234 + 1"), Ok(0x35));
    }

    #[test]
    fn test_undefined_symbol() {
        assert_eq!(eval("later + 1"), Err(Undefined("later".to_string())));
    }

    #[test]
    fn test_stops_before_index_register() {
        let mut tokens = TokenStream::new(tokenize("$80 + R2").unwrap());
        assert_eq!(parse_expr(&mut tokens).unwrap(), Expr::Number(0x80));
        assert_eq!(tokens.peek_type(), &TokenType::Plus);
    }

    #[test]
    fn test_register_rejected() {
        let mut tokens = TokenStream::new(tokenize("R1").unwrap());
        assert!(parse_expr(&mut tokens).is_err());
    }

    #[test]
    fn test_is_constant() {
        assert!(parse("1 + 'A'").is_constant());
        assert!(!parse("start").is_constant());
        assert!(!parse("*").is_constant());
    }
}
