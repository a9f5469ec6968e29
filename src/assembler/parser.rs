//! Assembly source parser
//!
//! Turns one source line into zero or more [`Statement`]s. A line such as
//! `loop: ADD R0, #1 ; comment` yields a label statement followed by an
//! instruction statement; blank and comment-only lines yield nothing.
//!
//! Mnemonics are kept as written and checked by the encoder, so an unknown
//! mnemonic still parses and its operands are still syntax-checked.

use super::expr::{parse_expr, Expr};
use super::lexer::{tokenize, Token, TokenStream, TokenType};
use super::ErrorType;
use crate::{Register, RegisterPair};

/// Maximum label length in characters
pub const MAX_LABEL_LENGTH: usize = 32;

/// Operand as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandSyntax {
    /// `#expr`
    Immediate(Expr),
    /// `Rn`
    Register(Register),
    /// `[expr]`, zero page or absolute depending on the value
    Memory(Expr),
    /// `[expr + Rn]`
    Indexed { base: Expr, index: Register },
    /// `[Rh:Rl]`
    Pair(RegisterPair),
    /// Bare `expr`, a jump, call or branch target
    Target(Expr),
}

/// One item of a `.byte` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Expr(Expr),
    Str(String),
}

impl DataItem {
    /// Bytes this item occupies in a `.byte` list
    pub fn size(&self) -> usize {
        match self {
            Self::Expr(_) => 1,
            Self::Str(text) => text.len(),
        }
    }
}

/// Assembler directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `.org addr` - set the location counter and start a new segment
    Org(Expr),
    /// `.byte e | "text", ...`
    Byte(Vec<DataItem>),
    /// `.word e, ...` - little-endian 16-bit values
    Word(Vec<Expr>),
    /// `.string "text"` - text followed by a NUL byte
    Str(String),
    /// `.fill count[, value]`
    Fill { count: Expr, value: Option<Expr> },
    /// `.include "path"`
    Include(String),
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `name:`
    Label(String),
    /// `.define name expr`, `.equ name expr` or `name = expr`
    Constant { name: String, value: Expr },
    Directive(Directive),
    Instruction {
        mnemonic: String,
        operands: Vec<OperandSyntax>,
    },
}

/// A statement with the column it starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: Line,
    pub column: usize,
}

/// A parse failure on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub error_type: ErrorType,
    pub column: usize,
    pub message: String,

    /// Statements that parsed before the failure (a leading `label:`)
    pub recovered: Vec<Statement>,
}

impl ParseError {
    fn new(error_type: ErrorType, column: usize, message: impl Into<String>) -> Self {
        Self {
            error_type,
            column,
            message: message.into(),
            recovered: Vec::new(),
        }
    }

    fn syntax(column: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorType::SyntaxError, column, message)
    }
}

/// Validate a label or constant name
///
/// Names must:
/// - Start with a letter or underscore
/// - Contain only alphanumeric characters and underscores
/// - Not exceed 32 characters in length
/// - Not be a register name
pub fn validate_label(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("label name cannot be empty".to_string());
    };

    if name.len() > MAX_LABEL_LENGTH {
        return Err(format!(
            "label name too long (max {MAX_LABEL_LENGTH} characters): {name}"
        ));
    }

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(format!("label must start with a letter, not '{first}'"));
    }

    if let Some(ch) = name.chars().find(|&ch| !ch.is_ascii_alphanumeric() && ch != '_') {
        return Err(format!(
            "label contains invalid character '{ch}' (only letters, digits, and underscores allowed)"
        ));
    }

    if Register::parse(name).is_some() {
        return Err(format!("register name {name} cannot be used as a label"));
    }

    Ok(())
}

/// Parse one source line
///
/// When the line fails after a valid leading label, the label is still
/// returned in [`ParseError::recovered`] so later references resolve.
///
/// # Examples
///
/// ```
/// use vconsole::assembler::parser::{parse_line, Line};
///
/// let statements = parse_line("start: LD R0, #1 ; init").unwrap();
/// assert_eq!(statements.len(), 2);
/// assert_eq!(statements[0].line, Line::Label("start".to_string()));
/// assert!(matches!(statements[1].line, Line::Instruction { .. }));
///
/// let err = parse_line("done: LD R0, @").unwrap_err();
/// assert_eq!(err.recovered[0].line, Line::Label("done".to_string()));
/// ```
pub fn parse_line(text: &str) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    match parse_statements(text, &mut statements) {
        Ok(()) => Ok(statements),
        Err(mut err) => {
            err.recovered = statements;
            Err(err)
        }
    }
}

/// Finds a `label:` prefix on a line that does not tokenize as a whole.
fn leading_label(text: &str) -> Option<Statement> {
    let (head, _) = text.split_once(':')?;
    match tokenize(head).ok()?.as_slice() {
        [Token {
            token_type: TokenType::Identifier(name),
            column,
            ..
        }, Token {
            token_type: TokenType::Eof,
            ..
        }] if validate_label(name).is_ok() => Some(Statement {
            line: Line::Label(name.clone()),
            column: *column,
        }),
        _ => None,
    }
}

fn parse_statements(text: &str, statements: &mut Vec<Statement>) -> Result<(), ParseError> {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(err) => {
            statements.extend(leading_label(text));
            return Err(ParseError::syntax(err.column(), err.to_string()));
        }
    };
    let mut stream = TokenStream::new(tokens);

    // label:
    if let (Some(TokenType::Identifier(name)), Some(TokenType::Colon)) = (
        stream.peek().map(|t| &t.token_type),
        stream.peek_n(1).map(|t| &t.token_type),
    ) {
        let name = name.clone();
        let column = stream.current_column();
        validate_label(&name).map_err(|msg| ParseError::new(ErrorType::InvalidLabel, column, msg))?;
        stream.advance();
        stream.advance();
        statements.push(Statement {
            line: Line::Label(name),
            column,
        });
    }

    if stream.is_eof() {
        return Ok(());
    }

    let column = stream.current_column();
    let line = match stream.consume().map(|t| t.token_type) {
        Some(TokenType::Identifier(name)) if stream.peek_type() == &TokenType::Equal => {
            validate_label(&name)
                .map_err(|msg| ParseError::new(ErrorType::InvalidLabel, column, msg))?;
            stream.advance();
            let value = expression(&mut stream)?;
            Line::Constant { name, value }
        }
        Some(TokenType::Identifier(mnemonic)) => Line::Instruction {
            mnemonic,
            operands: parse_operands(&mut stream)?,
        },
        Some(TokenType::Directive(name)) => parse_directive(&name, column, &mut stream)?,
        _ => return Err(ParseError::syntax(column, "expected label, mnemonic or directive")),
    };

    if !stream.is_eof() {
        return Err(ParseError::syntax(
            stream.current_column(),
            "unexpected text after statement",
        ));
    }

    statements.push(Statement { line, column });
    Ok(())
}

fn expression(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let column = stream.current_column();
    parse_expr(stream).map_err(|msg| ParseError::syntax(column, msg))
}

fn expect(stream: &mut TokenStream, expected: TokenType, what: &str) -> Result<(), ParseError> {
    if stream.eat(&expected) {
        Ok(())
    } else {
        Err(ParseError::syntax(stream.current_column(), format!("expected {what}")))
    }
}

fn peek_register(stream: &TokenStream, n: usize) -> Option<Register> {
    match stream.peek_n(n).map(|t| &t.token_type) {
        Some(TokenType::Identifier(name)) => Register::parse(name),
        _ => None,
    }
}

fn parse_operands(stream: &mut TokenStream) -> Result<Vec<OperandSyntax>, ParseError> {
    let mut operands = Vec::new();
    if stream.is_eof() {
        return Ok(operands);
    }
    loop {
        operands.push(parse_operand(stream)?);
        if !stream.eat(&TokenType::Comma) {
            return Ok(operands);
        }
    }
}

fn parse_operand(stream: &mut TokenStream) -> Result<OperandSyntax, ParseError> {
    if stream.eat(&TokenType::Hash) {
        return Ok(OperandSyntax::Immediate(expression(stream)?));
    }

    if let Some(reg) = peek_register(stream, 0) {
        stream.advance();
        return Ok(OperandSyntax::Register(reg));
    }

    if !stream.eat(&TokenType::LBracket) {
        return Ok(OperandSyntax::Target(expression(stream)?));
    }

    // [Rh:Rl]
    if let (Some(high), Some(TokenType::Colon)) = (
        peek_register(stream, 0),
        stream.peek_n(1).map(|t| &t.token_type),
    ) {
        let column = stream.current_column();
        stream.advance();
        stream.advance();
        let low = peek_register(stream, 0)
            .ok_or_else(|| ParseError::syntax(stream.current_column(), "expected register"))?;
        stream.advance();
        let pair = RegisterPair::from_registers(high, low).ok_or_else(|| {
            ParseError::new(
                ErrorType::InvalidOperand,
                column,
                format!("{high}:{low} is not a register pair (use R0:R1, R2:R3 or R4:R5)"),
            )
        })?;
        expect(stream, TokenType::RBracket, "']'")?;
        return Ok(OperandSyntax::Pair(pair));
    }

    let base = expression(stream)?;
    let operand = if stream.eat(&TokenType::Plus) {
        let index = peek_register(stream, 0)
            .ok_or_else(|| ParseError::syntax(stream.current_column(), "expected index register"))?;
        stream.advance();
        OperandSyntax::Indexed { base, index }
    } else {
        OperandSyntax::Memory(base)
    };
    expect(stream, TokenType::RBracket, "']'")?;
    Ok(operand)
}

fn parse_string(stream: &mut TokenStream) -> Result<String, ParseError> {
    let column = stream.current_column();
    match stream.consume().map(|t| t.token_type) {
        Some(TokenType::Str(text)) => Ok(text),
        _ => Err(ParseError::syntax(column, "expected string literal")),
    }
}

fn parse_name(stream: &mut TokenStream) -> Result<String, ParseError> {
    let column = stream.current_column();
    match stream.consume().map(|t| t.token_type) {
        Some(TokenType::Identifier(name)) => {
            validate_label(&name)
                .map_err(|msg| ParseError::new(ErrorType::InvalidLabel, column, msg))?;
            Ok(name)
        }
        _ => Err(ParseError::syntax(column, "expected constant name")),
    }
}

fn parse_directive(
    name: &str,
    column: usize,
    stream: &mut TokenStream,
) -> Result<Line, ParseError> {
    let directive = match name {
        "org" => Directive::Org(expression(stream)?),
        "byte" | "db" => {
            let mut items = Vec::new();
            loop {
                let item = match stream.peek_type() {
                    TokenType::Str(_) => DataItem::Str(parse_string(stream)?),
                    _ => DataItem::Expr(expression(stream)?),
                };
                items.push(item);
                if !stream.eat(&TokenType::Comma) {
                    break;
                }
            }
            Directive::Byte(items)
        }
        "word" | "dw" => {
            let mut values = vec![expression(stream)?];
            while stream.eat(&TokenType::Comma) {
                values.push(expression(stream)?);
            }
            Directive::Word(values)
        }
        "string" | "asciz" => Directive::Str(parse_string(stream)?),
        "fill" => {
            let count = expression(stream)?;
            let value = if stream.eat(&TokenType::Comma) {
                Some(expression(stream)?)
            } else {
                None
            };
            Directive::Fill { count, value }
        }
        "include" => Directive::Include(parse_string(stream)?),
        "define" | "equ" => {
            let name = parse_name(stream)?;
            // Optional separator: `.equ NAME, 5` and `.equ NAME = 5`
            if !stream.eat(&TokenType::Comma) {
                stream.eat(&TokenType::Equal);
            }
            let value = expression(stream)?;
            return Ok(Line::Constant { name, value });
        }
        _ => {
            return Err(ParseError::new(
                ErrorType::InvalidDirective,
                column,
                format!("unknown directive .{name}"),
            ))
        }
    };
    Ok(Line::Directive(directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> Line {
        let mut statements = parse_line(text).unwrap();
        assert_eq!(statements.len(), 1, "{text}");
        statements.remove(0).line
    }

    fn operands(text: &str) -> Vec<OperandSyntax> {
        match single(text) {
            Line::Instruction { operands, .. } => operands,
            other => panic!("not an instruction: {other:?}"),
        }
    }

    #[test]
    fn test_validate_label_valid() {
        assert!(validate_label("START").is_ok());
        assert!(validate_label("loop_1").is_ok());
        assert!(validate_label("_private").is_ok());
        assert!(validate_label("Rx").is_ok());
    }

    #[test]
    fn test_validate_label_invalid() {
        assert!(validate_label("").is_err());
        assert!(validate_label("1START").is_err());
        assert!(validate_label("MY-LABEL").is_err());
        assert!(validate_label("r2").is_err());
        assert!(validate_label(&"A".repeat(33)).is_err());
    }

    #[test]
    fn test_operand_shapes() {
        assert_eq!(
            operands("ld r0, #5"),
            vec![
                OperandSyntax::Register(Register::R0),
                OperandSyntax::Immediate(Expr::Number(5))
            ]
        );
        assert_eq!(
            operands("ST R1, [$80 + R2]")[1],
            OperandSyntax::Indexed {
                base: Expr::Number(0x80),
                index: Register::R2
            }
        );
        assert_eq!(
            operands("LD R0, [R2:R3]")[1],
            OperandSyntax::Pair(RegisterPair::R2R3)
        );
        assert_eq!(
            operands("JMP main"),
            vec![OperandSyntax::Target(Expr::Symbol("main".to_string()))]
        );
        assert!(operands("NOP").is_empty());
    }

    #[test]
    fn test_bad_pair() {
        let err = parse_line("LD R0, [R1:R2]").unwrap_err();
        assert_eq!(err.error_type, ErrorType::InvalidOperand);
    }

    #[test]
    fn test_constants() {
        let expected = Line::Constant {
            name: "WIDTH".to_string(),
            value: Expr::Number(256),
        };
        assert_eq!(single("WIDTH = 256"), expected);
        assert_eq!(single(".define WIDTH 256"), expected);
        assert_eq!(single(".equ WIDTH, 256"), expected);
    }

    #[test]
    fn test_directives() {
        assert_eq!(
            single(".byte 1, \"ab\""),
            Line::Directive(Directive::Byte(vec![
                DataItem::Expr(Expr::Number(1)),
                DataItem::Str("ab".to_string())
            ]))
        );
        assert_eq!(
            single(".include \"lib.asm\""),
            Line::Directive(Directive::Include("lib.asm".to_string()))
        );
        let err = parse_line(".bogus 1").unwrap_err();
        assert_eq!(err.error_type, ErrorType::InvalidDirective);
    }

    #[test]
    fn test_label_only_and_blank() {
        assert_eq!(single("done:"), Line::Label("done".to_string()));
        assert!(parse_line("   ; only a comment").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            parse_line("LD R0, [$10").unwrap_err().error_type,
            ErrorType::SyntaxError
        );
        assert_eq!(
            parse_line("LD R0 R1").unwrap_err().error_type,
            ErrorType::SyntaxError
        );
        assert_eq!(
            parse_line("R1: NOP").unwrap_err().error_type,
            ErrorType::InvalidLabel
        );
    }
}
