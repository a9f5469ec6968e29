//! Console Assembler Module
//!
//! Converts assembly language source code into loadable machine code plus
//! the debug metadata a front end needs (symbol table and source map).
//!
//! # Passes
//!
//! Source files (with `.include`s spliced in) are parsed into an owned list
//! of statements, each a label, constant, directive or instruction. Two
//! passes then walk that list:
//!
//! 1. **Layout**: track the location counter, bind labels and constants and
//!    size every statement without resolving forward references
//! 2. **Emit**: evaluate operands with the complete symbol table, encode,
//!    and record one source map entry per byte-emitting line
//!
//! # Errors
//!
//! Errors never stop assembly. Every problem is collected into
//! [`AssemblyOutput::errors`] and the offending statement is skipped or
//! zero-filled so later addresses stay stable. Callers must check
//! [`AssemblyOutput::is_loadable`] before loading the segments.
//!
//! # Examples
//!
//! ```
//! use vconsole::{assemble, NoIncludes};
//!
//! let source = "
//!     .org $0200
//! start:
//!     LD R0, #<message
//!     LD R1, #>message
//!     JMP start
//! message:
//!     .string \"HI\"
//! ";
//! let output = assemble(source, "main.asm", &NoIncludes);
//! assert!(output.is_loadable());
//! assert_eq!(output.symbol_table["start"], 0x0200);
//! assert_eq!(output.symbol_table["message"], 0x0209);
//! assert_eq!(output.segments[0].data[2], 0x09); // <message
//! ```

pub mod encoder;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod source_map;
pub mod symbol_table;

use encoder::{fit_byte, fit_word, EncodeError};
use expr::{Expr, Undefined};
use parser::{parse_line, DataItem, Directive, Line};
use serde::{Deserialize, Serialize};
use source_map::SourceMap;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use symbol_table::{Symbol, SymbolKind, SymbolTable};
use thiserror::Error;

/// Size of the address space the location counter may cover
const ADDRESS_SPACE: u32 = 0x1_0000;

/// Maximum `.include` nesting
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// A contiguous run of emitted bytes with a fixed load address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_address: u16,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(start_address: u16) -> Self {
        Self {
            start_address,
            data: Vec::new(),
        }
    }

    /// One past the last address covered
    pub fn end_address(&self) -> u32 {
        self.start_address as u32 + self.data.len() as u32
    }
}

/// Complete output from assembling source code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyOutput {
    /// Emitted code and data, in source order
    pub segments: Vec<Segment>,

    /// Label name to address
    pub symbol_table: BTreeMap<String, u16>,

    /// Constant name to value (`.define`, `.equ`, `=`)
    pub constants: BTreeMap<String, i32>,

    pub source_map: SourceMap,

    /// Every problem found, in discovery order
    pub errors: Vec<AssemblerError>,
}

impl AssemblyOutput {
    /// True if no errors were reported and the segments may be loaded
    pub fn is_loadable(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of emitted bytes
    pub fn byte_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.data.len()).sum()
    }

    /// Flattens all segments into one image starting at the lowest segment
    /// address. Gaps are zero-filled and later segments overwrite earlier ones.
    ///
    /// Returns `None` when nothing was emitted.
    pub fn to_image(&self) -> Option<(u16, Vec<u8>)> {
        let start = self.segments.iter().map(|s| s.start_address).min()?;
        let end = self.segments.iter().map(Segment::end_address).max()?;
        let mut image = vec![0u8; (end - start as u32) as usize];
        for segment in &self.segments {
            let offset = (segment.start_address - start) as usize;
            image[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
        }
        Some((start, image))
    }
}

/// An error encountered during assembly
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{file}:{line}: {message}")]
pub struct AssemblerError {
    /// Error type classification
    pub error_type: ErrorType,

    /// File the error was found in
    pub file: String,

    /// Line number where error occurred (1-indexed)
    pub line: usize,

    /// Column number where error starts (0-indexed)
    pub column: usize,

    /// Human-readable error message
    pub message: String,
}

/// Classification of assembly errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorType {
    /// Syntax error (invalid format, unexpected character)
    SyntaxError,

    /// Reference to a label or constant that is never defined
    UndefinedSymbol,

    /// Duplicate label or constant definition
    DuplicateLabel,

    /// Invalid label name (too long, starts with digit, register name)
    InvalidLabel,

    /// Invalid mnemonic (not a recognized instruction)
    InvalidMnemonic,

    /// Operand shape not accepted by the instruction
    InvalidOperand,

    /// Value out of range for its field, or code past $FFFF
    RangeError,

    /// Unknown directive or bad directive argument
    InvalidDirective,

    /// `.include` could not be resolved, or includes form a cycle
    IncludeError,
}

/// Supplies the text of `.include`d files.
///
/// Implementations decide what a path means: a key in an in-memory project,
/// a file relative to a directory, or nothing at all.
pub trait FileResolver {
    /// Returns the contents of `path`.
    fn resolve(&self, path: &str) -> io::Result<String>;
}

/// Resolver for sources that must not include anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl FileResolver for NoIncludes {
    fn resolve(&self, path: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("includes are not available ({path})"),
        ))
    }
}

/// In-memory project: path to contents
impl FileResolver for HashMap<String, String> {
    fn resolve(&self, path: &str) -> io::Result<String> {
        self.get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file in project"))
    }
}

/// Reads includes from disk relative to a root directory
#[derive(Debug, Clone)]
pub struct FsResolver {
    pub root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileResolver for FsResolver {
    fn resolve(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(path))
    }
}

/// A parsed statement with its source location
#[derive(Debug)]
struct SourceStatement {
    line: Line,
    file: Rc<str>,
    line_number: usize,
    column: usize,
}

/// Pass 1 result for one statement
#[derive(Debug, Clone, Copy, Default)]
struct Layout {
    /// Location counter at the statement (the new origin for `.org`)
    address: u32,
    size: u32,
    zero_page: bool,
    skip: bool,
}

struct Assembler<'r> {
    resolver: &'r dyn FileResolver,
    statements: Vec<SourceStatement>,
    include_stack: Vec<String>,
    symbols: SymbolTable,
    errors: Vec<AssemblerError>,
}

impl AssemblerError {
    fn at(statement: &SourceStatement, error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            file: statement.file.to_string(),
            line: statement.line_number,
            column: statement.column,
            message: message.into(),
        }
    }
}

impl<'r> Assembler<'r> {
    fn new(resolver: &'r dyn FileResolver) -> Self {
        Self {
            resolver,
            statements: Vec::new(),
            include_stack: Vec::new(),
            symbols: SymbolTable::new(),
            errors: Vec::new(),
        }
    }

    /// Parses `source` and splices in its includes.
    fn collect(&mut self, file: &str, source: &str) {
        self.include_stack.push(file.to_string());
        let file_name: Rc<str> = Rc::from(file);

        for (index, text) in source.lines().enumerate() {
            let line_number = index + 1;
            let statements = match parse_line(text) {
                Ok(statements) => statements,
                Err(err) => {
                    self.errors.push(AssemblerError {
                        error_type: err.error_type,
                        file: file.to_string(),
                        line: line_number,
                        column: err.column,
                        message: err.message,
                    });
                    // Keep a valid leading label so its references still resolve
                    err.recovered
                }
            };

            for statement in statements {
                let statement = SourceStatement {
                    line: statement.line,
                    file: Rc::clone(&file_name),
                    line_number,
                    column: statement.column,
                };
                match &statement.line {
                    Line::Directive(Directive::Include(path)) => {
                        let path = path.clone();
                        self.include(&path, &statement);
                    }
                    _ => self.statements.push(statement),
                }
            }
        }

        self.include_stack.pop();
    }

    fn include(&mut self, path: &str, from: &SourceStatement) {
        if self.include_stack.iter().any(|open| open == path) {
            let chain = self.include_stack.join(" -> ");
            self.errors.push(AssemblerError::at(
                from,
                ErrorType::IncludeError,
                format!("include cycle: {chain} -> {path}"),
            ));
            return;
        }
        if self.include_stack.len() >= MAX_INCLUDE_DEPTH {
            self.errors.push(AssemblerError::at(
                from,
                ErrorType::IncludeError,
                format!("includes nested deeper than {MAX_INCLUDE_DEPTH}"),
            ));
            return;
        }

        match self.resolver.resolve(path) {
            Ok(text) => {
                log::debug!("including {path} from {}:{}", from.file, from.line_number);
                self.collect(path, &text);
            }
            Err(err) => self.errors.push(AssemblerError::at(
                from,
                ErrorType::IncludeError,
                format!("cannot include \"{path}\": {err}"),
            )),
        }
    }

    fn define(&mut self, statement: &SourceStatement, name: &str, value: i32, kind: SymbolKind) {
        let symbol = Symbol {
            name: name.to_string(),
            value,
            kind,
            file: statement.file.to_string(),
            line: statement.line_number,
        };
        if let Err(existing) = self.symbols.add_symbol(symbol) {
            let message = format!(
                "'{name}' is already defined at {}:{}",
                existing.file, existing.line
            );
            self.errors.push(AssemblerError::at(
                statement,
                ErrorType::DuplicateLabel,
                message,
            ));
        }
    }

    /// Pass 1: location counter, symbols and sizes.
    fn layout(&mut self) -> Vec<Layout> {
        let statements = std::mem::take(&mut self.statements);
        let mut layouts = Vec::with_capacity(statements.len());
        let mut pc: u32 = 0;

        for statement in &statements {
            let mut layout = Layout {
                address: pc,
                ..Layout::default()
            };
            let symbols = &self.symbols;
            let lookup = |name: &str| symbols.value(name);

            let sized: Result<u32, EncodeError> = match &statement.line {
                Line::Label(name) => {
                    if pc >= ADDRESS_SPACE {
                        Err(range_error(format!("label '{name}' is past $FFFF")))
                    } else {
                        self.define(statement, name, pc as i32, SymbolKind::Label);
                        Ok(0)
                    }
                }
                Line::Constant { name, value } => match value.evaluate(&lookup, pc) {
                    Ok(value) => {
                        self.define(statement, name, value, SymbolKind::Constant);
                        Ok(0)
                    }
                    Err(Undefined(missing)) => Err(EncodeError {
                        error_type: ErrorType::UndefinedSymbol,
                        message: format!(
                            "constant '{name}' uses '{missing}', which is not defined before it"
                        ),
                    }),
                },
                Line::Directive(Directive::Org(origin)) => {
                    match evaluate_now(origin, &lookup, pc, ".org address")
                        .and_then(|value| address_in_range(value, ".org address"))
                    {
                        Ok(origin) => {
                            pc = origin;
                            layout.address = origin;
                            Ok(0)
                        }
                        Err(err) => Err(err),
                    }
                }
                Line::Directive(Directive::Byte(items)) => {
                    Ok(items.iter().map(DataItem::size).sum::<usize>() as u32)
                }
                Line::Directive(Directive::Word(values)) => Ok(values.len() as u32 * 2),
                Line::Directive(Directive::Str(text)) => Ok(text.len() as u32 + 1),
                Line::Directive(Directive::Fill { count, .. }) => {
                    evaluate_now(count, &lookup, pc, ".fill count").and_then(|count| {
                        u32::try_from(count)
                            .ok()
                            .filter(|&count| count <= ADDRESS_SPACE)
                            .ok_or_else(|| range_error(format!(".fill count {count} out of range")))
                    })
                }
                Line::Directive(Directive::Include(_)) => Ok(0),
                Line::Instruction { mnemonic, operands } => {
                    let zero_page = |expr: &Expr| {
                        expr.evaluate(&lookup, pc)
                            .is_ok_and(|value| (0..=0xFF).contains(&value))
                    };
                    encoder::plan(mnemonic, operands, &zero_page).map(|plan| {
                        layout.zero_page = plan.is_zero_page();
                        plan.length() as u32
                    })
                }
            };

            match sized {
                Ok(size) if layout.address + size > ADDRESS_SPACE => {
                    self.errors.push(AssemblerError::at(
                        statement,
                        ErrorType::RangeError,
                        format!("code at ${:04X} extends past $FFFF", layout.address),
                    ));
                    layout.skip = true;
                }
                Ok(size) => {
                    layout.size = size;
                    pc = layout.address + size;
                }
                Err(err) => {
                    self.errors
                        .push(AssemblerError::at(statement, err.error_type, err.message));
                    layout.skip = true;
                }
            }
            layouts.push(layout);
        }

        self.statements = statements;
        layouts
    }

    /// Pass 2: encode and emit.
    fn emit(&mut self, layouts: &[Layout]) -> (Vec<Segment>, SourceMap) {
        let mut segments = Vec::new();
        let mut current = Segment::new(0);
        let mut source_map = SourceMap::new();

        for (statement, layout) in self.statements.iter().zip(layouts) {
            if layout.skip {
                continue;
            }
            if let Line::Directive(Directive::Org(_)) = statement.line {
                if !current.data.is_empty() {
                    segments.push(current);
                }
                current = Segment::new(layout.address as u16);
                continue;
            }
            if layout.size == 0 {
                continue;
            }

            let bytes = match emit_statement(&statement.line, layout, &self.symbols) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.errors
                        .push(AssemblerError::at(statement, err.error_type, err.message));
                    vec![0; layout.size as usize]
                }
            };
            debug_assert_eq!(bytes.len(), layout.size as usize);

            source_map.add_mapping(layout.address as u16, &statement.file, statement.line_number);
            current.data.extend_from_slice(&bytes);
        }

        if !current.data.is_empty() {
            segments.push(current);
        }
        (segments, source_map)
    }
}

fn range_error(message: String) -> EncodeError {
    EncodeError {
        error_type: ErrorType::RangeError,
        message,
    }
}

/// Evaluates an expression that must be known during pass 1.
fn evaluate_now(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<i32>,
    pc: u32,
    what: &str,
) -> Result<i32, EncodeError> {
    expr.evaluate(lookup, pc).map_err(|Undefined(name)| EncodeError {
        error_type: ErrorType::UndefinedSymbol,
        message: format!("{what} uses '{name}', which is not defined before it"),
    })
}

fn address_in_range(value: i32, what: &str) -> Result<u32, EncodeError> {
    u32::try_from(value)
        .ok()
        .filter(|&value| value < ADDRESS_SPACE)
        .ok_or_else(|| range_error(format!("{what} {value} out of range")))
}

/// Produces the bytes of one sized statement.
fn emit_statement(
    line: &Line,
    layout: &Layout,
    symbols: &SymbolTable,
) -> Result<Vec<u8>, EncodeError> {
    let lookup = |name: &str| symbols.value(name);
    let eval = |expr: &Expr| -> Result<i32, EncodeError> { Ok(expr.evaluate(&lookup, layout.address)?) };

    match line {
        Line::Directive(Directive::Byte(items)) => {
            let mut bytes = Vec::with_capacity(layout.size as usize);
            for item in items {
                match item {
                    DataItem::Expr(expr) => bytes.push(fit_byte(eval(expr)?)?),
                    DataItem::Str(text) => bytes.extend_from_slice(text.as_bytes()),
                }
            }
            Ok(bytes)
        }
        Line::Directive(Directive::Word(values)) => {
            let mut bytes = Vec::with_capacity(layout.size as usize);
            for expr in values {
                bytes.extend_from_slice(&fit_word(eval(expr)?)?.to_le_bytes());
            }
            Ok(bytes)
        }
        Line::Directive(Directive::Str(text)) => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.push(0);
            Ok(bytes)
        }
        Line::Directive(Directive::Fill { value, .. }) => {
            let fill = match value {
                Some(expr) => fit_byte(eval(expr)?)?,
                None => 0,
            };
            Ok(vec![fill; layout.size as usize])
        }
        Line::Instruction { mnemonic, operands } => {
            let zero_page = |_: &Expr| layout.zero_page;
            let plan = encoder::plan(mnemonic, operands, &zero_page)?;
            encoder::encode(&plan, &eval)
        }
        Line::Label(_) | Line::Constant { .. } | Line::Directive(_) => Ok(Vec::new()),
    }
}

/// Assemble source code into machine code
///
/// # Arguments
///
/// * `source` - The assembly source code text
/// * `file` - Name of the source file, used in errors and the source map
/// * `resolver` - Supplies the contents of `.include`d files
///
/// # Returns
///
/// The assembled segments, symbol table, constants and source map, plus every
/// error found. The function is pure: the same inputs always produce the
/// same output.
pub fn assemble(source: &str, file: &str, resolver: &dyn FileResolver) -> AssemblyOutput {
    let mut assembler = Assembler::new(resolver);
    assembler.collect(file, source);

    let layouts = assembler.layout();
    let (segments, source_map) = assembler.emit(&layouts);

    let output = AssemblyOutput {
        segments,
        symbol_table: assembler.symbols.labels(),
        constants: assembler.symbols.constants(),
        source_map,
        errors: assembler.errors,
    };
    log::debug!(
        "assembled {file}: {} segments, {} bytes, {} symbols, {} errors",
        output.segments.len(),
        output.byte_count(),
        output.symbol_table.len(),
        output.errors.len()
    );
    output
}
