//! Instruction encoder
//!
//! Encoding happens in two steps that mirror the assembler's passes:
//!
//! 1. [`plan`] picks the addressing mode from the operand syntax. It needs no
//!    symbol values except to decide whether `[expr]` fits the zero page, and
//!    that decision is made once by the caller and replayed in pass 2.
//! 2. [`encode`] evaluates the operand expressions, range-checks them for the
//!    chosen field width and produces the machine code through
//!    [`Instruction::encode`].

use super::expr::{Expr, Undefined};
use super::parser::OperandSyntax;
use super::ErrorType;
use crate::opcodes::{Instruction, Mnemonic, Opcode, Operand};
use crate::{AddressingMode, Register, RegisterPair};

/// An encoding failure, located by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub error_type: ErrorType,
    pub message: String,
}

impl EncodeError {
    fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    fn operand(message: impl Into<String>) -> Self {
        Self::new(ErrorType::InvalidOperand, message)
    }
}

impl From<Undefined> for EncodeError {
    fn from(Undefined(name): Undefined) -> Self {
        Self::new(ErrorType::UndefinedSymbol, format!("undefined symbol '{name}'"))
    }
}

/// Operand shape chosen in pass 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape<'a> {
    None,
    Immediate(&'a Expr),
    Register(Register),
    Absolute(&'a Expr),
    ZeroPage(&'a Expr),
    Indexed(&'a Expr, Register),
    Pair(RegisterPair),
}

impl Shape<'_> {
    pub fn mode(&self) -> AddressingMode {
        match self {
            Self::None => AddressingMode::Implied,
            Self::Immediate(_) => AddressingMode::Immediate,
            Self::Register(_) => AddressingMode::Register,
            Self::Absolute(_) => AddressingMode::Absolute,
            Self::ZeroPage(_) => AddressingMode::ZeroPage,
            Self::Indexed(..) => AddressingMode::ZeroPageIndexed,
            Self::Pair(_) => AddressingMode::RegisterPairIndirect,
        }
    }
}

/// A mnemonic with its operands resolved to an addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan<'a> {
    pub mnemonic: Mnemonic,
    pub register: Option<Register>,
    pub shape: Shape<'a>,
}

impl Plan<'_> {
    /// Encoded size in bytes
    pub fn length(&self) -> u8 {
        let opcode = self.mnemonic.opcode();
        if opcode == Opcode::Control {
            return 1;
        }
        let mode = self.shape.mode();
        1 + opcode.has_register_byte(mode) as u8 + mode.payload_bytes()
    }

    /// True if a `[expr]` operand was sized as zero page
    pub fn is_zero_page(&self) -> bool {
        matches!(self.shape, Shape::ZeroPage(_))
    }
}

/// Chooses the addressing mode for `mnemonic` with `operands`.
///
/// # Arguments
///
/// * `zero_page` - Decides whether a `[expr]` operand is encoded as zero page
///
/// # Errors
///
/// - `InvalidMnemonic` if the mnemonic is unknown
/// - `InvalidOperand` if the operand count or shape is not accepted
pub fn plan<'a>(
    mnemonic: &str,
    operands: &'a [OperandSyntax],
    zero_page: &dyn Fn(&Expr) -> bool,
) -> Result<Plan<'a>, EncodeError> {
    let parsed = Mnemonic::parse(mnemonic).ok_or_else(|| {
        EncodeError::new(ErrorType::InvalidMnemonic, format!("unknown mnemonic '{mnemonic}'"))
    })?;
    let opcode = parsed.opcode();
    let name = parsed.name();

    let (register, shape) = match opcode {
        Opcode::Control => match operands {
            [] => (None, Shape::None),
            _ => return Err(EncodeError::operand(format!("{name} takes no operands"))),
        },
        Opcode::Push | Opcode::Pop => match operands {
            [OperandSyntax::Register(reg)] => (None, Shape::Register(*reg)),
            _ => return Err(EncodeError::operand(format!("{name} expects one register"))),
        },
        Opcode::Jmp | Opcode::Call | Opcode::Branch => match operands {
            [OperandSyntax::Target(target)] => (None, Shape::Absolute(target)),
            [OperandSyntax::Pair(pair)] if opcode != Opcode::Branch => (None, Shape::Pair(*pair)),
            _ => {
                return Err(EncodeError::operand(format!(
                    "{name} expects a target address{}",
                    if opcode == Opcode::Branch { "" } else { " or [Rh:Rl]" }
                )))
            }
        },
        _ => match operands {
            [OperandSyntax::Register(reg), source] => (Some(*reg), source_shape(source, zero_page)?),
            _ => {
                return Err(EncodeError::operand(format!(
                    "{name} expects a register and an operand"
                )))
            }
        },
    };

    let mode = shape.mode();
    if !opcode.supports(mode) {
        return Err(EncodeError::operand(format!(
            "{name} does not support {mode:?} addressing"
        )));
    }

    Ok(Plan {
        mnemonic: parsed,
        register,
        shape,
    })
}

fn source_shape<'a>(
    operand: &'a OperandSyntax,
    zero_page: &dyn Fn(&Expr) -> bool,
) -> Result<Shape<'a>, EncodeError> {
    Ok(match operand {
        OperandSyntax::Immediate(value) => Shape::Immediate(value),
        OperandSyntax::Register(reg) => Shape::Register(*reg),
        OperandSyntax::Memory(address) if zero_page(address) => Shape::ZeroPage(address),
        OperandSyntax::Memory(address) => Shape::Absolute(address),
        OperandSyntax::Indexed { base, index } => Shape::Indexed(base, *index),
        OperandSyntax::Pair(pair) => Shape::Pair(*pair),
        OperandSyntax::Target(_) => {
            return Err(EncodeError::operand(
                "bare expression operand; use #value for an immediate or [address] for memory",
            ))
        }
    })
}

/// Checks that `value` fits a byte field. Negative values down to -128 are
/// stored as two's complement.
pub fn fit_byte(value: i32) -> Result<u8, EncodeError> {
    if (-128..=255).contains(&value) {
        Ok(value as u8)
    } else {
        Err(EncodeError::new(
            ErrorType::RangeError,
            format!("value {value} does not fit in 8 bits"),
        ))
    }
}

/// Checks that `value` fits a word field. Negative values down to -32768 are
/// stored as two's complement.
pub fn fit_word(value: i32) -> Result<u16, EncodeError> {
    if (-32768..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(EncodeError::new(
            ErrorType::RangeError,
            format!("value {value} does not fit in 16 bits"),
        ))
    }
}

fn fit_address(value: i32, max: i32) -> Result<i32, EncodeError> {
    if (0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(EncodeError::new(
            ErrorType::RangeError,
            format!("address {value} out of range (max ${max:X})"),
        ))
    }
}

/// Evaluates a plan's operand and encodes it.
///
/// # Examples
///
/// ```
/// use vconsole::assembler::encoder::{encode, plan};
/// use vconsole::assembler::expr::Expr;
/// use vconsole::assembler::parser::{parse_line, Line};
///
/// let statements = parse_line("ST R0, [$0010]").unwrap();
/// let Line::Instruction { mnemonic, operands } = &statements[0].line else { unreachable!() };
///
/// let zero_page = |_: &Expr| false;
/// let planned = plan(mnemonic, operands, &zero_page).unwrap();
/// let bytes = encode(&planned, &|expr| Ok(expr.evaluate(&|_| None, 0)?)).unwrap();
/// assert_eq!(bytes, vec![0x26, 0x00, 0x10, 0x00]);
/// ```
pub fn encode(
    plan: &Plan<'_>,
    eval: &dyn Fn(&Expr) -> Result<i32, EncodeError>,
) -> Result<Vec<u8>, EncodeError> {
    let operand = match plan.shape {
        Shape::None => Operand::None,
        Shape::Immediate(value) => Operand::Immediate(fit_byte(eval(value)?)?),
        Shape::Register(reg) => Operand::Register(reg),
        Shape::Absolute(address) => Operand::Absolute(fit_address(eval(address)?, 0xFFFF)? as u16),
        Shape::ZeroPage(address) => Operand::ZeroPage(fit_address(eval(address)?, 0xFF)? as u8),
        Shape::Indexed(base, index) => Operand::ZeroPageIndexed {
            base: fit_address(eval(base)?, 0xFF)? as u8,
            index,
        },
        Shape::Pair(pair) => Operand::PairIndirect(pair),
    };

    Ok(Instruction {
        mnemonic: plan.mnemonic,
        register: plan.register,
        operand,
    }
    .encode())
}
