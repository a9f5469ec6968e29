//! # Opcode Metadata Table
//!
//! This module is the single source of truth for the console instruction
//! encoding. The CPU engine decodes with it, the assembler encodes with it and
//! the disassembler prints with it.
//!
//! ## Encoding
//!
//! ```text
//! byte 0      oooo mmm0   opcode (4 bits), addressing mode (3 bits), reserved 0
//! byte 1      hhhh llll   register byte (only for register-bearing forms)
//! bytes 2..   payload     0-2 bytes depending on the addressing mode
//! ```
//!
//! The control group (opcode 0) has no operands; its low nibble selects the
//! operation instead of an addressing mode. Branches reuse the register byte as
//! a condition selector.

use crate::addressing::{AddressingMode, Register, RegisterPair};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The 4-bit opcode field of the first instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Control = 0x0,
    Ld = 0x1,
    St = 0x2,
    Add = 0x3,
    Sub = 0x4,
    And = 0x5,
    Or = 0x6,
    Xor = 0x7,
    Cmp = 0x8,
    Shl = 0x9,
    Shr = 0xA,
    Jmp = 0xB,
    Branch = 0xC,
    Call = 0xD,
    Push = 0xE,
    Pop = 0xF,
}

impl Opcode {
    /// Decodes the high nibble of an instruction byte.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0x0 => Self::Control,
            0x1 => Self::Ld,
            0x2 => Self::St,
            0x3 => Self::Add,
            0x4 => Self::Sub,
            0x5 => Self::And,
            0x6 => Self::Or,
            0x7 => Self::Xor,
            0x8 => Self::Cmp,
            0x9 => Self::Shl,
            0xA => Self::Shr,
            0xB => Self::Jmp,
            0xC => Self::Branch,
            0xD => Self::Call,
            0xE => Self::Push,
            _ => Self::Pop,
        }
    }

    /// Returns true if `mode` is a defined combination for this opcode.
    pub const fn supports(self, mode: AddressingMode) -> bool {
        use AddressingMode::*;
        match self {
            Self::Control => matches!(mode, Implied),
            Self::Ld | Self::Add | Self::Sub | Self::And | Self::Or | Self::Xor | Self::Cmp => {
                !matches!(mode, Implied)
            }
            Self::St => mode.is_memory(),
            Self::Shl | Self::Shr => matches!(mode, Immediate | Register),
            Self::Jmp | Self::Call => matches!(mode, Absolute | RegisterPairIndirect),
            Self::Branch => matches!(mode, Absolute),
            Self::Push | Self::Pop => matches!(mode, Register),
        }
    }

    /// Returns true if the encoded form carries a register byte.
    pub const fn has_register_byte(self, mode: AddressingMode) -> bool {
        match self {
            Self::Control => false,
            Self::Jmp | Self::Call => matches!(mode, AddressingMode::RegisterPairIndirect),
            _ => true,
        }
    }

    /// Returns true if the high nibble of the register byte names a register.
    pub const fn names_register(self) -> bool {
        !matches!(
            self,
            Self::Control | Self::Jmp | Self::Call | Self::Branch | Self::Push | Self::Pop
        )
    }
}

/// Branch conditions, stored in the register byte of a `Bcc` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Condition {
    Zero = 0,
    NotZero = 1,
    Carry = 2,
    NotCarry = 3,
    Negative = 4,
    NotNegative = 5,
    Overflow = 6,
    NotOverflow = 7,
}

impl Condition {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Zero),
            1 => Some(Self::NotZero),
            2 => Some(Self::Carry),
            3 => Some(Self::NotCarry),
            4 => Some(Self::Negative),
            5 => Some(Self::NotNegative),
            6 => Some(Self::Overflow),
            7 => Some(Self::NotOverflow),
            _ => None,
        }
    }
}

/// Every assembler mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mnemonic {
    Nop,
    Hlt,
    Ret,
    Rti,
    Sei,
    Cli,
    Clc,
    Sec,
    Ld,
    St,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Cmp,
    Shl,
    Shr,
    Jmp,
    Brz,
    Bnz,
    Brc,
    Bnc,
    Brn,
    Bnn,
    Brv,
    Bnv,
    Call,
    Push,
    Pop,
}

/// Static information about one mnemonic.
///
/// # Fields
///
/// - `name`: Upper-case mnemonic text as written in assembly source
/// - `opcode`: The 4-bit opcode the mnemonic encodes to
/// - `selector`: Control sub-operation or branch condition, 0 otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnemonicMetadata {
    pub mnemonic: Mnemonic,
    pub name: &'static str,
    pub opcode: Opcode,
    pub selector: u8,
}

const fn entry(mnemonic: Mnemonic, name: &'static str, opcode: Opcode, selector: u8) -> MnemonicMetadata {
    MnemonicMetadata {
        mnemonic,
        name,
        opcode,
        selector,
    }
}

/// Complete mnemonic table. Control operations are listed first, in
/// sub-operation order, so `MNEMONIC_TABLE[sub]` is the control mnemonic for
/// first byte `0x0sub`.
pub const MNEMONIC_TABLE: [MnemonicMetadata; 30] = [
    entry(Mnemonic::Nop, "NOP", Opcode::Control, 0),
    entry(Mnemonic::Hlt, "HLT", Opcode::Control, 1),
    entry(Mnemonic::Ret, "RET", Opcode::Control, 2),
    entry(Mnemonic::Rti, "RTI", Opcode::Control, 3),
    entry(Mnemonic::Sei, "SEI", Opcode::Control, 4),
    entry(Mnemonic::Cli, "CLI", Opcode::Control, 5),
    entry(Mnemonic::Clc, "CLC", Opcode::Control, 6),
    entry(Mnemonic::Sec, "SEC", Opcode::Control, 7),
    entry(Mnemonic::Ld, "LD", Opcode::Ld, 0),
    entry(Mnemonic::St, "ST", Opcode::St, 0),
    entry(Mnemonic::Add, "ADD", Opcode::Add, 0),
    entry(Mnemonic::Sub, "SUB", Opcode::Sub, 0),
    entry(Mnemonic::And, "AND", Opcode::And, 0),
    entry(Mnemonic::Or, "OR", Opcode::Or, 0),
    entry(Mnemonic::Xor, "XOR", Opcode::Xor, 0),
    entry(Mnemonic::Cmp, "CMP", Opcode::Cmp, 0),
    entry(Mnemonic::Shl, "SHL", Opcode::Shl, 0),
    entry(Mnemonic::Shr, "SHR", Opcode::Shr, 0),
    entry(Mnemonic::Jmp, "JMP", Opcode::Jmp, 0),
    entry(Mnemonic::Brz, "BRZ", Opcode::Branch, Condition::Zero as u8),
    entry(Mnemonic::Bnz, "BNZ", Opcode::Branch, Condition::NotZero as u8),
    entry(Mnemonic::Brc, "BRC", Opcode::Branch, Condition::Carry as u8),
    entry(Mnemonic::Bnc, "BNC", Opcode::Branch, Condition::NotCarry as u8),
    entry(Mnemonic::Brn, "BRN", Opcode::Branch, Condition::Negative as u8),
    entry(Mnemonic::Bnn, "BNN", Opcode::Branch, Condition::NotNegative as u8),
    entry(Mnemonic::Brv, "BRV", Opcode::Branch, Condition::Overflow as u8),
    entry(Mnemonic::Bnv, "BNV", Opcode::Branch, Condition::NotOverflow as u8),
    entry(Mnemonic::Call, "CALL", Opcode::Call, 0),
    entry(Mnemonic::Push, "PUSH", Opcode::Push, 0),
    entry(Mnemonic::Pop, "POP", Opcode::Pop, 0),
];

/// Number of defined control sub-operations (NOP..SEC).
const CONTROL_OPS: u8 = 8;

impl Mnemonic {
    /// Looks up a mnemonic by name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        MNEMONIC_TABLE
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| m.mnemonic)
    }

    /// Returns the table entry for this mnemonic.
    pub fn metadata(self) -> &'static MnemonicMetadata {
        // The table is declared in enum order.
        &MNEMONIC_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.metadata().name
    }

    pub fn opcode(self) -> Opcode {
        self.metadata().opcode
    }

    /// Branch condition for `Bcc` mnemonics.
    pub fn condition(self) -> Option<Condition> {
        match self.opcode() {
            Opcode::Branch => Condition::from_bits(self.metadata().selector),
            _ => None,
        }
    }

    fn from_selector(opcode: Opcode, selector: u8) -> Option<Self> {
        MNEMONIC_TABLE
            .iter()
            .find(|m| m.opcode == opcode && m.selector == selector)
            .map(|m| m.mnemonic)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The decoded operand of an instruction (everything after the opcode,
/// excluding the primary register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operand {
    None,
    Immediate(u8),
    Register(Register),
    Absolute(u16),
    ZeroPage(u8),
    ZeroPageIndexed { base: u8, index: Register },
    PairIndirect(RegisterPair),
}

impl Operand {
    /// The addressing mode this operand encodes with.
    pub const fn mode(&self) -> AddressingMode {
        match self {
            Self::None => AddressingMode::Implied,
            Self::Immediate(_) => AddressingMode::Immediate,
            Self::Register(_) => AddressingMode::Register,
            Self::Absolute(_) => AddressingMode::Absolute,
            Self::ZeroPage(_) => AddressingMode::ZeroPage,
            Self::ZeroPageIndexed { .. } => AddressingMode::ZeroPageIndexed,
            Self::PairIndirect(_) => AddressingMode::RegisterPairIndirect,
        }
    }
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    /// Destination register (source register for ST). PUSH and POP carry
    /// their register as an `Operand::Register`.
    pub register: Option<Register>,
    pub operand: Operand,
}

/// Errors produced while decoding instruction bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no instruction bytes")]
    Empty,

    #[error("invalid encoding (first byte ${0:02X})")]
    Invalid(u8),

    #[error("instruction needs {needed} bytes, only {available} available")]
    Truncated { needed: u8, available: usize },
}

/// Returns the total encoded length implied by the first instruction byte,
/// or `None` if the opcode/mode combination is undefined.
///
/// # Examples
///
/// ```
/// use vconsole::opcodes::instruction_length;
///
/// assert_eq!(instruction_length(0x00), Some(1)); // NOP
/// assert_eq!(instruction_length(0x12), Some(3)); // LD r, #imm
/// assert_eq!(instruction_length(0x26), Some(4)); // ST r, [abs]
/// assert_eq!(instruction_length(0x0F), None);
/// ```
pub fn instruction_length(first: u8) -> Option<u8> {
    let opcode = Opcode::from_bits(first >> 4);
    if opcode == Opcode::Control {
        return (first & 0x0F < CONTROL_OPS).then_some(1);
    }
    if first & 0x01 != 0 {
        return None;
    }
    let mode = AddressingMode::from_bits(first >> 1)?;
    if !opcode.supports(mode) {
        return None;
    }
    Some(1 + opcode.has_register_byte(mode) as u8 + mode.payload_bytes())
}

impl Instruction {
    /// Builds an operand-less control instruction.
    pub const fn control(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            register: None,
            operand: Operand::None,
        }
    }

    pub const fn mode(&self) -> AddressingMode {
        self.operand.mode()
    }

    /// Encoded size in bytes.
    pub fn length(&self) -> u8 {
        let opcode = self.mnemonic.opcode();
        if opcode == Opcode::Control {
            return 1;
        }
        let mode = self.mode();
        1 + opcode.has_register_byte(mode) as u8 + mode.payload_bytes()
    }

    /// Returns true if the mnemonic accepts this operand shape.
    pub fn is_valid(&self) -> bool {
        let opcode = self.mnemonic.opcode();
        opcode.supports(self.mode()) && (opcode.names_register() == self.register.is_some())
    }

    /// Encodes the instruction into machine code.
    ///
    /// The caller is expected to have checked [`Instruction::is_valid`]; an
    /// invalid combination still encodes deterministically but will not decode.
    pub fn encode(&self) -> Vec<u8> {
        let meta = self.mnemonic.metadata();
        let opcode = meta.opcode;
        if opcode == Opcode::Control {
            return vec![meta.selector];
        }

        let mode = self.mode();
        let mut bytes = Vec::with_capacity(self.length() as usize);
        bytes.push(((opcode as u8) << 4) | (mode.bits() << 1));

        if opcode.has_register_byte(mode) {
            let reg_byte = if opcode == Opcode::Branch {
                meta.selector
            } else {
                let high = self.register.map_or(0, |r| r.index() as u8);
                let low = match self.operand {
                    Operand::Register(r) => r.index() as u8,
                    Operand::ZeroPageIndexed { index, .. } => index.index() as u8,
                    Operand::PairIndirect(pair) => pair.index(),
                    _ => 0,
                };
                (high << 4) | low
            };
            bytes.push(reg_byte);
        }

        match self.operand {
            Operand::Immediate(value) | Operand::ZeroPage(value) => bytes.push(value),
            Operand::ZeroPageIndexed { base, .. } => bytes.push(base),
            Operand::Absolute(address) => bytes.extend_from_slice(&address.to_le_bytes()),
            Operand::None | Operand::Register(_) | Operand::PairIndirect(_) => {}
        }

        bytes
    }

    /// Decodes one instruction from the start of `bytes`.
    ///
    /// # Returns
    ///
    /// - `Ok(Instruction)` if the bytes form a defined instruction
    /// - `Err(DecodeError::Invalid)` for undefined opcode/mode/register fields
    /// - `Err(DecodeError::Truncated)` if `bytes` ends mid-instruction
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let first = *bytes.first().ok_or(DecodeError::Empty)?;
        let length = instruction_length(first).ok_or(DecodeError::Invalid(first))?;
        if bytes.len() < length as usize {
            return Err(DecodeError::Truncated {
                needed: length,
                available: bytes.len(),
            });
        }

        let opcode = Opcode::from_bits(first >> 4);
        if opcode == Opcode::Control {
            let mnemonic = Mnemonic::from_selector(Opcode::Control, first & 0x0F)
                .ok_or(DecodeError::Invalid(first))?;
            return Ok(Self::control(mnemonic));
        }

        let invalid = DecodeError::Invalid(first);
        let mode = AddressingMode::from_bits(first >> 1).ok_or(invalid)?;
        let (reg_byte, payload) = if opcode.has_register_byte(mode) {
            (bytes[1], &bytes[2..length as usize])
        } else {
            (0, &bytes[1..length as usize])
        };
        let high = reg_byte >> 4;
        let low = reg_byte & 0x0F;

        let mnemonic = if opcode == Opcode::Branch {
            Condition::from_bits(reg_byte).ok_or(invalid)?;
            Mnemonic::from_selector(Opcode::Branch, reg_byte).ok_or(invalid)?
        } else {
            Mnemonic::from_selector(opcode, 0).ok_or(invalid)?
        };

        let register = if opcode.names_register() {
            Some(Register::from_index(high as usize).ok_or(invalid)?)
        } else {
            if opcode != Opcode::Branch && high != 0 {
                return Err(invalid);
            }
            None
        };

        let second_register = || Register::from_index(low as usize).ok_or(invalid);
        let operand = match mode {
            AddressingMode::Implied => return Err(invalid),
            AddressingMode::Immediate => Operand::Immediate(payload[0]),
            AddressingMode::Register => Operand::Register(second_register()?),
            AddressingMode::Absolute => Operand::Absolute(u16::from_le_bytes([payload[0], payload[1]])),
            AddressingMode::ZeroPage => Operand::ZeroPage(payload[0]),
            AddressingMode::ZeroPageIndexed => Operand::ZeroPageIndexed {
                base: payload[0],
                index: second_register()?,
            },
            AddressingMode::RegisterPairIndirect => {
                Operand::PairIndirect(RegisterPair::from_index(low).ok_or(invalid)?)
            }
        };

        if low != 0
            && opcode != Opcode::Branch
            && matches!(
                mode,
                AddressingMode::Immediate | AddressingMode::Absolute | AddressingMode::ZeroPage
            )
        {
            return Err(invalid);
        }

        Ok(Self {
            mnemonic,
            register,
            operand,
        })
    }
}
