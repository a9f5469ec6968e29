//! # Addressing Modes and Register Names
//!
//! This module defines the seven addressing modes understood by the console CPU,
//! together with the register and register-pair names that appear inside
//! operands. The numeric values are part of the instruction encoding and are
//! shared by the CPU engine, the assembler and the disassembler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Console CPU addressing mode enumeration.
///
/// The mode occupies bits 3..1 of the first instruction byte. It determines
/// how many payload bytes follow the register byte and how the effective
/// operand is computed.
///
/// # Payload Sizes
///
/// - **0 bytes**: Implied, Register, RegisterPairIndirect
/// - **1 byte**: Immediate, ZeroPage, ZeroPageIndexed
/// - **2 bytes**: Absolute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// No operand, operation implied by instruction.
    ///
    /// Examples: NOP, RET, SEI
    Implied = 0,

    /// 8-bit constant operand in instruction.
    ///
    /// Example: LD R0, #$10 (load the value 0x10 into R0)
    Immediate = 1,

    /// Operates on a second register.
    ///
    /// Example: ADD R0, R1
    Register = 2,

    /// Full 16-bit little-endian address.
    ///
    /// Example: ST R0, [$1234]
    Absolute = 3,

    /// 8-bit address in zero page (0x00-0xFF).
    ///
    /// Example: LD R0, [$80]
    ZeroPage = 4,

    /// Zero page base plus an index register. The sum is not wrapped to the
    /// zero page, so `[$FF + R1]` with R1 = 2 reads $0101.
    ///
    /// Example: LD R0, [$80 + R2]
    ZeroPageIndexed = 5,

    /// Address formed from a register pair read as high:low.
    ///
    /// Example: LD R0, [R2:R3]
    RegisterPairIndirect = 6,
}

impl AddressingMode {
    /// Decodes the 3-bit mode field. Returns `None` for the unused value 7.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0 => Some(Self::Implied),
            1 => Some(Self::Immediate),
            2 => Some(Self::Register),
            3 => Some(Self::Absolute),
            4 => Some(Self::ZeroPage),
            5 => Some(Self::ZeroPageIndexed),
            6 => Some(Self::RegisterPairIndirect),
            _ => None,
        }
    }

    /// Returns the 3-bit mode field value.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Number of payload bytes this mode appends after the register byte.
    pub const fn payload_bytes(self) -> u8 {
        match self {
            Self::Implied | Self::Register | Self::RegisterPairIndirect => 0,
            Self::Immediate | Self::ZeroPage | Self::ZeroPageIndexed => 1,
            Self::Absolute => 2,
        }
    }

    /// Returns true if the operand is a memory location.
    pub const fn is_memory(self) -> bool {
        matches!(
            self,
            Self::Absolute | Self::ZeroPage | Self::ZeroPageIndexed | Self::RegisterPairIndirect
        )
    }
}

/// One of the six 8-bit general purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
}

impl Register {
    /// All registers in index order.
    pub const ALL: [Register; 6] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
    ];

    /// Converts a register index (0-5) into a register name.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Returns the register index (0-5).
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parses `R0`..`R5` (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() != 2 || !bytes[0].eq_ignore_ascii_case(&b'R') {
            return None;
        }
        match bytes[1] {
            b'0'..=b'5' => Self::from_index((bytes[1] - b'0') as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

/// A register pair used as a 16-bit address (high:low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterPair {
    /// R0 high byte, R1 low byte
    R0R1 = 0,
    /// R2 high byte, R3 low byte
    R2R3 = 1,
    /// R4 high byte, R5 low byte
    R4R5 = 2,
}

impl RegisterPair {
    /// Converts a pair index (0-2) into a pair name.
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::R0R1),
            1 => Some(Self::R2R3),
            2 => Some(Self::R4R5),
            _ => None,
        }
    }

    /// Finds the pair formed by `high:low`, if the two registers form one.
    pub fn from_registers(high: Register, low: Register) -> Option<Self> {
        match (high, low) {
            (Register::R0, Register::R1) => Some(Self::R0R1),
            (Register::R2, Register::R3) => Some(Self::R2R3),
            (Register::R4, Register::R5) => Some(Self::R4R5),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Register holding the high byte of the address.
    pub const fn high(self) -> Register {
        match self {
            Self::R0R1 => Register::R0,
            Self::R2R3 => Register::R2,
            Self::R4R5 => Register::R4,
        }
    }

    /// Register holding the low byte of the address.
    pub const fn low(self) -> Register {
        match self {
            Self::R0R1 => Register::R1,
            Self::R2R3 => Register::R3,
            Self::R4R5 => Register::R5,
        }
    }
}

impl fmt::Display for RegisterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.high(), self.low())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits_roundtrip_and_unused_value() {
        for bits in 0..7 {
            let mode = AddressingMode::from_bits(bits).unwrap();
            assert_eq!(mode.bits(), bits);
        }
        assert_eq!(AddressingMode::from_bits(7), None);
    }

    #[test]
    fn test_register_parse() {
        assert_eq!(Register::parse("R0"), Some(Register::R0));
        assert_eq!(Register::parse("r5"), Some(Register::R5));
        assert_eq!(Register::parse("R6"), None);
        assert_eq!(Register::parse("RX"), None);
        assert_eq!(Register::parse("R10"), None);
    }

    #[test]
    fn test_register_pairs() {
        assert_eq!(
            RegisterPair::from_registers(Register::R2, Register::R3),
            Some(RegisterPair::R2R3)
        );
        assert_eq!(RegisterPair::from_registers(Register::R1, Register::R2), None);
        assert_eq!(RegisterPair::R4R5.high(), Register::R4);
        assert_eq!(RegisterPair::R4R5.low(), Register::R5);
        assert_eq!(RegisterPair::R0R1.to_string(), "R0:R1");
    }
}
