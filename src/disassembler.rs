//! Console Disassembler Module
//!
//! Converts machine code back into assembler syntax using the same encoding
//! tables as the CPU. Bytes that do not start a defined instruction (or a
//! truncated instruction at the end of the input) are emitted as `.byte`
//! lines so that every input byte appears in the listing exactly once.

pub mod decoder;
pub mod formatter;

use crate::opcodes::Instruction;
use serde::Serialize;

/// A single disassembled line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisassembledInstruction {
    /// Memory address where this line starts
    pub address: u16,

    /// Raw bytes covered by this line
    pub bytes: Vec<u8>,

    /// Decoded instruction, or `None` for a `.byte` line
    pub instruction: Option<Instruction>,
}

impl DisassembledInstruction {
    /// Assembler text for this line (`LD R0, #$05` or `.byte $FF`)
    pub fn text(&self) -> String {
        match &self.instruction {
            Some(instruction) => formatter::format_instruction(instruction),
            None => formatter::format_bytes(&self.bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Disassemble a byte slice loaded at `start`
///
/// Decoding stops at the end of the slice or at $FFFF, whichever comes first.
///
/// # Examples
///
/// ```
/// use vconsole::disassemble;
///
/// let lines = disassemble(&[0x12, 0x00, 0x05, 0x0F], 0x0200);
/// assert_eq!(lines.len(), 2);
/// assert_eq!(lines[0].text(), "LD R0, #$05");
/// assert_eq!(lines[1].address, 0x0203);
/// assert_eq!(lines[1].text(), ".byte $0F");
/// ```
pub fn disassemble(bytes: &[u8], start: u16) -> Vec<DisassembledInstruction> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let address = start as usize + offset;
        if address > 0xFFFF {
            break;
        }
        let line = decoder::decode_instruction(&bytes[offset..], address as u16)
            .unwrap_or_else(|| DisassembledInstruction {
                address: address as u16,
                bytes: vec![bytes[offset]],
                instruction: None,
            });
        offset += line.len();
        lines.push(line);
    }

    lines
}
