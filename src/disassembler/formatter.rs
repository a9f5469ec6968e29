//! Formatting functions for disassembled instructions
//!
//! Output uses the assembler's own syntax, so a listing can be pasted back
//! into a source file.

use crate::disassembler::DisassembledInstruction;
use crate::opcodes::{Instruction, Operand};
use std::fmt::Write;

/// Format a single instruction as assembly text
pub fn format_instruction(instruction: &Instruction) -> String {
    let mut text = instruction.mnemonic.name().to_string();
    let operand = format_operand(&instruction.operand);

    match (instruction.register, operand.is_empty()) {
        (Some(reg), true) => {
            let _ = write!(text, " {reg}");
        }
        (Some(reg), false) => {
            let _ = write!(text, " {reg}, {operand}");
        }
        (None, false) => {
            let _ = write!(text, " {operand}");
        }
        (None, true) => {}
    }
    text
}

/// Format the operand based on addressing mode
fn format_operand(operand: &Operand) -> String {
    match *operand {
        Operand::None => String::new(),
        Operand::Immediate(value) => format!("#${value:02X}"),
        Operand::Register(reg) => reg.to_string(),
        Operand::Absolute(address) => format!("${address:04X}"),
        Operand::ZeroPage(address) => format!("[${address:02X}]"),
        Operand::ZeroPageIndexed { base, index } => format!("[${base:02X} + {index}]"),
        Operand::PairIndirect(pair) => format!("[{pair}]"),
    }
}

/// Format raw bytes as a `.byte` directive
pub fn format_bytes(bytes: &[u8]) -> String {
    let values: Vec<String> = bytes.iter().map(|byte| format!("${byte:02X}")).collect();
    format!(".byte {}", values.join(", "))
}

/// Format a listing: address, hex bytes and assembly text per line
///
/// # Examples
///
/// ```
/// use vconsole::disassemble;
/// use vconsole::disassembler::formatter::format_listing;
///
/// let listing = format_listing(&disassemble(&[0xE4, 0x01], 0x0300));
/// assert_eq!(listing, "$0300  E4 01        PUSH R1\n");
/// ```
pub fn format_listing(lines: &[DisassembledInstruction]) -> String {
    let mut listing = String::new();
    for line in lines {
        let hex: Vec<String> = line.bytes.iter().map(|byte| format!("{byte:02X}")).collect();
        let _ = writeln!(listing, "${:04X}  {:<11}  {}", line.address, hex.join(" "), line.text());
    }
    listing
}
