//! Instruction decoder for the disassembler

use crate::disassembler::DisassembledInstruction;
use crate::opcodes::Instruction;

/// Decode a single instruction from a byte slice
///
/// # Arguments
///
/// * `bytes` - The byte slice starting at the instruction to decode
/// * `address` - The memory address of this instruction
///
/// # Returns
///
/// `Some` if the bytes start a defined, complete instruction; `None` for
/// undefined encodings and truncated input
pub fn decode_instruction(bytes: &[u8], address: u16) -> Option<DisassembledInstruction> {
    let instruction = Instruction::decode(bytes).ok()?;
    let length = instruction.length() as usize;

    Some(DisassembledInstruction {
        address,
        bytes: bytes[..length].to_vec(),
        instruction: Some(instruction),
    })
}
