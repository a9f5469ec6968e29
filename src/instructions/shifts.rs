//! # Shift Instructions
//!
//! This module implements the logical shift operations:
//! - SHL: Shift left, zero filled
//! - SHR: Shift right, zero filled
//!
//! The shift count comes from an immediate or a register. Carry receives the
//! last bit shifted out; a count of 0 leaves Carry unchanged, and counts above
//! 8 shift everything out and clear Carry.

use super::{next_pc, operand_value, primary_register};
use crate::cpu::{Cpu, StatusFlags};
use crate::memory::MemoryBus;
use crate::opcodes::{Instruction, Mnemonic};
use crate::EngineFault;

/// Shifts `value` by `count` bits, returning the result and the last bit out.
pub(crate) fn shift8(value: u8, count: u8, left: bool) -> (u8, Option<bool>) {
    let mut result = value;
    let mut carry = None;
    for _ in 0..count.min(9) {
        if left {
            carry = Some(result & 0x80 != 0);
            result <<= 1;
        } else {
            carry = Some(result & 0x01 != 0);
            result >>= 1;
        }
    }
    (result, carry)
}

/// Executes SHL and SHR.
///
/// Flags affected: C (if count > 0), Z, N
pub(crate) fn execute_shift<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let reg = primary_register(instruction);
    let count = operand_value(cpu, &instruction.operand)?;
    let pc = next_pc(fallthrough)?;

    let left = instruction.mnemonic == Mnemonic::Shl;
    let (result, carry) = shift8(cpu.regs.get(reg), count, left);

    if let Some(carry) = carry {
        cpu.regs.status.set(StatusFlags::CARRY, carry);
    }
    cpu.regs.status.set_zn(result);
    cpu.regs.set(reg, result);
    cpu.regs.pc = pc;
    Ok(())
}
