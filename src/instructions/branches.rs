//! # Branch Instructions
//!
//! Conditional jumps to an absolute address:
//! - BRZ / BNZ: Zero set / clear
//! - BRC / BNC: Carry set / clear (unsigned borrow after CMP)
//! - BRN / BNN: Negative set / clear
//! - BRV / BNV: Overflow set / clear
//!
//! No flags are affected.

use super::next_pc;
use crate::cpu::{Cpu, StatusFlags};
use crate::memory::MemoryBus;
use crate::opcodes::{Condition, Instruction, Operand};
use crate::EngineFault;

/// Evaluates a branch condition against the status register.
pub(crate) fn condition_holds(condition: Condition, status: StatusFlags) -> bool {
    match condition {
        Condition::Zero => status.zero(),
        Condition::NotZero => !status.zero(),
        Condition::Carry => status.carry(),
        Condition::NotCarry => !status.carry(),
        Condition::Negative => status.negative(),
        Condition::NotNegative => !status.negative(),
        Condition::Overflow => status.overflow(),
        Condition::NotOverflow => !status.overflow(),
    }
}

/// Executes a conditional branch.
pub(crate) fn execute_branch<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let taken = instruction
        .mnemonic
        .condition()
        .is_some_and(|condition| condition_holds(condition, cpu.regs.status));

    cpu.regs.pc = match (taken, instruction.operand) {
        (true, Operand::Absolute(target)) => target,
        _ => next_pc(fallthrough)?,
    };
    Ok(())
}
