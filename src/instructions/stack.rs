//! # Stack Instructions
//!
//! - PUSH: Push a register onto the stack
//! - POP: Pop a register from the stack
//!
//! The stack grows downward from $B000 and SP points at the most recently
//! pushed byte. SP never wraps: pushing with SP = $0000 and popping past
//! $FFFF are both memory faults. The helpers here are shared with CALL, RET,
//! RTI and interrupt entry.

use super::next_pc;
use crate::cpu::Cpu;
use crate::memory::{check_address, MemoryBus};
use crate::opcodes::{Instruction, Operand};
use crate::{EngineFault, Register};

/// Returns the SP after pushing `count` bytes, or a fault if the stack would
/// run below $0000. The faulting address is reported as the wrapped 32-bit
/// value of the first byte that does not exist.
pub(crate) fn reserve(sp: u16, count: u16) -> Result<u16, EngineFault> {
    sp.checked_sub(count)
        .ok_or(EngineFault::MemoryOutOfBounds {
            address: (sp as u32).wrapping_sub(count as u32),
        })
}

/// Returns the SP after popping `count` bytes. The popped bytes must lie in
/// memory and the resulting SP must be a valid address.
pub(crate) fn release(sp: u16, count: u16) -> Result<u16, EngineFault> {
    check_address(sp as u32 + count as u32)
}

fn stack_register(instruction: &Instruction) -> Register {
    match instruction.operand {
        Operand::Register(reg) => reg,
        _ => Register::R0,
    }
}

/// Executes PUSH: SP decreases by 1, then the register is stored at SP.
pub(crate) fn execute_push<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let pc = next_pc(fallthrough)?;
    let sp = reserve(cpu.regs.sp, 1)?;
    let value = cpu.regs.get(stack_register(instruction));

    cpu.memory.write8(sp as u32, value)?;
    cpu.regs.sp = sp;
    cpu.regs.pc = pc;
    Ok(())
}

/// Executes POP: the byte at SP is loaded, then SP increases by 1.
///
/// Flags affected: None
pub(crate) fn execute_pop<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let pc = next_pc(fallthrough)?;
    let sp = release(cpu.regs.sp, 1)?;
    let value = cpu.memory.read8(cpu.regs.sp as u32)?;

    cpu.regs.set(stack_register(instruction), value);
    cpu.regs.sp = sp;
    cpu.regs.pc = pc;
    Ok(())
}
