//! # Load and Store Instructions
//!
//! - LD: Load a register from an immediate, register or memory operand
//! - ST: Store a register to memory
//!
//! ST is the only instruction besides the stack operations that writes memory,
//! so it is where memory-mapped side effects (video mode changes, interrupt
//! acknowledgment) are triggered from programs.

use super::{effective_address, next_pc, operand_value, primary_register};
use crate::cpu::Cpu;
use crate::memory::MemoryBus;
use crate::opcodes::Instruction;
use crate::EngineFault;

/// Executes the LD (Load) instruction.
///
/// Flags affected: Z, N
pub(crate) fn execute_ld<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let reg = primary_register(instruction);
    let value = operand_value(cpu, &instruction.operand)?;
    let pc = next_pc(fallthrough)?;

    cpu.regs.set(reg, value);
    cpu.regs.status.set_zn(value);
    cpu.regs.pc = pc;
    Ok(())
}

/// Executes the ST (Store) instruction.
///
/// Flags affected: None
pub(crate) fn execute_st<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let reg = primary_register(instruction);
    let pc = next_pc(fallthrough)?;
    // Decoding only admits memory operands for ST.
    let Some(address) = effective_address(&cpu.regs, &instruction.operand) else {
        return Err(EngineFault::InvalidOpcode {
            opcode: instruction.encode()[0],
            address: cpu.regs.pc,
        });
    };

    cpu.memory.write8(address, cpu.regs.get(reg))?;
    cpu.regs.pc = pc;
    Ok(())
}
