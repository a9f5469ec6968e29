//! # Control Flow Instructions
//!
//! - NOP: No operation
//! - HLT: Stop fetching until an interrupt is taken
//! - JMP: Jump to an absolute address or the address in a register pair
//! - CALL: Push the return address, then jump
//! - RET: Pop the return address
//! - RTI: Pop status, then the return address
//!
//! Interrupt entry lives here too, since it is a CALL that also saves status.
//!
//! ## Stack Frames
//!
//! CALL pushes the return address high byte first, so the word sits
//! little-endian at SP:
//!
//! ```text
//! SP+1: return high
//! SP  : return low
//! ```
//!
//! Interrupt entry pushes the PC the same way and then the status byte:
//!
//! ```text
//! SP+2: PC high
//! SP+1: PC low
//! SP  : status
//! ```

use super::stack::{release, reserve};
use super::{next_pc, pair_address};
use crate::cpu::{Cpu, StatusFlags};
use crate::memory::map::{INT_ENABLE, INT_STATUS};
use crate::memory::MemoryBus;
use crate::opcodes::{Instruction, Operand};
use crate::EngineFault;

pub(crate) fn execute_nop<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    cpu.regs.pc = next_pc(fallthrough)?;
    Ok(())
}

/// Executes HLT. PC moves past the instruction so that the interrupt handler
/// returns to the following instruction.
pub(crate) fn execute_hlt<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    cpu.regs.pc = next_pc(fallthrough)?;
    cpu.halted = true;
    log::debug!("HLT at ${:04X}", cpu.regs.pc);
    Ok(())
}

/// Resolves the target of JMP and CALL.
fn jump_target<M: MemoryBus>(cpu: &Cpu<M>, instruction: &Instruction) -> u16 {
    match instruction.operand {
        Operand::PairIndirect(pair) => pair_address(&cpu.regs, pair),
        Operand::Absolute(address) => address,
        _ => cpu.regs.pc,
    }
}

pub(crate) fn execute_jmp<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
) -> Result<(), EngineFault> {
    cpu.regs.pc = jump_target(cpu, instruction);
    Ok(())
}

pub(crate) fn execute_call<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let return_address = next_pc(fallthrough)?;
    let sp = reserve(cpu.regs.sp, 2)?;
    let target = jump_target(cpu, instruction);

    cpu.memory.write16(sp as u32, return_address)?;
    cpu.regs.sp = sp;
    cpu.regs.pc = target;
    Ok(())
}

pub(crate) fn execute_ret<M: MemoryBus>(cpu: &mut Cpu<M>) -> Result<(), EngineFault> {
    let sp = release(cpu.regs.sp, 2)?;
    let return_address = cpu.memory.read16(cpu.regs.sp as u32)?;

    cpu.regs.sp = sp;
    cpu.regs.pc = return_address;
    Ok(())
}

/// Executes RTI. Restoring status usually re-enables interrupts.
pub(crate) fn execute_rti<M: MemoryBus>(cpu: &mut Cpu<M>) -> Result<(), EngineFault> {
    let sp = release(cpu.regs.sp, 3)?;
    let status = cpu.memory.read8(cpu.regs.sp as u32)?;
    let return_address = cpu.memory.read16(cpu.regs.sp as u32 + 1)?;

    cpu.regs.status = StatusFlags::from_bits(status);
    cpu.regs.sp = sp;
    cpu.regs.pc = return_address;
    Ok(())
}

/// Takes a pending interrupt.
///
/// The caller has already checked that I is set and an enabled source is
/// pending. Entry saves PC and status, disables further interrupts,
/// acknowledges the lowest pending enabled source in INT_STATUS, jumps
/// through the IRQ vector and wakes the CPU from HLT.
pub(crate) fn enter_interrupt<M: MemoryBus>(cpu: &mut Cpu<M>) -> Result<(), EngineFault> {
    let vector = cpu.irq_vector()?;
    let pending = cpu.memory.read8(INT_STATUS as u32)? & cpu.memory.read8(INT_ENABLE as u32)?;
    let source = pending & pending.wrapping_neg();
    let sp = reserve(cpu.regs.sp, 3)?;

    cpu.memory.write8(sp as u32, cpu.regs.status.bits())?;
    cpu.memory.write16(sp as u32 + 1, cpu.regs.pc)?;
    cpu.memory.write8(INT_STATUS as u32, source)?;

    log::debug!(
        "interrupt {source:#04x} from ${:04X} to ${vector:04X}",
        cpu.regs.pc
    );
    cpu.regs.status.set(StatusFlags::INTERRUPT, false);
    cpu.regs.sp = sp;
    cpu.regs.pc = vector;
    cpu.halted = false;
    Ok(())
}
