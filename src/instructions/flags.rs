//! # Status Flag Instructions
//!
//! - SEI / CLI: Enable / disable interrupt delivery (I flag)
//! - SEC / CLC: Set / clear Carry

use super::next_pc;
use crate::cpu::{Cpu, StatusFlags};
use crate::memory::MemoryBus;
use crate::opcodes::Mnemonic;
use crate::EngineFault;

pub(crate) fn execute_flag<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    mnemonic: Mnemonic,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let pc = next_pc(fallthrough)?;
    let (flag, on) = match mnemonic {
        Mnemonic::Sei => (StatusFlags::INTERRUPT, true),
        Mnemonic::Cli => (StatusFlags::INTERRUPT, false),
        Mnemonic::Sec => (StatusFlags::CARRY, true),
        _ => (StatusFlags::CARRY, false),
    };
    cpu.regs.status.set(flag, on);
    cpu.regs.pc = pc;
    Ok(())
}
