//! # Console Instruction Implementations
//!
//! This module contains the implementations of all console instructions,
//! organized by category. Each instruction is a standalone function taking a
//! mutable reference to the CPU, the decoded instruction and the fall-through
//! address (PC + instruction length, not yet range-checked).
//!
//! Every function validates all reads, stack room and the next PC before it
//! mutates anything, so a faulting instruction leaves no visible state.
//!
//! ## Categories
//!
//! - **alu**: Arithmetic and logic operations (ADD, SUB, AND, OR, XOR, CMP)
//! - **shifts**: Shift operations (SHL, SHR)
//! - **load_store**: Load and store instructions (LD, ST)
//! - **branches**: Conditional branches (BRZ, BNZ, BRC, BNC, BRN, BNN, BRV, BNV)
//! - **control**: Control flow (NOP, HLT, JMP, CALL, RET, RTI, interrupt entry)
//! - **stack**: Stack operations (PUSH, POP)
//! - **flags**: Status flag manipulation (SEI, CLI, CLC, SEC)

pub mod alu;
pub mod branches;
pub mod control;
pub mod flags;
pub mod load_store;
pub mod shifts;
pub mod stack;

use crate::cpu::{Cpu, Registers};
use crate::memory::{check_address, MemoryBus};
use crate::opcodes::{Instruction, Mnemonic, Operand};
use crate::{EngineFault, Register};

/// Dispatches a decoded instruction to its implementation.
pub(crate) fn execute<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    use Mnemonic::*;
    match instruction.mnemonic {
        Nop => control::execute_nop(cpu, fallthrough),
        Hlt => control::execute_hlt(cpu, fallthrough),
        Ret => control::execute_ret(cpu),
        Rti => control::execute_rti(cpu),
        Jmp => control::execute_jmp(cpu, instruction),
        Call => control::execute_call(cpu, instruction, fallthrough),
        Sei | Cli | Clc | Sec => flags::execute_flag(cpu, instruction.mnemonic, fallthrough),
        Ld => load_store::execute_ld(cpu, instruction, fallthrough),
        St => load_store::execute_st(cpu, instruction, fallthrough),
        Add | Sub | And | Or | Xor | Cmp => alu::execute_alu(cpu, instruction, fallthrough),
        Shl | Shr => shifts::execute_shift(cpu, instruction, fallthrough),
        Brz | Bnz | Brc | Bnc | Brn | Bnn | Brv | Bnv => {
            branches::execute_branch(cpu, instruction, fallthrough)
        }
        Push => stack::execute_push(cpu, instruction, fallthrough),
        Pop => stack::execute_pop(cpu, instruction, fallthrough),
    }
}

/// Validates the fall-through address as the next PC.
pub(crate) fn next_pc(fallthrough: u32) -> Result<u16, EngineFault> {
    check_address(fallthrough)
}

/// Returns the primary register of a register-bearing instruction.
pub(crate) fn primary_register(instruction: &Instruction) -> Register {
    // Decoding guarantees a register for every mnemonic that names one.
    instruction.register.unwrap_or(Register::R0)
}

/// Reads a register pair as a 16-bit address (high:low).
pub(crate) fn pair_address(regs: &Registers, pair: crate::RegisterPair) -> u16 {
    u16::from_be_bytes([regs.get(pair.high()), regs.get(pair.low())])
}

/// Computes the effective address of a memory operand.
///
/// Returns `None` for operands that are not memory locations.
pub(crate) fn effective_address(regs: &Registers, operand: &Operand) -> Option<u32> {
    match *operand {
        Operand::Absolute(address) => Some(address as u32),
        Operand::ZeroPage(address) => Some(address as u32),
        Operand::ZeroPageIndexed { base, index } => Some(base as u32 + regs.get(index) as u32),
        Operand::PairIndirect(pair) => Some(pair_address(regs, pair) as u32),
        Operand::None | Operand::Immediate(_) | Operand::Register(_) => None,
    }
}

/// Resolves a source operand to its 8-bit value.
pub(crate) fn operand_value<M: MemoryBus>(
    cpu: &Cpu<M>,
    operand: &Operand,
) -> Result<u8, EngineFault> {
    match *operand {
        Operand::Immediate(value) => Ok(value),
        Operand::Register(reg) => Ok(cpu.regs.get(reg)),
        _ => match effective_address(&cpu.regs, operand) {
            Some(address) => cpu.memory.read8(address),
            None => Ok(0),
        },
    }
}
