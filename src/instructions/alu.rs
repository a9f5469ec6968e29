//! # ALU (Arithmetic Logic Unit) Instructions
//!
//! This module implements arithmetic and logical operations:
//! - ADD: Add (no carry in)
//! - SUB: Subtract (no borrow in)
//! - AND, OR, XOR: Bitwise logic
//! - CMP: Compare (subtract for flags only)
//!
//! ## Carry Semantics
//!
//! Carry after ADD means the unsigned sum exceeded 255. Carry after SUB and
//! CMP means an unsigned borrow occurred (`a < b`). CMP is unsigned-only:
//! `CMP R0, R1` followed by `BRC` branches when R0 < R1 treating both as
//! 0-255, even when the values look negative in two's complement. Existing
//! programs rely on this; signed comparisons have to combine N and V.

use super::{next_pc, operand_value, primary_register};
use crate::cpu::{Cpu, StatusFlags};
use crate::memory::MemoryBus;
use crate::opcodes::{Instruction, Mnemonic};
use crate::EngineFault;

/// Result of an 8-bit addition with carry and signed overflow.
pub(crate) fn add8(a: u8, b: u8) -> (u8, bool, bool) {
    let sum = a as u16 + b as u16;
    let result = sum as u8;
    // Overflow: both operands share a sign and the result does not
    let overflow = (!(a ^ b) & (a ^ result) & 0x80) != 0;
    (result, sum > 0xFF, overflow)
}

/// Result of an 8-bit subtraction with borrow and signed overflow.
pub(crate) fn sub8(a: u8, b: u8) -> (u8, bool, bool) {
    let result = a.wrapping_sub(b);
    // Overflow: operands differ in sign and the result's sign differs from a
    let overflow = ((a ^ b) & (a ^ result) & 0x80) != 0;
    (result, a < b, overflow)
}

/// Executes ADD, SUB, AND, OR, XOR and CMP.
///
/// Flags affected:
/// - ADD/SUB/CMP: C, Z, V, N
/// - AND/OR/XOR: Z, N (C and V unchanged)
pub(crate) fn execute_alu<M: MemoryBus>(
    cpu: &mut Cpu<M>,
    instruction: &Instruction,
    fallthrough: u32,
) -> Result<(), EngineFault> {
    let reg = primary_register(instruction);
    let a = cpu.regs.get(reg);
    let b = operand_value(cpu, &instruction.operand)?;
    let pc = next_pc(fallthrough)?;

    let mut status = cpu.regs.status;
    let result = match instruction.mnemonic {
        Mnemonic::Add | Mnemonic::Sub | Mnemonic::Cmp => {
            let (result, carry, overflow) = if instruction.mnemonic == Mnemonic::Add {
                add8(a, b)
            } else {
                sub8(a, b)
            };
            status.set(StatusFlags::CARRY, carry);
            status.set(StatusFlags::OVERFLOW, overflow);
            result
        }
        Mnemonic::And => a & b,
        Mnemonic::Or => a | b,
        _ => a ^ b,
    };
    status.set_zn(result);

    if instruction.mnemonic != Mnemonic::Cmp {
        cpu.regs.set(reg, result);
    }
    cpu.regs.status = status;
    cpu.regs.pc = pc;
    Ok(())
}
