//! Fuzz target for CPU step execution.
//!
//! Builds an arbitrary register file and memory image around PC, then
//! executes one step. A faulting step must leave the CPU untouched.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vconsole::{Cpu, Memory};

/// Arbitrary CPU initial state for fuzzing
#[derive(Debug, Arbitrary)]
struct FuzzCpuState {
    registers: [u8; 6],
    sp: u16,
    pc: u16,
    status: u8,
}

/// Memory regions around the interesting addresses
#[derive(Debug, Arbitrary)]
struct FuzzMemory {
    /// Bytes at PC (instruction + operands)
    instruction_bytes: [u8; 4],
    zero_page: [u8; 256],
    /// Hardware registers ($0100-$01FF): video mode, interrupts, vector
    io_page: [u8; 256],
    /// Bytes just below SP
    stack: [u8; 8],
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    cpu_state: FuzzCpuState,
    memory: FuzzMemory,
}

fuzz_target!(|input: FuzzInput| {
    let mut memory = Memory::new();
    memory.load(0x0000, &input.memory.zero_page).ok();
    memory.load(0x0100, &input.memory.io_page).ok();
    let stack_base = input.cpu_state.sp.saturating_sub(8);
    memory.load(stack_base, &input.memory.stack).ok();
    memory.load(input.cpu_state.pc, &input.memory.instruction_bytes).ok();

    let mut cpu = Cpu::new(memory);
    for (index, &value) in input.cpu_state.registers.iter().enumerate() {
        cpu.set_register(index, value as u32).ok();
    }
    cpu.set_sp(input.cpu_state.sp);
    cpu.set_pc(input.cpu_state.pc);
    cpu.set_status(input.cpu_state.status);

    let before = cpu.snapshot();
    match cpu.step() {
        Ok(()) => assert_eq!(cpu.cycles(), 1),
        Err(_) => assert_eq!(cpu.snapshot(), before),
    }
    // Reserved status bits never become visible
    assert_eq!(cpu.status() & 0b0011_1000, 0);
});
