//! # Virtual Console Core
//!
//! CPU engine, assembler, memory/video subsystem and real-time scheduler for
//! an 8-bit fantasy console used by a creative-coding devkit.
//!
//! The console has six 8-bit registers (R0-R5, usable as the address pairs
//! R0:R1, R2:R3 and R4:R5), a 16-bit stack pointer and program counter, a flat
//! 64KB memory with memory-mapped video and interrupt registers, and a textual
//! assembler that produces loadable segments plus debug metadata.
//!
//! ## Quick Start
//!
//! ```rust
//! use vconsole::{assemble, Cpu, Memory, NoIncludes};
//!
//! let output = assemble("LD R0, #5\nADD R0, #3\nST R0, [$0010]", "main.asm", &NoIncludes);
//! assert!(output.is_loadable());
//!
//! let mut cpu = Cpu::new(Memory::new());
//! cpu.load_segments(&output.segments).unwrap();
//! for _ in 0..3 {
//!     cpu.step().unwrap();
//! }
//! assert_eq!(cpu.memory().peek(0x0010), 8);
//! ```
//!
//! ## Modules
//!
//! - `opcodes` / `addressing` - Instruction encoding tables
//! - `memory` - Bounds-checked bus, memory map and the shared memory region
//! - `video` - Video modes and palette initialization
//! - `cpu` - Registers, flags and the fetch-decode-execute loop
//! - `assembler` - Two-pass assembler with symbol table and source map
//! - `disassembler` - Machine code listing
//! - `debugger` - Source-level breakpoints
//! - `scheduler` - Fixed-rate execution actor with run/pause/step control
//! - `assets` - Palette, tile sheet and cartridge binary formats

pub mod addressing;
pub mod assembler;
pub mod assets;
pub mod cpu;
pub mod debugger;
pub mod disassembler;
pub mod memory;
pub mod opcodes;
pub mod scheduler;
pub mod video;
pub mod wasm;

// Internal instruction implementations (not part of public API)
mod instructions;

use thiserror::Error;

// Re-export public API
pub use addressing::{AddressingMode, Register, RegisterPair};
pub use assembler::{
    assemble, AssemblerError, AssemblyOutput, ErrorType, FileResolver, NoIncludes, Segment,
};
pub use cpu::{Cpu, StatusFlags};
pub use debugger::{Breakpoint, BreakpointSet};
pub use disassembler::{disassemble, DisassembledInstruction};
pub use memory::{Memory, MemoryBus, SharedMemory};
pub use opcodes::{Instruction, Mnemonic, Opcode, Operand, MNEMONIC_TABLE};
pub use scheduler::{
    Command, Event, RunState, Scheduler, SchedulerConfig, SchedulerHandle, Snapshot, SpawnError,
};
pub use video::VideoMode;

/// Fatal faults raised by the CPU engine.
///
/// A fault stops the instruction that caused it before any state is
/// committed, and halts the scheduler that was driving the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineFault {
    /// Undefined opcode/addressing-mode/register combination.
    ///
    /// Contains the first instruction byte and the address it was fetched from.
    #[error("invalid opcode ${opcode:02X} at ${address:04X}")]
    InvalidOpcode { opcode: u8, address: u16 },

    /// A memory access (including instruction fetch and stack access) fell
    /// outside $0000-$FFFF.
    #[error("memory access out of bounds at ${address:05X}")]
    MemoryOutOfBounds { address: u32 },
}

/// Errors returned by the register accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("register index {0} out of range (R0-R5)")]
    InvalidRegister(usize),

    #[error("value {value} does not fit in {max}")]
    ValueOutOfRange { value: u32, max: u32 },
}
