//! # CPU State and Execution
//!
//! This module contains the `Cpu` struct representing the console processor
//! state and the fetch-decode-execute loop.
//!
//! ## CPU State
//!
//! The CPU maintains:
//! - **Registers**: Six 8-bit general registers R0-R5 (pairs R0:R1, R2:R3, R4:R5
//!   form 16-bit addresses, high:low)
//! - **Program counter** (PC): 16-bit address of next instruction
//! - **Stack pointer** (SP): 16-bit, grows downward, $B000 after reset
//! - **Status register**: C (bit 0), Z (bit 1), I (bit 2), V (bit 6), N (bit 7)
//! - **Cycle counter**: u64, one cycle per completed step
//!
//! ## Execution Model
//!
//! `step()` either services a pending interrupt or fetches, decodes and
//! executes one instruction. Every operand, stack slot and target address is
//! validated before anything is written, so a faulting step leaves no partial
//! state behind.

use crate::assembler::Segment;
use crate::instructions;
use crate::memory::map::{
    DEFAULT_STACK_POINTER, INT_ENABLE, INT_STATUS, IRQ_VECTOR, VIDEO_MODE,
};
use crate::memory::{check_address, Memory, MemoryBus};
use crate::opcodes::{instruction_length, Instruction};
use crate::{EngineFault, Register, RegisterError};
use serde::{Deserialize, Serialize};

/// The 8-bit status register.
///
/// Bit layout (NV---IZC):
/// - Bit 7: N (Negative)
/// - Bit 6: V (Overflow)
/// - Bits 5-3: reserved, always 0
/// - Bit 2: I (Interrupt enable, set by SEI)
/// - Bit 1: Z (Zero)
/// - Bit 0: C (Carry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const CARRY: u8 = 0b0000_0001;
    pub const ZERO: u8 = 0b0000_0010;
    pub const INTERRUPT: u8 = 0b0000_0100;
    pub const OVERFLOW: u8 = 0b0100_0000;
    pub const NEGATIVE: u8 = 0b1000_0000;

    /// Bits that can be set at all.
    pub const DEFINED: u8 =
        Self::CARRY | Self::ZERO | Self::INTERRUPT | Self::OVERFLOW | Self::NEGATIVE;

    /// Builds flags from a raw byte, dropping reserved bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::DEFINED)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Updates Z and N from an 8-bit result.
    pub fn set_zn(&mut self, result: u8) {
        self.set(Self::ZERO, result == 0);
        self.set(Self::NEGATIVE, result & 0x80 != 0);
    }

    pub const fn carry(self) -> bool {
        self.contains(Self::CARRY)
    }

    pub const fn zero(self) -> bool {
        self.contains(Self::ZERO)
    }

    pub const fn interrupts_enabled(self) -> bool {
        self.contains(Self::INTERRUPT)
    }

    pub const fn overflow(self) -> bool {
        self.contains(Self::OVERFLOW)
    }

    pub const fn negative(self) -> bool {
        self.contains(Self::NEGATIVE)
    }
}

/// The architectural register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R5
    pub gp: [u8; 6],
    pub sp: u16,
    pub pc: u16,
    pub status: StatusFlags,
}

impl Registers {
    /// Post-reset register values.
    pub const fn reset_state() -> Self {
        Self {
            gp: [0; 6],
            sp: DEFAULT_STACK_POINTER,
            pc: 0,
            status: StatusFlags(0),
        }
    }

    pub const fn get(&self, reg: Register) -> u8 {
        self.gp[reg as usize]
    }

    pub fn set(&mut self, reg: Register, value: u8) {
        self.gp[reg.index()] = value;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::reset_state()
    }
}

/// Point-in-time copy of the CPU state, as reported to debugger front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub registers: [u8; 6],
    pub stack_pointer: u16,
    pub program_counter: u16,
    pub status_register: u8,
    pub cycle_count: u64,
}

/// Console CPU state and execution context.
///
/// The CPU is generic over the memory implementation via the `MemoryBus`
/// trait.
///
/// # Type Parameters
///
/// * `M` - Memory bus implementation (must implement `MemoryBus` trait)
///
/// # Examples
///
/// ```
/// use vconsole::{Cpu, Memory};
///
/// let mut cpu = Cpu::new(Memory::new());
/// cpu.reset().unwrap();
///
/// assert_eq!(cpu.pc(), 0x0000);
/// assert_eq!(cpu.sp(), 0xB000);
/// assert_eq!(cpu.status(), 0);
/// assert_eq!(cpu.cycles(), 0);
/// ```
pub struct Cpu<M: MemoryBus> {
    pub(crate) regs: Registers,

    /// Set by HLT, cleared by interrupt entry, reset or `set_pc`.
    pub(crate) halted: bool,

    /// Total steps executed since reset
    pub(crate) cycles: u64,

    pub(crate) memory: M,
}

impl<M: MemoryBus> Cpu<M> {
    /// Creates a new CPU over `memory` with post-reset register values.
    ///
    /// Memory is not touched; call [`Cpu::reset`] to also initialize video.
    pub fn new(memory: M) -> Self {
        Self {
            regs: Registers::reset_state(),
            halted: false,
            cycles: 0,
            memory,
        }
    }

    /// Resets the CPU.
    ///
    /// - R0-R5 and the status register are zeroed (interrupts disabled)
    /// - SP is set to $B000 and PC to $0000
    /// - The cycle counter is cleared
    /// - Video mode 0 is selected, which reloads the default palette
    pub fn reset(&mut self) -> Result<(), EngineFault> {
        self.regs = Registers::reset_state();
        self.halted = false;
        self.cycles = 0;
        self.memory.write8(VIDEO_MODE as u32, 0)
    }

    /// Executes one instruction (or services one interrupt) and advances the
    /// CPU state.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the step completed
    /// - `Err(EngineFault::InvalidOpcode)` for undefined encodings
    /// - `Err(EngineFault::MemoryOutOfBounds)` if any touched address (fetch,
    ///   operand, stack or fall-through PC) is outside $0000-$FFFF
    ///
    /// On error no register, flag, cycle or memory state has changed.
    pub fn step(&mut self) -> Result<(), EngineFault> {
        if self.interrupt_pending()? {
            instructions::control::enter_interrupt(self)?;
            self.cycles += 1;
            return Ok(());
        }

        if self.halted {
            self.cycles += 1;
            return Ok(());
        }

        let instruction = self.fetch()?;
        let fallthrough = self.regs.pc as u32 + instruction.length() as u32;
        log::trace!(
            "${:04X}: {:?} {:?} {:?}",
            self.regs.pc,
            instruction.mnemonic,
            instruction.register,
            instruction.operand
        );

        instructions::execute(self, &instruction, fallthrough)?;
        self.cycles += 1;
        Ok(())
    }

    /// Runs until `count` steps have completed or a fault occurs.
    ///
    /// Returns the number of steps executed.
    pub fn run_steps(&mut self, count: u64) -> Result<u64, EngineFault> {
        for _ in 0..count {
            self.step()?;
        }
        Ok(count)
    }

    /// Fetches and decodes the instruction at PC without executing it.
    fn fetch(&self) -> Result<Instruction, EngineFault> {
        let pc = self.regs.pc;
        let first = self.memory.read8(pc as u32)?;
        let invalid = EngineFault::InvalidOpcode {
            opcode: first,
            address: pc,
        };
        let length = instruction_length(first).ok_or(invalid)? as usize;

        let mut bytes = [first, 0, 0, 0];
        for (offset, byte) in bytes.iter_mut().enumerate().take(length).skip(1) {
            *byte = self.memory.read8(pc as u32 + offset as u32)?;
        }

        Instruction::decode(&bytes[..length]).map_err(|_| invalid)
    }

    /// True when interrupts are enabled and an enabled source is pending.
    fn interrupt_pending(&self) -> Result<bool, EngineFault> {
        if !self.regs.status.interrupts_enabled() {
            return Ok(false);
        }
        let pending = self.memory.read8(INT_STATUS as u32)?;
        let enabled = self.memory.read8(INT_ENABLE as u32)?;
        Ok(pending & enabled != 0)
    }

    /// True when the next step fetches the instruction at PC, i.e. the CPU
    /// is not halted and no interrupt is about to be taken.
    pub(crate) fn will_fetch(&self) -> bool {
        !self.halted && !matches!(self.interrupt_pending(), Ok(true))
    }

    /// Reads the interrupt handler address from the vector.
    pub(crate) fn irq_vector(&self) -> Result<u16, EngineFault> {
        self.memory.read16(IRQ_VECTOR as u32)
    }

    // ========== Register Accessors ==========

    /// Returns general register `index` (0-5).
    ///
    /// # Examples
    ///
    /// ```
    /// use vconsole::{Cpu, Memory, RegisterError};
    ///
    /// let mut cpu = Cpu::new(Memory::new());
    /// cpu.set_register(2, 0x7F).unwrap();
    /// assert_eq!(cpu.get_register(2), Ok(0x7F));
    /// assert_eq!(cpu.get_register(6), Err(RegisterError::InvalidRegister(6)));
    /// assert!(cpu.set_register(0, 0x100).is_err());
    /// ```
    pub fn get_register(&self, index: usize) -> Result<u8, RegisterError> {
        let reg = Register::from_index(index).ok_or(RegisterError::InvalidRegister(index))?;
        Ok(self.regs.get(reg))
    }

    /// Sets general register `index` (0-5). Values above 255 are rejected.
    pub fn set_register(&mut self, index: usize, value: u32) -> Result<(), RegisterError> {
        let reg = Register::from_index(index).ok_or(RegisterError::InvalidRegister(index))?;
        let value = u8::try_from(value).map_err(|_| RegisterError::ValueOutOfRange {
            value,
            max: u8::MAX as u32,
        })?;
        self.regs.set(reg, value);
        Ok(())
    }

    /// Returns a register by name.
    pub fn reg(&self, reg: Register) -> u8 {
        self.regs.get(reg)
    }

    /// Sets a register by name.
    pub fn set_reg(&mut self, reg: Register, value: u8) {
        self.regs.set(reg, value);
    }

    /// Returns the program counter value.
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// Moves the program counter without executing anything.
    ///
    /// This is the only out-of-band PC write; it is used after loading newly
    /// assembled code and does not advance the cycle counter. It also wakes
    /// the CPU from HLT.
    pub fn set_pc(&mut self, address: u16) {
        self.regs.pc = address;
        self.halted = false;
    }

    /// Returns the stack pointer value.
    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn set_sp(&mut self, value: u16) {
        self.regs.sp = value;
    }

    /// Returns the status register as a packed byte.
    pub fn status(&self) -> u8 {
        self.regs.status.bits()
    }

    pub fn flags(&self) -> StatusFlags {
        self.regs.status
    }

    pub fn set_status(&mut self, bits: u8) {
        self.regs.status = StatusFlags::from_bits(bits);
    }

    /// Returns the full register file.
    pub fn registers(&self) -> Registers {
        self.regs
    }

    /// Returns the total number of steps executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns true while the CPU is waiting in HLT for an interrupt.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Captures registers, flags and cycle count.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.gp,
            stack_pointer: self.regs.sp,
            program_counter: self.regs.pc,
            status_register: self.regs.status.bits(),
            cycle_count: self.cycles,
        }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Consumes the CPU and returns its memory bus.
    pub fn into_memory(self) -> M {
        self.memory
    }
}

impl Cpu<Memory> {
    /// Copies assembled segments into memory.
    ///
    /// Every segment is validated before any is written.
    pub fn load_segments(&mut self, segments: &[Segment]) -> Result<(), EngineFault> {
        for segment in segments {
            if !segment.data.is_empty() {
                check_address(segment.start_address as u32 + segment.data.len() as u32 - 1)?;
            }
        }
        for segment in segments {
            self.memory.load(segment.start_address, &segment.data)?;
        }
        Ok(())
    }

    /// Latches interrupt sources into INT_STATUS (e.g. VBlank).
    pub fn raise_interrupt(&mut self, sources: u8) {
        self.memory.raise_interrupt(sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::map::PALETTE_RAM;
    use crate::video::DEFAULT_PALETTE;

    #[test]
    fn test_cpu_initialization() {
        let cpu = Cpu::new(Memory::new());

        assert_eq!(cpu.pc(), 0x0000);
        assert_eq!(cpu.sp(), DEFAULT_STACK_POINTER);
        assert_eq!(cpu.registers().gp, [0; 6]);
        assert_eq!(cpu.cycles(), 0);
        assert_eq!(cpu.status(), 0);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_status_register_packing() {
        let mut flags = StatusFlags::default();
        flags.set(StatusFlags::CARRY, true);
        flags.set(StatusFlags::NEGATIVE, true);
        assert_eq!(flags.bits(), 0b1000_0001);

        // Reserved bits are dropped
        assert_eq!(StatusFlags::from_bits(0xFF).bits(), 0b1100_0111);
    }

    #[test]
    fn test_reset_initializes_video() {
        let mut cpu = Cpu::new(Memory::new());
        cpu.set_reg(Register::R3, 9);
        cpu.set_pc(0x1234);
        cpu.reset().unwrap();

        assert_eq!(cpu.reg(Register::R3), 0);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.memory().peek(PALETTE_RAM + 17), DEFAULT_PALETTE[1]);
    }

    #[test]
    fn test_step_nop() {
        let mut cpu = Cpu::new(Memory::new());
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 0x0001);
        assert_eq!(cpu.cycles(), 1);
    }

    #[test]
    fn test_step_invalid_opcode_leaves_state() {
        let mut memory = Memory::new();
        memory.poke(0x0000, 0x0F);
        let mut cpu = Cpu::new(memory);

        assert_eq!(
            cpu.step(),
            Err(EngineFault::InvalidOpcode {
                opcode: 0x0F,
                address: 0x0000
            })
        );
        assert_eq!(cpu.pc(), 0x0000);
        assert_eq!(cpu.cycles(), 0);
    }

    #[test]
    fn test_set_pc_does_not_count_cycles() {
        let mut cpu = Cpu::new(Memory::new());
        cpu.set_pc(0x4000);
        assert_eq!(cpu.pc(), 0x4000);
        assert_eq!(cpu.cycles(), 0);
    }

    #[test]
    fn test_run_steps() {
        let mut cpu = Cpu::new(Memory::new());
        assert_eq!(cpu.run_steps(10), Ok(10));
        assert_eq!(cpu.pc(), 10);
    }
}
