//! Tests for LD and ST across addressing modes.

use vconsole::memory::map::{FRAMEBUFFER, INT_STATUS, VIDEO_MODE};
use vconsole::{assemble, Cpu, EngineFault, Memory, NoIncludes, Register};

fn setup_cpu(source: &str) -> Cpu<Memory> {
    let output = assemble(source, "test.asm", &NoIncludes);
    assert!(output.is_loadable(), "{:?}", output.errors);
    let mut cpu = Cpu::new(Memory::new());
    cpu.reset().unwrap();
    cpu.load_segments(&output.segments).unwrap();
    cpu
}

#[test]
fn test_ld_immediate_sets_zn() {
    let mut cpu = setup_cpu("LD R0, #0\nLD R1, #$80\nLD R2, #$7F");

    cpu.step().unwrap();
    assert!(cpu.flags().zero());
    cpu.step().unwrap();
    assert_eq!(cpu.reg(Register::R1), 0x80);
    assert!(cpu.flags().negative());
    assert!(!cpu.flags().zero());
    cpu.step().unwrap();
    assert!(!cpu.flags().negative());
}

#[test]
fn test_ld_leaves_carry_and_overflow() {
    let mut cpu = setup_cpu("LD R0, #1");
    cpu.set_status(0b0100_0001);
    cpu.step().unwrap();
    assert!(cpu.flags().carry());
    assert!(cpu.flags().overflow());
}

#[test]
fn test_ld_register_to_register() {
    let mut cpu = setup_cpu("LD R5, R2");
    cpu.set_reg(Register::R2, 0x99);
    cpu.step().unwrap();
    assert_eq!(cpu.reg(Register::R5), 0x99);
    assert_eq!(cpu.reg(Register::R2), 0x99);
    assert_eq!(cpu.pc(), 2);
}

#[test]
fn test_ld_memory_modes() {
    let mut cpu = setup_cpu(
        "
        LD R0, [$10]
        LD R1, [$1234]
        LD R2, [$10 + R3]
        LD R4, [R0:R1]
        ",
    );
    cpu.memory_mut().poke(0x10, 0x12);
    cpu.memory_mut().poke(0x1234, 0x34);
    cpu.memory_mut().poke(0x15, 0x55);
    cpu.set_reg(Register::R3, 5);

    cpu.run_steps(4).unwrap();
    assert_eq!(cpu.reg(Register::R0), 0x12);
    assert_eq!(cpu.reg(Register::R1), 0x34);
    assert_eq!(cpu.reg(Register::R2), 0x55);
    // R0:R1 = $1234
    assert_eq!(cpu.reg(Register::R4), 0x34);
}

#[test]
fn test_st_memory_modes() {
    let mut cpu = setup_cpu(
        "
        ST R0, [$20]
        ST R0, [$4000]
        ST R0, [$F0 + R1]
        ST R0, [R2:R3]
        ",
    );
    cpu.set_reg(Register::R0, 0xAB);
    cpu.set_reg(Register::R1, 0x20);
    cpu.set_reg(Register::R2, 0xB0);
    cpu.set_reg(Register::R3, 0x01);
    let status = cpu.status();

    cpu.run_steps(4).unwrap();
    let memory = cpu.memory();
    assert_eq!(memory.peek(0x0020), 0xAB);
    assert_eq!(memory.peek(0x4000), 0xAB);
    assert_eq!(memory.peek(0x0110), 0xAB, "zero-page index does not wrap");
    assert_eq!(memory.peek(FRAMEBUFFER + 1), 0xAB);
    assert_eq!(cpu.status(), status, "ST affects no flags");
}

#[test]
fn test_st_to_video_mode_register_switches_palette() {
    let mut cpu = setup_cpu("LD R0, #1\nST R0, [$0101]");
    cpu.run_steps(2).unwrap();
    assert_eq!(cpu.memory().peek(VIDEO_MODE), 1);
    assert_eq!(cpu.memory().peek(0x0200 + 0x42), 0x42);
}

#[test]
fn test_st_to_int_status_acknowledges() {
    let mut cpu = setup_cpu("LD R0, #1\nST R0, [$0114]");
    cpu.memory_mut().poke(INT_STATUS, 0b11);
    cpu.run_steps(2).unwrap();
    assert_eq!(cpu.memory().peek(INT_STATUS), 0b10);
}

#[test]
fn test_addressing_reaches_top_of_memory() {
    let mut cpu = setup_cpu("LD R0, [$FF + R1]\nLD R2, [R4:R5]");
    cpu.set_reg(Register::R1, 0xFF);
    cpu.set_reg(Register::R4, 0xFF);
    cpu.set_reg(Register::R5, 0xFF);
    cpu.memory_mut().poke(0x01FE, 7);
    cpu.memory_mut().poke(0xFFFF, 9);
    cpu.run_steps(2).unwrap();
    assert_eq!(cpu.reg(Register::R0), 7);
    assert_eq!(cpu.reg(Register::R2), 9);
}

#[test]
fn test_fetch_past_end_of_memory_faults_atomically() {
    let mut cpu = Cpu::new(Memory::new());
    // LD R0, #imm with its immediate byte missing at $10000
    cpu.memory_mut().poke(0xFFFE, 0x12);
    cpu.memory_mut().poke(0xFFFF, 0x00);
    cpu.set_pc(0xFFFE);
    let before = cpu.snapshot();

    assert_eq!(
        cpu.step(),
        Err(EngineFault::MemoryOutOfBounds { address: 0x1_0000 })
    );
    assert_eq!(cpu.snapshot(), before);
}

#[test]
fn test_fallthrough_past_end_of_memory_faults() {
    let mut cpu = Cpu::new(Memory::new());
    cpu.memory_mut().poke(0xFFFF, 0x00); // NOP
    cpu.set_pc(0xFFFF);
    assert_eq!(
        cpu.step(),
        Err(EngineFault::MemoryOutOfBounds { address: 0x1_0000 })
    );
    assert_eq!(cpu.pc(), 0xFFFF);
    assert_eq!(cpu.cycles(), 0);
}

#[test]
fn test_invalid_opcode_faults() {
    let mut cpu = Cpu::new(Memory::new());
    cpu.memory_mut().poke(0x0000, 0x0F);
    assert_eq!(
        cpu.step(),
        Err(EngineFault::InvalidOpcode {
            opcode: 0x0F,
            address: 0
        })
    );

    // ST with an immediate operand is undefined
    cpu.memory_mut().poke(0x0000, 0x22);
    assert!(matches!(cpu.step(), Err(EngineFault::InvalidOpcode { .. })));

    // register field naming R6
    cpu.memory_mut().poke(0x0000, 0x12);
    cpu.memory_mut().poke(0x0001, 0x60);
    assert!(matches!(cpu.step(), Err(EngineFault::InvalidOpcode { .. })));
    assert_eq!(cpu.cycles(), 0);
}
