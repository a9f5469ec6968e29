//! Memory bus tests
//!
//! Covers bounds checking, memory-mapped register side effects and the
//! shared region seen by readers.

use vconsole::memory::map::{
    CONTROLLER_1, CONTROLLER_2, INT_ENABLE, INT_STATUS, IRQ_VBLANK, MAX_ADDRESS, MEMORY_SIZE,
};
use vconsole::{EngineFault, Memory, MemoryBus};

#[test]
fn test_memory_initialization() {
    let memory = Memory::new();
    for address in [0x0000, 0x1234, 0x8000, 0xFFFF] {
        assert_eq!(memory.read8(address).unwrap(), 0, "${address:04X}");
    }
    assert_eq!(memory.shared().to_vec().len(), MEMORY_SIZE);
}

#[test]
fn test_read_write_round_trip() {
    let mut memory = Memory::new();
    for (address, value) in [(0x0000, 0x01), (0x00FF, 0xFF), (0x2000, 0x7F), (0xFFFF, 0x80)] {
        memory.write8(address, value).unwrap();
        assert_eq!(memory.read8(address).unwrap(), value);
    }
}

#[test]
fn test_out_of_range_access_faults() {
    let mut memory = Memory::new();
    let past_end = MAX_ADDRESS + 1;
    assert_eq!(
        memory.read8(past_end),
        Err(EngineFault::MemoryOutOfBounds { address: past_end })
    );
    assert_eq!(
        memory.write8(0x12345, 1),
        Err(EngineFault::MemoryOutOfBounds { address: 0x12345 })
    );
}

#[test]
fn test_word_access_is_little_endian_and_bounded() {
    let mut memory = Memory::new();
    memory.write16(0x3000, 0x1234).unwrap();
    assert_eq!(memory.peek(0x3000), 0x34);
    assert_eq!(memory.peek(0x3001), 0x12);

    // A word at $FFFF would spill past the end: nothing is written
    assert!(memory.write16(0xFFFF, 0xABCD).is_err());
    assert_eq!(memory.peek(0xFFFF), 0);
    assert!(memory.read16(0xFFFF).is_err());
}

#[test]
fn test_int_status_write_one_to_clear() {
    let mut memory = Memory::new();
    memory.raise_interrupt(0b1011);
    memory.write8(INT_STATUS as u32, 0b0011).unwrap();
    assert_eq!(memory.peek(INT_STATUS), 0b1000);

    // Writing zero changes nothing
    memory.write8(INT_STATUS as u32, 0).unwrap();
    assert_eq!(memory.peek(INT_STATUS), 0b1000);
}

#[test]
fn test_raise_interrupt_latches() {
    let mut memory = Memory::new();
    memory.raise_interrupt(IRQ_VBLANK);
    memory.raise_interrupt(0b0100);
    assert_eq!(memory.peek(INT_STATUS), 0b0101);
}

#[test]
fn test_int_enable_is_plain_storage() {
    let mut memory = Memory::new();
    memory.write8(INT_ENABLE as u32, 0xA5).unwrap();
    assert_eq!(memory.read8(INT_ENABLE as u32).unwrap(), 0xA5);
}

#[test]
fn test_controllers() {
    let mut memory = Memory::new();
    assert!(memory.set_controller(1, 0b1000_0001));
    assert!(memory.set_controller(2, 0x40));
    assert!(!memory.set_controller(3, 0xFF));
    assert_eq!(memory.peek(CONTROLLER_1), 0b1000_0001);
    assert_eq!(memory.peek(CONTROLLER_2), 0x40);
}

#[test]
fn test_load_is_all_or_nothing() {
    let mut memory = Memory::new();
    assert!(memory.load(0xFFFE, &[1, 2, 3]).is_err());
    assert_eq!(memory.peek(0xFFFE), 0);

    memory.load(0xFFFD, &[1, 2, 3]).unwrap();
    assert_eq!(memory.peek(0xFFFF), 3);
    memory.load(0xFFFF, &[]).unwrap();
}

#[test]
fn test_load_skips_side_effects() {
    let mut memory = Memory::new();
    memory.raise_interrupt(0xFF);
    memory.load(INT_STATUS, &[0x01]).unwrap();
    assert_eq!(memory.peek(INT_STATUS), 0x01);
}

#[test]
fn test_shared_region_readers() {
    let mut memory = Memory::new();
    let shared = memory.shared();
    assert_eq!(shared.handle_count(), 2);

    memory.write8(0x4000, 0x99).unwrap();
    let reader = memory.shared();
    let seen = std::thread::spawn(move || reader.get(0x4000))
        .join()
        .unwrap();
    assert_eq!(seen, 0x99);

    assert_eq!(shared.copy_range(0x3FFF..0x4002), vec![0, 0x99, 0]);
    // Clamped to the address space
    assert_eq!(shared.copy_range(0xFFFE..0x2_0000).len(), 2);
}

#[test]
fn test_reset_zero_fills() {
    let mut memory = Memory::new();
    memory.write8(0x1234, 1).unwrap();
    memory.reset();
    assert!(memory.shared().to_vec().iter().all(|&b| b == 0));
}
