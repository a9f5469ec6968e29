//! Video mode register and palette RAM tests.

use vconsole::memory::map::{PALETTE_RAM, PALETTE_RAM_SIZE, SCANLINE_PALETTE, SCREEN_HEIGHT, VIDEO_MODE};
use vconsole::video::DEFAULT_PALETTE;
use vconsole::{assemble, Cpu, Memory, MemoryBus, NoIncludes, VideoMode};

fn palette(memory: &Memory) -> Vec<u8> {
    let start = PALETTE_RAM as usize;
    memory.shared().copy_range(start..start + PALETTE_RAM_SIZE)
}

#[test]
fn test_4bpp_modes_repeat_default_palette() {
    for mode in [0, 3] {
        let mut memory = Memory::new();
        memory.write8(VIDEO_MODE as u32, mode).unwrap();
        let ram = palette(&memory);
        for block in ram.chunks(16) {
            assert_eq!(block, DEFAULT_PALETTE, "mode {mode}");
        }
    }
}

#[test]
fn test_8bpp_modes_use_identity_blocks() {
    for mode in [1, 2] {
        let mut memory = Memory::new();
        memory.write8(VIDEO_MODE as u32, mode).unwrap();
        let ram = palette(&memory);
        for (offset, &value) in ram.iter().enumerate() {
            assert_eq!(value as usize, offset % 256, "mode {mode}");
        }
    }
}

#[test]
fn test_mode_switch_resets_scanline_table() {
    let mut memory = Memory::new();
    for line in 0..SCREEN_HEIGHT as u16 {
        memory.write8((SCANLINE_PALETTE + line) as u32, 7).unwrap();
    }
    memory.write8(VIDEO_MODE as u32, 2).unwrap();
    for line in 0..SCREEN_HEIGHT as u16 {
        assert_eq!(memory.peek(SCANLINE_PALETTE + line), 0);
    }
    // The byte after the table is untouched
    memory.poke(SCANLINE_PALETTE + SCREEN_HEIGHT as u16, 9);
    memory.write8(VIDEO_MODE as u32, 0).unwrap();
    assert_eq!(memory.peek(SCANLINE_PALETTE + SCREEN_HEIGHT as u16), 9);
}

#[test]
fn test_undefined_mode_is_stored_only() {
    let mut memory = Memory::new();
    memory.write8(VIDEO_MODE as u32, 1).unwrap();
    memory.write8(PALETTE_RAM as u32 + 5, 0xEE).unwrap();

    memory.write8(VIDEO_MODE as u32, 9).unwrap();
    assert_eq!(memory.peek(VIDEO_MODE), 9);
    assert_eq!(memory.video_mode(), None);
    assert_eq!(memory.peek(PALETTE_RAM + 5), 0xEE, "palette untouched");
}

#[test]
fn test_program_can_edit_palette_after_switch() {
    let output = assemble(
        "LD R0, #3\nST R0, [$0101]\nLD R1, #$21\nST R1, [$0200]",
        "video.asm",
        &NoIncludes,
    );
    assert!(output.is_loadable(), "{:?}", output.errors);

    let mut cpu = Cpu::new(Memory::new());
    cpu.reset().unwrap();
    cpu.load_segments(&output.segments).unwrap();
    cpu.run_steps(4).unwrap();

    assert_eq!(cpu.memory().video_mode(), Some(VideoMode::Mode3));
    assert_eq!(cpu.memory().peek(PALETTE_RAM), 0x21);
    assert_eq!(cpu.memory().peek(PALETTE_RAM + 16), DEFAULT_PALETTE[0]);
}

#[test]
fn test_reset_restores_mode_0() {
    let mut cpu = Cpu::new(Memory::new());
    cpu.memory_mut().write8(VIDEO_MODE as u32, 1).unwrap();
    cpu.reset().unwrap();
    assert_eq!(cpu.memory().video_mode(), Some(VideoMode::Mode0));
    assert_eq!(cpu.memory().peek(PALETTE_RAM + 1), DEFAULT_PALETTE[1]);
}
