//! Fixed memory map of the console.
//!
//! These addresses are a hardware contract shared by assembled programs and
//! the CPU engine.

/// Size of the address space in bytes.
pub const MEMORY_SIZE: usize = 0x1_0000;

/// Highest valid address.
pub const MAX_ADDRESS: u32 = 0xFFFF;

/// Zero page: $0000-$00FF.
pub const ZERO_PAGE_END: u16 = 0x00FF;

/// Video mode register. Writing 0-3 reinitializes the palette.
pub const VIDEO_MODE: u16 = 0x0101;

/// Horizontal scroll register (plain storage).
pub const SCROLL_X: u16 = 0x0102;

/// Vertical scroll register (plain storage).
pub const SCROLL_Y: u16 = 0x0103;

/// Pending interrupt sources. CPU writes clear the bits written as 1.
pub const INT_STATUS: u16 = 0x0114;

/// Interrupt source enable mask.
pub const INT_ENABLE: u16 = 0x0115;

/// Little-endian address of the interrupt handler.
pub const IRQ_VECTOR: u16 = 0x0130;

/// First controller button state.
pub const CONTROLLER_1: u16 = 0x0136;

/// Second controller button state.
pub const CONTROLLER_2: u16 = 0x0137;

/// Palette RAM base address.
pub const PALETTE_RAM: u16 = 0x0200;

/// Palette RAM size in bytes.
pub const PALETTE_RAM_SIZE: usize = 1024;

/// Per-scanline palette block selectors.
pub const SCANLINE_PALETTE: u16 = 0x0600;

/// Visible scanlines.
pub const SCREEN_HEIGHT: usize = 160;

/// Visible pixels per scanline.
pub const SCREEN_WIDTH: usize = 256;

/// Framebuffer base address ($B000-$FFFF, 256x160 at 4bpp).
pub const FRAMEBUFFER: u16 = 0xB000;

/// Framebuffer size at 4 bits per pixel.
pub const FRAMEBUFFER_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 2;

/// Stack pointer after reset. The stack grows down below the framebuffer.
pub const DEFAULT_STACK_POINTER: u16 = 0xB000;

/// VBlank bit in INT_STATUS / INT_ENABLE.
pub const IRQ_VBLANK: u8 = 0x01;
