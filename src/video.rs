//! # Video Modes and Palette RAM
//!
//! The console renders from a framebuffer through palette RAM. Palette RAM
//! holds 1024 system-palette indices; how they are grouped depends on the
//! video mode:
//!
//! - **Modes 0 and 3** (4 bits/pixel): 64 blocks of 16 entries
//! - **Modes 1 and 2** (8 bits/pixel): 4 blocks of 256 entries
//!
//! Each scanline selects one palette block through its byte in the scanline
//! palette table. Turning palette indices into pixels is the renderer's job
//! and is not part of this crate.

use crate::memory::map::{PALETTE_RAM, PALETTE_RAM_SIZE, SCANLINE_PALETTE, SCREEN_HEIGHT};
use crate::memory::Memory;
use serde::{Deserialize, Serialize};

/// Default 16-entry palette (system-palette indices) used by 4bpp modes.
pub const DEFAULT_PALETTE: [u8; 16] = [
    0x00, 0x0F, 0x16, 0x1A, 0x12, 0x26, 0x2A, 0x30, 0x36, 0x3A, 0x05, 0x15, 0x25, 0x35, 0x3D, 0x3F,
];

/// The four defined values of the video mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoMode {
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
    Mode3 = 3,
}

impl VideoMode {
    /// Decodes a video mode register value. Values above 3 are undefined.
    pub const fn from_register(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }

    pub const fn bits_per_pixel(self) -> u8 {
        match self {
            Self::Mode0 | Self::Mode3 => 4,
            Self::Mode1 | Self::Mode2 => 8,
        }
    }

    /// Number of palette entries addressable by one pixel.
    pub const fn palette_block_size(self) -> usize {
        1 << self.bits_per_pixel()
    }
}

/// Returns the palette RAM contents a mode starts with.
///
/// # Examples
///
/// ```
/// use vconsole::video::{default_palette_ram, DEFAULT_PALETTE};
/// use vconsole::VideoMode;
///
/// let ram = default_palette_ram(VideoMode::Mode0);
/// assert_eq!(ram[16 * 63 + 5], DEFAULT_PALETTE[5]);
///
/// let ram = default_palette_ram(VideoMode::Mode1);
/// assert_eq!(ram[200], 200);
/// assert_eq!(ram[256 + 200], 200);
/// ```
pub fn default_palette_ram(mode: VideoMode) -> [u8; PALETTE_RAM_SIZE] {
    let mut ram = [0u8; PALETTE_RAM_SIZE];
    match mode.bits_per_pixel() {
        4 => {
            for (offset, entry) in ram.iter_mut().enumerate() {
                *entry = DEFAULT_PALETTE[offset % DEFAULT_PALETTE.len()];
            }
        }
        _ => {
            for (offset, entry) in ram.iter_mut().enumerate() {
                *entry = (offset % 256) as u8;
            }
        }
    }
    ram
}

/// Reinitializes palette RAM for `mode` and resets every scanline's palette
/// block selector to 0.
///
/// Called by the bus when the CPU writes 0-3 to the video mode register, and
/// therefore on every CPU reset (which selects mode 0).
pub fn set_video_mode(memory: &mut Memory, mode: VideoMode) {
    log::trace!("video mode {:?} ({} bpp)", mode, mode.bits_per_pixel());
    for (offset, value) in default_palette_ram(mode).into_iter().enumerate() {
        memory.poke(PALETTE_RAM + offset as u16, value);
    }
    for line in 0..SCREEN_HEIGHT {
        memory.poke(SCANLINE_PALETTE + line as u16, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        assert_eq!(VideoMode::Mode0.palette_block_size(), 16);
        assert_eq!(VideoMode::Mode3.palette_block_size(), 16);
        assert_eq!(VideoMode::Mode1.palette_block_size(), 256);
        assert_eq!(VideoMode::Mode2.palette_block_size(), 256);
    }

    #[test]
    fn test_mode_switch_overwrites_previous_palette() {
        let mut memory = Memory::new();
        set_video_mode(&mut memory, VideoMode::Mode2);
        set_video_mode(&mut memory, VideoMode::Mode3);
        for offset in 0..PALETTE_RAM_SIZE {
            assert_eq!(
                memory.peek(PALETTE_RAM + offset as u16),
                DEFAULT_PALETTE[offset % 16]
            );
        }
    }
}
