//! # Memory Bus Abstraction
//!
//! This module provides the `MemoryBus` trait that decouples the CPU from the
//! console's memory implementation, and `Memory`, the console bus with its
//! memory-mapped registers.
//!
//! ## Design Principles
//!
//! Unlike a bare 8-bit bus, every access here is validated:
//! - Addresses are passed as `u32` so that effective-address arithmetic can
//!   overshoot $FFFF and be reported instead of silently wrapping
//! - Any access outside $0000-$FFFF fails with `EngineFault::MemoryOutOfBounds`
//! - Writes to hardware registers trigger side effects (see [`map`])

pub mod map;
pub mod shared;

pub use shared::SharedMemory;

use crate::video::{self, VideoMode};
use crate::EngineFault;
use map::{CONTROLLER_1, CONTROLLER_2, INT_STATUS, MAX_ADDRESS, VIDEO_MODE};

/// Memory bus trait for the CPU to read/write bytes.
///
/// # Design
///
/// - `read8(&self)`: Immutable reference allows shared reads
/// - `write8(&mut self)`: Mutable reference makes side effects explicit
/// - Both fail on out-of-range addresses; nothing is clamped
///
/// # Examples
///
/// ```
/// use vconsole::{Memory, MemoryBus};
///
/// let mut mem = Memory::new();
/// mem.write16(0x2000, 0xBEEF).unwrap();
/// assert_eq!(mem.read8(0x2000).unwrap(), 0xEF);
/// assert_eq!(mem.read16(0x2000).unwrap(), 0xBEEF);
/// assert!(mem.read8(0x1_0000).is_err());
/// ```
pub trait MemoryBus {
    /// Reads a byte from `address`.
    ///
    /// # Errors
    ///
    /// `EngineFault::MemoryOutOfBounds` if `address > 0xFFFF`.
    fn read8(&self, address: u32) -> Result<u8, EngineFault>;

    /// Writes a byte to `address`, applying memory-mapped side effects.
    ///
    /// # Errors
    ///
    /// `EngineFault::MemoryOutOfBounds` if `address > 0xFFFF`.
    fn write8(&mut self, address: u32, value: u8) -> Result<(), EngineFault>;

    /// Reads a little-endian word from `address` and `address + 1`.
    fn read16(&self, address: u32) -> Result<u16, EngineFault> {
        let low = self.read8(address)?;
        let high = self.read8(address + 1)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Writes a little-endian word. Both addresses are validated before
    /// either byte is written.
    fn write16(&mut self, address: u32, value: u16) -> Result<(), EngineFault> {
        check_address(address + 1)?;
        let [low, high] = value.to_le_bytes();
        self.write8(address, low)?;
        self.write8(address + 1, high)
    }
}

/// Validates an address and narrows it to 16 bits.
pub fn check_address(address: u32) -> Result<u16, EngineFault> {
    if address > MAX_ADDRESS {
        return Err(EngineFault::MemoryOutOfBounds { address });
    }
    Ok(address as u16)
}

/// The console memory bus.
///
/// Storage lives in a [`SharedMemory`] region so readers on other threads can
/// observe it; this struct is the region's only writer.
///
/// # Memory-Mapped Registers
///
/// - `VIDEO_MODE` ($0101): writing 0-3 calls [`video::set_video_mode`]
/// - `INT_STATUS` ($0114): writing clears the bits written as 1
///
/// Everything else is plain RAM.
#[derive(Debug)]
pub struct Memory {
    shared: SharedMemory,
}

impl Memory {
    /// Creates a bus over a fresh zero-filled region.
    pub fn new() -> Self {
        Self::with_shared(SharedMemory::new())
    }

    /// Creates a bus over an existing region, taking over as its writer.
    ///
    /// Only the scheduler attaches a caller-supplied region, so there is never
    /// a second writer.
    pub(crate) fn with_shared(shared: SharedMemory) -> Self {
        Self { shared }
    }

    /// Returns a read handle to the underlying region.
    pub fn shared(&self) -> SharedMemory {
        self.shared.clone()
    }

    /// Zero-fills all 64KB.
    pub fn reset(&mut self) {
        self.shared.fill(0);
    }

    /// Reads a byte without validation or side effects.
    pub fn peek(&self, address: u16) -> u8 {
        self.shared.get(address)
    }

    /// Stores a byte without memory-mapped side effects. Used for loading
    /// program images and by the video subsystem.
    pub fn poke(&mut self, address: u16, value: u8) {
        self.shared.set(address, value);
    }

    /// Copies `data` into memory starting at `start` without side effects.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the data would run past $FFFF.
    pub fn load(&mut self, start: u16, data: &[u8]) -> Result<(), EngineFault> {
        if !data.is_empty() {
            check_address(start as u32 + data.len() as u32 - 1)?;
        }
        for (offset, &byte) in data.iter().enumerate() {
            self.poke(start + offset as u16, byte);
        }
        Ok(())
    }

    /// Latches interrupt sources into INT_STATUS.
    pub fn raise_interrupt(&mut self, sources: u8) {
        let pending = self.peek(INT_STATUS) | sources;
        self.poke(INT_STATUS, pending);
    }

    /// Stores a controller's button state. Ports other than 1 and 2 are
    /// ignored and reported as `false`.
    pub fn set_controller(&mut self, port: u8, buttons: u8) -> bool {
        let address = match port {
            1 => CONTROLLER_1,
            2 => CONTROLLER_2,
            _ => return false,
        };
        self.poke(address, buttons);
        true
    }

    /// Current video mode register value, if it names a defined mode.
    pub fn video_mode(&self) -> Option<VideoMode> {
        VideoMode::from_register(self.peek(VIDEO_MODE))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus for Memory {
    fn read8(&self, address: u32) -> Result<u8, EngineFault> {
        Ok(self.peek(check_address(address)?))
    }

    fn write8(&mut self, address: u32, value: u8) -> Result<(), EngineFault> {
        let address = check_address(address)?;
        match address {
            VIDEO_MODE => {
                self.poke(address, value);
                if let Some(mode) = VideoMode::from_register(value) {
                    video::set_video_mode(self, mode);
                } else {
                    log::trace!("video mode register set to undefined mode {value}");
                }
            }
            INT_STATUS => {
                let pending = self.peek(INT_STATUS) & !value;
                log::trace!("INT_STATUS acknowledged {value:#04x}, pending {pending:#04x}");
                self.poke(address, pending);
            }
            _ => self.poke(address, value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::map::{PALETTE_RAM, SCANLINE_PALETTE};

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        // Initially all zeros
        assert_eq!(mem.read8(0x0000).unwrap(), 0x00);
        assert_eq!(mem.read8(0xFFFF).unwrap(), 0x00);

        mem.write8(0x1234, 0x42).unwrap();
        assert_eq!(mem.read8(0x1234).unwrap(), 0x42);
        assert_eq!(mem.read8(0x1233).unwrap(), 0x00);
    }

    #[test]
    fn test_out_of_range_is_fault() {
        let mut mem = Memory::new();
        assert_eq!(
            mem.read8(0x1_0000),
            Err(EngineFault::MemoryOutOfBounds { address: 0x1_0000 })
        );
        assert!(mem.write8(0x1_0000, 1).is_err());
        assert!(mem.read16(0xFFFF).is_err());
    }

    #[test]
    fn test_write16_validates_before_writing() {
        let mut mem = Memory::new();
        assert!(mem.write16(0xFFFF, 0xABCD).is_err());
        assert_eq!(mem.peek(0xFFFF), 0);
    }

    #[test]
    fn test_int_status_write_one_to_clear() {
        let mut mem = Memory::new();
        mem.raise_interrupt(0b0000_0101);
        mem.write8(INT_STATUS as u32, 0b0000_0001).unwrap();
        assert_eq!(mem.peek(INT_STATUS), 0b0000_0100);
    }

    #[test]
    fn test_video_mode_write_triggers_palette_init() {
        let mut mem = Memory::new();
        mem.poke(SCANLINE_PALETTE + 3, 7);
        mem.write8(VIDEO_MODE as u32, 1).unwrap();
        assert_eq!(mem.peek(PALETTE_RAM + 200), 200);
        assert_eq!(mem.peek(SCANLINE_PALETTE + 3), 0);
        assert_eq!(mem.video_mode(), Some(VideoMode::Mode1));
    }

    #[test]
    fn test_undefined_video_mode_is_stored_only() {
        let mut mem = Memory::new();
        mem.write8(VIDEO_MODE as u32, 9).unwrap();
        assert_eq!(mem.peek(VIDEO_MODE), 9);
        assert_eq!(mem.peek(PALETTE_RAM), 0);
        assert_eq!(mem.video_mode(), None);
    }

    #[test]
    fn test_set_controller() {
        let mut mem = Memory::new();
        assert!(mem.set_controller(2, 0x81));
        assert_eq!(mem.peek(CONTROLLER_2), 0x81);
        assert!(!mem.set_controller(3, 0xFF));
    }

    #[test]
    fn test_load_rejects_overflow() {
        let mut mem = Memory::new();
        assert!(mem.load(0xFFFE, &[1, 2, 3]).is_err());
        assert_eq!(mem.peek(0xFFFE), 0);
        mem.load(0xFFFE, &[1, 2]).unwrap();
        assert_eq!(mem.peek(0xFFFF), 2);
    }
}
