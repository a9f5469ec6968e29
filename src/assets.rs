//! # Binary Asset Formats
//!
//! Byte-exact formats shared with the devkit's editors:
//!
//! - **Palette file**: exactly 1024 raw bytes, the contents of palette RAM
//!   (system-palette indices).
//! - **Tile sheet**: a sequence of 16x16 cells at 4 bits per pixel, 128 bytes
//!   per cell. Rows are 8 bytes; within a byte the high nibble is the left
//!   pixel.
//! - **Cartridge**: an ordered list of 32KB banks. Bank 0 holds the metadata
//!   as JSON padded with zero bytes, bank 1 the code image for $0000-$7FFF,
//!   and any further banks are raw asset data.

use crate::assembler::Segment;
use crate::memory::map::{PALETTE_RAM, PALETTE_RAM_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of a palette file in bytes.
pub const PALETTE_FILE_SIZE: usize = PALETTE_RAM_SIZE;

/// Width and height of a tile in pixels.
pub const TILE_SIZE: usize = 16;

/// Bytes per 4bpp tile.
pub const TILE_BYTES: usize = TILE_SIZE * TILE_SIZE / 2;

/// Size of one cartridge bank.
pub const BANK_SIZE: usize = 32 * 1024;

/// Bank index of the metadata bank.
pub const METADATA_BANK: usize = 0;

/// Bank index of the code image.
pub const CODE_BANK: usize = 1;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{what} must be {expected} bytes, got {actual}")]
    WrongLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} is {size} bytes, which does not fit in a {max}-byte bank")]
    BankOverflow {
        what: &'static str,
        size: usize,
        max: usize,
    },

    #[error("cartridge is missing bank {0}")]
    MissingBank(usize),

    #[error("bad cartridge metadata: {0}")]
    BadMetadata(#[from] serde_json::Error),

    #[error("pixel ({x}, {y}) of tile {tile} is out of range")]
    PixelOutOfRange { tile: usize, x: usize, y: usize },
}

// ========== Palette ==========

/// A full palette RAM image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteFile {
    bytes: Vec<u8>,
}

impl PaletteFile {
    /// Parses a palette file. Anything other than exactly 1024 bytes is
    /// rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.len() != PALETTE_FILE_SIZE {
            return Err(AssetError::WrongLength {
                what: "palette file",
                expected: PALETTE_FILE_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// System-palette index stored at `offset`.
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    /// A segment that loads this palette into palette RAM.
    pub fn to_segment(&self) -> Segment {
        Segment {
            start_address: PALETTE_RAM,
            data: self.bytes.clone(),
        }
    }
}

// ========== Tiles ==========

/// A sheet of 16x16 4bpp tiles.
///
/// # Examples
///
/// ```
/// use vconsole::assets::TileSheet;
///
/// let mut sheet = TileSheet::new(2);
/// sheet.set_pixel(1, 0, 0, 0xA).unwrap();
/// sheet.set_pixel(1, 1, 0, 0x3).unwrap();
///
/// assert_eq!(sheet.as_bytes()[128], 0xA3);
/// assert_eq!(sheet.pixel(1, 1, 0), Some(0x3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSheet {
    data: Vec<u8>,
}

impl TileSheet {
    /// Creates a sheet of `tiles` blank tiles.
    pub fn new(tiles: usize) -> Self {
        Self {
            data: vec![0; tiles * TILE_BYTES],
        }
    }

    /// Parses a tile sheet. The length must be a whole number of tiles.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.len() % TILE_BYTES != 0 {
            return Err(AssetError::WrongLength {
                what: "tile sheet",
                expected: (bytes.len() / TILE_BYTES + 1) * TILE_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            data: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn tile_count(&self) -> usize {
        self.data.len() / TILE_BYTES
    }

    /// The 128 raw bytes of one tile.
    pub fn tile(&self, index: usize) -> Option<&[u8]> {
        self.data.get(index * TILE_BYTES..(index + 1) * TILE_BYTES)
    }

    /// Color index (0-15) of a pixel.
    pub fn pixel(&self, tile: usize, x: usize, y: usize) -> Option<u8> {
        let (offset, high) = self.locate(tile, x, y)?;
        let byte = self.data[offset];
        Some(if high { byte >> 4 } else { byte & 0x0F })
    }

    /// Sets a pixel's color index. Only the low 4 bits of `color` are used.
    pub fn set_pixel(&mut self, tile: usize, x: usize, y: usize, color: u8) -> Result<(), AssetError> {
        let (offset, high) = self
            .locate(tile, x, y)
            .ok_or(AssetError::PixelOutOfRange { tile, x, y })?;
        let byte = &mut self.data[offset];
        *byte = if high {
            (*byte & 0x0F) | (color << 4)
        } else {
            (*byte & 0xF0) | (color & 0x0F)
        };
        Ok(())
    }

    fn locate(&self, tile: usize, x: usize, y: usize) -> Option<(usize, bool)> {
        if tile >= self.tile_count() || x >= TILE_SIZE || y >= TILE_SIZE {
            return None;
        }
        Some((tile * TILE_BYTES + y * (TILE_SIZE / 2) + x / 2, x % 2 == 0))
    }
}

// ========== Cartridge ==========

/// Descriptive fields stored in bank 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartridgeMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
    /// Address execution starts at after loading
    pub entry_point: u16,
}

/// A packaged program: metadata, a code image and raw asset banks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cartridge {
    pub metadata: CartridgeMetadata,
    code: Vec<u8>,
    assets: Vec<Vec<u8>>,
}

impl Cartridge {
    /// Builds a cartridge from assembled segments.
    ///
    /// # Errors
    ///
    /// `BankOverflow` if any segment extends past $7FFF.
    pub fn new(metadata: CartridgeMetadata, segments: &[Segment]) -> Result<Self, AssetError> {
        let mut code = vec![0; BANK_SIZE];
        for segment in segments {
            let start = segment.start_address as usize;
            let end = start + segment.data.len();
            if end > BANK_SIZE {
                return Err(AssetError::BankOverflow {
                    what: "code",
                    size: end,
                    max: BANK_SIZE,
                });
            }
            code[start..end].copy_from_slice(&segment.data);
        }
        Ok(Self {
            metadata,
            code,
            assets: Vec::new(),
        })
    }

    /// Appends a raw asset bank, zero-padded to 32KB.
    pub fn add_asset_bank(&mut self, data: &[u8]) -> Result<usize, AssetError> {
        let bank = pad_bank("asset bank", data)?;
        self.assets.push(bank);
        Ok(CODE_BANK + self.assets.len())
    }

    /// The 32KB code image for $0000-$7FFF.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Raw asset banks (banks 2 and up).
    pub fn assets(&self) -> &[Vec<u8>] {
        &self.assets
    }

    pub fn bank_count(&self) -> usize {
        CODE_BANK + 1 + self.assets.len()
    }

    /// A segment loading the code image at $0000.
    pub fn code_segment(&self) -> Segment {
        Segment {
            start_address: 0,
            data: self.code.clone(),
        }
    }

    /// Serializes every bank, each exactly 32KB.
    pub fn to_banks(&self) -> Result<Vec<Vec<u8>>, AssetError> {
        let metadata = serde_json::to_vec(&self.metadata)?;
        let mut banks = Vec::with_capacity(self.bank_count());
        banks.push(pad_bank("metadata", &metadata)?);
        banks.push(self.code.clone());
        banks.extend(self.assets.iter().cloned());
        Ok(banks)
    }

    /// Parses a cartridge from its banks.
    ///
    /// # Errors
    ///
    /// - `MissingBank` if the metadata or code bank is absent
    /// - `WrongLength` if any bank is not exactly 32KB
    /// - `BadMetadata` if bank 0 is not valid JSON
    pub fn from_banks(banks: &[Vec<u8>]) -> Result<Self, AssetError> {
        for bank in banks {
            if bank.len() != BANK_SIZE {
                return Err(AssetError::WrongLength {
                    what: "cartridge bank",
                    expected: BANK_SIZE,
                    actual: bank.len(),
                });
            }
        }
        let metadata_bank = banks
            .get(METADATA_BANK)
            .ok_or(AssetError::MissingBank(METADATA_BANK))?;
        let code = banks
            .get(CODE_BANK)
            .ok_or(AssetError::MissingBank(CODE_BANK))?;

        let json_end = metadata_bank
            .iter()
            .rposition(|&byte| byte != 0)
            .map_or(0, |last| last + 1);
        let metadata = serde_json::from_slice(&metadata_bank[..json_end])?;

        Ok(Self {
            metadata,
            code: code.clone(),
            assets: banks[CODE_BANK + 1..].to_vec(),
        })
    }

    /// Concatenates all banks into one file image.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AssetError> {
        Ok(self.to_banks()?.concat())
    }

    /// Splits a file image into 32KB banks and parses it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.len() % BANK_SIZE != 0 {
            return Err(AssetError::WrongLength {
                what: "cartridge image",
                expected: (bytes.len() / BANK_SIZE + 1) * BANK_SIZE,
                actual: bytes.len(),
            });
        }
        let banks: Vec<Vec<u8>> = bytes.chunks(BANK_SIZE).map(<[u8]>::to_vec).collect();
        Self::from_banks(&banks)
    }
}

fn pad_bank(what: &'static str, data: &[u8]) -> Result<Vec<u8>, AssetError> {
    if data.len() > BANK_SIZE {
        return Err(AssetError::BankOverflow {
            what,
            size: data.len(),
            max: BANK_SIZE,
        });
    }
    let mut bank = data.to_vec();
    bank.resize(BANK_SIZE, 0);
    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start_address: u16, data: &[u8]) -> Segment {
        Segment {
            start_address,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_palette_length() {
        assert!(PaletteFile::from_bytes(&[0; 1024]).is_ok());
        assert!(matches!(
            PaletteFile::from_bytes(&[0; 1023]),
            Err(AssetError::WrongLength { actual: 1023, .. })
        ));
    }

    #[test]
    fn test_palette_segment_targets_palette_ram() {
        let mut bytes = vec![0; 1024];
        bytes[5] = 0x3F;
        let palette = PaletteFile::from_bytes(&bytes).unwrap();
        let segment = palette.to_segment();
        assert_eq!(segment.start_address, 0x0200);
        assert_eq!(segment.data[5], 0x3F);
    }

    #[test]
    fn test_tile_pixel_layout() {
        let mut sheet = TileSheet::new(1);
        sheet.set_pixel(0, 15, 15, 0x7).unwrap();
        assert_eq!(sheet.as_bytes()[127], 0x07);
        sheet.set_pixel(0, 14, 15, 0xF2).unwrap();
        assert_eq!(sheet.as_bytes()[127], 0x27);

        assert_eq!(sheet.pixel(0, 16, 0), None);
        assert!(sheet.set_pixel(1, 0, 0, 1).is_err());
    }

    #[test]
    fn test_tile_sheet_length() {
        assert_eq!(TileSheet::from_bytes(&[0; 256]).unwrap().tile_count(), 2);
        assert!(TileSheet::from_bytes(&[0; 100]).is_err());
    }

    #[test]
    fn test_cartridge_banks() {
        let metadata = CartridgeMetadata {
            title: "Demo".into(),
            entry_point: 0x0100,
            ..CartridgeMetadata::default()
        };
        let mut cart = Cartridge::new(metadata.clone(), &[segment(0x0100, &[1, 2, 3])])
            .unwrap();
        assert_eq!(cart.add_asset_bank(&[9; 10]).unwrap(), 2);

        let banks = cart.to_banks().unwrap();
        assert_eq!(banks.len(), 3);
        assert!(banks.iter().all(|bank| bank.len() == BANK_SIZE));
        assert_eq!(banks[0][0], b'{');
        assert_eq!(banks[1][0x0101], 2);

        let parsed = Cartridge::from_banks(&banks).unwrap();
        assert_eq!(parsed.metadata, metadata);
        assert_eq!(parsed, cart);
    }

    #[test]
    fn test_cartridge_rejects_high_code() {
        let result = Cartridge::new(
            CartridgeMetadata::default(),
            &[segment(0x7FFF, &[1, 2])],
        );
        assert!(matches!(result, Err(AssetError::BankOverflow { size: 0x8001, .. })));
    }

    #[test]
    fn test_cartridge_requires_code_bank() {
        let result = Cartridge::from_banks(&[vec![0; BANK_SIZE]]);
        assert!(matches!(result, Err(AssetError::MissingBank(1))));
    }
}
