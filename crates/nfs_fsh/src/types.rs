//! Base types for structure of FSH texture packs.

use binrw::{BinRead, BinWrite};

/// FSH file header
///
/// Always starts with "SHPI". All data is stored in little endian format.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"SHPI", little)]
pub struct FshHeader {
    /// Total size of the pack in bytes
    pub length: u32,

    /// The number of directory entries following the header
    pub entries: u32,

    /// Directory identifier, usually `GIMX`
    pub directory_id: [u8; 4],
}

impl FshHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 16;
}

/// FSH directory entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DirectoryEntry {
    /// Four character entry name
    pub name: [u8; 4],

    /// Offset of the entry's first block from the start of the pack
    pub offset: u32,
}

impl DirectoryEntry {
    /// Size of an entry in bytes
    pub const SIZE: usize = 8;

    /// The entry name with trailing padding removed
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name)
            .trim_end_matches(['\0', ' '])
            .to_string()
    }
}

/// Header shared by every block of an entry
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct BlockHeader {
    /// Record code in the low byte, offset to the next block in the upper 24 bits
    pub code_and_next: u32,

    /// Width in pixels, or colour count for palettes
    pub width: u16,

    /// Height in pixels
    pub height: u16,

    /// Centre and position hints, unused by the decoder
    pub misc: [u16; 4],
}

impl BlockHeader {
    /// Size of a block header in bytes
    pub const SIZE: usize = 16;

    /// Record code identifying the block contents
    pub fn code(&self) -> u8 {
        (self.code_and_next & 0xFF) as u8
    }

    /// Offset of the next block relative to this one, if any
    pub fn next_block(&self) -> Option<usize> {
        match self.code_and_next >> 8 {
            0 => None,
            next => Some(next as usize),
        }
    }
}

/// Pixel layout of a bitmap block
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    /// 8-bit palette indices
    Indexed8,
    /// 16-bit 5:6:5
    Rgb565,
    /// 16-bit 1:5:5:5
    Argb1555,
    /// 16-bit 4:4:4:4
    Argb4444,
    /// 24-bit stored as B, G, R
    Rgb888,
    /// 32-bit stored as B, G, R, A
    Argb8888,
    /// DXT1 / BC1 blocks
    Dxt1,
    /// DXT3 / BC2 blocks
    Dxt3,
}

impl ImageFormat {
    /// Map a record code to a bitmap format
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x7B => ImageFormat::Indexed8,
            0x78 => ImageFormat::Rgb565,
            0x7E => ImageFormat::Argb1555,
            0x6D => ImageFormat::Argb4444,
            0x7F => ImageFormat::Rgb888,
            0x7D => ImageFormat::Argb8888,
            0x60 => ImageFormat::Dxt1,
            0x61 => ImageFormat::Dxt3,
            _ => return None,
        })
    }

    /// Bytes of pixel data needed for an image of the given size
    pub fn data_len(&self, width: usize, height: usize) -> usize {
        let blocks = width.div_ceil(4) * height.div_ceil(4);
        match self {
            ImageFormat::Indexed8 => width * height,
            ImageFormat::Rgb565 | ImageFormat::Argb1555 | ImageFormat::Argb4444 => {
                width * height * 2
            }
            ImageFormat::Rgb888 => width * height * 3,
            ImageFormat::Argb8888 => width * height * 4,
            ImageFormat::Dxt1 => blocks * 8,
            ImageFormat::Dxt3 => blocks * 16,
        }
    }
}

/// Colour layout of a palette block
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaletteFormat {
    /// 24-bit with 6-bit components
    Dos24,
    /// 24-bit stored as B, G, R
    Rgb24,
    /// 16-bit 5:6:5
    Rgb565,
    /// 32-bit stored as B, G, R, A
    Argb32,
    /// 16-bit 1:5:5:5
    Argb1555,
}

impl PaletteFormat {
    /// Map a record code to a palette format
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x22 => PaletteFormat::Dos24,
            0x24 => PaletteFormat::Rgb24,
            0x29 => PaletteFormat::Rgb565,
            0x2A => PaletteFormat::Argb32,
            0x2D => PaletteFormat::Argb1555,
            _ => return None,
        })
    }

    /// Bytes used by one colour
    pub fn stride(&self) -> usize {
        match self {
            PaletteFormat::Dos24 | PaletteFormat::Rgb24 => 3,
            PaletteFormat::Rgb565 | PaletteFormat::Argb1555 => 2,
            PaletteFormat::Argb32 => 4,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::types::{BlockHeader, DirectoryEntry, FshHeader, ImageFormat};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            b'S', b'H', b'P', b'I',
            0x40, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            b'G', b'I', b'M', b'X',
        ]);

        let expected = FshHeader {
            length: 64,
            entries: 2,
            directory_id: *b"GIMX",
        };

        assert_eq!(FshHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn read_invalid_header() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            b'S', b'H', b'P', b'X',
            0x40, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            b'G', b'I', b'M', b'X',
        ]);

        assert!(FshHeader::read(&mut input).is_err());
    }

    #[test]
    fn read_directory_entry() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            b'c', b'a', b'r', 0x00,
            0x20, 0x00, 0x00, 0x00,
        ]);

        let entry = DirectoryEntry::read(&mut input)?;
        assert_eq!(entry.name(), "car");
        assert_eq!(entry.offset, 32);

        Ok(())
    }

    #[test]
    fn read_block_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x7D, 0x50, 0x00, 0x00,
            0x08, 0x00,
            0x04, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);

        let block = BlockHeader::read(&mut input)?;
        assert_eq!(block.code(), 0x7D);
        assert_eq!(block.next_block(), Some(0x50));
        assert_eq!((block.width, block.height), (8, 4));
        assert_eq!(ImageFormat::from_code(block.code()), Some(ImageFormat::Argb8888));

        Ok(())
    }

    #[test]
    fn image_data_len() {
        assert_eq!(ImageFormat::Indexed8.data_len(8, 4), 32);
        assert_eq!(ImageFormat::Rgb565.data_len(8, 4), 64);
        assert_eq!(ImageFormat::Dxt1.data_len(6, 6), 32);
        assert_eq!(ImageFormat::Dxt3.data_len(4, 4), 16);
    }
}
