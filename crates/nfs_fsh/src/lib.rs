//! This library handles reading **FSH** texture packs and **QFS** (RefPack) compressed data used by
//! *Need for Speed* titles.
//!
//! # FSH Texture Pack Format Documentation
//!
//! A FSH pack is a directory of images. Packs embedded in car archives are usually wrapped in QFS
//! compression; [`FshArchive::parse`] detects this from the first bytes and decompresses before
//! reading the directory.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "SHPI"                                            |
//! | 0x0004         | Length                 | 4 bytes: Total size of the pack                            |
//! | 0x0008         | Entry Count            | 4 bytes: Number of directory entries                       |
//! | 0x000C         | Directory ID           | 4 bytes: Usually "GIMX"                                    |
//! | 0x0010         | Directory              | Entry Count × 8 bytes                                      |
//!
//! ### Directory
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Name                   | 4 bytes: Entry name, NUL padded                         |
//! | 0x0004         | Offset                 | 4 bytes: Offset of the first block from the pack start  |
//!
//! ### Blocks
//!
//! Every entry is a chain of blocks. The first block holds the bitmap, later blocks hold
//! attachments such as a local palette.
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Code                   | 1 byte: Record code                                     |
//! | 0x0001         | Next                   | 3 bytes: Offset to the next block, 0 for the last       |
//! | 0x0004         | Width                  | 2 bytes: Width, or colour count for palettes            |
//! | 0x0006         | Height                 | 2 bytes                                                 |
//! | 0x0008         | Misc                   | 8 bytes: Centre and position hints                      |
//! | 0x0010         | Data                   | Pixel or palette data                                   |
//!
//! - **Bitmap codes**: `0x7B` 8-bit indexed, `0x78` 5:6:5, `0x7E` 1:5:5:5, `0x6D` 4:4:4:4,
//!   `0x7F` 24-bit, `0x7D` 32-bit, `0x60` DXT1, `0x61` DXT3
//! - **Palette codes**: `0x22` 24-bit DOS, `0x24` 24-bit, `0x29` 5:6:5, `0x2A` 32-bit, `0x2D` 1:5:5:5
//! - An entry named `!pal` is a palette shared by every indexed image without its own.
//!
//! # QFS / RefPack
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Flags                  | 1 byte: `0x10`, `0x01` = compressed size present, `0x80` = 4 byte sizes |
//! | 0x0001         | Magic                  | 1 byte: `0xFB`                                          |
//! | 0x0002         | Sizes                  | 3 or 4 bytes each, big endian                           |
//!
//! The body is a sequence of commands, each emitting some literal bytes followed by a copy from
//! earlier output. See [`refpack`] for the command table.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.fsh`, `.qfs`
//! - **Endianness**: Little-endian, except the RefPack size fields
//!

pub mod error;
pub mod read;
pub mod refpack;
pub mod types;

pub use read::{DecodedImage, FshArchive, Palette, Pixels};
pub use types::ImageFormat;
