//! This library handles reading **CRP** car archives used by *Need for Speed: Porsche Unleashed*.
//!
//! # CRP Archive Format Documentation
//!
//! A CRP file holds everything needed to draw one car: a table of articles (one per car part),
//! a misc table of materials and other records, and the texture packs the materials refer to.
//! Archives on disk may be wrapped in QFS compression as a whole; [`CrpArchive::from_bytes`]
//! detects and removes it.
//!
//! ## File Structure
//!
//! | Offset (bytes)   | Field                  | Description                                              |
//! |------------------|------------------------|----------------------------------------------------------|
//! | 0x0000           | Magic number           | 4 bytes: "carc"                                          |
//! | 0x0004           | Article Count          | 4 bytes: Number of article records                       |
//! | 0x0008           | Misc Count             | 4 bytes: Number of misc records                          |
//! | 0x000C           | Reserved               | 4 bytes                                                  |
//! | 0x0010           | Article Table          | Article Count × 16 bytes                                 |
//! | 0x0010 + 16A     | Misc Table             | Misc Count × 16 bytes                                    |
//!
//! Everything after the two tables is addressed by offsets relative to the record that points
//! at it.
//!
//! ### Article Record
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "Arti"                                         |
//! | 0x0004         | Entry Count            | 4 bytes: Number of entries                              |
//! | 0x0008         | Entry Offset           | 4 bytes: Offset of the entry table from this record     |
//! | 0x000C         | Reserved               | 4 bytes                                                 |
//!
//! ### Entry Record
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Identifier             | 4 bytes: Payload type                                   |
//! | 0x0004         | Info                   | 4 bytes: Level in bits 0-7, index in bits 8-31          |
//! | 0x0008         | Count                  | 4 bytes: Number of items in the payload                 |
//! | 0x000C         | Offset                 | 4 bytes: Offset of the payload from this record         |
//!
//! - **`Name`**: raw part name
//! - **`Base`**: geometry index, type index, level flags and the list of level numbers
//! - **`Efct`**: placement of a proxy, which has no levels
//! - **`Trfm`**: 4×4 matrix of a level
//! - **`Vert`**, **`Nrml`**: 4 floats per vertex
//! - **`UV  `**: 2 floats per vertex
//! - **`Part`**: material id, index tables, index adjustments and `u8` local indices
//!
//! Parts of a level are numbered from 0 with no gaps; the first missing index ends the list.
//!
//! ### Misc Record
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Identifier             | 4 bytes                                                 |
//! | 0x0004         | Info                   | 4 bytes: Tag in bits 0-7, index in bits 8-31            |
//! | 0x0008         | A                      | 4 bytes: Count, texture page or pack length             |
//! | 0x000C         | B                      | 4 bytes: Offset from this record, or material flags     |
//!
//! - **Tag 1**: generic payload, `BPln` bound planes and `Wndo` windows hold A quads of 4 vertices
//! - **Tag 2**: material, the index is the material id parts refer to
//! - **Tag 3**: texture pack, an FSH pack of A bytes, see [`nfs_fsh`]
//!
//! ## Additional Information
//!
//! - **File Extension**: `.crp`
//! - **Endianness**: Little-endian
//!

pub mod assemble;
pub mod error;
pub mod material;
pub mod misc;
pub mod read;
pub mod tree;
pub mod types;

pub use assemble::{AssembledMesh, AssembledScene};
pub use material::MaterialRegistry;
pub use read::{CrpArchive, DecodeOptions, TexturePackFile};
pub use tree::{Article, Level, Part};
