//! Base types for structure of CRP file.

use std::fmt;

use binrw::{binrw, BinRead, BinWrite};

/// Size of every fixed record in the header, article, entry and misc tables
pub const RECORD_SIZE: u64 = 16;

/// CRP file header
///
/// Defines the header of the CRP file which always starts with "carc".
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(magic = b"carc", little)]
pub struct CrpHeader {
    /// The number of articles in the article table
    pub article_count: u32,

    /// The number of records in the misc table
    pub misc_count: u32,

    /// Unused
    pub reserved: u32,
}

impl CrpHeader {
    /// Offset of the first byte after the article table, which is where the misc table starts
    pub fn article_table_end(&self) -> u64 {
        RECORD_SIZE * (1 + self.article_count as u64)
    }

    /// Offset of the first byte after the misc table
    pub fn misc_table_end(&self) -> u64 {
        self.article_table_end() + RECORD_SIZE * self.misc_count as u64
    }
}

/// CRP article record
///
/// Points at the article's entry table
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(magic = b"Arti", little)]
pub struct ArticleRecord {
    /// The number of entries in this article's entry table
    pub entry_count: u32,

    /// The offset of the entry table from the start of this record
    pub entry_offset: u32,

    /// Unused
    pub reserved: u32,
}

/// CRP entry record
///
/// Describes one typed payload of an article
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct EntryRecord {
    /// Four character identifier of the payload type
    pub id: [u8; 4],

    /// Level of detail in the low byte, index above it
    pub info: u32,

    /// Number of items in the payload
    pub count: u32,

    /// The offset of the payload from the start of this record
    pub offset: u32,
}

impl EntryRecord {
    /// Level of detail this entry belongs to
    pub fn level(&self) -> u32 {
        self.info & 0xFF
    }

    /// Index of this entry among entries of the same kind and level
    pub fn index(&self) -> u32 {
        self.info >> 8
    }

    /// Pack a level and index into an info field
    pub fn pack_info(level: u32, index: u32) -> u32 {
        (level & 0xFF) | (index << 8)
    }

    /// Payload type, if the identifier is recognised
    pub fn kind(&self) -> Option<EntryKind> {
        EntryKind::from_fourcc(&self.id)
    }
}

/// CRP misc record in its undiscriminated form
///
/// The meaning of `a` and `b` depends on the tag, see [`crate::misc::MiscRecord`]
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct MiscRecordRaw {
    /// Four character identifier
    pub id: [u8; 4],

    /// Record tag in the low byte, index above it
    pub info: u32,

    /// First shape-dependent field
    pub a: u32,

    /// Second shape-dependent field
    pub b: u32,
}

impl MiscRecordRaw {
    /// Tag identifying which record shape this is
    pub fn tag(&self) -> u8 {
        (self.info & 0xFF) as u8
    }

    /// Material id, pack number or ordinal depending on the shape
    pub fn index(&self) -> u32 {
        self.info >> 8
    }

    /// Pack a tag and index into an info field
    pub fn pack_info(tag: u8, index: u32) -> u32 {
        tag as u32 | (index << 8)
    }
}

/// Kinds of article entry
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    /// Raw part name
    Name,
    /// Geometry descriptor listing the levels of detail
    Base,
    /// Marker/proxy description
    Effect,
    /// 4x4 transform
    Transform,
    /// Vertex positions
    Vertex,
    /// Vertex normals
    Normal,
    /// Texture coordinates
    Uv,
    /// Material-bound slice of a level's indices
    Part,
}

impl EntryKind {
    /// Every recognised entry kind
    pub const ALL: [EntryKind; 8] = [
        EntryKind::Name,
        EntryKind::Base,
        EntryKind::Effect,
        EntryKind::Transform,
        EntryKind::Vertex,
        EntryKind::Normal,
        EntryKind::Uv,
        EntryKind::Part,
    ];

    /// Identifier stored in the entry record
    pub fn fourcc(&self) -> [u8; 4] {
        *match self {
            EntryKind::Name => b"Name",
            EntryKind::Base => b"Base",
            EntryKind::Effect => b"Efct",
            EntryKind::Transform => b"Trfm",
            EntryKind::Vertex => b"Vert",
            EntryKind::Normal => b"Nrml",
            EntryKind::Uv => b"UV  ",
            EntryKind::Part => b"Part",
        }
    }

    /// Map an identifier back to its kind
    pub fn from_fourcc(id: &[u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| &kind.fourcc() == id)
    }
}

/// Per-vertex tables addressed by part indices
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Vertex positions
    Vertex,
    /// Vertex normals
    Normal,
    /// Texture coordinates
    Uv,
}

impl TableKind {
    /// Identifier used in part index tables and adjustments
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            TableKind::Vertex => EntryKind::Vertex.fourcc(),
            TableKind::Normal => EntryKind::Normal.fourcc(),
            TableKind::Uv => EntryKind::Uv.fourcc(),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableKind::Vertex => "vertex",
            TableKind::Normal => "normal",
            TableKind::Uv => "uv",
        })
    }
}

/// Base payload
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(little)]
#[br(import(level_count: u32))]
pub struct BaseRecord {
    /// Geometry index used in mesh names
    pub geom_index: u32,

    /// Type index used in mesh names and visibility
    pub type_index: u32,

    /// Packed level flags
    pub level_index: u32,

    /// Level numbers, in storage order
    #[br(count = level_count)]
    pub levels: Vec<u32>,
}

/// Effect payload
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct EffectRecord {
    /// Column-major placement matrix
    pub transform: [f32; 16],

    /// Bit 0 set when the effect is mirrored across the X axis
    pub flags: u32,
}

/// Offset or adjustment for one table kind inside a part
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct TableRef {
    /// Table identifier, see [`TableKind::fourcc`]
    pub kind: [u8; 4],

    /// Offset into the part's index bytes, or the base added to each index
    pub value: u32,
}

/// Part payload
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartRecord {
    /// Material id resolved through the misc table
    pub material: u32,

    #[br(temp)]
    #[bw(calc = index_tables.len() as u8)]
    index_table_count: u8,

    #[br(temp)]
    #[bw(calc = adjustments.len() as u8)]
    #[brw(pad_after = 2)]
    adjustment_count: u8,

    /// Start of each table's indices within `indices`
    #[br(count = index_table_count)]
    pub index_tables: Vec<TableRef>,

    /// Base added to each local index of a table
    #[br(count = adjustment_count)]
    pub adjustments: Vec<TableRef>,

    #[br(temp)]
    #[bw(calc = indices.len() as u32)]
    index_len: u32,

    /// Local indices of every table, back to back
    #[br(count = index_len)]
    pub indices: Vec<u8>,
}

impl PartRecord {
    /// Offset of a table's indices within [`PartRecord::indices`]
    pub fn index_table(&self, kind: TableKind) -> Option<u32> {
        let id = kind.fourcc();
        self.index_tables
            .iter()
            .find(|t| t.kind == id)
            .map(|t| t.value)
    }

    /// Base added to a table's local indices
    pub fn adjustment(&self, kind: TableKind) -> Option<u32> {
        let id = kind.fourcc();
        self.adjustments
            .iter()
            .find(|t| t.kind == id)
            .map(|t| t.value)
    }
}
