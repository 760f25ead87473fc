//! Misc table classification and texture pack location
//!

use std::io::{Read, Seek, SeekFrom};

use binrw::{BinRead, VecArgs};
use glam::{Vec3, Vec4};
use tracing::{debug, instrument, trace};

use crate::{
    error::{Error, Result},
    tree::{ensure_within, stream_len},
    types::{CrpHeader, MiscRecordRaw, RECORD_SIZE},
};

/// Tag of a generic payload record
pub const TAG_GENERIC: u8 = 1;
/// Tag of a material record
pub const TAG_MATERIAL: u8 = 2;
/// Tag of a texture pack record
pub const TAG_TEXTURE_PACK: u8 = 3;

/// Identifier of the bound plane record
pub const BOUND_PLANE_ID: [u8; 4] = *b"BPln";
/// Identifier of the window record
pub const WINDOW_ID: [u8; 4] = *b"Wndo";

/// Where a texture pack lives in the archive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TexturePackLocation {
    /// Absolute offset of the pack
    pub offset: u64,
    /// Length of the pack in bytes
    pub length: u32,
    /// Pack number used for naming
    pub index: u32,
    /// Position of the record in the misc table
    pub record: usize,
}

impl TexturePackLocation {
    /// Name of the pack for an archive with the given file stem
    ///
    /// ```
    /// # use nfs_crp::misc::TexturePackLocation;
    /// let pack = TexturePackLocation { offset: 0, length: 0, index: 2, record: 0 };
    /// assert_eq!(pack.file_name("car"), "car2");
    /// ```
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}{}", self.index)
    }
}

/// Material record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MaterialRecord {
    /// Four character identifier
    pub id: [u8; 4],
    /// Material id referenced by parts
    pub material: u32,
    /// Texture page the material samples
    pub texture_page: u32,
    /// Render flags
    pub flags: u32,
}

/// Generic payload record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GenericRecord {
    /// Four character identifier
    pub id: [u8; 4],
    /// Ordinal stored with the record
    pub index: u32,
    /// Number of items in the payload
    pub count: u32,
    /// Absolute offset of the payload
    pub offset: u64,
}

/// A classified misc record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MiscRecord {
    /// Payload such as bound planes or windows
    Generic(GenericRecord),
    /// Binding from a material id to a texture page
    Material(MaterialRecord),
    /// Embedded texture pack
    TexturePack(TexturePackLocation),
}

impl MiscRecord {
    /// Classify a raw record at position `index` of a table starting at `table_start`
    pub fn classify(raw: &MiscRecordRaw, index: usize, table_start: u64) -> Result<Self> {
        let position = table_start + RECORD_SIZE * index as u64;
        match raw.tag() {
            TAG_GENERIC => Ok(MiscRecord::Generic(GenericRecord {
                id: raw.id,
                index: raw.index(),
                count: raw.a,
                offset: position + raw.b as u64,
            })),
            TAG_MATERIAL => Ok(MiscRecord::Material(MaterialRecord {
                id: raw.id,
                material: raw.index(),
                texture_page: raw.a,
                flags: raw.b,
            })),
            TAG_TEXTURE_PACK => Ok(MiscRecord::TexturePack(TexturePackLocation {
                offset: position + raw.b as u64,
                length: raw.a,
                index: raw.index(),
                record: index,
            })),
            tag => Err(Error::UnknownRecordType { index, tag }),
        }
    }
}

/// Every record of the misc table, in table order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiscTable {
    records: Vec<MiscRecord>,
}

impl MiscTable {
    /// Build a table from already classified records
    pub fn from_records(records: Vec<MiscRecord>) -> Self {
        MiscTable { records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records
    pub fn records(&self) -> &[MiscRecord] {
        &self.records
    }

    /// Texture pack records in table order
    pub fn texture_packs(&self) -> impl Iterator<Item = &TexturePackLocation> {
        self.records.iter().filter_map(|r| match r {
            MiscRecord::TexturePack(pack) => Some(pack),
            _ => None,
        })
    }

    /// Material records in table order
    pub fn materials(&self) -> impl Iterator<Item = &MaterialRecord> {
        self.records.iter().filter_map(|r| match r {
            MiscRecord::Material(material) => Some(material),
            _ => None,
        })
    }

    /// Generic records in table order
    pub fn generics(&self) -> impl Iterator<Item = &GenericRecord> {
        self.records.iter().filter_map(|r| match r {
            MiscRecord::Generic(generic) => Some(generic),
            _ => None,
        })
    }
}

/// Read and classify the misc table
///
/// Any record with an unknown tag fails the whole table.
#[instrument(skip(reader), err)]
pub fn read_misc_table<R: Read + Seek>(reader: &mut R, header: &CrpHeader) -> Result<MiscTable> {
    let stream_len = stream_len(reader)?;
    ensure_within(0, header.misc_table_end(), stream_len, "article and misc tables")?;

    let table_start = header.article_table_end();
    reader.seek(SeekFrom::Start(table_start))?;

    let raw = Vec::<MiscRecordRaw>::read_le_args(
        reader,
        VecArgs {
            count: header.misc_count as usize,
            inner: (),
        },
    )?;

    let records = raw
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let record = MiscRecord::classify(raw, index, table_start)?;
            trace!(index, ?record, "misc record");
            if let MiscRecord::TexturePack(pack) = &record {
                ensure_within(pack.offset, pack.length as u64, stream_len, "texture pack")?;
            }
            Ok(record)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(records = records.len(), "read misc table");
    Ok(MiscTable { records })
}

/// Locate every texture pack in an archive
///
/// Reads the header from the start of the stream. Calling this repeatedly on the same stream
/// yields the same locations in the same order.
pub fn locate_texture_packs<R: Read + Seek>(reader: &mut R) -> Result<Vec<TexturePackLocation>> {
    reader.seek(SeekFrom::Start(0))?;
    let header = CrpHeader::read(reader)?;
    let table = read_misc_table(reader, &header)?;
    Ok(table.texture_packs().copied().collect())
}

/// Which flat quad geometry a record describes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuadKind {
    /// Collision bounds, hidden
    BoundPlane,
    /// Window glass, visible
    Window,
}

impl QuadKind {
    /// Kind of a generic record, if it holds quads
    pub fn from_id(id: &[u8; 4]) -> Option<Self> {
        match *id {
            BOUND_PLANE_ID => Some(QuadKind::BoundPlane),
            WINDOW_ID => Some(QuadKind::Window),
            _ => None,
        }
    }
}

/// Quads read from one bound plane or window record
#[derive(Debug, Clone, PartialEq)]
pub struct QuadSet {
    /// What the quads describe
    pub kind: QuadKind,
    /// Corners of each quad in winding order
    pub quads: Vec<[Vec3; 4]>,
}

/// Read the quads of every bound plane and window record
#[instrument(skip(reader, table), err)]
pub fn read_quad_sets<R: Read + Seek>(reader: &mut R, table: &MiscTable) -> Result<Vec<QuadSet>> {
    let stream_len = stream_len(reader)?;

    table
        .generics()
        .filter_map(|record| QuadKind::from_id(&record.id).map(|kind| (kind, record)))
        .map(|(kind, record)| {
            ensure_within(record.offset, 64 * record.count as u64, stream_len, "quads")?;
            reader.seek(SeekFrom::Start(record.offset))?;

            let raw = Vec::<[[f32; 4]; 4]>::read_le_args(
                reader,
                VecArgs {
                    count: record.count as usize,
                    inner: (),
                },
            )?;
            let quads = raw
                .into_iter()
                .map(|quad| quad.map(|v| Vec4::from_array(v).truncate()))
                .collect();

            Ok(QuadSet { kind, quads })
        })
        .collect()
}
