//! Decoding of the article table and each article's entries
//!

use std::{
    borrow::Cow,
    io::{Read, Seek, SeekFrom},
};

use binrw::{BinRead, VecArgs};
use glam::{Mat4, Vec2, Vec3, Vec4};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::{Error, Result},
    read::DecodeOptions,
    types::{
        ArticleRecord, BaseRecord, CrpHeader, EffectRecord, EntryKind, EntryRecord, PartRecord,
        RECORD_SIZE,
    },
};

/// Lookup key of an entry within its article
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// Payload type
    pub kind: EntryKind,
    /// Level of detail the entry belongs to
    pub level: u32,
    /// Index among entries of the same kind and level
    pub index: u32,
}

impl EntryKey {
    /// Build a key
    pub fn new(kind: EntryKind, level: u32, index: u32) -> Self {
        EntryKey { kind, level, index }
    }
}

/// An entry record together with the absolute position of its payload
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EntryLocation {
    /// The record as stored
    pub record: EntryRecord,
    /// Absolute offset of the payload in the archive
    pub data_start: u64,
}

/// Placement of a non-mesh proxy article
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Effect {
    /// Placement matrix
    pub transform: Mat4,
    /// Whether the proxy is mirrored across the X axis
    pub mirrored: bool,
}

/// Material-bound slice of a level's indices
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Position of this part in the level's part list
    pub index: u32,
    /// Number of indices each index table holds, three per triangle
    pub count: u32,
    /// Decoded payload
    pub record: PartRecord,
}

impl Part {
    /// Number of triangles described by this part
    pub fn triangle_count(&self) -> u32 {
        self.count / 3
    }
}

/// One level of detail of an article
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    /// Level number as stored in the base entry
    pub number: u32,
    /// Position of this level in the base entry's level list
    pub position: usize,
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Vertex normals, one per vertex, when the level has a normal table
    pub normals: Option<Vec<Vec3>>,
    /// Texture coordinates, when the level has a uv table
    pub uvs: Option<Vec<Vec2>>,
    /// Level transform, when present
    pub transform: Option<Mat4>,
    /// Parts in ascending index order
    pub parts: Vec<Part>,
}

impl Level {
    /// Suffix used in mesh names for this level
    pub fn suffix(&self) -> &'static str {
        level_suffix(self.number)
    }
}

/// Name suffix of a level number
///
/// `0` is the undamaged model, `1` and `2` the fender bender states and `3` to `7` the
/// ignition states.
pub fn level_suffix(number: u32) -> &'static str {
    match number {
        0 => "def",
        1 => "fe1",
        2 => "fe2",
        3 => "ig1",
        4 => "ig2",
        5 => "ig3",
        6 => "ig4",
        7 => "ig5",
        _ => "unk",
    }
}

/// One decoded object record
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Position of this article in the article table
    pub index: usize,
    name_raw: Vec<u8>,
    base: Option<BaseRecord>,
    effect: Option<Effect>,
    transform: Option<Mat4>,
    levels: Vec<Level>,
    entries: IndexMap<EntryKey, EntryLocation>,
}

impl Article {
    /// Get the name of the article
    ///
    /// Invalid UTF-8 is replaced, use [`Article::name_raw`] for the stored bytes.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name_raw)
    }

    /// Get the name of the article as stored, without trailing NUL bytes
    pub fn name_raw(&self) -> &[u8] {
        &self.name_raw
    }

    /// Geometry descriptor of a mesh article
    pub fn base(&self) -> Option<&BaseRecord> {
        self.base.as_ref()
    }

    /// Placement of a proxy article
    pub fn effect(&self) -> Option<&Effect> {
        self.effect.as_ref()
    }

    /// Whether this article is a non-mesh proxy
    pub fn is_effect(&self) -> bool {
        self.effect.is_some()
    }

    /// Article transform, which is the transform stored for level 0
    pub fn transform(&self) -> Option<&Mat4> {
        self.transform.as_ref()
    }

    /// Levels of detail in base entry order
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Recognised entries of this article in table order
    pub fn entries(&self) -> &IndexMap<EntryKey, EntryLocation> {
        &self.entries
    }

    /// Kinds of entry present in this article
    pub fn entry_kinds(&self) -> impl Iterator<Item = EntryKind> + '_ {
        let mut seen = Vec::new();
        self.entries.keys().filter_map(move |key| {
            if seen.contains(&key.kind) {
                None
            } else {
                seen.push(key.kind);
                Some(key.kind)
            }
        })
    }
}

/// Lazily probes ascending part indices of one level
///
/// Stops at the first index with no entry, or after `limit` parts.
pub struct PartProbe<'a> {
    entries: &'a IndexMap<EntryKey, EntryLocation>,
    level: u32,
    next: u32,
    limit: u32,
}

impl<'a> PartProbe<'a> {
    /// Probe the parts of `level`, visiting at most `limit` of them
    pub fn new(entries: &'a IndexMap<EntryKey, EntryLocation>, level: u32, limit: u32) -> Self {
        PartProbe {
            entries,
            level,
            next: 0,
            limit,
        }
    }
}

impl<'a> Iterator for PartProbe<'a> {
    type Item = (u32, &'a EntryLocation);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.limit {
            return None;
        }
        let index = self.next;
        let location = self
            .entries
            .get(&EntryKey::new(EntryKind::Part, self.level, index))?;
        self.next += 1;
        Some((index, location))
    }
}

/// Fail unless `len` bytes starting at `start` lie inside the stream
pub(crate) fn ensure_within(start: u64, len: u64, stream_len: u64, what: &str) -> Result<()> {
    match start.checked_add(len) {
        Some(end) if end <= stream_len => Ok(()),
        _ => Err(Error::MalformedContainer(format!(
            "{what} at {start:#x} ({len} bytes) overruns archive of {stream_len} bytes"
        ))),
    }
}

/// Length of the stream, leaving the position unspecified
pub(crate) fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    Ok(reader.seek(SeekFrom::End(0))?)
}

/// Decode every article of the archive, in table order
///
/// The header must already have been read from `reader`.
#[instrument(skip(reader, options), err)]
pub fn read_articles<R: Read + Seek>(
    reader: &mut R,
    header: &CrpHeader,
    options: &DecodeOptions,
) -> Result<Vec<Article>> {
    let stream_len = stream_len(reader)?;
    ensure_within(0, header.misc_table_end(), stream_len, "article and misc tables")?;

    (0..header.article_count as usize)
        .map(|index| {
            let position = RECORD_SIZE * (1 + index as u64);
            reader.seek(SeekFrom::Start(position))?;
            let record = ArticleRecord::read(reader)?;
            read_article(reader, index, position, &record, stream_len, options)
        })
        .collect()
}

#[instrument(skip(reader, record, options), err)]
fn read_article<R: Read + Seek>(
    reader: &mut R,
    index: usize,
    position: u64,
    record: &ArticleRecord,
    stream_len: u64,
    options: &DecodeOptions,
) -> Result<Article> {
    let entries = read_entries(reader, position, record, stream_len)?;

    let name_raw = match entries.get(&EntryKey::new(EntryKind::Name, 0, 0)) {
        Some(location) => read_name(reader, location, stream_len)?,
        None => Vec::new(),
    };

    let base = match entries.get(&EntryKey::new(EntryKind::Base, 0, 0)) {
        Some(location) => Some(read_base(reader, location, stream_len)?),
        None => None,
    };

    let effect = match entries.get(&EntryKey::new(EntryKind::Effect, 0, 0)) {
        Some(location) => Some(read_effect(reader, location, stream_len)?),
        None => None,
    };

    let transform = read_transform(reader, &entries, 0, stream_len)?;

    let levels = match (&base, &effect) {
        (Some(_), Some(_)) => {
            return Err(Error::MalformedContainer(format!(
                "article {index} has both a base and an effect entry"
            )))
        }
        (None, None) => {
            return Err(Error::MalformedContainer(format!(
                "article {index} has neither a base nor an effect entry"
            )))
        }
        (None, Some(_)) => Vec::new(),
        (Some(base), None) => {
            let limit = record.entry_count.min(options.max_part_probe);
            base.levels
                .iter()
                .enumerate()
                .map(|(position, &number)| {
                    read_level(reader, &entries, position, number, limit, stream_len)
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    let article = Article {
        index,
        name_raw,
        base,
        effect,
        transform,
        levels,
        entries,
    };
    debug!(
        name = %article.name(),
        levels = article.levels.len(),
        effect = article.is_effect(),
        "read article"
    );
    Ok(article)
}

fn read_entries<R: Read + Seek>(
    reader: &mut R,
    position: u64,
    record: &ArticleRecord,
    stream_len: u64,
) -> Result<IndexMap<EntryKey, EntryLocation>> {
    let table_start = position + record.entry_offset as u64;
    ensure_within(
        table_start,
        RECORD_SIZE * record.entry_count as u64,
        stream_len,
        "entry table",
    )?;

    let mut entries = IndexMap::with_capacity(record.entry_count as usize);
    for i in 0..record.entry_count as u64 {
        let entry_position = table_start + RECORD_SIZE * i;
        reader.seek(SeekFrom::Start(entry_position))?;
        let entry = EntryRecord::read(reader)?;

        let Some(kind) = entry.kind() else {
            warn!(
                id = %String::from_utf8_lossy(&entry.id),
                position = entry_position,
                "ignoring unrecognised entry"
            );
            continue;
        };

        let key = EntryKey::new(kind, entry.level(), entry.index());
        let location = EntryLocation {
            record: entry,
            data_start: entry_position + entry.offset as u64,
        };
        trace!(?key, data_start = location.data_start, count = entry.count, "entry");

        if entries.contains_key(&key) {
            warn!(?key, "ignoring duplicate entry");
            continue;
        }
        entries.insert(key, location);
    }

    Ok(entries)
}

fn seek_payload<R: Read + Seek>(
    reader: &mut R,
    location: &EntryLocation,
    len: u64,
    stream_len: u64,
    what: &str,
) -> Result<()> {
    ensure_within(location.data_start, len, stream_len, what)?;
    reader.seek(SeekFrom::Start(location.data_start))?;
    Ok(())
}

fn read_name<R: Read + Seek>(
    reader: &mut R,
    location: &EntryLocation,
    stream_len: u64,
) -> Result<Vec<u8>> {
    let len = location.record.count as u64;
    seek_payload(reader, location, len, stream_len, "name")?;

    let mut name = vec![0u8; len as usize];
    reader.read_exact(&mut name)?;
    if let Some(end) = name.iter().position(|&c| c == b'\0') {
        name.truncate(end);
    }
    Ok(name)
}

fn read_base<R: Read + Seek>(
    reader: &mut R,
    location: &EntryLocation,
    stream_len: u64,
) -> Result<BaseRecord> {
    let count = location.record.count;
    seek_payload(reader, location, 12 + 4 * count as u64, stream_len, "base")?;
    Ok(BaseRecord::read_args(reader, (count,))?)
}

fn read_effect<R: Read + Seek>(
    reader: &mut R,
    location: &EntryLocation,
    stream_len: u64,
) -> Result<Effect> {
    seek_payload(reader, location, 68, stream_len, "effect")?;
    let record = EffectRecord::read(reader)?;
    Ok(Effect {
        transform: Mat4::from_cols_array(&record.transform),
        mirrored: record.flags & 1 != 0,
    })
}

fn read_transform<R: Read + Seek>(
    reader: &mut R,
    entries: &IndexMap<EntryKey, EntryLocation>,
    level: u32,
    stream_len: u64,
) -> Result<Option<Mat4>> {
    let Some(location) = entries.get(&EntryKey::new(EntryKind::Transform, level, 0)) else {
        return Ok(None);
    };
    seek_payload(reader, location, 64, stream_len, "transform")?;
    let cols = <[f32; 16]>::read_le(reader)?;
    Ok(Some(Mat4::from_cols_array(&cols)))
}

fn read_table<R: Read + Seek, T: for<'a> BinRead<Args<'a> = ()> + 'static>(
    reader: &mut R,
    location: &EntryLocation,
    item_size: u64,
    stream_len: u64,
    what: &str,
) -> Result<Vec<T>> {
    let count = location.record.count as usize;
    seek_payload(reader, location, item_size * count as u64, stream_len, what)?;
    Ok(Vec::<T>::read_le_args(reader, VecArgs { count, inner: () })?)
}

fn read_vec3_table<R: Read + Seek>(
    reader: &mut R,
    location: &EntryLocation,
    stream_len: u64,
    what: &str,
) -> Result<Vec<Vec3>> {
    let items: Vec<[f32; 4]> = read_table(reader, location, 16, stream_len, what)?;
    Ok(items
        .into_iter()
        .map(|v| Vec4::from_array(v).truncate())
        .collect())
}

fn read_level<R: Read + Seek>(
    reader: &mut R,
    entries: &IndexMap<EntryKey, EntryLocation>,
    position: usize,
    number: u32,
    part_limit: u32,
    stream_len: u64,
) -> Result<Level> {
    let Some(vertex) = entries.get(&EntryKey::new(EntryKind::Vertex, number, 0)) else {
        return Err(Error::MalformedContainer(format!(
            "level {number} has no vertex table"
        )));
    };
    let vertices = read_vec3_table(reader, vertex, stream_len, "vertex table")?;

    let normals = match entries.get(&EntryKey::new(EntryKind::Normal, number, 0)) {
        Some(location) => {
            let normals = read_vec3_table(reader, location, stream_len, "normal table")?;
            if normals.len() != vertices.len() {
                return Err(Error::MalformedContainer(format!(
                    "level {number} has {} normals for {} vertices",
                    normals.len(),
                    vertices.len()
                )));
            }
            Some(normals)
        }
        None => None,
    };

    let uvs = match entries.get(&EntryKey::new(EntryKind::Uv, number, 0)) {
        Some(location) => {
            let items: Vec<[f32; 2]> = read_table(reader, location, 8, stream_len, "uv table")?;
            Some(items.into_iter().map(Vec2::from_array).collect())
        }
        None => None,
    };

    let transform = read_transform(reader, entries, number, stream_len)?;

    let parts = PartProbe::new(entries, number, part_limit)
        .map(|(index, location)| {
            ensure_within(location.data_start, 12, stream_len, "part")?;
            reader.seek(SeekFrom::Start(location.data_start))?;
            Ok(Part {
                index,
                count: location.record.count,
                record: PartRecord::read(reader)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    trace!(
        number,
        vertices = vertices.len(),
        parts = parts.len(),
        "read level"
    );

    Ok(Level {
        number,
        position,
        vertices,
        normals,
        uvs,
        transform,
        parts,
    })
}
