//! Types for reading CRP archives
//!

use binrw::BinRead;
use bon::Builder;
use std::{
    fmt::{self, Debug},
    io::{self, Cursor, Read, Seek, SeekFrom},
    sync::Arc,
};
use tracing::{debug, instrument};

use nfs_fsh::{refpack, FshArchive};

use crate::{
    assemble::{assemble_archive, AssembledScene},
    error::{Error, Result},
    material::MaterialRegistry,
    misc::{read_misc_table, read_quad_sets, MiscTable, QuadSet, TexturePackLocation},
    tree::{read_articles, Article},
    types::CrpHeader,
};

/// Limits applied while decoding an archive
#[derive(Debug, Clone, Copy, Builder)]
pub struct DecodeOptions {
    /// Highest number of parts probed per level
    #[builder(default = 256)]
    pub max_part_probe: u32,

    /// Largest texture pack that will be extracted, in bytes
    #[builder(default = 64 * 1024 * 1024)]
    pub max_pack_size: u32,

    /// Largest size a compressed archive or texture pack may expand to, in bytes
    #[builder(default = refpack::DEFAULT_SIZE_LIMIT)]
    pub max_decompressed_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions::builder().build()
    }
}

/// A struct for reading a texture pack from a CRP file
pub struct TexturePackFile<'a, R: Read + Seek> {
    location: TexturePackLocation,
    reader: io::Take<&'a mut R>,
}

impl<R: Read + Seek> Debug for TexturePackFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TexturePackFile({:#?})", self.location)
    }
}

impl<R: Read + Seek> TexturePackFile<'_, R> {
    /// Pack number used for naming
    pub fn index(&self) -> u32 {
        self.location.index
    }

    /// Get the size of the pack, in bytes, in the archive
    pub fn size(&self) -> u64 {
        self.location.length as u64
    }

    /// Get the starting offset of the pack
    pub fn data_start(&self) -> u64 {
        self.location.offset
    }

    /// Name of the pack for an archive with the given file stem
    pub fn file_name(&self, stem: &str) -> String {
        self.location.file_name(stem)
    }
}

impl<R: Read + Seek> Read for TexturePackFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: CrpHeader,
    articles: Vec<Article>,
    misc: MiscTable,
    packs: Vec<TexturePackLocation>,
    quads: Vec<QuadSet>,
    registry: MaterialRegistry,
    options: DecodeOptions,
}

/// CRP archive reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_crp_contents(reader: impl Read + Seek) -> nfs_crp::error::Result<()> {
///     let mut crp = nfs_crp::CrpArchive::new(reader)?;
///
///     for article in crp.articles() {
///         println!("Article: {}", article.name());
///     }
///
///     for i in 0..crp.pack_count() {
///         let fsh = crp.decode_texture_pack(i)?;
///         println!("Pack {i}: {} images", fsh.len());
///     }
///
///     Ok(())
/// }
/// ```
pub struct CrpArchive<R> {
    reader: R,
    shared: Arc<Shared>,
}

impl CrpArchive<Cursor<Vec<u8>>> {
    /// Read an archive held in memory, decompressing it first if it is wrapped in RefPack
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_options(data, DecodeOptions::default())
    }

    /// Like [`CrpArchive::from_bytes`] with explicit limits
    #[instrument(skip(data), fields(len = data.len()), err)]
    pub fn from_bytes_with_options(data: Vec<u8>, options: DecodeOptions) -> Result<Self> {
        let data = if refpack::is_refpack(&data) {
            let data = refpack::decompress_with_limit(&data, options.max_decompressed_size)?;
            debug!(len = data.len(), "decompressed archive");
            data
        } else {
            data
        };
        Self::with_options(Cursor::new(data), options)
    }
}

impl<R: Read + Seek> CrpArchive<R> {
    /// Read a CRP archive, decoding its articles and misc table
    pub fn new(reader: R) -> Result<CrpArchive<R>> {
        Self::with_options(reader, DecodeOptions::default())
    }

    /// Read a CRP archive with explicit limits
    pub fn with_options(mut reader: R, options: DecodeOptions) -> Result<CrpArchive<R>> {
        let shared = Self::get_metadata(&mut reader, options)?;
        Ok(CrpArchive {
            reader,
            shared: shared.into(),
        })
    }

    /// Number of articles in this archive
    pub fn len(&self) -> usize {
        self.shared.articles.len()
    }

    /// Whether this archive contains no articles
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header as read from the archive
    pub fn header(&self) -> &CrpHeader {
        &self.shared.header
    }

    /// Decoded articles in table order
    pub fn articles(&self) -> &[Article] {
        &self.shared.articles
    }

    /// Classified misc table
    pub fn misc(&self) -> &MiscTable {
        &self.shared.misc
    }

    /// Texture pack locations in misc table order
    pub fn texture_packs(&self) -> &[TexturePackLocation] {
        &self.shared.packs
    }

    /// Number of texture packs
    pub fn pack_count(&self) -> usize {
        self.shared.packs.len()
    }

    /// Bound plane and window quads
    pub fn quad_sets(&self) -> &[QuadSet] {
        &self.shared.quads
    }

    /// Material lookup built from the misc table
    pub fn materials(&self) -> &MaterialRegistry {
        &self.shared.registry
    }

    /// Get a texture pack by its position in [`CrpArchive::texture_packs`]
    pub fn by_index(&mut self, pack_number: usize) -> Result<TexturePackFile<'_, R>> {
        let location = *self
            .shared
            .packs
            .get(pack_number)
            .ok_or(Error::TexturePackNotFound(pack_number))?;

        if location.length > self.shared.options.max_pack_size {
            return Err(Error::MalformedContainer(format!(
                "texture pack {pack_number} is {} bytes, limit is {}",
                location.length, self.shared.options.max_pack_size
            )));
        }

        self.reader.seek(SeekFrom::Start(location.offset))?;
        Ok(TexturePackFile {
            location,
            reader: self.reader.by_ref().take(location.length as u64),
        })
    }

    /// Read the raw bytes of a texture pack
    #[instrument(skip(self), err)]
    pub fn extract(&mut self, pack_number: usize) -> Result<Vec<u8>> {
        let mut file = self.by_index(pack_number)?;
        let mut buf = vec![0u8; file.size() as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Extract a texture pack and decode its images
    pub fn decode_texture_pack(&mut self, pack_number: usize) -> Result<FshArchive> {
        let data = self.extract(pack_number)?;
        Ok(FshArchive::parse_with_limit(
            &data,
            self.shared.options.max_decompressed_size,
        )?)
    }

    /// Rebuild every mesh of the archive
    pub fn assemble(&self) -> AssembledScene {
        assemble_archive(
            &self.shared.articles,
            &self.shared.quads,
            &self.shared.registry,
        )
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    #[instrument(skip(reader), err)]
    fn get_metadata(reader: &mut R, options: DecodeOptions) -> Result<Shared> {
        reader.seek(SeekFrom::Start(0))?;
        let header = CrpHeader::read(reader)?;
        debug!(
            articles = header.article_count,
            misc = header.misc_count,
            "read header"
        );

        let misc = read_misc_table(reader, &header)?;
        let articles = read_articles(reader, &header, &options)?;
        let packs = misc.texture_packs().copied().collect();
        let quads = read_quad_sets(reader, &misc)?;
        let registry = MaterialRegistry::new(&misc);

        Ok(Shared {
            header,
            articles,
            misc,
            packs,
            quads,
            registry,
            options,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use crate::error::Error;
    use crate::read::{CrpArchive, DecodeOptions};

    #[test]
    fn read_invalid_magic() {
        #[rustfmt::skip]
        let input = [
            b'c', b'a', b'r', b'x',
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let archive = CrpArchive::new(Cursor::new(input));
        assert!(matches!(archive, Err(Error::MalformedContainer(_))));
    }

    #[test]
    fn read_short_header() {
        let archive = CrpArchive::new(Cursor::new([b'c', b'a', b'r', b'c', 0x01]));
        assert!(matches!(archive, Err(Error::IOError(_))));
    }

    #[test]
    fn read_empty_crp() {
        #[rustfmt::skip]
        let input = [
            b'c', b'a', b'r', b'c',
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let archive = CrpArchive::new(Cursor::new(input));
        assert!(archive.is_ok());
        let archive = archive.unwrap();
        assert!(archive.is_empty());
        assert_eq!(archive.pack_count(), 0);
        assert!(archive.assemble().meshes.is_empty());
    }

    #[test]
    fn read_counts_overrun_stream() {
        #[rustfmt::skip]
        let input = [
            b'c', b'a', b'r', b'c',
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let archive = CrpArchive::new(Cursor::new(input));
        assert!(matches!(archive, Err(Error::MalformedContainer(_))));
    }

    #[test]
    fn default_options() {
        let options = DecodeOptions::default();
        assert_eq!(options.max_part_probe, 256);
        assert_eq!(options.max_pack_size, 64 * 1024 * 1024);
        assert_eq!(options.max_decompressed_size, 64 * 1024 * 1024);

        let options = DecodeOptions::builder().max_part_probe(4).build();
        assert_eq!(options.max_part_probe, 4);
    }
}
