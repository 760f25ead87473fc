//! Types for reading FSH texture packs
//!

use std::borrow::Cow;
use std::io::Cursor;

use binrw::BinRead;
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::{Error, Result},
    refpack,
    types::{BlockHeader, DirectoryEntry, FshHeader, ImageFormat, PaletteFormat},
};

/// Directory name of a pack-wide palette
pub const GLOBAL_PALETTE: &str = "!pal";

const MAX_BLOCKS: usize = 64;

/// Colours of a palette, expanded to RGBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    /// Source layout of the palette block
    pub format: PaletteFormat,
    /// One RGBA quadruple per colour
    pub colours: Vec<[u8; 4]>,
}

impl Palette {
    /// Number of colours in the palette
    pub fn len(&self) -> usize {
        self.colours.len()
    }

    /// Whether the palette holds no colours
    pub fn is_empty(&self) -> bool {
        self.colours.is_empty()
    }
}

/// Pixel storage of a decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pixels {
    /// Row-major RGBA8, `width * height * 4` bytes
    Rgba(Vec<u8>),
    /// Bytes exactly as stored in the pack, for formats that are not expanded
    Native(Vec<u8>),
}

/// A single image from a texture pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Directory name of the entry
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Format the image was stored in
    pub format: ImageFormat,
    /// Pixel data
    pub pixels: Pixels,
    /// Palette attached to the entry, if any
    pub palette: Option<Palette>,
}

impl DecodedImage {
    /// RGBA pixels, if the image was expanded
    pub fn rgba(&self) -> Option<&[u8]> {
        match &self.pixels {
            Pixels::Rgba(data) => Some(data),
            Pixels::Native(_) => None,
        }
    }
}

/// A parsed FSH texture pack
///
/// ```no_run
/// fn list_images(data: &[u8]) -> nfs_fsh::error::Result<()> {
///     let fsh = nfs_fsh::FshArchive::parse(data)?;
///
///     for image in fsh.images() {
///         println!("{}: {}x{}", image.name, image.width, image.height);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FshArchive {
    header: FshHeader,
    compressed: bool,
    images: Vec<DecodedImage>,
    palette: Option<Palette>,
}

impl FshArchive {
    /// Identify the pack's compression scheme and decode every image in it
    pub fn parse(data: &[u8]) -> Result<FshArchive> {
        Self::parse_with_limit(data, refpack::DEFAULT_SIZE_LIMIT)
    }

    /// Like [`FshArchive::parse`], refusing compressed packs that expand past `limit` bytes
    #[instrument(skip(data), fields(len = data.len()), err)]
    pub fn parse_with_limit(data: &[u8], limit: usize) -> Result<FshArchive> {
        let (data, compressed) = if refpack::is_refpack(data) {
            (Cow::Owned(refpack::decompress_with_limit(data, limit)?), true)
        } else if data.starts_with(b"SHPI") {
            (Cow::Borrowed(data), false)
        } else {
            let mut magic = [0u8; 4];
            let n = data.len().min(4);
            magic[..n].copy_from_slice(&data[..n]);
            return Err(Error::UnknownFormat(magic));
        };

        let mut reader = Cursor::new(&data[..]);
        let header = FshHeader::read(&mut reader)?;
        debug!(entries = header.entries, compressed, "reading fsh directory");

        let directory_end = (header.entries as usize)
            .checked_mul(DirectoryEntry::SIZE)
            .and_then(|len| len.checked_add(FshHeader::SIZE))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| Error::ImageOutOfBounds("directory".into()))?;

        let directory = (0..header.entries)
            .map(|_| DirectoryEntry::read(&mut reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        trace!(directory_end, "directory read");

        let palette = directory
            .iter()
            .find(|entry| entry.name() == GLOBAL_PALETTE)
            .map(|entry| read_palette_entry(&data, entry))
            .transpose()?;

        let images = directory
            .iter()
            .filter(|entry| entry.name() != GLOBAL_PALETTE)
            .map(|entry| read_image(&data, entry, palette.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(FshArchive {
            header,
            compressed,
            images,
            palette,
        })
    }

    /// Number of images in the pack
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the pack contains no images
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Whether the pack was RefPack compressed
    pub fn was_compressed(&self) -> bool {
        self.compressed
    }

    /// Directory identifier from the header
    pub fn directory_id(&self) -> &[u8; 4] {
        &self.header.directory_id
    }

    /// Images in directory order
    pub fn images(&self) -> &[DecodedImage] {
        &self.images
    }

    /// The pack-wide palette, if present
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Look up an image by its directory name
    pub fn by_name(&self, name: &str) -> Option<&DecodedImage> {
        self.images.iter().find(|image| image.name == name)
    }

    /// Take ownership of the decoded images
    pub fn into_images(self) -> Vec<DecodedImage> {
        self.images
    }
}

fn block_at(data: &[u8], offset: usize, name: &str) -> Result<BlockHeader> {
    if offset.checked_add(BlockHeader::SIZE).map_or(true, |end| end > data.len()) {
        return Err(Error::ImageOutOfBounds(name.to_string()));
    }
    Ok(BlockHeader::read(&mut Cursor::new(&data[offset..]))?)
}

fn block_data<'a>(data: &'a [u8], offset: usize, len: usize, name: &str) -> Result<&'a [u8]> {
    let start = offset + BlockHeader::SIZE;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| Error::ImageOutOfBounds(name.to_string()))
}

fn read_palette_entry(data: &[u8], entry: &DirectoryEntry) -> Result<Palette> {
    let name = entry.name();
    let offset = entry.offset as usize;
    let block = block_at(data, offset, &name)?;
    let format = PaletteFormat::from_code(block.code()).ok_or(Error::UnknownImageFormat {
        name: name.clone(),
        code: block.code(),
    })?;
    read_palette(data, offset, &block, format, &name)
}

fn read_palette(
    data: &[u8],
    offset: usize,
    block: &BlockHeader,
    format: PaletteFormat,
    name: &str,
) -> Result<Palette> {
    let count = block.width as usize;
    let raw = block_data(data, offset, count * format.stride(), name)?;

    let colours = raw
        .chunks_exact(format.stride())
        .map(|c| match format {
            PaletteFormat::Dos24 => [c[0] << 2, c[1] << 2, c[2] << 2, 0xFF],
            PaletteFormat::Rgb24 => [c[2], c[1], c[0], 0xFF],
            PaletteFormat::Rgb565 => rgb565(u16::from_le_bytes([c[0], c[1]])),
            PaletteFormat::Argb32 => [c[2], c[1], c[0], c[3]],
            PaletteFormat::Argb1555 => argb1555(u16::from_le_bytes([c[0], c[1]])),
        })
        .collect();

    Ok(Palette { format, colours })
}

#[instrument(skip(data, global), fields(name = %entry.name()), err)]
fn read_image(
    data: &[u8],
    entry: &DirectoryEntry,
    global: Option<&Palette>,
) -> Result<DecodedImage> {
    let name = entry.name();
    let offset = entry.offset as usize;
    let block = block_at(data, offset, &name)?;
    let format = ImageFormat::from_code(block.code()).ok_or(Error::UnknownImageFormat {
        name: name.clone(),
        code: block.code(),
    })?;

    let (width, height) = (block.width as usize, block.height as usize);
    let raw = block_data(data, offset, format.data_len(width, height), &name)?;

    // attachments following the bitmap
    let mut palette = None;
    let mut next = block.next_block().map(|n| offset + n);
    for _ in 0..MAX_BLOCKS {
        let Some(at) = next else {
            break;
        };
        let attachment = block_at(data, at, &name)?;
        match PaletteFormat::from_code(attachment.code()) {
            Some(format) => {
                palette = Some(read_palette(data, at, &attachment, format, &name)?);
            }
            None => trace!(code = attachment.code(), "skipping attachment"),
        }
        next = attachment.next_block().map(|n| at + n);
    }
    if next.is_some() {
        warn!("attachment chain exceeds {MAX_BLOCKS} blocks, ignoring the rest");
    }

    let pixels = match format {
        ImageFormat::Indexed8 => {
            let colours = palette
                .as_ref()
                .or(global)
                .ok_or_else(|| Error::MissingPalette(name.clone()))?;
            Pixels::Rgba(expand_indexed(raw, colours, &name)?)
        }
        ImageFormat::Rgb565 => Pixels::Rgba(expand_16(raw, rgb565)),
        ImageFormat::Argb1555 => Pixels::Rgba(expand_16(raw, argb1555)),
        ImageFormat::Argb4444 => Pixels::Rgba(expand_16(raw, argb4444)),
        ImageFormat::Rgb888 => Pixels::Rgba(
            raw.chunks_exact(3)
                .flat_map(|c| [c[2], c[1], c[0], 0xFF])
                .collect(),
        ),
        ImageFormat::Argb8888 => Pixels::Rgba(
            raw.chunks_exact(4)
                .flat_map(|c| [c[2], c[1], c[0], c[3]])
                .collect(),
        ),
        ImageFormat::Dxt1 => Pixels::Rgba(decode_dxt1(raw, width, height)?),
        ImageFormat::Dxt3 => Pixels::Native(raw.to_vec()),
    };

    debug!(width, height, ?format, "decoded image");

    Ok(DecodedImage {
        name,
        width: width as u32,
        height: height as u32,
        format,
        pixels,
        palette,
    })
}

fn expand_indexed(raw: &[u8], palette: &Palette, name: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() * 4);
    for &index in raw {
        let colour = palette
            .colours
            .get(index as usize)
            .ok_or_else(|| Error::PaletteIndexOutOfRange {
                name: name.to_string(),
                index: index as usize,
                len: palette.len(),
            })?;
        out.extend_from_slice(colour);
    }
    Ok(out)
}

fn expand_16(raw: &[u8], convert: fn(u16) -> [u8; 4]) -> Vec<u8> {
    raw.chunks_exact(2)
        .flat_map(|c| convert(u16::from_le_bytes([c[0], c[1]])))
        .collect()
}

fn decode_dxt1(raw: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let mut image = vec![0u32; width * height];
    texture2ddecoder::decode_bc1(raw, width, height, &mut image)
        .map_err(|e| Error::ImageDecode(e.to_string()))?;

    // decoder output is packed as little endian B, G, R, A
    Ok(image
        .iter()
        .flat_map(|p| {
            let [b, g, r, a] = p.to_le_bytes();
            [r, g, b, a]
        })
        .collect())
}

fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

fn rgb565(v: u16) -> [u8; 4] {
    let g = ((v >> 5) & 0x3F) as u8;
    [expand5(v >> 11), (g << 2) | (g >> 4), expand5(v), 0xFF]
}

fn argb1555(v: u16) -> [u8; 4] {
    let a = if v & 0x8000 != 0 { 0xFF } else { 0x00 };
    [expand5(v >> 10), expand5(v >> 5), expand5(v), a]
}

fn argb4444(v: u16) -> [u8; 4] {
    let n = |shift: u16| ((v >> shift) & 0xF) as u8 * 17;
    [n(8), n(4), n(0), n(12)]
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{argb1555, argb4444, rgb565};

    #[test]
    fn convert_16_bit_colours() {
        assert_eq!(rgb565(0xF800), [0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(rgb565(0x07E0), [0x00, 0xFF, 0x00, 0xFF]);
        assert_eq!(rgb565(0x001F), [0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(argb1555(0x8000 | 0x7C00), [0xFF, 0x00, 0x00, 0xFF]);
        assert_eq!(argb1555(0x001F), [0x00, 0x00, 0xFF, 0x00]);
        assert_eq!(argb4444(0xF0F0), [0x00, 0xFF, 0x00, 0xFF]);
    }
}
