//! QFS / RefPack block compression and decompression.
//!
//! | First byte  | Length | Literals                 | Copy length                   | Distance                                   |
//! |-------------|--------|--------------------------|-------------------------------|--------------------------------------------|
//! | `0x00-0x7F` | 2      | `b0 & 3`                 | `((b0 >> 2) & 7) + 3`         | `((b0 & 0x60) << 3) + b1 + 1`              |
//! | `0x80-0xBF` | 3      | `b1 >> 6`                | `(b0 & 0x3F) + 4`             | `((b1 & 0x3F) << 8) + b2 + 1`              |
//! | `0xC0-0xDF` | 4      | `b0 & 3`                 | `((b0 & 0x0C) << 6) + b3 + 5` | `((b0 & 0x10) << 12) + (b1 << 8) + b2 + 1` |
//! | `0xE0-0xFB` | 1      | `((b0 & 0x1F) << 2) + 4` | 0                             |                                            |
//! | `0xFC-0xFF` | 1      | `b0 & 3`, then stop      | 0                             |                                            |
//!
//! Copies run byte by byte, so a distance shorter than the length repeats a run.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// Largest distance a back-reference can encode
pub const MAX_DISTANCE: usize = 131_072;

/// Largest copy length a single command can encode
pub const MAX_COPY: usize = 1028;

/// Largest uncompressed size [`decompress`] accepts
pub const DEFAULT_SIZE_LIMIT: usize = 64 * 1024 * 1024;

const MAX_LITERAL_RUN: usize = 112;
const MAX_CANDIDATES: usize = 32;

/// Whether `data` starts with a RefPack header
pub fn is_refpack(data: &[u8]) -> bool {
    data.len() >= 2 && (data[0] & 0x3E) == 0x10 && data[1] == 0xFB
}

/// Uncompressed size declared by a RefPack header, along with the header length
pub fn declared_size(data: &[u8]) -> Result<(usize, usize)> {
    if !is_refpack(data) {
        let mut magic = [0u8; 4];
        let n = data.len().min(4);
        magic[..n].copy_from_slice(&data[..n]);
        return Err(Error::UnknownFormat(magic));
    }

    let width = if data[0] & 0x80 != 0 { 4 } else { 3 };
    let mut pos = 2;
    if data[0] & 0x01 != 0 {
        pos += width;
    }

    let field = data
        .get(pos..pos + width)
        .ok_or(Error::TruncatedStream { position: pos })?;
    let size = BigEndian::read_uint(field, width) as usize;

    Ok((size, pos + width))
}

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(Error::TruncatedStream { position: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(Error::TruncatedStream { position: self.data.len() })?;
        self.pos += len;
        Ok(slice)
    }
}

fn push_literals(
    out: &mut Vec<u8>,
    input: &mut Input<'_>,
    count: usize,
    limit: usize,
) -> Result<()> {
    if out.len() + count > limit {
        return Err(Error::LengthMismatch {
            expected: limit,
            actual: out.len() + count,
        });
    }
    out.extend_from_slice(input.take(count)?);
    Ok(())
}

fn copy_back(out: &mut Vec<u8>, distance: usize, length: usize, limit: usize) -> Result<()> {
    if distance > out.len() {
        return Err(Error::InvalidBackReference {
            distance,
            position: out.len(),
        });
    }
    if out.len() + length > limit {
        return Err(Error::LengthMismatch {
            expected: limit,
            actual: out.len() + length,
        });
    }

    let start = out.len() - distance;
    for i in 0..length {
        let b = out[start + i];
        out.push(b);
    }
    Ok(())
}

/// Decompress a complete RefPack stream of at most [`DEFAULT_SIZE_LIMIT`] bytes
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_limit(data, DEFAULT_SIZE_LIMIT)
}

/// Decompress a complete RefPack stream
///
/// A header declaring more than `limit` bytes is rejected with
/// [`Error::SizeLimitExceeded`] before anything is decoded. Decoding stops as
/// soon as the declared size has been produced or a stop command is reached.
/// Running out of input first is a [`Error::TruncatedStream`]; ending on any
/// other size is a [`Error::LengthMismatch`].
#[instrument(skip(data), fields(len = data.len()), err)]
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let (size, header) = declared_size(data)?;
    if size > limit {
        return Err(Error::SizeLimitExceeded {
            declared: size,
            limit,
        });
    }
    trace!(size, "decompressing refpack stream");

    let mut input = Input { data, pos: header };
    let mut out = Vec::with_capacity(size.min(data.len().saturating_mul(64)));

    while out.len() < size {
        let b0 = input.byte()?;
        match b0 {
            0x00..=0x7F => {
                let b1 = input.byte()? as usize;
                let literals = (b0 & 0x03) as usize;
                let length = ((b0 >> 2) & 0x07) as usize + 3;
                let distance = (((b0 & 0x60) as usize) << 3) + b1 + 1;
                push_literals(&mut out, &mut input, literals, size)?;
                copy_back(&mut out, distance, length, size)?;
            }
            0x80..=0xBF => {
                let b1 = input.byte()? as usize;
                let b2 = input.byte()? as usize;
                let literals = b1 >> 6;
                let length = (b0 & 0x3F) as usize + 4;
                let distance = ((b1 & 0x3F) << 8) + b2 + 1;
                push_literals(&mut out, &mut input, literals, size)?;
                copy_back(&mut out, distance, length, size)?;
            }
            0xC0..=0xDF => {
                let b1 = input.byte()? as usize;
                let b2 = input.byte()? as usize;
                let b3 = input.byte()? as usize;
                let literals = (b0 & 0x03) as usize;
                let length = (((b0 & 0x0C) as usize) << 6) + b3 + 5;
                let distance = (((b0 & 0x10) as usize) << 12) + (b1 << 8) + b2 + 1;
                push_literals(&mut out, &mut input, literals, size)?;
                copy_back(&mut out, distance, length, size)?;
            }
            0xE0..=0xFB => {
                let literals = (((b0 & 0x1F) as usize) << 2) + 4;
                push_literals(&mut out, &mut input, literals, size)?;
            }
            0xFC..=0xFF => {
                push_literals(&mut out, &mut input, (b0 & 0x03) as usize, size)?;
                break;
            }
        }
    }

    if out.len() != size {
        return Err(Error::LengthMismatch {
            expected: size,
            actual: out.len(),
        });
    }

    Ok(out)
}

fn emit_literal_runs(out: &mut Vec<u8>, data: &[u8], start: &mut usize, end: usize) {
    while end - *start >= 4 {
        let run = ((end - *start) & !3).min(MAX_LITERAL_RUN);
        out.push(0xE0 | ((run - 4) >> 2) as u8);
        out.extend_from_slice(&data[*start..*start + run]);
        *start += run;
    }
}

/// Pick the command form able to encode a match, shortening it if needed
fn encodable(distance: usize, length: usize) -> Option<usize> {
    let length = length.min(MAX_COPY);
    if length >= 3 && length <= 10 && distance <= 1024 {
        Some(length)
    } else if length >= 4 && length <= 67 && distance <= 16_384 {
        Some(length)
    } else if length >= 5 && distance <= MAX_DISTANCE {
        Some(length)
    } else {
        None
    }
}

fn emit_copy(out: &mut Vec<u8>, literals: &[u8], distance: usize, length: usize) {
    let lit = literals.len();
    let d = distance - 1;
    if length <= 10 && distance <= 1024 {
        out.push((((d >> 3) & 0x60) | ((length - 3) << 2) | lit) as u8);
        out.push((d & 0xFF) as u8);
    } else if length <= 67 && distance <= 16_384 {
        out.push(0x80 | (length - 4) as u8);
        out.push(((lit << 6) | (d >> 8)) as u8);
        out.push((d & 0xFF) as u8);
    } else {
        let l = length - 5;
        out.push((0xC0 | ((d >> 12) & 0x10) | ((l >> 8) << 2) | lit) as u8);
        out.push(((d >> 8) & 0xFF) as u8);
        out.push((d & 0xFF) as u8);
        out.push((l & 0xFF) as u8);
    }
    out.extend_from_slice(literals);
}

/// Compress `data` into a RefPack stream
///
/// A greedy encoder over a hash chain of three byte prefixes. The output uses
/// literal runs, short/medium/long back-references and a terminating stop
/// command, so it decodes with [`decompress`].
#[instrument(skip(data), fields(len = data.len()))]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    if data.len() > 0xFF_FFFF {
        out.extend_from_slice(&[0x90, 0xFB]);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    } else {
        out.extend_from_slice(&[0x10, 0xFB]);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    }

    let mut chains: HashMap<[u8; 3], Vec<usize>> = HashMap::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < data.len() {
        let mut best: Option<(usize, usize)> = None;

        if pos + 3 <= data.len() {
            let key = [data[pos], data[pos + 1], data[pos + 2]];
            if let Some(candidates) = chains.get(&key) {
                for &candidate in candidates.iter().rev().take(MAX_CANDIDATES) {
                    let distance = pos - candidate;
                    if distance > MAX_DISTANCE {
                        break;
                    }
                    let length = data[pos..]
                        .iter()
                        .zip(&data[candidate..])
                        .take(MAX_COPY)
                        .take_while(|(a, b)| a == b)
                        .count();
                    if let Some(length) = encodable(distance, length) {
                        if best.map_or(true, |(_, l)| length > l) {
                            best = Some((distance, length));
                        }
                    }
                }
            }
        }

        let step = match best {
            Some((distance, length)) => {
                emit_literal_runs(&mut out, data, &mut literal_start, pos);
                emit_copy(&mut out, &data[literal_start..pos], distance, length);
                literal_start = pos + length;
                length
            }
            None => 1,
        };

        for p in pos..(pos + step).min(data.len().saturating_sub(2)) {
            chains
                .entry([data[p], data[p + 1], data[p + 2]])
                .or_default()
                .push(p);
        }
        pos += step;
    }

    emit_literal_runs(&mut out, data, &mut literal_start, data.len());
    out.push(0xFC | (data.len() - literal_start) as u8);
    out.extend_from_slice(&data[literal_start..]);

    out
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::refpack::{
        compress, decompress, decompress_with_limit, declared_size, is_refpack, DEFAULT_SIZE_LIMIT,
    };

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB,
            0x00, 0x01, 0x02,
        ];

        assert!(is_refpack(&input));
        assert_eq!(declared_size(&input)?, (258, 5));

        Ok(())
    }

    #[test]
    fn read_header_with_compressed_size() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x11, 0xFB,
            0x00, 0x00, 0x09,
            0x00, 0x00, 0x20,
        ];

        assert_eq!(declared_size(&input)?, (32, 8));

        Ok(())
    }

    #[test]
    fn read_invalid_magic() {
        let input = [b'S', b'H', b'P', b'I'];

        assert!(!is_refpack(&input));
        assert!(matches!(
            declared_size(&input),
            Err(Error::UnknownFormat(m)) if &m == b"SHPI"
        ));
    }

    #[test]
    fn decompress_literals_only() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x06,
            0xE0, b'a', b'b', b'c', b'd',
            0xFE, b'e', b'f',
        ];

        assert_eq!(decompress(&input)?, b"abcdef");

        Ok(())
    }

    #[test]
    fn decompress_repeat_run() -> Result<()> {
        // one literal then a distance-1 copy of 9 bytes
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x0A,
            0x19, 0x00, b'z',
            0xFC,
        ];

        assert_eq!(decompress(&input)?, b"zzzzzzzzzz");

        Ok(())
    }

    #[test]
    fn decompress_medium_and_long_references() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x10,
            0xE0, b'w', b'x', b'y', b'z',
            // medium: copy 4 from distance 4
            0x80, 0x00, 0x03,
            // long: copy 8 from distance 8
            0xC0, 0x00, 0x07, 0x03,
        ];

        assert_eq!(decompress(&input)?, b"wxyzwxyzwxyzwxyz");

        Ok(())
    }

    #[test]
    fn decompress_rejects_size_over_limit() -> Result<()> {
        // declares 256 MiB, made of long copies that would expand 256 times
        #[rustfmt::skip]
        let mut input = vec![
            0x90, 0xFB, 0x10, 0x00, 0x00, 0x00,
            0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        for _ in 0..1024 {
            input.extend_from_slice(&[0xCC, 0x00, 0x00, 0xFF]);
        }

        assert!(matches!(
            decompress(&input),
            Err(Error::SizeLimitExceeded {
                declared: 0x1000_0000,
                limit: DEFAULT_SIZE_LIMIT,
            })
        ));

        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x06,
            0xE0, b'a', b'b', b'c', b'd',
            0xFE, b'e', b'f',
        ];
        assert!(matches!(
            decompress_with_limit(&input, 5),
            Err(Error::SizeLimitExceeded {
                declared: 6,
                limit: 5,
            })
        ));
        assert_eq!(decompress_with_limit(&input, 6)?, b"abcdef");

        Ok(())
    }

    #[test]
    fn decompress_truncated() {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x08,
            0xE0, b'a', b'b',
        ];

        assert!(matches!(
            decompress(&input),
            Err(Error::TruncatedStream { .. })
        ));
    }

    #[test]
    fn decompress_early_stop() {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x08,
            0xE0, b'a', b'b', b'c', b'd',
            0xFC,
        ];

        assert!(matches!(
            decompress(&input),
            Err(Error::LengthMismatch { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn decompress_overlong_output() {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x02,
            0xE0, b'a', b'b', b'c', b'd',
        ];

        assert!(matches!(
            decompress(&input),
            Err(Error::LengthMismatch { expected: 2, actual: 4 })
        ));
    }

    #[test]
    fn decompress_reference_before_start() {
        #[rustfmt::skip]
        let input = [
            0x10, 0xFB, 0x00, 0x00, 0x05,
            0x01, 0x04, b'a',
        ];

        assert!(matches!(
            decompress(&input),
            Err(Error::InvalidBackReference { distance: 5, position: 1 })
        ));
    }

    #[test]
    fn compress_round_trip() -> Result<()> {
        let mut expected = b"the quick brown fox jumps over the lazy dog. ".repeat(20);
        expected.extend(std::iter::repeat(0x55).take(300));
        expected.extend((0..=255u8).cycle().take(2000));

        let compressed = compress(&expected);
        assert!(compressed.len() < expected.len());
        assert_eq!(decompress(&compressed)?, expected);

        Ok(())
    }

    #[test]
    fn compress_short_and_empty() -> Result<()> {
        for input in [&b""[..], b"a", b"ab", b"abc", b"abcde"] {
            assert_eq!(decompress(&compress(input))?, input);
        }

        Ok(())
    }

    #[test]
    fn compress_truncated_fails() {
        let compressed = compress(&b"0123456789".repeat(50));
        let truncated = &compressed[..compressed.len() - 3];

        assert!(matches!(
            decompress(truncated),
            Err(Error::TruncatedStream { .. })
        ));
    }
}
