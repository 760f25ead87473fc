//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// data does not start with a known texture pack magic
    #[error("unknown texture pack format {0:02X?}")]
    UnknownFormat([u8; 4]),

    /// compressed input ended before the declared size was produced
    #[error("compressed stream truncated at input offset {position}")]
    TruncatedStream {
        /// Input offset at which more data was required
        position: usize,
    },

    /// decompressed output does not match the declared size
    #[error("decompressed {actual} bytes but header declared {expected}")]
    LengthMismatch {
        /// Size declared by the stream header
        expected: usize,
        /// Size actually produced
        actual: usize,
    },

    /// declared uncompressed size is above the allowed limit
    #[error("stream declares {declared} bytes, limit is {limit}")]
    SizeLimitExceeded {
        /// Size declared by the stream header
        declared: usize,
        /// Largest size accepted
        limit: usize,
    },

    /// a back-reference points before the start of the output
    #[error("back-reference distance {distance} at output offset {position}")]
    InvalidBackReference {
        /// Distance requested by the command
        distance: usize,
        /// Output length when the command was decoded
        position: usize,
    },

    /// bitmap record code is not a known image format
    #[error("unknown image format 0x{code:02X} for entry {name}")]
    UnknownImageFormat {
        /// Directory name of the entry
        name: String,
        /// Record code of the bitmap block
        code: u8,
    },

    /// indexed image without a local or global palette
    #[error("no palette available for indexed entry {0}")]
    MissingPalette(String),

    /// indexed pixel refers past the end of its palette
    #[error("palette index {index} out of range ({len} colours) in entry {name}")]
    PaletteIndexOutOfRange {
        /// Directory name of the entry
        name: String,
        /// Offending pixel value
        index: usize,
        /// Number of colours in the palette
        len: usize,
    },

    /// block or pixel data lies outside the pack
    #[error("entry {0} lies outside the texture pack")]
    ImageOutOfBounds(String),

    /// {0}
    #[error("{0}")]
    ImageDecode(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
