//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::types::TableKind;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Header, table or payload is inconsistent with the archive
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// Misc record carries a tag outside the known set
    #[error("unknown misc record type {tag} at index {index}")]
    UnknownRecordType {
        /// Position of the record in the misc table
        index: usize,
        /// Tag that was read
        tag: u8,
    },

    /// Part references a material id with no misc record
    #[error("material {0} not found")]
    MaterialNotFound(u32),

    /// No texture pack at the requested position
    #[error("texture pack {0} not found")]
    TexturePackNotFound(usize),

    /// Texture page not referenced by any material
    #[error("texture page {0} not found")]
    TextureNotFound(u32),

    /// Part has no index table of the requested kind
    #[error("part {part} has no {kind} index table")]
    MissingIndexTable {
        /// Part index within its level
        part: u32,
        /// Table the lookup was for
        kind: TableKind,
    },

    /// Part has no index adjustment of the requested kind
    #[error("part {part} has no {kind} index adjustment")]
    MissingAdjustment {
        /// Part index within its level
        part: u32,
        /// Table the lookup was for
        kind: TableKind,
    },

    /// Index resolves outside the table it addresses
    #[error("part {part}: {kind} index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        /// Part index within its level
        part: u32,
        /// Table being addressed
        kind: TableKind,
        /// Index after adjustment
        index: usize,
        /// Length of the addressed table
        len: usize,
    },

    /// Recognised article shape that is not reconstructed
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Error from decoding a texture pack
    #[error(transparent)]
    Fsh(#[from] nfs_fsh::error::Error),
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        // short reads nested inside a record still count as io failures
        if value.is_eof() {
            return Error::IOError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                value.to_string(),
            ));
        }
        match value {
            binrw::Error::Io(e) => Error::IOError(e),
            other => Error::MalformedContainer(other.to_string()),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
