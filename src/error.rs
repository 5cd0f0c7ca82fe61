//! Error types for reading images, decoding export tables and preprocessing
//! headers.
//!
//! Every error here is fatal for the run. The only recoverable condition,
//! an export whose address has no backing section, is not an error at all
//! and is reported through the export classification instead.

use std::path::PathBuf;

/// Errors from loading and validating a PE image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no MZ signature")]
    MissingDosSignature,

    #[error("no PE signature")]
    MissingPeSignature,

    #[error("{0} is truncated")]
    Truncated(&'static str),
}

/// Errors from decoding an export directory.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The RVA does not land inside of a section or the section has no data
    /// in the file.
    #[error("RVA {rva:#010x} for the {what} does not map to file data")]
    UnresolvedRva { rva: u32, what: &'static str },

    /// The RVA resolves to a file offset but the data there is too short.
    #[error("{what} at RVA {rva:#010x} extends past the end of the file")]
    OutOfBounds { rva: u32, what: &'static str },

    #[error("ordinal index {index} for name {name_index} is outside of the function table ({count} entries)")]
    OrdinalIndex {
        index: u16,
        name_index: usize,
        count: usize,
    },
}

/// Errors from preprocessing header files.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("{0}: header not found")]
    NotFound(String),

    #[error("preprocessor command is empty")]
    EmptyCommand,

    #[error("could not execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
