use thiserror::Error;

use super::chunk::ChunkType;

/// The buffer could not be walked as a chunk stream at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("malformed container at byte {offset}: {reason}")]
    MalformedContainer { offset: usize, reason: &'static str },
}

/// A single text chunk could not be turned into a keyword/value pair.
///
/// Every variant except `UnsupportedChunkType` is an expected runtime
/// condition: the extraction job records it and moves on to the next chunk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("chunk type {0} is not a text chunk")]
    UnsupportedChunkType(ChunkType),
    #[error("missing keyword separator")]
    MissingSeparator,
    /// `flag` is `None` for zTXt, which has no compression flag byte.
    #[error("unsupported compression method {method}{}", .flag.map(|f| format!(" (flag {f})")).unwrap_or_default())]
    UnsupportedCompression { flag: Option<u8>, method: u8 },
    #[error("decompression failed: {0}")]
    DecompressionError(String),
    #[error("malformed fields: {0}")]
    MalformedFields(&'static str),
}
