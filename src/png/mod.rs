pub mod chunk;
pub mod cursor;
pub mod error;
pub mod text;

pub use chunk::{split_chunks, Chunk, ChunkType, PNG_SIGNATURE};
pub use error::{ContainerError, DecodeError};
pub use text::{TextDecoder, TextEntry, DEFAULT_MAX_INFLATED_BYTES};
