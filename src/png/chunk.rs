use std::fmt;

use super::error::ContainerError;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const TEXT: ChunkType = ChunkType(*b"tEXt");
    pub const ZTXT: ChunkType = ChunkType(*b"zTXt");
    pub const ITXT: ChunkType = ChunkType(*b"iTXt");
    pub const IEND: ChunkType = ChunkType(*b"IEND");

    pub const TEXT_TYPES: [ChunkType; 3] = [Self::TEXT, Self::ZTXT, Self::ITXT];

    pub fn is_text(self) -> bool {
        Self::TEXT_TYPES.contains(&self)
    }

    pub fn as_str(&self) -> &str {
        // Tags are validated as ASCII letters when split, so this never falls back.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({})", self.as_str())
    }
}

/// A chunk borrowed from the file buffer. The CRC trailer is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: ChunkType,
    pub data: &'a [u8],
}

/// Splits a PNG buffer into its chunks, in file order.
///
/// The buffer may start with the PNG signature or directly with the first
/// chunk. Walking stops after `IEND`; anything behind it is ignored. CRCs are
/// skipped, not checked.
pub fn split_chunks(buf: &[u8]) -> Result<Vec<Chunk<'_>>, ContainerError> {
    let mut offset = if buf.starts_with(&PNG_SIGNATURE) {
        PNG_SIGNATURE.len()
    } else {
        0
    };

    let mut chunks = Vec::new();
    while offset < buf.len() {
        let header = buf
            .get(offset..offset + 8)
            .ok_or(ContainerError::MalformedContainer {
                offset,
                reason: "truncated chunk header",
            })?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = ChunkType([header[4], header[5], header[6], header[7]]);
        if !kind.0.iter().all(u8::is_ascii_alphabetic) {
            return Err(ContainerError::MalformedContainer {
                offset: offset + 4,
                reason: "chunk type is not four ASCII letters",
            });
        }

        let data_start = offset + 8;
        let data_end = data_start
            .checked_add(len)
            .filter(|end| *end <= buf.len())
            .ok_or(ContainerError::MalformedContainer {
                offset,
                reason: "chunk length runs past end of buffer",
            })?;
        let next = data_end + 4;
        if next > buf.len() {
            return Err(ContainerError::MalformedContainer {
                offset: data_end,
                reason: "missing CRC trailer",
            });
        }

        chunks.push(Chunk {
            kind,
            data: &buf[data_start..data_end],
        });
        if kind == ChunkType::IEND {
            break;
        }
        offset = next;
    }
    Ok(chunks)
}
