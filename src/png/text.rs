use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};

use super::chunk::{Chunk, ChunkType};
use super::cursor::ByteCursor;
use super::error::DecodeError;

/// Upper bound on the inflated size of one zTXt/iTXt payload.
pub const DEFAULT_MAX_INFLATED_BYTES: usize = 8 * 1024 * 1024;

const DEFLATE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub keyword: String,
    pub value: String,
    pub source: ChunkType,
}

#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    max_inflated_bytes: usize,
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INFLATED_BYTES)
    }
}

impl TextDecoder {
    pub fn new(max_inflated_bytes: usize) -> Self {
        Self { max_inflated_bytes }
    }

    pub fn decode(&self, chunk: &Chunk<'_>) -> Result<TextEntry, DecodeError> {
        let (keyword, value) = match chunk.kind {
            ChunkType::TEXT => decode_text(chunk.data)?,
            ChunkType::ZTXT => self.decode_ztxt(chunk.data)?,
            ChunkType::ITXT => self.decode_itxt(chunk.data)?,
            other => return Err(DecodeError::UnsupportedChunkType(other)),
        };
        Ok(TextEntry {
            keyword,
            value,
            source: chunk.kind,
        })
    }

    // keyword \0 method compressed-text
    fn decode_ztxt(&self, data: &[u8]) -> Result<(String, String), DecodeError> {
        let mut cur = ByteCursor::new(data);
        let keyword = cur.take_until_nul().ok_or(DecodeError::MissingSeparator)?;
        let method = cur
            .take_u8()
            .ok_or(DecodeError::MalformedFields("missing compression method"))?;
        if method != DEFLATE {
            return Err(DecodeError::UnsupportedCompression { flag: None, method });
        }
        let text = self.inflate(cur.rest())?;
        Ok((latin1(keyword), utf8(&text)))
    }

    // keyword \0 flag method language \0 translated-keyword \0 text
    fn decode_itxt(&self, data: &[u8]) -> Result<(String, String), DecodeError> {
        let mut cur = ByteCursor::new(data);
        let keyword = cur.take_until_nul().ok_or(DecodeError::MissingSeparator)?;
        let flag = cur
            .take_u8()
            .ok_or(DecodeError::MalformedFields("missing compression flag"))?;
        let method = cur
            .take_u8()
            .ok_or(DecodeError::MalformedFields("missing compression method"))?;
        let _language = cur
            .take_until_nul()
            .ok_or(DecodeError::MalformedFields("unterminated language tag"))?;
        let _translated = cur
            .take_until_nul()
            .ok_or(DecodeError::MalformedFields("unterminated translated keyword"))?;
        let text = cur.rest();

        let value = match (flag, method) {
            (0, _) => utf8(text),
            (1, DEFLATE) => utf8(&self.inflate(text)?),
            _ => {
                return Err(DecodeError::UnsupportedCompression {
                    flag: Some(flag),
                    method,
                })
            }
        };
        Ok((latin1(keyword), value))
    }

    fn inflate(&self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        decompress_to_vec_zlib_with_limit(data, self.max_inflated_bytes).map_err(|e| {
            match e.status {
                TINFLStatus::HasMoreOutput => DecodeError::DecompressionError(format!(
                    "inflated text exceeds {} bytes",
                    self.max_inflated_bytes
                )),
                status => DecodeError::DecompressionError(format!("{status:?}")),
            }
        })
    }
}

// keyword \0 text
fn decode_text(data: &[u8]) -> Result<(String, String), DecodeError> {
    let mut cur = ByteCursor::new(data);
    let keyword = cur.take_until_nul().ok_or(DecodeError::MissingSeparator)?;
    Ok((latin1(keyword), latin1(cur.rest())))
}

// Stray NULs left by a bad field boundary are dropped before any decode.
fn strip_nul(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes.iter().copied().filter(|b| *b != 0)
}

fn latin1(bytes: &[u8]) -> String {
    strip_nul(bytes).map(char::from).collect()
}

fn utf8(bytes: &[u8]) -> String {
    let cleaned: Vec<u8> = strip_nul(bytes).collect();
    String::from_utf8_lossy(&cleaned).into_owned()
}
