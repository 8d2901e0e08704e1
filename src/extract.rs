use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::png::{split_chunks, ChunkType, ContainerError, DecodeError, TextDecoder, TextEntry};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Position of the chunk in the file, counting every chunk type.
    pub chunk_index: usize,
    pub chunk_type: ChunkType,
    pub error: DecodeError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub entries: Vec<TextEntry>,
    pub failures: Vec<DecodeFailure>,
}

impl Extraction {
    /// Folds the entries into `<chunkType>: <keyword>=<value>` lines.
    ///
    /// `None` when no entry survived, so "no text" stays distinct from text
    /// whose values happen to be empty.
    pub fn blob(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{}: {}={}", e.source, e.keyword, e.value))
            .collect();
        Some(lines.join("\n"))
    }
}

/// Pulls every text chunk out of a PNG buffer.
///
/// Individual chunks that fail to decode are recorded in
/// `Extraction::failures`; only a buffer that cannot be split into chunks at
/// all is an error.
pub fn extract_text(buf: &[u8], decoder: &TextDecoder) -> Result<Extraction, ContainerError> {
    let chunks = split_chunks(buf)?;
    let mut out = Extraction::default();
    for (chunk_index, chunk) in chunks.iter().enumerate() {
        if !chunk.kind.is_text() {
            continue;
        }
        match decoder.decode(chunk) {
            Ok(entry) => out.entries.push(entry),
            Err(error) => out.failures.push(DecodeFailure {
                chunk_index,
                chunk_type: chunk.kind,
                error,
            }),
        }
    }
    Ok(out)
}

pub fn extract_file(path: &Path, decoder: &TextDecoder) -> Result<Extraction, ExtractError> {
    let buf = fs::read(path)?;
    let extraction = extract_text(&buf, decoder)?;
    log_extraction(path, &extraction);
    Ok(extraction)
}

pub(crate) fn log_extraction(path: &Path, extraction: &Extraction) {
    for failure in &extraction.failures {
        warn!(
            path = %path.display(),
            chunk = %failure.chunk_type,
            index = failure.chunk_index,
            "skipping text chunk: {}",
            failure.error
        );
    }
    debug!(
        path = %path.display(),
        entries = extraction.entries.len(),
        failures = extraction.failures.len(),
        "extracted png text"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_file, raw_chunk, text_chunk, ztxt_chunk};
    use tempfile::tempdir;

    #[test]
    fn folds_entries_in_chunk_order() {
        let buf = png_file(&[
            text_chunk("parameters", "a cat"),
            ztxt_chunk("Comment", "made with love"),
            text_chunk("Software", "GIMP"),
        ]);
        let extraction = extract_text(&buf, &TextDecoder::default()).unwrap();
        assert!(extraction.failures.is_empty());
        assert_eq!(
            extraction.blob().as_deref(),
            Some("tEXt: parameters=a cat\nzTXt: Comment=made with love\ntEXt: Software=GIMP")
        );
    }

    #[test]
    fn corrupt_sibling_is_recorded_not_fatal() {
        let buf = png_file(&[
            text_chunk("parameters", "a cat"),
            raw_chunk(b"zTXt", b"broken\0\0definitely not zlib"),
        ]);
        let extraction = extract_text(&buf, &TextDecoder::default()).unwrap();
        assert_eq!(extraction.entries.len(), 1);
        assert_eq!(extraction.entries[0].value, "a cat");
        assert_eq!(extraction.failures.len(), 1);
        let failure = &extraction.failures[0];
        assert_eq!(failure.chunk_type, ChunkType::ZTXT);
        assert_eq!(failure.chunk_index, 2);
        assert!(matches!(failure.error, DecodeError::DecompressionError(_)));
    }

    #[test]
    fn unsupported_compression_does_not_disturb_siblings() {
        let buf = png_file(&[
            raw_chunk(b"iTXt", b"k\0\x01\x07\0\0payload"),
            text_chunk("after", "still here"),
        ]);
        let extraction = extract_text(&buf, &TextDecoder::default()).unwrap();
        assert_eq!(extraction.blob().as_deref(), Some("tEXt: after=still here"));
        assert_eq!(
            extraction.failures[0].error,
            DecodeError::UnsupportedCompression {
                flag: Some(1),
                method: 7
            }
        );
    }

    #[test]
    fn no_text_means_no_blob() {
        let extraction = extract_text(&png_file(&[]), &TextDecoder::default()).unwrap();
        assert_eq!(extraction.blob(), None);
    }

    #[test]
    fn empty_values_still_produce_a_blob() {
        let buf = png_file(&[text_chunk("empty", "")]);
        let extraction = extract_text(&buf, &TextDecoder::default()).unwrap();
        assert_eq!(extraction.blob().as_deref(), Some("tEXt: empty="));
    }

    #[test]
    fn truncated_container_fails_the_file() {
        let mut buf = png_file(&[text_chunk("parameters", "a cat")]);
        buf.truncate(40);
        assert!(extract_text(&buf, &TextDecoder::default()).is_err());
    }

    #[test]
    fn extract_file_reads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        fs::write(&path, png_file(&[text_chunk("parameters", "a fox")])).unwrap();

        let extraction = extract_file(&path, &TextDecoder::default()).unwrap();
        assert_eq!(extraction.blob().as_deref(), Some("tEXt: parameters=a fox"));

        let missing = extract_file(&dir.path().join("missing.png"), &TextDecoder::default());
        assert!(matches!(missing, Err(ExtractError::Io(_))));
    }
}
