use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::catalog::{CatalogStore, ScannedImage};
use crate::config::ScanConfig;
use crate::error::AppError;
use crate::extract::{extract_text, log_extraction};
use crate::png::{TextDecoder, DEFAULT_MAX_INFLATED_BYTES, PNG_SIGNATURE};
use crate::probe::{probe_bytes, ImageMetadata};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub workers: Option<usize>,
    pub max_inflated_bytes: usize,
    pub progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            workers: None,
            max_inflated_bytes: DEFAULT_MAX_INFLATED_BYTES,
            progress: false,
        }
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            workers: config.workers,
            max_inflated_bytes: config.max_inflated_bytes,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub found: usize,
    pub registered: usize,
    pub skipped: usize,
    pub metadata_updated: usize,
    pub metadata_errors: usize,
    pub png_info_extracted: usize,
    pub png_info_errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PngText {
    NotPng,
    Extracted,
    Empty,
    Failed,
}

#[derive(Debug)]
enum FileOutcome {
    Skipped,
    Scanned {
        image: ScannedImage,
        png_text: PngText,
    },
}

/// Scans `root` recursively into `store`.
///
/// A file that cannot be read is skipped, a failed probe or a broken PNG
/// container only costs that file its metadata or text; none of these stop
/// the scan. A failed storage write does.
pub fn scan_directory<S>(
    root: &Path,
    store: &mut S,
    options: &ScanOptions,
) -> Result<ScanSummary, AppError>
where
    S: CatalogStore + ?Sized,
{
    if !root.is_dir() {
        return Err(AppError::Invalid(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let files = find_images(root)?;
    let mut summary = ScanSummary {
        found: files.len(),
        ..ScanSummary::default()
    };
    info!(root = %root.display(), files = files.len(), "found image files");
    if files.is_empty() {
        return Ok(summary);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .build()
        .map_err(|e| AppError::Invalid(format!("worker pool: {e}")))?;
    let decoder = TextDecoder::new(options.max_inflated_bytes);
    let bar = options.progress.then(|| progress_bar(files.len() as u64, root));

    for batch in files.chunks(options.batch_size.max(1)) {
        let outcomes: Vec<FileOutcome> =
            pool.install(|| batch.par_iter().map(|path| scan_file(path, &decoder)).collect());

        let mut images = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                FileOutcome::Skipped => summary.skipped += 1,
                FileOutcome::Scanned { image, png_text } => {
                    summary.registered += 1;
                    if image.metadata.is_some() {
                        summary.metadata_updated += 1;
                    } else {
                        summary.metadata_errors += 1;
                    }
                    match png_text {
                        PngText::Extracted => summary.png_info_extracted += 1,
                        PngText::Failed => summary.png_info_errors += 1,
                        PngText::NotPng | PngText::Empty => {}
                    }
                    images.push(image);
                }
            }
        }
        store.record_batch(&images)?;

        if let Some(b) = &bar {
            b.inc(batch.len() as u64);
        }
        debug!(written = images.len(), "batch recorded");
    }

    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    info!(
        registered = summary.registered,
        skipped = summary.skipped,
        metadata_updated = summary.metadata_updated,
        metadata_errors = summary.metadata_errors,
        png_info_extracted = summary.png_info_extracted,
        png_info_errors = summary.png_info_errors,
        "scan complete"
    );
    Ok(summary)
}

pub fn find_images(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn scan_file(path: &Path, decoder: &TextDecoder) -> FileOutcome {
    let meta = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            debug!(path = %path.display(), "skipping non-file");
            return FileOutcome::Skipped;
        }
        Err(e) => {
            warn!(path = %path.display(), "skipping file: {e}");
            return FileOutcome::Skipped;
        }
    };
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), "skipping file: {e}");
            return FileOutcome::Skipped;
        }
    };
    let created_at_os = meta
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok());

    let metadata = match probe_bytes(&bytes) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(path = %path.display(), "failed to read image metadata: {e}");
            None
        }
    };
    let is_png = metadata
        .as_ref()
        .map_or_else(|| bytes.starts_with(&PNG_SIGNATURE), ImageMetadata::is_png);

    let (png_info, png_text) = if !is_png {
        (None, PngText::NotPng)
    } else {
        match extract_text(&bytes, decoder) {
            Ok(extraction) => {
                log_extraction(path, &extraction);
                match extraction.blob() {
                    Some(blob) => (Some(blob), PngText::Extracted),
                    None => (None, PngText::Empty),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to extract png text: {e}");
                (None, PngText::Failed)
            }
        }
    };

    FileOutcome::Scanned {
        image: ScannedImage {
            path: path.to_path_buf(),
            file_size: meta.len(),
            created_at_os,
            metadata,
            png_info,
        },
        png_text,
    }
}

fn progress_bar(total: u64, root: &Path) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix} [{wide_bar}] {pos}/{len} ({percent}%) {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_prefix(
        root.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string()),
    );
    bar.set_message("scanning");
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ImageQuery, SqliteCatalog};
    use crate::test_support::{png_file, text_chunk, ztxt_chunk};
    use tempfile::tempdir;

    fn write_fixture_tree(root: &Path) {
        fs::write(root.join("a.png"), png_file(&[text_chunk("parameters", "a cat")])).unwrap();
        let mut broken = png_file(&[text_chunk("parameters", "lost")]);
        broken.truncate(40);
        fs::write(root.join("c.png"), broken).unwrap();
        fs::write(root.join("d.jpg"), b"not really a jpeg").unwrap();
        fs::write(root.join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(
            root.join("nested").join("b.PNG"),
            png_file(&[ztxt_chunk("Comment", "snowy fox")]),
        )
        .unwrap();
    }

    #[test]
    fn scans_tree_and_survives_bad_files() {
        let dir = tempdir().unwrap();
        write_fixture_tree(dir.path());
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let options = ScanOptions {
            batch_size: 1,
            workers: Some(2),
            ..ScanOptions::default()
        };

        let summary = scan_directory(dir.path(), &mut catalog, &options).unwrap();
        assert_eq!(
            summary,
            ScanSummary {
                found: 4,
                registered: 4,
                skipped: 0,
                metadata_updated: 2,
                metadata_errors: 2,
                png_info_extracted: 2,
                png_info_errors: 1,
            }
        );

        let page = catalog.list(&ImageQuery::default()).unwrap();
        assert_eq!(page.total, 4);
        let by_name = |name: &str| {
            page.images
                .iter()
                .find(|i| i.file_name == name)
                .map(|i| i.id)
                .unwrap()
        };
        assert_eq!(
            catalog.png_info(by_name("a.png")).unwrap().as_deref(),
            Some("tEXt: parameters=a cat")
        );
        assert_eq!(
            catalog.png_info(by_name("b.PNG")).unwrap().as_deref(),
            Some("zTXt: Comment=snowy fox")
        );
        assert_eq!(catalog.png_info(by_name("c.png")).unwrap(), None);
        assert_eq!(catalog.png_info(by_name("d.jpg")).unwrap(), None);
        assert_eq!(catalog.get(by_name("a.png")).unwrap().width, Some(1));
    }

    #[test]
    fn rescan_updates_existing_rows() {
        let dir = tempdir().unwrap();
        write_fixture_tree(dir.path());
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        scan_directory(dir.path(), &mut catalog, &ScanOptions::default()).unwrap();

        fs::write(dir.path().join("a.png"), png_file(&[])).unwrap();
        scan_directory(dir.path(), &mut catalog, &ScanOptions::default()).unwrap();

        let page = catalog.list(&ImageQuery::default()).unwrap();
        assert_eq!(page.total, 4);
        let a = page.images.iter().find(|i| i.file_name == "a.png").unwrap();
        assert_eq!(catalog.png_info(a.id).unwrap(), None);
    }

    #[derive(Default)]
    struct RecordingStore {
        batches: Vec<Vec<ScannedImage>>,
    }

    impl CatalogStore for RecordingStore {
        fn record_batch(&mut self, batch: &[ScannedImage]) -> Result<usize, AppError> {
            self.batches.push(batch.to_vec());
            Ok(batch.len())
        }

        fn png_info_blobs(&self) -> Result<Vec<String>, AppError> {
            Ok(self
                .batches
                .iter()
                .flatten()
                .filter_map(|i| i.png_info.clone())
                .collect())
        }
    }

    #[test]
    fn one_write_per_batch() {
        let dir = tempdir().unwrap();
        write_fixture_tree(dir.path());
        let mut store = RecordingStore::default();
        let options = ScanOptions {
            batch_size: 3,
            ..ScanOptions::default()
        };

        scan_directory(dir.path(), &mut store, &options).unwrap();
        let sizes: Vec<usize> = store.batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 1]);
        assert_eq!(store.png_info_blobs().unwrap().len(), 2);
    }

    #[test]
    fn missing_root_is_rejected() {
        let dir = tempdir().unwrap();
        let mut store = RecordingStore::default();
        let err = scan_directory(&dir.path().join("nope"), &mut store, &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[test]
    fn empty_directory_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut store = RecordingStore::default();
        let summary = scan_directory(dir.path(), &mut store, &ScanOptions::default()).unwrap();
        assert_eq!(summary, ScanSummary::default());
        assert!(store.batches.is_empty());
    }

    #[test]
    fn extensions_match_case_insensitively() {
        assert!(has_image_extension(Path::new("x/IMG.JPEG")));
        assert!(has_image_extension(Path::new("x/img.webp")));
        assert!(!has_image_extension(Path::new("x/img.txt")));
        assert!(!has_image_extension(Path::new("x/png")));
    }
}
