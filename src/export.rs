use std::fs;
use std::path::{Path, PathBuf};

use filetime::{set_file_times, FileTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub copied: usize,
    pub errors: Vec<(PathBuf, String)>,
}

/// Copies catalogued images into `dest`, keeping file names and timestamps.
///
/// An existing file with the same name is overwritten. Per-file failures are
/// collected in the report; only failing to create `dest` is an error.
pub fn export_images(sources: &[(i64, PathBuf)], dest: &Path) -> Result<ExportReport, AppError> {
    fs::create_dir_all(dest)?;
    let mut report = ExportReport::default();
    for (id, source) in sources {
        match copy_preserving_times(source, dest) {
            Ok(target) => {
                report.copied += 1;
                info!(id, from = %source.display(), to = %target.display(), "exported image");
            }
            Err(e) => {
                warn!(id, path = %source.display(), "export failed: {e}");
                report.errors.push((source.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}

fn copy_preserving_times(source: &Path, dest: &Path) -> Result<PathBuf, AppError> {
    let name = source
        .file_name()
        .ok_or_else(|| AppError::Invalid(format!("no file name in {}", source.display())))?;
    let target = dest.join(name);
    let meta = fs::metadata(source)?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    fs::copy(source, &target)?;
    set_file_times(&target, atime, mtime)?;
    Ok(target)
}
