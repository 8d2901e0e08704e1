pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod extract;
pub mod png;
pub mod probe;
pub mod scan;
pub mod word_index;

#[cfg(test)]
mod test_support;

pub use catalog::{vocabulary, CatalogStore, ImageQuery, ScannedImage, SqliteCatalog};
pub use config::Config;
pub use error::AppError;
pub use export::{export_images, ExportReport};
pub use extract::{extract_file, extract_text, DecodeFailure, ExtractError, Extraction};
pub use scan::{scan_directory, ScanOptions, ScanSummary};
pub use word_index::{build_word_index, NoisePolicy, ParametersPolicy, WordIndex};
