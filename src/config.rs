//! Defaults, then `pngcat.toml` (or `--config`), then `PNGCAT_*` variables
//! with `__` between nested keys (`PNGCAT_SCAN__BATCH_SIZE=50`).

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::display::DEFAULT_TEXT_LIMIT;
use crate::error::AppError;
use crate::png::DEFAULT_MAX_INFLATED_BYTES;
use crate::word_index::{ParametersPolicy, DEFAULT_LABELS, DEFAULT_SEPARATOR};

pub const CONFIG_FILE: &str = "pngcat.toml";
pub const ENV_PREFIX: &str = "PNGCAT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: PathBuf,
    pub scan: ScanConfig,
    pub display: DisplayConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub batch_size: usize,
    /// One per CPU when unset.
    pub workers: Option<usize>,
    pub max_inflated_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub text_limit: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Labels stripped in addition to the built-in generation settings.
    pub extra_labels: Vec<String>,
    pub separator: String,
}

impl IndexConfig {
    /// Built-in labels plus `extra_labels`, split on `separator`.
    pub fn policy(&self) -> Result<ParametersPolicy, AppError> {
        let labels = DEFAULT_LABELS
            .iter()
            .copied()
            .chain(self.extra_labels.iter().map(String::as_str));
        Ok(ParametersPolicy::new(labels, &self.separator)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("pngcat.sqlite"),
            scan: ScanConfig {
                batch_size: 100,
                workers: None,
                max_inflated_bytes: DEFAULT_MAX_INFLATED_BYTES,
            },
            display: DisplayConfig {
                text_limit: DEFAULT_TEXT_LIMIT,
                page_size: 50,
            },
            index: IndexConfig {
                extra_labels: Vec::new(),
                separator: DEFAULT_SEPARATOR.to_string(),
            },
        }
    }
}

impl Config {
    /// Loads `path`, or `pngcat.toml` in the working directory when `None`.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let file = path.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.scan.batch_size == 0 {
            return Err(AppError::Invalid("scan.batch_size must be at least 1".into()));
        }
        if self.scan.workers == Some(0) {
            return Err(AppError::Invalid("scan.workers must be at least 1".into()));
        }
        if self.display.page_size == 0 || self.display.text_limit == 0 {
            return Err(AppError::Invalid(
                "display.page_size and display.text_limit must be at least 1".into(),
            ));
        }
        if self.index.separator.trim().is_empty() {
            return Err(AppError::Invalid("index.separator must not be blank".into()));
        }
        Ok(())
    }
}
