use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image probe error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PNG header error: {0}")]
    Png(#[from] ::png::DecodingError),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Image {0} not found")]
    NotFound(i64),
    #[error("Invalid data: {0}")]
    Invalid(String),
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(Box::new(e))
    }
}
