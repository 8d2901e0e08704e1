use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What the catalog stores about an image besides its path and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png: Option<PngDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PngDetails {
    pub color_type: String,
    pub bit_depth: u8,
    pub interlaced: bool,
}

impl ImageMetadata {
    pub fn is_png(&self) -> bool {
        self.format == "png"
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reads format and dimensions from file contents without decoding pixels.
pub fn probe_bytes(bytes: &[u8]) -> Result<ImageMetadata, AppError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| AppError::Invalid("unrecognized image format".to_string()))?;
    let (width, height) = reader.into_dimensions()?;
    let png = if format == ImageFormat::Png {
        Some(png_details(bytes)?)
    } else {
        None
    };
    Ok(ImageMetadata {
        width,
        height,
        format: format_name(format),
        png,
    })
}

fn png_details(bytes: &[u8]) -> Result<PngDetails, AppError> {
    let decoder = ::png::Decoder::new(Cursor::new(bytes));
    let reader = decoder.read_info()?;
    let info = reader.info();
    Ok(PngDetails {
        color_type: format!("{:?}", info.color_type).to_lowercase(),
        bit_depth: info.bit_depth as u8,
        interlaced: info.interlaced,
    })
}

// "png", "jpeg", "webp", ...
fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_lowercase()
}
