use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode normalized image: {0}")]
    Encode(String),
    #[error("Failed to write normalized image: {0}")]
    Write(#[from] std::io::Error),
}

/// A receipt image after normalization: single-channel, fixed width,
/// written out as a PNG for engines that take a file path.
pub struct NormalizedImage {
    pub image: GrayImage,
    /// Unique per invocation, so concurrent runs never clobber each other.
    pub path: PathBuf,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// PNG-encode the normalized image for engines that take bytes.
    pub fn png_bytes(&self) -> Result<Vec<u8>, PreprocessError> {
        encode_png(&self.image)
    }
}

/// Load a receipt image, convert to grayscale, and rescale to `target_width`
/// preserving aspect ratio. Linear interpolation keeps thin glyph strokes
/// readable for the OCR engine.
pub fn normalize(
    path: &Path,
    target_width: u32,
    temp_dir: Option<&Path>,
) -> Result<NormalizedImage, PreprocessError> {
    let gray = image::open(path)?.to_luma8();

    let scale = target_width as f64 / gray.width() as f64;
    let target_height = ((gray.height() as f64 * scale).round() as u32).max(1);
    let resized = imageops::resize(&gray, target_width, target_height, FilterType::Triangle);

    let dir = temp_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&dir)?;
    let temp_path = dir.join(format!("receipt_norm_{}.png", Uuid::new_v4().simple()));
    std::fs::write(&temp_path, encode_png(&resized)?)?;

    Ok(NormalizedImage { image: resized, path: temp_path })
}

/// PNG-encode a single-channel image (also used for region crops).
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
