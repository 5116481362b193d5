//! Image pipeline: raw captured or uploaded bytes to a stored picture.
//!
//! Pictures are stored as data URIs so the whole collection stays a single
//! text value. Large photos can be scaled down on the way in using a staged
//! downscale (halve, halve again, then scale to the target) which avoids the
//! moiré a single large reduction produces.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Picture;

/// Maximum number of halving stages before the final scale
const HALVING_STAGES: usize = 2;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Not a base64 image data URI")]
    InvalidDataUri,

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid target width: {0}")]
    InvalidTargetWidth(u32),

    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Raw encoded image bytes as produced by a camera or read from a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Settings applied to every incoming picture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scale wider pictures down to this width; `None` keeps them as captured
    pub resize_width: Option<u32>,
    /// JPEG quality (1-100) for resized pictures
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resize_width: None,
            jpeg_quality: 92,
        }
    }
}

/// Wrap raw bytes in a `data:<mime>;base64,` URI
pub fn encode(bytes: &ImageBytes) -> ImageResult<String> {
    let format = image::guess_format(bytes.as_bytes()).map_err(ImageError::Decode)?;
    if !is_supported(format) {
        return Err(ImageError::UnsupportedFormat(format!("{:?}", format)));
    }

    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes.as_bytes())
    ))
}

/// Extract the raw bytes from a base64 data URI
pub fn decode_data_uri(uri: &str) -> ImageResult<ImageBytes> {
    let rest = uri.strip_prefix("data:").ok_or(ImageError::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUri)?;
    if !header.ends_with(";base64") {
        return Err(ImageError::InvalidDataUri);
    }

    STANDARD
        .decode(payload.trim())
        .map(ImageBytes::new)
        .map_err(|_| ImageError::InvalidDataUri)
}

/// Scale a data-URI image to `target_width`, keeping the aspect ratio.
///
/// The result is a JPEG data URI at the default quality.
pub fn resize(uri: &str, target_width: u32) -> ImageResult<String> {
    resize_with_quality(uri, target_width, PipelineConfig::default().jpeg_quality)
}

pub fn resize_with_quality(uri: &str, target_width: u32, quality: u8) -> ImageResult<String> {
    if target_width == 0 {
        return Err(ImageError::InvalidTargetWidth(target_width));
    }

    let bytes = decode_data_uri(uri)?;
    let img = image::load_from_memory(bytes.as_bytes()).map_err(ImageError::Decode)?;
    shrink(img, target_width, quality)
}

fn shrink(img: DynamicImage, target_width: u32, quality: u8) -> ImageResult<String> {
    let resized = staged_resize(img, target_width);
    let jpeg = encode_jpeg(&resized, quality)?;
    encode(&jpeg)
}

/// Timestamp an encoded image
pub fn to_picture(data: String) -> Picture {
    Picture {
        taken_at: Utc::now(),
        data,
    }
}

/// Full pipeline for one incoming image: encode, optionally shrink, timestamp
pub fn prepare(bytes: &ImageBytes, config: &PipelineConfig) -> ImageResult<Picture> {
    let data = encode(bytes)?;
    // Also rejects bytes that only look like an image
    let img = image::load_from_memory(bytes.as_bytes()).map_err(ImageError::Decode)?;

    let data = match config.resize_width {
        Some(0) => return Err(ImageError::InvalidTargetWidth(0)),
        Some(width) if img.width() > width => shrink(img, width, config.jpeg_quality)?,
        _ => data,
    };

    Ok(to_picture(data))
}

/// [`prepare`] on the blocking pool, decoding is CPU bound
pub async fn prepare_blocking(bytes: ImageBytes, config: PipelineConfig) -> ImageResult<Picture> {
    tokio::task::spawn_blocking(move || prepare(&bytes, &config)).await?
}

fn is_supported(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Bmp
    )
}

fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (height as f64 * target_width as f64 / width as f64).round() as u32;
    scaled.max(1)
}

fn staged_resize(img: DynamicImage, target_width: u32) -> DynamicImage {
    let target_height = scaled_height(img.width(), img.height(), target_width);
    let mut current = img;

    for _ in 0..HALVING_STAGES {
        let half_width = current.width() / 2;
        // Never halve below the target, the final step would have to upscale
        if half_width < target_width {
            break;
        }
        let half_height = (current.height() / 2).max(1);
        current = current.resize_exact(half_width, half_height, FilterType::Triangle);
    }

    if current.width() != target_width || current.height() != target_height {
        current = current.resize_exact(target_width, target_height, FilterType::CatmullRom);
    }
    current
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> ImageResult<ImageBytes> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))
        .map_err(ImageError::Encode)?;
    Ok(ImageBytes::new(buf))
}
