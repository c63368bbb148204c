//! Image decoding, encoding and format labels.

use std::fmt;
use std::io::Cursor;

use image::{ColorType, DynamicImage, GenericImageView, ImageError, ImageFormat};

/// Label used when a payload is not a recognizable image.
pub const UNKNOWN_FORMAT: &str = "BIN";

/// Image payload together with its encoding label ("PNG", "JPEG", ...).
/// The label is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: String,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, format: &str) -> Self {
        let format = format.trim().to_ascii_uppercase();
        let format = if format.is_empty() {
            UNKNOWN_FORMAT.to_string()
        } else {
            format
        };
        Self { bytes, format }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "PNG")
    }

    /// Labels the payload with whatever format its magic bytes indicate.
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let format = sniff_format(&bytes);
        Self::new(bytes, format.as_deref().unwrap_or(UNKNOWN_FORMAT))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn extension(&self) -> String {
        extension_for(&self.format)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub fn format_label(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        other => other
            .extensions_str()
            .first()
            .map(|ext| ext.to_ascii_uppercase())
            .unwrap_or_else(|| UNKNOWN_FORMAT.to_string()),
    }
}

pub fn sniff_format(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes).ok().map(format_label)
}

/// File extension for a stored image with the given format label.
pub fn extension_for(format: &str) -> String {
    match format.trim().to_ascii_uppercase().as_str() {
        "" => "bin".to_string(),
        "JPEG" | "JPG" => "jpg".to_string(),
        "TIFF" | "TIF" => "tiff".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn color_label(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "L16".to_string(),
        ColorType::La16 => "LA16".to_string(),
        ColorType::Rgb16 => "RGB16".to_string(),
        ColorType::Rgba16 => "RGBA16".to_string(),
        other => format!("{:?}", other),
    }
}

/// Before/after metadata shown next to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub color: String,
}

impl fmt::Display for ImageDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {}px, {}, {}",
            self.width,
            self.height,
            format_filesize(self.file_size),
            self.color
        )?;
        if let Some(format) = &self.format {
            write!(f, ", {}", format)?;
        }
        Ok(())
    }
}

/// Returns `None` for empty or undecodable payloads.
pub fn describe(bytes: &[u8]) -> Option<ImageDetails> {
    if bytes.is_empty() {
        return None;
    }
    let image = decode(bytes).ok()?;
    let (width, height) = image.dimensions();
    Some(ImageDetails {
        file_size: bytes.len() as u64,
        width,
        height,
        format: sniff_format(bytes),
        color: color_label(image.color()),
    })
}

pub fn format_filesize(num_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if num_bytes < KB {
        format!("{} B", num_bytes)
    } else if num_bytes < MB {
        format!("{:.1} KB", num_bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", num_bytes as f64 / MB as f64)
    }
}
