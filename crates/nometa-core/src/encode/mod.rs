//! Metadata-free re-encoding with one policy per destination format.

pub mod jpeg;
pub mod png;

use crate::StripError;
use crate::decode::{DecodedImage, PixelMode};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Quality used for JPEG output unless overridden.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Encoder knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripOptions {
    pub jpeg_quality: u8,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Destination format of a re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    /// BMP, GIF, TIFF and WebP: native encode with a PNG fallback.
    Other(ImageFormat),
}

impl From<ImageFormat> for TargetFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            other => Self::Other(other),
        }
    }
}

impl TargetFormat {
    /// Uses the detected source format, or the extension of `destination`
    /// when the contents were not recognized.
    pub fn resolve(detected: Option<ImageFormat>, destination: &Path) -> Result<Self, StripError> {
        match detected {
            Some(format) => Ok(format.into()),
            None => ImageFormat::from_path(destination)
                .map(Self::from)
                .map_err(|e| StripError::UnsupportedFormat(e.to_string())),
        }
    }
}

/// Re-encoded file contents, ready to be written.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// The native encoder refused the raster and PNG was written instead.
    pub fell_back_to_png: bool,
}

impl EncodedImage {
    /// File name to write under: the original, or its stem with `.png` after
    /// a fallback so the extension matches the contents.
    pub fn output_name(&self, original: &str) -> String {
        if !self.fell_back_to_png {
            return original.to_string();
        }
        let stem = Path::new(original)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(original);
        format!("{stem}.png")
    }
}

/// Encodes `decoded` for `target` without any metadata payload.
pub fn encode(
    decoded: DecodedImage,
    target: TargetFormat,
    options: &StripOptions,
) -> Result<EncodedImage, StripError> {
    let DecodedImage { raster, mode, .. } = decoded;
    match target {
        TargetFormat::Jpeg => Ok(EncodedImage {
            bytes: jpeg::encode(&raster, options.jpeg_quality)?,
            format: ImageFormat::Jpeg,
            fell_back_to_png: false,
        }),
        TargetFormat::Png => Ok(EncodedImage {
            bytes: png::encode(raster, mode)?,
            format: ImageFormat::Png,
            fell_back_to_png: false,
        }),
        TargetFormat::Other(format) => match encode_native(&raster, format) {
            Ok(bytes) => Ok(EncodedImage {
                bytes,
                format,
                fell_back_to_png: false,
            }),
            Err(err) => {
                debug!(?format, %err, "native encoder refused raster, writing PNG");
                let flattened = if mode.has_alpha() || mode == PixelMode::Palette {
                    DynamicImage::ImageRgba8(raster.into_rgba8())
                } else {
                    DynamicImage::ImageRgb8(raster.into_rgb8())
                };
                Ok(EncodedImage {
                    bytes: png::write(&flattened)?,
                    format: ImageFormat::Png,
                    fell_back_to_png: true,
                })
            }
        },
    }
}

fn encode_native(raster: &DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    raster.write_to(&mut Cursor::new(&mut bytes), format)?;
    Ok(bytes)
}
