use crate::StripError;
use crate::orientation::{Orientation, read_orientation};
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Channel layout of the source before the decoder expanded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    /// Indexed colour (PNG palette, GIF).
    Palette,
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PixelMode {
    pub fn has_alpha(self) -> bool {
        matches!(self, Self::GrayAlpha | Self::Rgba)
    }

    fn detect(format: Option<ImageFormat>, file_bytes: &[u8], raster: &DynamicImage) -> Self {
        match format {
            Some(ImageFormat::Gif) => return Self::Palette,
            Some(ImageFormat::Png) if is_indexed_png(file_bytes) => return Self::Palette,
            _ => {}
        }
        match raster.color() {
            ColorType::L8 | ColorType::L16 => Self::Gray,
            ColorType::La8 | ColorType::La16 => Self::GrayAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => Self::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => Self::Rgba,
            other if other.has_alpha() => Self::Rgba,
            _ => Self::Rgb,
        }
    }
}

fn is_indexed_png(file_bytes: &[u8]) -> bool {
    png::Decoder::new(Cursor::new(file_bytes))
        .read_info()
        .is_ok_and(|reader| reader.info().color_type == png::ColorType::Indexed)
}

/// A source image held in memory for one trip through the pipeline.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub raster: DynamicImage,
    /// Format detected from the file contents, if any.
    pub format: Option<ImageFormat>,
    pub mode: PixelMode,
    pub orientation: Option<Orientation>,
}

impl DecodedImage {
    pub fn open(path: &Path) -> Result<Self, StripError> {
        let file_bytes = std::fs::read(path).map_err(|e| StripError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_bytes(&file_bytes, path)
    }

    /// Decodes `file_bytes`; `path` supplies the extension when the contents
    /// do not identify the format.
    pub fn from_bytes(file_bytes: &[u8], path: &Path) -> Result<Self, StripError> {
        let decode_error = |message: String| StripError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = ImageReader::new(Cursor::new(file_bytes))
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?;
        let format = reader.format();
        if format.is_none() {
            if let Ok(by_extension) = ImageFormat::from_path(path) {
                reader.set_format(by_extension);
            }
        }
        let raster = reader.decode().map_err(|e| decode_error(e.to_string()))?;

        let orientation = match read_orientation(file_bytes) {
            Ok(orientation) => orientation,
            Err(err) => {
                debug!(path = %path.display(), %err, "treating image as upright");
                None
            }
        };

        Ok(Self {
            mode: PixelMode::detect(format, file_bytes, &raster),
            raster,
            format,
            orientation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn palette_png_is_reported_as_palette() {
        let bytes = fixtures::palette_png_with_text();
        let decoded = DecodedImage::from_bytes(&bytes, Path::new("p.png")).unwrap();
        assert_eq!(decoded.format, Some(ImageFormat::Png));
        assert_eq!(decoded.mode, PixelMode::Palette);
        assert_eq!(decoded.orientation, None);
    }

    #[test]
    fn rgba_png_keeps_alpha_mode() {
        let bytes = fixtures::rgba_png(3, 3, 128);
        let decoded = DecodedImage::from_bytes(&bytes, Path::new("a.png")).unwrap();
        assert_eq!(decoded.mode, PixelMode::Rgba);
        assert!(decoded.mode.has_alpha());
    }

    #[test]
    fn jpeg_orientation_is_captured() {
        let bytes = fixtures::jpeg_with_orientation(8, 4, 6);
        let decoded = DecodedImage::from_bytes(&bytes, Path::new("x.jpg")).unwrap();
        assert_eq!(decoded.format, Some(ImageFormat::Jpeg));
        assert_eq!(decoded.mode, PixelMode::Rgb);
        assert_eq!(decoded.orientation, Some(Orientation::Rotate90Cw));
    }

    #[test]
    fn malformed_exif_is_treated_as_upright() {
        let bytes = fixtures::jpeg_with_broken_exif(6, 4);
        assert_eq!(crate::inspect::has_exif_block(&bytes), Some(true));

        let decoded = DecodedImage::from_bytes(&bytes, Path::new("broken.jpg")).unwrap();
        assert_eq!(decoded.format, Some(ImageFormat::Jpeg));
        assert_eq!(decoded.orientation, None);
        assert_eq!((decoded.raster.width(), decoded.raster.height()), (6, 4));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let err = DecodedImage::from_bytes(b"\xFF\xD8garbage", Path::new("bad.jpg")).unwrap_err();
        assert!(matches!(err, StripError::Decode { .. }));
        assert!(!err.is_best_effort());
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DecodedImage::open(&dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, StripError::Decode { .. }));
    }
}
