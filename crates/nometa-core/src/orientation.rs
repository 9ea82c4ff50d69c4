use crate::StripError;
use crate::inspect::has_exif_block;
use image::DynamicImage;
use nom_exif::{EntryValue, ExifIter, ExifTag, MediaParser, MediaSource};
use std::io::Cursor;

/// EXIF orientation (tag 0x0112). The discriminant is the raw tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Mirror across the main diagonal.
    Transpose = 5,
    /// Stored rotated; displayed after a 90° clockwise turn.
    Rotate90Cw = 6,
    /// Mirror across the anti-diagonal.
    Transverse = 7,
    /// Stored rotated; displayed after a 90° counter-clockwise turn.
    Rotate90Ccw = 8,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90Cw,
            7 => Self::Transverse,
            8 => Self::Rotate90Ccw,
            _ => return None,
        })
    }

    /// Returns the raster as it should be displayed.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::FlipHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::FlipVertical => img.flipv(),
            Self::Transpose => img.rotate90().fliph(),
            Self::Rotate90Cw => img.rotate90(),
            Self::Transverse => img.rotate270().fliph(),
            Self::Rotate90Ccw => img.rotate270(),
        }
    }
}

/// Reads the primary-image orientation tag from raw file bytes.
///
/// `Ok(None)` when the file carries no EXIF block, no orientation tag, or a
/// value outside 1..=8. Parse failures come back as
/// [`StripError::OrientationRead`].
pub fn read_orientation(file_bytes: &[u8]) -> Result<Option<Orientation>, StripError> {
    if has_exif_block(file_bytes) == Some(false) {
        return Ok(None);
    }
    let media_source = MediaSource::seekable(Cursor::new(file_bytes))
        .map_err(|e| StripError::OrientationRead(format!("{e:?}")))?;

    if !media_source.has_exif() {
        return Ok(None);
    }

    let mut parser = MediaParser::new();
    let exif_iter: ExifIter = parser
        .parse(media_source)
        .map_err(|e| StripError::OrientationRead(format!("{e:?}")))?;

    // IFD1 describes the thumbnail; only IFD0 applies to the main image.
    let value = exif_iter
        .filter(|entry| entry.ifd_index() == 0 && entry.tag() == Some(ExifTag::Orientation))
        .find_map(|entry| match entry.get_value() {
            Some(EntryValue::U16(v)) => Some(u32::from(*v)),
            Some(EntryValue::U32(v)) => Some(*v),
            Some(EntryValue::U8(v)) => Some(u32::from(*v)),
            _ => None,
        });

    Ok(value.and_then(Orientation::from_exif))
}

/// Applies the file's orientation to `img`, treating unreadable metadata as
/// upright.
pub fn normalize(img: DynamicImage, orientation: Option<Orientation>) -> DynamicImage {
    match orientation {
        Some(orientation) => orientation.apply(img),
        None => img,
    }
}
