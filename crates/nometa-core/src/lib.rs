// crates/nometa-core/src/lib.rs

pub mod batch;
pub mod collect;
pub mod decode;
pub mod encode;
pub mod inspect;
pub mod naming;
pub mod orientation;

#[cfg(test)]
mod fixtures;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use batch::{BatchEvent, BatchHandle, BatchResult, BatchRunner, CancelFlag, Progress};
pub use collect::{AddOutcome, FileList, ImagePath, PathCollector, split_drop_payload};
pub use decode::{DecodedImage, PixelMode};
pub use encode::{EncodedImage, StripOptions, TargetFormat};
pub use inspect::{MetadataEntry, inspect_metadata};
pub use orientation::Orientation;

/// Extensions (lowercase, without the dot) accepted during discovery.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"];

/// A universal error type for all stripping operations.
#[derive(Error, Debug)]
pub enum StripError {
    #[error("Cannot read {}: {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("Cannot decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Unreadable orientation metadata: {0}")]
    OrientationRead(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("File parsing failed: {0}")]
    Parsing(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot write {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch worker stopped before reporting a result")]
    WorkerStopped,
}

impl StripError {
    /// Errors that are logged and skipped instead of failing a file or a run.
    ///
    /// Discovery errors drop one input entry; orientation read errors mean the
    /// image is treated as upright.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::Discovery { .. } | Self::OrientationRead(_))
    }
}

/// Decodes `src`, turns it upright and re-encodes it without metadata.
///
/// This is the main entry point for single files; nothing is written.
pub fn strip_metadata(src: &Path, options: &StripOptions) -> Result<EncodedImage, StripError> {
    let mut decoded = DecodedImage::open(src)?;
    let target = TargetFormat::resolve(decoded.format, src)?;
    decoded.raster = orientation::normalize(decoded.raster, decoded.orientation);
    encode::encode(decoded, target, options)
}

/// Strips `src` and writes the result into `output_dir` under its original
/// file name, or the next free `name(n).ext`. Returns the written path.
pub fn strip_metadata_and_save(
    src: &Path,
    output_dir: &Path,
    options: &StripOptions,
) -> Result<PathBuf, StripError> {
    let encoded = strip_metadata(src, options)?;
    let original = src
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    naming::write_unique(output_dir, &encoded.output_name(&original), &encoded.bytes)
}

pub(crate) fn extension_of(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub(crate) fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_effort_categories() {
        assert!(StripError::OrientationRead("bad ifd".into()).is_best_effort());
        assert!(
            StripError::Discovery {
                path: "x".into(),
                message: "denied".into()
            }
            .is_best_effort()
        );
        assert!(!StripError::Encode("nope".into()).is_best_effort());
        assert!(
            !StripError::Decode {
                path: "x.jpg".into(),
                message: "eof".into()
            }
            .is_best_effort()
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(
            extension_of(std::path::Path::new("a/B.JPeG")).as_deref(),
            Some("jpeg")
        );
        assert_eq!(extension_of(std::path::Path::new("noext")), None);
        assert!(is_image_extension("webp"));
        assert!(!is_image_extension("txt"));
    }
}
