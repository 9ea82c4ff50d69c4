//! Read-only metadata listing, used by `nometa view` and to check that
//! cleaned files really are clean.

use crate::StripError;
use nom_exif::{ExifIter, MediaParser, MediaSource};
use std::io::Cursor;

/// Represents a single piece of metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    pub category: String, // e.g., "EXIF", "GPS", "PNG text"
}

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Lists every metadata item found in `file_bytes`.
///
/// EXIF entries are reported tag by tag. For JPEG, any other APPn or comment
/// segment is reported whole; for PNG, every ancillary chunk is.
pub fn inspect_metadata(file_bytes: &[u8]) -> Result<Vec<MetadataEntry>, StripError> {
    let mut entries = exif_entries(file_bytes)?;

    if file_bytes.starts_with(&PNG_SIGNATURE) {
        entries.extend(png_entries(file_bytes)?);
    } else if file_bytes.starts_with(&[0xFF, 0xD8]) {
        entries.extend(jpeg_entries(file_bytes));
    }
    Ok(entries)
}

/// Whether the container holds an EXIF block, for the formats where that can
/// be told from the chunk/segment layout. `None` means "ask the parser".
pub(crate) fn has_exif_block(file_bytes: &[u8]) -> Option<bool> {
    if file_bytes.starts_with(&PNG_SIGNATURE) {
        return Some(
            png_chunk_names(file_bytes).is_ok_and(|names| names.iter().any(|n| n == "eXIf")),
        );
    }
    if file_bytes.starts_with(&[0xFF, 0xD8]) {
        return Some(jpeg_segments(file_bytes).into_iter().any(|(marker, start, length)| {
            marker == 0xE1 && file_bytes[start + 4..start + 2 + length].starts_with(b"Exif\0\0")
        }));
    }
    None
}

fn exif_entries(file_bytes: &[u8]) -> Result<Vec<MetadataEntry>, StripError> {
    let known = has_exif_block(file_bytes);
    if known == Some(false) {
        return Ok(Vec::new());
    }
    // Formats nom-exif does not know simply have no EXIF to report.
    let Ok(media_source) = MediaSource::seekable(Cursor::new(file_bytes)) else {
        return Ok(Vec::new());
    };
    if !media_source.has_exif() {
        return Ok(Vec::new());
    }

    let mut parser = MediaParser::new();
    let exif_iter: ExifIter = match parser.parse(media_source) {
        Ok(iter) => iter,
        // Without a confirmed EXIF block a parse failure just means there is none.
        Err(_) if known.is_none() => return Ok(Vec::new()),
        Err(e) => return Err(StripError::Parsing(format!("Failed to parse EXIF: {e:?}"))),
    };

    Ok(exif_iter
        .map(|entry| {
            let key = match entry.tag() {
                Some(tag) => format!("{tag:?}"),
                None => "<Unknown Tag>".to_string(),
            };
            let category = match entry.ifd_index() {
                0 => "IFD0".to_string(),
                1 => "IFD1".to_string(),
                2 => "EXIF".to_string(),
                3 => "GPS".to_string(),
                4 => "Interop".to_string(),
                n => format!("IFD_{n}"),
            };
            let value = match entry.get_value() {
                Some(value) => format!("{value:?}"),
                None => "<No Value>".to_string(),
            };
            MetadataEntry {
                key,
                value,
                category,
            }
        })
        .collect())
}

fn png_entries(file_bytes: &[u8]) -> Result<Vec<MetadataEntry>, StripError> {
    let reader = png::Decoder::new(Cursor::new(file_bytes))
        .read_info()
        .map_err(|e| StripError::Parsing(e.to_string()))?;
    let info = reader.info();

    let mut entries: Vec<MetadataEntry> = info
        .uncompressed_latin1_text
        .iter()
        .map(|chunk| (chunk.keyword.clone(), chunk.text.clone()))
        .chain(
            info.compressed_latin1_text
                .iter()
                .map(|chunk| (chunk.keyword.clone(), chunk.get_text().unwrap_or_default())),
        )
        .chain(
            info.utf8_text
                .iter()
                .map(|chunk| (chunk.keyword.clone(), chunk.get_text().unwrap_or_default())),
        )
        .map(|(key, value)| MetadataEntry {
            key,
            value,
            category: "PNG text".to_string(),
        })
        .collect();

    for name in png_chunk_names(file_bytes)? {
        let ancillary = name.as_bytes()[0].is_ascii_lowercase();
        let textual = matches!(name.as_str(), "tEXt" | "zTXt" | "iTXt");
        if ancillary && !textual {
            entries.push(MetadataEntry {
                key: name,
                value: String::new(),
                category: "PNG chunk".to_string(),
            });
        }
    }
    Ok(entries)
}

/// Chunk type names of a PNG stream, in file order.
pub fn png_chunk_names(file_bytes: &[u8]) -> Result<Vec<String>, StripError> {
    if !file_bytes.starts_with(&PNG_SIGNATURE) {
        return Err(StripError::UnsupportedFormat("Not a valid PNG file.".to_string()));
    }
    let mut names = Vec::new();
    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= file_bytes.len() {
        let length = u32::from_be_bytes([
            file_bytes[offset],
            file_bytes[offset + 1],
            file_bytes[offset + 2],
            file_bytes[offset + 3],
        ]) as usize;
        let name = String::from_utf8_lossy(&file_bytes[offset + 4..offset + 8]).into_owned();
        let is_end = name == "IEND";
        names.push(name);
        if is_end {
            break;
        }
        // length + type + data + crc
        offset = offset.saturating_add(12).saturating_add(length);
    }
    Ok(names)
}

fn jpeg_entries(file_bytes: &[u8]) -> Vec<MetadataEntry> {
    jpeg_segments(file_bytes)
        .into_iter()
        .filter_map(|(marker, start, length)| {
            let body = &file_bytes[start + 4..start + 2 + length];
            let key = match marker {
                0xE0 if body.starts_with(b"JFIF\0") => return None,
                0xE1 if body.starts_with(b"Exif\0\0") => return None,
                0xE1 if body.starts_with(b"http://ns.adobe.com/xap/1.0/\0") => "XMP".to_string(),
                0xE2 if body.starts_with(b"ICC_PROFILE\0") => "ICC profile".to_string(),
                0xED => "IPTC / Photoshop".to_string(),
                0xFE => "Comment".to_string(),
                m => format!("APP{}", m - 0xE0),
            };
            Some(MetadataEntry {
                key,
                value: format!("{} bytes", length - 2),
                category: "JPEG segment".to_string(),
            })
        })
        .collect()
}

/// APPn (0xE0..=0xEF) and COM segments before the scan data, as
/// (marker, start offset, length field value).
fn jpeg_segments(file_bytes: &[u8]) -> Vec<(u8, usize, usize)> {
    let mut segments = Vec::new();
    let mut offset = 2; // Skip the SOI marker
    while offset + 4 <= file_bytes.len() {
        if file_bytes[offset] != 0xFF {
            break;
        }
        let marker = file_bytes[offset + 1];

        // Standalone markers have no length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            offset += 2;
            continue;
        }
        // Start of scan or end of image: no more metadata
        if marker == 0xD9 || marker == 0xDA {
            break;
        }

        let length = u16::from_be_bytes([file_bytes[offset + 2], file_bytes[offset + 3]]) as usize;
        if length < 2 || offset + 2 + length > file_bytes.len() {
            break;
        }
        if (0xE0..=0xEF).contains(&marker) || marker == 0xFE {
            segments.push((marker, offset, length));
        }
        offset += 2 + length;
    }
    segments
}
