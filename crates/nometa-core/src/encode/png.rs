use crate::StripError;
use crate::decode::PixelMode;
use image::DynamicImage;
use std::borrow::Cow;

/// PNG policy: palette images become RGBA, everything else keeps its mode.
pub fn encode(raster: DynamicImage, mode: PixelMode) -> Result<Vec<u8>, StripError> {
    let raster = match mode {
        PixelMode::Palette => DynamicImage::ImageRgba8(raster.into_rgba8()),
        _ => raster,
    };
    write(&raster)
}

/// Writes `raster` as a PNG holding only IHDR, IDAT and IEND.
pub fn write(raster: &DynamicImage) -> Result<Vec<u8>, StripError> {
    use ::png::{BitDepth, ColorType};

    let (color, depth, data): (ColorType, BitDepth, Cow<'_, [u8]>) = match raster {
        DynamicImage::ImageLuma8(img) => {
            (ColorType::Grayscale, BitDepth::Eight, img.as_raw().into())
        }
        DynamicImage::ImageLumaA8(img) => {
            (ColorType::GrayscaleAlpha, BitDepth::Eight, img.as_raw().into())
        }
        DynamicImage::ImageRgb8(img) => (ColorType::Rgb, BitDepth::Eight, img.as_raw().into()),
        DynamicImage::ImageRgba8(img) => (ColorType::Rgba, BitDepth::Eight, img.as_raw().into()),
        DynamicImage::ImageLuma16(img) => {
            (ColorType::Grayscale, BitDepth::Sixteen, big_endian(img.as_raw()).into())
        }
        DynamicImage::ImageLumaA16(img) => {
            (ColorType::GrayscaleAlpha, BitDepth::Sixteen, big_endian(img.as_raw()).into())
        }
        DynamicImage::ImageRgb16(img) => {
            (ColorType::Rgb, BitDepth::Sixteen, big_endian(img.as_raw()).into())
        }
        DynamicImage::ImageRgba16(img) => {
            (ColorType::Rgba, BitDepth::Sixteen, big_endian(img.as_raw()).into())
        }
        // float rasters have no PNG representation
        other if other.color().has_alpha() => {
            (ColorType::Rgba, BitDepth::Eight, other.to_rgba8().into_raw().into())
        }
        other => (ColorType::Rgb, BitDepth::Eight, other.to_rgb8().into_raw().into()),
    };

    let encode_error = |e: ::png::EncodingError| StripError::Encode(e.to_string());
    let mut cleaned_bytes = Vec::new();
    {
        // Scope the encoder so its borrow of `cleaned_bytes` ends before we return it.
        let mut encoder = ::png::Encoder::new(&mut cleaned_bytes, raster.width(), raster.height());
        encoder.set_color(color);
        encoder.set_depth(depth);

        let mut writer = encoder.write_header().map_err(encode_error)?;
        writer.write_image_data(&data).map_err(encode_error)?;
        writer.finish().map_err(encode_error)?;
    }
    Ok(cleaned_bytes)
}

fn big_endian(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::inspect::png_chunk_names;
    use image::{GenericImageView, ImageFormat, Luma, Rgb};
    use std::io::Cursor;

    #[test]
    fn palette_source_becomes_rgba_without_ancillary_chunks() {
        let source = fixtures::palette_png_with_text();
        assert!(png_chunk_names(&source).unwrap().contains(&"tEXt".to_string()));

        let raster = image::load_from_memory_with_format(&source, ImageFormat::Png).unwrap();
        let cleaned = encode(raster, PixelMode::Palette).unwrap();

        let decoder = ::png::Decoder::new(Cursor::new(&cleaned));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.color_type, ::png::ColorType::Rgba);
        assert!(info.palette.is_none());
        assert!(info.trns.is_none());
        assert!(info.uncompressed_latin1_text.is_empty());
        assert_eq!(png_chunk_names(&cleaned).unwrap(), ["IHDR", "IDAT", "IEND"]);
    }

    #[test]
    fn palette_transparency_survives_as_alpha() {
        let source = fixtures::palette_png_with_text();
        let raster = image::load_from_memory_with_format(&source, ImageFormat::Png).unwrap();
        let cleaned = encode(raster, PixelMode::Palette).unwrap();
        let reread = image::load_from_memory_with_format(&cleaned, ImageFormat::Png).unwrap();
        assert_eq!(reread.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(reread.get_pixel(1, 0).0, [0, 0, 255, 64]);
    }

    #[test]
    fn direct_color_keeps_its_mode() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 1, Luma([9])));
        let cleaned = encode(gray, PixelMode::Gray).unwrap();
        let reader = ::png::Decoder::new(Cursor::new(&cleaned)).read_info().unwrap();
        assert_eq!(reader.info().color_type, ::png::ColorType::Grayscale);

        let deep = DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(
            1,
            1,
            Rgb([0x1234u16, 0, 0xFFFF]),
        ));
        let cleaned = encode(deep.clone(), PixelMode::Rgb).unwrap();
        let reread = image::load_from_memory_with_format(&cleaned, ImageFormat::Png).unwrap();
        assert_eq!(reread, deep);
    }
}
