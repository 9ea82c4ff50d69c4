use crate::StripError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Encodes `raster` as a baseline JPEG. Only the JFIF header is written; no
/// EXIF, ICC or comment segments.
pub fn encode(raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, StripError> {
    let rgb = flatten(raster);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|e| StripError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Three-channel version of `raster`. Transparent pixels are composited over
/// white since JPEG cannot carry alpha.
pub fn flatten(raster: &DynamicImage) -> RgbImage {
    if raster.color().has_alpha() {
        composite_over_white(&raster.to_rgba8())
    } else {
        raster.to_rgb8()
    }
}

pub fn composite_over_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

fn blend(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u32::from(channel), u32::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
