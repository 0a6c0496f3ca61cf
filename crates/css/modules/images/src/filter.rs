use crate::{ImageError, encode_data_url};
use css_color::{FilterConfig, build_filter_matrix, scale};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder as _, RgbaImage};

const HIGH_QUALITY_PIXELS: f64 = 256.0 * 256.0;
const LOW_QUALITY_PIXELS: f64 = 1920.0 * 1080.0;

/// Run every pixel through the filter's color matrix and re-encode.
///
/// Images up to 256×256 become PNG; larger ones become JPEG whose quality
/// falls linearly towards full-HD size.
///
/// # Errors
/// Returns [`ImageError::Encode`] if the encoder rejects the buffer.
pub fn apply_filter_to_image(image: &RgbaImage, config: &FilterConfig) -> Result<String, ImageError> {
    let _span = tracing::debug_span!("apply_filter_to_image", width = image.width(), height = image.height()).entered();
    let matrix = build_filter_matrix(config);
    let mut filtered = image.clone();
    matrix.apply_to_pixels(&mut filtered);

    let (width, height) = filtered.dimensions();
    let pixels = f64::from(width) * f64::from(height);
    let mut buf = Vec::new();
    if pixels <= HIGH_QUALITY_PIXELS {
        PngEncoder::new(&mut buf)
            .write_image(filtered.as_raw(), width, height, image::ColorType::Rgba8.into())
            .map_err(ImageError::Encode)?;
        return Ok(encode_data_url("image/png", &buf));
    }

    let quality = scale(pixels, LOW_QUALITY_PIXELS, HIGH_QUALITY_PIXELS, 0.0, 1.0).clamp(0.0, 1.0);
    let quality = ((quality * 100.0).round() as u8).clamp(1, 100);
    log::debug!("encoding {width}x{height} filtered image as jpeg, quality {quality}");
    let rgb = DynamicImage::ImageRgba8(filtered).to_rgb8();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8.into())
        .map_err(ImageError::Encode)?;
    Ok(encode_data_url("image/jpeg", &buf))
}
