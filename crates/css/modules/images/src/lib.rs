//! Raster image helpers for themed backgrounds: decoding, brightness
//! analysis and color-matrix filtering back into `data:` URLs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use core::fmt;
use image::RgbaImage;
use std::error::Error;

mod analysis;
mod filter;

pub use analysis::{ImageAnalysis, analyze_image};
pub use filter::apply_filter_to_image;

/// Errors produced while decoding or re-encoding images.
#[derive(Debug)]
pub enum ImageError {
    /// The bytes are not an image format we can decode.
    Decode(image::ImageError),
    /// Encoding the filtered pixels failed.
    Encode(image::ImageError),
    /// A `data:` URL was malformed.
    InvalidDataUrl(String),
    /// The payload of a base64 `data:` URL did not decode.
    Base64(base64::DecodeError),
}

impl fmt::Display for ImageError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(error) => write!(formatter, "Failed to decode image: {error}"),
            Self::Encode(error) => write!(formatter, "Failed to encode image: {error}"),
            Self::InvalidDataUrl(url) => {
                let prefix: String = url.chars().take(48).collect();
                write!(formatter, "Invalid data URL: {prefix}")
            }
            Self::Base64(error) => write!(formatter, "Invalid base64 payload: {error}"),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode(error) | Self::Encode(error) => Some(error),
            Self::Base64(error) => Some(error),
            Self::InvalidDataUrl(_) => None,
        }
    }
}

/// Decode PNG, JPEG or WebP bytes into RGBA pixels.
///
/// # Errors
/// Returns [`ImageError::Decode`] for unsupported or corrupt data.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    image::load_from_memory(bytes)
        .map(|decoded| decoded.to_rgba8())
        .map_err(ImageError::Decode)
}

/// Contents of a `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Parse `data:[<mime>][;base64],<payload>`.
///
/// # Errors
/// Fails when the scheme or comma is missing, or the payload does not decode.
pub fn decode_data_url(url: &str) -> Result<DataUrl, ImageError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::InvalidDataUrl(url.to_owned()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::InvalidDataUrl(url.to_owned()))?;
    let (mime_type, is_base64) = header
        .strip_suffix(";base64")
        .map_or((header, false), |mime| (mime, true));
    let bytes = if is_base64 {
        STANDARD.decode(payload.trim()).map_err(ImageError::Base64)?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };
    Ok(DataUrl {
        mime_type: mime_type.to_owned(),
        bytes,
    })
}

/// Build a base64 `data:` URL.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageEncoder as _, RgbaImage, codecs::png::PngEncoder};

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
    }

    pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8.into())
            .unwrap();
        buf
    }
}
