use image::RgbaImage;

/// At most this many pixels are sampled.
const MAX_SAMPLED_PIXELS: f64 = 32.0 * 32.0;

const TRANSPARENT_ALPHA: f64 = 0.25;
const DARK_LIGHTNESS: f64 = 0.4;
const LIGHT_LIGHTNESS: f64 = 0.6;

const DARK_SHARE: f64 = 0.7;
const LIGHT_SHARE: f64 = 0.7;
const TRANSPARENT_SHARE: f64 = 0.1;

/// Brightness classification of an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageAnalysis {
    pub is_dark: bool,
    pub is_light: bool,
    pub is_transparent: bool,
    /// Natural size exceeds the configured pixel count.
    pub is_large: bool,
}

/// Classify an image from a nearest-neighbor downsample of at most 32×32
/// pixels, preserving aspect ratio.
///
/// Fully transparent images report neither dark nor light.
pub fn analyze_image(image: &RgbaImage, large_pixels: u64) -> ImageAnalysis {
    let (natural_width, natural_height) = image.dimensions();
    let natural_pixels = u64::from(natural_width) * u64::from(natural_height);
    if natural_pixels == 0 {
        return ImageAnalysis::default();
    }
    let _span = tracing::trace_span!("analyze_image", natural_width, natural_height).entered();

    let factor = (MAX_SAMPLED_PIXELS / natural_pixels as f64).sqrt().min(1.0);
    let width = ((f64::from(natural_width) * factor).round() as u32).max(1);
    let height = ((f64::from(natural_height) * factor).round() as u32).max(1);

    let mut transparent = 0u32;
    let mut dark = 0u32;
    let mut light = 0u32;
    for row in 0..height {
        let source_y = (u64::from(row) * u64::from(natural_height) / u64::from(height)) as u32;
        for column in 0..width {
            let source_x = (u64::from(column) * u64::from(natural_width) / u64::from(width)) as u32;
            let [red, green, blue, alpha] = image
                .get_pixel(source_x.min(natural_width - 1), source_y.min(natural_height - 1))
                .0;
            if f64::from(alpha) / 255.0 < TRANSPARENT_ALPHA {
                transparent += 1;
                continue;
            }
            let max = red.max(green).max(blue);
            let min = red.min(green).min(blue);
            let lightness = (f64::from(max) + f64::from(min)) / 2.0 / 255.0;
            if lightness < DARK_LIGHTNESS {
                dark += 1;
            }
            if lightness > LIGHT_LIGHTNESS {
                light += 1;
            }
        }
    }

    let total = f64::from(width * height);
    let opaque = total - f64::from(transparent);
    let share = |count: u32| if opaque > 0.0 { f64::from(count) / opaque } else { 0.0 };
    let analysis = ImageAnalysis {
        is_dark: share(dark) >= DARK_SHARE,
        is_light: share(light) >= LIGHT_SHARE,
        is_transparent: f64::from(transparent) / total >= TRANSPARENT_SHARE,
        is_large: natural_pixels > large_pixels,
    };
    log::trace!("image {natural_width}x{natural_height} analyzed as {analysis:?}");
    analysis
}
