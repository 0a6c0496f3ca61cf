//! 5×5 affine color matrices (RGBA plus a translation column), composed the
//! same way as the CSS `filter` functions they mirror.
//! Reference: <https://www.w3.org/TR/filter-effects-1/#feColorMatrixElement>

use crate::FilterConfig;

/// Row-major affine color matrix applied to `[r, g, b, a, 1]` column vectors
/// with channels normalized to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMatrix(pub [[f64; 5]; 5]);

impl Default for ColorMatrix {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl ColorMatrix {
    #[must_use]
    pub const fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Inverts lightness and rotates hue by 180°, so hues survive inversion.
    #[must_use]
    pub const fn invert_hue() -> Self {
        Self([
            [0.333, -0.667, -0.667, 0.0, 1.0],
            [-0.667, 0.333, -0.667, 0.0, 1.0],
            [-0.667, -0.667, 0.333, 0.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub const fn brightness(amount: f64) -> Self {
        Self([
            [amount, 0.0, 0.0, 0.0, 0.0],
            [0.0, amount, 0.0, 0.0, 0.0],
            [0.0, 0.0, amount, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn contrast(amount: f64) -> Self {
        let shift = (1.0 - amount) / 2.0;
        Self([
            [amount, 0.0, 0.0, 0.0, shift],
            [0.0, amount, 0.0, 0.0, shift],
            [0.0, 0.0, amount, 0.0, shift],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn sepia(amount: f64) -> Self {
        let rest = 1.0 - amount;
        Self([
            [0.393 + 0.607 * rest, 0.769 - 0.769 * rest, 0.189 - 0.189 * rest, 0.0, 0.0],
            [0.349 - 0.349 * rest, 0.686 + 0.314 * rest, 0.168 - 0.168 * rest, 0.0, 0.0],
            [0.272 - 0.272 * rest, 0.534 - 0.534 * rest, 0.131 + 0.869 * rest, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn grayscale(amount: f64) -> Self {
        let rest = 1.0 - amount;
        Self([
            [0.2126 + 0.7874 * rest, 0.7152 - 0.7152 * rest, 0.0722 - 0.0722 * rest, 0.0, 0.0],
            [0.2126 - 0.2126 * rest, 0.7152 + 0.2848 * rest, 0.0722 - 0.0722 * rest, 0.0, 0.0],
            [0.2126 - 0.2126 * rest, 0.7152 - 0.7152 * rest, 0.0722 + 0.9278 * rest, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Standard matrix product `self × other`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut out = [[0.0; 5]; 5];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (column, cell) in out_row.iter_mut().enumerate() {
                *cell = (0..5)
                    .map(|index| self.0[row][index] * other.0[index][column])
                    .sum();
            }
        }
        Self(out)
    }

    /// Apply to an 8-bit RGB triple, clipping each channel to `[0, 255]`.
    #[must_use]
    pub fn apply_to_rgb(&self, rgb: [u8; 3]) -> [u8; 3] {
        let input = [
            f64::from(rgb[0]) / 255.0,
            f64::from(rgb[1]) / 255.0,
            f64::from(rgb[2]) / 255.0,
            1.0,
            1.0,
        ];
        let mut out = [0_u8; 3];
        for (channel, slot) in out.iter_mut().enumerate() {
            let value: f64 = self.0[channel]
                .iter()
                .zip(input.iter())
                .map(|(weight, component)| weight * component)
                .sum();
            *slot = (value * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Apply to a packed RGBA8 buffer in place. Alpha is left untouched.
    pub fn apply_to_pixels(&self, rgba: &mut [u8]) {
        for pixel in rgba.chunks_exact_mut(4) {
            let [red, green, blue] = self.apply_to_rgb([pixel[0], pixel[1], pixel[2]]);
            pixel[0] = red;
            pixel[1] = green;
            pixel[2] = blue;
        }
    }
}

/// Compose the matrix for a profile: grayscale, then sepia, then contrast
/// and brightness, then the inverting hue rotation in dark mode.
/// Neutral settings contribute nothing.
#[must_use]
pub fn build_filter_matrix(config: &FilterConfig) -> ColorMatrix {
    let mut matrix = ColorMatrix::identity();
    if config.grayscale != 0 {
        matrix = matrix.multiply(&ColorMatrix::grayscale(f64::from(config.grayscale) / 100.0));
    }
    if config.sepia != 0 {
        matrix = matrix.multiply(&ColorMatrix::sepia(f64::from(config.sepia) / 100.0));
    }
    if config.contrast != 100 {
        matrix = matrix.multiply(&ColorMatrix::contrast(f64::from(config.contrast) / 100.0));
    }
    if config.brightness != 100 {
        matrix = matrix.multiply(&ColorMatrix::brightness(f64::from(config.brightness) / 100.0));
    }
    if config.is_dark() {
        matrix = matrix.multiply(&ColorMatrix::invert_hue());
    }
    matrix
}
