//! CSS Color Module Level 4: color values, HSL conversion and theme remapping.
//! Reference: <https://www.w3.org/TR/css-color-4/>
//!
//! Everything here is pure color math. The only mutable state is the
//! [`ColorCache`], which memoizes parsing and remapping and may be cleared at
//! any time without changing any output.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::error::Error;
use csscolorparser::Color;

mod cache;
mod filter;
mod hsl;
mod matrix;
mod remap;

pub use cache::ColorCache;
pub use filter::{FilterConfig, ThemeMode};
pub use hsl::{Hsla, hsl_to_rgb, rgb_to_hsl};
pub use matrix::{ColorMatrix, build_filter_matrix};
pub use remap::{RemapKind, remap_background, remap_border, remap_foreground};

/// An sRGB color with 8-bit channels and a floating alpha in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f64,
}

impl Rgba {
    /// Opaque color from 8-bit channels.
    #[inline]
    #[must_use]
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// Hashable identity of the color, used as part of cache keys.
    #[inline]
    #[must_use]
    pub fn key(self) -> RgbaKey {
        RgbaKey(self.red, self.green, self.blue, self.alpha.to_bits())
    }
}

impl Display for Rgba {
    /// Opaque colors serialize as `#rrggbb`, translucent ones as `rgba()`.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.alpha >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        } else {
            let alpha = (self.alpha.max(0.0) * 1000.0).round() / 1000.0;
            write!(
                f,
                "rgba({}, {}, {}, {alpha})",
                self.red, self.green, self.blue
            )
        }
    }
}

/// Bit-exact identity of an [`Rgba`] value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgbaKey(u8, u8, u8, u64);

/// Raised when a string is not a recognizable CSS `<color>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorParseError {
    pub input: String,
}

impl Display for ColorParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Unable to parse color {:?}", self.input)
    }
}

impl Error for ColorParseError {}

/// Parse a CSS `<color>`.
///
/// Supports named colors, hex forms (`#rgb`/`#rgba`/`#rrggbb`/`#rrggbbaa`),
/// and functional notations like `rgb()/rgba()/hsl()/hsla()`.
///
/// Reference: <https://www.w3.org/TR/css-color-4/#typedef-color>
///
/// # Errors
/// Returns [`ColorParseError`] when the trimmed input is not a color.
pub fn parse_color(input: &str) -> Result<Rgba, ColorParseError> {
    let trimmed = input.trim();
    let parsed: Color = trimmed.parse().map_err(|_| ColorParseError {
        input: trimmed.to_owned(),
    })?;
    let channels = parsed.to_rgba8();
    Ok(Rgba {
        red: channels[0],
        green: channels[1],
        blue: channels[2],
        alpha: f64::from(parsed.a).clamp(0.0, 1.0),
    })
}

/// Linearly map `value` from `[from_low, from_high]` onto `[to_low, to_high]`.
#[inline]
#[must_use]
pub fn scale(value: f64, from_low: f64, from_high: f64, to_low: f64, to_high: f64) -> f64 {
    (value - from_low) * (to_high - to_low) / (from_high - from_low) + to_low
}
