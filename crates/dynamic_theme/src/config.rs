//! Engine tunables and user-facing theme options.
//!
//! Engine settings can be loaded from environment variables or constructed
//! programmatically; theme options are a partial profile merged over the
//! default [`FilterConfig`].

use css_color::{FilterConfig, ThemeMode};
use serde::{Deserialize, Serialize};
use std::env;

/// Natural pixel count above which a light background image is treated as a
/// photo and suppressed instead of dimmed.
pub const DEFAULT_LARGE_IMAGE_PIXELS: u64 = 800 * 600;

/// Runtime configuration of the theme engine itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Oversized-image cutoff in natural pixels.
    pub large_image_pixels: u64,
    /// Whether `url()` images are loaded and classified at all.
    pub analyze_images: bool,
    /// Whether the generated sheet is pretty-printed before injection.
    pub debug_css: bool,
}

impl Default for EngineConfig {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_LARGE_IMAGE_PIXELS, true, false)
    }
}

impl EngineConfig {
    /// Construct an `EngineConfig` with explicit values.
    ///
    /// # Arguments
    ///
    /// * `large_image_pixels` - Oversized-image cutoff (minimum 1)
    /// * `analyze_images` - Whether background bitmaps are analyzed
    /// * `debug_css` - Whether the generated sheet is pretty-printed
    #[inline]
    #[must_use]
    pub const fn new(large_image_pixels: u64, analyze_images: bool, debug_css: bool) -> Self {
        let cutoff = if large_image_pixels < 1 {
            1
        } else {
            large_image_pixels
        };
        Self {
            large_image_pixels: cutoff,
            analyze_images,
            debug_css,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `DYNAMIC_THEME_LARGE_IMAGE_PIXELS`: oversized-image cutoff (default: 480000)
    /// - `DYNAMIC_THEME_ANALYZE_IMAGES`: set to "0" to leave `url()` images untouched
    /// - `DYNAMIC_THEME_DEBUG_CSS`: set to "1" to pretty-print the generated sheet
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let large_image_pixels = env::var("DYNAMIC_THEME_LARGE_IMAGE_PIXELS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LARGE_IMAGE_PIXELS);
        let analyze_images = env::var("DYNAMIC_THEME_ANALYZE_IMAGES").map_or(true, |val| val != "0");
        let debug_css = env::var("DYNAMIC_THEME_DEBUG_CSS").is_ok_and(|val| val == "1");
        Self::new(large_image_pixels, analyze_images, debug_css)
    }
}

/// A partial appearance profile; unset fields fall back to the defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeOptions {
    pub mode: Option<ThemeMode>,
    pub brightness: Option<u16>,
    pub contrast: Option<u16>,
    pub grayscale: Option<u16>,
    pub sepia: Option<u16>,
}

impl ThemeOptions {
    /// Merge over [`FilterConfig::default`].
    #[must_use]
    pub fn resolve(&self) -> FilterConfig {
        let defaults = FilterConfig::default();
        FilterConfig {
            mode: self.mode.unwrap_or(defaults.mode),
            brightness: self.brightness.unwrap_or(defaults.brightness),
            contrast: self.contrast.unwrap_or(defaults.contrast),
            grayscale: self.grayscale.unwrap_or(defaults.grayscale),
            sepia: self.sepia.unwrap_or(defaults.sepia),
        }
    }
}
