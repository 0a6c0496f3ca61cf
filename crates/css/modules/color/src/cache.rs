//! Memoization for color parsing and remapping.

use core::cell::RefCell;
use std::collections::HashMap;

use log::trace;

use crate::{
    ColorParseError, FilterConfig, RemapKind, Rgba, RgbaKey, ThemeMode, build_filter_matrix,
    hsl_to_rgb, parse_color, rgb_to_hsl,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ModificationKey {
    remap: RemapKind,
    color: RgbaKey,
    config: FilterConfig,
}

/// Parse and remap caches shared by every rebuild of one theme session.
///
/// Purely an optimization: clearing it at any point yields identical output.
#[derive(Debug, Default)]
pub struct ColorCache {
    parsed: RefCell<HashMap<String, Rgba>>,
    modified: RefCell<HashMap<ModificationKey, String>>,
}

impl ColorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a color, memoized by the trimmed input text.
    ///
    /// # Errors
    /// Returns [`ColorParseError`] for unrecognized syntax. Failures are not cached.
    pub fn parse(&self, input: &str) -> Result<Rgba, ColorParseError> {
        let trimmed = input.trim();
        if let Some(color) = self.parsed.borrow().get(trimmed) {
            return Ok(*color);
        }
        let color = parse_color(trimmed)?;
        self.parsed.borrow_mut().insert(trimmed.to_owned(), color);
        Ok(color)
    }

    /// Like [`ColorCache::parse`] but for callers that treat failure as "not a color".
    #[inline]
    pub fn try_parse(&self, input: &str) -> Option<Rgba> {
        self.parse(input).ok()
    }

    /// Remap `color` through `remap` and the profile's matrix and serialize it.
    ///
    /// The remap curves run in both modes. The matrix never carries the
    /// inverting step here because the curves already produce dark output.
    pub fn modify(&self, color: Rgba, config: &FilterConfig, remap: RemapKind) -> String {
        let key = ModificationKey {
            remap,
            color: color.key(),
            config: *config,
        };
        if let Some(cached) = self.modified.borrow().get(&key) {
            return cached.clone();
        }

        let remapped = hsl_to_rgb(remap.apply(rgb_to_hsl(color)));
        let matrix = build_filter_matrix(&config.with_mode(ThemeMode::Light));
        let [red, green, blue] = matrix.apply_to_rgb([remapped.red, remapped.green, remapped.blue]);
        let output = Rgba {
            red,
            green,
            blue,
            alpha: remapped.alpha,
        }
        .to_string();
        trace!("{remap:?} {color:?} -> {output}");

        self.modified.borrow_mut().insert(key, output.clone());
        output
    }

    /// Drop every memoized entry.
    pub fn clear(&self) {
        self.parsed.borrow_mut().clear();
        self.modified.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsed.borrow().len() + self.modified.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
