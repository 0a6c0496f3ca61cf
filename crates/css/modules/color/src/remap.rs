//! Lightness remap curves used to turn a light page into a dark one while
//! keeping text readable on its background and borders visible.

use crate::{Hsla, scale};

/// Which curve a declaration's color goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemapKind {
    Background,
    Foreground,
    Border,
}

impl RemapKind {
    #[inline]
    #[must_use]
    pub fn apply(self, color: Hsla) -> Hsla {
        match self {
            Self::Background => remap_background(color),
            Self::Foreground => remap_foreground(color),
            Self::Border => remap_border(color),
        }
    }
}

/// Saturation below which a color counts as neutral.
const NEUTRAL_SATURATION_LIMIT: f64 = 0.2;

/// Background curve.
///
/// Lightness below a saturation-dependent ceiling (0.2 at no saturation,
/// 0.4 at full saturation) is kept; anything lighter is folded down towards
/// 0.1. Neutral colors get a muted blue so large dark areas don't look muddy.
#[must_use]
pub fn remap_background(color: Hsla) -> Hsla {
    const FLOOR: f64 = 0.1;
    let ceiling = scale(color.saturation, 0.0, 1.0, 0.2, 0.4);
    let lightness = if color.lightness < ceiling {
        color.lightness
    } else {
        scale(color.lightness, ceiling, 1.0, ceiling, FLOOR)
    };

    let (hue, saturation) = if color.saturation < NEUTRAL_SATURATION_LIMIT {
        (220.0, 0.1)
    } else {
        (color.hue, color.saturation)
    };

    Hsla {
        hue,
        saturation,
        lightness,
        alpha: color.alpha,
    }
}

/// Foreground curve: dark text is lifted into the `[0.6, 0.8]` band.
/// Neutral text gets a warm tint.
#[must_use]
pub fn remap_foreground(color: Hsla) -> Hsla {
    const CEILING: f64 = 0.8;
    let floor = scale(color.saturation, 0.0, 1.0, 0.6, 0.6);
    let lightness = if color.lightness < CEILING {
        scale(color.lightness, 0.0, floor, CEILING, floor)
    } else {
        color.lightness
    };

    let (hue, saturation) = if color.saturation < NEUTRAL_SATURATION_LIMIT {
        (40.0, 0.16)
    } else {
        (color.hue, color.saturation)
    };

    Hsla {
        hue,
        saturation,
        lightness,
        alpha: color.alpha,
    }
}

/// Border curve: lightness is inverted into a band whose floor (0.2 → 0.3)
/// and ceiling (0.4 → 0.5) both rise with saturation. Hue and saturation
/// are kept.
#[must_use]
pub fn remap_border(color: Hsla) -> Hsla {
    let floor = scale(color.saturation, 0.0, 1.0, 0.2, 0.3);
    let ceiling = scale(color.saturation, 0.0, 1.0, 0.4, 0.5);
    Hsla {
        lightness: scale(color.lightness, 0.0, 1.0, ceiling, floor),
        ..color
    }
}
