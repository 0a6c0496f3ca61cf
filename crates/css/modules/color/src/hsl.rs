//! RGB ↔ HSL conversion.
//! Reference: <https://www.w3.org/TR/css-color-4/#the-hsl-notation>

use crate::Rgba;

/// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsla {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    pub alpha: f64,
}

/// Convert an 8-bit RGB color to HSL. Alpha passes through unchanged.
#[must_use]
pub fn rgb_to_hsl(color: Rgba) -> Hsla {
    let red = f64::from(color.red) / 255.0;
    let green = f64::from(color.green) / 255.0;
    let blue = f64::from(color.blue) / 255.0;

    let max = red.max(green).max(blue);
    let min = red.min(green).min(blue);
    let chroma = max - min;
    let lightness = (max + min) / 2.0;

    if chroma.abs() < 1e-12 {
        return Hsla {
            hue: 0.0,
            saturation: 0.0,
            lightness,
            alpha: color.alpha,
        };
    }

    let hue_sector = if (max - red).abs() < f64::EPSILON {
        ((green - blue) / chroma).rem_euclid(6.0)
    } else if (max - green).abs() < f64::EPSILON {
        (blue - red) / chroma + 2.0
    } else {
        (red - green) / chroma + 4.0
    };
    let saturation = chroma / (1.0 - (2.0 * lightness - 1.0).abs());

    Hsla {
        hue: (hue_sector * 60.0).rem_euclid(360.0),
        saturation: saturation.clamp(0.0, 1.0),
        lightness,
        alpha: color.alpha,
    }
}

/// Convert HSL back to 8-bit RGB, rounding each channel to the nearest value.
#[must_use]
pub fn hsl_to_rgb(color: Hsla) -> Rgba {
    let hue = color.hue.rem_euclid(360.0);
    let saturation = color.saturation.clamp(0.0, 1.0);
    let lightness = color.lightness.clamp(0.0, 1.0);

    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let second = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let offset = lightness - chroma / 2.0;

    let (red, green, blue) = match hue {
        value if value < 60.0 => (chroma, second, 0.0),
        value if value < 120.0 => (second, chroma, 0.0),
        value if value < 180.0 => (0.0, chroma, second),
        value if value < 240.0 => (0.0, second, chroma),
        value if value < 300.0 => (second, 0.0, chroma),
        _ => (chroma, 0.0, second),
    };

    Rgba {
        red: to_channel(red + offset),
        green: to_channel(green + offset),
        blue: to_channel(blue + offset),
        alpha: color.alpha,
    }
}

#[inline]
fn to_channel(unit: f64) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(left: Rgba, right: Rgba) -> bool {
        left.red.abs_diff(right.red) <= 1
            && left.green.abs_diff(right.green) <= 1
            && left.blue.abs_diff(right.blue) <= 1
            && (left.alpha - right.alpha).abs() < 1e-9
    }

    #[test]
    fn round_trips_within_one_step() {
        for red in (0..=255).step_by(17) {
            for green in (0..=255).step_by(51) {
                for blue in (0..=255).step_by(85) {
                    let color = Rgba {
                        red,
                        green,
                        blue,
                        alpha: 0.4,
                    };
                    let back = hsl_to_rgb(rgb_to_hsl(color));
                    assert!(close(color, back), "{color:?} became {back:?}");
                }
            }
        }
    }

    #[test]
    fn primaries_have_expected_hues() {
        let red = rgb_to_hsl(Rgba::opaque(255, 0, 0));
        assert!((red.hue - 0.0).abs() < 1e-9);
        assert!((red.saturation - 1.0).abs() < 1e-9);
        assert!((red.lightness - 0.5).abs() < 1e-9);

        let blue = rgb_to_hsl(Rgba::opaque(0, 0, 255));
        assert!((blue.hue - 240.0).abs() < 1e-9);
    }

    #[test]
    fn grays_have_no_saturation() {
        let gray = rgb_to_hsl(Rgba::opaque(128, 128, 128));
        assert!(gray.saturation.abs() < 1e-12);
        assert_eq!(hsl_to_rgb(gray), Rgba::opaque(128, 128, 128));
    }
}
