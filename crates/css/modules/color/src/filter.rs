use serde::{Deserialize, Serialize};

/// Whether the page is being darkened or only adjusted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

/// The user's appearance profile. Percentages: `100` is neutral for
/// brightness and contrast, `0` is neutral for grayscale and sepia.
///
/// Equality over these five fields is the identity used by every cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: ThemeMode,
    pub brightness: u16,
    pub contrast: u16,
    pub grayscale: u16,
    pub sepia: u16,
}

impl Default for FilterConfig {
    #[inline]
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            brightness: 100,
            contrast: 100,
            grayscale: 0,
            sepia: 0,
        }
    }
}

impl FilterConfig {
    #[inline]
    #[must_use]
    pub const fn with_mode(self, mode: ThemeMode) -> Self {
        Self { mode, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_sepia(self, sepia: u16) -> Self {
        Self { sepia, ..self }
    }

    #[inline]
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }
}
