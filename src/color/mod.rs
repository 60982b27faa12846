//! Accessible color engine
//!
//! Pure functions over sRGB colors: WCAG contrast, HSL-based adjustments and
//! a deterministic search for foreground colors that stay readable on a
//! given background. Nothing here performs I/O or keeps state.

mod adjust;
mod contrast;
mod named;
mod parse;
mod suggest;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use adjust::{complement, darken, desaturate, lighten, mix};
pub use contrast::{contrast, readable_color, relative_luminance};
pub use suggest::{
    best_accessible, best_accessible_color, suggest, suggest_colors, validate_contrast,
    validate_theme, ColorSuggestion, ContrastCheck, SuggestionMethod, ThemeValidation, WcagLevel,
    AAA_LARGE_TEXT, AAA_NORMAL_TEXT, AA_LARGE_TEXT, AA_NORMAL_TEXT, DEFAULT_SUGGESTION_COUNT,
};

#[derive(Debug, Error, PartialEq)]
pub enum ColorError {
    #[error("invalid color: '{0}'")]
    InvalidColor(String),
    #[error("contrast ratio must lie in [1, 21], got {0}")]
    InvalidRatio(f64),
}

/// An sRGB color with 8-bit channels and alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB`
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn alpha(self) -> f64 {
        f64::from(self.a) / 255.0
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            let alpha = (self.alpha() * 100.0).round() / 100.0;
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_color(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
