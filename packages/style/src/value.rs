//! # Style Values
//!
//! Typed intermediate representation of a single CSS value.
//!
//! Values that fall outside the supported subset are kept verbatim in
//! [`StyleValue::Unparsed`] so they survive a round trip untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::color::convert_color_space;

/// Tolerance used when comparing color channels semantically
pub const COLOR_TOLERANCE: f64 = 1e-2;

/// Tolerance used when comparing plain numbers semantically
pub const NUMBER_TOLERANCE: f64 = 1e-6;

/// A single CSS value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StyleValue {
    /// Dimension with one of the recognized length units
    Unit { value: f64, unit: LengthUnit },

    /// Unitless number
    Number { value: f64 },

    /// Identifier such as `block` or `inherit`
    Keyword { value: String },

    /// Color in one of the supported color spaces
    Color(Color),

    /// Custom property reference, `var(--name, fallback)`
    Var {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Box<StyleValue>>,
    },

    /// Space separated list (shorthands like `padding: 8px 16px`)
    Tuple { values: Vec<StyleValue> },

    /// Anything outside the supported subset, kept verbatim
    Unparsed { value: String },
}

impl StyleValue {
    pub fn unit(value: f64, unit: LengthUnit) -> Self {
        StyleValue::Unit { value, unit }
    }

    pub fn number(value: f64) -> Self {
        StyleValue::Number { value }
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        StyleValue::Keyword {
            value: value.into(),
        }
    }

    pub fn var(name: impl Into<String>, fallback: Option<StyleValue>) -> Self {
        StyleValue::Var {
            name: name.into(),
            fallback: fallback.map(Box::new),
        }
    }

    pub fn tuple(values: Vec<StyleValue>) -> Self {
        StyleValue::Tuple { values }
    }

    pub fn unparsed(value: impl Into<String>) -> Self {
        StyleValue::Unparsed {
            value: value.into(),
        }
    }

    /// Build a unit value from a raw unit string; unknown units degrade to `Unparsed`
    pub fn with_unit_str(value: f64, unit: &str, raw: &str) -> Self {
        match unit.parse::<LengthUnit>() {
            Ok(unit) => StyleValue::Unit { value, unit },
            Err(_) => StyleValue::unparsed(raw),
        }
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, StyleValue::Unparsed { .. })
    }

    /// Short name of the variant, matching the serde tag
    pub fn kind(&self) -> &'static str {
        match self {
            StyleValue::Unit { .. } => "unit",
            StyleValue::Number { .. } => "number",
            StyleValue::Keyword { .. } => "keyword",
            StyleValue::Color(_) => "color",
            StyleValue::Var { .. } => "var",
            StyleValue::Tuple { .. } => "tuple",
            StyleValue::Unparsed { .. } => "unparsed",
        }
    }

    /// Nesting depth of the value (scalars are depth 1)
    pub fn depth(&self) -> usize {
        match self {
            StyleValue::Var {
                fallback: Some(fallback),
                ..
            } => 1 + fallback.depth(),
            StyleValue::Tuple { values } => {
                1 + values.iter().map(StyleValue::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Semantic equality.
    ///
    /// Cross-type comparisons are unequal, numbers compare within
    /// [`NUMBER_TOLERANCE`], colors are converted into the same space and
    /// compared within [`COLOR_TOLERANCE`]. Keywords compare case-insensitively.
    pub fn approx_eq(&self, other: &StyleValue) -> bool {
        match (self, other) {
            (
                StyleValue::Unit { value: a, unit: ua },
                StyleValue::Unit { value: b, unit: ub },
            ) => ua == ub && (a - b).abs() < NUMBER_TOLERANCE,
            (StyleValue::Number { value: a }, StyleValue::Number { value: b }) => {
                (a - b).abs() < NUMBER_TOLERANCE
            }
            (StyleValue::Keyword { value: a }, StyleValue::Keyword { value: b }) => {
                a.eq_ignore_ascii_case(b)
            }
            (StyleValue::Color(a), StyleValue::Color(b)) => a.approx_eq(b),
            (
                StyleValue::Var {
                    name: na,
                    fallback: fa,
                },
                StyleValue::Var {
                    name: nb,
                    fallback: fb,
                },
            ) => {
                na == nb
                    && match (fa, fb) {
                        (Some(a), Some(b)) => a.approx_eq(b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (StyleValue::Tuple { values: a }, StyleValue::Tuple { values: b }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y))
            }
            (StyleValue::Unparsed { value: a }, StyleValue::Unparsed { value: b }) => {
                normalize_whitespace(a) == normalize_whitespace(b)
            }
            _ => false,
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The eight recognized length units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    #[serde(rename = "px")]
    Px,
    #[serde(rename = "rem")]
    Rem,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "vh")]
    Vh,
    #[serde(rename = "vw")]
    Vw,
    #[serde(rename = "vmin")]
    Vmin,
    #[serde(rename = "vmax")]
    Vmax,
}

impl LengthUnit {
    pub const ALL: [LengthUnit; 8] = [
        LengthUnit::Px,
        LengthUnit::Rem,
        LengthUnit::Em,
        LengthUnit::Percent,
        LengthUnit::Vh,
        LengthUnit::Vw,
        LengthUnit::Vmin,
        LengthUnit::Vmax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Rem => "rem",
            LengthUnit::Em => "em",
            LengthUnit::Percent => "%",
            LengthUnit::Vh => "vh",
            LengthUnit::Vw => "vw",
            LengthUnit::Vmin => "vmin",
            LengthUnit::Vmax => "vmax",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown unit: {0}")]
pub struct UnknownUnit(pub String);

impl FromStr for LengthUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LengthUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownUnit(s.to_string()))
    }
}

/// Supported color spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    Srgb,
    Hsl,
    Oklch,
    Oklab,
    DisplayP3,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 5] = [
        ColorSpace::Srgb,
        ColorSpace::Hsl,
        ColorSpace::Oklch,
        ColorSpace::Oklab,
        ColorSpace::DisplayP3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::Srgb => "srgb",
            ColorSpace::Hsl => "hsl",
            ColorSpace::Oklch => "oklch",
            ColorSpace::Oklab => "oklab",
            ColorSpace::DisplayP3 => "display-p3",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A color with three channels and an alpha in `[0, 1]`.
///
/// Channel conventions per space: `srgb`/`display-p3` are `0..1`,
/// `hsl` is `[hue°, s, l]` with `s`/`l` in `0..1`, `oklab` is `[L, a, b]`,
/// `oklch` is `[L, C, hue°]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    pub color_space: ColorSpace,
    pub channels: [f64; 3],
    pub alpha: f64,
}

impl Color {
    /// Alpha is clamped into `[0, 1]`; NaN alpha becomes opaque
    pub fn new(color_space: ColorSpace, channels: [f64; 3], alpha: f64) -> Self {
        Self {
            color_space,
            channels,
            alpha: clamp_alpha(alpha),
        }
    }

    pub fn srgb(r: f64, g: f64, b: f64, alpha: f64) -> Self {
        Self::new(ColorSpace::Srgb, [r, g, b], alpha)
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    pub fn convert(&self, target: ColorSpace) -> Color {
        convert_color_space(self, target)
    }

    pub fn approx_eq(&self, other: &Color) -> bool {
        if (self.alpha - other.alpha).abs() >= COLOR_TOLERANCE {
            return false;
        }
        // Hue is meaningless for achromatic colors, so compare in sRGB
        let a = self.convert(ColorSpace::Srgb);
        let b = other.convert(ColorSpace::Srgb);
        a.channels
            .iter()
            .zip(b.channels.iter())
            .all(|(x, y)| (x - y).abs() < COLOR_TOLERANCE)
    }
}

impl From<Color> for StyleValue {
    fn from(color: Color) -> Self {
        StyleValue::Color(color)
    }
}

pub(crate) fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() {
        1.0
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

// Deserialization goes through `Color::new` so wire input cannot bypass the alpha clamp
impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawColor {
            color_space: ColorSpace,
            channels: [f64; 3],
            #[serde(default = "default_alpha")]
            alpha: f64,
        }

        fn default_alpha() -> f64 {
            1.0
        }

        let raw = RawColor::deserialize(deserializer)?;
        Ok(Color::new(raw.color_space, raw.channels, raw.alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_is_clamped() {
        assert_eq!(Color::srgb(1.0, 0.0, 0.0, 1.7).alpha, 1.0);
        assert_eq!(Color::srgb(1.0, 0.0, 0.0, -0.2).alpha, 0.0);
        assert_eq!(Color::srgb(1.0, 0.0, 0.0, f64::NAN).alpha, 1.0);
    }

    #[test]
    fn test_deserialized_alpha_is_clamped() {
        let json = r#"{"type":"color","colorSpace":"srgb","channels":[1,0,0],"alpha":3}"#;
        let value: StyleValue = serde_json::from_str(json).unwrap();
        match value {
            StyleValue::Color(color) => assert_eq!(color.alpha, 1.0),
            other => panic!("Expected color, got {:?}", other),
        }
    }

    #[test]
    fn test_wire_format() {
        let value = StyleValue::var("--spacing", Some(StyleValue::unit(16.0, LengthUnit::Px)));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "var");
        assert_eq!(json["name"], "--spacing");
        assert_eq!(json["fallback"]["type"], "unit");
        assert_eq!(json["fallback"]["unit"], "px");

        let percent = serde_json::to_value(StyleValue::unit(50.0, LengthUnit::Percent)).unwrap();
        assert_eq!(percent["unit"], "%");

        let color = serde_json::to_value(StyleValue::Color(Color::new(
            ColorSpace::DisplayP3,
            [1.0, 0.0, 0.0],
            1.0,
        )))
        .unwrap();
        assert_eq!(color["colorSpace"], "display-p3");
    }

    #[test]
    fn test_cross_type_comparison_is_unequal() {
        let unit = StyleValue::unit(0.0, LengthUnit::Px);
        let number = StyleValue::number(0.0);
        assert_ne!(unit, number);
        assert!(!unit.approx_eq(&number));
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("PX".parse::<LengthUnit>(), Ok(LengthUnit::Px));
        assert_eq!("%".parse::<LengthUnit>(), Ok(LengthUnit::Percent));
        assert!("deg".parse::<LengthUnit>().is_err());
        assert!(StyleValue::with_unit_str(45.0, "deg", "45deg").is_unparsed());
    }

    #[test]
    fn test_approx_eq_colors_across_spaces() {
        let red = Color::srgb(1.0, 0.0, 0.0, 1.0);
        let red_hsl = Color::new(ColorSpace::Hsl, [0.0, 1.0, 0.5], 1.0);
        assert!(red.approx_eq(&red_hsl));
        assert!(!red.approx_eq(&Color::srgb(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_depth() {
        let nested = StyleValue::var(
            "--a",
            Some(StyleValue::var("--b", Some(StyleValue::number(1.0)))),
        );
        assert_eq!(nested.depth(), 3);
        assert_eq!(StyleValue::keyword("auto").depth(), 1);
    }
}
