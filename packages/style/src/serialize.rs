//! # Style Value Serializer
//!
//! Turns a [`StyleValue`] back into CSS text. `parse(serialize(v))` gives back
//! `v` up to numeric rounding.

use serde::{Deserialize, Serialize};

use crate::value::{Color, ColorSpace, StyleValue};

pub const DEFAULT_PRECISION: u8 = 4;

/// Output form for colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorFormat {
    Hex,
    Rgb,
    Hsl,
    Oklch,
    Oklab,
    DisplayP3,
}

impl ColorFormat {
    /// Default output form for a color: hex for opaque sRGB, `rgb()` for
    /// translucent sRGB, the native function for every other space
    pub fn default_for(color: &Color) -> Self {
        match color.color_space {
            ColorSpace::Srgb if color.is_opaque() => ColorFormat::Hex,
            ColorSpace::Srgb => ColorFormat::Rgb,
            ColorSpace::Hsl => ColorFormat::Hsl,
            ColorSpace::Oklch => ColorFormat::Oklch,
            ColorSpace::Oklab => ColorFormat::Oklab,
            ColorSpace::DisplayP3 => ColorFormat::DisplayP3,
        }
    }

    fn space(&self) -> ColorSpace {
        match self {
            ColorFormat::Hex | ColorFormat::Rgb => ColorSpace::Srgb,
            ColorFormat::Hsl => ColorSpace::Hsl,
            ColorFormat::Oklch => ColorSpace::Oklch,
            ColorFormat::Oklab => ColorSpace::Oklab,
            ColorFormat::DisplayP3 => ColorSpace::DisplayP3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerializeOptions {
    /// Maximum number of decimals written for any number
    pub precision: u8,

    /// Force every color into this format
    pub color_format: Option<ColorFormat>,

    /// Collapse four-value tuples into shorthand form
    pub collapse_shorthand: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            color_format: None,
            collapse_shorthand: false,
        }
    }
}

impl SerializeOptions {
    pub fn with_color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_shorthand_collapse(mut self) -> Self {
        self.collapse_shorthand = true;
        self
    }
}

/// Serialize with default options
pub fn serialize(value: &StyleValue) -> String {
    serialize_with(value, &SerializeOptions::default())
}

pub fn serialize_with(value: &StyleValue, options: &SerializeOptions) -> String {
    let precision = options.precision as usize;
    match value {
        StyleValue::Unit { value, unit } => format!("{}{}", format_number(*value, precision), unit),
        StyleValue::Number { value } => format_number(*value, precision),
        StyleValue::Keyword { value } => value.clone(),
        StyleValue::Color(color) => serialize_color(color, options),
        StyleValue::Var { name, fallback } => match fallback {
            Some(fallback) => format!("var({}, {})", name, serialize_with(fallback, options)),
            None => format!("var({})", name),
        },
        StyleValue::Tuple { values } => {
            let parts: Vec<String> = values.iter().map(|v| serialize_with(v, options)).collect();
            if options.collapse_shorthand {
                collapse_box_shorthand(parts).join(" ")
            } else {
                parts.join(" ")
            }
        }
        StyleValue::Unparsed { value } => value.clone(),
    }
}

/// Collapse `[top, right, bottom, left]` into the shortest equivalent form
pub fn collapse_box_shorthand(parts: Vec<String>) -> Vec<String> {
    if parts.len() != 4 {
        return parts;
    }
    let (top, right, bottom, left) = (&parts[0], &parts[1], &parts[2], &parts[3]);

    if top == right && right == bottom && bottom == left {
        vec![top.clone()]
    } else if top == bottom && right == left {
        vec![top.clone(), right.clone()]
    } else if right == left {
        vec![top.clone(), right.clone(), bottom.clone()]
    } else {
        parts
    }
}

pub fn serialize_color(color: &Color, options: &SerializeOptions) -> String {
    let format = options
        .color_format
        .unwrap_or_else(|| ColorFormat::default_for(color));
    let color = color.convert(format.space());
    // Hex cannot carry out-of-gamut sRGB channels
    let format = match format {
        ColorFormat::Hex if !in_unit_range(&color.channels) => ColorFormat::Rgb,
        format => format,
    };
    let precision = options.precision as usize;
    let num = |v: f64| format_number(v, precision);
    let alpha = if color.is_opaque() {
        String::new()
    } else {
        format!(" / {}", num(color.alpha))
    };
    let [a, b, c] = color.channels;

    match format {
        ColorFormat::Hex => {
            let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            let mut hex = format!("#{:02x}{:02x}{:02x}", byte(a), byte(b), byte(c));
            if !color.is_opaque() {
                hex.push_str(&format!("{:02x}", byte(color.alpha)));
            }
            hex
        }
        ColorFormat::Rgb => format!("rgb({} {} {}{})", num(a * 255.0), num(b * 255.0), num(c * 255.0), alpha),
        ColorFormat::Hsl => format!("hsl({} {}% {}%{})", num(a), num(b * 100.0), num(c * 100.0), alpha),
        ColorFormat::Oklch => format!("oklch({} {} {}{})", num(a), num(b), num(c), alpha),
        ColorFormat::Oklab => format!("oklab({} {} {}{})", num(a), num(b), num(c), alpha),
        ColorFormat::DisplayP3 => format!("color(display-p3 {} {} {}{})", num(a), num(b), num(c), alpha),
    }
}

fn in_unit_range(channels: &[f64; 3]) -> bool {
    const EPSILON: f64 = 1e-9;
    channels.iter().all(|v| (-EPSILON..=1.0 + EPSILON).contains(v))
}

/// Round to `precision` decimals and strip trailing zeros
pub fn format_number(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.*}", precision, value);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
