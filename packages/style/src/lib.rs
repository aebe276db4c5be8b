//! # Loupe Style
//!
//! Typed representation of CSS values used when editing stylesheets.
//!
//! ```text
//! "16px"                 → Unit { 16, px }
//! "#ff0000"              → Color { srgb, [1, 0, 0], 1 }
//! "var(--spacing, 16px)" → Var { "--spacing", Unit { 16, px } }
//! "calc(100% - 1rem)"    → Unparsed
//! ```
//!
//! `parse` never fails and `serialize` is its left inverse up to numeric
//! formatting.

mod color;
mod parse;
mod serialize;
mod value;

pub use color::convert_color_space;
pub use parse::{is_complex, parse, parse_color, MAX_NESTING_DEPTH};
pub use serialize::{
    collapse_box_shorthand, format_number, serialize, serialize_color, serialize_with,
    ColorFormat, SerializeOptions, DEFAULT_PRECISION,
};
pub use value::{
    Color, ColorSpace, LengthUnit, StyleValue, UnknownUnit, COLOR_TOLERANCE, NUMBER_TOLERANCE,
};
