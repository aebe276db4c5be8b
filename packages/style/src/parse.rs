//! # Style Value Parser
//!
//! `parse` is total: anything it does not understand comes back as
//! [`StyleValue::Unparsed`] holding the trimmed input.
//!
//! ## Coverage boundary
//!
//! Math functions, gradients, image references and comma separated lists
//! (multi-shadows, font stacks, transitions) are passed through unparsed
//! without looking any further.

use regex::Regex;
use std::sync::LazyLock;

use crate::value::{Color, ColorSpace, StyleValue};

/// Values nested deeper than this (var fallbacks, tuples) are left unparsed
pub const MAX_NESTING_DEPTH: usize = 16;

const COMPLEX_FUNCTIONS: &[&str] = &[
    "calc(",
    "min(",
    "max(",
    "clamp(",
    "gradient(",
    "url(",
    "image-set(",
    "cross-fade(",
    "element(",
    "env(",
    "attr(",
];

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)([a-zA-Z%]*)$")
        .expect("number pattern is valid")
});

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[a-zA-Z_][a-zA-Z0-9_-]*$").expect("identifier pattern is valid")
});

/// Parse a raw CSS value for `property`
pub fn parse(property: &str, raw: &str) -> StyleValue {
    parse_at_depth(property, raw, 0)
}

fn parse_at_depth(property: &str, raw: &str, depth: usize) -> StyleValue {
    let trimmed = raw.trim();

    if trimmed.is_empty() || depth >= MAX_NESTING_DEPTH || is_complex(trimmed) {
        return StyleValue::unparsed(trimmed);
    }

    if let Some(value) = parse_var(property, trimmed, depth) {
        return value;
    }

    let tokens = match split_top_level(trimmed, |c| c.is_whitespace()) {
        Some(tokens) => tokens,
        None => return StyleValue::unparsed(trimmed),
    };

    if tokens.len() > 1 {
        return StyleValue::tuple(
            tokens
                .iter()
                .map(|token| parse_at_depth(property, token, depth + 1))
                .collect(),
        );
    }

    parse_scalar(trimmed)
}

/// Complex syntax is recognized, not parsed
pub fn is_complex(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    if COMPLEX_FUNCTIONS.iter().any(|f| lower.contains(f)) {
        return true;
    }

    match split_top_level(value, |c| c == ',') {
        Some(parts) => parts.len() > 1,
        None => true,
    }
}

fn parse_var(property: &str, value: &str, depth: usize) -> Option<StyleValue> {
    let inner = function_body(value, "var")?;

    let parts = split_once_top_level(inner, ',');
    let (name, fallback) = match parts {
        Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
        None => (inner.trim(), None),
    };

    if !name.starts_with("--") || name.len() < 3 || name.contains(char::is_whitespace) {
        return Some(StyleValue::unparsed(value));
    }

    let fallback = match fallback {
        Some("") => return Some(StyleValue::unparsed(value)),
        Some(raw) => Some(parse_at_depth(property, raw, depth + 1)),
        None => None,
    };

    Some(StyleValue::var(name, fallback))
}

fn parse_scalar(value: &str) -> StyleValue {
    if let Some(color) = parse_color(value) {
        return StyleValue::Color(color);
    }

    if let Some(caps) = NUMBER_RE.captures(value) {
        let number: f64 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => return StyleValue::unparsed(value),
        };
        if !number.is_finite() {
            return StyleValue::unparsed(value);
        }
        let unit = &caps[2];
        return if unit.is_empty() {
            StyleValue::number(number)
        } else {
            StyleValue::with_unit_str(number, unit, value)
        };
    }

    if IDENT_RE.is_match(value) {
        return StyleValue::keyword(value);
    }

    StyleValue::unparsed(value)
}

/// Parse a standalone color literal
pub fn parse_color(value: &str) -> Option<Color> {
    let lower = value.trim().to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex);
    }

    if lower == "transparent" {
        return Some(Color::srgb(0.0, 0.0, 0.0, 0.0));
    }

    if let Some(body) = function_body(&lower, "rgb").or_else(|| function_body(&lower, "rgba")) {
        let (channels, alpha) = color_args(body)?;
        let rgb = [
            rgb_channel(channels[0])?,
            rgb_channel(channels[1])?,
            rgb_channel(channels[2])?,
        ];
        return Some(Color::new(ColorSpace::Srgb, rgb, alpha_arg(alpha)?));
    }

    if let Some(body) = function_body(&lower, "hsl").or_else(|| function_body(&lower, "hsla")) {
        let (channels, alpha) = color_args(body)?;
        let hsl = [
            hue(channels[0])?,
            fraction_of_hundred(channels[1])?,
            fraction_of_hundred(channels[2])?,
        ];
        return Some(Color::new(ColorSpace::Hsl, hsl, alpha_arg(alpha)?));
    }

    if let Some(body) = function_body(&lower, "oklch") {
        let (channels, alpha) = color_args(body)?;
        let lch = [
            lightness(channels[0])?,
            scaled(channels[1], 0.4)?,
            hue(channels[2])?,
        ];
        return Some(Color::new(ColorSpace::Oklch, lch, alpha_arg(alpha)?));
    }

    if let Some(body) = function_body(&lower, "oklab") {
        let (channels, alpha) = color_args(body)?;
        let lab = [
            lightness(channels[0])?,
            scaled(channels[1], 0.4)?,
            scaled(channels[2], 0.4)?,
        ];
        return Some(Color::new(ColorSpace::Oklab, lab, alpha_arg(alpha)?));
    }

    if let Some(body) = function_body(&lower, "color") {
        let body = body.trim();
        let (space, rest) = body.split_once(char::is_whitespace)?;
        let space = match space {
            "display-p3" => ColorSpace::DisplayP3,
            "srgb" => ColorSpace::Srgb,
            _ => return None,
        };
        let (channels, alpha) = color_args(rest)?;
        let rgb = [
            scaled(channels[0], 1.0)?,
            scaled(channels[1], 1.0)?,
            scaled(channels[2], 1.0)?,
        ];
        return Some(Color::new(space, rgb, alpha_arg(alpha)?));
    }

    None
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let digits: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .map(|c| {
                let d = c.to_digit(16).unwrap_or(0) as u8;
                d * 16 + d
            })
            .collect(),
        6 | 8 => (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()?,
        _ => return None,
    };

    let channel = |i: usize| digits[i] as f64 / 255.0;
    let alpha = if digits.len() == 4 { channel(3) } else { 1.0 };
    Some(Color::srgb(channel(0), channel(1), channel(2), alpha))
}

/// Split color function arguments into three channels and an optional alpha.
///
/// Accepts both legacy comma syntax and modern space syntax with `/ alpha`.
fn color_args(body: &str) -> Option<([&str; 3], Option<&str>)> {
    let body = body.trim();

    if body.contains(',') {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        return match parts.as_slice() {
            [a, b, c] => Some(([a, b, c], None)),
            [a, b, c, alpha] => Some(([a, b, c], Some(alpha))),
            _ => None,
        };
    }

    let (channels, alpha) = match body.split_once('/') {
        Some((channels, alpha)) => (channels, Some(alpha.trim())),
        None => (body, None),
    };

    let parts: Vec<&str> = channels.split_whitespace().collect();
    match parts.as_slice() {
        [a, b, c] => Some(([a, b, c], alpha)),
        _ => None,
    }
}

fn number_token(token: &str) -> Option<f64> {
    if token == "none" {
        return Some(0.0);
    }
    token.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn percentage(token: &str) -> Option<f64> {
    token.strip_suffix('%').and_then(number_token)
}

fn rgb_channel(token: &str) -> Option<f64> {
    match percentage(token) {
        Some(p) => Some(p / 100.0),
        None => number_token(token).map(|n| n / 255.0),
    }
}

fn fraction_of_hundred(token: &str) -> Option<f64> {
    percentage(token)
        .or_else(|| number_token(token))
        .map(|n| n / 100.0)
}

fn lightness(token: &str) -> Option<f64> {
    match percentage(token) {
        Some(p) => Some(p / 100.0),
        None => number_token(token),
    }
}

/// Plain numbers are taken as-is, percentages map onto `0..=full`
fn scaled(token: &str, full: f64) -> Option<f64> {
    match percentage(token) {
        Some(p) => Some(p / 100.0 * full),
        None => number_token(token),
    }
}

fn hue(token: &str) -> Option<f64> {
    let (number, factor) = if let Some(n) = token.strip_suffix("deg") {
        (n, 1.0)
    } else if let Some(n) = token.strip_suffix("grad") {
        (n, 0.9)
    } else if let Some(n) = token.strip_suffix("rad") {
        (n, 180.0 / std::f64::consts::PI)
    } else if let Some(n) = token.strip_suffix("turn") {
        (n, 360.0)
    } else {
        (token, 1.0)
    };
    number_token(number).map(|n| n * factor)
}

fn alpha_arg(token: Option<&str>) -> Option<f64> {
    match token {
        None => Some(1.0),
        Some(token) => match percentage(token) {
            Some(p) => Some(p / 100.0),
            None => number_token(token),
        },
    }
}

/// Return the body of `name(...)` when the whole value is that single call
fn function_body<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    let open = name.len();
    let head = value.get(..open)?;
    if !head.eq_ignore_ascii_case(name) || value.get(open..open + 1)? != "(" {
        return None;
    }
    if value.len() < open + 2 || !value.ends_with(')') {
        return None;
    }
    let close = matching_paren(value, open)?;
    if close != value.len() - 1 {
        return None;
    }
    Some(&value[open + 1..close])
}

fn matching_paren(value: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in value.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at separators that sit outside parentheses and quotes.
///
/// Returns `None` when parentheses or quotes are unbalanced.
pub(crate) fn split_top_level(value: &str, is_separator: impl Fn(char) -> bool) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            c if depth == 0 && is_separator(c) => {
                if start < i {
                    let part = value[start..i].trim();
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }

    let tail = value[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    Some(parts)
}

fn split_once_top_level(value: &str, separator: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                return Some((&value[..i], &value[i + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}
