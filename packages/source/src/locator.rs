//! # Source Locators
//!
//! Build-time instrumentation tags every rendered element with two strings:
//!
//! ```text
//! data-source  "src/components/Card.tsx:12:5"
//! data-style   "src/components/Card.module.css:.card .title"
//! ```
//!
//! This module turns them into a [`SourceLocator`] and converts line/column
//! pairs into byte offsets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference from a rendered element back to its originating source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocator {
    /// Component file, relative to the project root
    pub file: String,

    /// 1-indexed
    pub line_number: u32,

    /// 1-indexed
    pub column: u32,

    /// Stylesheet holding the element's rules (empty when unstyled)
    #[serde(default)]
    pub style_file: String,

    #[serde(default)]
    pub selectors: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocatorError {
    #[error("Malformed source locator: {0}")]
    MalformedSource(String),

    #[error("Malformed style locator: {0}")]
    MalformedStyle(String),

    #[error("Line and column must be 1-indexed, got {line}:{column}")]
    ZeroPosition { line: u32, column: u32 },
}

impl SourceLocator {
    /// Combine a source locator string with an optional style locator string
    pub fn from_strings(source: &str, style: Option<&str>) -> Result<Self, LocatorError> {
        let (file, line_number, column) = parse_source_locator(source)?;
        let (style_file, selectors) = match style {
            Some(style) if !style.trim().is_empty() => parse_style_locator(style)?,
            _ => (String::new(), Vec::new()),
        };

        Ok(Self {
            file,
            line_number,
            column,
            style_file,
            selectors,
        })
    }

    pub fn has_style(&self) -> bool {
        !self.style_file.is_empty() && !self.selectors.is_empty()
    }
}

/// Parse `"<path>:<line>:<column>"` from the end, so paths may contain colons
pub fn parse_source_locator(raw: &str) -> Result<(String, u32, u32), LocatorError> {
    let malformed = || LocatorError::MalformedSource(raw.to_string());

    let mut parts = raw.trim().rsplitn(3, ':');
    let column = parts.next().ok_or_else(malformed)?;
    let line = parts.next().ok_or_else(malformed)?;
    let path = parts.next().ok_or_else(malformed)?;

    let column: u32 = column.trim().parse().map_err(|_| malformed())?;
    let line: u32 = line.trim().parse().map_err(|_| malformed())?;

    if path.is_empty() {
        return Err(malformed());
    }
    if line == 0 || column == 0 {
        return Err(LocatorError::ZeroPosition { line, column });
    }

    Ok((path.to_string(), line, column))
}

/// Parse `"<styleFile>:<selector> <selector> ..."`, split at the first `:.`
pub fn parse_style_locator(raw: &str) -> Result<(String, Vec<String>), LocatorError> {
    let raw = raw.trim();
    let split = raw
        .find(":.")
        .ok_or_else(|| LocatorError::MalformedStyle(raw.to_string()))?;

    let file = &raw[..split];
    // Keep the leading '.' that belongs to the first selector
    let selectors: Vec<String> = raw[split + 1..]
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if file.is_empty() || selectors.is_empty() {
        return Err(LocatorError::MalformedStyle(raw.to_string()));
    }

    Ok((file.to_string(), selectors))
}

/// Convert a 1-indexed line and column (counted in characters) to a byte offset.
///
/// Returns `None` when the position lies outside the source. A column one past
/// the end of a line addresses the line break itself.
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }

    let line_start = if line == 1 {
        0
    } else {
        source
            .match_indices('\n')
            .nth(line as usize - 2)
            .map(|(i, _)| i + 1)?
    };

    let rest = &source[line_start..];
    let line_text = rest.split('\n').next().unwrap_or("");
    let target = column as usize - 1;

    let mut chars = line_text.char_indices();
    match chars.nth(target) {
        Some((i, _)) => Some(line_start + i),
        None if target == line_text.chars().count() => Some(line_start + line_text.len()),
        None => None,
    }
}

/// 1-indexed line number of a byte offset
pub fn offset_to_line(source: &str, offset: usize) -> u32 {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() as u32 + 1
}
