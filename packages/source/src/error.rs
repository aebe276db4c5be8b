//! Error types for the source engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locator::LocatorError;
use crate::markup::MarkupError;
use crate::stylesheet::StylesheetError;

/// Failure codes carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ElementNotFound,
    SelectorNotFound,
    PropertyNotFound,
    ContentMismatch,
    FileNotFound,
    ParseError,
    WriteError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorCode::SelectorNotFound => "SELECTOR_NOT_FOUND",
            ErrorCode::PropertyNotFound => "PROPERTY_NOT_FOUND",
            ErrorCode::ContentMismatch => "CONTENT_MISMATCH",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::WriteError => "WRITE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid path '{0}': must be relative and stay inside the project root")]
    InvalidPath(String),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("Element has no style locator")]
    MissingStyleLocator,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan {path}: {source}")]
    Stylesheet {
        path: String,
        #[source]
        source: StylesheetError,
    },

    #[error("Failed to scan element in {path}: {source}")]
    Markup {
        path: String,
        #[source]
        source: MarkupError,
    },

    #[error("No element found at {file}:{line}:{column}")]
    ElementNotFound { file: String, line: u32, column: u32 },

    #[error("<{tag}> cannot hold text content")]
    NoTextContent { tag: String },

    #[error("No rule matching {selectors:?} in {file}")]
    SelectorNotFound { file: String, selectors: Vec<String> },

    #[error("Property '{property}' not found in rule '{selector}'")]
    PropertyNotFound { selector: String, property: String },

    #[error("Expected '{expected}' but found '{actual}'")]
    ContentMismatch { expected: String, actual: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::InvalidPath(_)
            | EngineError::Locator(_)
            | EngineError::MissingStyleLocator => ErrorCode::ValidationError,
            EngineError::FileNotFound(_) => ErrorCode::FileNotFound,
            EngineError::Read { .. } | EngineError::Stylesheet { .. } | EngineError::Markup { .. } => {
                ErrorCode::ParseError
            }
            EngineError::ElementNotFound { .. } | EngineError::NoTextContent { .. } => {
                ErrorCode::ElementNotFound
            }
            EngineError::SelectorNotFound { .. } => ErrorCode::SelectorNotFound,
            EngineError::PropertyNotFound { .. } => ErrorCode::PropertyNotFound,
            EngineError::ContentMismatch { .. } => ErrorCode::ContentMismatch,
            EngineError::Write { .. } => ErrorCode::WriteError,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ContentMismatch).unwrap();
        assert_eq!(json, "\"CONTENT_MISMATCH\"");
        assert_eq!(ErrorCode::InternalError.to_string(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(
            EngineError::InvalidPath("../x".into()).code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            EngineError::NoTextContent { tag: "img".into() }.code(),
            ErrorCode::ElementNotFound
        );
        assert_eq!(
            EngineError::Write {
                path: "a".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }
            .code(),
            ErrorCode::WriteError
        );
    }
}
