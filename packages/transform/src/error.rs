use loupe_source::{EngineError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure carried inside a transform result
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct TransformError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TransformError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(issues: &[ValidationIssue]) -> Self {
        let summary = issues
            .iter()
            .map(|issue| format!("{}: {}", issue.path, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(ErrorCode::ValidationError, format!("Invalid request: {}", summary))
            .with_details(json!({ "issues": issues }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<EngineError> for TransformError {
    fn from(err: EngineError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// One schema or semantic problem with an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, e.g. `change.property`
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A handler for '{0}' is already registered")]
    DuplicateHandler(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_details() {
        let err = TransformError::validation(&[ValidationIssue::new("change.property", "must not be empty")]);
        assert_eq!(err.code, ErrorCode::ValidationError);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["issues"][0]["path"], "change.property");
    }

    #[test]
    fn test_from_engine_error() {
        let err: TransformError = EngineError::FileNotFound("src/App.tsx".into()).into();
        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert!(err.message.contains("src/App.tsx"));
        assert!(serde_json::to_value(&err).unwrap().get("details").is_none());
    }
}
