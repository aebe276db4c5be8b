//! Transform requests, change payloads and results

use std::fmt;
use std::str::FromStr;

use loupe_source::SourceLocator;
use loupe_style::StyleValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransformError;

/// The built-in change kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformType {
    CssUpdate,
    CssAdd,
    CssRemove,
    TextUpdate,
}

impl TransformType {
    pub const ALL: [TransformType; 4] = [
        TransformType::CssUpdate,
        TransformType::CssAdd,
        TransformType::CssRemove,
        TransformType::TextUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformType::CssUpdate => "css-update",
            TransformType::CssAdd => "css-add",
            TransformType::CssRemove => "css-remove",
            TransformType::TextUpdate => "text-update",
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown transform type '{}'", s))
    }
}

/// A change request against one located element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest<C> {
    pub id: String,

    #[serde(rename = "type")]
    pub transform_type: String,

    pub target: SourceLocator,

    pub change: C,
}

impl<C> TransformRequest<C> {
    pub fn new(
        id: impl Into<String>,
        transform_type: impl Into<String>,
        target: SourceLocator,
        change: C,
    ) -> Self {
        Self {
            id: id.into(),
            transform_type: transform_type.into(),
            target,
            change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssUpdateChange {
    pub property: String,
    pub prior_value: StyleValue,
    pub new_value: StyleValue,
    /// Which of the target's selectors to edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssAddChange {
    pub property: String,
    /// `null` when the property is expected to be absent
    #[serde(default)]
    pub prior_value: Option<StyleValue>,
    pub new_value: StyleValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssRemoveChange {
    pub property: String,
    pub prior_value: StyleValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextUpdateChange {
    /// Empty skips the content check
    #[serde(default)]
    pub original_text: String,
    pub new_text: String,
}

/// Everything needed to revert an applied transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoData {
    #[serde(rename = "type")]
    pub transform_type: String,
    pub target: SourceLocator,
    pub revert_change: Value,
}

impl UndoData {
    pub fn new<C: Serialize>(
        transform_type: TransformType,
        target: SourceLocator,
        revert_change: &C,
    ) -> Result<Self, TransformError> {
        let revert_change = serde_json::to_value(revert_change)
            .map_err(|e| TransformError::internal(format!("Failed to encode revert change: {}", e)))?;
        Ok(Self {
            transform_type: transform_type.as_str().to_string(),
            target,
            revert_change,
        })
    }

    /// Turn the revert change into a fresh request
    pub fn into_request(self, id: impl Into<String>) -> TransformRequest<Value> {
        TransformRequest::new(id, self.transform_type, self.target, self.revert_change)
    }
}

/// Uniform result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub success: bool,

    pub request_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_files: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransformError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_data: Option<UndoData>,
}

impl TransformResult {
    pub fn success(
        request_id: impl Into<String>,
        affected_files: Vec<String>,
        undo_data: Option<UndoData>,
    ) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            affected_files: Some(affected_files),
            error: None,
            undo_data,
        }
    }

    pub fn failure(request_id: impl Into<String>, error: TransformError) -> Self {
        Self {
            success: false,
            request_id: request_id.into(),
            affected_files: None,
            error: Some(error),
            undo_data: None,
        }
    }
}
