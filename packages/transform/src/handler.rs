//! Transform handler trait and its type-erased form

use loupe_source::{SourceEngine, SourceLocator};
use loupe_style::SerializeOptions;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{TransformError, ValidationIssue};
use crate::request::{TransformRequest, UndoData};

/// State a handler runs against
pub struct TransformContext {
    pub engine: SourceEngine,

    /// Used whenever a style value is written back
    pub options: SerializeOptions,
}

impl TransformContext {
    pub fn new(engine: SourceEngine) -> Self {
        Self {
            engine,
            options: SerializeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }
}

/// What a handler reports back on success
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub affected_files: Vec<String>,
    pub undo: Option<UndoData>,
}

/// A single transform type.
///
/// Deserializing into `Change` is the schema; `check` adds semantic rules
/// that serde cannot express.
pub trait TransformHandler: Send + Sync + 'static {
    type Change: DeserializeOwned;

    fn transform_type(&self) -> &'static str;

    fn check(&self, _change: &Self::Change) -> Vec<ValidationIssue> {
        Vec::new()
    }

    fn execute(
        &self,
        request: &TransformRequest<Self::Change>,
        context: &mut TransformContext,
    ) -> Result<Applied, TransformError>;
}

/// Object-safe view of a handler stored in the registry
pub(crate) trait DynHandler: Send + Sync {
    fn transform_type(&self) -> &'static str;

    fn run(&self, raw: &Value, context: &mut TransformContext) -> Result<Applied, TransformError>;
}

impl<H: TransformHandler> DynHandler for H {
    fn transform_type(&self) -> &'static str {
        TransformHandler::transform_type(self)
    }

    fn run(&self, raw: &Value, context: &mut TransformContext) -> Result<Applied, TransformError> {
        let request = decode_request::<H::Change>(raw, TransformHandler::transform_type(self))?;

        let issues = self.check(&request.change);
        if !issues.is_empty() {
            return Err(TransformError::validation(&issues));
        }

        self.execute(&request, context)
    }
}

/// Decode each part separately so every problem is reported against its field
fn decode_request<C: DeserializeOwned>(
    raw: &Value,
    transform_type: &str,
) -> Result<TransformRequest<C>, TransformError> {
    let mut issues = Vec::new();

    let id = match raw.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::String(_)) => {
            issues.push(ValidationIssue::new("id", "must not be empty"));
            None
        }
        Some(_) => {
            issues.push(ValidationIssue::new("id", "expected a string"));
            None
        }
        None => {
            issues.push(ValidationIssue::new("id", "missing field"));
            None
        }
    };

    let target = field::<SourceLocator>(raw, "target", &mut issues);
    let change = field::<C>(raw, "change", &mut issues);

    if let Some(target) = &target {
        if target.line_number == 0 || target.column == 0 {
            issues.push(ValidationIssue::new("target", "line and column are 1-indexed"));
        }
    }

    match (id, target, change) {
        (Some(id), Some(target), Some(change)) if issues.is_empty() => Ok(TransformRequest::new(
            id,
            transform_type,
            target,
            change,
        )),
        _ => Err(TransformError::validation(&issues)),
    }
}

fn field<T: DeserializeOwned>(raw: &Value, name: &str, issues: &mut Vec<ValidationIssue>) -> Option<T> {
    match raw.get(name) {
        Some(value) => match T::deserialize(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                issues.push(ValidationIssue::new(name, e.to_string()));
                None
            }
        },
        None => {
            issues.push(ValidationIssue::new(name, "missing field"));
            None
        }
    }
}

/// Property names are non-empty and made of name characters only
pub(crate) fn check_property(property: &str) -> Vec<ValidationIssue> {
    let valid = !property.is_empty()
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Vec::new()
    } else {
        vec![ValidationIssue::new(
            "change.property",
            format!("'{}' is not a valid property name", property),
        )]
    }
}
