//! Handler registry and dispatch

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use loupe_source::ErrorCode;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{RegistryError, TransformError, ValidationIssue};
use crate::handler::{DynHandler, TransformContext, TransformHandler};
use crate::handlers::{CssAddHandler, CssRemoveHandler, CssUpdateHandler, TextUpdateHandler};
use crate::request::TransformResult;

pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn DynHandler>>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<&'static str, Box<dyn DynHandler>>,
}

impl RegistryBuilder {
    /// Register a handler; a second handler for the same type is an error
    pub fn register<H: TransformHandler>(mut self, handler: H) -> Result<Self, RegistryError> {
        let transform_type = TransformHandler::transform_type(&handler);
        if self.handlers.contains_key(transform_type) {
            return Err(RegistryError::DuplicateHandler(transform_type.to_string()));
        }
        self.handlers.insert(transform_type, Box::new(handler));
        Ok(self)
    }

    /// Register the four built-in handlers
    pub fn with_builtins(self) -> Result<Self, RegistryError> {
        self.register(CssUpdateHandler)?
            .register(CssAddHandler)?
            .register(CssRemoveHandler)?
            .register(TextUpdateHandler)
    }

    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers,
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn with_builtin_handlers() -> Self {
        let handlers: [Box<dyn DynHandler>; 4] = [
            Box::new(CssUpdateHandler),
            Box::new(CssAddHandler),
            Box::new(CssRemoveHandler),
            Box::new(TextUpdateHandler),
        ];
        Self {
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.transform_type(), handler))
                .collect(),
        }
    }

    pub fn contains(&self, transform_type: &str) -> bool {
        self.handlers.contains_key(transform_type)
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Validate and run a raw request. Never panics and never errors: every
    /// failure comes back as an unsuccessful result.
    pub fn execute(&self, transform_type: &str, raw: &Value, context: &mut TransformContext) -> TransformResult {
        let request_id = request_id(raw);

        let Some(handler) = self.handlers.get(transform_type) else {
            warn!(transform_type, "Unknown transform type");
            return TransformResult::failure(
                request_id,
                TransformError::new(
                    ErrorCode::ValidationError,
                    format!("Unknown transform type '{}'", transform_type),
                ),
            );
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.run(raw, context)));

        match outcome {
            Ok(Ok(applied)) => {
                debug!(id = %request_id, transform_type, files = ?applied.affected_files, "Transform applied");
                TransformResult::success(request_id, applied.affected_files, applied.undo)
            }
            Ok(Err(err)) => {
                debug!(id = %request_id, transform_type, code = %err.code, "Transform failed: {}", err.message);
                TransformResult::failure(request_id, err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(id = %request_id, transform_type, "Handler panicked: {}", message);
                TransformResult::failure(
                    request_id,
                    TransformError::internal(format!("Handler for '{}' failed: {}", transform_type, message)),
                )
            }
        }
    }

    /// Execute a request whose type is read from its own `type` field
    pub fn execute_raw(&self, raw: &Value, context: &mut TransformContext) -> TransformResult {
        match raw.get("type") {
            Some(Value::String(transform_type)) => self.execute(transform_type, raw, context),
            other => {
                let message = if other.is_some() { "expected a string" } else { "missing field" };
                warn!(transform_type = ?other, "Transform type is not a string");
                TransformResult::failure(
                    request_id(raw),
                    TransformError::validation(&[ValidationIssue::new("type", message)]),
                )
            }
        }
    }
}

/// Correlation id for the reply. Scalar ids of the wrong type are echoed as
/// text so the sender can still match the failure.
fn request_id(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(id @ (Value::Number(_) | Value::Bool(_))) => id.to_string(),
        _ => String::new(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
