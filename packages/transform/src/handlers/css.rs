//! Style declaration handlers

use tracing::debug;

use crate::error::{TransformError, ValidationIssue};
use crate::handler::{check_property, Applied, TransformContext, TransformHandler};
use crate::request::{
    CssAddChange, CssRemoveChange, CssUpdateChange, TransformRequest, TransformType, UndoData,
};

/// Replace the value of an existing declaration
pub struct CssUpdateHandler;

impl TransformHandler for CssUpdateHandler {
    type Change = CssUpdateChange;

    fn transform_type(&self) -> &'static str {
        TransformType::CssUpdate.as_str()
    }

    fn check(&self, change: &CssUpdateChange) -> Vec<ValidationIssue> {
        check_property(&change.property)
    }

    fn execute(
        &self,
        request: &TransformRequest<CssUpdateChange>,
        context: &mut TransformContext,
    ) -> Result<Applied, TransformError> {
        let change = &request.change;
        let outcome = context.engine.write_declaration(
            &request.target,
            change.selector.as_deref(),
            &change.property,
            Some(&change.prior_value),
            &change.new_value,
            &context.options,
        )?;
        debug!(id = %request.id, selector = %outcome.selector, property = %change.property, "Applied css-update");

        let revert = CssUpdateChange {
            property: change.property.clone(),
            prior_value: change.new_value.clone(),
            new_value: outcome.previous.unwrap_or_else(|| change.prior_value.clone()),
            selector: Some(outcome.selector),
        };

        Ok(Applied {
            affected_files: outcome.affected_files,
            undo: Some(UndoData::new(
                TransformType::CssUpdate,
                request.target.clone(),
                &revert,
            )?),
        })
    }
}

/// Add a declaration, or overwrite one that is already there
pub struct CssAddHandler;

impl TransformHandler for CssAddHandler {
    type Change = CssAddChange;

    fn transform_type(&self) -> &'static str {
        TransformType::CssAdd.as_str()
    }

    fn check(&self, change: &CssAddChange) -> Vec<ValidationIssue> {
        check_property(&change.property)
    }

    fn execute(
        &self,
        request: &TransformRequest<CssAddChange>,
        context: &mut TransformContext,
    ) -> Result<Applied, TransformError> {
        let change = &request.change;
        let outcome = context.engine.write_declaration(
            &request.target,
            change.selector.as_deref(),
            &change.property,
            change.prior_value.as_ref(),
            &change.new_value,
            &context.options,
        )?;
        debug!(id = %request.id, selector = %outcome.selector, property = %change.property, "Applied css-add");

        let target = request.target.clone();
        let selector = Some(outcome.selector);
        let undo = match outcome.previous {
            // Nothing was there before: undo removes what we added
            None => UndoData::new(
                TransformType::CssRemove,
                target,
                &CssRemoveChange {
                    property: change.property.clone(),
                    prior_value: change.new_value.clone(),
                    selector,
                },
            )?,
            Some(previous) => UndoData::new(
                TransformType::CssUpdate,
                target,
                &CssUpdateChange {
                    property: change.property.clone(),
                    prior_value: change.new_value.clone(),
                    new_value: previous,
                    selector,
                },
            )?,
        };

        Ok(Applied {
            affected_files: outcome.affected_files,
            undo: Some(undo),
        })
    }
}

/// Remove a declaration
pub struct CssRemoveHandler;

impl TransformHandler for CssRemoveHandler {
    type Change = CssRemoveChange;

    fn transform_type(&self) -> &'static str {
        TransformType::CssRemove.as_str()
    }

    fn check(&self, change: &CssRemoveChange) -> Vec<ValidationIssue> {
        check_property(&change.property)
    }

    fn execute(
        &self,
        request: &TransformRequest<CssRemoveChange>,
        context: &mut TransformContext,
    ) -> Result<Applied, TransformError> {
        let change = &request.change;
        let outcome = context.engine.remove_declaration(
            &request.target,
            change.selector.as_deref(),
            &change.property,
            Some(&change.prior_value),
        )?;
        debug!(id = %request.id, selector = %outcome.selector, property = %change.property, "Applied css-remove");

        let revert = CssAddChange {
            property: change.property.clone(),
            prior_value: None,
            new_value: outcome.previous.unwrap_or_else(|| change.prior_value.clone()),
            selector: Some(outcome.selector),
        };

        Ok(Applied {
            affected_files: outcome.affected_files,
            undo: Some(UndoData::new(
                TransformType::CssAdd,
                request.target.clone(),
                &revert,
            )?),
        })
    }
}
