use tracing::debug;

use crate::error::TransformError;
use crate::handler::{Applied, TransformContext, TransformHandler};
use crate::request::{TextUpdateChange, TransformRequest, TransformType, UndoData};

/// Replace the text content of an element
pub struct TextUpdateHandler;

impl TransformHandler for TextUpdateHandler {
    type Change = TextUpdateChange;

    fn transform_type(&self) -> &'static str {
        TransformType::TextUpdate.as_str()
    }

    fn execute(
        &self,
        request: &TransformRequest<TextUpdateChange>,
        context: &mut TransformContext,
    ) -> Result<Applied, TransformError> {
        let change = &request.change;
        let outcome = context.engine.update_text(
            &request.target,
            Some(change.original_text.as_str()),
            &change.new_text,
        )?;
        debug!(id = %request.id, file = %request.target.file, "Applied text-update");

        let revert = TextUpdateChange {
            original_text: change.new_text.clone(),
            new_text: outcome.previous_text,
        };

        Ok(Applied {
            affected_files: outcome.affected_files,
            undo: Some(UndoData::new(
                TransformType::TextUpdate,
                request.target.clone(),
                &revert,
            )?),
        })
    }
}
