use crate::image::ImageBuildError;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

/// Hands the output directory to the container engine. Never part of a dry run.
pub struct ImagePhase;

#[async_trait]
impl WorkflowPhase for ImagePhase {
    fn step(&self) -> Step {
        Step::Image
    }

    fn checkpointed(&self) -> bool {
        false
    }

    fn skip_reason(&self, context: &PipelineContext) -> Option<String> {
        if context.options.dry_run {
            Some("dry run".to_string())
        } else if context.options.image.is_none() {
            Some("no image requested".to_string())
        } else {
            None
        }
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let Some(request) = context.options.image.clone() else {
            return Ok(Value::Null);
        };
        let builder = context.image_builder.clone().ok_or_else(|| {
            ImageBuildError::Unavailable("no container engine configured".to_string())
        })?;

        let reference = request.reference();
        let id = builder.build(&context.output_dir(), &reference).await?;
        if request.push {
            builder.push(&reference).await?;
        } else {
            info!(image = %reference, "Push disabled, image kept local");
        }

        context.image_id = Some(id.clone());
        Ok(json!({ "reference": reference, "id": id, "pushed": request.push }))
    }

    fn restore(&self, _context: &mut PipelineContext, _payload: Value) -> Result<(), PipelineError> {
        Err(PipelineError::MissingInput {
            step: Step::Image,
            needs: Step::Image,
        })
    }
}
