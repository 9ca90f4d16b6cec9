use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::{decode, encode, WorkflowPhase};
use crate::pipeline::{PipelineError, Step};
use crate::validation::{ValidationResult, Validator};
use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

pub struct ValidatePhase;

#[async_trait]
impl WorkflowPhase for ValidatePhase {
    fn step(&self) -> Step {
        Step::Validate
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let modules = &context.require_discovery(Step::Validate)?.modules;
        let result = Validator::new(&context.config.validator_config()).validate(modules);
        let payload = encode(Step::Validate, &result)?;
        context.validation = Some(result);
        Ok(payload)
    }

    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError> {
        let result: ValidationResult = decode(Step::Validate, payload)?;
        context.validation = Some(result);
        Ok(())
    }

    /// Any validation error halts the run before manifest generation.
    fn verify(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let Some(result) = &context.validation else {
            return Err(PipelineError::MissingInput {
                step: Step::Manifest,
                needs: Step::Validate,
            });
        };
        if result.is_valid() {
            return Ok(());
        }
        for err in &result.errors {
            error!("{}", err);
        }
        Err(PipelineError::Validation {
            errors: result.errors.clone(),
        })
    }
}
