use super::context::PipelineContext;
use super::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    fn step(&self) -> Step;

    /// Whether the step's output is persisted and may be restored on resume.
    fn checkpointed(&self) -> bool {
        true
    }

    /// Reason the step does not run at all in this context.
    fn skip_reason(&self, _context: &PipelineContext) -> Option<String> {
        None
    }

    /// Run the step, store its output in the context and return the checkpoint payload.
    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError>;

    /// Put a checkpointed payload back into the context.
    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError>;

    /// Check the step's output before the run moves on; runs after execute and after restore.
    fn verify(&self, _context: &PipelineContext) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Write the step's files into the output directory.
    fn write_artifacts(
        &self,
        _context: &PipelineContext,
    ) -> Result<Vec<std::path::PathBuf>, PipelineError> {
        Ok(Vec::new())
    }
}

/// Deserialize a checkpoint payload into a step output.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    step: Step,
    payload: Value,
) -> Result<T, PipelineError> {
    serde_json::from_value(payload).map_err(|e| PipelineError::StepFailed {
        step,
        source: anyhow::Error::new(e).context("checkpoint payload has the wrong shape"),
    })
}

/// Serialize a step output into a checkpoint payload.
pub(crate) fn encode<T: serde::Serialize>(step: Step, output: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(output).map_err(|e| PipelineError::StepFailed {
        step,
        source: e.into(),
    })
}
