use crate::pipeline::artifacts::{write_artifact, CONFIG_ARTIFACT};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::{decode, WorkflowPhase};
use crate::pipeline::{PipelineError, Step};
use crate::server_config::ConfigGenerator;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

pub struct ConfigPhase;

#[async_trait]
impl WorkflowPhase for ConfigPhase {
    fn step(&self) -> Step {
        Step::Config
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let manifest = &context.require_manifest(Step::Config)?.manifest;
        let credentials = &context.require_credentials(Step::Config)?.requirements;

        let document = ConfigGenerator::new(context.config.profile)
            .with_port(context.config.server_port)
            .generate(manifest, credentials)
            .map_err(|source| PipelineError::StepFailed {
                step: Step::Config,
                source,
            })?;

        context.config_document = Some(document.clone());
        Ok(Value::String(document))
    }

    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError> {
        let document: String = decode(Step::Config, payload)?;
        context.config_document = Some(document);
        Ok(())
    }

    fn write_artifacts(&self, context: &PipelineContext) -> Result<Vec<PathBuf>, PipelineError> {
        let document = context
            .config_document
            .as_deref()
            .ok_or(PipelineError::MissingInput {
                step: Step::Config,
                needs: Step::Config,
            })?;
        Ok(vec![write_artifact(
            &context.output_dir(),
            CONFIG_ARTIFACT,
            document,
        )?])
    }
}
