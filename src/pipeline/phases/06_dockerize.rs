use crate::dockerize::{BuildPlan, Dockerizer};
use crate::pipeline::artifacts::{copy_module_sources, write_build_plan};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::{decode, encode, WorkflowPhase};
use crate::pipeline::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Renders the build plan. Runs in dry runs too: nothing here reaches the container engine.
pub struct DockerizePhase;

#[async_trait]
impl WorkflowPhase for DockerizePhase {
    fn step(&self) -> Step {
        Step::Dockerize
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let manifest = &context.require_manifest(Step::Dockerize)?.manifest;
        let plan = Dockerizer::new(context.config.dockerize_config())
            .plan(manifest, context.modules())
            .map_err(|source| PipelineError::StepFailed {
                step: Step::Dockerize,
                source,
            })?;
        let payload = encode(Step::Dockerize, &plan)?;
        context.build_plan = Some(plan);
        Ok(payload)
    }

    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError> {
        let plan: BuildPlan = decode(Step::Dockerize, payload)?;
        context.build_plan = Some(plan);
        Ok(())
    }

    fn write_artifacts(&self, context: &PipelineContext) -> Result<Vec<PathBuf>, PipelineError> {
        let plan = context
            .build_plan
            .as_ref()
            .ok_or(PipelineError::MissingInput {
                step: Step::Dockerize,
                needs: Step::Dockerize,
            })?;
        let output_dir = context.output_dir();
        let (tools_root, connectors_root) = context.roots();

        let mut written = write_build_plan(&output_dir, plan)?;
        written.extend(copy_module_sources(
            &output_dir,
            context.modules(),
            &tools_root,
            &connectors_root,
        )?);
        Ok(written)
    }
}
