use crate::manifest::{ManifestGenerator, ManifestOutput};
use crate::pipeline::artifacts::{write_artifact, MANIFEST_ARTIFACT};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::{decode, encode, WorkflowPhase};
use crate::pipeline::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

pub struct ManifestPhase;

#[async_trait]
impl WorkflowPhase for ManifestPhase {
    fn step(&self) -> Step {
        Step::Manifest
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let modules = &context.require_discovery(Step::Manifest)?.modules;
        let output = ManifestGenerator::new(context.project.clone()).generate_with_conflicts(modules);
        let payload = encode(Step::Manifest, &output)?;
        context.manifest = Some(output);
        Ok(payload)
    }

    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError> {
        let output: ManifestOutput = decode(Step::Manifest, payload)?;
        context.manifest = Some(output);
        Ok(())
    }

    fn verify(&self, context: &PipelineContext) -> Result<(), PipelineError> {
        let output = context.require_manifest(Step::Manifest)?;
        if context.config.strict_dependencies && !output.conflicts.is_empty() {
            return Err(PipelineError::UnresolvedDependencies {
                conflicts: output.conflicts.clone(),
            });
        }
        Ok(())
    }

    fn write_artifacts(&self, context: &PipelineContext) -> Result<Vec<PathBuf>, PipelineError> {
        let output = context.require_manifest(Step::Manifest)?;
        let body = output
            .manifest
            .to_json()
            .map_err(|e| PipelineError::StepFailed {
                step: Step::Manifest,
                source: e.into(),
            })?;
        Ok(vec![write_artifact(
            &context.output_dir(),
            MANIFEST_ARTIFACT,
            &body,
        )?])
    }
}
