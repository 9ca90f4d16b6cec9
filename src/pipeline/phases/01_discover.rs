use crate::loader::ModuleLoader;
use crate::pipeline::checkpoint::inputs_digest;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Loads modules from both roots. Always runs: its output is what every checkpoint is keyed on.
pub struct DiscoverPhase;

#[async_trait]
impl WorkflowPhase for DiscoverPhase {
    fn step(&self) -> Step {
        Step::Discover
    }

    fn checkpointed(&self) -> bool {
        false
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let (tools_root, connectors_root) = context.roots();
        let discovery = ModuleLoader::new(context.file_system.clone())
            .with_config(context.config.scan_config())
            .discover(&tools_root, &connectors_root);

        context.inputs_digest = inputs_digest(&discovery.modules, &context.options_fingerprint());
        let payload = json!({
            "modules": discovery.modules.len(),
            "skipped": discovery.skipped.len(),
        });
        context.discovery = Some(discovery);
        Ok(payload)
    }

    fn restore(&self, _context: &mut PipelineContext, _payload: Value) -> Result<(), PipelineError> {
        Err(PipelineError::MissingInput {
            step: Step::Discover,
            needs: Step::Discover,
        })
    }
}
