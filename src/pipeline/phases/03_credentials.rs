use crate::credentials::{CredentialDiscoverer, CredentialReport};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::{decode, encode, WorkflowPhase};
use crate::pipeline::{PipelineError, Step};
use async_trait::async_trait;
use serde_json::Value;

pub struct CredentialsPhase;

#[async_trait]
impl WorkflowPhase for CredentialsPhase {
    fn step(&self) -> Step {
        Step::Credentials
    }

    async fn execute(&self, context: &mut PipelineContext) -> Result<Value, PipelineError> {
        let modules = &context.require_discovery(Step::Credentials)?.modules;
        let report = CredentialDiscoverer::new().discover_with_report(modules);
        let payload = encode(Step::Credentials, &report)?;
        context.credentials = Some(report);
        Ok(payload)
    }

    fn restore(&self, context: &mut PipelineContext, payload: Value) -> Result<(), PipelineError> {
        let report: CredentialReport = decode(Step::Credentials, payload)?;
        context.credentials = Some(report);
        Ok(())
    }
}
