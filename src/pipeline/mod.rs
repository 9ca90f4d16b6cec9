//! Generation pipeline
//!
//! Sequences discovery, validation, credential discovery, manifest, configuration and build
//! context generation, then the optional image build. Each step's output is checkpointed so a
//! resumed run only re-executes from the first step without a valid checkpoint.

pub mod artifacts;
pub mod checkpoint;
pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;

pub use checkpoint::{CheckpointError, CheckpointMiss, CheckpointStore};
pub use context::{PipelineContext, PipelineOptions};
pub use orchestrator::PipelineOrchestrator;
pub use phase_trait::WorkflowPhase;

use crate::config::ConfigError;
use crate::dockerize::StrategyKind;
use crate::image::ImageBuildError;
use crate::manifest::DependencyConflict;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Discover,
    Validate,
    Credentials,
    Manifest,
    Config,
    Dockerize,
    Image,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Discover,
        Step::Validate,
        Step::Credentials,
        Step::Manifest,
        Step::Config,
        Step::Dockerize,
        Step::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Discover => "discover",
            Step::Validate => "validate",
            Step::Credentials => "credentials",
            Step::Manifest => "manifest",
            Step::Config => "config",
            Step::Dockerize => "dockerize",
            Step::Image => "image",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Validation failed with {} error(s)", errors.len())]
    Validation { errors: Vec<ValidationError> },

    #[error(
        "{} dependency conflict(s) have no version satisfying every request and strict dependency resolution is enabled",
        conflicts.len()
    )]
    UnresolvedDependencies { conflicts: Vec<DependencyConflict> },

    #[error("Step '{step}' needs the output of '{needs}', which is not available")]
    MissingInput { step: Step, needs: Step },

    #[error("Step '{step}' failed: {source:#}")]
    StepFailed { step: Step, source: anyhow::Error },

    #[error("Failed to write {}: {source:#}", path.display())]
    Artifact { path: PathBuf, source: anyhow::Error },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Image(#[from] ImageBuildError),

    #[error("Run cancelled before step '{step}'")]
    Cancelled { step: Step },
}

impl PipelineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StepOutcome {
    Ran,
    Resumed,
    Skipped(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Ran => write!(f, "ran"),
            StepOutcome::Resumed => write!(f, "resumed"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub modules_loaded: usize,
    pub files_skipped: usize,
    pub warnings: Vec<String>,
    pub steps: Vec<StepReport>,
    pub tools: Vec<String>,
    pub connectors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub artifacts: Vec<PathBuf>,
}

impl PipelineSummary {
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| &report.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names_round_trip_serde() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
        }
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::Validation { errors: Vec::new() };
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation failed with 0 error(s)");

        let err = PipelineError::MissingInput {
            step: Step::Config,
            needs: Step::Manifest,
        };
        assert_eq!(
            err.to_string(),
            "Step 'config' needs the output of 'manifest', which is not available"
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(StepOutcome::Ran.to_string(), "ran");
        assert_eq!(
            StepOutcome::Skipped("dry run".to_string()).to_string(),
            "skipped (dry run)"
        );
    }
}
