//! Run state shared by the pipeline phases

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use super::{PipelineError, Step};
use crate::config::ToolforgeConfig;
use crate::credentials::CredentialReport;
use crate::dockerize::BuildPlan;
use crate::fs::{FileSystem, RealFileSystem};
use crate::image::{ImageBuilder, ImageRequest};
use crate::loader::Discovery;
use crate::manifest::{ManifestOutput, ProjectInfo};
use crate::module::Module;
use crate::validation::ValidationResult;

/// Per-run switches, typically from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Run every step through build-context generation but never touch the container engine.
    pub dry_run: bool,
    /// Reuse valid checkpoints up to the first missing one.
    pub resume: bool,
    /// Image to build; no image step runs without one.
    pub image: Option<ImageRequest>,
}

/// Owns the run's collaborators and every step output produced so far. Each phase reads
/// earlier outputs and sets only its own.
pub struct PipelineContext {
    pub config: ToolforgeConfig,
    pub options: PipelineOptions,
    pub file_system: Arc<dyn FileSystem>,
    pub image_builder: Option<Arc<dyn ImageBuilder>>,
    pub project: ProjectInfo,
    pub inputs_digest: String,

    pub discovery: Option<Discovery>,
    pub validation: Option<ValidationResult>,
    pub credentials: Option<CredentialReport>,
    pub manifest: Option<ManifestOutput>,
    pub config_document: Option<String>,
    pub build_plan: Option<BuildPlan>,
    pub image_id: Option<String>,
}

impl PipelineContext {
    pub fn new(
        config: ToolforgeConfig,
        options: PipelineOptions,
        file_system: Arc<dyn FileSystem>,
    ) -> Self {
        let project = ProjectInfo::detect(file_system.as_ref(), &config.project_root);
        Self {
            config,
            options,
            file_system,
            image_builder: None,
            project,
            inputs_digest: String::new(),
            discovery: None,
            validation: None,
            credentials: None,
            manifest: None,
            config_document: None,
            build_plan: None,
            image_id: None,
        }
    }

    /// Context over the real file system.
    pub fn on_disk(config: ToolforgeConfig, options: PipelineOptions) -> Self {
        Self::new(config, options, Arc::new(RealFileSystem::new()))
    }

    pub fn with_image_builder(mut self, builder: Arc<dyn ImageBuilder>) -> Self {
        self.image_builder = Some(builder);
        self
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.output_path()
    }

    pub fn modules(&self) -> &[Module] {
        self.discovery
            .as_ref()
            .map(|d| d.modules.as_slice())
            .unwrap_or(&[])
    }

    /// Everything besides module sources that changes generated output.
    pub fn options_fingerprint(&self) -> String {
        json!({
            "project": self.project,
            "profile": self.config.profile,
            "port": self.config.server_port,
            "nodeImage": self.config.node_image,
            "pythonImage": self.config.python_image,
            "schemaVersions": self.config.supported_schema_versions,
            "strictDependencies": self.config.strict_dependencies,
            "generator": crate::manifest::generator_version(),
        })
        .to_string()
    }

    pub fn require_discovery(&self, step: Step) -> Result<&Discovery, PipelineError> {
        self.discovery.as_ref().ok_or(PipelineError::MissingInput {
            step,
            needs: Step::Discover,
        })
    }

    pub fn require_manifest(&self, step: Step) -> Result<&ManifestOutput, PipelineError> {
        self.manifest.as_ref().ok_or(PipelineError::MissingInput {
            step,
            needs: Step::Manifest,
        })
    }

    pub fn require_credentials(&self, step: Step) -> Result<&CredentialReport, PipelineError> {
        self.credentials.as_ref().ok_or(PipelineError::MissingInput {
            step,
            needs: Step::Credentials,
        })
    }

    pub fn roots(&self) -> (PathBuf, PathBuf) {
        (self.config.tools_path(), self.config.connectors_path())
    }
}
