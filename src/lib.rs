//! toolforge - build-time generator for tool and connector servers
//!
//! toolforge scans a project for tool and connector modules written in TypeScript,
//! JavaScript or Python, extracts their declared metadata without executing them, and
//! turns the validated set into the artifacts a server deployment needs: a merged
//! manifest, a YAML configuration with `${NAME}` credential placeholders, and a
//! container build context with a Dockerfile matched to the module languages.
//!
//! # Core Concepts
//!
//! - **Module**: one tool or connector source file plus its extracted metadata
//! - **Manifest**: the merged, deterministic catalog of every module, capability and
//!   dependency
//! - **Credential requirement**: a secret some module needs at runtime, aggregated by name
//! - **Pipeline**: the ordered, checkpointed steps that produce each artifact
//!
//! # Example Usage
//!
//! ```ignore
//! use toolforge::{PipelineContext, PipelineOptions, PipelineOrchestrator, ToolforgeConfig};
//!
//! async fn dry_run() -> Result<(), toolforge::PipelineError> {
//!     let config = ToolforgeConfig::for_project("./my-server".into());
//!     let options = PipelineOptions { dry_run: true, ..Default::default() };
//!     let mut ctx = PipelineContext::on_disk(config, options);
//!
//!     let summary = PipelineOrchestrator::new().execute(&mut ctx).await?;
//!     println!("{} modules -> {}", summary.modules_loaded, summary.output_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`loader`]: module discovery and static metadata extraction
//! - [`validation`]: per-module and cross-module rules
//! - [`credentials`]: credential requirement aggregation
//! - [`manifest`]: manifest generation and dependency resolution
//! - [`server_config`]: configuration document rendering
//! - [`dockerize`]: build strategy selection and Dockerfile rendering
//! - [`pipeline`]: the checkpointed orchestrator tying the steps together

pub mod cli;
pub mod config;
pub mod credentials;
pub mod dockerize;
pub mod fs;
pub mod image;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod pipeline;
pub mod progress;
pub mod server_config;
pub mod util;
pub mod validation;

pub use config::{ConfigError, ToolforgeConfig};
pub use credentials::{CredentialDiscoverer, CredentialReport, CredentialRequirement, CredentialType};
pub use dockerize::{BuildPlan, Dockerizer, StrategyKind};
pub use loader::{Discovery, ModuleLoader};
pub use manifest::{Manifest, ManifestGenerator};
pub use module::{Module, ModuleKind, SourceLanguage};
pub use pipeline::{
    PipelineContext, PipelineError, PipelineOptions, PipelineOrchestrator, PipelineSummary, Step,
};
pub use server_config::{ConfigGenerator, ConfigProfile};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use validation::{ValidationResult, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_toolforge() {
        assert_eq!(NAME, "toolforge");
    }
}
