//! Container engine seam
//!
//! The pipeline hands a finished build context directory to an [`ImageBuilder`]; it never
//! talks to the engine directly. [`DockerImageBuilder`] is the local-daemon implementation.

mod context;
mod docker;

pub use context::{context_entries, pack_context, CONTEXT_EXCLUDES};
pub use docker::DockerImageBuilder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error)]
pub enum ImageBuildError {
    #[error("Container engine unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to package build context: {0}")]
    Context(String),

    #[error("Image build failed: {0}")]
    BuildFailed(String),

    #[error("Image push failed for {reference}: {message}")]
    PushFailed { reference: String, message: String },
}

/// Target image for a build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub name: String,
    pub tag: String,
    pub push: bool,
}

impl ImageRequest {
    pub fn new(name: impl Into<String>, tag: Option<String>, push: bool) -> Self {
        Self {
            name: name.into(),
            tag: tag
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TAG.to_string()),
            push,
        }
    }

    /// `name:tag` as handed to the engine.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `reference` from the context directory. Returns the engine's image id when it
    /// reports one, otherwise the reference itself.
    async fn build(&self, context_dir: &Path, reference: &str) -> Result<String, ImageBuildError>;

    async fn push(&self, reference: &str) -> Result<(), ImageBuildError>;
}
