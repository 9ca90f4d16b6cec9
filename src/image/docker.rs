use super::{pack_context, ImageBuildError, ImageBuilder};
use async_trait::async_trait;
use bollard::image::{BuildImageOptions, PushImageOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use std::path::Path;
use tracing::{debug, info};

/// Builds and pushes through the local Docker daemon.
pub struct DockerImageBuilder {
    docker: Docker,
}

impl DockerImageBuilder {
    pub fn connect() -> Result<Self, ImageBuildError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ImageBuildError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Whether the daemon answers a version request.
    pub async fn is_available(&self) -> bool {
        match self.docker.version().await {
            Ok(version) => {
                debug!(
                    api_version = version.api_version.as_deref().unwrap_or("unknown"),
                    "Docker daemon reachable"
                );
                true
            }
            Err(e) => {
                debug!("Failed to get Docker version: {}", e);
                false
            }
        }
    }
}

fn split_reference(reference: &str) -> (&str, &str) {
    // a colon inside the registry host (host:port/name) is not a tag separator
    match reference.rfind(':') {
        Some(idx) if !reference[idx..].contains('/') => (&reference[..idx], &reference[idx + 1..]),
        _ => (reference, super::DEFAULT_TAG),
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn build(&self, context_dir: &Path, reference: &str) -> Result<String, ImageBuildError> {
        let archive = pack_context(context_dir)?;
        info!(image = %reference, context = %context_dir.display(), "Building image");

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: reference.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut image_id = None;
        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(archive)));
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| ImageBuildError::BuildFailed(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(ImageBuildError::BuildFailed(error));
            }
            if let Some(line) = info.stream.as_deref().map(str::trim_end) {
                if !line.is_empty() {
                    debug!(target: "toolforge::image", "{}", line);
                }
            }
            if let Some(id) = info.aux.and_then(|aux| aux.id) {
                image_id = Some(id);
            }
        }

        let id = image_id.unwrap_or_else(|| reference.to_string());
        info!(image = %reference, id = %id, "Image built");
        Ok(id)
    }

    async fn push(&self, reference: &str) -> Result<(), ImageBuildError> {
        let (name, tag) = split_reference(reference);
        info!(image = %reference, "Pushing image");

        let options = PushImageOptions {
            tag: tag.to_string(),
        };
        let mut stream = self.docker.push_image(name, Some(options), None);
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| ImageBuildError::PushFailed {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
            if let Some(error) = info.error {
                return Err(ImageBuildError::PushFailed {
                    reference: reference.to_string(),
                    message: error,
                });
            }
            if let Some(status) = info.status {
                debug!(target: "toolforge::image", "{}", status);
            }
        }

        info!(image = %reference, "Image pushed");
        Ok(())
    }
}
