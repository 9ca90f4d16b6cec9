//! Files written into the output directory, which doubles as the image build context.

use super::PipelineError;
use crate::dockerize::BuildPlan;
use crate::module::{Module, ModuleKind};
use crate::util::write_atomic;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MANIFEST_ARTIFACT: &str = "generated/manifest.json";
pub const CONFIG_ARTIFACT: &str = "config/config.yaml";
pub const DOCKERFILE_ARTIFACT: &str = "Dockerfile";
pub const DOCKERIGNORE_ARTIFACT: &str = ".dockerignore";
pub const TOOLS_CONTEXT_DIR: &str = "tools";
pub const CONNECTORS_CONTEXT_DIR: &str = "connectors";

/// Write one artifact under `output_dir`, replacing any previous version whole.
pub fn write_artifact(
    output_dir: &Path,
    relative: &str,
    contents: &str,
) -> Result<PathBuf, PipelineError> {
    let path = output_dir.join(relative);
    write_atomic(&path, contents.as_bytes()).map_err(|source| PipelineError::Artifact {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "Artifact written");
    Ok(path)
}

/// Build document, exclusion file and dependency manifests of a plan.
pub fn write_build_plan(output_dir: &Path, plan: &BuildPlan) -> Result<Vec<PathBuf>, PipelineError> {
    let mut written = vec![
        write_artifact(output_dir, DOCKERFILE_ARTIFACT, &plan.dockerfile())?,
        write_artifact(output_dir, DOCKERIGNORE_ARTIFACT, &plan.dockerignore())?,
    ];
    for file in &plan.dependency_files {
        written.push(write_artifact(output_dir, &file.path, &file.contents)?);
    }
    Ok(written)
}

/// Where a module's source lands in the build context: its path relative to whichever root
/// it was discovered under, or its file name under the directory for its kind.
pub fn context_path(module: &Module, tools_root: &Path, connectors_root: &Path) -> PathBuf {
    if let Ok(relative) = module.source_path.strip_prefix(tools_root) {
        return Path::new(TOOLS_CONTEXT_DIR).join(relative);
    }
    if let Ok(relative) = module.source_path.strip_prefix(connectors_root) {
        return Path::new(CONNECTORS_CONTEXT_DIR).join(relative);
    }
    let dir = match module.kind {
        ModuleKind::Tool => TOOLS_CONTEXT_DIR,
        ModuleKind::Connector => CONNECTORS_CONTEXT_DIR,
    };
    let file_name = module
        .source_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&module.name));
    Path::new(dir).join(file_name)
}

/// Replace the module source directories of the context with the discovered sources.
pub fn copy_module_sources(
    output_dir: &Path,
    modules: &[Module],
    tools_root: &Path,
    connectors_root: &Path,
) -> Result<Vec<PathBuf>, PipelineError> {
    for dir in [TOOLS_CONTEXT_DIR, CONNECTORS_CONTEXT_DIR] {
        let path = output_dir.join(dir);
        match fs::remove_dir_all(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                return Err(PipelineError::Artifact {
                    path,
                    source: e.into(),
                })
            }
            _ => {}
        }
    }

    let mut written = Vec::with_capacity(modules.len());
    for module in modules {
        let relative = context_path(module, tools_root, connectors_root);
        let path = output_dir.join(&relative);
        write_atomic(&path, module.source.as_bytes()).map_err(|source| {
            PipelineError::Artifact {
                path: path.clone(),
                source,
            }
        })?;
        written.push(path);
    }
    debug!(count = written.len(), "Module sources copied into build context");
    Ok(written)
}
