use super::ImageBuildError;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Entries of the output directory that never go to the engine.
pub const CONTEXT_EXCLUDES: &[&str] = &[".toolforge"];

/// Files under `root`, relative and sorted, with checkpoint state excluded.
pub fn context_entries(root: &Path) -> Result<Vec<PathBuf>, ImageBuildError> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !CONTEXT_EXCLUDES.iter().any(|excluded| name == *excluded)
        })
        .build();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| ImageBuildError::Context(e.to_string()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ImageBuildError::Context(e.to_string()))?
            .to_path_buf();
        trace!(path = %relative.display(), "Context entry");
        entries.push(relative);
    }

    entries.sort();
    Ok(entries)
}

/// Tar the build context in memory.
pub fn pack_context(root: &Path) -> Result<Vec<u8>, ImageBuildError> {
    let entries = context_entries(root)?;
    let mut builder = tar::Builder::new(Vec::new());
    builder.mode(tar::HeaderMode::Deterministic);

    for relative in &entries {
        builder
            .append_path_with_name(root.join(relative), relative)
            .map_err(|e| {
                ImageBuildError::Context(format!("{}: {}", relative.display(), e))
            })?;
    }

    let archive = builder
        .into_inner()
        .map_err(|e| ImageBuildError::Context(e.to_string()))?;
    debug!(files = entries.len(), bytes = archive.len(), "Build context packed");
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_checkpoints_stay_out_of_context() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM node:20-slim\n").unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        fs::write(dir.path().join("tools/calc.ts"), "export {}").unwrap();
        fs::create_dir_all(dir.path().join(".toolforge/checkpoints")).unwrap();
        fs::write(dir.path().join(".toolforge/checkpoints/manifest.json"), "{}").unwrap();
        fs::write(dir.path().join(".dockerignore"), ".git\n").unwrap();

        let entries = context_entries(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                PathBuf::from(".dockerignore"),
                PathBuf::from("Dockerfile"),
                PathBuf::from("tools/calc.ts"),
            ]
        );
    }

    #[test]
    fn test_pack_context_produces_archive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM python:3.11-slim\n").unwrap();

        let archive = pack_context(dir.path()).unwrap();
        let mut reader = tar::Archive::new(&archive[..]);
        let names: Vec<String> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["Dockerfile"]);
    }
}
