use super::{DirEntry, FileMetadata, FileSystem, FileType};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(meta: &fs::Metadata) -> FileType {
    if meta.is_file() {
        FileType::File
    } else if meta.is_dir() {
        FileType::Directory
    } else {
        FileType::Other
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let meta = fs::metadata(path).with_context(|| format!("Failed to stat {:?}", path))?;
        Ok(FileMetadata {
            size: meta.len(),
            file_type: classify(&meta),
        })
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let entries =
            fs::read_dir(path).with_context(|| format!("Failed to read directory {:?}", path))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let is_symlink = entry
                .file_type()
                .map(|t| t.is_symlink())
                .unwrap_or(false);

            // fs::metadata follows links; a dangling link fails and is reported as Other
            let file_type = fs::metadata(&path)
                .map(|m| classify(&m))
                .unwrap_or(FileType::Other);

            result.push(DirEntry {
                path,
                name,
                file_type,
                is_symlink,
            });
        }

        Ok(result)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        path.canonicalize()
            .with_context(|| format!("Failed to canonicalize path {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::create_dir(base.join("tools")).unwrap();
        fs::write(base.join("tools/calculator.ts"), "export const metadata = {};").unwrap();
        fs::write(base.join("README.md"), "docs").unwrap();

        dir
    }

    #[test]
    fn test_exists_and_kinds() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        assert!(fs.exists(temp.path()));
        assert!(fs.is_dir(&temp.path().join("tools")));
        assert!(fs.is_file(&temp.path().join("README.md")));
        assert!(!fs.exists(&temp.path().join("missing")));
    }

    #[test]
    fn test_metadata() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let meta = fs.metadata(&temp.path().join("README.md")).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 4);
    }

    #[test]
    fn test_read_dir_reports_types() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let entries = fs.read_dir(temp.path()).unwrap();
        let tools = entries.iter().find(|e| e.file_name() == "tools").unwrap();
        assert_eq!(tools.file_type(), FileType::Directory);
        assert!(!tools.is_symlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_dir_follows_symlinked_directory() {
        let temp = create_test_dir();
        std::os::unix::fs::symlink(temp.path().join("tools"), temp.path().join("linked")).unwrap();
        let fs = RealFileSystem::new();

        let entries = fs.read_dir(temp.path()).unwrap();
        let linked = entries.iter().find(|e| e.file_name() == "linked").unwrap();
        assert_eq!(linked.file_type(), FileType::Directory);
        assert!(linked.is_symlink);
        assert_eq!(
            fs.canonicalize(&temp.path().join("linked")).unwrap(),
            fs.canonicalize(&temp.path().join("tools")).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_other() {
        let temp = create_test_dir();
        std::os::unix::fs::symlink(temp.path().join("nowhere"), temp.path().join("dangling"))
            .unwrap();
        let fs = RealFileSystem::new();

        let entries = fs.read_dir(temp.path()).unwrap();
        let dangling = entries.iter().find(|e| e.file_name() == "dangling").unwrap();
        assert_eq!(dangling.file_type(), FileType::Other);
    }

    #[test]
    fn test_read_to_string_missing_file_errors() {
        let temp = create_test_dir();
        let fs = RealFileSystem::new();

        let err = fs.read_to_string(&temp.path().join("nope.ts")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
