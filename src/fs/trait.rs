//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Metadata about a file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub file_type: FileType,
}

/// Type of file system entry as seen after following symlinks.
///
/// `Other` covers dangling links, sockets and anything discovery should not touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Other,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
    pub is_symlink: bool,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

/// Read-only view of the module source roots.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// List directory contents. Symlinks are reported with the type of their target.
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Resolve symlinks; used to detect directory cycles during traversal.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metadata_is_file() {
        let meta = FileMetadata {
            size: 100,
            file_type: FileType::File,
        };
        assert!(meta.is_file());
        assert!(!meta.is_dir());
        assert_eq!(meta.len(), 100);
    }

    #[test]
    fn test_file_metadata_other_is_neither() {
        let meta = FileMetadata {
            size: 0,
            file_type: FileType::Other,
        };
        assert!(!meta.is_dir());
        assert!(!meta.is_file());
        assert!(meta.is_empty());
    }

    #[test]
    fn test_dir_entry_accessors() {
        let entry = DirEntry {
            path: PathBuf::from("/tools/calculator.ts"),
            name: "calculator.ts".to_string(),
            file_type: FileType::File,
            is_symlink: false,
        };
        assert_eq!(entry.file_name(), "calculator.ts");
        assert_eq!(entry.path(), Path::new("/tools/calculator.ts"));
        assert_eq!(entry.file_type(), FileType::File);
    }
}
