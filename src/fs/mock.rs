use super::{DirEntry, FileMetadata, FileSystem, FileType};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct MockEntry {
    pub content: Option<String>,
    pub file_type: FileType,
    pub link_target: Option<PathBuf>,
}

/// In-memory file system. Supports directory symlinks so traversal cycles can be tested.
pub struct MockFileSystem {
    files: RwLock<BTreeMap<PathBuf, MockEntry>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/mock"))
    }

    pub fn with_root(root: PathBuf) -> Self {
        let fs = Self {
            files: RwLock::new(BTreeMap::new()),
            root: root.clone(),
        };
        fs.add_dir(root);
        fs
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        let path = self.normalize_path(path.as_ref());
        let mut files = self.files.write().unwrap();

        if let Some(parent) = path.parent() {
            ensure_parents(&mut files, parent);
        }

        files.insert(
            path,
            MockEntry {
                content: Some(content.to_string()),
                file_type: FileType::File,
                link_target: None,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = self.normalize_path(path.as_ref());
        let mut files = self.files.write().unwrap();
        ensure_parents(&mut files, &path);
    }

    /// Add a symlink at `link` pointing at the directory `target`.
    pub fn add_dir_link(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = self.normalize_path(link.as_ref());
        let target = self.normalize_path(target.as_ref());
        let mut files = self.files.write().unwrap();

        if let Some(parent) = link.parent() {
            ensure_parents(&mut files, parent);
        }

        files.insert(
            link,
            MockEntry {
                content: None,
                file_type: FileType::Directory,
                link_target: Some(target),
            },
        );
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Rewrite `path` component by component through any links it crosses.
    fn resolve(&self, path: &Path) -> PathBuf {
        let files = self.files.read().unwrap();
        let mut current = PathBuf::new();
        // bounded so a self-referencing link cannot spin forever
        for component in self.normalize_path(path).components() {
            current.push(component);
            let mut hops = 0;
            while let Some(target) = files.get(&current).and_then(|e| e.link_target.clone()) {
                current = target;
                hops += 1;
                if hops > 32 {
                    break;
                }
            }
        }
        current
    }

    fn entry(&self, path: &Path) -> Option<MockEntry> {
        let resolved = self.resolve(path);
        self.files.read().unwrap().get(&resolved).cloned()
    }
}

fn ensure_parents(files: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        files.entry(current.clone()).or_insert(MockEntry {
            content: None,
            file_type: FileType::Directory,
            link_target: None,
        });
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entry(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.entry(path)
            .map(|e| e.file_type == FileType::Directory)
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.entry(path)
            .map(|e| e.file_type == FileType::File)
            .unwrap_or(false)
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let entry = self
            .entry(path)
            .ok_or_else(|| anyhow!("Path not found: {:?}", path))?;

        Ok(FileMetadata {
            size: entry.content.as_ref().map(|c| c.len() as u64).unwrap_or(0),
            file_type: entry.file_type,
        })
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entry = self
            .entry(path)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))?;

        entry
            .content
            .ok_or_else(|| anyhow!("Not a file: {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let requested = self.normalize_path(path);
        let resolved = self.resolve(path);
        let files = self.files.read().unwrap();

        match files.get(&resolved) {
            Some(entry) if entry.file_type == FileType::Directory => {}
            _ => return Err(anyhow!("Directory not found: {:?}", path)),
        }

        let mut entries = Vec::new();
        for (file_path, entry) in files.iter() {
            if file_path.parent() != Some(resolved.as_path()) {
                continue;
            }
            let name = file_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();

            entries.push(DirEntry {
                path: requested.join(&name),
                name,
                file_type: entry.file_type,
                is_symlink: entry.link_target.is_some(),
            });
        }

        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let resolved = self.resolve(path);
        if self.files.read().unwrap().contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(anyhow!("Path not found: {:?}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file_creates_parents() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/math/calculator.ts", "export const metadata = {};");

        assert!(fs.is_dir(Path::new("/mock/tools")));
        assert!(fs.is_dir(Path::new("/mock/tools/math")));
        assert!(fs.is_file(Path::new("/mock/tools/math/calculator.ts")));
    }

    #[test]
    fn test_read_to_string() {
        let fs = MockFileSystem::new();
        fs.add_file("a.py", "metadata = {}");

        let content = fs.read_to_string(Path::new("/mock/a.py")).unwrap();
        assert_eq!(content, "metadata = {}");
        assert!(fs.read_to_string(Path::new("/mock")).is_err());
    }

    #[test]
    fn test_read_dir_is_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/b.ts", "");
        fs.add_file("tools/a.ts", "");
        fs.add_dir("tools/nested");

        let entries = fs.read_dir(Path::new("tools")).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name()).collect();
        assert_eq!(names, vec!["a.ts", "b.ts", "nested"]);
    }

    #[test]
    fn test_read_dir_missing_directory_errors() {
        let fs = MockFileSystem::new();
        assert!(fs.read_dir(Path::new("absent")).is_err());
    }

    #[test]
    fn test_dir_link_resolves_through_target() {
        let fs = MockFileSystem::new();
        fs.add_file("shared/common.ts", "x");
        fs.add_dir_link("tools/shared", "shared");

        assert!(fs.is_dir(Path::new("tools/shared")));
        assert!(fs.is_file(Path::new("tools/shared/common.ts")));

        let entries = fs.read_dir(Path::new("tools/shared")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), Path::new("/mock/tools/shared/common.ts"));
        assert_eq!(
            fs.canonicalize(Path::new("tools/shared")).unwrap(),
            PathBuf::from("/mock/shared")
        );
    }

    #[test]
    fn test_metadata_reports_size() {
        let fs = MockFileSystem::new();
        fs.add_file("x.ts", "hello");

        let meta = fs.metadata(Path::new("x.ts")).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 5);
    }
}
