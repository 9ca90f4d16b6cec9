use crate::fs::{FileSystem, FileType};
use crate::module::SourceLanguage;
use ignore::overrides::{Override, OverrideBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory and file globs never treated as module sources.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/",
    "__pycache__/",
    "dist/",
    "build/",
    ".git/",
    ".venv/",
    "venv/",
    "__tests__/",
    "*.d.ts",
    "*.d.mts",
    "*.d.cts",
    "*.test.*",
    "*.spec.*",
    "test_*.py",
    "*_test.py",
    "__init__.py",
    "conftest.py",
    "setup.py",
];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub max_depth: usize,
    pub max_files: usize,
    pub max_file_size: u64,
    /// Gitignore-style globs, relative to each scanned root.
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_files: 5000,
            max_file_size: 1024 * 1024,
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub truncated: bool,
}

/// Bounded recursive enumeration of candidate source files under one root.
pub struct SourceScanner<'a> {
    fs: &'a dyn FileSystem,
    config: &'a ScanConfig,
}

impl<'a> SourceScanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: &'a ScanConfig) -> Self {
        Self { fs, config }
    }

    fn overrides(&self, root: &Path, outcome: &mut ScanOutcome) -> Override {
        let mut builder = OverrideBuilder::new(root);
        for pattern in &self.config.exclude {
            if let Err(err) = builder.add(&format!("!{}", pattern)) {
                outcome
                    .warnings
                    .push(format!("Ignoring invalid exclude pattern '{}': {}", pattern, err));
            }
        }
        builder.build().unwrap_or_else(|err| {
            outcome
                .warnings
                .push(format!("Exclude patterns could not be compiled: {}", err));
            Override::empty()
        })
    }

    /// Files under `root` whose extension belongs to a supported language, sorted by path.
    /// `remaining` caps how many more files may be accepted across all roots.
    pub fn scan(&self, root: &Path, remaining: usize) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();

        if !self.fs.exists(root) {
            outcome
                .warnings
                .push(format!("Module root {} does not exist", root.display()));
            return outcome;
        }
        if !self.fs.is_dir(root) {
            outcome
                .warnings
                .push(format!("Module root {} is not a directory", root.display()));
            return outcome;
        }

        let overrides = self.overrides(root, &mut outcome);
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut depth_warned = false;
        let mut stack = vec![(root.to_path_buf(), 0usize)];

        if let Ok(canonical) = self.fs.canonicalize(root) {
            visited.insert(canonical);
        }

        while let Some((dir, depth)) = stack.pop() {
            let mut entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "Failed to read directory");
                    outcome
                        .warnings
                        .push(format!("Failed to read directory {}: {}", dir.display(), err));
                    continue;
                }
            };
            entries.sort_by(|a, b| a.name.cmp(&b.name));

            let mut subdirs = Vec::new();
            for entry in entries {
                match entry.file_type() {
                    FileType::Directory => {
                        if overrides.matched(entry.path(), true).is_ignore() {
                            continue;
                        }
                        if depth + 1 > self.config.max_depth {
                            if !depth_warned {
                                outcome.warnings.push(format!(
                                    "Directory depth limit {} reached under {}",
                                    self.config.max_depth,
                                    root.display()
                                ));
                                depth_warned = true;
                            }
                            continue;
                        }
                        let canonical = match self.fs.canonicalize(entry.path()) {
                            Ok(c) => c,
                            Err(err) => {
                                outcome.warnings.push(format!(
                                    "Cannot resolve {}: {}",
                                    entry.path().display(),
                                    err
                                ));
                                continue;
                            }
                        };
                        if !visited.insert(canonical) {
                            debug!(path = %entry.path().display(), "Skipping already visited directory");
                            continue;
                        }
                        subdirs.push(entry.path.clone());
                    }
                    FileType::File => {
                        if SourceLanguage::from_path(entry.path()).is_none() {
                            continue;
                        }
                        if overrides.matched(entry.path(), false).is_ignore() {
                            continue;
                        }
                        if outcome.files.len() >= remaining {
                            if !outcome.truncated {
                                outcome.warnings.push(format!(
                                    "File limit {} reached, remaining files under {} ignored",
                                    self.config.max_files,
                                    root.display()
                                ));
                            }
                            outcome.truncated = true;
                            break;
                        }
                        outcome.files.push(entry.path.clone());
                    }
                    FileType::Other => {
                        debug!(path = %entry.path().display(), "Skipping non-regular entry");
                    }
                }
            }

            if outcome.truncated {
                break;
            }
            // reversed so the stack pops them in name order
            for subdir in subdirs.into_iter().rev() {
                stack.push((subdir, depth + 1));
            }
        }

        outcome.files.sort();
        outcome
    }
}
