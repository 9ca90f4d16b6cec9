//! Module discovery
//!
//! Scans the tools and connectors roots, extracts each candidate file's metadata block and
//! returns the well-formed modules sorted by source path. A file that cannot be read or has
//! no usable metadata is skipped with a warning; discovery itself never fails.

pub mod extract;
pub mod handler;
pub mod literal;
pub mod scanner;

pub use extract::{default_extractors, MetadataExtractor};
pub use scanner::{ScanConfig, SourceScanner, DEFAULT_EXCLUDES};

use crate::fs::{FileSystem, RealFileSystem};
use crate::module::{Module, SourceLanguage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const REQUIRED_FIELDS: &[&str] = &["name", "description", "version"];

/// A candidate file that did not produce a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub modules: Vec<Module>,
    pub skipped: Vec<SkippedFile>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub scan_time_ms: u64,
}

pub struct ModuleLoader {
    fs: Arc<dyn FileSystem>,
    config: ScanConfig,
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl ModuleLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            config: ScanConfig::default(),
            extractors: default_extractors(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn discover(&self, tools_root: &Path, connectors_root: &Path) -> Discovery {
        let start = Instant::now();
        let scanner = SourceScanner::new(self.fs.as_ref(), &self.config);
        let mut discovery = Discovery::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut remaining = self.config.max_files;

        info!(
            tools = %tools_root.display(),
            connectors = %connectors_root.display(),
            "Discovering modules"
        );

        for root in [tools_root, connectors_root] {
            let outcome = scanner.scan(root, remaining);
            for warning in &outcome.warnings {
                warn!("{}", warning);
            }
            discovery.warnings.extend(outcome.warnings);
            remaining = remaining.saturating_sub(outcome.files.len());

            for path in outcome.files {
                // the same file reachable from both roots is loaded once
                let canonical = self.fs.canonicalize(&path).unwrap_or_else(|_| path.clone());
                if !seen.insert(canonical) {
                    debug!(path = %path.display(), "Skipping file already discovered");
                    continue;
                }

                match self.load_file(&path) {
                    Ok(module) => {
                        debug!(
                            name = %module.name,
                            kind = %module.kind,
                            language = %module.language,
                            path = %path.display(),
                            "Loaded module"
                        );
                        discovery.modules.push(module);
                    }
                    Err(reason) => {
                        warn!(path = %path.display(), reason = %reason, "Skipping module file");
                        discovery.skipped.push(SkippedFile { path, reason });
                    }
                }
            }
        }

        discovery
            .modules
            .sort_by(|a, b| a.source_path.cmp(&b.source_path));
        discovery.scan_time_ms = start.elapsed().as_millis() as u64;

        info!(
            loaded = discovery.modules.len(),
            skipped = discovery.skipped.len(),
            scan_time_ms = discovery.scan_time_ms,
            "Module discovery complete"
        );

        discovery
    }

    fn load_file(&self, path: &Path) -> Result<Module, String> {
        let language = SourceLanguage::from_path(path)
            .ok_or_else(|| "unsupported file extension".to_string())?;

        let size = self
            .fs
            .metadata(path)
            .map(|m| m.len())
            .map_err(|e| format!("cannot stat file: {}", e))?;
        if size > self.config.max_file_size {
            return Err(format!(
                "file is {} bytes, larger than the {} byte limit",
                size, self.config.max_file_size
            ));
        }

        let source = self
            .fs
            .read_to_string(path)
            .map_err(|e| format!("cannot read file: {:#}", e))?;

        let mut parse_error = None;
        let mut metadata = None;
        for extractor in self.extractors.iter().filter(|e| e.language() == language) {
            match extractor.extract(&source) {
                Some(Ok(found)) => {
                    debug!(path = %path.display(), extractor = extractor.name(), "Metadata extracted");
                    metadata = Some(found);
                    break;
                }
                Some(Err(err)) => {
                    parse_error.get_or_insert(format!(
                        "metadata block could not be parsed ({}): {}",
                        extractor.name(),
                        err
                    ));
                }
                None => {}
            }
        }

        let metadata = match (metadata, parse_error) {
            (Some(metadata), _) => metadata,
            (None, Some(err)) => return Err(err),
            (None, None) => return Err("no metadata declaration found".to_string()),
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| match *field {
                "name" => metadata.name().is_none(),
                "description" => metadata.description().is_none(),
                _ => metadata.version().is_none(),
            })
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "missing required metadata field(s): {}",
                missing.join(", ")
            ));
        }

        let handler = handler::detect_handler(&source, language, &metadata);
        Ok(Module::new(
            path.to_path_buf(),
            language,
            metadata,
            handler,
            source,
        ))
    }
}

/// Discover modules on the real file system with default scan settings.
pub fn discover_modules(tools_root: &Path, connectors_root: &Path) -> Vec<Module> {
    ModuleLoader::new(Arc::new(RealFileSystem::new()))
        .discover(tools_root, connectors_root)
        .modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::module::ModuleKind;

    const CALCULATOR: &str = r#"
export const metadata = {
  name: "calculator",
  description: "Basic arithmetic",
  version: "1.0.0",
  inputSchema: { type: "object", properties: { a: { type: "number" } } },
};

export async function handler(input) { return input.a; }
"#;

    const DATABASE: &str = r#"
metadata = {
    "name": "database-connector",
    "description": "Connects to databases",
    "version": "1.0.0",
    "type": "database",
}

class DatabaseConnector:
    pass
"#;

    fn loader(fs: MockFileSystem) -> ModuleLoader {
        ModuleLoader::new(Arc::new(fs))
    }

    #[test]
    fn test_discover_both_roots() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/calculator.ts", CALCULATOR);
        fs.add_file("connectors/database.py", DATABASE);

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert_eq!(discovery.modules.len(), 2);
        assert!(discovery.skipped.is_empty());

        let db = &discovery.modules[0];
        assert_eq!(db.name, "database-connector");
        assert_eq!(db.kind, ModuleKind::Connector);
        assert_eq!(db.language, SourceLanguage::Python);
        assert_eq!(db.handler.as_deref(), Some("DatabaseConnector"));

        let calc = &discovery.modules[1];
        assert_eq!(calc.kind, ModuleKind::Tool);
        assert_eq!(calc.handler.as_deref(), Some("handler"));
    }

    #[test]
    fn test_missing_required_field_skips_file() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "tools/broken.ts",
            "export const metadata = { name: 'broken', description: 'no version' };",
        );
        fs.add_file("tools/calculator.ts", CALCULATOR);

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert_eq!(discovery.modules.len(), 1);
        assert_eq!(discovery.skipped.len(), 1);
        assert!(discovery.skipped[0].reason.contains("version"));
        // the absent connectors root is only a warning
        assert!(discovery.warnings.iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn test_file_without_metadata_is_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/util.ts", "export function helper() {}");

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert!(discovery.modules.is_empty());
        assert_eq!(discovery.skipped[0].reason, "no metadata declaration found");
    }

    #[test]
    fn test_unparseable_metadata_is_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/bad.ts", "export const metadata = { name: 'bad', ");

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert!(discovery.modules.is_empty());
        assert!(discovery.skipped[0].reason.contains("could not be parsed"));
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("tools/calculator.ts", CALCULATOR);

        let config = ScanConfig {
            max_file_size: 16,
            ..ScanConfig::default()
        };
        let discovery = loader(fs)
            .with_config(config)
            .discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert!(discovery.skipped[0].reason.contains("byte limit"));
    }

    #[test]
    fn test_file_reachable_from_both_roots_loads_once() {
        let fs = MockFileSystem::new();
        fs.add_file("connectors/database.py", DATABASE);
        fs.add_dir("tools");
        fs.add_dir_link("tools/connectors", "connectors");

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert_eq!(discovery.modules.len(), 1);
    }

    #[test]
    fn test_empty_roots() {
        let fs = MockFileSystem::new();
        fs.add_dir("tools");
        fs.add_dir("connectors");

        let discovery = loader(fs).discover(Path::new("/mock/tools"), Path::new("/mock/connectors"));
        assert!(discovery.modules.is_empty());
        assert!(discovery.warnings.is_empty());
    }
}
