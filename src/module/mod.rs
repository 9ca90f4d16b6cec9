//! Module records produced by discovery
//!
//! A [`Module`] is one tool or connector source file with its extracted metadata. Modules are
//! created fresh by every discovery run and never mutated afterwards; every later stage takes
//! them by shared reference.

mod metadata;

pub use metadata::{DependencyDecl, ModuleMetadata};
pub(crate) use metadata::json_type_name;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether a module exposes an invocable tool or access to an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Tool,
    Connector,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Tool => write!(f, "tool"),
            ModuleKind::Connector => write!(f, "connector"),
        }
    }
}

/// The two supported module source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    /// TypeScript or JavaScript, executed on Node.js
    TypeScript,
    /// Python, executed on CPython
    Python,
}

const TYPESCRIPT_EXTENSIONS: &[&str] = &["ts", "js", "mjs", "cjs", "mts", "cts"];
const PYTHON_EXTENSIONS: &[&str] = &["py"];

impl SourceLanguage {
    /// Language for a file path, decided by extension alone.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts") {
            return None;
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if TYPESCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceLanguage::TypeScript)
        } else if PYTHON_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceLanguage::Python)
        } else {
            None
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceLanguage::TypeScript => TYPESCRIPT_EXTENSIONS,
            SourceLanguage::Python => PYTHON_EXTENSIONS,
        }
    }

    pub fn runtime_name(&self) -> &'static str {
        match self {
            SourceLanguage::TypeScript => "node",
            SourceLanguage::Python => "python",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::TypeScript => write!(f, "typescript"),
            SourceLanguage::Python => write!(f, "python"),
        }
    }
}

/// One discovered unit of functionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub source_path: PathBuf,
    pub kind: ModuleKind,
    pub language: SourceLanguage,
    pub metadata: ModuleMetadata,
    /// Name of the exported function or class that serves this module, if one was found.
    pub handler: Option<String>,
    /// Full source text, kept for credential discovery and input fingerprinting.
    #[serde(skip)]
    pub source: String,
}

impl Module {
    pub fn new(
        source_path: PathBuf,
        language: SourceLanguage,
        metadata: ModuleMetadata,
        handler: Option<String>,
        source: String,
    ) -> Self {
        let kind = if metadata.contains("type") {
            ModuleKind::Connector
        } else {
            ModuleKind::Tool
        };
        let name = metadata.name().unwrap_or_default().to_string();

        Self {
            name,
            source_path,
            kind,
            language,
            metadata,
            handler,
            source,
        }
    }

    pub fn is_tool(&self) -> bool {
        self.kind == ModuleKind::Tool
    }

    pub fn is_connector(&self) -> bool {
        self.kind == ModuleKind::Connector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    #[parameterized(
        ts = { "tools/calc.ts", Some(SourceLanguage::TypeScript) },
        js = { "tools/calc.js", Some(SourceLanguage::TypeScript) },
        mjs = { "tools/calc.mjs", Some(SourceLanguage::TypeScript) },
        py = { "tools/calc.py", Some(SourceLanguage::Python) },
        declaration = { "tools/calc.d.ts", None },
        markdown = { "tools/README.md", None },
        no_extension = { "tools/Makefile", None },
    )]
    fn test_language_from_path(path: &str, expected: Option<SourceLanguage>) {
        assert_eq!(SourceLanguage::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_kind_follows_type_field() {
        let connector = Module::new(
            PathBuf::from("connectors/db.py"),
            SourceLanguage::Python,
            ModuleMetadata::from_value(json!({
                "name": "db", "description": "d", "version": "1.0.0", "type": "database"
            }))
            .unwrap(),
            None,
            String::new(),
        );
        assert!(connector.is_connector());
        assert_eq!(connector.name, "db");

        let tool = Module::new(
            PathBuf::from("tools/calc.ts"),
            SourceLanguage::TypeScript,
            ModuleMetadata::from_value(json!({
                "name": "calc", "description": "d", "version": "1.0.0"
            }))
            .unwrap(),
            Some("handler".to_string()),
            String::new(),
        );
        assert!(tool.is_tool());
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceLanguage::TypeScript.to_string(), "typescript");
        assert_eq!(ModuleKind::Connector.to_string(), "connector");
        assert_eq!(SourceLanguage::Python.runtime_name(), "python");
    }
}
