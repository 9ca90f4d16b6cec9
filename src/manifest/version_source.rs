use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_PROJECT_NAME: &str = "mcp-server";
pub const DEFAULT_PROJECT_VERSION: &str = "0.1.0";

/// Name and version of the service being generated, read from a project descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    /// Descriptor the values came from, `None` when defaults were used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROJECT_NAME.to_string(),
            version: DEFAULT_PROJECT_VERSION.to_string(),
            source: None,
        }
    }
}

type DescriptorParser = fn(&str) -> Option<(Option<String>, Option<String>)>;

const DESCRIPTORS: &[(&str, DescriptorParser)] = &[
    ("package.json", parse_package_json),
    ("pyproject.toml", parse_pyproject),
    ("Cargo.toml", parse_cargo_toml),
];

impl ProjectInfo {
    /// Read the first usable descriptor under `root`. Missing or malformed descriptors fall
    /// through to the next one and finally to the defaults; this never fails.
    pub fn detect(fs: &dyn FileSystem, root: &Path) -> Self {
        for (file_name, parse) in DESCRIPTORS {
            let path = root.join(file_name);
            if !fs.is_file(&path) {
                continue;
            }

            let content = match fs.read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Cannot read project descriptor");
                    continue;
                }
            };

            let Some((name, version)) = parse(&content) else {
                warn!(path = %path.display(), "Project descriptor could not be parsed");
                continue;
            };
            if name.is_none() && version.is_none() {
                continue;
            }

            let info = Self {
                name: name.unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
                version: version.unwrap_or_else(|| DEFAULT_PROJECT_VERSION.to_string()),
                source: Some(file_name.to_string()),
            };
            debug!(name = %info.name, version = %info.version, source = file_name, "Project info detected");
            return info;
        }

        debug!(root = %root.display(), "No project descriptor found, using defaults");
        Self::default()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_package_json(content: &str) -> Option<(Option<String>, Option<String>)> {
    let parsed: serde_json::Value = serde_json::from_str(content).ok()?;
    Some((
        non_empty(parsed.get("name").and_then(|v| v.as_str())),
        non_empty(parsed.get("version").and_then(|v| v.as_str())),
    ))
}

fn parse_pyproject(content: &str) -> Option<(Option<String>, Option<String>)> {
    let parsed: toml::Value = toml::from_str(content).ok()?;
    let table = parsed.get("project").or_else(|| {
        parsed
            .get("tool")
            .and_then(|t| t.get("poetry"))
    })?;
    Some((
        non_empty(table.get("name").and_then(|v| v.as_str())),
        non_empty(table.get("version").and_then(|v| v.as_str())),
    ))
}

fn parse_cargo_toml(content: &str) -> Option<(Option<String>, Option<String>)> {
    let parsed: toml::Value = toml::from_str(content).ok()?;
    let package = parsed.get("package")?;
    Some((
        non_empty(package.get("name").and_then(|v| v.as_str())),
        // `version.workspace = true` is a table, not a usable version
        non_empty(package.get("version").and_then(|v| v.as_str())),
    ))
}
