//! Build-context generation
//!
//! Picks a build strategy from the language mix of the modules and produces the container
//! build document, the context-exclusion list and the per-runtime dependency manifests the
//! document copies. Nothing here talks to a container engine.

pub mod instruction;
pub mod strategy;

pub use instruction::Instruction;
pub use strategy::{strategy_for, BuildStrategy};

use crate::manifest::{Manifest, VersionConstraint, VersionInterval};
use crate::module::{Module, SourceLanguage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

pub const APP_DIR: &str = "/app";

/// Working subdirectories created in every image, relative to [`APP_DIR`].
pub const MODULE_DIRS: &[&str] = &["tools", "connectors", "config", "generated"];

/// Build-context exclusions emitted for every strategy.
pub const IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".gitignore",
    ".svn",
    ".hg",
    "node_modules",
    "**/node_modules",
    "__pycache__",
    "**/__pycache__",
    "*.pyc",
    ".venv",
    "venv",
    ".npm",
    ".cache",
    ".pytest_cache",
    "*.log",
    "logs",
    "npm-debug.log*",
    ".env",
    ".env.*",
    "*.env",
    ".toolforge",
    ".DS_Store",
];

pub const PACKAGE_JSON: &str = "package.json";
pub const REQUIREMENTS_TXT: &str = "requirements.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Every module is TypeScript/JavaScript.
    SingleRuntimeNode,
    /// Every module is Python.
    SingleRuntimePython,
    /// Both languages present.
    MultiStage,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::SingleRuntimeNode => write!(f, "single-runtime-node"),
            StrategyKind::SingleRuntimePython => write!(f, "single-runtime-python"),
            StrategyKind::MultiStage => write!(f, "multi-stage"),
        }
    }
}

impl StrategyKind {
    pub fn runtimes(&self) -> &'static [SourceLanguage] {
        match self {
            StrategyKind::SingleRuntimeNode => &[SourceLanguage::TypeScript],
            StrategyKind::SingleRuntimePython => &[SourceLanguage::Python],
            StrategyKind::MultiStage => &[SourceLanguage::TypeScript, SourceLanguage::Python],
        }
    }
}

/// Strategy for a module set. An empty set builds a Node image.
pub fn select_strategy(modules: &[Module]) -> StrategyKind {
    let languages: BTreeSet<SourceLanguage> = modules.iter().map(|m| m.language).collect();
    let has_node = languages.contains(&SourceLanguage::TypeScript);
    let has_python = languages.contains(&SourceLanguage::Python);

    match (has_node, has_python) {
        (true, true) => StrategyKind::MultiStage,
        (false, true) => StrategyKind::SingleRuntimePython,
        _ => StrategyKind::SingleRuntimeNode,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerizeConfig {
    pub node_image: String,
    pub python_image: String,
    pub port: u16,
}

impl Default for DockerizeConfig {
    fn default() -> Self {
        Self {
            node_image: "node:20-slim".to_string(),
            python_image: "python:3.11-slim".to_string(),
            port: crate::server_config::DEFAULT_SERVER_PORT,
        }
    }
}

/// Inputs shared by every strategy.
pub struct BuildContext<'a> {
    pub manifest: &'a Manifest,
    pub config: &'a DockerizeConfig,
    pub kind: StrategyKind,
}

/// A generated file that belongs in the build context, path relative to the context root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub strategy: StrategyKind,
    pub instructions: Vec<Instruction>,
    pub ignore_patterns: Vec<String>,
    pub dependency_files: Vec<ContextFile>,
}

impl BuildPlan {
    /// The build document handed to the container engine.
    pub fn dockerfile(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            out.push_str(&instruction.to_string());
            out.push('\n');
        }
        out
    }

    pub fn dockerignore(&self) -> String {
        let mut out = String::from("# Generated by toolforge\n");
        for pattern in &self.ignore_patterns {
            out.push_str(pattern);
            out.push('\n');
        }
        out
    }
}

pub struct Dockerizer {
    config: DockerizeConfig,
}

impl Dockerizer {
    pub fn new(config: DockerizeConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, manifest: &Manifest, modules: &[Module]) -> Result<BuildPlan> {
        let kind = select_strategy(modules);
        let strategy = strategy_for(kind);
        let ctx = BuildContext {
            manifest,
            config: &self.config,
            kind,
        };
        let instructions = strategy.instructions(&ctx);

        let (node_deps, python_deps) = split_dependencies(manifest, modules);
        let mut dependency_files = Vec::new();
        for runtime in kind.runtimes() {
            match runtime {
                SourceLanguage::TypeScript => dependency_files.push(ContextFile {
                    path: PACKAGE_JSON.to_string(),
                    contents: render_package_json(manifest, &node_deps)?,
                }),
                SourceLanguage::Python => dependency_files.push(ContextFile {
                    path: REQUIREMENTS_TXT.to_string(),
                    contents: render_requirements(&python_deps),
                }),
            }
        }

        info!(
            strategy = %kind,
            instructions = instructions.len(),
            node_dependencies = node_deps.len(),
            python_dependencies = python_deps.len(),
            "Build plan created"
        );

        Ok(BuildPlan {
            strategy: kind,
            instructions,
            ignore_patterns: IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            dependency_files,
        })
    }
}

impl Default for Dockerizer {
    fn default() -> Self {
        Self::new(DockerizeConfig::default())
    }
}

/// Resolved dependencies split by the language of the modules that declared them. A package
/// declared from both languages lands in both.
pub fn split_dependencies(
    manifest: &Manifest,
    modules: &[Module],
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut node = BTreeMap::new();
    let mut python = BTreeMap::new();

    for module in modules {
        for dep in module.metadata.dependencies() {
            let Some(version) = manifest.dependencies.get(&dep.name) else {
                debug!(package = %dep.name, "Dependency missing from manifest, skipping");
                continue;
            };
            let target = match module.language {
                SourceLanguage::TypeScript => &mut node,
                SourceLanguage::Python => &mut python,
            };
            target.insert(dep.name.clone(), version.clone());
        }
    }
    (node, python)
}

fn render_package_json(manifest: &Manifest, deps: &BTreeMap<String, String>) -> Result<String> {
    let dependencies: BTreeMap<&str, String> = deps
        .iter()
        .map(|(name, version)| (name.as_str(), npm_version(version)))
        .collect();

    let doc = json!({
        "name": manifest.name,
        "version": manifest.version,
        "private": true,
        "description": format!("MCP server with {} tool(s) and {} connector(s)", manifest.tools.len(), manifest.connectors.len()),
        "main": "generated/server.js",
        "dependencies": dependencies,
    });
    let mut text = serde_json::to_string_pretty(&doc).context("Failed to render package.json")?;
    text.push('\n');
    Ok(text)
}

/// package.json keeps npm spellings; resolved intersections and pip operators are rewritten
/// into npm comparators.
fn npm_version(version: &str) -> String {
    match VersionConstraint::parse(version) {
        Ok(constraint) if constraint.is_exact() => constraint.canonical(),
        Ok(constraint)
            if constraint.is_comparable()
                && [",", "~=", "==", "!="].iter().any(|op| version.contains(op)) =>
        {
            constraint
                .intervals()
                .iter()
                .map(VersionInterval::to_npm)
                .collect::<Vec<_>>()
                .join(" || ")
        }
        _ => version.to_string(),
    }
}

/// One PEP 440 requirement line. Ranges become comma-separated specifiers; constraints pip
/// cannot express (`||` alternatives, tags) fall back to the bare package name.
fn requirement_line(name: &str, version: &str) -> String {
    let constraint = match VersionConstraint::parse(version) {
        Ok(constraint) => constraint,
        Err(e) => {
            warn!(package = %name, error = %e, "Unparseable version, leaving requirement unpinned");
            return name.to_string();
        }
    };
    if constraint.is_exact() {
        return format!("{}=={}", name, constraint.canonical());
    }

    match constraint.intervals().as_slice() {
        [interval] => format!("{}{}", name, interval.to_pip()),
        [] => {
            warn!(package = %name, version = %version, "Version tag has no pip form, leaving requirement unpinned");
            name.to_string()
        }
        _ => {
            warn!(package = %name, version = %version, "Alternative ranges have no pip form, leaving requirement unpinned");
            name.to_string()
        }
    }
}

fn render_requirements(deps: &BTreeMap<String, String>) -> String {
    let mut out = String::from("# Generated by toolforge\n");
    for (name, version) in deps {
        out.push_str(&requirement_line(name, version));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestGenerator, ProjectInfo};
    use crate::module::ModuleMetadata;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use yare::parameterized;

    fn module(name: &str, language: SourceLanguage, extra: Value) -> Module {
        let mut metadata = json!({"name": name, "description": "d", "version": "1.0.0"});
        if let (Some(base), Value::Object(extra)) = (metadata.as_object_mut(), extra) {
            base.extend(extra);
        }
        let ext = match language {
            SourceLanguage::TypeScript => "ts",
            SourceLanguage::Python => "py",
        };
        Module::new(
            PathBuf::from(format!("tools/{}.{}", name, ext)),
            language,
            ModuleMetadata::from_value(metadata).unwrap(),
            Some("handler".to_string()),
            String::new(),
        )
    }

    fn plan(modules: &[Module]) -> BuildPlan {
        let manifest = ManifestGenerator::new(ProjectInfo::default()).generate(modules);
        Dockerizer::default().plan(&manifest, modules).unwrap()
    }

    fn line_index(dockerfile: &str, needle: &str) -> usize {
        dockerfile
            .lines()
            .position(|l| l.starts_with(needle))
            .unwrap_or_else(|| panic!("'{}' not found in:\n{}", needle, dockerfile))
    }

    #[test]
    fn test_strategy_selection() {
        let ts = module("calculator", SourceLanguage::TypeScript, json!({}));
        let ts2 = module("file-reader", SourceLanguage::TypeScript, json!({}));
        let py = module("database", SourceLanguage::Python, json!({"type": "database"}));

        assert_eq!(select_strategy(&[ts.clone(), ts2]), StrategyKind::SingleRuntimeNode);
        assert_eq!(select_strategy(&[py.clone()]), StrategyKind::SingleRuntimePython);
        assert_eq!(select_strategy(&[ts, py]), StrategyKind::MultiStage);
        assert_eq!(select_strategy(&[]), StrategyKind::SingleRuntimeNode);
    }

    #[test]
    fn test_node_plan() {
        let modules = vec![module(
            "calculator",
            SourceLanguage::TypeScript,
            json!({"dependencies": {"zod": "^3.22.0"}}),
        )];
        let plan = plan(&modules);
        let dockerfile = plan.dockerfile();

        assert!(dockerfile.contains("FROM node:20-slim"));
        assert!(dockerfile.contains("--omit=dev"));
        assert!(dockerfile.contains("mkdir -p /app/tools /app/connectors /app/config /app/generated"));
        assert!(dockerfile.contains("NODE_ENV=\"production\""));
        assert!(dockerfile.contains("MCP_CONFIG_PATH="));
        assert!(dockerfile.contains("io.toolforge.tools=\"calculator\""));
        assert!(dockerfile.contains("ENTRYPOINT ["));
        assert!(dockerfile.contains("CMD ["));
        assert!(line_index(&dockerfile, "COPY package.json") < line_index(&dockerfile, "COPY tools/"));

        assert_eq!(plan.dependency_files.len(), 1);
        let package: Value = serde_json::from_str(&plan.dependency_files[0].contents).unwrap();
        assert_eq!(package["dependencies"]["zod"], "^3.22.0");
    }

    #[test]
    fn test_python_plan() {
        let modules = vec![module(
            "summarizer",
            SourceLanguage::Python,
            json!({"dependencies": ["requests==2.31.0", "pydantic>=2.0", "numpy@^1.26"]}),
        )];
        let plan = plan(&modules);
        let dockerfile = plan.dockerfile();

        assert!(dockerfile.contains("FROM python:3.11-slim"));
        assert!(dockerfile.contains("--no-cache-dir"));
        assert!(line_index(&dockerfile, "COPY requirements.txt") < line_index(&dockerfile, "COPY tools/"));

        let requirements = &plan.dependency_files[0];
        assert_eq!(requirements.path, REQUIREMENTS_TXT);
        assert!(requirements.contents.contains("requests==2.31.0\n"));
        assert!(requirements.contents.contains("pydantic>=2.0.0\n"));
        assert!(requirements.contents.contains("numpy>=1.26.0,<2.0.0\n"));
    }

    #[parameterized(
        x_range = { "1.x", "numpy>=1.0.0,<2.0.0" },
        spaced_comparators = { ">= 1.0.0 < 2.0.0", "numpy>=1.0.0,<2.0.0" },
        hyphen = { "1.0.0 - 2.0.0", "numpy>=1.0.0,<=2.0.0" },
        caret = { "^1.26", "numpy>=1.26.0,<2.0.0" },
        tilde = { "~1.26.1", "numpy>=1.26.1,<1.27.0" },
        pip_compatible = { "~=1.26", "numpy>=1.26.0,<2.0.0" },
        resolved_intersection = { ">=1.2.0, <1.3.0", "numpy>=1.2.0,<1.3.0" },
        pinned = { "==1.26.4", "numpy==1.26.4" },
        star = { "*", "numpy" },
        alternatives = { "^1 || ^2", "numpy" },
        tag = { "latest", "numpy" },
    )]
    fn test_requirement_lines(version: &str, expected: &str) {
        assert_eq!(requirement_line("numpy", version), expected);
    }

    #[parameterized(
        caret_kept = { "^3.22.0", "^3.22.0" },
        pin = { "=4.18.2", "4.18.2" },
        resolved_intersection = { ">=1.2.0, <1.3.0", ">=1.2.0 <1.3.0" },
        pip_compatible = { "~=2.28", ">=2.28.0 <3.0.0" },
        tag_kept = { "latest", "latest" },
    )]
    fn test_npm_versions(version: &str, expected: &str) {
        assert_eq!(npm_version(version), expected);
    }

    #[test]
    fn test_multi_stage_plan_installs_both_runtimes() {
        let modules = vec![
            module("calculator", SourceLanguage::TypeScript, json!({})),
            module("database", SourceLanguage::Python, json!({"type": "database"})),
        ];
        let plan = plan(&modules);
        let dockerfile = plan.dockerfile();

        assert_eq!(plan.strategy, StrategyKind::MultiStage);
        assert!(dockerfile.contains("FROM node:20-slim AS node-deps"));
        assert!(dockerfile.contains("FROM python:3.11-slim AS python-deps"));
        assert!(dockerfile.contains("npm install --omit=dev"));
        assert!(dockerfile.contains("pip install --no-cache-dir"));
        assert!(dockerfile.contains("COPY --from=node-deps /usr/local/bin/node"));
        assert_eq!(dockerfile.matches("\nFROM ").count() + usize::from(dockerfile.starts_with("FROM ")), 3);

        let paths: Vec<&str> = plan.dependency_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![PACKAGE_JSON, REQUIREMENTS_TXT]);
    }

    #[test]
    fn test_ignore_patterns_cover_required_categories() {
        let plan = plan(&[]);
        let ignore = plan.dockerignore();
        for required in [".git", "node_modules", "__pycache__", "*.log", ".env"] {
            assert!(
                ignore.lines().any(|l| l == required),
                "missing {} in .dockerignore",
                required
            );
        }
    }

    #[test]
    fn test_shared_package_lands_in_both_manifests() {
        let modules = vec![
            module("a", SourceLanguage::TypeScript, json!({"dependencies": {"protobuf": "4.25.0"}})),
            module("b", SourceLanguage::Python, json!({"dependencies": {"protobuf": "4.25.0"}})),
        ];
        let manifest = ManifestGenerator::new(ProjectInfo::default()).generate(&modules);
        let (node, python) = split_dependencies(&manifest, &modules);
        assert_eq!(node["protobuf"], "4.25.0");
        assert_eq!(python["protobuf"], "4.25.0");
    }
}
