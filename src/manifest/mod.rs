//! Manifest generation
//!
//! Merges validated modules into one [`Manifest`]: tool and connector declarations in module
//! order, the sorted capability set, one resolved version per dependency and the generation
//! stamp. Everything except `metadata.generatedAt` is a pure function of the module list.

pub mod constraint;
pub mod resolver;
pub mod version_source;

pub use constraint::{ConstraintError, VersionConstraint, VersionInterval};
pub use resolver::{DependencyConflict, Resolution};
pub use version_source::ProjectInfo;

use crate::module::Module;
use chrono::{DateTime, Utc};
use resolver::DependencyRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const FALLBACK_GENERATOR_VERSION: &str = "0.1.0";

/// Version of this generator, stamped into every manifest.
pub fn generator_version() -> &'static str {
    option_env!("CARGO_PKG_VERSION").unwrap_or(FALLBACK_GENERATOR_VERSION)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDecl {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDecl {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "type")]
    pub connector_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub generated_at: DateTime<Utc>,
    pub generator_version: String,
    pub module_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub tools: Vec<ToolDecl>,
    pub connectors: Vec<ConnectorDecl>,
    pub capabilities: Vec<String>,
    pub dependencies: BTreeMap<String, String>,
    pub metadata: ManifestMetadata,
}

impl Manifest {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Manifest plus the dependency conflicts that had to be settled by fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestOutput {
    pub manifest: Manifest,
    pub conflicts: Vec<DependencyConflict>,
}

pub struct ManifestGenerator {
    project: ProjectInfo,
}

impl ManifestGenerator {
    pub fn new(project: ProjectInfo) -> Self {
        Self { project }
    }

    pub fn generate(&self, modules: &[Module]) -> Manifest {
        self.generate_with_conflicts(modules).manifest
    }

    pub fn generate_with_conflicts(&self, modules: &[Module]) -> ManifestOutput {
        self.generate_at(modules, Utc::now())
    }

    /// Generate with a fixed timestamp.
    pub fn generate_at(&self, modules: &[Module], generated_at: DateTime<Utc>) -> ManifestOutput {
        let mut tools = Vec::new();
        let mut connectors = Vec::new();

        for module in modules {
            let metadata = &module.metadata;
            let description = metadata.description().unwrap_or_default().to_string();
            let version = metadata.version().unwrap_or_default().to_string();

            if module.is_connector() {
                connectors.push(ConnectorDecl {
                    name: module.name.clone(),
                    description,
                    version,
                    connector_type: metadata.connector_type().unwrap_or_default().to_string(),
                    authentication: metadata.authentication().cloned(),
                    methods: metadata.methods(),
                });
            } else {
                tools.push(ToolDecl {
                    name: module.name.clone(),
                    description,
                    version,
                    input_schema: metadata.input_schema().cloned(),
                    handler: module.handler.clone(),
                });
            }
        }

        let capabilities = aggregate_capabilities(modules);
        let (dependencies, conflicts) = resolver::resolve_all(&collect_dependency_requests(modules));

        info!(
            tools = tools.len(),
            connectors = connectors.len(),
            capabilities = capabilities.len(),
            dependencies = dependencies.len(),
            conflicts = conflicts.len(),
            "Manifest generated"
        );

        ManifestOutput {
            manifest: Manifest {
                name: self.project.name.clone(),
                version: self.project.version.clone(),
                tools,
                connectors,
                capabilities,
                dependencies,
                metadata: ManifestMetadata {
                    generated_at,
                    generator_version: generator_version().to_string(),
                    module_count: modules.len(),
                },
            },
            conflicts,
        }
    }
}

/// Tool capabilities verbatim plus `{type}-integration` for every connector, sorted and deduplicated.
pub fn aggregate_capabilities(modules: &[Module]) -> Vec<String> {
    let mut capabilities = BTreeSet::new();
    for module in modules {
        if module.is_connector() {
            if let Some(kind) = module.metadata.connector_type() {
                capabilities.insert(format!("{}-integration", kind));
            }
        } else {
            capabilities.extend(module.metadata.capabilities());
        }
    }
    capabilities.into_iter().collect()
}

/// Group declared dependencies by package, keeping module order within each package.
pub fn collect_dependency_requests(modules: &[Module]) -> BTreeMap<String, Vec<DependencyRequest>> {
    let mut requests: BTreeMap<String, Vec<DependencyRequest>> = BTreeMap::new();
    for module in modules {
        for dep in module.metadata.dependencies() {
            debug!(module = %module.name, package = %dep.name, range = %dep.range, "Dependency declared");
            requests.entry(dep.name).or_default().push(DependencyRequest {
                range: dep.range,
                requested_by: module.name.clone(),
            });
        }
    }
    requests
}
