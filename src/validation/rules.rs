use super::{ValidationError, ValidationResult};
use crate::manifest::constraint::VersionConstraint;
use crate::module::Module;
use crate::server_config::SHARED_SERVICE;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, modules: &[Module], result: &mut ValidationResult);
}

/// Authentication kinds a connector may declare.
pub const AUTH_KINDS: &[&str] = &[
    "none", "api_key", "apikey", "api-key", "oauth", "oauth2", "basic", "bearer", "token",
    "password", "secret",
];

fn error(rule: &dyn ValidationRule, module: &Module, field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        module_name: display_name(module),
        source_path: Some(module.source_path.clone()),
        field: field.to_string(),
        message: message.into(),
        rule: rule.name().to_string(),
    }
}

fn display_name(module: &Module) -> String {
    if module.name.is_empty() {
        module.source_path.display().to_string()
    } else {
        module.name.clone()
    }
}

pub struct ToolSchemaRule;

impl ValidationRule for ToolSchemaRule {
    fn name(&self) -> &'static str {
        "ToolSchema"
    }

    fn check(&self, modules: &[Module], result: &mut ValidationResult) {
        for module in modules.iter().filter(|m| m.is_tool()) {
            let metadata = &module.metadata;
            if metadata.name().is_none() {
                result.push_error(error(self, module, "name", "Tool name is required"));
            }
            if metadata.description().is_none() {
                result.push_error(error(self, module, "description", "Tool description is required"));
            }
            if let Some(schema) = metadata.input_schema() {
                if !schema.is_object() {
                    result.push_error(error(
                        self,
                        module,
                        "inputSchema",
                        format!(
                            "inputSchema must be an object, got {}",
                            crate::module::json_type_name(schema)
                        ),
                    ));
                }
            }
            if module.handler.is_none() {
                result.push_error(error(
                    self,
                    module,
                    "handler",
                    "No exported function or class found to invoke",
                ));
            }
        }
    }
}

pub struct ConnectorSchemaRule;

impl ConnectorSchemaRule {
    fn auth_kind(auth: &Value) -> Option<&str> {
        match auth {
            Value::String(kind) => Some(kind.as_str()),
            Value::Object(map) => map
                .get("type")
                .or_else(|| map.get("kind"))
                .and_then(Value::as_str),
            _ => None,
        }
    }
}

impl ValidationRule for ConnectorSchemaRule {
    fn name(&self) -> &'static str {
        "ConnectorSchema"
    }

    fn check(&self, modules: &[Module], result: &mut ValidationResult) {
        for module in modules.iter().filter(|m| m.is_connector()) {
            let metadata = &module.metadata;
            match metadata.name() {
                None => result.push_error(error(self, module, "name", "Connector name is required")),
                // tool-only credentials are grouped under this service name
                Some(name) if name.trim() == SHARED_SERVICE => result.push_error(error(
                    self,
                    module,
                    "name",
                    format!("Connector name '{}' is reserved", SHARED_SERVICE),
                )),
                Some(_) => {}
            }
            if metadata.connector_type().is_none() {
                result.push_error(error(
                    self,
                    module,
                    "type",
                    "Connector type must be a non-empty string",
                ));
            }

            let Some(auth) = metadata.authentication() else {
                continue;
            };
            match Self::auth_kind(auth) {
                Some(kind) if AUTH_KINDS.contains(&kind.trim().to_ascii_lowercase().as_str()) => {}
                Some(kind) => result.push_error(error(
                    self,
                    module,
                    "authentication",
                    format!(
                        "Unrecognized authentication kind '{}', expected one of: {}",
                        kind,
                        AUTH_KINDS.join(", ")
                    ),
                )),
                None => result.push_error(error(
                    self,
                    module,
                    "authentication",
                    "authentication must name its kind, e.g. { type: \"api_key\" }",
                )),
            }
        }
    }
}

/// Names must be unique across tools and connectors together.
pub struct DuplicateNameRule;

impl ValidationRule for DuplicateNameRule {
    fn name(&self) -> &'static str {
        "DuplicateName"
    }

    fn check(&self, modules: &[Module], result: &mut ValidationResult) {
        let mut first_seen: HashMap<&str, &Module> = HashMap::new();
        for module in modules.iter().filter(|m| !m.name.is_empty()) {
            match first_seen.get(module.name.as_str()) {
                Some(first) => result.push_error(error(
                    self,
                    module,
                    "name",
                    format!(
                        "Duplicate name '{}' declared by {} ({}) and {} ({})",
                        module.name,
                        first.source_path.display(),
                        first.kind,
                        module.source_path.display(),
                        module.kind
                    ),
                )),
                None => {
                    first_seen.insert(module.name.as_str(), module);
                }
            }
        }
    }
}

/// Unsupported or absent schema versions only warn.
pub struct SchemaVersionRule {
    pub supported: Vec<String>,
}

impl ValidationRule for SchemaVersionRule {
    fn name(&self) -> &'static str {
        "SchemaVersion"
    }

    fn check(&self, modules: &[Module], result: &mut ValidationResult) {
        for module in modules {
            match module.metadata.schema_version() {
                None => result.push_warning(format!(
                    "{}: no schemaVersion declared, assuming 1.0",
                    display_name(module)
                )),
                Some(version) if self.supported.iter().any(|s| *s == version) => {}
                Some(version) => result.push_warning(format!(
                    "{}: schemaVersion '{}' is not supported (supported: {}), continuing",
                    display_name(module),
                    version,
                    self.supported.join(", ")
                )),
            }
        }
    }
}

fn package_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(@[a-z0-9][\w.-]*/)?[A-Za-z0-9][\w.-]*(\[[\w,.-]+\])?$")
            .expect("Invalid package name regex")
    })
}

/// Dependencies must be `name` + parseable version constraint. Registries are never consulted.
pub struct DependencyDeclarationRule;

impl ValidationRule for DependencyDeclarationRule {
    fn name(&self) -> &'static str {
        "DependencyDeclaration"
    }

    fn check(&self, modules: &[Module], result: &mut ValidationResult) {
        for module in modules {
            for entry in module.metadata.dependency_entries() {
                let decl = match entry {
                    Ok(decl) => decl,
                    Err(message) => {
                        result.push_error(error(self, module, "dependencies", message));
                        continue;
                    }
                };
                if !package_name_regex().is_match(&decl.name) {
                    result.push_error(error(
                        self,
                        module,
                        "dependencies",
                        format!("'{}' is not a valid package name", decl.name),
                    ));
                }
                if let Err(err) = VersionConstraint::parse(&decl.range) {
                    result.push_error(error(
                        self,
                        module,
                        "dependencies",
                        format!("dependency '{}': {}", decl.name, err),
                    ));
                }
            }
        }
    }
}
