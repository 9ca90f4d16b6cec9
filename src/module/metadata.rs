use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open metadata record extracted from a module's declaration block.
///
/// Only `name`, `description` and `version` are guaranteed by discovery; everything else is
/// read through typed accessors that return `None` when a field is absent or has the wrong
/// shape. Validation decides whether a wrong shape is an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleMetadata(Map<String, Value>);

/// A declared package requirement, `name` plus the raw version constraint text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDecl {
    pub name: String,
    pub range: String,
}

impl ModuleMetadata {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
    }

    pub fn version(&self) -> Option<&str> {
        self.str_field("version")
    }

    pub fn connector_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn input_schema(&self) -> Option<&Value> {
        self.0.get("inputSchema")
    }

    pub fn authentication(&self) -> Option<&Value> {
        self.0.get("authentication")
    }

    /// Declared schema version; numeric literals such as `1.0` are accepted.
    pub fn schema_version(&self) -> Option<String> {
        match self.0.get("schemaVersion")? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Explicit capability strings; non-string entries are ignored.
    pub fn capabilities(&self) -> Vec<String> {
        string_list(self.0.get("capabilities"))
    }

    pub fn methods(&self) -> Option<Vec<String>> {
        self.0.get("methods").map(|v| string_list(Some(v)))
    }

    pub fn credentials(&self) -> Option<&Vec<Value>> {
        self.0.get("credentials").and_then(Value::as_array)
    }

    /// Dependency declarations in either object (`{"pkg": "^1.0"}`) or list
    /// (`["pkg@^1.0", "requests>=2"]`) form. Malformed entries come back as `Err` with a
    /// description of what was wrong.
    pub fn dependency_entries(&self) -> Vec<Result<DependencyDecl, String>> {
        match self.0.get("dependencies") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, range)| match range {
                    Value::String(r) => Ok(DependencyDecl {
                        name: name.trim().to_string(),
                        range: r.trim().to_string(),
                    }),
                    other => Err(format!(
                        "dependency '{}' has a non-string version constraint: {}",
                        name, other
                    )),
                })
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(spec) => parse_dependency_spec(spec)
                        .ok_or_else(|| format!("dependency '{}' is not 'name@range'", spec)),
                    other => Err(format!("dependency entry {} is not a string", other)),
                })
                .collect(),
            Some(other) => vec![Err(format!(
                "dependencies must be an object or a list, got {}",
                json_type_name(other)
            ))],
        }
    }

    /// Well-formed dependency declarations only.
    pub fn dependencies(&self) -> Vec<DependencyDecl> {
        self.dependency_entries()
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }
}

/// Split `pkg@range`, `@scope/pkg@range`, `pkg==1.0`, `pkg>=2` or bare `pkg`.
pub(crate) fn parse_dependency_spec(spec: &str) -> Option<DependencyDecl> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }

    if let Some(at) = spec.rfind('@').filter(|&i| i > 0) {
        let (name, range) = spec.split_at(at);
        return Some(DependencyDecl {
            name: name.trim().to_string(),
            range: range[1..].trim().to_string(),
        });
    }

    if let Some(op) = spec.find(['=', '<', '>', '~', '!', '^']) {
        let (name, range) = spec.split_at(op);
        if name.trim().is_empty() {
            return None;
        }
        return Some(DependencyDecl {
            name: name.trim().to_string(),
            range: range.trim().to_string(),
        });
    }

    Some(DependencyDecl {
        name: spec.to_string(),
        range: "*".to_string(),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> ModuleMetadata {
        ModuleMetadata::from_value(value).unwrap()
    }

    #[test]
    fn test_required_fields_trim_and_reject_blank() {
        let m = meta(json!({"name": "  calc ", "description": "", "version": 1}));
        assert_eq!(m.name(), Some("calc"));
        assert_eq!(m.description(), None);
        assert_eq!(m.version(), None);
    }

    #[test]
    fn test_schema_version_accepts_number() {
        assert_eq!(
            meta(json!({"schemaVersion": 1.0})).schema_version().as_deref(),
            Some("1.0")
        );
        assert_eq!(
            meta(json!({"schemaVersion": "2.0"})).schema_version().as_deref(),
            Some("2.0")
        );
        assert_eq!(meta(json!({})).schema_version(), None);
    }

    #[test]
    fn test_capabilities_skip_non_strings() {
        let m = meta(json!({"capabilities": ["math", 3, "", "io"]}));
        assert_eq!(m.capabilities(), vec!["math", "io"]);
    }

    #[test]
    fn test_dependencies_object_form() {
        let m = meta(json!({"dependencies": {"express": "^4.0.0", "bad": 4}}));
        let entries = m.dependency_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            m.dependencies(),
            vec![DependencyDecl {
                name: "express".to_string(),
                range: "^4.0.0".to_string()
            }]
        );
        assert!(entries.iter().any(|e| e.is_err()));
    }

    #[test]
    fn test_dependencies_list_form() {
        let m = meta(json!({"dependencies": ["@types/node@^20.1.0", "requests>=2.31", "lodash"]}));
        let deps = m.dependencies();
        assert_eq!(deps[0].name, "@types/node");
        assert_eq!(deps[0].range, "^20.1.0");
        assert_eq!(deps[1].name, "requests");
        assert_eq!(deps[1].range, ">=2.31");
        assert_eq!(deps[2].range, "*");
    }

    #[test]
    fn test_dependencies_wrong_container_is_error() {
        let m = meta(json!({"dependencies": "express"}));
        let entries = m.dependency_entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].as_ref().unwrap_err().contains("string"));
    }

    #[test]
    fn test_parse_dependency_spec_rejects_operator_only() {
        assert!(parse_dependency_spec(">=1.0").is_none());
        assert!(parse_dependency_spec("   ").is_none());
    }
}
