//! Per-notation credential extractors.
//!
//! Every extractor looks at one module and returns the raw declarations it recognises.
//! Extractors are independent: a module may declare credentials in several notations and
//! each one contributes.

use super::{CredentialType, RawCredential};
use crate::loader::literal::{balanced_span, parse_literal};
use crate::module::{Module, ModuleKind, SourceLanguage};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub trait CredentialExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this notation can appear in modules written in `language`.
    fn applies_to(&self, language: SourceLanguage) -> bool;

    /// Raw declarations found in `module`. Entries that are recognisably meant as credential
    /// declarations but malformed are reported through `warnings` and skipped.
    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential>;
}

/// Extractors in priority order.
pub fn default_credential_extractors() -> Vec<Box<dyn CredentialExtractor>> {
    vec![
        Box::new(MetadataFieldExtractor),
        Box::new(CommentTagExtractor),
        Box::new(PythonLiteralExtractor),
        Box::new(DocstringDirectiveExtractor),
        Box::new(ConnectorAuthExtractor),
    ]
}

/// Resolve a type spelling, falling back to `Secret` with a warning for unknown spellings.
fn resolve_type(
    spelling: Option<&str>,
    credential: &str,
    module: &Module,
    warnings: &mut Vec<String>,
) -> CredentialType {
    let Some(spelling) = spelling else {
        return CredentialType::Secret;
    };
    CredentialType::parse(spelling).unwrap_or_else(|| {
        warnings.push(format!(
            "{}: credential {} has unknown type '{}', treating it as secret",
            module.name, credential, spelling
        ));
        CredentialType::Secret
    })
}

/// Convert one structured entry (`{name, type, required, ...}`) into a raw declaration.
fn from_entry(
    entry: &Value,
    module: &Module,
    notation: &'static str,
    warnings: &mut Vec<String>,
) -> Option<RawCredential> {
    let Some(object) = entry.as_object() else {
        warnings.push(format!(
            "{}: ignoring credential entry that is not an object ({})",
            module.name, notation
        ));
        return None;
    };

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let Some(name) = text("name") else {
        warnings.push(format!(
            "{}: ignoring credential entry without a name ({})",
            module.name, notation
        ));
        return None;
    };

    let credential_type = resolve_type(text("type"), name, module, warnings);
    Some(RawCredential {
        name: name.to_string(),
        credential_type,
        required: object
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        description: text("description").unwrap_or_default().to_string(),
        service: text("service").map(String::from),
        validation_pattern: text("validationPattern")
            .or_else(|| text("validation_pattern"))
            .map(String::from),
        module: module.name.clone(),
        notation,
    })
}

/// `credentials: [...]` inside the metadata declaration.
pub struct MetadataFieldExtractor;

impl CredentialExtractor for MetadataFieldExtractor {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn applies_to(&self, _language: SourceLanguage) -> bool {
        true
    }

    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential> {
        match module.metadata.get("credentials") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| from_entry(entry, module, self.name(), warnings))
                .collect(),
            Some(_) => {
                warnings.push(format!(
                    "{}: metadata 'credentials' must be a list",
                    module.name
                ));
                Vec::new()
            }
        }
    }
}

fn comment_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?://+|/\*+|\*)?[ \t]*@credential[ \t]+\{([\w-]+)\}[ \t]+([A-Za-z_][A-Za-z0-9_]*)(?:[ \t]+-[ \t]*([^\n]*?))?[ \t]*(\[optional\])?[ \t]*(?:\*/)?[ \t]*$",
        )
        .expect("Invalid credential tag regex")
    })
}

/// `@credential {type} NAME - description [optional]` in script comments.
pub struct CommentTagExtractor;

impl CredentialExtractor for CommentTagExtractor {
    fn name(&self) -> &'static str {
        "comment-tag"
    }

    fn applies_to(&self, language: SourceLanguage) -> bool {
        language == SourceLanguage::TypeScript
    }

    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential> {
        comment_tag_regex()
            .captures_iter(&module.source)
            .map(|caps| {
                let name = caps[2].to_string();
                let credential_type = resolve_type(Some(&caps[1]), &name, module, warnings);
                RawCredential {
                    credential_type,
                    required: caps.get(4).is_none(),
                    description: caps
                        .get(3)
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default(),
                    service: None,
                    validation_pattern: None,
                    module: module.name.clone(),
                    notation: self.name(),
                    name,
                }
            })
            .collect()
    }
}

fn python_credentials_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:CREDENTIALS|credentials)[ \t]*(?::[^=\n]+)?=[ \t]*")
            .expect("Invalid credentials literal regex")
    })
}

/// Top-level `CREDENTIALS = [ {...}, ... ]` in Python modules.
pub struct PythonLiteralExtractor;

impl CredentialExtractor for PythonLiteralExtractor {
    fn name(&self) -> &'static str {
        "python-literal"
    }

    fn applies_to(&self, language: SourceLanguage) -> bool {
        language == SourceLanguage::Python
    }

    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential> {
        let source = &module.source;
        let mut found = Vec::new();

        for assignment in python_credentials_regex().find_iter(source) {
            let start = assignment.end();
            if !source[start..].starts_with('[') {
                continue;
            }
            let parsed = balanced_span(source, start, SourceLanguage::Python)
                .map(|len| parse_literal(&source[start..start + len], SourceLanguage::Python));

            match parsed {
                Some(Ok(Value::Array(entries))) => found.extend(
                    entries
                        .iter()
                        .filter_map(|entry| from_entry(entry, module, self.name(), warnings)),
                ),
                Some(Ok(_)) => {}
                Some(Err(err)) => warnings.push(format!(
                    "{}: CREDENTIALS block could not be parsed: {}",
                    module.name, err
                )),
                None => warnings.push(format!(
                    "{}: CREDENTIALS block is never closed",
                    module.name
                )),
            }
        }

        found
    }
}

fn docstring_regexes() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r#"(?s)"""(.*?)""""#).expect("Invalid docstring regex"),
            Regex::new(r"(?s)'''(.*?)'''").expect("Invalid docstring regex"),
        ]
    })
}

fn docstring_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*:credential[ \t]+([\w-]+)[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*:[ \t]*([^\n]*?)[ \t]*(\[optional\])?[ \t]*$",
        )
        .expect("Invalid credential directive regex")
    })
}

/// `:credential type NAME: description [optional]` inside Python docstrings.
pub struct DocstringDirectiveExtractor;

impl CredentialExtractor for DocstringDirectiveExtractor {
    fn name(&self) -> &'static str {
        "docstring-directive"
    }

    fn applies_to(&self, language: SourceLanguage) -> bool {
        language == SourceLanguage::Python
    }

    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential> {
        let mut bodies: Vec<(usize, &str)> = docstring_regexes()
            .iter()
            .flat_map(|re| re.captures_iter(&module.source))
            .filter_map(|caps| caps.get(1))
            .map(|m| (m.start(), m.as_str()))
            .collect();
        bodies.sort_by_key(|(start, _)| *start);

        let mut found = Vec::new();
        for (_, body) in bodies {
            for caps in docstring_directive_regex().captures_iter(body) {
                let name = caps[2].to_string();
                let credential_type = resolve_type(Some(&caps[1]), &name, module, warnings);
                found.push(RawCredential {
                    credential_type,
                    required: caps.get(4).is_none(),
                    description: caps[3].trim().to_string(),
                    service: None,
                    validation_pattern: None,
                    module: module.name.clone(),
                    notation: self.name(),
                    name,
                });
            }
        }
        found
    }
}

/// A connector whose `authentication` names an environment variable needs that credential.
pub struct ConnectorAuthExtractor;

impl CredentialExtractor for ConnectorAuthExtractor {
    fn name(&self) -> &'static str {
        "connector-auth"
    }

    fn applies_to(&self, _language: SourceLanguage) -> bool {
        true
    }

    fn extract(&self, module: &Module, warnings: &mut Vec<String>) -> Vec<RawCredential> {
        if module.kind != ModuleKind::Connector {
            return Vec::new();
        }
        let Some(auth) = module.metadata.authentication().and_then(Value::as_object) else {
            return Vec::new();
        };
        let Some(name) = ["envVar", "env", "credential"]
            .iter()
            .find_map(|key| auth.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Vec::new();
        };

        let kind = auth.get("type").and_then(Value::as_str);
        let credential_type = match kind.map(|k| k.trim().to_ascii_lowercase()) {
            Some(k) if k == "none" => return Vec::new(),
            Some(_) => resolve_type(kind, name, module, warnings),
            None => CredentialType::Secret,
        };

        vec![RawCredential {
            name: name.to_string(),
            credential_type,
            required: auth.get("required").and_then(Value::as_bool).unwrap_or(true),
            description: auth
                .get("description")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("Credential for the {} connector", module.name)),
            service: Some(module.name.clone()),
            validation_pattern: None,
            module: module.name.clone(),
            notation: self.name(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleMetadata;
    use serde_json::json;
    use std::path::PathBuf;

    fn module(language: SourceLanguage, metadata: Value, source: &str) -> Module {
        Module::new(
            PathBuf::from("m"),
            language,
            ModuleMetadata::from_value(metadata).unwrap(),
            None,
            source.to_string(),
        )
    }

    #[test]
    fn test_metadata_field() {
        let m = module(
            SourceLanguage::TypeScript,
            json!({"name": "weather", "credentials": [
                {"name": "WEATHER_API_KEY", "type": "api_key", "description": "Key"},
                {"name": "OPTIONAL_TOKEN", "type": "bearer", "required": false},
                "not-an-object",
            ]}),
            "",
        );
        let mut warnings = Vec::new();
        let found = MetadataFieldExtractor.extract(&m, &mut warnings);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].credential_type, CredentialType::ApiKey);
        assert!(found[0].required);
        assert_eq!(found[1].credential_type, CredentialType::Token);
        assert!(!found[1].required);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_comment_tags() {
        let source = r#"
/**
 * Weather tool.
 * @credential {api_key} WEATHER_API_KEY - API key for the weather service
 * @credential {token} CACHE_TOKEN - Cache access token [optional]
 */
// @credential {oauth} GITHUB_OAUTH
const x = "@credential {secret} NOT_IN_COMMENT";
"#;
        let m = module(SourceLanguage::TypeScript, json!({"name": "weather"}), source);
        let found = CommentTagExtractor.extract(&m, &mut Vec::new());
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["WEATHER_API_KEY", "CACHE_TOKEN", "GITHUB_OAUTH"]);
        assert_eq!(found[0].description, "API key for the weather service");
        assert!(found[0].required);
        assert!(!found[1].required);
        assert_eq!(found[1].description, "Cache access token");
        assert_eq!(found[2].credential_type, CredentialType::OAuth);
    }

    #[test]
    fn test_python_literal() {
        let source = r#"
CREDENTIALS = [
    {"name": "DB_PASSWORD", "type": "password", "required": True},
    {'name': 'DB_USER', 'type': 'secret', 'required': False},  # trailing comment
]
"#;
        let m = module(SourceLanguage::Python, json!({"name": "db"}), source);
        let found = PythonLiteralExtractor.extract(&m, &mut Vec::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].credential_type, CredentialType::Password);
        assert!(!found[1].required);
    }

    #[test]
    fn test_docstring_directives() {
        let source = r#"
"""
Database connector.

:credential password DB_PASSWORD: Database password
:credential api_key MONITORING_KEY: Metrics key [optional]
"""

def connect():
    '''
    :credential token SESSION_TOKEN: Session token
    '''
"#;
        let m = module(SourceLanguage::Python, json!({"name": "db"}), source);
        let found = DocstringDirectiveExtractor.extract(&m, &mut Vec::new());
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["DB_PASSWORD", "MONITORING_KEY", "SESSION_TOKEN"]);
        assert!(!found[1].required);
        assert_eq!(found[0].description, "Database password");
    }

    #[test]
    fn test_connector_auth_inference() {
        let m = module(
            SourceLanguage::Python,
            json!({"name": "github", "type": "api", "authentication": {"type": "oauth2", "envVar": "GITHUB_TOKEN"}}),
            "",
        );
        let found = ConnectorAuthExtractor.extract(&m, &mut Vec::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].credential_type, CredentialType::OAuth);
        assert_eq!(found[0].service.as_deref(), Some("github"));

        let tool = module(SourceLanguage::Python, json!({"name": "t"}), "");
        assert!(ConnectorAuthExtractor.extract(&tool, &mut Vec::new()).is_empty());
    }

    #[test]
    fn test_unknown_type_becomes_secret() {
        let m = module(
            SourceLanguage::TypeScript,
            json!({"name": "x", "credentials": [{"name": "X_CERT", "type": "certificate"}]}),
            "",
        );
        let mut warnings = Vec::new();
        let found = MetadataFieldExtractor.extract(&m, &mut warnings);
        assert_eq!(found[0].credential_type, CredentialType::Secret);
        assert!(warnings[0].contains("certificate"));
    }
}
