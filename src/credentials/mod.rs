//! Credential requirement discovery
//!
//! Collects credential declarations from every module in every supported notation and merges
//! them by name. A merged requirement is required when any declaration requires it, and its
//! `usedBy` set names every declaring module.

pub mod extract;

pub use extract::{default_credential_extractors, CredentialExtractor};

use crate::module::Module;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
    Password,
    Token,
    Secret,
}

impl CredentialType {
    /// Accepts the spellings used across notations, case-insensitively.
    pub fn parse(spelling: &str) -> Option<Self> {
        match spelling.trim().to_ascii_lowercase().as_str() {
            "api_key" | "apikey" | "api-key" | "key" => Some(Self::ApiKey),
            "oauth" | "oauth2" => Some(Self::OAuth),
            "password" | "basic" => Some(Self::Password),
            "token" | "bearer" | "jwt" => Some(Self::Token),
            "secret" => Some(Self::Secret),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialType::ApiKey => write!(f, "api_key"),
            CredentialType::OAuth => write!(f, "oauth"),
            CredentialType::Password => write!(f, "password"),
            CredentialType::Token => write!(f, "token"),
            CredentialType::Secret => write!(f, "secret"),
        }
    }
}

/// One declaration as found in one module, before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCredential {
    pub name: String,
    pub credential_type: CredentialType,
    pub required: bool,
    pub description: String,
    pub service: Option<String>,
    pub validation_pattern: Option<String>,
    /// Name of the declaring module.
    pub module: String,
    /// Extractor that produced the declaration.
    pub notation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequirement {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_pattern: Option<String>,
    pub used_by: BTreeSet<String>,
}

/// Same credential name declared with different types. The first type is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialConflict {
    pub name: String,
    pub kept_type: CredentialType,
    pub kept_from: String,
    pub conflicting_type: CredentialType,
    pub conflicting_module: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialReport {
    pub requirements: Vec<CredentialRequirement>,
    pub conflicts: Vec<CredentialConflict>,
    pub warnings: Vec<String>,
}

fn credential_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("Invalid credential name regex"))
}

pub fn is_valid_credential_name(name: &str) -> bool {
    credential_name_regex().is_match(name)
}

pub struct CredentialDiscoverer {
    extractors: Vec<Box<dyn CredentialExtractor>>,
}

impl Default for CredentialDiscoverer {
    fn default() -> Self {
        Self {
            extractors: default_credential_extractors(),
        }
    }
}

impl CredentialDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractors(extractors: Vec<Box<dyn CredentialExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn discover(&self, modules: &[Module]) -> Vec<CredentialRequirement> {
        self.discover_with_report(modules).requirements
    }

    pub fn discover_with_report(&self, modules: &[Module]) -> CredentialReport {
        let mut aggregator = Aggregator::default();
        let mut warnings = Vec::new();

        for module in modules {
            for extractor in self
                .extractors
                .iter()
                .filter(|e| e.applies_to(module.language))
            {
                let found = extractor.extract(module, &mut warnings);
                if !found.is_empty() {
                    debug!(
                        module = %module.name,
                        notation = extractor.name(),
                        count = found.len(),
                        "Credentials declared"
                    );
                }
                for raw in found {
                    if !is_valid_credential_name(&raw.name) {
                        warnings.push(format!(
                            "{}: credential name '{}' is not an environment variable name, ignoring it",
                            raw.module, raw.name
                        ));
                        continue;
                    }
                    aggregator.add(raw);
                }
            }
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        let report = CredentialReport {
            requirements: aggregator.requirements,
            conflicts: aggregator.conflicts,
            warnings,
        };
        info!(
            credentials = report.requirements.len(),
            required = report.requirements.iter().filter(|r| r.required).count(),
            conflicts = report.conflicts.len(),
            "Credential discovery complete"
        );
        report
    }
}

/// Merges raw declarations by name in first-seen order.
#[derive(Default)]
struct Aggregator {
    requirements: Vec<CredentialRequirement>,
    index: HashMap<String, usize>,
    /// Module that first declared each credential, for conflict reporting.
    first_declared_by: HashMap<String, String>,
    conflicts: Vec<CredentialConflict>,
}

impl Aggregator {
    fn add(&mut self, raw: RawCredential) {
        let Some(&i) = self.index.get(&raw.name) else {
            self.index.insert(raw.name.clone(), self.requirements.len());
            self.first_declared_by
                .insert(raw.name.clone(), raw.module.clone());
            self.requirements.push(CredentialRequirement {
                name: raw.name,
                credential_type: raw.credential_type,
                required: raw.required,
                description: raw.description,
                service: raw.service,
                validation_pattern: raw.validation_pattern,
                used_by: BTreeSet::from([raw.module]),
            });
            return;
        };

        let existing = &mut self.requirements[i];
        existing.used_by.insert(raw.module.clone());
        existing.required |= raw.required;
        if existing.description.is_empty() {
            existing.description = raw.description;
        }
        if existing.service.is_none() {
            existing.service = raw.service;
        }
        if existing.validation_pattern.is_none() {
            existing.validation_pattern = raw.validation_pattern;
        }

        if existing.credential_type != raw.credential_type {
            let kept_from = self
                .first_declared_by
                .get(&raw.name)
                .cloned()
                .unwrap_or_default();
            warn!(
                credential = %raw.name,
                kept_type = %existing.credential_type,
                kept_from = %kept_from,
                conflicting_type = %raw.credential_type,
                conflicting_module = %raw.module,
                "Credential declared with conflicting types, keeping the first"
            );
            self.conflicts.push(CredentialConflict {
                name: raw.name,
                kept_type: existing.credential_type,
                kept_from,
                conflicting_type: raw.credential_type,
                conflicting_module: raw.module,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleMetadata, SourceLanguage};
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use yare::parameterized;

    fn module(name: &str, language: SourceLanguage, credentials: Value, source: &str) -> Module {
        Module::new(
            PathBuf::from(format!("tools/{}", name)),
            language,
            ModuleMetadata::from_value(json!({
                "name": name,
                "description": "d",
                "version": "1",
                "credentials": credentials,
            }))
            .unwrap(),
            None,
            source.to_string(),
        )
    }

    #[parameterized(
        api_key = { "api_key", CredentialType::ApiKey },
        api_dash_key = { "API-KEY", CredentialType::ApiKey },
        oauth2 = { "oauth2", CredentialType::OAuth },
        basic = { "basic", CredentialType::Password },
        bearer = { "Bearer", CredentialType::Token },
        secret = { "secret", CredentialType::Secret },
    )]
    fn test_type_spellings(spelling: &str, expected: CredentialType) {
        assert_eq!(CredentialType::parse(spelling), Some(expected));
    }

    #[test]
    fn test_required_is_ored_and_used_by_unioned() {
        let modules = vec![
            module(
                "a",
                SourceLanguage::TypeScript,
                json!([{"name": "API_KEY", "type": "api_key", "required": true}]),
                "",
            ),
            module(
                "b",
                SourceLanguage::Python,
                json!([{"name": "API_KEY", "type": "api_key", "required": false}]),
                "",
            ),
        ];
        let requirements = CredentialDiscoverer::new().discover(&modules);
        assert_eq!(requirements.len(), 1);
        assert!(requirements[0].required);
        assert_eq!(
            requirements[0].used_by,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_required_never_downgrades_regardless_of_order() {
        let modules = vec![
            module("a", SourceLanguage::TypeScript, json!([{"name": "TOKEN", "required": false}]), ""),
            module("b", SourceLanguage::TypeScript, json!([{"name": "TOKEN", "required": true}]), ""),
            module("c", SourceLanguage::TypeScript, json!([{"name": "TOKEN", "required": false}]), ""),
        ];
        let requirements = CredentialDiscoverer::new().discover(&modules);
        assert!(requirements[0].required);
        assert_eq!(requirements[0].used_by.len(), 3);
    }

    #[test]
    fn test_multiple_notations_in_one_module() {
        let source = "// @credential {token} SECOND_TOKEN - from a comment\n";
        let modules = vec![module(
            "a",
            SourceLanguage::TypeScript,
            json!([{"name": "FIRST_KEY", "type": "api_key"}]),
            source,
        )];
        let names: Vec<String> = CredentialDiscoverer::new()
            .discover(&modules)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["FIRST_KEY", "SECOND_TOKEN"]);
    }

    #[test]
    fn test_type_conflict_keeps_first_and_reports() {
        let modules = vec![
            module("a", SourceLanguage::TypeScript, json!([{"name": "SERVICE_CRED", "type": "api_key"}]), ""),
            module("b", SourceLanguage::TypeScript, json!([{"name": "SERVICE_CRED", "type": "token"}]), ""),
        ];
        let report = CredentialDiscoverer::new().discover_with_report(&modules);
        assert_eq!(report.requirements[0].credential_type, CredentialType::ApiKey);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kept_from, "a");
        assert_eq!(report.conflicts[0].conflicting_module, "b");
    }

    #[test]
    fn test_invalid_names_are_dropped() {
        let modules = vec![module(
            "a",
            SourceLanguage::TypeScript,
            json!([{"name": "lower_case"}, {"name": "GOOD_NAME"}]),
            "",
        )];
        let report = CredentialDiscoverer::new().discover_with_report(&modules);
        assert_eq!(report.requirements.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("lower_case")));
    }

    #[test]
    fn test_output_is_stable() {
        let modules: Vec<Module> = (0..5)
            .map(|i| {
                module(
                    &format!("m{}", i),
                    SourceLanguage::TypeScript,
                    json!([{"name": format!("CRED_{}", 4 - i)}, {"name": "SHARED"}]),
                    "",
                )
            })
            .collect();
        let first = CredentialDiscoverer::new().discover(&modules);
        let second = CredentialDiscoverer::new().discover(&modules);
        assert_eq!(first, second);
        assert_eq!(first[0].name, "CRED_4");
        assert_eq!(first[1].name, "SHARED");
    }
}
