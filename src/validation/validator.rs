use super::rules::{
    ConnectorSchemaRule, DependencyDeclarationRule, DuplicateNameRule, SchemaVersionRule,
    ToolSchemaRule, ValidationRule,
};
use super::ValidationResult;
use crate::module::Module;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub supported_schema_versions: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            supported_schema_versions: vec!["1.0".to_string()],
        }
    }
}

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            rules: vec![
                Box::new(ToolSchemaRule),
                Box::new(ConnectorSchemaRule),
                Box::new(DuplicateNameRule),
                Box::new(SchemaVersionRule {
                    supported: config.supported_schema_versions.clone(),
                }),
                Box::new(DependencyDeclarationRule),
            ],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// Run every rule over the full module set. Rules never short-circuit each other, so one
    /// pass reports every violation.
    pub fn validate(&self, modules: &[Module]) -> ValidationResult {
        let mut result = ValidationResult::default();
        for rule in &self.rules {
            let before = result.errors.len();
            rule.check(modules, &mut result);
            debug!(
                rule = rule.name(),
                errors = result.errors.len() - before,
                "Validation rule applied"
            );
        }

        for error in &result.errors {
            warn!("{}", error);
        }
        info!(
            modules = modules.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validation complete"
        );
        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&ValidatorConfig::default())
    }
}
