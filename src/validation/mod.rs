//! Module validation
//!
//! Checks the discovered modules before anything is merged: tool and connector shape,
//! name uniqueness across both kinds, the metadata schema version and dependency
//! well-formedness. Validation is a pure function of the module list.

pub mod rules;
pub mod validator;

pub use rules::ValidationRule;
pub use validator::{Validator, ValidatorConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One hard rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub module_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    pub field: String,
    pub message: String,
    pub rule: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.module_name)?;
        if let Some(path) = &self.source_path {
            write!(f, " ({})", path.display())?;
        }
        write!(f, " {}: {}", self.field, self.message)
    }
}

/// Outcome of validating a module set. `valid` is false exactly when `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.valid = false;
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
