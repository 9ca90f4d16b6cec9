//! `${NAME}` / `${NAME:-default}` placeholders, resolved from the environment when the
//! container starts.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
    /// `None` for `${NAME}`; `Some("")` for `${NAME:-}`.
    pub default: Option<String>,
}

impl Placeholder {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
        }
    }

    pub fn with_default(name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default.to_string()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    pub fn render(&self) -> String {
        match &self.default {
            Some(default) => format!("${{{}:-{}}}", self.name, default),
            None => format!("${{{}}}", self.name),
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("Invalid placeholder regex")
    })
}

/// Every distinct placeholder in `document`, in order of first appearance. When a name appears
/// both with and without a default, the required form wins.
pub fn placeholders(document: &str) -> Vec<Placeholder> {
    let mut found: Vec<Placeholder> = Vec::new();
    for caps in placeholder_regex().captures_iter(document) {
        let name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str().to_string());
        match found.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                if default.is_none() {
                    existing.default = None;
                }
            }
            None => found.push(Placeholder {
                name: name.to_string(),
                default,
            }),
        }
    }
    found
}

/// Replace every placeholder with `lookup(name)`, falling back to its default. Fails with all
/// unresolved required names at once.
pub fn substitute<F>(document: &str, lookup: F) -> Result<String, SubstitutionError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = BTreeSet::new();
    let rendered = placeholder_regex().replace_all(document, |caps: &Captures| {
        let name = &caps[1];
        match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.insert(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(SubstitutionError::Missing(missing.into_iter().collect()))
    }
}

/// [`substitute`] against the process environment.
pub fn substitute_env(document: &str) -> Result<String, SubstitutionError> {
    substitute(document, |name| std::env::var(name).ok())
}
