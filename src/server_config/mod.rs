//! Server configuration document generation
//!
//! Renders the YAML configuration the generated server reads at start. Secrets never appear
//! in the document: every credential is a `${NAME}` placeholder resolved from the environment
//! when the container starts. Profiles change default values only, never the document shape.

pub mod placeholder;

pub use placeholder::{placeholders, substitute, substitute_env, Placeholder, SubstitutionError};

use crate::credentials::CredentialRequirement;
use crate::manifest::{generator_version, Manifest};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Top-level sections every configuration document carries.
pub const REQUIRED_SECTIONS: &[&str] = &["server", "database", "services", "logging", "features"];

/// Service section holding credentials used only by tools.
pub const SHARED_SERVICE: &str = "shared";

pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigProfile {
    #[default]
    Development,
    Production,
}

impl ConfigProfile {
    pub fn host(&self) -> &'static str {
        match self {
            ConfigProfile::Development => "127.0.0.1",
            ConfigProfile::Production => "0.0.0.0",
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self {
            ConfigProfile::Development => "debug",
            ConfigProfile::Production => "info",
        }
    }
}

impl fmt::Display for ConfigProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigProfile::Development => write!(f, "development"),
            ConfigProfile::Production => write!(f, "production"),
        }
    }
}

impl FromStr for ConfigProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(ConfigProfile::Development),
            "production" | "prod" => Ok(ConfigProfile::Production),
            other => Err(format!(
                "Invalid profile '{}', expected development or production",
                other
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigDocument {
    server: ServerSection,
    database: DatabaseSection,
    services: BTreeMap<String, ServiceSection>,
    logging: LoggingSection,
    features: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize)]
struct ServerSection {
    name: String,
    version: String,
    host: String,
    port: String,
}

#[derive(Debug, Serialize)]
struct DatabaseSection {
    url: String,
    pool: PoolSection,
    timeout_ms: String,
}

#[derive(Debug, Serialize)]
struct PoolSection {
    min: String,
    max: String,
}

#[derive(Debug, Default, Serialize)]
struct ServiceSection {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    service_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    methods: Vec<String>,
    credentials: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct LoggingSection {
    level: String,
    format: String,
    destination: String,
}

fn setting(name: &str, default: &str) -> String {
    Placeholder::with_default(name, default).render()
}

fn credential_placeholder(requirement: &CredentialRequirement) -> String {
    if requirement.required {
        Placeholder::required(&requirement.name).render()
    } else {
        Placeholder::with_default(&requirement.name, "").render()
    }
}

pub struct ConfigGenerator {
    profile: ConfigProfile,
    port: u16,
}

impl ConfigGenerator {
    pub fn new(profile: ConfigProfile) -> Self {
        Self {
            profile,
            port: DEFAULT_SERVER_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn profile(&self) -> ConfigProfile {
        self.profile
    }

    /// Render the configuration document for `manifest`. `credentials` supplies credential
    /// names and whether each is required; values are never part of the document.
    pub fn generate(
        &self,
        manifest: &Manifest,
        credentials: &[CredentialRequirement],
    ) -> Result<String> {
        let mut services: BTreeMap<String, ServiceSection> = BTreeMap::new();
        for connector in &manifest.connectors {
            services.insert(
                connector.name.clone(),
                ServiceSection {
                    service_type: Some(connector.connector_type.clone()),
                    methods: connector.methods.clone().unwrap_or_default(),
                    credentials: BTreeMap::new(),
                },
            );
        }

        for requirement in credentials {
            let placeholder = credential_placeholder(requirement);
            let mut placed = false;
            for module in &requirement.used_by {
                if let Some(section) = services.get_mut(module) {
                    section
                        .credentials
                        .insert(requirement.name.clone(), placeholder.clone());
                    placed = true;
                }
            }
            if !placed {
                services
                    .entry(SHARED_SERVICE.to_string())
                    .or_default()
                    .credentials
                    .insert(requirement.name.clone(), placeholder);
            }
        }

        let document = ConfigDocument {
            server: ServerSection {
                name: manifest.name.clone(),
                version: manifest.version.clone(),
                host: setting("HOST", self.profile.host()),
                port: setting("PORT", &self.port.to_string()),
            },
            database: DatabaseSection {
                url: setting("DATABASE_URL", ""),
                pool: PoolSection {
                    min: setting("DATABASE_POOL_MIN", "2"),
                    max: setting("DATABASE_POOL_MAX", "10"),
                },
                timeout_ms: setting("DATABASE_TIMEOUT_MS", "30000"),
            },
            services,
            logging: LoggingSection {
                level: setting("LOG_LEVEL", self.profile.log_level()),
                format: setting("LOG_FORMAT", "json"),
                destination: setting("LOG_DESTINATION", "stdout"),
            },
            features: BTreeMap::new(),
        };

        let body = serde_yaml::to_string(&document).context("Failed to serialize configuration")?;
        debug!(bytes = body.len(), "Configuration serialized");
        info!(
            profile = %self.profile,
            services = document.services.len(),
            credentials = credentials.len(),
            "Configuration generated"
        );

        Ok(format!(
            "# Server configuration for {} {}\n# Profile: {}\n# Generated by toolforge {}\n# Values of the form ${{NAME}} are read from the environment at start.\n{}",
            manifest.name,
            manifest.version,
            self.profile,
            generator_version(),
            body
        ))
    }
}

/// Structural check: the document parses and has every required top-level section as a map.
pub fn validate_config(document: &str) -> bool {
    let Ok(parsed) = serde_yaml::from_str::<serde_yaml::Value>(document) else {
        return false;
    };
    let Some(root) = parsed.as_mapping() else {
        return false;
    };
    REQUIRED_SECTIONS.iter().all(|section| {
        root.get(*section)
            .map(|value| value.is_mapping())
            .unwrap_or(false)
    })
}
