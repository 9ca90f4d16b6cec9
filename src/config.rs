//! Configuration management for toolforge
//!
//! Settings load from environment variables with defaults, CLI flags override individual
//! fields afterwards, and the result is passed explicitly to every stage. Nothing reads the
//! environment after the config is built.
//!
//! # Environment Variables
//!
//! - `TOOLFORGE_PROJECT_ROOT`: project directory - default: current directory
//! - `TOOLFORGE_TOOLS_DIR`: tools root, relative to the project - default: "tools"
//! - `TOOLFORGE_CONNECTORS_DIR`: connectors root, relative to the project - default: "connectors"
//! - `TOOLFORGE_OUTPUT_DIR`: build context output, relative to the project - default: "build"
//! - `TOOLFORGE_PROFILE`: development|production - default: "development"
//! - `TOOLFORGE_LOG_LEVEL`: logging level - default: "info"
//! - `TOOLFORGE_MAX_SCAN_DEPTH`: directory depth limit - default: "16"
//! - `TOOLFORGE_MAX_SCAN_FILES`: candidate file limit - default: "5000"
//! - `TOOLFORGE_MAX_FILE_SIZE`: per-file byte limit - default: "1048576"
//! - `TOOLFORGE_EXCLUDE`: extra comma-separated exclusion globs
//! - `TOOLFORGE_STRICT_DEPENDENCIES`: halt on unresolved dependency conflicts - default: "false"
//! - `TOOLFORGE_NODE_IMAGE`: Node base image - default: "node:20-slim"
//! - `TOOLFORGE_PYTHON_IMAGE`: Python base image - default: "python:3.11-slim"
//! - `TOOLFORGE_SCHEMA_VERSIONS`: comma-separated supported metadata schema versions - default: "1.0"
//! - `TOOLFORGE_SERVER_PORT`: port the generated server listens on - default: "3000"

use crate::dockerize::DockerizeConfig;
use crate::loader::{ScanConfig, DEFAULT_EXCLUDES};
use crate::server_config::{ConfigProfile, DEFAULT_SERVER_PORT};
use crate::validation::ValidatorConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TOOLS_DIR: &str = "tools";
const DEFAULT_CONNECTORS_DIR: &str = "connectors";
const DEFAULT_OUTPUT_DIR: &str = "build";
const DEFAULT_MAX_SCAN_DEPTH: usize = 16;
const DEFAULT_MAX_SCAN_FILES: usize = 5000;
const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_NODE_IMAGE: &str = "node:20-slim";
const DEFAULT_PYTHON_IMAGE: &str = "python:3.11-slim";
const DEFAULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone)]
pub struct ToolforgeConfig {
    pub project_root: PathBuf,
    pub tools_dir: PathBuf,
    pub connectors_dir: PathBuf,
    pub output_dir: PathBuf,
    pub profile: ConfigProfile,
    pub log_level: String,
    pub max_scan_depth: usize,
    pub max_scan_files: usize,
    pub max_file_size: u64,
    pub extra_excludes: Vec<String>,
    /// Halt the pipeline when a dependency conflict could only be settled by fallback.
    pub strict_dependencies: bool,
    pub node_image: String,
    pub python_image: String,
    pub supported_schema_versions: Vec<String>,
    pub server_port: u16,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

impl Default for ToolforgeConfig {
    /// Loads from `TOOLFORGE_*` environment variables, falling back to defaults for anything
    /// missing or unparseable.
    fn default() -> Self {
        let project_root = env::var("TOOLFORGE_PROJECT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let profile = env::var("TOOLFORGE_PROFILE")
            .ok()
            .and_then(|v| v.parse::<ConfigProfile>().ok())
            .unwrap_or_default();

        let log_level = env::var("TOOLFORGE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let strict_dependencies = env::var("TOOLFORGE_STRICT_DEPENDENCIES")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let mut supported_schema_versions = env_list("TOOLFORGE_SCHEMA_VERSIONS");
        if supported_schema_versions.is_empty() {
            supported_schema_versions.push(DEFAULT_SCHEMA_VERSION.to_string());
        }

        Self {
            project_root,
            tools_dir: env::var("TOOLFORGE_TOOLS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOOLS_DIR)),
            connectors_dir: env::var("TOOLFORGE_CONNECTORS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONNECTORS_DIR)),
            output_dir: env::var("TOOLFORGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            profile,
            log_level,
            max_scan_depth: env_parsed("TOOLFORGE_MAX_SCAN_DEPTH", DEFAULT_MAX_SCAN_DEPTH),
            max_scan_files: env_parsed("TOOLFORGE_MAX_SCAN_FILES", DEFAULT_MAX_SCAN_FILES),
            max_file_size: env_parsed("TOOLFORGE_MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE),
            extra_excludes: env_list("TOOLFORGE_EXCLUDE"),
            strict_dependencies,
            node_image: env::var("TOOLFORGE_NODE_IMAGE")
                .unwrap_or_else(|_| DEFAULT_NODE_IMAGE.to_string()),
            python_image: env::var("TOOLFORGE_PYTHON_IMAGE")
                .unwrap_or_else(|_| DEFAULT_PYTHON_IMAGE.to_string()),
            supported_schema_versions,
            server_port: env_parsed("TOOLFORGE_SERVER_PORT", DEFAULT_SERVER_PORT),
        }
    }
}

impl ToolforgeConfig {
    /// Defaults rooted at `project_root`, still honoring the environment for everything else.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Resolve a configured directory against the project root unless it is absolute.
    fn resolve(&self, dir: &PathBuf) -> PathBuf {
        if dir.is_absolute() {
            dir.clone()
        } else {
            self.project_root.join(dir)
        }
    }

    pub fn tools_path(&self) -> PathBuf {
        self.resolve(&self.tools_dir)
    }

    pub fn connectors_path(&self) -> PathBuf {
        self.resolve(&self.connectors_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn scan_config(&self) -> ScanConfig {
        let mut exclude: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        exclude.extend(self.extra_excludes.iter().cloned());
        ScanConfig {
            max_depth: self.max_scan_depth,
            max_files: self.max_scan_files,
            max_file_size: self.max_file_size,
            exclude,
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            supported_schema_versions: self.supported_schema_versions.clone(),
        }
    }

    pub fn dockerize_config(&self) -> DockerizeConfig {
        DockerizeConfig {
            node_image: self.node_image.clone(),
            python_image: self.python_image.clone(),
            port: self.server_port,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scan_depth == 0 || self.max_scan_depth > 64 {
            return Err(ConfigError::ValidationFailed(format!(
                "Max scan depth must be between 1 and 64, got {}",
                self.max_scan_depth
            )));
        }
        if self.max_scan_files == 0 || self.max_scan_files > 100_000 {
            return Err(ConfigError::ValidationFailed(format!(
                "Max scan files must be between 1 and 100000, got {}",
                self.max_scan_files
            )));
        }
        if self.max_file_size < 1024 {
            return Err(ConfigError::ValidationFailed(
                "Max file size must be at least 1KB".to_string(),
            ));
        }
        if self.max_file_size > 16 * 1024 * 1024 {
            return Err(ConfigError::ValidationFailed(
                "Max file size cannot exceed 16MB".to_string(),
            ));
        }
        if self.server_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "Server port must be non-zero".to_string(),
            ));
        }
        for (field, image) in [("node_image", &self.node_image), ("python_image", &self.python_image)] {
            if image.trim().is_empty() || image.contains(char::is_whitespace) {
                return Err(ConfigError::ParseError {
                    field: field.to_string(),
                    error: format!("'{}' is not an image reference", image),
                });
            }
        }
        if self.supported_schema_versions.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "At least one supported schema version is required".to_string(),
            ));
        }
        if self.tools_path() == self.connectors_path() {
            return Err(ConfigError::ValidationFailed(
                "Tools and connectors directories must differ".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("project_root".to_string(), self.project_root.display().to_string());
        map.insert("tools_dir".to_string(), self.tools_path().display().to_string());
        map.insert(
            "connectors_dir".to_string(),
            self.connectors_path().display().to_string(),
        );
        map.insert("output_dir".to_string(), self.output_path().display().to_string());
        map.insert("profile".to_string(), self.profile.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert("max_scan_depth".to_string(), self.max_scan_depth.to_string());
        map.insert("max_scan_files".to_string(), self.max_scan_files.to_string());
        map.insert("max_file_size".to_string(), self.max_file_size.to_string());
        if !self.extra_excludes.is_empty() {
            map.insert("exclude".to_string(), self.extra_excludes.join(","));
        }
        map.insert(
            "strict_dependencies".to_string(),
            self.strict_dependencies.to_string(),
        );
        map.insert("node_image".to_string(), self.node_image.clone());
        map.insert("python_image".to_string(), self.python_image.clone());
        map.insert(
            "schema_versions".to_string(),
            self.supported_schema_versions.join(","),
        );
        map.insert("server_port".to_string(), self.server_port.to_string());

        map
    }
}

impl fmt::Display for ToolforgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Toolforge Configuration:")?;
        writeln!(f, "  Project Root: {}", self.project_root.display())?;
        writeln!(f, "  Tools Dir: {}", self.tools_path().display())?;
        writeln!(f, "  Connectors Dir: {}", self.connectors_path().display())?;
        writeln!(f, "  Output Dir: {}", self.output_path().display())?;
        writeln!(f, "  Profile: {}", self.profile)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(
            f,
            "  Scan Limits: depth {}, {} files, {} bytes per file",
            self.max_scan_depth, self.max_scan_files, self.max_file_size
        )?;
        writeln!(f, "  Strict Dependencies: {}", self.strict_dependencies)?;
        writeln!(f, "  Node Image: {}", self.node_image)?;
        writeln!(f, "  Python Image: {}", self.python_image)?;
        writeln!(
            f,
            "  Schema Versions: {}",
            self.supported_schema_versions.join(", ")
        )?;
        writeln!(f, "  Server Port: {}", self.server_port)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("TOOLFORGE_PROFILE"),
            EnvGuard::unset("TOOLFORGE_MAX_SCAN_DEPTH"),
            EnvGuard::unset("TOOLFORGE_STRICT_DEPENDENCIES"),
            EnvGuard::unset("TOOLFORGE_SCHEMA_VERSIONS"),
            EnvGuard::unset("TOOLFORGE_SERVER_PORT"),
            EnvGuard::set("TOOLFORGE_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = ToolforgeConfig::for_project("/srv/project");

        assert_eq!(config.profile, ConfigProfile::Development);
        assert_eq!(config.max_scan_depth, DEFAULT_MAX_SCAN_DEPTH);
        assert!(!config.strict_dependencies);
        assert_eq!(config.supported_schema_versions, vec!["1.0"]);
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
        assert_eq!(config.tools_path(), PathBuf::from("/srv/project/tools"));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("TOOLFORGE_PROFILE", "production"),
            EnvGuard::set("TOOLFORGE_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("TOOLFORGE_MAX_SCAN_FILES", "200"),
            EnvGuard::set("TOOLFORGE_STRICT_DEPENDENCIES", "true"),
            EnvGuard::set("TOOLFORGE_EXCLUDE", "legacy/, *.gen.ts"),
            EnvGuard::set("TOOLFORGE_SCHEMA_VERSIONS", "1.0, 1.1"),
            EnvGuard::set("TOOLFORGE_OUTPUT_DIR", "/tmp/out"),
        ];

        let config = ToolforgeConfig::default();

        assert_eq!(config.profile, ConfigProfile::Production);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_scan_files, 200);
        assert!(config.strict_dependencies);
        assert_eq!(config.extra_excludes, vec!["legacy/", "*.gen.ts"]);
        assert_eq!(config.supported_schema_versions, vec!["1.0", "1.1"]);
        assert_eq!(config.output_path(), PathBuf::from("/tmp/out"));

        let scan = config.scan_config();
        assert_eq!(scan.max_files, 200);
        assert!(scan.exclude.iter().any(|e| e == "*.gen.ts"));
        assert!(scan.exclude.iter().any(|e| e == "node_modules/"));
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        let _guards = vec![
            EnvGuard::set("TOOLFORGE_MAX_SCAN_DEPTH", "deep"),
            EnvGuard::set("TOOLFORGE_PROFILE", "staging"),
        ];

        let config = ToolforgeConfig::default();
        assert_eq!(config.max_scan_depth, DEFAULT_MAX_SCAN_DEPTH);
        assert_eq!(config.profile, ConfigProfile::Development);
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid() {
        let mut config = ToolforgeConfig::for_project("/p");
        config.log_level = "info".to_string();
        config.max_scan_depth = 0;
        assert!(config.validate().is_err());

        let mut config = ToolforgeConfig::for_project("/p");
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ToolforgeConfig::for_project("/p");
        config.log_level = "info".to_string();
        config.connectors_dir = config.tools_dir.clone();
        assert!(config.validate().is_err());

        let mut config = ToolforgeConfig::for_project("/p");
        config.log_level = "info".to_string();
        config.node_image = "node 20".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let config = ToolforgeConfig::for_project("/p");
        let display = format!("{}", config);
        assert!(display.contains("Toolforge Configuration:"));
        assert!(display.contains("Profile:"));

        let map = config.to_display_map();
        assert_eq!(map["project_root"], "/p");
        assert!(map.contains_key("strict_dependencies"));
    }
}
