//! Output formatting for multiple formats
//!
//! Every command result renders as JSON, YAML or human-readable text. Machine formats
//! serialize the library types directly; the human format is a short report.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;

use crate::config::ToolforgeConfig;
use crate::credentials::CredentialReport;
use crate::loader::Discovery;
use crate::manifest::ManifestOutput;
use crate::pipeline::PipelineSummary;
use crate::server_config::{placeholders, ConfigProfile};
use crate::validation::ValidationResult;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn machine<T: Serialize>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => {
                serde_yaml::to_string(value).with_context(|| format!("Failed to serialize {} to YAML", what))
            }
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }

    pub fn format_summary(&self, summary: &PipelineSummary) -> Result<String> {
        if self.format != OutputFormat::Human {
            return self.machine(summary, "run summary");
        }

        let mut out = String::new();
        let headline = if summary.dry_run {
            "Dry run complete"
        } else {
            "Build complete"
        };
        writeln!(out, "{}: {}", headline, summary.output_dir.display())?;
        writeln!(
            out,
            "  Modules: {} loaded, {} skipped",
            summary.modules_loaded, summary.files_skipped
        )?;
        if !summary.tools.is_empty() {
            writeln!(out, "  Tools: {}", summary.tools.join(", "))?;
        }
        if !summary.connectors.is_empty() {
            writeln!(out, "  Connectors: {}", summary.connectors.join(", "))?;
        }
        if let Some(strategy) = summary.strategy {
            writeln!(out, "  Strategy: {}", strategy)?;
        }
        if let Some(image) = &summary.image {
            writeln!(out, "  Image: {}", image)?;
        }

        writeln!(out, "\nSteps:")?;
        for report in &summary.steps {
            writeln!(
                out,
                "  {:<12} {} ({} ms)",
                report.step.as_str(),
                report.outcome,
                report.duration_ms
            )?;
        }

        if !summary.warnings.is_empty() {
            writeln!(out, "\nWarnings ({}):", summary.warnings.len())?;
            for warning in &summary.warnings {
                writeln!(out, "  - {}", warning)?;
            }
        }
        Ok(out)
    }

    pub fn format_validation(
        &self,
        discovery: &Discovery,
        result: &ValidationResult,
    ) -> Result<String> {
        if self.format != OutputFormat::Human {
            let value = json!({
                "modules": discovery.modules.iter().map(|m| json!({
                    "name": m.name,
                    "kind": m.kind,
                    "language": m.language,
                    "sourcePath": m.source_path,
                })).collect::<Vec<_>>(),
                "skipped": discovery.skipped,
                "validation": result,
            });
            return self.machine(&value, "validation result");
        }

        let mut out = String::new();
        for module in &discovery.modules {
            writeln!(
                out,
                "  {:<10} {:<11} {} ({})",
                module.kind.to_string(),
                module.language.to_string(),
                module.name,
                module.source_path.display()
            )?;
        }
        for skipped in &discovery.skipped {
            writeln!(out, "  skipped    {} ({})", skipped.path.display(), skipped.reason)?;
        }

        if result.is_valid() {
            writeln!(
                out,
                "\n{} module(s) valid, {} warning(s)",
                discovery.modules.len(),
                result.warnings.len()
            )?;
        } else {
            writeln!(out, "\nValidation failed with {} error(s):", result.errors.len())?;
            for err in &result.errors {
                writeln!(out, "  - {}", err)?;
            }
        }
        for warning in &result.warnings {
            writeln!(out, "  warning: {}", warning)?;
        }
        Ok(out)
    }

    pub fn format_manifest(&self, output: &ManifestOutput) -> Result<String> {
        match self.format {
            OutputFormat::Json => output.manifest.to_json().context("Failed to serialize manifest to JSON"),
            OutputFormat::Yaml => self.machine(&output.manifest, "manifest"),
            OutputFormat::Human => {
                let manifest = &output.manifest;
                let mut out = String::new();
                writeln!(out, "{} {}", manifest.name, manifest.version)?;
                writeln!(out, "  Tools ({}):", manifest.tools.len())?;
                for tool in &manifest.tools {
                    writeln!(out, "    {} {} - {}", tool.name, tool.version, tool.description)?;
                }
                writeln!(out, "  Connectors ({}):", manifest.connectors.len())?;
                for connector in &manifest.connectors {
                    writeln!(
                        out,
                        "    {} [{}] {} - {}",
                        connector.name, connector.connector_type, connector.version, connector.description
                    )?;
                }
                if !manifest.capabilities.is_empty() {
                    writeln!(out, "  Capabilities: {}", manifest.capabilities.join(", "))?;
                }
                if !manifest.dependencies.is_empty() {
                    writeln!(out, "  Dependencies:")?;
                    for (package, version) in &manifest.dependencies {
                        writeln!(out, "    {} {}", package, version)?;
                    }
                }
                for conflict in &output.conflicts {
                    writeln!(
                        out,
                        "  warning: {} resolved to {} ({})",
                        conflict.package, conflict.chosen, conflict.reason
                    )?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_credentials(&self, report: &CredentialReport) -> Result<String> {
        if self.format != OutputFormat::Human {
            return self.machine(report, "credential report");
        }

        let mut out = String::new();
        if report.requirements.is_empty() {
            writeln!(out, "No credentials required")?;
        }
        for requirement in &report.requirements {
            let used_by: Vec<&str> = requirement.used_by.iter().map(String::as_str).collect();
            writeln!(
                out,
                "  {:<24} {:<8} {:<9} used by {}",
                requirement.name,
                requirement.credential_type.to_string(),
                if requirement.required { "required" } else { "optional" },
                used_by.join(", ")
            )?;
            if !requirement.description.is_empty() {
                writeln!(out, "      {}", requirement.description)?;
            }
        }
        for conflict in &report.conflicts {
            writeln!(
                out,
                "  warning: {} declared as {} by {} but as {} by {}; using {}",
                conflict.name,
                conflict.kept_type,
                conflict.kept_from,
                conflict.conflicting_type,
                conflict.conflicting_module,
                conflict.kept_type
            )?;
        }
        Ok(out)
    }

    pub fn format_config_document(&self, profile: ConfigProfile, document: &str) -> Result<String> {
        match self.format {
            OutputFormat::Human | OutputFormat::Yaml => Ok(document.to_string()),
            OutputFormat::Json => {
                let found: Vec<_> = placeholders(document)
                    .into_iter()
                    .map(|p| json!({ "name": p.name, "default": p.default, "required": p.is_required() }))
                    .collect();
                self.machine(
                    &json!({ "profile": profile, "document": document, "placeholders": found }),
                    "configuration",
                )
            }
        }
    }

    pub fn format_config(&self, config: &ToolforgeConfig) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(config.to_string()),
            _ => {
                let map: std::collections::BTreeMap<_, _> = config.to_display_map().into_iter().collect();
                self.machine(&map, "config")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerize::StrategyKind;
    use crate::pipeline::{Step, StepOutcome, StepReport};
    use std::path::PathBuf;

    fn summary() -> PipelineSummary {
        PipelineSummary {
            project_root: PathBuf::from("/srv"),
            output_dir: PathBuf::from("/srv/build"),
            dry_run: true,
            modules_loaded: 2,
            files_skipped: 1,
            warnings: vec!["Skipped /srv/tools/x.ts: no metadata declaration found".to_string()],
            steps: vec![StepReport {
                step: Step::Image,
                outcome: StepOutcome::Skipped("dry run".to_string()),
                duration_ms: 0,
            }],
            tools: vec!["calculator".to_string()],
            connectors: vec!["database".to_string()],
            strategy: Some(StrategyKind::MultiStage),
            image: None,
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_human_summary() {
        let text = OutputFormatter::new(OutputFormat::Human)
            .format_summary(&summary())
            .unwrap();
        assert!(text.starts_with("Dry run complete: /srv/build"));
        assert!(text.contains("2 loaded, 1 skipped"));
        assert!(text.contains("Strategy: multi-stage"));
        assert!(text.contains("skipped (dry run)"));
        assert!(text.contains("Warnings (1):"));
    }

    #[test]
    fn test_json_summary() {
        let text = OutputFormatter::new(OutputFormat::Json)
            .format_summary(&summary())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["modulesLoaded"], 2);
        assert_eq!(value["strategy"], "multi-stage");
        assert_eq!(value["steps"][0]["outcome"]["status"], "skipped");
    }

    #[test]
    fn test_yaml_summary() {
        let text = OutputFormatter::new(OutputFormat::Yaml)
            .format_summary(&summary())
            .unwrap();
        assert!(text.contains("modulesLoaded: 2"));
    }

    #[test]
    fn test_config_document_json_lists_placeholders() {
        let doc = "server:\n  host: ${HOST:-0.0.0.0}\nservices:\n  shared:\n    credentials:\n      API_KEY: ${API_KEY}\n";
        let text = OutputFormatter::new(OutputFormat::Json)
            .format_config_document(ConfigProfile::Production, doc)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["profile"], "production");
        assert_eq!(value["placeholders"][1]["name"], "API_KEY");
        assert_eq!(value["placeholders"][1]["required"], true);
    }
}
