//! Subcommand handlers. Each returns the process exit code.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::commands::{BuildArgs, ConfigArgs, ProjectArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::ToolforgeConfig;
use crate::credentials::CredentialDiscoverer;
use crate::fs::RealFileSystem;
use crate::image::{DockerImageBuilder, ImageRequest};
use crate::loader::{Discovery, ModuleLoader};
use crate::manifest::{ManifestGenerator, ProjectInfo};
use crate::pipeline::{PipelineContext, PipelineError, PipelineOptions, PipelineOrchestrator};
use crate::progress::NoOpHandler;
use crate::server_config::ConfigGenerator;
use crate::validation::{ValidationResult, Validator};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_VALIDATION: i32 = 2;

fn resolve_root(root: &Option<PathBuf>) -> Result<PathBuf, i32> {
    let root = match root {
        Some(root) => root.clone(),
        None => match env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to get current directory: {}", e);
                return Err(EXIT_FAILURE);
            }
        },
    };

    if !root.is_dir() {
        error!("Project path is not a directory: {}", root.display());
        return Err(EXIT_FAILURE);
    }

    match root.canonicalize() {
        Ok(path) => {
            debug!("Canonicalized project path: {}", path.display());
            Ok(path)
        }
        Err(e) => {
            error!("Failed to canonicalize project path: {}", e);
            Err(EXIT_FAILURE)
        }
    }
}

fn checked(config: ToolforgeConfig) -> Result<ToolforgeConfig, i32> {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your environment variables and command-line arguments.");
        return Err(EXIT_FAILURE);
    }
    debug!("{}", config);
    Ok(config)
}

fn print(formatter: &OutputFormatter, rendered: anyhow::Result<String>, quiet: bool) -> i32 {
    match rendered {
        Ok(text) => {
            if !(quiet && formatter.format() == OutputFormat::Human) {
                print!("{}", text);
                if !text.ends_with('\n') {
                    println!();
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            EXIT_FAILURE
        }
    }
}

fn discover(config: &ToolforgeConfig) -> Discovery {
    ModuleLoader::new(Arc::new(RealFileSystem::new()))
        .with_config(config.scan_config())
        .discover(&config.tools_path(), &config.connectors_path())
}

fn validate(config: &ToolforgeConfig, discovery: &Discovery) -> ValidationResult {
    Validator::new(&config.validator_config()).validate(&discovery.modules)
}

fn report_validation_errors(result: &ValidationResult) {
    error!("Validation failed with {} error(s)", result.errors.len());
    for err in &result.errors {
        eprintln!("  - {}", err);
    }
}

/// Discovery plus validation, shared by the commands that need a valid module set.
fn valid_discovery(config: &ToolforgeConfig) -> Result<Discovery, i32> {
    let discovery = discover(config);
    let result = validate(config, &discovery);
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    if !result.is_valid() {
        report_validation_errors(&result);
        return Err(EXIT_VALIDATION);
    }
    Ok(discovery)
}

pub async fn handle_build(args: &BuildArgs, quiet: bool, verbose: bool) -> i32 {
    info!("Starting generation run");

    let root = match resolve_root(&args.project.root) {
        Ok(root) => root,
        Err(code) => return code,
    };
    let config = match checked(args.to_config(root)) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let formatter = OutputFormatter::new(args.project.format.into());
    if verbose {
        match formatter.format_config(&config) {
            Ok(text) => eprintln!("{}", text),
            Err(e) => warn!("Failed to format configuration: {:#}", e),
        }
    }

    let options = PipelineOptions {
        dry_run: args.dry_run,
        resume: args.resume,
        image: args
            .image
            .as_ref()
            .map(|name| ImageRequest::new(name.clone(), args.tag.clone(), args.push && !args.no_push)),
    };

    let needs_engine = options.image.is_some() && !options.dry_run;
    let mut context = PipelineContext::on_disk(config, options);
    if needs_engine {
        match DockerImageBuilder::connect() {
            Ok(builder) => {
                if !builder.is_available().await {
                    error!("Docker daemon is not reachable; use --dry-run to skip the image build");
                    return EXIT_FAILURE;
                }
                context = context.with_image_builder(Arc::new(builder));
            }
            Err(e) => {
                error!("{}", e);
                return EXIT_FAILURE;
            }
        }
    }

    let mut orchestrator = PipelineOrchestrator::new();
    if quiet {
        orchestrator = orchestrator.with_progress_handler(Arc::new(NoOpHandler));
    }
    let cancel = orchestrator.cancel_flag();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = orchestrator.execute(&mut context).await;
    signal.abort();

    match result {
        Ok(summary) => print(&formatter, formatter.format_summary(&summary), quiet),
        Err(PipelineError::Validation { errors }) => {
            error!("Validation failed with {} error(s)", errors.len());
            for err in &errors {
                eprintln!("  - {}", err);
            }
            EXIT_VALIDATION
        }
        Err(PipelineError::UnresolvedDependencies { conflicts }) => {
            error!("{} unresolved dependency conflict(s)", conflicts.len());
            for conflict in &conflicts {
                eprintln!("  - {}: {}", conflict.package, conflict.reason);
            }
            EXIT_FAILURE
        }
        Err(e) => {
            error!("{}", e);
            EXIT_FAILURE
        }
    }
}

pub async fn handle_validate(args: &ProjectArgs, quiet: bool) -> i32 {
    let root = match resolve_root(&args.root) {
        Ok(root) => root,
        Err(code) => return code,
    };
    let config = match checked(args.to_config(root)) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let discovery = discover(&config);
    let result = validate(&config, &discovery);
    let formatter = OutputFormatter::new(args.format.into());
    let code = print(&formatter, formatter.format_validation(&discovery, &result), quiet);
    if code != EXIT_SUCCESS {
        return code;
    }
    if result.is_valid() {
        EXIT_SUCCESS
    } else {
        EXIT_VALIDATION
    }
}

fn project_info(root: &Path) -> ProjectInfo {
    ProjectInfo::detect(&RealFileSystem::new(), root)
}

pub async fn handle_manifest(args: &ProjectArgs, quiet: bool) -> i32 {
    let root = match resolve_root(&args.root) {
        Ok(root) => root,
        Err(code) => return code,
    };
    let config = match checked(args.to_config(root)) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let discovery = match valid_discovery(&config) {
        Ok(discovery) => discovery,
        Err(code) => return code,
    };

    let output = ManifestGenerator::new(project_info(&config.project_root))
        .generate_with_conflicts(&discovery.modules);
    let formatter = OutputFormatter::new(args.format.into());
    print(&formatter, formatter.format_manifest(&output), quiet)
}

pub async fn handle_credentials(args: &ProjectArgs, quiet: bool) -> i32 {
    let root = match resolve_root(&args.root) {
        Ok(root) => root,
        Err(code) => return code,
    };
    let config = match checked(args.to_config(root)) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let discovery = discover(&config);
    let report = CredentialDiscoverer::new().discover_with_report(&discovery.modules);
    let formatter = OutputFormatter::new(args.format.into());
    print(&formatter, formatter.format_credentials(&report), quiet)
}

pub async fn handle_config(args: &ConfigArgs, quiet: bool) -> i32 {
    let root = match resolve_root(&args.project.root) {
        Ok(root) => root,
        Err(code) => return code,
    };
    let config = match checked(args.to_config(root)) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let discovery = match valid_discovery(&config) {
        Ok(discovery) => discovery,
        Err(code) => return code,
    };

    let manifest = ManifestGenerator::new(project_info(&config.project_root))
        .generate(&discovery.modules);
    let report = CredentialDiscoverer::new().discover_with_report(&discovery.modules);
    let document = match ConfigGenerator::new(config.profile)
        .with_port(config.server_port)
        .generate(&manifest, &report.requirements)
    {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to generate configuration: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let formatter = OutputFormatter::new(args.project.format.into());
    print(
        &formatter,
        formatter.format_config_document(config.profile, &document),
        quiet,
    )
}
