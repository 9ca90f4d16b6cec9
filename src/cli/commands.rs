use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ToolforgeConfig;
use crate::server_config::ConfigProfile;

/// Assemble tool and connector modules into a deployable server build context
#[derive(Parser, Debug)]
#[command(
    name = "toolforge",
    about = "Assemble tool and connector modules into a server manifest, configuration and container build context",
    version,
    long_about = "toolforge discovers tool and connector modules written in TypeScript/JavaScript \
                  or Python, validates them, merges them into one manifest, renders the server \
                  configuration with environment placeholders and writes a container build \
                  context ready for an image build."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full generation pipeline",
        long_about = "Discovers and validates modules, generates the manifest, configuration and \
                      build context, then optionally builds and pushes the image.\n\n\
                      Examples:\n  \
                      toolforge build --dry-run\n  \
                      toolforge build ./server --image acme/mcp --tag 1.2.0 --push\n  \
                      toolforge build --resume --profile production"
    )]
    Build(BuildArgs),

    #[command(about = "Validate every discovered module")]
    Validate(ProjectArgs),

    #[command(about = "Print the merged manifest")]
    Manifest(ProjectArgs),

    #[command(about = "List aggregated credential requirements")]
    Credentials(ProjectArgs),

    #[command(
        about = "Print the server configuration document",
        long_about = "Renders the configuration document without writing it. Credentials \
                      appear only as ${NAME} placeholders.\n\n\
                      Examples:\n  \
                      toolforge config --profile production"
    )]
    Config(ConfigArgs),
}

/// Project location and output format, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    #[arg(
        value_name = "ROOT",
        help = "Project directory (defaults to current directory)"
    )]
    pub root: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Tools directory, relative to the project")]
    pub tools_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Connectors directory, relative to the project"
    )]
    pub connectors_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

impl ProjectArgs {
    /// Environment-derived configuration with this invocation's overrides applied.
    pub fn to_config(&self, root: PathBuf) -> ToolforgeConfig {
        let mut config = ToolforgeConfig::for_project(root);
        if let Some(dir) = &self.tools_dir {
            config.tools_dir = dir.clone();
        }
        if let Some(dir) = &self.connectors_dir {
            config.connectors_dir = dir.clone();
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(short = 'i', long, value_name = "NAME", help = "Image name to build")]
    pub image: Option<String>,

    #[arg(
        short = 't',
        long,
        value_name = "TAG",
        requires = "image",
        help = "Image tag (defaults to latest)"
    )]
    pub tag: Option<String>,

    #[arg(long, requires = "image", overrides_with = "no_push", help = "Push the image after building")]
    pub push: bool,

    #[arg(long, overrides_with = "push", help = "Keep the image local (default)")]
    pub no_push: bool,

    #[arg(long, help = "Generate every artifact but skip the image build")]
    pub dry_run: bool,

    #[arg(long, help = "Reuse valid checkpoints from a previous run")]
    pub resume: bool,

    #[arg(short = 'p', long, value_enum, help = "Configuration profile")]
    pub profile: Option<ProfileArg>,

    #[arg(short = 'o', long, value_name = "DIR", help = "Output directory for the build context")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Fail when a dependency conflict has no satisfying version")]
    pub strict_dependencies: bool,
}

impl BuildArgs {
    pub fn to_config(&self, root: PathBuf) -> ToolforgeConfig {
        let mut config = self.project.to_config(root);
        if let Some(profile) = self.profile {
            config.profile = profile.into();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if self.strict_dependencies {
            config.strict_dependencies = true;
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(short = 'p', long, value_enum, help = "Configuration profile")]
    pub profile: Option<ProfileArg>,

    #[arg(long, value_name = "PORT", help = "Port the generated server listens on")]
    pub port: Option<u16>,
}

impl ConfigArgs {
    pub fn to_config(&self, root: PathBuf) -> ToolforgeConfig {
        let mut config = self.project.to_config(root);
        if let Some(profile) = self.profile {
            config.profile = profile.into();
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        config
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileArg {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "prod")]
    Production,
}

impl From<ProfileArg> for ConfigProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Development => ConfigProfile::Development,
            ProfileArg::Production => ConfigProfile::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_build_args() {
        let args = CliArgs::parse_from(["toolforge", "build"]);
        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.project.format, OutputFormatArg::Human);
                assert!(build.project.root.is_none());
                assert!(build.image.is_none());
                assert!(!build.push);
                assert!(!build.dry_run);
                assert!(!build.resume);
                assert!(build.profile.is_none());
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_with_image_and_push() {
        let args = CliArgs::parse_from([
            "toolforge", "build", "/srv/server", "--image", "acme/mcp", "--tag", "1.2.0", "--push",
            "--profile", "prod",
        ]);
        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.project.root, Some(PathBuf::from("/srv/server")));
                assert_eq!(build.image.as_deref(), Some("acme/mcp"));
                assert_eq!(build.tag.as_deref(), Some("1.2.0"));
                assert!(build.push);
                assert_eq!(build.profile, Some(ProfileArg::Production));
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_no_push_overrides_push() {
        let args = CliArgs::parse_from(["toolforge", "build", "--image", "a", "--push", "--no-push"]);
        match args.command {
            Commands::Build(build) => assert!(!build.push),
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_tag_requires_image() {
        assert!(CliArgs::try_parse_from(["toolforge", "build", "--tag", "1.0"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["toolforge", "-q", "-v", "validate"]).is_err());
    }

    #[test]
    fn test_config_overrides() {
        let args = CliArgs::parse_from([
            "toolforge", "config", "/p", "--profile", "production", "--port", "8080", "--format",
            "json",
        ]);
        match args.command {
            Commands::Config(config_args) => {
                let config = config_args.to_config(PathBuf::from("/p"));
                assert_eq!(config.profile, ConfigProfile::Production);
                assert_eq!(config.server_port, 8080);
                assert_eq!(config_args.project.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_build_overrides_output_dir() {
        let args = CliArgs::parse_from([
            "toolforge", "build", "--output", "/tmp/ctx", "--tools-dir", "src/tools",
        ]);
        match args.command {
            Commands::Build(build) => {
                let config = build.to_config(PathBuf::from("/p"));
                assert_eq!(config.output_path(), PathBuf::from("/tmp/ctx"));
                assert_eq!(config.tools_path(), PathBuf::from("/p/src/tools"));
            }
            _ => panic!("Expected Build command"),
        }
    }
}
