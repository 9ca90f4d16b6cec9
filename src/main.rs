use toolforge::cli::commands::{CliArgs, Commands};
use toolforge::cli::handlers::{
    handle_build, handle_config, handle_credentials, handle_manifest, handle_validate,
};
use toolforge::util::logging::{self, parse_level, LoggingConfig};
use toolforge::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("toolforge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, args.quiet, args.verbose).await,
        Commands::Validate(project_args) => handle_validate(project_args, args.quiet).await,
        Commands::Manifest(project_args) => handle_manifest(project_args, args.quiet).await,
        Commands::Credentials(project_args) => handle_credentials(project_args, args.quiet).await,
        Commands::Config(config_args) => handle_config(config_args, args.quiet).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = logging::config_from_env();
    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    logging::init_logging(LoggingConfig {
        include_location: args.verbose,
        ..config
    });
}
