use clap::Parser;

use tina_dev::cli::{Cli, Commands, commands};
use tina_dev::config::{ConfigManager, LoggingConfig, Settings};
use tina_dev::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let root = match cli.root_path.clone() {
        // Resolve symlinks so watched roots match the paths notify reports.
        Some(root) => std::fs::canonicalize(&root).unwrap_or(root),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Cannot determine working directory: {e}");
                std::process::exit(1);
            }
        },
    };

    // Logging comes up before validation so config errors are reported through it.
    let logging_config = Settings::load_from(ConfigManager::new(&root).config_file())
        .map(|settings| settings.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    logging::init_with_config(&logging_config, cli.verbose);

    let outcome = match cli.command {
        Commands::Dev(args) => commands::dev::run(root, args).await,
        Commands::Build { no_client_build } => commands::build::run(root, no_client_build).await,
        Commands::Config => commands::config::run(root),
    };

    if let Err(e) = outcome {
        tracing::error!("[startup] {}: {e}", e.kind());
        std::process::exit(1);
    }
}
