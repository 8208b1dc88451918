//! charmcraft-pack - Build Charms in CI
//!
//! CLI entry point that dispatches to subcommands.

use charmcraft_pack::cli::{Cli, Commands};
use charmcraft_pack::config::ConfigManager;
use charmcraft_pack::error::PackResult;
use charmcraft_pack::platform::{GithubActions, PlatformIo};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let io = GithubActions::from_env();

    match run(cli, &io).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            io.set_failed(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, io: &dyn PlatformIo) -> PackResult<()> {
    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("charmcraft_pack=warn"),
        1 => EnvFilter::new("charmcraft_pack=info"),
        _ => EnvFilter::new("charmcraft_pack=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    match cli.command {
        Commands::Pack(args) => charmcraft_pack::cli::commands::pack(args, &config, io).await,
        Commands::Restore(args) => {
            charmcraft_pack::cli::commands::restore(args, &config, io).await
        }
    }
}
