use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed.
    let _guard = match init_tracing(&cli.global) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Up(args) => commands::up::execute(args, &cli.global).await,
        Commands::Plan(args) => commands::plan::execute(args, &cli.global).await,
        Commands::SshInfo(args) => commands::ssh_info::execute(args, &cli.global).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(
    global: &cli::GlobalFlags,
) -> anyhow::Result<Option<vcbox::util::WorkerGuard>> {
    if let Some(dir) = &global.log_dir {
        return Ok(Some(vcbox::util::init_logging(dir)?));
    }

    let default_level = if global.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(None)
}
