mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        // .env is optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.as_deref();

    match &cli.command {
        Commands::GenerateSecret => {
            commands::config::generate_secret();
            return Ok(());
        }
        Commands::HashPassword(args) => {
            let cfg = config::load_config(path)?;
            observability::init_tracing(&cfg.logging.level);
            commands::password::hash(&cfg, args)?;
        }
        Commands::VerifyPassword(args) => {
            let cfg = config::load_config(path)?;
            observability::init_tracing(&cfg.logging.level);
            commands::password::verify(&cfg, args)?;
        }
        Commands::Demo(args) => {
            let cfg = config::load_config(path)?;
            observability::init_tracing(&cfg.logging.level);
            commands::demo::run(&cfg, args).await?;
        }
        Commands::IssueToken(args) => {
            let cfg = config::load_validated(path)?;
            observability::init_tracing(&cfg.logging.level);
            commands::token::issue(&cfg, args)?;
        }
        Commands::InspectToken(args) => {
            let cfg = config::load_validated(path)?;
            observability::init_tracing(&cfg.logging.level);
            commands::token::inspect(&cfg, args)?;
        }
        Commands::CheckConfig => {
            let cfg = config::load_validated(path)?;
            commands::config::check(&cfg)?;
        }
    }

    Ok(())
}
