//! RSCN Control - CLI for RSCN Drivers
//!
//! Detects GPUs, shows matching driver profiles and installs or removes
//! them through the privileged helper.

use clap::Parser;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use rscnctl::cli::{Cli, Commands};
use rscnctl::commands::{self, error_code, load_config, CommandStatus};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<CommandStatus> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { json } => commands::scan::run(&config, json)?,
        Commands::Profiles { vendor, json } => commands::profiles::run(vendor.as_deref(), json)?,
        Commands::Install { profile, optional } => {
            return commands::install::install(&config, &profile, optional).await
        }
        Commands::Remove { profile } => return commands::install::remove(&config, &profile).await,
        Commands::Fixup { target } => return commands::fixup::run(&config, target).await,
        Commands::Package { name } => commands::package::run(&config, &name)?,
        Commands::Status => commands::status::run(&config)?,
    }
    Ok(CommandStatus::Success)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(error_code(&e))
        }
    }
}
