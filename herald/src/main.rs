mod commands;
mod config;
mod observability;

use clap::Parser;
use commands::{ConnectArgs, SendArgs};
use config::{Config, ConfigError};
use notifier::ClientError;
use observability::ObservabilityError;
use relay::RelayError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "herald", version, about = "Relay notifications into JupyterLab")]
enum CliCommand {
    /// Run the notification relay
    Serve {
        /// Path to the YAML config file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Send a notification
    Send(SendArgs),
    /// Drain pending notifications and print them as JSON
    Fetch(ConnectArgs),
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Observability(#[from] ObservabilityError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("could not encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CliCommand) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli {
        CliCommand::Serve { config } => {
            let config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::default(),
            };
            let _guard =
                observability::init_server(&config.common.logging, config.common.metrics.as_ref())?;
            runtime.block_on(serve(config.relay))
        }
        CliCommand::Send(args) => {
            observability::init_client(args.connect.verbose)?;
            runtime.block_on(commands::send(args))
        }
        CliCommand::Fetch(args) => {
            observability::init_client(args.verbose)?;
            runtime.block_on(commands::fetch(args))
        }
    }
}

async fn serve(config: relay::config::Config) -> Result<(), CliError> {
    tokio::select! {
        result = relay::run(config) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c, shutting down"),
    }
    Ok(())
}
