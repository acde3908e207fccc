//! oscq CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug};

use oscq_client::cli::{Cli, Command, ConfigAction};
use oscq_client::commands;
use oscq_client::config::ClientConfig;
use oscq_client::error::{ClientError, ClientResult};
use oscq_core::{TracingConfig, TracingOutputFormat, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
            .with_level(Level::WARN)
            .with_format(TracingOutputFormat::Compact)
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config),
        None => ClientConfig::load().map_err(ClientError::Config),
    }
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Listen => commands::session::listen(&cli, &config, &token).await,
        Command::Chat {
            ref text,
            no_bypass_keyboard,
            notify,
        } => {
            commands::session::chat(&cli, &config, text, !no_bypass_keyboard, notify, &token).await
        }
        Command::Param {
            ref name,
            ref value,
            kind,
        } => commands::session::param(&cli, &config, name, value, kind, &token).await,
        Command::Parameters => commands::session::parameters(&cli, &config, &token).await,
        Command::Config { ref action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
