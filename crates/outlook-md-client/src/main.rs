//! outlook-md CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use outlook_md_client::cli::{AuthAction, Cli, Command, ConfigAction};
use outlook_md_client::commands::fetch::WindowSpec;
use outlook_md_client::config::ClientConfig;
use outlook_md_client::{ClientResult, RunContext, commands};
use outlook_md_core::{OutputFormat, TracingConfig, TracingOutputFormat, WindowKind, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    };

    let log_format = config
        .as_ref()
        .map(|c| c.logging.format)
        .unwrap_or(TracingOutputFormat::Compact);
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(log_format)) {
        eprintln!("warning: {}", e);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            on_interrupt.cancel();
        }
    });

    match run(cli, config, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig, cancel: CancellationToken) -> ClientResult<()> {
    let ctx = RunContext::new(&cli, config, cancel);
    let format: OutputFormat = cli.format.into();

    let spec = match cli.command {
        Command::Today => WindowSpec::Named(WindowKind::Today),
        Command::Tomorrow => WindowSpec::Named(WindowKind::Tomorrow),
        Command::Week => WindowSpec::Named(WindowKind::Week),
        Command::Range { start, end } => WindowSpec::Range { start, end },
        Command::Auth { action } => {
            return match action {
                AuthAction::Login => commands::auth::login(&ctx).await,
                AuthAction::Logout => commands::auth::logout(&ctx),
                AuthAction::Status => commands::auth::status(&ctx),
            };
        }
        Command::Config { action } => {
            return match action {
                ConfigAction::Path => commands::config::path(&ctx),
                ConfigAction::Dump => commands::config::dump(&ctx),
            };
        }
    };

    commands::fetch::run(&ctx, spec, format).await
}
