use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use servicenow_mcp_auth::{KeyOrigin, TokenManager, generate_secret};
use servicenow_mcp_server::{Cli, Command, Settings, TokenCommand, serve};
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    load_env_file(cli.env_file.as_deref())?;

    // Needs no settings, so it works even when the current ones are broken.
    if cli.command == Some(Command::Token(TokenCommand::GenerateSecret)) {
        println!("{}", generate_secret());
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = Settings::load(cli.config.as_deref()).context("Invalid configuration")?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    let _guard = settings
        .logging
        .init()
        .context("Failed to initialize logging")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Token(command) => {
            if settings.jwt.key_origin() == KeyOrigin::Generated {
                warn!("JWT_SECRET_KEY is not set; no previously issued token will verify");
            }
            let manager = TokenManager::new(settings.jwt);
            let output = command.execute(&manager);
            println!("{}", serde_json::to_string_pretty(&output.body)?);
            Ok(if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn load_env_file(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env"),
        },
    }
    Ok(())
}
