//! casedesk - command-line sign-in for the casedesk back office.
//!
//! The binary owns the session: it builds the gateway and token store from
//! config, restores any stored session, runs one command and exits.

mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use casedesk_core::config::{Config, TokenStoreKind};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for a daily rolling log file, in addition to stderr
const ENV_LOG_DIR: &str = "CASEDESK_LOG_DIR";

#[derive(Parser, Debug)]
#[command(name = "casedesk", version, about = "Sign in to the casedesk back office")]
struct Cli {
    /// API base URL, e.g. https://casedesk.example.com/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where to keep the credential pair: keyring, file or memory
    #[arg(long, global = true)]
    store: Option<TokenStoreKind>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long, env = "CASEDESK_EMAIL")]
        email: Option<String>,
    },
    /// Sign out and forget the stored credentials
    Logout,
    /// Show the signed-in user and their memberships
    Whoami,
    /// Show session state without changing it
    Status,
    /// Exchange the refresh token for a new access token
    Refresh,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "casedesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    debug!(command = ?cli.command, "casedesk starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(store) = cli.store {
        config.token_store = store;
    }
    debug!(base_url = %config.base_url, store = %config.token_store, "Config resolved");

    let mut session = casedesk_core::session_from_config(&config)?;

    let code = match cli.command {
        Command::Login { email } => {
            session.init().await;
            commands::login(&mut session, &mut config, email).await?
        }
        Command::Logout => commands::logout(&mut session).await,
        Command::Whoami => {
            session.init().await;
            commands::whoami(&session, cli.json)?
        }
        Command::Status => {
            session.init().await;
            commands::status(&session, &config, cli.json)?
        }
        Command::Refresh => commands::refresh(&mut session).await,
    };

    info!("casedesk finished");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_with_global_flags() {
        let cli = Cli::try_parse_from([
            "casedesk",
            "login",
            "--email",
            "a@b.com",
            "--store",
            "file",
            "--base-url",
            "https://example.test/api",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(TokenStoreKind::File));
        assert_eq!(cli.base_url.as_deref(), Some("https://example.test/api"));
        match cli.command {
            Command::Login { email } => assert_eq!(email.as_deref(), Some("a@b.com")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_store_is_rejected() {
        assert!(Cli::try_parse_from(["casedesk", "status", "--store", "floppy"]).is_err());
    }
}
