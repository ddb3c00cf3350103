//! Google Photos token generator
//!
//! Walks through creating a Google Cloud OAuth client, exchanges the
//! authorization code and appends `GOOGLE_PHOTOS_TOKEN=<json>` to every
//! `.env*` file of the working directory.
//!
//! Run with:
//!   cargo run -p google-photos-token
//!   cargo run -p google-photos-token -- status

mod prompt;
mod status;

use std::io;

use clap::{Parser, Subcommand};
use console::style;
use google_photos_auth::auth::{EnvFileSink, OAuthConfig, TOKEN_ENV_VAR};
use google_photos_auth::{AuthError, AuthorizationFlow};

use crate::prompt::TerminalPrompter;

/// Generate and inspect Google Photos credentials
#[derive(Parser, Debug)]
#[command(name = "google-photos-token", version)]
#[command(about = "Generate a GOOGLE_PHOTOS_TOKEN credential bundle")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the persisted token: validity, scopes and expiry
    Status,
}

async fn generate() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let sink = EnvFileSink::discover(&cwd, TOKEN_ENV_VAR)?;
    tracing::debug!(targets = ?sink.targets(), "Env file targets");

    let flow = AuthorizationFlow::new(OAuthConfig::default(), sink);
    let outcome = flow.run(&mut TerminalPrompter).await?;

    for target in &outcome.targets {
        let name = target.strip_prefix(&cwd).unwrap_or(target);
        println!("  {} {}", style("+").green(), name.display());
    }
    Ok(())
}

/// Stderr line for a failed command, `None` when the cancel outro showed it
fn error_line(
    error: &anyhow::Error,
    outro_cancel: impl FnOnce(&str) -> io::Result<()>,
) -> Option<String> {
    match error.downcast_ref::<AuthError>() {
        Some(AuthError::UserAborted(msg)) => outro_cancel(msg)
            .err()
            .map(|_| format!("{} {msg}", style("Cancelled:").yellow().bold())),
        Some(auth) => Some(format!("{} {auth}", style("Error:").red().bold())),
        None => Some(format!("{} {error:#}", style("Error:").red().bold())),
    }
}

/// Print a failed command's error
fn report(error: &anyhow::Error) {
    if let Some(line) = error_line(error, |msg| cliclack::outro_cancel(msg)) {
        eprintln!("{line}");
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Quiet by default, use RUST_LOG=google_photos_auth=debug to see logs
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("google_photos_auth=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command {
        None => generate().await,
        Some(Command::Status) => status::run(),
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }
}
