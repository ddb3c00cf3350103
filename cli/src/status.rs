//! `status` subcommand: inspect the persisted bundle

use chrono::{DateTime, Local};
use console::style;
use google_photos_auth::utils::redact_opt;
use google_photos_auth::{CredentialGuard, REQUIRED_SCOPE, TOKEN_ENV_VAR};

/// Load the bundle the way API code would and describe it
pub fn run() -> anyhow::Result<()> {
    let guard = CredentialGuard::from_env();
    let bundle = guard.token()?;

    println!("{} {}", style(TOKEN_ENV_VAR).bold(), style("is valid").green());
    println!("  {:<14} {}", style("client id").dim(), redact_opt(bundle.client_id.as_deref()));
    println!(
        "  {:<14} {}",
        style("access token").dim(),
        redact_opt(bundle.access_token.as_deref())
    );
    println!(
        "  {:<14} {}",
        style("refresh token").dim(),
        redact_opt(bundle.refresh_token.as_deref())
    );

    for scope in bundle.granted_scopes() {
        let marker = if scope == REQUIRED_SCOPE {
            style("*").green()
        } else {
            style(" ").dim()
        };
        println!("  {:<14} {marker} {scope}", style("scope").dim());
    }

    let expiry = bundle
        .expiry_date
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match bundle.remaining_validity() {
        Some(left) => println!(
            "  {:<14} {expiry} ({} min left)",
            style("expires").dim(),
            left.as_secs() / 60
        ),
        None => println!(
            "  {:<14} {expiry} {}",
            style("expires").dim(),
            style("(expired, refreshed on first use)").yellow()
        ),
    }

    Ok(())
}
