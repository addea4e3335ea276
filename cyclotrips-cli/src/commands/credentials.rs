//! Credentials command - manage the keychain password.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use cyclotrips_fetch::SystemKeychain;
use cyclotrips_store::{CredentialStore, StoreError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::output::{JsonFormatter, TextFormatter};
use crate::report::CredentialsReport;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the credentials command.
#[derive(Args)]
pub struct CredentialsArgs {
    /// Credentials action.
    #[command(subcommand)]
    pub action: CredentialsAction,
}

/// Credentials actions.
#[derive(Subcommand)]
pub enum CredentialsAction {
    /// Store a password read from stdin.
    Set(UserArgs),
    /// Remove the stored password.
    Delete(UserArgs),
    /// Report whether a password is stored.
    Status(UserArgs),
}

/// Account selection.
#[derive(Args)]
pub struct UserArgs {
    /// Account username (e-mail).
    #[arg(long, short, env = "CYCLOTRIPS_USERNAME")]
    pub username: String,
}

/// Runs the credentials command.
pub async fn run(args: &CredentialsArgs, cli: &Cli) -> Result<ExitCode> {
    let store = CredentialStore::new(Arc::new(SystemKeychain::new()));
    let stdin = BufReader::new(tokio::io::stdin());

    let report = match apply(&args.action, &store, stdin).await {
        Ok(report) => report,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e}");
            }
            return Ok(ExitCode::for_failure(e.failure_kind()));
        }
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&report)?),
        OutputFormat::Text if !cli.quiet => {
            println!("{}", TextFormatter::new(!cli.no_color).format_credentials(&report));
        }
        OutputFormat::Text => {}
    }

    // `status` doubles as a check for scripts.
    if report.action == "status" && !report.stored {
        return Ok(ExitCode::Error);
    }
    Ok(ExitCode::Success)
}

/// Reads the first line of `input` without its line ending.
async fn read_secret<R: AsyncBufRead + Unpin>(mut input: R) -> Result<String, StoreError> {
    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn apply<R: AsyncBufRead + Unpin>(
    action: &CredentialsAction,
    store: &CredentialStore,
    input: R,
) -> Result<CredentialsReport, StoreError> {
    let (name, user) = match action {
        CredentialsAction::Set(user) => {
            let secret = read_secret(input).await?;
            store.store(&user.username, &secret).await?;
            ("set", user)
        }
        CredentialsAction::Delete(user) => {
            store.delete(&user.username).await?;
            ("delete", user)
        }
        CredentialsAction::Status(user) => ("status", user),
    };

    Ok(CredentialsReport {
        action: name,
        username: user.username.trim().to_string(),
        stored: store.has_secret(&user.username).await,
    })
}
