// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use libadduser::config::Config;
use libadduser::roster::{self, RosterFile};
use libadduser::{Host, Provision, User};
use tracing::instrument;

const USAGE: &str = "Usage: add-user <username>";

/// Create a local account and install its SSH public key from a remote
/// roster.
#[derive(Parser, Debug)]
#[command(version, about, override_usage = "add-user <username>")]
struct Cli {
    /// The account to create; it must appear in the roster.
    #[arg(value_name = "username")]
    username: String,

    /// Path to a configuration file or a directory of configuration files.
    #[arg(long, env = "ADD_USER_CONFIG")]
    config: Option<PathBuf>,

    /// URL of the roster, overriding the configured one.
    #[arg(long, env = "ADD_USER_ROSTER_URL")]
    roster_url: Option<String>,
}

/// The ways a run can end without provisioning the user.
#[derive(Debug)]
enum Failure {
    Config(anyhow::Error),
    Download(anyhow::Error),
    NotInRoster,
    Provision(anyhow::Error),
}

impl Failure {
    fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            Self::Config(_) => exitcode::CONFIG,
            Self::Download(_) => exitcode::UNAVAILABLE,
            Self::NotInRoster => exitcode::NOUSER,
            Self::Provision(_) => exitcode::CANTCREAT,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Config(error) => {
                format!("Error loading configuration: {error:#}")
            }
            Self::Download(error) => {
                format!("Error downloading the roster: {error:#}")
            }
            Self::NotInRoster => {
                "User not found. Please update Pub-keys-users.txt.".to_string()
            }
            Self::Provision(error) => {
                format!("Error setting up user: {error:#}")
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error)
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            let _ = error.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            println!("{USAGE}");
            return ExitCode::from(exitcode::USAGE as u8);
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(failure) => return report(failure),
    };

    let subscriber = libadduser::logging::setup_layers(&config);
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {error}");
    }

    match add_user(&cli.username, config).await {
        Ok(()) => {
            println!("User setup successfully.");
            ExitCode::SUCCESS
        }
        Err(failure) => report(failure),
    }
}

fn report(failure: Failure) -> ExitCode {
    tracing::error!(?failure, "add-user failed");
    println!("{}", failure.message());
    ExitCode::from(failure.exit_code() as u8)
}

fn load_config(cli: &Cli) -> Result<Config, Failure> {
    let mut config = Config::load(cli.config.clone())
        .context("invalid configuration")
        .map_err(Failure::Config)?;
    if let Some(url) = &cli.roster_url {
        config.roster.url = url.clone();
    }
    Ok(config)
}

#[instrument(skip(config))]
async fn add_user(username: &str, config: Config) -> Result<(), Failure> {
    let client = libadduser::client(&config)
        .context("failed to build the HTTP client")
        .map_err(Failure::Download)?;

    let roster = roster::fetch(&client, &config.roster.url, &config.roster.local_path)
        .await
        .with_context(|| format!("failed to fetch {}", config.roster.url))
        .map_err(Failure::Download)?;

    let public_key = roster.lookup(username, config.roster.match_mode);
    cleanup(roster);
    let public_key = public_key.ok_or(Failure::NotInRoster)?;

    let host = Host::new(config.user_provisioners.backends.clone());
    let user = User::new(username, public_key)
        .with_password(config.password.default_password.clone());
    let installed = Provision::new(user, config)
        .provision(&host)
        .map_err(|error| Failure::Provision(error.into()))?;

    tracing::info!(
        target: "add_user",
        authorized_keys = %installed.authorized_keys.display(),
        "Provisioning complete"
    );
    Ok(())
}

/// Delete the downloaded roster. Failures are reported but never change the
/// outcome of the run.
fn cleanup(roster: RosterFile) {
    let path = roster.path().display().to_string();
    match roster.remove() {
        Ok(()) => println!("{path} removed successfully."),
        Err(error) => {
            tracing::warn!(?error, "Failed to remove {}", path);
            println!("Error removing {path}: {error}");
        }
    }
}
