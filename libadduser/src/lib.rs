// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::process::Command;

pub mod config;
pub mod error;
pub(crate) mod http;
pub mod logging;
pub mod roster;

mod provision;
pub use provision::{
    ssh::InstalledKey, user::User, Accounts, Host, Provision,
};

pub use http::client;

#[cfg(test)]
mod unittest;

// Re-export as the Client is used in our API.
pub use reqwest;

/// Run a command to completion, treating a non-zero exit as an error.
///
/// A command that cannot be started at all surfaces as [`error::Error::Io`],
/// with [`std::io::ErrorKind::NotFound`] when the executable is missing.
pub(crate) fn run(mut command: Command) -> Result<(), error::Error> {
    let program = command.get_program().to_string_lossy().into_owned();
    tracing::debug!(command = ?command, "Running command");

    let status = command.status()?;
    if !status.success() {
        return Err(error::Error::SubprocessFailed {
            command: program,
            status,
        });
    }

    Ok(())
}
