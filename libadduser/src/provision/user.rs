// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::ErrorKind;
use std::process::Command;

use tracing::instrument;

use crate::config::{UserProvisioner, DEFAULT_PASSWORD};
use crate::error::Error;

/// The account to create on the host and the key that grants access to it.
///
/// Every account receives the same bootstrap password, [`DEFAULT_PASSWORD`]
/// unless another one is set with [`User::with_password`]. The password is
/// expected to be changed on first login.
///
/// # Example
///
/// ```
/// # use libadduser::User;
/// let user = User::new("alice", "ssh-ed25519 NOTAREALKEY alice@host")
///     .with_password("changeme");
/// ```
#[derive(Clone)]
pub struct User {
    pub(crate) name: String,
    pub(crate) public_key: String,
    pub(crate) password: String,
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // This is manually implemented to avoid printing the password
        f.debug_struct("User")
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl User {
    /// Configure the user being provisioned on the host.
    ///
    /// What constitutes a valid username depends on the host configuration and
    /// no validation will occur prior to provisioning the host.
    pub fn new(name: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_key: public_key.into(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }

    /// Replace the default password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }
}

impl UserProvisioner {
    /// The command that creates `username` with a home directory.
    pub(crate) fn command(&self, username: &str) -> Command {
        match self {
            Self::Useradd => {
                let mut command = Command::new(env!("PATH_USERADD"));
                command.arg("-m").arg(username);
                command
            }
            // BusyBox adduser, as found on Alpine; -D skips the password prompt.
            Self::Adduser => {
                let mut command = Command::new(env!("PATH_ADDUSER"));
                command.arg("-D").arg(username);
                command
            }
        }
    }
}

/// Create `username` with the first backend that is installed.
///
/// Returns the backend that created the account.
pub(crate) fn create_user(
    backends: &[UserProvisioner],
    username: &str,
) -> Result<UserProvisioner, Error> {
    create_user_with(backends, username, |backend| {
        crate::run(backend.command(username))
    })
}

/// Try `backends` in order, running each through `run`.
///
/// Only a backend whose executable is missing is skipped. Any other failure,
/// such as a non-zero exit because the user already exists, is returned
/// without trying the remaining backends.
#[instrument(skip(backends, run))]
fn create_user_with<F>(
    backends: &[UserProvisioner],
    username: &str,
    mut run: F,
) -> Result<UserProvisioner, Error>
where
    F: FnMut(&UserProvisioner) -> Result<(), Error>,
{
    for backend in backends {
        tracing::info!(
            target: "libadduser::user::add",
            "Creating user '{}' with {:?}",
            username,
            backend
        );

        match run(backend) {
            Ok(()) => return Ok(*backend),
            Err(Error::Io(error)) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    target: "libadduser::user::add",
                    ?error,
                    "{:?} is not installed, trying the next backend",
                    backend
                );
            }
            Err(error) => return Err(error),
        }
    }

    Err(Error::NoUserProvisioner)
}
