// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
pub mod ids;
pub mod password;
pub mod ssh;
pub mod user;

use nix::unistd::{Gid, Uid};
use tracing::instrument;

use crate::config::{Config, UserProvisioner};
use crate::error::Error;
use crate::User;
pub use ssh::InstalledKey;

/// The account operations provisioning relies on.
///
/// [`Host`] performs them with the system's own tools; tests substitute an
/// implementation that never touches the account database.
pub trait Accounts {
    /// Create the account, including its home directory.
    fn create_account(&self, username: &str) -> Result<(), Error>;

    /// Set the account's password.
    fn set_password(&self, user: &User) -> Result<(), Error>;

    /// Look up the numeric user and group id of the account.
    fn resolve_ids(&self, username: &str) -> Result<(Uid, Gid), Error>;
}

/// Account operations backed by `useradd`/`adduser`, `chpasswd` and `id`.
#[derive(Debug, Clone)]
pub struct Host {
    backends: Vec<UserProvisioner>,
}

impl Host {
    /// Use the given account creation tools, in order of preference.
    pub fn new(backends: impl Into<Vec<UserProvisioner>>) -> Self {
        Self {
            backends: backends.into(),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(crate::config::UserProvisioners::default().backends)
    }
}

impl Accounts for Host {
    fn create_account(&self, username: &str) -> Result<(), Error> {
        let backend = user::create_user(&self.backends, username)?;
        tracing::info!(
            target: "libadduser::user::add",
            "Created user '{}' with {:?}",
            username,
            backend
        );
        Ok(())
    }

    fn set_password(&self, user: &User) -> Result<(), Error> {
        password::chpasswd(user)
    }

    fn resolve_ids(&self, username: &str) -> Result<(Uid, Gid), Error> {
        ids::resolve_ids(username)
    }
}

/// Provision one account and its public key on the host.
///
/// [`Provision::provision`] creates the account, sets its password, installs
/// the key under `<ssh.home_base>/<name>/.ssh` and hands the key files over
/// to the account. The first failing step stops provisioning; steps already
/// applied are not undone.
#[derive(Clone, Debug)]
pub struct Provision {
    user: User,
    config: Config,
}

impl Provision {
    pub fn new(user: User, config: Config) -> Self {
        Self { user, config }
    }

    #[instrument(skip_all, fields(username = %self.user.name))]
    pub fn provision(
        self,
        accounts: &impl Accounts,
    ) -> Result<InstalledKey, Error> {
        let name = self.user.name.as_str();

        accounts
            .create_account(name)
            .map_err(Error::provision("create the account", name))?;

        accounts
            .set_password(&self.user)
            .map_err(Error::provision("set the password", name))?;

        let home = self.config.ssh.home_base.join(name);
        let installed = ssh::install_key(&home, &self.user.public_key)
            .map_err(Error::provision("install the public key", name))?;

        let (uid, gid) = accounts
            .resolve_ids(name)
            .map_err(Error::provision("resolve the user and group id", name))?;

        ssh::fix_ownership(&installed, uid, gid)
            .map_err(Error::provision("change key ownership", name))?;

        Ok(installed)
    }
}
