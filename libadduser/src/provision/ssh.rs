// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
use crate::error::Error;
use nix::unistd::{chown, Gid, Uid};
use std::{
    fs::{OpenOptions, Permissions},
    io::{ErrorKind, Write},
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};
use tracing::instrument;

/// Paths written while installing a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKey {
    pub ssh_dir: PathBuf,
    pub authorized_keys: PathBuf,
}

/// Create `<home>/.ssh` (mode 0700) and write `key` to
/// `<home>/.ssh/authorized_keys` (mode 0400).
///
/// An existing `.ssh` is only accepted if it is a directory with mode 0700;
/// an existing `authorized_keys` is overwritten.
#[instrument(skip(key), name = "ssh")]
pub(crate) fn install_key(home: &Path, key: &str) -> Result<InstalledKey, Error> {
    let ssh_dir = home.join(".ssh");
    if let Err(error) = std::fs::DirBuilder::new().mode(0o700).create(&ssh_dir) {
        if error.kind() != ErrorKind::AlreadyExists {
            return Err(error.into());
        }
        let metadata = std::fs::symlink_metadata(&ssh_dir)?;
        if !metadata.is_dir() || metadata.permissions().mode() & 0o777 != 0o700 {
            return Err(Error::ExistingPath { path: ssh_dir });
        }
        tracing::info!("Reusing existing {}", ssh_dir.display());
    }

    let authorized_keys_path = ssh_dir.join("authorized_keys");
    tracing::info!(
        target: "libadduser::ssh::authorized_keys",
        "Using authorized_keys path: {:?}",
        authorized_keys_path
    );

    let mut authorized_keys = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o400)
        .open(&authorized_keys_path)?;
    authorized_keys.set_permissions(Permissions::from_mode(0o400))?;
    writeln!(authorized_keys, "{key}")?;
    authorized_keys.flush()?;

    Ok(InstalledKey {
        ssh_dir,
        authorized_keys: authorized_keys_path,
    })
}

/// Hand the installed directory and key file over to the account.
#[instrument(skip_all)]
pub(crate) fn fix_ownership(
    installed: &InstalledKey,
    uid: Uid,
    gid: Gid,
) -> Result<(), Error> {
    chown(&installed.ssh_dir, Some(uid), Some(gid))?;
    chown(&installed.authorized_keys, Some(uid), Some(gid))?;
    tracing::info!(
        target: "libadduser::ssh::success",
        uid = uid.as_raw(),
        gid = gid.as_raw(),
        "Changed ownership of {}",
        installed.ssh_dir.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    // Refer to man 7 inode for details on the mode - 100000 is a regular file, 040000 is a directory
    #[test]
    fn test_install_key() {
        let home_dir = tempfile::TempDir::new().unwrap();

        let installed =
            install_key(home_dir.path(), "ssh-ed25519 AAAA alice@host").unwrap();

        assert_eq!(installed.ssh_dir, home_dir.path().join(".ssh"));
        assert_eq!(
            installed.authorized_keys,
            home_dir.path().join(".ssh/authorized_keys")
        );
        assert_eq!(
            std::fs::read_to_string(&installed.authorized_keys).unwrap(),
            "ssh-ed25519 AAAA alice@host\n"
        );
        assert_eq!(
            std::fs::metadata(&installed.ssh_dir).unwrap().permissions(),
            Permissions::from_mode(0o040700)
        );
        assert_eq!(
            std::fs::metadata(&installed.authorized_keys)
                .unwrap()
                .permissions(),
            Permissions::from_mode(0o100400)
        );
    }

    #[test]
    fn test_pre_existing_private_ssh_dir() {
        let home_dir = tempfile::TempDir::new().unwrap();
        std::fs::DirBuilder::new()
            .mode(0o700)
            .create(home_dir.path().join(".ssh"))
            .unwrap();

        let installed = install_key(home_dir.path(), "KEY").unwrap();

        assert_eq!(
            std::fs::read_to_string(installed.authorized_keys).unwrap(),
            "KEY\n"
        );
    }

    #[test]
    fn test_pre_existing_open_ssh_dir() {
        let home_dir = tempfile::TempDir::new().unwrap();
        let ssh_dir = home_dir.path().join(".ssh");
        std::fs::create_dir(&ssh_dir).unwrap();
        std::fs::set_permissions(&ssh_dir, Permissions::from_mode(0o755))
            .unwrap();

        match install_key(home_dir.path(), "KEY") {
            Err(Error::ExistingPath { path }) => assert_eq!(path, ssh_dir),
            other => panic!("expected a conflicting path, got {other:?}"),
        }
        assert!(!ssh_dir.join("authorized_keys").exists());
    }

    #[test]
    fn test_ssh_path_is_a_file() {
        let home_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(home_dir.path().join(".ssh"), "").unwrap();

        assert!(matches!(
            install_key(home_dir.path(), "KEY"),
            Err(Error::ExistingPath { .. })
        ));
    }

    #[test]
    fn test_missing_home() {
        let home_dir = tempfile::TempDir::new().unwrap();

        match install_key(&home_dir.path().join("nobody"), "KEY") {
            Err(Error::Io(error)) => assert_eq!(error.kind(), ErrorKind::NotFound),
            other => panic!("expected a missing home, got {other:?}"),
        }
    }

    // Changing ownership to anyone else needs elevated permissions, so hand
    // the files to the current user.
    #[test]
    fn test_fix_ownership() {
        let home_dir = tempfile::TempDir::new().unwrap();
        let installed = install_key(home_dir.path(), "KEY").unwrap();
        let uid = nix::unistd::getuid();
        let gid = nix::unistd::getgid();

        fix_ownership(&installed, uid, gid).unwrap();

        for path in [&installed.ssh_dir, &installed.authorized_keys] {
            let metadata = std::fs::metadata(path).unwrap();
            assert_eq!(metadata.uid(), uid.as_raw());
            assert_eq!(metadata.gid(), gid.as_raw());
        }
    }

    #[test]
    fn test_fix_ownership_missing_file() {
        let home_dir = tempfile::TempDir::new().unwrap();
        let installed = InstalledKey {
            ssh_dir: home_dir.path().join(".ssh"),
            authorized_keys: home_dir.path().join(".ssh/authorized_keys"),
        };

        assert!(matches!(
            fix_ownership(&installed, nix::unistd::getuid(), nix::unistd::getgid()),
            Err(Error::Nix(nix::errno::Errno::ENOENT))
        ));
    }
}
