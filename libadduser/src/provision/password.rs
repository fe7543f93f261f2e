// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
//!
//! Password provisioning for `libadduser`.
//!
//! The password is set with the `chpasswd` utility. The input format is
//! `"username:password"` written to stdin, which is what
//! `echo 'username:password' | chpasswd` does, minus the shell and with the
//! secret kept out of argv. Stdout is discarded and stderr is inherited.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::instrument;

use crate::{error::Error, User};

#[instrument(skip_all, fields(username = %user.name))]
pub(crate) fn chpasswd(user: &User) -> Result<(), Error> {
    let mut command = Command::new(env!("PATH_CHPASSWD"));
    set_with(&mut command, user)
}

fn set_with(command: &mut Command, user: &User) -> Result<(), Error> {
    let input = format!("{}:{}\n", user.name, user.password);
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()?;

    // The child is always reaped, even when it stopped reading early.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input.as_bytes()),
        None => Ok(()),
    };

    let status = child.wait()?;
    if !status.success() {
        tracing::error!(username = %user.name, ?status, "chpasswd failed to set password");
        return Err(Error::SubprocessFailed {
            command: command.get_program().to_string_lossy().into_owned(),
            status,
        });
    }
    written?;
    tracing::info!(target: "libadduser::password::status", username = %user.name, "Successfully set password via chpasswd");

    Ok(())
}
