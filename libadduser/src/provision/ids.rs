// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::process::Command;

use nix::unistd::{Gid, Uid};
use tracing::instrument;

use crate::error::Error;

/// Resolve the numeric user and group id of `username` with `id -u` and
/// `id -g`.
#[instrument]
pub(crate) fn resolve_ids(username: &str) -> Result<(Uid, Gid), Error> {
    let uid = query_id(Command::new(env!("PATH_ID")).arg("-u").arg(username))?;
    let gid = query_id(Command::new(env!("PATH_ID")).arg("-g").arg(username))?;
    tracing::info!(username, uid, gid, "Resolved account ids");

    Ok((Uid::from_raw(uid), Gid::from_raw(gid)))
}

fn query_id(command: &mut Command) -> Result<u32, Error> {
    let display = std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    let output = command.output()?;
    if !output.status.success() {
        return Err(Error::SubprocessFailed {
            command: display,
            status: output.status,
        });
    }

    parse_id(&display, &String::from_utf8_lossy(&output.stdout))
}

fn parse_id(command: &str, output: &str) -> Result<u32, Error> {
    output.trim().parse().map_err(|_| Error::InvalidId {
        command: command.to_string(),
        output: output.trim().to_string(),
    })
}
