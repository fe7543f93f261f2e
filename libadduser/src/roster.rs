// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The roster: a plain text file with one account per line.
//!
//! Fields are separated by `;;;`. The first field identifies the account,
//! the second is unused and the third holds the public key:
//!
//! ```text
//! alice;;;Alice Example;;;ssh-ed25519 AAAAC3Nza... alice@host
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::instrument;

use crate::config::MatchMode;
use crate::error::Error;
use crate::http;

/// Separator between the fields of a roster line.
pub const FIELD_DELIMITER: &str = ";;;";

const KEY_FIELD: usize = 2;

/// Return the public key of the first line in `reader` that matches
/// `username`.
///
/// Lines with fewer than three fields never match, and the scan continues
/// past them. Bytes that are not valid UTF-8 are replaced rather than
/// ending the scan. The key is returned verbatim, including any whitespace.
pub fn find_public_key<R: BufRead>(
    reader: R,
    username: &str,
    mode: MatchMode,
) -> io::Result<Option<String>> {
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line = String::from_utf8_lossy(&line);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() <= KEY_FIELD {
            continue;
        }

        let matched = match mode {
            MatchMode::Substring => line.contains(username),
            MatchMode::Username => fields[0] == username,
        };
        if matched {
            return Ok(Some(fields[KEY_FIELD].to_string()));
        }
    }

    Ok(None)
}

/// A roster downloaded to the local filesystem.
///
/// The file is removed by [`RosterFile::remove`], or when the value is
/// dropped if that never happens.
#[derive(Debug)]
pub struct RosterFile {
    path: PathBuf,
    removed: bool,
}

/// Download the roster at `url` to `dest`, replacing any existing file.
#[instrument(skip(client))]
pub async fn fetch(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<RosterFile, Error> {
    http::download(client, url, dest).await?;
    Ok(RosterFile::new(dest))
}

impl RosterFile {
    /// Take ownership of an existing roster file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the public key for `username`.
    ///
    /// Failing to open or read the file is logged and reported as no match.
    #[instrument(skip(self))]
    pub fn lookup(&self, username: &str, mode: MatchMode) -> Option<String> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) => {
                tracing::error!(
                    ?error,
                    "Failed to open roster {}",
                    self.path.display()
                );
                return None;
            }
        };

        match find_public_key(BufReader::new(file), username, mode) {
            Ok(Some(key)) => {
                tracing::info!(
                    target: "libadduser::roster::lookup",
                    username,
                    "Found public key in roster"
                );
                Some(key)
            }
            Ok(None) => {
                tracing::info!(
                    target: "libadduser::roster::lookup",
                    username,
                    "No roster entry for user"
                );
                None
            }
            Err(error) => {
                tracing::error!(
                    ?error,
                    "Failed to read roster {}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Delete the roster file.
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        std::fs::remove_file(&self.path)
    }
}

impl Drop for RosterFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(error) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                ?error,
                "Failed to remove roster {}",
                self.path.display()
            );
        }
    }
}
