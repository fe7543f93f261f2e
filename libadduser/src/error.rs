// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Set of error codes that can be used by libadduser.
///
/// # Example
///
/// ```rust
/// # use libadduser::error::Error;
/// # use std::process::Command;
///
/// fn run_ls() -> Result<(), Error> {
///     let ls_status = Command::new("ls").arg("/tmp").status().unwrap();
///     if !ls_status.success() {
///         Err(Error::SubprocessFailed {
///             command: "ls".to_string(),
///             status: ls_status,
///         })
///     } else {
///         Ok(())
///     }
/// }
///
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP client error occurred: {0}")]
    Http(#[from] reqwest::Error),
    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request did not succeed (HTTP {status} from {endpoint})")]
    HttpStatus {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("executing {command} failed: {status}")]
    SubprocessFailed {
        command: String,
        status: std::process::ExitStatus,
    },
    #[error("system call failed: {0}")]
    Nix(#[from] nix::errno::Errno),
    #[error("{command} printed {output:?}, which is not a numeric id")]
    InvalidId { command: String, output: String },
    #[error("{} already exists and is not a private directory", .path.display())]
    ExistingPath { path: std::path::PathBuf },
    #[error(
        "Failed to create a user; none of the provided backends are installed"
    )]
    NoUserProvisioner,
    #[error("Failed to load configuration from {}: {details}", .path.display())]
    Config {
        path: std::path::PathBuf,
        details: String,
    },
    #[error("failed to {step} for user {user}")]
    Provision {
        step: &'static str,
        user: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap a provisioning failure with the step and the user it concerns.
    pub(crate) fn provision(
        step: &'static str,
        user: impl Into<String>,
    ) -> impl FnOnce(Error) -> Error {
        let user = user.into();
        move |source| Error::Provision {
            step,
            user,
            source: Box::new(source),
        }
    }

    /// Returns a concise, fixed string describing the error, suitable for
    /// structured log fields.
    ///
    /// A wrapped [`Error::Provision`] reports the reason of its source.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Http(_) => "HTTP error",
            Self::Io(_) => "I/O error",
            Self::HttpStatus { .. } => "http status error",
            Self::SubprocessFailed { .. } => "subprocess failed",
            Self::Nix(_) => "system call failed",
            Self::InvalidId { .. } => "invalid id output",
            Self::ExistingPath { .. } => "conflicting existing path",
            Self::NoUserProvisioner => "no user creation tool installed",
            Self::Config { .. } => "invalid configuration",
            Self::Provision { source, .. } => source.reason(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_wraps_step_and_user() {
        let err = Error::provision("set the password", "alice")(
            Error::NoUserProvisioner,
        );

        assert_eq!(err.to_string(), "failed to set the password for user alice");
        assert_eq!(err.reason(), "no user creation tool installed");
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "Failed to create a user; none of the provided backends are installed"
        );
    }

    #[test]
    fn invalid_id_mentions_output() {
        let err = Error::InvalidId {
            command: "id -u".to_string(),
            output: "nobody".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "id -u printed \"nobody\", which is not a numeric id"
        );
        assert_eq!(err.reason(), "invalid id output");
    }

    #[test]
    fn http_status_names_endpoint() {
        let err = Error::HttpStatus {
            endpoint: "http://example.com/roster".to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        };
        assert!(err.to_string().contains("HTTP 404 Not Found"));
        assert!(err.to_string().contains("http://example.com/roster"));
    }
}
