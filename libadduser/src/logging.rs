// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{OpenOptions, Permissions};
use std::os::unix::fs::PermissionsExt;
use tracing::{event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, EnvFilter, Layer, Registry,
};

use crate::config::Config;

/// Environment variable holding the log filter, in `EnvFilter` syntax.
pub const ADD_USER_LOG_ENV: &str = "ADD_USER_LOG";

/// Builds the `tracing` subscriber for `add-user`.
///
/// Diagnostics go to `stderr`, filtered by `ADD_USER_LOG` (default `warn`).
/// If `log.path` is configured, the same events are also appended to that
/// file, created with mode 0600 and filtered by `ADD_USER_LOG` (default
/// `info`). A log file that cannot be opened is reported and skipped.
///
/// # Example
///
/// ```no_run
/// # use libadduser::config::Config;
/// let subscriber = libadduser::logging::setup_layers(&Config::default());
/// tracing::subscriber::set_global_default(subscriber).unwrap();
/// ```
pub fn setup_layers(
    config: &Config,
) -> Box<dyn Subscriber + Send + Sync + 'static> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter_or("warn"));

    let file_layer = match config.log.path.as_ref() {
        None => None,
        Some(path) => match OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                if let Err(e) =
                    file.set_permissions(Permissions::from_mode(0o600))
                {
                    event!(
                        Level::WARN,
                        "Failed to set permissions on {}: {}.",
                        path.display(),
                        e,
                    );
                }

                Some(
                    fmt::layer()
                        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                        .with_ansi(false)
                        .with_writer(file)
                        .with_filter(env_filter_or("info")),
                )
            }
            Err(e) => {
                event!(
                    Level::ERROR,
                    "Could not open configured log file {}: {}. Continuing without file logging.",
                    path.display(),
                    e
                );

                None
            }
        },
    };

    let subscriber = Registry::default().with(stderr_layer).with(file_layer);

    Box::new(subscriber)
}

fn env_filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(ADD_USER_LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default))
}
