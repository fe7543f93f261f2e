// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::config::Config;
use crate::error::Error;

const USER_AGENT: &str = concat!("add-user/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used to fetch the roster.
///
/// When `roster.accept_invalid_certs` is set, the client accepts any
/// certificate the server presents, including self-signed ones and ones
/// issued for a different hostname.
pub fn client(config: &Config) -> Result<Client, Error> {
    if config.roster.accept_invalid_certs {
        tracing::warn!(
            "TLS certificate verification is disabled for roster downloads"
        );
    }

    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(config.roster.accept_invalid_certs)
        .build()?)
}

/// Send a single HTTP GET request and stream the response body into `dest`.
///
/// The destination is only created once a successful response has arrived,
/// so a failed request never leaves a file behind. An existing file is
/// truncated. Returns the number of bytes written.
#[instrument(err, skip(client, dest))]
pub(crate) async fn download(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<u64, Error> {
    let mut response = client.get(url).send().await?;
    let statuscode = response.status();
    tracing::info!(
        target: "libadduser::http::received",
        url = response.url().as_str(),
        http_status = statuscode.as_u16(),
        "HTTP response received"
    );

    if !statuscode.is_success() {
        return Err(Error::HttpStatus {
            endpoint: url.to_string(),
            status: statuscode,
        });
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let written = match save_body(&mut response, &mut file).await {
        Ok(written) => written,
        Err(error) => {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(dest).await {
                tracing::warn!(error = ?e, "Failed to remove partial download {}", dest.display());
            }
            return Err(error);
        }
    };

    tracing::info!(
        target: "libadduser::http::success",
        bytes = written,
        "Saved response to {}",
        dest.display()
    );
    Ok(written)
}

async fn save_body(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
) -> Result<u64, Error> {
    let mut written = 0_u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}
