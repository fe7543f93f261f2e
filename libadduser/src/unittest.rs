// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use reqwest::StatusCode;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

/// Returns expected HTTP response for the given status code and body string.
pub(crate) fn get_http_response_payload(
    statuscode: &StatusCode,
    body_str: &str,
) -> String {
    // Reply message includes the whole body in case of OK, otherwise empty data.
    match statuscode {
        &StatusCode::OK => format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            statuscode.as_u16(),
            statuscode.canonical_reason().unwrap_or_default(),
            body_str.len(),
            body_str
        ),
        _ => format!(
            "HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n",
            statuscode.as_u16(),
            statuscode.canonical_reason().unwrap_or_default()
        ),
    }
}

/// Accept incoming connections until the cancellation token is used, then return the count
/// of accepted connections.
///
/// Each request is drained before the payload is written so the client never
/// sees its connection reset while still sending.
pub(crate) async fn serve_requests(
    listener: TcpListener,
    payload: String,
    cancel_token: CancellationToken,
) -> u32 {
    let mut request_count = 0;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                break;
            }
            result = listener.accept() => {
                let (mut stream, _) = result.expect("Failed to accept connection");

                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;

                stream.write_all(payload.as_bytes()).await.expect("Failed to write payload");
                stream.flush().await.expect("Failed to flush stream");
                let _ = stream.shutdown().await;

                request_count += 1;
            }
        }
    }

    request_count
}

/// Build a TLS acceptor with a freshly generated self-signed certificate.
///
/// The certificate names `add-user.invalid`, so it fails both chain and
/// hostname verification for a client connecting to 127.0.0.1.
pub(crate) fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec![
        "add-user.invalid".to_string(),
    ])
    .expect("Failed to generate certificate");
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .expect("Failed to select protocol versions")
    .with_no_client_auth()
    .with_single_cert(vec![certified.cert.der().clone()], key)
    .expect("Failed to build server config");

    TlsAcceptor::from(Arc::new(config))
}

/// Like [`serve_requests`], but over TLS. Returns the number of requests
/// answered; connections whose handshake fails are not counted.
pub(crate) async fn serve_tls_requests(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    payload: String,
    cancel_token: CancellationToken,
) -> u32 {
    let mut request_count = 0;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                break;
            }
            result = listener.accept() => {
                let (stream, _) = result.expect("Failed to accept connection");
                let Ok(mut stream) = acceptor.accept(stream).await else {
                    continue;
                };

                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;

                let _ = stream.write_all(payload.as_bytes()).await;
                let _ = stream.flush().await;
                let _ = stream.shutdown().await;

                request_count += 1;
            }
        }
    }

    request_count
}
