// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! HTTP/1.1 upgrade to WebSocket (RFC 6455 section 4.2).

use std::time::Duration;

use base64::prelude::*;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::HandshakeError;

pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the request head, headers included.
pub const MAX_REQUEST_LEN: usize = 2048;
pub const MAX_KEY_LEN: usize = 64;

const KEY_HEADER: &str = "sec-websocket-key";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Compute `Sec-WebSocket-Accept` for a client key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Validate an upgrade request head and extract the client key.
pub fn parse_upgrade_request(request: &[u8]) -> Result<String, HandshakeError> {
    if !request.starts_with(b"GET") {
        return Err(HandshakeError::NotGet);
    }

    let text = String::from_utf8_lossy(request);
    for line in text.lines().skip(1) {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case(KEY_HEADER) {
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(HandshakeError::MissingKey);
        }
        if value.len() > MAX_KEY_LEN {
            return Err(HandshakeError::KeyTooLong);
        }
        return Ok(value.to_string());
    }
    Err(HandshakeError::MissingKey)
}

pub fn switching_protocols_response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    )
}

/// Run the server side of the upgrade on `stream`.
///
/// On success the 101 response has been written and any bytes the client
/// sent after the request head are returned so the caller can treat them
/// as the start of the frame stream.
pub async fn accept_upgrade<S>(
    stream: &mut S,
    deadline: Duration,
) -> Result<Vec<u8>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (head, leftover) = timeout(deadline, read_request_head(stream))
        .await
        .map_err(|_| HandshakeError::Timeout)??;

    let key = parse_upgrade_request(&head)?;
    let response = switching_protocols_response(&accept_key(&key));
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(leftover)
}

async fn read_request_head<S>(stream: &mut S) -> Result<(Vec<u8>, Vec<u8>), HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HandshakeError::Closed);
        }
        buf.extend_from_slice(&chunk[..n]);

        // Plain TCP clients are turned away as soon as the method is known.
        let method_ok = if buf.len() >= 3 {
            buf.starts_with(b"GET")
        } else {
            b"GET".starts_with(&buf)
        };
        if !method_ok {
            return Err(HandshakeError::NotGet);
        }

        if let Some(pos) = buf.windows(HEADER_END.len()).position(|w| w == HEADER_END) {
            let leftover = buf.split_off(pos + HEADER_END.len());
            return Ok((buf, leftover));
        }
        if buf.len() > MAX_REQUEST_LEN {
            return Err(HandshakeError::RequestTooLarge);
        }
    }
}
