// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::io;

use thiserror::Error;

use crate::frame::MAX_PAYLOAD_LEN;
use crate::handshake::{MAX_KEY_LEN, MAX_REQUEST_LEN};

/// Malformed or unsupported WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("64-bit payload length escape is not supported")]
    LengthEscape64,

    #[error("unknown opcode 0x{0:x}")]
    UnknownOpcode(u8),

    #[error("payload of {0} bytes exceeds the {max} byte limit", max = MAX_PAYLOAD_LEN)]
    PayloadTooLarge(usize),

    #[error("client frame is not masked")]
    Unmasked,
}

/// Reasons an incoming connection is refused before the WebSocket upgrade.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("not an HTTP GET request")]
    NotGet,

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("Sec-WebSocket-Key longer than {max} bytes", max = MAX_KEY_LEN)]
    KeyTooLong,

    #[error("upgrade request larger than {max} bytes", max = MAX_REQUEST_LEN)]
    RequestTooLarge,

    #[error("peer closed before completing the upgrade request")]
    Closed,

    #[error("timed out waiting for the upgrade request")]
    Timeout,

    #[error("client slot was released during the handshake")]
    SlotReleased,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Fatal condition on an established connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    #[error("input buffer full ({0} bytes) without a complete frame")]
    BufferOverflow(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}
