// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! WebSocket frame codec (RFC 6455 section 5.2).
//!
//! Only what TCI traffic needs is supported: every frame is sent as a single
//! final fragment and payloads are limited to 65535 bytes, so the 64-bit
//! length escape is rejected as a protocol error.

use crate::error::FrameError;

/// Largest payload expressible with the 16-bit length escape.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

const FIN: u8 = 0x80;
const MASK: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0f;
const LEN_MASK: u8 = 0x7f;
const LEN_7BIT_MAX: usize = 125;
const LEN_16BIT: u8 = 126;
const LEN_64BIT: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }
}

/// A decoded frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
    pub masked: bool,
}

impl Frame {
    pub fn text(&self) -> Option<&str> {
        match self.opcode {
            Opcode::Text => std::str::from_utf8(&self.payload).ok(),
            _ => None,
        }
    }
}

/// Encode an unmasked server-to-client frame.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode(opcode, payload, None)
}

/// Encode a masked frame, as a client would send it.
pub fn encode_masked_frame(
    opcode: Opcode,
    payload: &[u8],
    key: [u8; 4],
) -> Result<Vec<u8>, FrameError> {
    encode(opcode, payload, Some(key))
}

fn encode(opcode: Opcode, payload: &[u8], key: Option<[u8; 4]>) -> Result<Vec<u8>, FrameError> {
    let len = payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(len));
    }

    let mask_bit = if key.is_some() { MASK } else { 0 };
    let mut out = Vec::with_capacity(len + 8);
    out.push(FIN | opcode.as_u8());
    if len <= LEN_7BIT_MAX {
        out.push(mask_bit | len as u8);
    } else {
        out.push(mask_bit | LEN_16BIT);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }

    match key {
        Some(key) => {
            out.extend_from_slice(&key);
            let start = out.len();
            out.extend_from_slice(payload);
            apply_mask(&mut out[start..], key);
        }
        None => out.extend_from_slice(payload),
    }
    Ok(out)
}

/// Decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` while the buffer holds less than a full frame, and
/// otherwise the number of bytes consumed together with the frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(usize, Frame)>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let raw_opcode = buf[0] & OPCODE_MASK;
    let opcode = Opcode::from_u8(raw_opcode).ok_or(FrameError::UnknownOpcode(raw_opcode))?;
    let masked = buf[1] & MASK != 0;

    let (payload_len, mut header_len) = match buf[1] & LEN_MASK {
        LEN_64BIT => return Err(FrameError::LengthEscape64),
        LEN_16BIT => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        n => (n as usize, 2),
    };

    let key = if masked {
        if buf.len() < header_len + 4 {
            return Ok(None);
        }
        let key = [
            buf[header_len],
            buf[header_len + 1],
            buf[header_len + 2],
            buf[header_len + 3],
        ];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    let total = header_len + payload_len;
    if buf.len() < total {
        return Ok(None);
    }

    let mut payload = buf[header_len..total].to_vec();
    if let Some(key) = key {
        apply_mask(&mut payload, key);
    }

    Ok(Some((
        total,
        Frame {
            opcode,
            payload,
            masked,
        },
    )))
}

/// XOR `data` in place with the repeating 4-byte masking key.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_short_text_frame_layout() {
        let bytes = encode_frame(Opcode::Text, b"ready;").unwrap();
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 6);
        assert_eq!(&bytes[2..], b"ready;");
    }

    #[test]
    fn test_medium_payload_uses_16bit_length() {
        let payload = vec![b'x'; 300];
        let bytes = encode_frame(Opcode::Binary, &payload).unwrap();
        assert_eq!(&bytes[..4], &[0x82, 126, 0x01, 0x2c]);
        assert_eq!(bytes.len(), 304);

        let (used, frame) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(used, 304);
        assert_eq!(frame.payload, payload);
        assert!(!frame.masked);
    }

    #[test]
    fn test_length_boundaries() {
        for len in [0usize, 125, 126, MAX_PAYLOAD_LEN] {
            let payload = vec![0x5a; len];
            let bytes = encode_frame(Opcode::Text, &payload).unwrap();
            let (used, frame) = decode_frame(&bytes).unwrap().unwrap();
            assert_eq!(used, bytes.len(), "len {len}");
            assert_eq!(frame.payload.len(), len);
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode_frame(Opcode::Text, &payload),
            Err(FrameError::PayloadTooLarge(MAX_PAYLOAD_LEN + 1))
        );
    }

    #[test]
    fn test_masked_frame_is_unmasked_on_decode() {
        let bytes = encode_masked_frame(Opcode::Text, b"Hi", [1, 2, 3, 4]).unwrap();
        assert_eq!(bytes, vec![0x81, 0x82, 1, 2, 3, 4, b'H' ^ 1, b'i' ^ 2]);

        let (used, frame) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(used, 8);
        assert_eq!(frame.text(), Some("Hi"));
        assert!(frame.masked);
    }

    #[test]
    fn test_incomplete_at_every_split_point() {
        let payload: Vec<u8> = (0..200u8).collect();
        let bytes = encode_masked_frame(Opcode::Binary, &payload, KEY).unwrap();
        for cut in 0..bytes.len() {
            assert_eq!(decode_frame(&bytes[..cut]).unwrap(), None, "cut at {cut}");
        }
        let (used, frame) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn test_64bit_length_is_protocol_error() {
        let bytes = [0x82, 127, 0, 0, 0, 0, 0, 1, 0, 0];
        assert_eq!(decode_frame(&bytes), Err(FrameError::LengthEscape64));
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(decode_frame(&[0x83, 0]), Err(FrameError::UnknownOpcode(3)));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = encode_masked_frame(Opcode::Text, b"vfo:0,0;", KEY).unwrap();
        bytes.extend(encode_masked_frame(Opcode::Ping, b"", KEY).unwrap());

        let (used, first) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(first.text(), Some("vfo:0,0;"));
        let (rest_used, second) = decode_frame(&bytes[used..]).unwrap().unwrap();
        assert_eq!(second.opcode, Opcode::Ping);
        assert_eq!(used + rest_used, bytes.len());
    }
}
