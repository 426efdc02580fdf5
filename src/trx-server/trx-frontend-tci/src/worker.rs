// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-client read side.
//!
//! The worker owns the read half of an upgraded connection, decodes
//! frames, answers commands and control frames through the event loop and
//! finally releases its slot.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::commands::CommandParser;
use crate::error::{ConnectionError, FrameError};
use crate::frame::{decode_frame, Frame, Opcode};
use crate::message::{initial_burst, TciMessage};
use crate::registry::{Lease, Teardown};
use crate::server::TciContext;

/// Read timeout; the loop re-checks the slot between reads.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);
/// Inbound bytes buffered while waiting for a complete frame.
pub const INPUT_BUFFER_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    PeerClose,
    PeerGone,
    Released,
}

pub struct Connection<R> {
    lease: Lease,
    peer: SocketAddr,
    reader: R,
    buf: Vec<u8>,
    state: ConnectionState,
    shutdown: watch::Receiver<bool>,
    ctx: Arc<TciContext>,
}

impl<R> Connection<R>
where
    R: AsyncRead + Send + Unpin,
{
    /// `leftover` holds bytes that arrived behind the upgrade request.
    pub fn new(
        lease: Lease,
        peer: SocketAddr,
        reader: R,
        leftover: Vec<u8>,
        shutdown: watch::Receiver<bool>,
        ctx: Arc<TciContext>,
    ) -> Self {
        let mut buf = Vec::with_capacity(INPUT_BUFFER_LEN);
        buf.extend_from_slice(&leftover);
        Self {
            lease,
            peer,
            reader,
            buf,
            state: ConnectionState::Connecting,
            shutdown,
            ctx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn run(mut self) -> ConnectionState {
        self.state = ConnectionState::Open;
        info!("TCI client {} ({}) connected", self.lease, self.peer);
        self.send_initial_burst();

        let result = self.read_loop().await;
        self.state = ConnectionState::Closing;

        let teardown = match &result {
            Ok(Exit::PeerClose) => {
                info!("TCI client {} ({}) closed the connection", self.lease, self.peer);
                Teardown::Graceful
            }
            Ok(Exit::PeerGone) => {
                info!("TCI client {} ({}) disconnected", self.lease, self.peer);
                Teardown::Graceful
            }
            Ok(Exit::Released) => {
                debug!("TCI client {} ({}) stopped by server", self.lease, self.peer);
                Teardown::Abortive
            }
            Err(e) => {
                warn!("TCI client {} ({}) error: {}", self.lease, self.peer, e);
                Teardown::Abortive
            }
        };

        // Both are dropped by the event loop if the slot is already gone.
        self.ctx.events.send_message(self.lease, &TciMessage::Stop);
        self.ctx.events.send_frame(self.lease, Opcode::Close, Vec::new());
        self.ctx.registry.release_with(self.lease, teardown);

        self.state = ConnectionState::Closed;
        self.state
    }

    fn send_initial_burst(&self) {
        let snapshot = self.ctx.radio.snapshot();
        for message in initial_burst(&self.ctx.info, &snapshot) {
            self.ctx.events.send_message(self.lease, &message);
        }
    }

    async fn read_loop(&mut self) -> Result<Exit, ConnectionError> {
        let mut chunk = [0u8; 1024];
        loop {
            if !self.ctx.registry.is_running(self.lease) {
                return Ok(Exit::Released);
            }

            while let Some((used, frame)) = decode_frame(&self.buf)? {
                self.buf.drain(..used);
                if !frame.masked {
                    return Err(FrameError::Unmasked.into());
                }
                if let Some(exit) = self.dispatch(frame) {
                    return Ok(exit);
                }
            }

            let room = INPUT_BUFFER_LEN.saturating_sub(self.buf.len());
            if room == 0 {
                return Err(ConnectionError::BufferOverflow(self.buf.len()));
            }
            let want = room.min(chunk.len());

            let read = tokio::select! {
                _ = self.shutdown.changed() => return Ok(Exit::Released),
                read = timeout(RECV_TIMEOUT, self.reader.read(&mut chunk[..want])) => read,
            };
            let n = match read {
                Err(_) => continue,
                Ok(result) => result?,
            };
            if n == 0 {
                return Ok(Exit::PeerGone);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn dispatch(&self, frame: Frame) -> Option<Exit> {
        match frame.opcode {
            Opcode::Text => {
                let text = String::from_utf8_lossy(&frame.payload).to_ascii_lowercase();
                debug!("TCI client {} -> {}", self.lease, text.trim());
                let smeter = self
                    .ctx
                    .registry
                    .slot(self.lease.index())
                    .map(|slot| slot.smeter_enabled())?;
                let parser = CommandParser::new(&*self.ctx.radio, &self.ctx.info, smeter);
                for reply in parser.handle_text(&text) {
                    self.ctx.events.send_message(self.lease, &reply);
                }
                None
            }
            Opcode::Ping => {
                self.ctx.events.send_frame(self.lease, Opcode::Pong, frame.payload);
                None
            }
            Opcode::Close => Some(Exit::PeerClose),
            Opcode::Pong | Opcode::Binary | Opcode::Continuation => None,
        }
    }
}
