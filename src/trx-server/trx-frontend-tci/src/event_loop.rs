// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single task that owns every client's write half.
//!
//! All outbound frames, reporter ticks and write-side teardown go through
//! one ordered queue, so writes to a socket never interleave and the
//! per-client [`Reporter`] caches need no locking.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};
use trx_core::RigStateReader;

use crate::frame::{encode_frame, Opcode};
use crate::message::TciMessage;
use crate::registry::{ClientRegistry, Lease, Teardown};
use crate::reporter::{Outbound, ReportOptions, Reporter};

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Write side of a client connection.
pub trait ClientSink: AsyncWrite + Send + Unpin {
    /// Make the next close abortive (zero linger).
    fn set_abortive_close(&self) {}
}

impl ClientSink for OwnedWriteHalf {
    #[allow(deprecated)]
    fn set_abortive_close(&self) {
        let stream: &TcpStream = self.as_ref();
        if let Err(e) = stream.set_linger(Some(Duration::ZERO)) {
            debug!("failed to set SO_LINGER on TCI socket: {}", e);
        }
    }
}

impl ClientSink for DuplexStream {}

pub type ClientWriter = Box<dyn ClientSink>;

pub enum LoopTask {
    Attach { lease: Lease, writer: ClientWriter },
    Send { lease: Lease, opcode: Opcode, payload: Vec<u8> },
    Tick { lease: Lease },
    Detach { lease: Lease, teardown: Teardown },
    Shutdown,
}

/// Cloneable sender side of the event loop queue.
#[derive(Clone)]
pub struct EventLoopHandle {
    tx: mpsc::UnboundedSender<LoopTask>,
}

impl EventLoopHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoopTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn submit(&self, task: LoopTask) -> bool {
        self.tx.send(task).is_ok()
    }

    pub fn attach(&self, lease: Lease, writer: ClientWriter) -> bool {
        self.submit(LoopTask::Attach { lease, writer })
    }

    pub fn send_message(&self, lease: Lease, message: &TciMessage) -> bool {
        self.send_frame(lease, Opcode::Text, message.to_string().into_bytes())
    }

    pub fn send_frame(&self, lease: Lease, opcode: Opcode, payload: Vec<u8>) -> bool {
        self.submit(LoopTask::Send {
            lease,
            opcode,
            payload,
        })
    }

    /// Returns `false` once the loop has stopped.
    pub fn tick(&self, lease: Lease) -> bool {
        self.submit(LoopTask::Tick { lease })
    }

    pub fn detach(&self, lease: Lease, teardown: Teardown) -> bool {
        self.submit(LoopTask::Detach { lease, teardown })
    }

    pub fn shutdown(&self) -> bool {
        self.submit(LoopTask::Shutdown)
    }
}

struct Client {
    lease: Lease,
    writer: ClientWriter,
    reporter: Reporter,
}

pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<LoopTask>,
    registry: Arc<ClientRegistry>,
    radio: Arc<dyn RigStateReader>,
    tx_only: bool,
    receivers: usize,
    clients: Vec<Option<Client>>,
}

impl EventLoop {
    pub fn new(
        rx: mpsc::UnboundedReceiver<LoopTask>,
        registry: Arc<ClientRegistry>,
        radio: Arc<dyn RigStateReader>,
        tx_only: bool,
        receivers: usize,
    ) -> Self {
        let clients = (0..registry.capacity()).map(|_| None).collect();
        Self {
            rx,
            registry,
            radio,
            tx_only,
            receivers,
            clients,
        }
    }

    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            match task {
                LoopTask::Attach { lease, writer } => self.attach(lease, writer),
                LoopTask::Send {
                    lease,
                    opcode,
                    payload,
                } => {
                    self.write(lease, opcode, &payload).await;
                }
                LoopTask::Tick { lease } => self.tick(lease).await,
                LoopTask::Detach { lease, teardown } => self.detach(lease, teardown).await,
                LoopTask::Shutdown => break,
            }
        }

        for client in self.clients.iter_mut().filter_map(Option::take) {
            client.writer.set_abortive_close();
        }
        debug!("TCI event loop stopped");
    }

    fn attach(&mut self, lease: Lease, writer: ClientWriter) {
        let Some(entry) = self.clients.get_mut(lease.index()) else {
            warn!("TCI attach for out-of-range slot {}", lease);
            return;
        };
        if let Some(old) = entry.replace(Client {
            lease,
            writer,
            reporter: Reporter::new(),
        }) {
            debug!("TCI slot {} replaced a stale writer", lease);
            old.writer.set_abortive_close();
        }
    }

    fn client_mut(&mut self, lease: Lease) -> Option<&mut Client> {
        self.clients
            .get_mut(lease.index())?
            .as_mut()
            .filter(|client| client.lease == lease)
    }

    fn take_client(&mut self, lease: Lease) -> Option<Client> {
        let entry = self.clients.get_mut(lease.index())?;
        if entry.as_ref().is_some_and(|client| client.lease == lease) {
            entry.take()
        } else {
            None
        }
    }

    /// Write one frame; any failure tears the client down.
    async fn write(&mut self, lease: Lease, opcode: Opcode, payload: &[u8]) -> bool {
        let bytes = match encode_frame(opcode, payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("TCI client {}: dropping outbound frame: {}", lease, e);
                return true;
            }
        };
        let Some(client) = self.client_mut(lease) else {
            return false;
        };

        let result = timeout(WRITE_TIMEOUT, async {
            client.writer.write_all(&bytes).await?;
            client.writer.flush().await
        })
        .await;

        let error = match result {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "write timed out".to_string(),
        };
        warn!("TCI client {} write failed: {}", lease, error);
        if let Some(client) = self.take_client(lease) {
            client.writer.set_abortive_close();
        }
        self.registry.release(lease);
        false
    }

    async fn tick(&mut self, lease: Lease) {
        if !self.registry.is_running(lease) {
            return;
        }
        let options = ReportOptions {
            tx_only: self.tx_only,
            smeter_enabled: self.registry.smeter_enabled(lease),
            receivers: self.receivers,
        };
        let snapshot = self.radio.snapshot();
        let Some(client) = self.client_mut(lease) else {
            return;
        };
        let outbound = client.reporter.tick(&snapshot, options);

        for item in outbound {
            let (opcode, payload) = match item {
                Outbound::Ping => (Opcode::Ping, Vec::new()),
                Outbound::Message(msg) => (Opcode::Text, msg.to_string().into_bytes()),
            };
            if !self.write(lease, opcode, &payload).await {
                break;
            }
        }
    }

    async fn detach(&mut self, lease: Lease, teardown: Teardown) {
        let Some(mut client) = self.take_client(lease) else {
            return;
        };
        match teardown {
            Teardown::Abortive => client.writer.set_abortive_close(),
            Teardown::Graceful => {
                let _ = timeout(WRITE_TIMEOUT, client.writer.shutdown()).await;
            }
        }
        debug!("TCI client {} detached ({:?})", lease, teardown);
    }
}
