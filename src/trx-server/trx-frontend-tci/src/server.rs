// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use trx_core::RigStateReader;

use crate::config::TciConfig;
use crate::event_loop::{EventLoop, EventLoopHandle};
use crate::frame::Opcode;
use crate::listener::{bind_listener, run_listener};
use crate::message::{DeviceInfo, TciMessage};
use crate::registry::ClientRegistry;

/// State shared by the listener and every connection worker.
pub struct TciContext {
    pub registry: Arc<ClientRegistry>,
    pub events: EventLoopHandle,
    pub radio: Arc<dyn RigStateReader>,
    pub info: DeviceInfo,
}

/// Running TCI server.
pub struct TciServer {
    local_addr: SocketAddr,
    ctx: Arc<TciContext>,
    shutdown_tx: watch::Sender<bool>,
    listener_task: JoinHandle<()>,
    loop_task: JoinHandle<()>,
}

impl TciServer {
    /// Bind the listening socket and start the server tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind<R>(config: &TciConfig, radio: R) -> io::Result<Self>
    where
        R: RigStateReader + 'static,
    {
        let radio: Arc<dyn RigStateReader> = Arc::new(radio);
        let listener = bind_listener(config.listen_addr())?;
        let local_addr = listener.local_addr()?;

        let (events, loop_rx) = EventLoopHandle::channel();
        let registry = Arc::new(ClientRegistry::new(config.max_clients, events.clone()));
        let info = config.device_info();
        let event_loop = EventLoop::new(
            loop_rx,
            registry.clone(),
            radio.clone(),
            config.tx_only,
            info.trx_count,
        );
        let loop_task = tokio::spawn(event_loop.run());

        let ctx = Arc::new(TciContext {
            registry,
            events,
            radio,
            info,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener_task = tokio::spawn(run_listener(listener, ctx.clone(), shutdown_rx));

        info!(
            "TCI server listening on {} ({} clients max{})",
            local_addr,
            ctx.registry.capacity(),
            if config.tx_only { ", tx frequency only" } else { "" }
        );

        Ok(Self {
            local_addr,
            ctx,
            shutdown_tx,
            listener_task,
            loop_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of clients past the WebSocket upgrade.
    pub fn connected_clients(&self) -> usize {
        self.ctx.registry.open_count()
    }

    /// Stop accepting, tell every client `stop;`, close all connections
    /// and wait for the listener and event loop to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.listener_task.await;

        for lease in self.ctx.registry.open_leases() {
            self.ctx.events.send_message(lease, &TciMessage::Stop);
            self.ctx.events.send_frame(lease, Opcode::Close, Vec::new());
        }
        let released = self.ctx.registry.release_all();

        self.ctx.events.shutdown();
        let _ = self.loop_task.await;
        info!("TCI server stopped ({} clients closed)", released);
    }
}
