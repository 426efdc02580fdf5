// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP accept loop for the TCI server.
//!
//! A slot is reserved before `accept`, so no connection is taken while all
//! slots are busy; waiting clients sit in the kernel backlog until one
//! frees up.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::HandshakeError;
use crate::handshake;
use crate::registry::Lease;
use crate::reporter::{spawn_report_timer, REPORT_INTERVAL};
use crate::server::TciContext;
use crate::worker::Connection;

pub const ACCEPT_TIMEOUT: Duration = Duration::from_millis(500);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause between retries while every slot is occupied.
pub const SLOT_RETRY_DELAY: Duration = Duration::from_millis(100);
const LISTEN_BACKLOG: u32 = 16;

/// Bind a listening socket with address reuse enabled.
pub fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            return;
        }
    }
}

/// Accept clients until `shutdown_rx` flips to true.
pub async fn run_listener(
    listener: TcpListener,
    ctx: Arc<TciContext>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut reserved: Option<Lease> = None;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let lease = match reserved.take().or_else(|| ctx.registry.allocate()) {
            Some(lease) => lease,
            None => {
                tokio::select! {
                    _ = sleep(SLOT_RETRY_DELAY) => {}
                    _ = wait_for_shutdown(&mut shutdown_rx) => break,
                }
                continue;
            }
        };

        let accepted = tokio::select! {
            res = timeout(ACCEPT_TIMEOUT, listener.accept()) => res,
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                ctx.registry.release(lease);
                break;
            }
        };

        let (stream, peer) = match accepted {
            Err(_) => {
                reserved = Some(lease);
                continue;
            }
            Ok(Err(e)) => {
                warn!("TCI accept failed: {}", e);
                reserved = Some(lease);
                sleep(SLOT_RETRY_DELAY).await;
                continue;
            }
            Ok(Ok(pair)) => pair,
        };

        debug!("TCI connection from {} on slot {}", peer, lease);
        if let Err(e) = admit(stream, peer, lease, &ctx).await {
            info!("TCI connection from {} rejected: {}", peer, e);
            ctx.registry.release(lease);
        }
    }

    if let Some(lease) = reserved {
        ctx.registry.release(lease);
    }
    info!("TCI listener stopped");
}

/// Upgrade an accepted connection and start its worker and reporter.
async fn admit(
    mut stream: TcpStream,
    peer: SocketAddr,
    lease: Lease,
    ctx: &Arc<TciContext>,
) -> Result<(), HandshakeError> {
    stream.set_nodelay(true)?;
    let leftover = handshake::accept_upgrade(&mut stream, HANDSHAKE_TIMEOUT).await?;

    let shutdown = ctx
        .registry
        .open(lease, peer)
        .ok_or(HandshakeError::SlotReleased)?;

    let (reader, writer) = stream.into_split();
    ctx.events.attach(lease, Box::new(writer));

    let connection = Connection::new(lease, peer, reader, leftover, shutdown, ctx.clone());
    tokio::spawn(connection.run());

    let timer = spawn_report_timer(lease, ctx.events.clone(), REPORT_INTERVAL);
    ctx.registry.set_reporter(lease, timer);
    Ok(())
}
