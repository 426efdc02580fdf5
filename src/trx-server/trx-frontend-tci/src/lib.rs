// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCI (Transceiver Control Interface) server.
//!
//! Exposes live radio state to logging and digital-mode programs over
//! WebSocket text messages. Clients get a full state burst on connect and
//! afterwards only the fields that changed, checked every 500 ms.

pub mod commands;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod frame;
pub mod handshake;
pub mod listener;
pub mod message;
pub mod registry;
pub mod reporter;
pub mod server;
pub mod worker;

pub use config::TciConfig;
pub use error::{ConnectionError, FrameError, HandshakeError};
pub use message::{DeviceInfo, TciMessage};
pub use server::TciServer;
