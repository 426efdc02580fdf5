// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::message::DeviceInfo;
use crate::registry::{DEFAULT_MAX_CLIENTS, MAX_CLIENTS_LIMIT};

pub const DEFAULT_TCI_PORT: u16 = 40001;

/// `[tci]` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TciConfig {
    /// Whether the TCI server is started
    pub enabled: bool,
    /// Listen address
    pub listen: IpAddr,
    /// Listen port
    pub port: u16,
    /// Only report the transmit frequency
    pub tx_only: bool,
    /// Device name announced to clients
    pub device: String,
    /// Number of concurrent clients
    pub max_clients: usize,
}

impl Default for TciConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_TCI_PORT,
            tx_only: false,
            device: "trx-rs".to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl TciConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            device: self.device.clone(),
            ..DeviceInfo::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.port == 0 {
            return Err("[tci].port must be > 0 when TCI is enabled".to_string());
        }
        if self.device.trim().is_empty() {
            return Err("[tci].device must not be empty".to_string());
        }
        if !(1..=MAX_CLIENTS_LIMIT).contains(&self.max_clients) {
            return Err(format!(
                "[tci].max_clients must be between 1 and {}",
                MAX_CLIENTS_LIMIT
            ));
        }
        Ok(())
    }
}
