// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inbound TCI command handling.
//!
//! Commands are read-only: they answer queries from the current radio
//! state or toggle per-client reporting, and never change the radio.
//! Unknown or malformed commands are dropped without a reply.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use trx_core::RigStateReader;

use crate::message::{DeviceInfo, TciMessage};

/// Split one command into `argv`, stopping at the first `;`.
pub fn tokenize(command: &str) -> Vec<&str> {
    let body = command.split(';').next().unwrap_or_default();
    body.split([':', ','])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true")
}

fn arg_index(argv: &[&str], pos: usize) -> Option<usize> {
    argv.get(pos)?.parse().ok()
}

/// Per-connection command dispatcher.
pub struct CommandParser<'a> {
    radio: &'a dyn RigStateReader,
    info: &'a DeviceInfo,
    smeter_enabled: &'a AtomicBool,
}

impl<'a> CommandParser<'a> {
    pub fn new(
        radio: &'a dyn RigStateReader,
        info: &'a DeviceInfo,
        smeter_enabled: &'a AtomicBool,
    ) -> Self {
        Self {
            radio,
            info,
            smeter_enabled,
        }
    }

    /// Channel argument at `argv[2]`, defaulting to 0. `None` when the
    /// device has no such channel.
    fn channel_arg(&self, argv: &[&str]) -> Option<usize> {
        let channel = match argv.get(2) {
            Some(arg) => arg.parse().ok()?,
            None => 0,
        };
        (channel < self.info.channels_count).then_some(channel)
    }

    /// Handle every `;`-terminated command in a lower-cased TEXT payload.
    pub fn handle_text(&self, text: &str) -> Vec<TciMessage> {
        text.split(';')
            .filter(|command| !command.trim().is_empty())
            .flat_map(|command| self.handle_command(command))
            .collect()
    }

    pub fn handle_command(&self, command: &str) -> Vec<TciMessage> {
        let argv = tokenize(command);
        let Some(&name) = argv.first() else {
            return Vec::new();
        };

        match name {
            "trx_count" => vec![TciMessage::TrxCount(self.info.trx_count)],
            "trx" => {
                let trx = arg_index(&argv, 1).unwrap_or(0);
                if trx >= self.info.trx_count {
                    return Vec::new();
                }
                vec![TciMessage::Trx {
                    trx,
                    tx: self.radio.transmitting(),
                }]
            }
            "rx_sensors_enable" => {
                if let Some(flag) = argv.get(1) {
                    let enabled = parse_flag(flag);
                    self.smeter_enabled.store(enabled, Ordering::Relaxed);
                    debug!("TCI S-meter reporting {}", if enabled { "on" } else { "off" });
                }
                Vec::new()
            }
            "modulation" => {
                let Some(trx) = arg_index(&argv, 1).filter(|&trx| trx < self.info.trx_count)
                else {
                    return Vec::new();
                };
                self.radio
                    .vfo(trx)
                    .map(|vfo| TciMessage::Modulation {
                        trx,
                        mode: vfo.mode,
                    })
                    .into_iter()
                    .collect()
            }
            "vfo" => {
                let Some(trx) = arg_index(&argv, 1).filter(|&trx| trx < self.info.trx_count)
                else {
                    return Vec::new();
                };
                let Some(channel) = self.channel_arg(&argv) else {
                    return Vec::new();
                };
                self.radio
                    .vfo(trx)
                    .map(|vfo| TciMessage::Vfo {
                        trx,
                        channel,
                        freq: vfo.freq,
                    })
                    .into_iter()
                    .collect()
            }
            "rx_smeter" => {
                let Some(trx) = arg_index(&argv, 1).filter(|&trx| trx < self.info.trx_count)
                else {
                    return Vec::new();
                };
                let Some(channel) = self.channel_arg(&argv) else {
                    return Vec::new();
                };
                self.radio
                    .signal_dbm(trx)
                    .map(|dbm| TciMessage::RxSmeter { trx, channel, dbm })
                    .into_iter()
                    .collect()
            }
            "cw_macros_speed" => vec![TciMessage::CwMacrosSpeed(self.radio.keyer_wpm())],
            "tx_frequency" => vec![TciMessage::TxFrequency(self.radio.tx_freq())],
            "split_enable" => {
                let trx = arg_index(&argv, 1).unwrap_or(0);
                if trx >= self.info.trx_count {
                    return Vec::new();
                }
                vec![TciMessage::SplitEnable {
                    trx,
                    on: self.radio.split(),
                }]
            }
            "protocol" => vec![TciMessage::Protocol],
            "device" => vec![TciMessage::Device(self.info.device.clone())],
            other => {
                debug!("ignoring TCI command '{}'", other);
                Vec::new()
            }
        }
    }
}
