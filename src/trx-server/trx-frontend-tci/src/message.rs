// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Outbound TCI text messages.
//!
//! Every message renders as `name:arg1,arg2,...;` (or `name;` without
//! arguments) and is carried in its own WebSocket TEXT frame.

use std::fmt;

use trx_core::{Freq, RigMode, RigSnapshot};

/// Protocol name announced to clients. Logging programs select their TCI
/// dialect from this line.
pub const PROTOCOL_NAME: &str = "ExpertSDR3";
pub const PROTOCOL_VERSION: &str = "1.8";

/// Modulations this server can report, in TCI spelling.
pub const MODULATIONS: &[&str] = &["AM", "LSB", "USB", "CW", "NFM", "WFM", "DIGL", "DIGU"];

/// Static description of the emulated transceiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: String,
    pub receive_only: bool,
    pub trx_count: usize,
    pub channels_count: usize,
    pub vfo_limits: (u64, u64),
    pub if_limits: (i64, i64),
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device: "trx-rs".to_string(),
            receive_only: false,
            trx_count: 2,
            channels_count: 2,
            vfo_limits: (0, 450_000_000),
            if_limits: (-48_000, 48_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TciMessage {
    Protocol,
    Device(String),
    ReceiveOnly(bool),
    TrxCount(usize),
    ChannelsCount(usize),
    VfoLimits { low: u64, high: u64 },
    IfLimits { low: i64, high: i64 },
    ModulationsList,
    Vfo { trx: usize, channel: usize, freq: Freq },
    Modulation { trx: usize, mode: RigMode },
    Trx { trx: usize, tx: bool },
    Tune { trx: usize, on: bool },
    TxFrequency(Freq),
    SplitEnable { trx: usize, on: bool },
    RxSmeter { trx: usize, channel: usize, dbm: i32 },
    CwMacrosSpeed(u32),
    Ready,
    Stop,
}

impl fmt::Display for TciMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol => write!(f, "protocol:{PROTOCOL_NAME},{PROTOCOL_VERSION};"),
            Self::Device(name) => write!(f, "device:{name};"),
            Self::ReceiveOnly(on) => write!(f, "receive_only:{on};"),
            Self::TrxCount(n) => write!(f, "trx_count:{n};"),
            Self::ChannelsCount(n) => write!(f, "channels_count:{n};"),
            Self::VfoLimits { low, high } => write!(f, "vfo_limits:{low},{high};"),
            Self::IfLimits { low, high } => write!(f, "if_limits:{low},{high};"),
            Self::ModulationsList => write!(f, "modulations_list:{};", MODULATIONS.join(",")),
            Self::Vfo { trx, channel, freq } => write!(f, "vfo:{trx},{channel},{};", freq.hz),
            Self::Modulation { trx, mode } => {
                write!(f, "modulation:{trx},{};", tci_modulation(mode))
            }
            Self::Trx { trx, tx } => write!(f, "trx:{trx},{tx};"),
            Self::Tune { trx, on } => write!(f, "tune:{trx},{on};"),
            Self::TxFrequency(freq) => write!(f, "tx_frequency:{};", freq.hz),
            Self::SplitEnable { trx, on } => write!(f, "split_enable:{trx},{on};"),
            Self::RxSmeter { trx, channel, dbm } => {
                write!(f, "rx_smeter:{trx},{channel},{dbm}.0;")
            }
            Self::CwMacrosSpeed(wpm) => write!(f, "cw_macros_speed:{wpm};"),
            Self::Ready => f.write_str("ready;"),
            Self::Stop => f.write_str("stop;"),
        }
    }
}

/// TCI spelling of a rig mode.
pub fn tci_modulation(mode: &RigMode) -> String {
    match mode {
        RigMode::LSB => "LSB".to_string(),
        RigMode::USB => "USB".to_string(),
        RigMode::CW | RigMode::CWR => "CW".to_string(),
        RigMode::AM => "AM".to_string(),
        RigMode::FM => "NFM".to_string(),
        RigMode::WFM => "WFM".to_string(),
        RigMode::DIG => "DIGU".to_string(),
        RigMode::PKT => "DIGL".to_string(),
        RigMode::Other(other) => other.to_ascii_uppercase(),
    }
}

/// Messages sent once, in order, right after the upgrade completes.
pub fn initial_burst(info: &DeviceInfo, snapshot: &RigSnapshot) -> Vec<TciMessage> {
    let mut burst = vec![
        TciMessage::Protocol,
        TciMessage::Device(info.device.clone()),
        TciMessage::ReceiveOnly(info.receive_only),
        TciMessage::TrxCount(info.trx_count),
        TciMessage::ChannelsCount(info.channels_count),
        TciMessage::VfoLimits {
            low: info.vfo_limits.0,
            high: info.vfo_limits.1,
        },
        TciMessage::IfLimits {
            low: info.if_limits.0,
            high: info.if_limits.1,
        },
        TciMessage::ModulationsList,
    ];

    for (trx, vfo) in [&snapshot.vfo_a, &snapshot.vfo_b].into_iter().enumerate() {
        burst.push(TciMessage::Vfo {
            trx,
            channel: 0,
            freq: vfo.freq,
        });
        burst.push(TciMessage::Modulation {
            trx,
            mode: vfo.mode.clone(),
        });
    }

    burst.extend([
        TciMessage::SplitEnable {
            trx: 0,
            on: snapshot.split,
        },
        TciMessage::Trx {
            trx: 0,
            tx: snapshot.tx_en,
        },
        TciMessage::Tune {
            trx: 0,
            on: snapshot.tune,
        },
        TciMessage::TxFrequency(snapshot.tx_freq),
        TciMessage::CwMacrosSpeed(snapshot.cw_wpm),
        TciMessage::Ready,
    ]);
    burst
}
