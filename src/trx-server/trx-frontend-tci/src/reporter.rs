// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Differential state reporting.
//!
//! Each open client has a [`Reporter`] owned by the event loop. A timer
//! task posts one tick per [`REPORT_INTERVAL`]; on each tick the reporter
//! compares a fresh radio snapshot with what it last told the client and
//! emits only the fields that changed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use trx_core::{Freq, RigMode, RigSnapshot};

use crate::event_loop::EventLoopHandle;
use crate::message::TciMessage;
use crate::registry::Lease;

pub const REPORT_INTERVAL: Duration = Duration::from_millis(500);
/// Keep-alive PING every 30 ticks (15 s).
pub const PING_EVERY_TICKS: u32 = 30;

/// Values last sent to a client. `None` means never reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastReported {
    pub tx_freq: Option<Freq>,
    pub vfo_a: Option<Freq>,
    pub vfo_b: Option<Freq>,
    pub mode_a: Option<RigMode>,
    pub mode_b: Option<RigMode>,
    pub split: Option<bool>,
    pub tx_en: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Report only the transmit frequency.
    pub tx_only: bool,
    pub smeter_enabled: bool,
    /// Receivers announced to the client; meters past this are not sent.
    pub receivers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Ping,
    Message(TciMessage),
}

#[derive(Debug, Default)]
pub struct Reporter {
    last: LastReported,
    ticks: u32,
}

fn changed<T: PartialEq + Clone>(cached: &mut Option<T>, current: &T) -> bool {
    if cached.as_ref() == Some(current) {
        return false;
    }
    *cached = Some(current.clone());
    true
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_reported(&self) -> &LastReported {
        &self.last
    }

    pub fn tick(&mut self, snapshot: &RigSnapshot, options: ReportOptions) -> Vec<Outbound> {
        let mut out = Vec::new();
        self.ticks = self.ticks.wrapping_add(1);

        if self.ticks % PING_EVERY_TICKS == 0 {
            out.push(Outbound::Ping);
        }

        if changed(&mut self.last.tx_freq, &snapshot.tx_freq) {
            out.push(Outbound::Message(TciMessage::TxFrequency(snapshot.tx_freq)));
        }

        if options.tx_only {
            return out;
        }

        if options.smeter_enabled && self.ticks % 2 == 0 {
            let meters = snapshot.rx_sig_dbm.iter().take(options.receivers);
            out.extend(meters.enumerate().map(|(trx, &dbm)| {
                Outbound::Message(TciMessage::RxSmeter {
                    trx,
                    channel: 0,
                    dbm,
                })
            }));
        }

        let last = &mut self.last;
        let mut push = |msg: TciMessage| out.push(Outbound::Message(msg));

        if changed(&mut last.vfo_a, &snapshot.vfo_a.freq) {
            push(TciMessage::Vfo {
                trx: 0,
                channel: 0,
                freq: snapshot.vfo_a.freq,
            });
        }
        if changed(&mut last.vfo_b, &snapshot.vfo_b.freq) {
            push(TciMessage::Vfo {
                trx: 1,
                channel: 0,
                freq: snapshot.vfo_b.freq,
            });
        }
        if changed(&mut last.mode_a, &snapshot.vfo_a.mode) {
            push(TciMessage::Modulation {
                trx: 0,
                mode: snapshot.vfo_a.mode.clone(),
            });
        }
        if changed(&mut last.mode_b, &snapshot.vfo_b.mode) {
            push(TciMessage::Modulation {
                trx: 1,
                mode: snapshot.vfo_b.mode.clone(),
            });
        }
        if changed(&mut last.split, &snapshot.split) {
            push(TciMessage::SplitEnable {
                trx: 0,
                on: snapshot.split,
            });
        }
        if changed(&mut last.tx_en, &snapshot.tx_en) {
            push(TciMessage::Trx {
                trx: 0,
                tx: snapshot.tx_en,
            });
        }

        out
    }
}

/// Post a tick for `lease` every `period` until the event loop goes away.
///
/// The handle is stored in the client slot; release aborts it.
pub fn spawn_report_timer(
    lease: Lease,
    events: EventLoopHandle,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the initial burst covers it.
        interval.tick().await;
        loop {
            interval.tick().await;
            if !events.tick(lease) {
                break;
            }
        }
    })
}
