// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated radio for running the server without hardware.
//!
//! Holds rig state in memory, publishes it on a watch channel and moves
//! the receiver signal meters so clients have something to display.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;
use trx_core::RigState;

pub const METER_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

const METER_FLOOR_DBM: i32 = -121;
const METER_PERIOD: u64 = 40;
const METER_STEP_DB: i32 = 3;

/// Signal level of receiver `rx` at step `tick`: a triangle wave between
/// -121 and -61 dBm, phase shifted per receiver.
pub fn meter_level(tick: u64, rx: usize) -> i32 {
    let phase = (tick + rx as u64 * 7) % METER_PERIOD;
    let half = METER_PERIOD / 2;
    let ramp = if phase < half { phase } else { METER_PERIOD - phase };
    METER_FLOOR_DBM + ramp as i32 * METER_STEP_DB
}

pub struct DummyRadio {
    state_tx: watch::Sender<RigState>,
    tick: u64,
}

impl DummyRadio {
    pub fn new(initial: RigState) -> (Self, watch::Receiver<RigState>) {
        let (state_tx, state_rx) = watch::channel(initial);
        (Self { state_tx, tick: 0 }, state_rx)
    }

    /// Advance the meters one step.
    pub fn step(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        let tick = self.tick;
        self.state_tx.send_if_modified(|state| {
            let mut modified = false;
            for (rx, level) in state.rx_sig_dbm.iter_mut().enumerate() {
                let next = meter_level(tick, rx);
                if *level != next {
                    *level = next;
                    modified = true;
                }
            }
            modified
        });
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = time::interval(METER_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        {
            let state = self.state_tx.borrow();
            info!(
                "Simulated rig ready (VFO A {} Hz, VFO B {} Hz, {} receivers)",
                state.vfo_a.freq, state.vfo_b.freq, state.rx_sig_dbm.len()
            );
        }
        loop {
            tokio::select! {
                _ = interval.tick() => self.step(),
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
