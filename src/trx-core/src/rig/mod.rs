// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

use tokio::sync::watch;

use crate::radio::freq::Freq;

pub mod state;

use state::{RigSnapshot, RigState, RigVfo};

/// Read-only view of the live radio state.
///
/// Every method is a synchronous, non-blocking read without side effects.
/// Only `snapshot` is required; the other accessors default to reading a
/// fresh snapshot and may be overridden with cheaper lookups.
pub trait RigStateReader: Send + Sync {
    fn snapshot(&self) -> RigSnapshot;

    fn vfo(&self, idx: usize) -> Option<RigVfo> {
        self.snapshot().vfo(idx).cloned()
    }

    fn tx_freq(&self) -> Freq {
        self.snapshot().tx_freq
    }

    fn transmitting(&self) -> bool {
        self.snapshot().tx_en
    }

    fn split(&self) -> bool {
        self.snapshot().split
    }

    fn signal_dbm(&self, rx: usize) -> Option<i32> {
        self.snapshot().signal_dbm(rx)
    }

    fn keyer_wpm(&self) -> u32 {
        self.snapshot().cw_wpm
    }
}

impl RigStateReader for watch::Receiver<RigState> {
    fn snapshot(&self) -> RigSnapshot {
        self.borrow().snapshot()
    }

    fn vfo(&self, idx: usize) -> Option<RigVfo> {
        self.borrow().vfo(idx).cloned()
    }

    fn tx_freq(&self) -> Freq {
        self.borrow().tx_freq()
    }

    fn transmitting(&self) -> bool {
        self.borrow().tx_en
    }

    fn split(&self) -> bool {
        self.borrow().split
    }

    fn signal_dbm(&self, rx: usize) -> Option<i32> {
        self.borrow().rx_sig_dbm.get(rx).copied()
    }

    fn keyer_wpm(&self) -> u32 {
        self.borrow().cw_wpm
    }
}

impl<T: RigStateReader + ?Sized> RigStateReader for Arc<T> {
    fn snapshot(&self) -> RigSnapshot {
        (**self).snapshot()
    }

    fn vfo(&self, idx: usize) -> Option<RigVfo> {
        (**self).vfo(idx)
    }

    fn tx_freq(&self) -> Freq {
        (**self).tx_freq()
    }

    fn transmitting(&self) -> bool {
        (**self).transmitting()
    }

    fn split(&self) -> bool {
        (**self).split()
    }

    fn signal_dbm(&self, rx: usize) -> Option<i32> {
        (**self).signal_dbm(rx)
    }

    fn keyer_wpm(&self) -> u32 {
        (**self).keyer_wpm()
    }
}
