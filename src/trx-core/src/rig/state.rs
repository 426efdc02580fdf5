// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::radio::freq::Freq;

/// Mode supported by the rig.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RigMode {
    LSB,
    USB,
    CW,
    CWR,
    AM,
    WFM,
    FM,
    DIG,
    PKT,
    Other(String),
}

/// Frequency and mode of a single VFO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigVfo {
    pub freq: Freq,
    pub mode: RigMode,
}

/// Transceiver state held by whatever task owns the radio.
///
/// Frontends never mutate this; they read it through
/// [`RigStateReader`](crate::rig::RigStateReader) and work on snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct RigState {
    pub vfo_a: RigVfo,
    pub vfo_b: RigVfo,
    /// Transmit on VFO B while receiving on VFO A.
    pub split: bool,
    pub tx_en: bool,
    pub tune: bool,
    /// Signal level of every active receiver, in dBm.
    pub rx_sig_dbm: Vec<i32>,
    pub cw_wpm: u32,
}

impl RigState {
    /// Create state with common defaults.
    pub fn new_uninitialized() -> Self {
        Self {
            vfo_a: RigVfo {
                freq: Freq { hz: 14_074_000 },
                mode: RigMode::USB,
            },
            vfo_b: RigVfo {
                freq: Freq { hz: 7_074_000 },
                mode: RigMode::LSB,
            },
            split: false,
            tx_en: false,
            tune: false,
            rx_sig_dbm: vec![-127, -127],
            cw_wpm: 15,
        }
    }

    /// Create state with an initial VFO A freq/mode.
    pub fn with_vfo_a(initial_freq_hz: u64, initial_mode: RigMode) -> Self {
        let mut state = Self::new_uninitialized();
        state.vfo_a = RigVfo {
            freq: Freq {
                hz: initial_freq_hz,
            },
            mode: initial_mode,
        };
        state
    }

    /// Frequency the rig would transmit on right now.
    pub fn tx_freq(&self) -> Freq {
        if self.split {
            self.vfo_b.freq
        } else {
            self.vfo_a.freq
        }
    }

    pub fn vfo(&self, idx: usize) -> Option<&RigVfo> {
        match idx {
            0 => Some(&self.vfo_a),
            1 => Some(&self.vfo_b),
            _ => None,
        }
    }

    fn vfo_mut(&mut self, idx: usize) -> Option<&mut RigVfo> {
        match idx {
            0 => Some(&mut self.vfo_a),
            1 => Some(&mut self.vfo_b),
            _ => None,
        }
    }

    /// Produce an immutable snapshot suitable for sharing with clients.
    pub fn snapshot(&self) -> RigSnapshot {
        RigSnapshot {
            vfo_a: self.vfo_a.clone(),
            vfo_b: self.vfo_b.clone(),
            tx_freq: self.tx_freq(),
            split: self.split,
            tx_en: self.tx_en,
            tune: self.tune,
            rx_sig_dbm: self.rx_sig_dbm.clone(),
            cw_wpm: self.cw_wpm,
        }
    }

    /// Apply a frequency change to VFO `idx`. Unknown VFOs are ignored.
    pub fn apply_freq(&mut self, idx: usize, freq: Freq) {
        if let Some(vfo) = self.vfo_mut(idx) {
            vfo.freq = freq;
        }
    }

    /// Apply a mode change to VFO `idx`. Unknown VFOs are ignored.
    pub fn apply_mode(&mut self, idx: usize, mode: RigMode) {
        if let Some(vfo) = self.vfo_mut(idx) {
            vfo.mode = mode;
        }
    }

    /// Apply a PTT change. Dropping PTT also ends a tune cycle.
    pub fn apply_ptt(&mut self, ptt: bool) {
        self.tx_en = ptt;
        if !ptt {
            self.tune = false;
        }
    }

    pub fn apply_split(&mut self, split: bool) {
        self.split = split;
    }
}

impl Default for RigState {
    fn default() -> Self {
        Self::new_uninitialized()
    }
}

/// Read-only point-in-time copy of the radio state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigSnapshot {
    pub vfo_a: RigVfo,
    pub vfo_b: RigVfo,
    pub tx_freq: Freq,
    pub split: bool,
    pub tx_en: bool,
    pub tune: bool,
    pub rx_sig_dbm: Vec<i32>,
    pub cw_wpm: u32,
}

impl RigSnapshot {
    pub fn vfo(&self, idx: usize) -> Option<&RigVfo> {
        match idx {
            0 => Some(&self.vfo_a),
            1 => Some(&self.vfo_b),
            _ => None,
        }
    }

    /// Signal level of receiver `rx` in dBm, if that receiver is active.
    pub fn signal_dbm(&self, rx: usize) -> Option<i32> {
        self.rx_sig_dbm.get(rx).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_freq_follows_split() {
        let mut state = RigState::with_vfo_a(14_010_000, RigMode::CW);
        state.apply_freq(1, Freq::new(14_012_000));
        assert_eq!(state.tx_freq(), Freq::new(14_010_000));

        state.apply_split(true);
        assert_eq!(state.tx_freq(), Freq::new(14_012_000));
        assert_eq!(state.snapshot().tx_freq, Freq::new(14_012_000));
    }

    #[test]
    fn test_unknown_vfo_is_ignored() {
        let mut state = RigState::new_uninitialized();
        let before = state.snapshot();
        state.apply_freq(2, Freq::new(1));
        state.apply_mode(5, RigMode::AM);
        assert_eq!(state.snapshot(), before);
        assert!(state.vfo(2).is_none());
    }

    #[test]
    fn test_ptt_off_clears_tune() {
        let mut state = RigState::new_uninitialized();
        state.tune = true;
        state.apply_ptt(true);
        assert!(state.tune);
        state.apply_ptt(false);
        assert!(!state.tx_en);
        assert!(!state.tune);
    }

    #[test]
    fn test_snapshot_signal_lookup() {
        let mut state = RigState::new_uninitialized();
        state.rx_sig_dbm = vec![-73, -101];
        let snap = state.snapshot();
        assert_eq!(snap.signal_dbm(0), Some(-73));
        assert_eq!(snap.signal_dbm(1), Some(-101));
        assert_eq!(snap.signal_dbm(2), None);
    }
}
