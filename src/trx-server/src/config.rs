// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for trx-server.
//!
//! Config is loaded from the `[trx-server]` section of `trx-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./trx-rs.toml`
//! 3. `~/.config/trx-rs/trx-rs.toml`
//! 4. `/etc/trx-rs/trx-rs.toml`

use serde::{Deserialize, Serialize};
use trx_app::ConfigFile;
use trx_core::{Freq, RigMode, RigState};
use trx_frontend_tci::TciConfig;

const MAX_RECEIVERS: usize = 8;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Simulated rig configuration
    pub rig: RigConfig,
    /// TCI server configuration
    pub tci: TciConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Callsign or owner label
    pub callsign: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            callsign: Some("N0CALL".to_string()),
            log_level: None,
        }
    }
}

/// Initial state of the simulated rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// VFO A frequency (Hz)
    pub initial_freq_hz: u64,
    /// VFO A mode
    pub initial_mode: RigMode,
    /// VFO B frequency (Hz)
    pub initial_vfo_b_freq_hz: u64,
    /// VFO B mode
    pub initial_vfo_b_mode: RigMode,
    /// Number of receivers with a signal meter
    pub receivers: usize,
    /// CW keyer speed (WPM)
    pub cw_wpm: u32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            initial_freq_hz: 14_074_000,
            initial_mode: RigMode::USB,
            initial_vfo_b_freq_hz: 7_074_000,
            initial_vfo_b_mode: RigMode::LSB,
            receivers: 2,
            cw_wpm: 15,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration, naming the offending key on failure.
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.rig.initial_freq_hz == 0 {
            return Err("[rig].initial_freq_hz must be > 0".to_string());
        }
        if self.rig.initial_vfo_b_freq_hz == 0 {
            return Err("[rig].initial_vfo_b_freq_hz must be > 0".to_string());
        }
        if !(1..=MAX_RECEIVERS).contains(&self.rig.receivers) {
            return Err(format!(
                "[rig].receivers must be between 1 and {}",
                MAX_RECEIVERS
            ));
        }
        if self.rig.cw_wpm == 0 {
            return Err("[rig].cw_wpm must be > 0".to_string());
        }

        self.tci.validate()
    }

    /// Rig state the simulated radio starts from.
    pub fn initial_state(&self) -> RigState {
        let mut state =
            RigState::with_vfo_a(self.rig.initial_freq_hz, self.rig.initial_mode.clone());
        state.apply_freq(1, Freq::new(self.rig.initial_vfo_b_freq_hz));
        state.apply_mode(1, self.rig.initial_vfo_b_mode.clone());
        state.rx_sig_dbm = vec![-127; self.rig.receivers];
        state.cw_wpm = self.rig.cw_wpm;
        state
    }

    /// Generate an example configuration wrapped under the `[trx-server]`
    /// section header, suitable for use in a combined `trx-rs.toml` file.
    pub fn example_combined_toml() -> String {
        let example = ServerConfig {
            general: GeneralConfig {
                callsign: Some("N0CALL".to_string()),
                log_level: Some("info".to_string()),
            },
            rig: RigConfig::default(),
            tci: TciConfig::default(),
        };
        example.to_combined_toml()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "trx-server"
    }
}
