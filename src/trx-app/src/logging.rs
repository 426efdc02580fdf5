// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Map a config log level onto a tracing level, defaulting to INFO.
pub fn parse_level(log_level: Option<&str>) -> Level {
    log_level
        .and_then(|s| s.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Initialize logging with optional level from config.
///
/// A second call (e.g. from tests sharing a process) keeps the subscriber
/// that is already installed.
pub fn init_logging(log_level: Option<&str>) {
    let level = parse_level(log_level);

    let result = FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .try_init();
    if result.is_err() {
        tracing::debug!("global subscriber already installed; keeping it");
    }
}
