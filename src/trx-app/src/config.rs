// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Shared config file name looked up by every trx-rs daemon.
pub const CONFIG_FILE_NAME: &str = "trx-rs.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Missing [{1}] section in config file {0}")]
    MissingSection(PathBuf, &'static str),
}

/// Returns the default search paths for `trx-rs.toml`
/// (current directory → XDG config → /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("trx-rs").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/trx-rs").join(CONFIG_FILE_NAME));
    paths
}

/// Parse TOML text and deserialize the `key` section into `T`.
///
/// `Ok(None)` means the document parsed but has no such section.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let parse_err =
        |e: &dyn std::fmt::Display| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let mut table: toml::Table = toml::from_str(content).map_err(|e| parse_err(&e))?;
    let Some(section) = table.remove(key) else {
        return Ok(None);
    };

    // Going through `Value::try_into` keeps serde defaults for omitted keys.
    section.try_into::<T>().map(Some).map_err(|e| parse_err(&e))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// A daemon configuration stored as one section of `trx-rs.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned + Serialize {
    /// Section key in `trx-rs.toml` (e.g. `"trx-server"`).
    fn section_key() -> &'static str;

    /// Load the section from a specific file path.
    ///
    /// Fails if the file cannot be read, is not valid TOML, or lacks the
    /// `[<section_key>]` table.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?
            .ok_or_else(|| ConfigError::MissingSection(path.to_path_buf(), Self::section_key()))
    }

    /// Load the first file on the default search path that has our section.
    ///
    /// Returns `(Default::default(), None)` when nothing is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }

    /// Render `self` nested under its section header, ready to paste into a
    /// combined `trx-rs.toml`.
    fn to_combined_toml(&self) -> String {
        let mut root = toml::Table::new();
        match toml::Value::try_from(self) {
            Ok(value) => {
                root.insert(Self::section_key().to_string(), value);
            }
            Err(e) => {
                tracing::warn!("failed to serialize [{}] config: {}", Self::section_key(), e);
            }
        }
        toml::to_string_pretty(&root).unwrap_or_default()
    }
}
