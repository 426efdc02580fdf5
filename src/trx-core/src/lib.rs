// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod radio;
pub mod rig;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use radio::freq::Freq;
pub use rig::state::{RigMode, RigSnapshot, RigState, RigVfo};
pub use rig::RigStateReader;
