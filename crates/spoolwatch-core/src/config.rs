// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::AccessRights;

/// Tuning knobs for the queue watcher and event dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Capacity of the channel between watcher tasks and the dispatcher.
    pub event_channel_capacity: usize,
    /// Per-subscriber queue depth.  A subscriber whose queue is full loses
    /// events rather than stalling the watch loops.
    pub subscriber_queue_capacity: usize,
    /// Capacity of the watch-failure error channel.
    pub error_channel_capacity: usize,
    /// Rights requested when `add_printer` is called without explicit ones.
    pub default_access_rights: AccessRights,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            subscriber_queue_capacity: 64,
            error_channel_capacity: 16,
            default_access_rights: AccessRights::USE,
        }
    }
}

impl WatchConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write configuration to a JSON file, pretty-printed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
