// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for the resource manager.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the resource manager, loadable from JSON.
///
/// Every field has a default, so a JSON document only needs to list the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Frequency of the background update loop in Hz.
    pub update_rate_hz: u32,
    /// Default budget for the startup wait, in milliseconds.
    pub startup_wait_ms: u64,
    /// Budget handed to each fence poll during updates, in microseconds.
    pub fence_poll_timeout_us: u64,
    /// Name given to the background update thread.
    pub worker_thread_name: String,
    /// Directory loose files are resolved against.
    pub root: PathBuf,
    /// Archives opened when the manager is created, relative to `root`.
    pub archives: Vec<String>,
    /// Number of GPU object names pre-generated by name pools.
    pub name_pool_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            update_rate_hz: 100,
            startup_wait_ms: 2000,
            fence_poll_timeout_us: 0,
            worker_thread_name: "resource_thread".to_string(),
            root: PathBuf::from("."),
            archives: Vec::new(),
            name_pool_size: 64,
        }
    }
}

impl ManagerConfig {
    /// Load the configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Save the configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Duration of one worker tick. A rate of zero is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_rate_hz.max(1) as f64)
    }

    /// The default startup wait budget.
    pub fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.startup_wait_ms)
    }

    /// The budget for a single fence poll.
    pub fn fence_poll_timeout(&self) -> Duration {
        Duration::from_micros(self.fence_poll_timeout_us)
    }
}
