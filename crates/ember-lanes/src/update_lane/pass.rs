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

use ember_core::{GraphicsDevice, Status};
use ember_data::HandleArena;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// What one update pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Handles looked at.
    pub visited: usize,
    /// Handles whose update ran.
    pub updated: usize,
    /// Handles that became usable during this pass.
    pub completed: usize,
    /// Handles that failed during this pass.
    pub failed: usize,
}

/// Advances every eligible handle of the table by one step.
///
/// The table length is re-read on every iteration, so handles inserted during the
/// pass are still visited. The table lock is only held while fetching the next
/// handle and is released around each update, which may be slow.
pub fn update_pass(
    table: &RwLock<HandleArena>,
    device: &Arc<dyn GraphicsDevice>,
    on_worker: bool,
    poll_timeout: Duration,
) -> PassStats {
    let mut stats = PassStats::default();
    let mut index = 0;

    loop {
        let handle = {
            let arena = table.read();
            if index >= arena.len() {
                break;
            }
            arena.at(index).map(|(_, handle)| Arc::clone(handle))
        };
        index += 1;

        let Some(handle) = handle else {
            continue;
        };
        stats.visited += 1;

        if !handle.can_auto_update() {
            continue;
        }
        stats.updated += 1;
        match handle.auto_update(device, on_worker, poll_timeout) {
            Status::Ok => stats.completed += 1,
            Status::Busy => {}
            _ => stats.failed += 1,
        }
    }

    stats
}
