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

use ember_core::{FenceId, FenceStatus, GraphicsDevice, ResourceError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};
use std::time::Duration;

#[derive(Default)]
struct DeviceState {
    /// Polls received so far, per live fence.
    fences: HashMap<u64, u32>,
    next_fence: u64,
    next_name: u32,
    live_names: HashSet<u32>,
    flushes: usize,
    finishes: usize,
    worker_thread: Option<ThreadId>,
    worker_binds: usize,
}

/// A [`GraphicsDevice`] that simulates a command stream in memory.
///
/// Fences retire after a fixed number of polls, or immediately on `finish`. Object
/// names are plain counters. Every operation is counted so callers can assert on
/// leaks and flushes.
pub struct HeadlessDevice {
    fence_latency: u32,
    fences_supported: bool,
    worker_context: bool,
    state: Mutex<DeviceState>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device with fence support, fences retiring on their first poll,
    /// and no worker context.
    pub fn new() -> Self {
        Self {
            fence_latency: 1,
            fences_supported: true,
            worker_context: false,
            state: Mutex::new(DeviceState {
                next_fence: 1,
                next_name: 1,
                ..Default::default()
            }),
        }
    }

    /// Fences retire on their `polls`-th poll. Zero behaves like one.
    pub fn with_fence_latency(mut self, polls: u32) -> Self {
        self.fence_latency = polls.max(1);
        self
    }

    /// Disables fence support.
    pub fn without_fences(mut self) -> Self {
        self.fences_supported = false;
        self
    }

    /// Enables or disables the secondary context for a worker thread.
    pub fn with_worker_context(mut self, available: bool) -> Self {
        self.worker_context = available;
        self
    }

    /// Fences created and not yet deleted.
    pub fn live_fences(&self) -> usize {
        self.state.lock().fences.len()
    }

    /// Names generated and not yet deleted.
    pub fn live_names(&self) -> usize {
        self.state.lock().live_names.len()
    }

    /// Number of `flush` calls so far.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Number of `finish` calls so far.
    pub fn finish_count(&self) -> usize {
        self.state.lock().finishes
    }

    /// Number of successful worker context binds so far.
    pub fn worker_binds(&self) -> usize {
        self.state.lock().worker_binds
    }

    /// Returns `true` while a thread holds the worker context.
    pub fn worker_bound(&self) -> bool {
        self.state.lock().worker_thread.is_some()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn supports_fences(&self) -> bool {
        self.fences_supported
    }

    fn create_fence(&self) -> Option<FenceId> {
        if !self.fences_supported {
            return None;
        }
        let mut state = self.state.lock();
        let id = state.next_fence;
        state.next_fence += 1;
        state.fences.insert(id, 0);
        Some(FenceId(id))
    }

    fn poll_fence(&self, fence: FenceId, _timeout: Duration) -> Result<FenceStatus, ResourceError> {
        let mut state = self.state.lock();
        let polls = state
            .fences
            .get_mut(&fence.0)
            .ok_or_else(|| ResourceError::System(format!("unknown fence {}", fence.0)))?;
        *polls = polls.saturating_add(1);
        if *polls >= self.fence_latency {
            Ok(FenceStatus::Signaled)
        } else {
            Ok(FenceStatus::Pending)
        }
    }

    fn delete_fence(&self, fence: FenceId) {
        self.state.lock().fences.remove(&fence.0);
    }

    fn flush(&self) {
        self.state.lock().flushes += 1;
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.finishes += 1;
        let latency = self.fence_latency;
        for polls in state.fences.values_mut() {
            // The next poll reports completion.
            *polls = (*polls).max(latency - 1);
        }
    }

    fn generate_names(&self, count: usize) -> Vec<u32> {
        let mut state = self.state.lock();
        let start = state.next_name;
        state.next_name += count as u32;
        let names: Vec<u32> = (start..start + count as u32).collect();
        state.live_names.extend(names.iter().copied());
        names
    }

    fn delete_names(&self, names: &[u32]) {
        let mut state = self.state.lock();
        for name in names {
            state.live_names.remove(name);
        }
    }

    fn supports_worker_context(&self) -> bool {
        self.worker_context
    }

    fn bind_worker_context(&self) -> Result<(), ResourceError> {
        if !self.worker_context {
            return Err(ResourceError::Support(
                "headless device was created without a worker context".to_string(),
            ));
        }
        let mut state = self.state.lock();
        if let Some(owner) = state.worker_thread {
            if owner != thread::current().id() {
                return Err(ResourceError::System(
                    "worker context is already bound to another thread".to_string(),
                ));
            }
        }
        state.worker_thread = Some(thread::current().id());
        state.worker_binds += 1;
        log::debug!("Headless worker context bound");
        Ok(())
    }

    fn release_worker_context(&self) {
        self.state.lock().worker_thread = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_retire_after_the_configured_polls() {
        let device = HeadlessDevice::new().with_fence_latency(2);
        let fence = device.create_fence().unwrap();

        assert_eq!(device.poll_fence(fence, Duration::ZERO), Ok(FenceStatus::Pending));
        assert_eq!(device.poll_fence(fence, Duration::ZERO), Ok(FenceStatus::Signaled));
        device.delete_fence(fence);
        assert!(device.poll_fence(fence, Duration::ZERO).is_err());
    }

    #[test]
    fn finish_completes_every_fence() {
        let device = HeadlessDevice::new().with_fence_latency(50);
        let fence = device.create_fence().unwrap();
        device.finish();
        assert_eq!(device.poll_fence(fence, Duration::ZERO), Ok(FenceStatus::Signaled));
    }

    #[test]
    fn names_are_unique_and_tracked() {
        let device = HeadlessDevice::new();
        let a = device.generate_names(3);
        let b = device.generate_names(2);
        assert!(a.iter().all(|n| !b.contains(n) && *n != 0));
        assert_eq!(device.live_names(), 5);
        device.delete_names(&a);
        assert_eq!(device.live_names(), 2);
    }

    #[test]
    fn worker_context_is_exclusive() {
        let device = std::sync::Arc::new(HeadlessDevice::new().with_worker_context(true));
        device.bind_worker_context().unwrap();

        let other = std::sync::Arc::clone(&device);
        let result = thread::spawn(move || other.bind_worker_context())
            .join()
            .unwrap();
        assert!(result.is_err());

        device.release_worker_context();
        assert!(!device.worker_bound());
    }
}
