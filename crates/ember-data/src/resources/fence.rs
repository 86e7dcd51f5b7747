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

use ember_core::{FenceId, FenceStatus, GraphicsDevice, Status};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A GPU completion marker with an unset / pending life cycle.
///
/// [`Fence::create`] moves it to pending. The first [`Fence::check`] that sees the
/// marker retire returns [`Status::Ok`] and releases it, putting the fence back into
/// the unset state. Dropping a pending fence deletes the marker.
pub struct Fence {
    device: Arc<dyn GraphicsDevice>,
    id: Option<FenceId>,
}

impl Fence {
    /// Creates an unset fence for `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device, id: None }
    }

    /// Inserts a marker into the command stream.
    ///
    /// With `flush` set, the marker is pushed to the driver before returning. This is
    /// required when another context or thread will check it.
    ///
    /// Returns `false` when the device has no fence support. The device is flushed in
    /// that case and the caller must treat the work as complete after a `finish`.
    pub fn create(&mut self, flush: bool) -> bool {
        self.release();

        if !self.device.supports_fences() {
            self.device.flush();
            return false;
        }

        self.id = self.device.create_fence();
        if flush || self.id.is_none() {
            self.device.flush();
        }
        self.id.is_some()
    }

    /// Polls the marker.
    ///
    /// Returns [`Status::Busy`] while the marker has not retired within `timeout`,
    /// [`Status::Ok`] once it has (and releases it), or [`Status::InvalidCall`] when
    /// nothing is pending.
    pub fn check(&mut self, timeout: Duration) -> Status {
        let Some(id) = self.id else {
            return Status::InvalidCall;
        };

        match self.device.poll_fence(id, timeout) {
            Ok(FenceStatus::Signaled) => {
                self.release();
                Status::Ok
            }
            Ok(FenceStatus::Pending) => Status::Busy,
            Err(e) => {
                log::error!("Fence {:?} could not be polled: {}", id, e);
                self.release();
                e.status()
            }
        }
    }

    /// Blocks until the marker retires or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Status {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let status = self.check(remaining);
            if status != Status::Busy || remaining.is_zero() {
                return status;
            }
        }
    }

    /// Returns `true` while a marker is pending.
    pub fn is_pending(&self) -> bool {
        self.id.is_some()
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.device.delete_fence(id);
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::headless::HeadlessDevice;

    #[test]
    fn check_without_create_is_an_invalid_call() {
        let device = Arc::new(HeadlessDevice::new());
        let mut fence = Fence::new(device);
        assert_eq!(fence.check(Duration::ZERO), Status::InvalidCall);
    }

    #[test]
    fn busy_until_signaled_then_released_exactly_once() {
        let device = Arc::new(HeadlessDevice::new().with_fence_latency(2));
        let mut fence = Fence::new(device.clone());

        assert!(fence.create(true));
        assert_eq!(device.live_fences(), 1);
        assert_eq!(fence.check(Duration::ZERO), Status::Busy);
        assert_eq!(fence.check(Duration::ZERO), Status::Ok);
        assert!(!fence.is_pending());
        assert_eq!(device.live_fences(), 0);
        // Not reusable until created again.
        assert_eq!(fence.check(Duration::ZERO), Status::InvalidCall);
    }

    #[test]
    fn wait_blocks_until_the_marker_retires() {
        let device = Arc::new(HeadlessDevice::new().with_fence_latency(5));
        let mut fence = Fence::new(device.clone());
        fence.create(true);

        assert_eq!(fence.wait(Duration::from_secs(1)), Status::Ok);
        assert!(!fence.is_pending());
        assert_eq!(device.live_fences(), 0);
    }

    #[test]
    fn wait_on_an_unset_fence_returns_immediately() {
        let device = Arc::new(HeadlessDevice::new());
        let mut fence = Fence::new(device);
        assert_eq!(fence.wait(Duration::from_secs(1)), Status::InvalidCall);
    }

    #[test]
    fn missing_fence_support_flushes_instead() {
        let device = Arc::new(HeadlessDevice::new().without_fences());
        let mut fence = Fence::new(device.clone());

        assert!(!fence.create(false));
        assert_eq!(device.flush_count(), 1);
        assert!(!fence.is_pending());
    }

    #[test]
    fn dropping_a_pending_fence_deletes_it() {
        let device = Arc::new(HeadlessDevice::new().with_fence_latency(10));
        {
            let mut fence = Fence::new(device.clone());
            fence.create(false);
            assert_eq!(device.live_fences(), 1);
        }
        assert_eq!(device.live_fences(), 0);
    }
}
