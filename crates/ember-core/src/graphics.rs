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

//! Defines the backend-agnostic graphics contract the resource system talks to.

use crate::resource::ResourceError;
use std::time::Duration;

/// An opaque identifier for a completion marker in the GPU command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub u64);

/// The result of polling a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// Every command issued before the marker has retired.
    Signaled,
    /// The marker has not been reached within the polling budget.
    Pending,
}

/// The slice of a graphics backend the resource system depends on.
///
/// This trait is the abstraction layer between the resource manager and a concrete
/// graphics API. It covers completion fences, command submission control, GPU object
/// name generation and the secondary context used by the background worker.
pub trait GraphicsDevice: Send + Sync {
    // --- Fences ---

    /// Returns `true` if the backend can create completion fences.
    ///
    /// Without fence support, callers fall back to [`GraphicsDevice::finish`].
    fn supports_fences(&self) -> bool;

    /// Inserts a completion marker into the current command stream.
    ///
    /// # Returns
    ///
    /// The new fence, or `None` if the backend cannot create fences.
    fn create_fence(&self) -> Option<FenceId>;

    /// Polls a fence, waiting at most `timeout` for it to signal.
    ///
    /// # Arguments
    ///
    /// * `fence` - A fence previously returned by [`GraphicsDevice::create_fence`].
    /// * `timeout` - The polling budget. `Duration::ZERO` makes the call non-blocking.
    ///
    /// # Returns
    ///
    /// The fence status, or a [`ResourceError::System`] if the backend lost track of it.
    fn poll_fence(&self, fence: FenceId, timeout: Duration) -> Result<FenceStatus, ResourceError>;

    /// Releases a fence. Deleting an unknown fence is a no-op.
    fn delete_fence(&self, fence: FenceId);

    // --- Submission ---

    /// Forces every queued command to be sent to the driver.
    fn flush(&self);

    /// Blocks until every issued command has completed on the device.
    fn finish(&self);

    // --- Object names ---

    /// Generates `count` fresh, non-zero GPU object names.
    fn generate_names(&self, count: usize) -> Vec<u32>;

    /// Releases names returned by [`GraphicsDevice::generate_names`].
    fn delete_names(&self, names: &[u32]);

    // --- Worker context ---

    /// Returns `true` if a secondary context for a background thread is available.
    fn supports_worker_context(&self) -> bool;

    /// Makes the secondary context current on the calling thread.
    ///
    /// # Returns
    ///
    /// An error if the context could not be bound. The caller then falls back to
    /// updating resources on the main thread.
    fn bind_worker_context(&self) -> Result<(), ResourceError>;

    /// Detaches the secondary context from the calling thread.
    fn release_worker_context(&self);
}
