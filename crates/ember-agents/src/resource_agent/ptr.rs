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

use crossbeam_channel::Sender;
use ember_core::{Resource, Status};
use ember_data::{HandleId, ResourceHandle};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// One counted reference to a handle.
///
/// Creating a guard increments the handle's count, dropping it decrements. The drop
/// that brings the count to zero queues the handle for the next reclamation pass.
pub(crate) struct RefGuard {
    id: HandleId,
    handle: Arc<ResourceHandle>,
    reap: Sender<HandleId>,
}

impl RefGuard {
    pub(crate) fn acquire(id: HandleId, handle: Arc<ResourceHandle>, reap: Sender<HandleId>) -> Self {
        handle.ref_increase();
        Self { id, handle, reap }
    }

    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn handle(&self) -> &Arc<ResourceHandle> {
        &self.handle
    }
}

impl Clone for RefGuard {
    fn clone(&self) -> Self {
        Self::acquire(self.id, Arc::clone(&self.handle), self.reap.clone())
    }
}

impl Drop for RefGuard {
    fn drop(&mut self) {
        if self.handle.ref_decrease() == Some(0) {
            // The manager may already be gone, nothing left to reclaim then.
            let _ = self.reap.send(self.id);
        }
    }
}

/// A typed, reference-counted pointer to a resource handle.
///
/// Cloning adds a reference, dropping removes one. The resource itself is accessed
/// through [`ResourceManager::read`](super::ResourceManager::read), which resolves
/// proxies and falls back to the default resource of the kind while loading.
pub struct ResourcePtr<T> {
    guard: RefGuard,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> ResourcePtr<T> {
    pub(crate) fn new(guard: RefGuard) -> Self {
        Self {
            guard,
            _kind: PhantomData,
        }
    }

    pub(crate) fn guard(&self) -> &RefGuard {
        &self.guard
    }

    /// The arena id of the handle.
    pub fn id(&self) -> HandleId {
        self.guard.id
    }

    /// The cache key of the handle. Empty for anonymous handles and proxies.
    pub fn name(&self) -> &str {
        self.guard.handle.name()
    }

    /// The current status of the handle.
    pub fn status(&self) -> Status {
        self.guard.handle.status()
    }

    /// Returns `true` once the resource may be used.
    pub fn is_usable(&self) -> bool {
        self.guard.handle.is_usable()
    }

    /// Returns `true` if this points at a proxy.
    pub fn is_proxy(&self) -> bool {
        self.guard.handle.is_proxy()
    }

    /// The current reference count of the handle.
    pub fn refs(&self) -> u32 {
        self.guard.handle.refs()
    }

    /// The underlying handle.
    pub fn handle(&self) -> &Arc<ResourceHandle> {
        &self.guard.handle
    }

    /// Returns `true` if both pointers refer to the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.guard.id == other.guard.id
    }

    /// Runs `callback` once the handle becomes usable, or now if it already is.
    pub fn on_loaded_once(&self, callback: impl FnOnce() + Send + 'static) {
        self.guard.handle.on_loaded_once(Box::new(callback));
    }
}

impl<T> Clone for ResourcePtr<T> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResourcePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePtr")
            .field("id", &self.guard.id)
            .field("handle", &self.guard.handle)
            .finish()
    }
}
