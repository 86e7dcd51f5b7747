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

use ember_core::{Reset, ResetMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct RegistryInner {
    next: AtomicU64,
    objects: Mutex<Vec<(u64, Weak<dyn Reset>)>>,
}

/// The set of live relation objects.
///
/// Objects are held weakly, so the registry never keeps one alive. Registration
/// returns a [`ResetBinding`], and dropping the binding unregisters the object.
#[derive(Clone)]
pub struct ResetRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ResetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next: AtomicU64::new(1),
                objects: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds `object` to the registry until the returned binding is dropped.
    ///
    /// Objects usually register from their constructor through `Arc::new_cyclic` and
    /// store the binding in a field.
    #[must_use = "dropping the binding unregisters the object"]
    pub fn register(&self, object: Weak<dyn Reset>) -> ResetBinding {
        let id = self.inner.next.fetch_add(1, Ordering::Relaxed);
        self.inner.objects.lock().push((id, object));
        ResetBinding {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Calls `reset(mode)` on every live object, in registration order.
    ///
    /// The hooks run outside the registry lock, so they may register or drop other
    /// relation objects.
    pub fn notify(&self, mode: ResetMode) {
        for object in self.live() {
            object.reset(mode);
        }
    }

    /// Calls `reshape` on every live object.
    pub fn reshape(&self) {
        for object in self.live() {
            object.reshape();
        }
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.inner.objects.lock().len()
    }

    /// Returns `true` when no object is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.objects.lock().is_empty()
    }

    fn live(&self) -> Vec<Arc<dyn Reset>> {
        self.inner
            .objects
            .lock()
            .iter()
            .filter_map(|(_, object)| object.upgrade())
            .collect()
    }
}

/// Keeps a relation object registered. Unregisters it on drop.
pub struct ResetBinding {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Drop for ResetBinding {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.objects.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
