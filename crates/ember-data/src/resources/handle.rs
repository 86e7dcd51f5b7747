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

use super::fence::Fence;
use ember_core::{AnyResource, GraphicsDevice, LoadContext, LoadState, Resource, ResourceSource, Status};
use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::atomic::{AtomicI8, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A one-shot callback fired when a handle first becomes usable.
pub type LoadedCallback = Box<dyn FnOnce() + Send>;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// State guarded by the per-handle update lock.
struct Slot {
    resource: Option<Box<dyn AnyResource>>,
    fence: Option<Fence>,
}

/// Lifecycle wrapper around one resource instance.
///
/// A handle owns its resource, an optional backing file, a status, an atomic
/// reference count and a lock guarding load and unload transitions. The status is
/// published with release ordering only after both the CPU-side load and any GPU
/// fence completed, so a thread that reads [`Status::Ok`] may use the resource.
///
/// Handles never fail loudly. Load errors are logged once and recorded as the
/// handle's status.
pub struct ResourceHandle {
    name: String,
    kind: TypeId,
    kind_name: &'static str,
    automatic: bool,
    proxy: bool,
    file: Option<Arc<dyn ResourceSource>>,
    initial: Status,
    status: AtomicI8,
    refs: AtomicU32,
    epoch: AtomicU64,
    serial: u64,
    slot: Mutex<Slot>,
    // Owned entries carry the serial of the handle that registered them.
    callbacks: Mutex<Vec<(Option<u64>, LoadedCallback)>>,
}

impl ResourceHandle {
    /// Wraps `resource`.
    ///
    /// The handle starts [`Status::Busy`] if it has a file or is `automatic`, and
    /// [`Status::Ok`] otherwise (the owner populates it by hand).
    pub fn new<T: Resource>(
        resource: T,
        file: Option<Arc<dyn ResourceSource>>,
        name: impl Into<String>,
        automatic: bool,
    ) -> Self {
        let initial = if file.is_some() || automatic {
            Status::Busy
        } else {
            Status::Ok
        };
        Self::build(
            Some(Box::new(resource)),
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            file,
            name.into(),
            automatic,
            false,
            initial,
        )
    }

    /// Creates a proxy handle for resources of kind `T`.
    ///
    /// A proxy owns nothing and stays [`Status::Busy`] until a target makes it usable.
    pub fn new_proxy<T: Resource>() -> Self {
        Self::build(
            None,
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            None,
            String::new(),
            false,
            true,
            Status::Busy,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        resource: Option<Box<dyn AnyResource>>,
        kind: TypeId,
        kind_name: &'static str,
        file: Option<Arc<dyn ResourceSource>>,
        name: String,
        automatic: bool,
        proxy: bool,
        initial: Status,
    ) -> Self {
        Self {
            name,
            kind,
            kind_name,
            automatic,
            proxy,
            file,
            initial,
            status: AtomicI8::new(initial.code()),
            refs: AtomicU32::new(0),
            epoch: AtomicU64::new(0),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            slot: Mutex::new(Slot {
                resource,
                fence: None,
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    // --- Identity ---

    /// The cache key. Empty for anonymous handles and proxies.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A name fit for log messages.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        }
    }

    /// The `TypeId` of the wrapped resource kind.
    pub fn kind(&self) -> TypeId {
        self.kind
    }

    /// A process-wide unique number for this handle.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The type name of the wrapped resource kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind_name
    }

    /// Returns `true` if the handle is driven by the update loop.
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    /// Returns `true` for proxy handles.
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// The backing file, if any.
    pub fn file(&self) -> Option<&Arc<dyn ResourceSource>> {
        self.file.as_ref()
    }

    // --- Status ---

    /// The current status.
    pub fn status(&self) -> Status {
        Status::from_code(self.status.load(Ordering::Acquire)).unwrap_or(Status::ErrorSystem)
    }

    /// Returns `true` once the resource may be used.
    pub fn is_usable(&self) -> bool {
        self.status().is_ok()
    }

    /// Sets the status without firing callbacks.
    ///
    /// Used to put a proxy back into the busy state when it is redirected.
    pub fn set_status(&self, status: Status) {
        self.status.store(status.code(), Ordering::Release);
    }

    /// Publishes `status`. On a transition to [`Status::Ok`] every queued callback
    /// runs exactly once, after the status is visible.
    pub fn publish(&self, status: Status) {
        if !status.is_ok() {
            self.set_status(status);
            return;
        }

        let pending = {
            let mut callbacks = self.callbacks.lock();
            self.set_status(Status::Ok);
            std::mem::take(&mut *callbacks)
        };
        for (_, callback) in pending {
            callback();
        }
    }

    /// Runs `callback` now if the handle is usable, or when it next becomes usable.
    pub fn on_loaded_once(&self, callback: LoadedCallback) {
        self.register_loaded(None, callback);
    }

    /// Like [`Self::on_loaded_once`], but replaces the callback `owner` queued
    /// earlier. An owner never has more than one callback waiting on a handle.
    pub fn on_loaded_once_for(&self, owner: u64, callback: LoadedCallback) {
        self.register_loaded(Some(owner), callback);
    }

    /// Drops the callback `owner` queued, if it has not fired yet.
    pub fn cancel_loaded(&self, owner: u64) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(key, _)| *key != Some(owner));
        callbacks.len() != before
    }

    fn register_loaded(&self, owner: Option<u64>, callback: LoadedCallback) {
        let mut callbacks = self.callbacks.lock();
        if self.is_usable() {
            drop(callbacks);
            callback();
            return;
        }
        if owner.is_some() {
            callbacks.retain(|(key, _)| *key != owner);
        }
        callbacks.push((owner, callback));
    }

    /// Number of callbacks waiting for the next transition to OK.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    // --- References ---

    /// Current reference count.
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Adds a reference and returns the new count.
    pub fn ref_increase(&self) -> u32 {
        self.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a reference and returns the new count.
    ///
    /// A decrement on a count of zero is refused and logged, the count never wraps.
    pub fn ref_decrease(&self) -> Option<u32> {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                log::warn!("Reference count underflow on '{}'", self.display_name());
                return None;
            }
            match self.refs.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(current - 1),
                Err(actual) => current = actual,
            }
        }
    }

    // --- Proxy bookkeeping ---

    /// The redirection counter of a proxy.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Starts a new redirection and returns its epoch.
    ///
    /// Callbacks registered for an older epoch must not publish into the proxy.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    // --- Updates ---

    /// Returns `true` if the update loop should drive this handle now.
    ///
    /// The handle must be automatic, busy, referenced, and not currently locked by
    /// another update or unload.
    pub fn can_auto_update(&self) -> bool {
        self.automatic && self.status().is_busy() && self.refs() > 0 && !self.slot.is_locked()
    }

    /// Advances loading by one step if the handle is eligible. See [`Self::update`].
    pub fn auto_update(
        &self,
        device: &Arc<dyn GraphicsDevice>,
        on_worker: bool,
        poll_timeout: Duration,
    ) -> Status {
        if !self.can_auto_update() {
            return self.status();
        }
        self.update(device, on_worker, poll_timeout)
    }

    /// Advances loading by one step, regardless of the automatic flag.
    ///
    /// With a fence pending, only the fence is polled. Otherwise the resource's
    /// `load` runs and its outcome decides the new status:
    ///
    /// - `Ready` publishes [`Status::Ok`];
    /// - `Pending` stays busy;
    /// - `Submitted` inserts a fence (flushed when called from the worker) and stays
    ///   busy until it retires. Without fence support the device is finished and the
    ///   handle completes at once;
    /// - an error is logged and becomes the permanent status.
    pub fn update(
        &self,
        device: &Arc<dyn GraphicsDevice>,
        on_worker: bool,
        poll_timeout: Duration,
    ) -> Status {
        self.step(device, on_worker, poll_timeout, false)
    }

    /// One load step. With `block_on_fence`, a pending fence is waited on for up to
    /// `timeout` instead of polled once.
    fn step(
        &self,
        device: &Arc<dyn GraphicsDevice>,
        on_worker: bool,
        timeout: Duration,
        block_on_fence: bool,
    ) -> Status {
        let mut slot = self.slot.lock();
        if !self.status().is_busy() {
            return self.status();
        }

        if let Some(fence) = slot.fence.as_mut() {
            let status = if block_on_fence {
                fence.wait(timeout)
            } else {
                fence.check(timeout)
            };
            if status.is_busy() {
                return Status::Busy;
            }
            slot.fence = None;
            drop(slot);
            if status.is_error() {
                log::error!("Fence of '{}' failed: {}", self.display_name(), status);
            }
            self.publish(status);
            return status;
        }

        let Some(resource) = slot.resource.as_mut() else {
            return self.status();
        };

        let ctx = LoadContext::new(self.file.as_deref(), &**device, on_worker);
        let outcome = match resource.load(&ctx) {
            Ok(LoadState::Ready) => Status::Ok,
            Ok(LoadState::Pending) => Status::Busy,
            Ok(LoadState::Submitted) => {
                let mut fence = Fence::new(Arc::clone(device));
                if fence.create(on_worker) {
                    slot.fence = Some(fence);
                    Status::Busy
                } else {
                    device.finish();
                    Status::Ok
                }
            }
            Err(e) => {
                log::error!(
                    "Failed to load resource '{}' ({}): {}",
                    self.display_name(),
                    self.kind_name,
                    e
                );
                e.status()
            }
        };
        drop(slot);

        if outcome.is_ok() {
            log::debug!("Resource '{}' loaded", self.display_name());
        }
        if !outcome.is_busy() {
            self.publish(outcome);
        }
        outcome
    }

    /// Drives the handle until it leaves the busy state or `timeout` elapses.
    ///
    /// Once the load is submitted, the fence is waited on for the rest of the budget.
    pub fn load_blocking(&self, device: &Arc<dyn GraphicsDevice>, timeout: Duration) -> Status {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let status = self.step(device, false, remaining, true);
            if !status.is_busy() || Instant::now() >= deadline {
                return status;
            }
            std::thread::yield_now();
        }
    }

    /// Releases the resource's GPU state and returns the handle to its
    /// construction-time status.
    ///
    /// Idempotent. A pending fence is dropped, names and queued callbacks are kept.
    pub fn nullify(&self) {
        let mut slot = self.slot.lock();
        slot.fence = None;
        if let Some(resource) = slot.resource.as_mut() {
            if let Err(e) = resource.unload() {
                log::warn!("Unloading '{}' reported: {}", self.display_name(), e);
            }
        }
        self.set_status(self.initial);
    }

    /// Calls the resource's reshape hook if it is loaded.
    pub fn reshape(&self) {
        if !self.is_usable() {
            return;
        }
        if let Some(resource) = self.slot.lock().resource.as_mut() {
            resource.reshape();
        }
    }

    // --- Access ---

    /// Runs `f` with shared access to the resource if it is of kind `T`.
    ///
    /// Blocks while an update of this handle is in flight. Callers normally check
    /// [`Self::is_usable`] first.
    pub fn with_resource<T: Resource, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slot = self.slot.lock();
        let resource = slot.resource.as_ref()?.as_any().downcast_ref::<T>()?;
        Some(f(resource))
    }

    /// Runs `f` with exclusive access to the resource if it is of kind `T`.
    pub fn with_resource_mut<T: Resource, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        let resource = slot.resource.as_mut()?.as_any_mut().downcast_mut::<T>()?;
        Some(f(resource))
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.name)
            .field("kind", &self.kind_name)
            .field("status", &self.status())
            .field("refs", &self.refs())
            .field("proxy", &self.proxy)
            .finish()
    }
}
