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

use super::ptr::{RefGuard, ResourcePtr};
use super::reset::{ResetBinding, ResetRegistry};
use crossbeam_channel::{Receiver, Sender};
use ember_core::{
    GraphicsDevice, ManagerConfig, Reset, ResetMode, Resource, ResourceError, ResourceSource,
    Status, UpdateMode,
};
use ember_data::{HandleArena, HandleId, ResourceHandle};
use ember_io::{Archive, FileProvider, ResourceFile};
use ember_lanes::{update_pass, FunctionQueue, PassStats, UpdateWorker, WorkerConfig};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// State shared between the manager and its worker thread.
///
/// Lock order: `table` before `files`. `proxies` is never held together with
/// `table`.
pub(super) struct Shared {
    pub(super) config: ManagerConfig,
    pub(super) device: Arc<dyn GraphicsDevice>,
    pub(super) table: RwLock<HandleArena>,
    files: Mutex<FileProvider>,
    /// Proxy id to the reference it holds on its current target.
    pub(super) proxies: Mutex<HashMap<HandleId, Option<RefGuard>>>,
    defaults: RwLock<HashMap<TypeId, Arc<ResourceHandle>>>,
    resets: ResetRegistry,
    functions: FunctionQueue,
    active: AtomicBool,
    reap_tx: Sender<HandleId>,
    reap_rx: Receiver<HandleId>,
}

/// The central service for loading, sharing and reclaiming resources.
///
/// Resources are deduplicated by name and reference counted through
/// [`ResourcePtr`]. Loading is asynchronous: a new handle is [`Status::Busy`] until
/// the update loop has run its `load` step and any GPU fence it submitted retired.
/// The loop runs on a dedicated thread when the device offers a secondary context,
/// and on the caller of [`ResourceManager::update_resources`] otherwise.
///
/// A new manager starts initialized. It is meant to be created once and shared by
/// `Arc`.
pub struct ResourceManager {
    shared: Arc<Shared>,
    worker: Mutex<Option<UpdateWorker>>,
}

impl ResourceManager {
    /// Creates a manager over `device`.
    ///
    /// Archives listed in the configuration are opened, then the manager runs its
    /// init reset, which starts the worker thread if the device supports it.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: ManagerConfig) -> Self {
        let mut files = FileProvider::new(config.root.clone());
        for path in &config.archives {
            files.retrieve_archive(path);
        }
        let (reap_tx, reap_rx) = crossbeam_channel::unbounded();

        let manager = Self {
            shared: Arc::new(Shared {
                config,
                device,
                table: RwLock::new(HandleArena::new()),
                files: Mutex::new(files),
                proxies: Mutex::new(HashMap::new()),
                defaults: RwLock::new(HashMap::new()),
                resets: ResetRegistry::new(),
                functions: FunctionQueue::new(),
                active: AtomicBool::new(false),
                reap_tx,
                reap_rx,
            }),
            worker: Mutex::new(None),
        };
        log::info!("Resource Manager created.");
        manager.reset(ResetMode::Init);
        manager
    }

    pub(super) fn shared(&self) -> &Shared {
        &self.shared
    }

    // --- Loading ---

    /// Loads the resource `name`, building it with `T::default()` if needed.
    ///
    /// See [`Self::load_with`].
    pub fn load<T: Resource + Default>(
        &self,
        name: &str,
        mode: UpdateMode,
        path: Option<&str>,
    ) -> Result<ResourcePtr<T>, ResourceError> {
        self.load_with(name, mode, path, T::default)
    }

    /// Returns the resource registered as `name`, creating it on first request.
    ///
    /// An existing handle is shared and `make` is not called. Otherwise `path` is
    /// resolved through the file provider, the resource is built by `make` and the new
    /// handle is inserted, all under the table lock, so concurrent callers for the
    /// same name build exactly one resource. `make` must not call back into the
    /// manager.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidInput`] for an empty name and
    /// [`ResourceError::InvalidCall`] if `name` already holds another kind.
    pub fn load_with<T: Resource>(
        &self,
        name: &str,
        mode: UpdateMode,
        path: Option<&str>,
        make: impl FnOnce() -> T,
    ) -> Result<ResourcePtr<T>, ResourceError> {
        if name.is_empty() {
            return Err(ResourceError::InvalidInput(
                "resource name must not be empty".to_string(),
            ));
        }

        let mut table = self.shared.table.write();
        if let Some(id) = table.find(name) {
            let handle = table
                .get(id)
                .cloned()
                .ok_or_else(|| ResourceError::System(format!("stale name entry '{}'", name)))?;
            return self.share(id, handle);
        }

        let file = path.map(|p| self.retrieve_file(p) as Arc<dyn ResourceSource>);
        let handle = Arc::new(ResourceHandle::new(
            make(),
            file,
            name,
            mode == UpdateMode::Auto,
        ));
        let id = table.insert(Arc::clone(&handle));
        let ptr = ResourcePtr::new(self.guard(id, handle));
        drop(table);

        log::debug!("Resource '{}' registered", name);
        Ok(ptr)
    }

    /// Returns the already loaded resource `name`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidCall`] if nothing is registered under `name` or it
    /// holds another kind.
    pub fn get<T: Resource>(&self, name: &str) -> Result<ResourcePtr<T>, ResourceError> {
        let table = self.shared.table.read();
        let (id, handle) = table
            .find(name)
            .and_then(|id| table.get(id).map(|h| (id, Arc::clone(h))))
            .ok_or_else(|| ResourceError::InvalidCall(format!("resource '{}' is not loaded", name)))?;
        // The reference is taken under the read lock, so reclamation cannot remove the
        // handle in between.
        let ptr = self.share(id, handle);
        drop(table);
        ptr
    }

    /// Creates an anonymous resource owned by the caller alone.
    ///
    /// The handle is manual, has no file and is usable immediately.
    pub fn load_new<T: Resource + Default>(&self) -> ResourcePtr<T> {
        self.load_new_with(UpdateMode::Manual, None, T::default)
    }

    /// Creates an anonymous, non-deduplicated resource built by `make`.
    pub fn load_new_with<T: Resource>(
        &self,
        mode: UpdateMode,
        path: Option<&str>,
        make: impl FnOnce() -> T,
    ) -> ResourcePtr<T> {
        let file = path.map(|p| self.retrieve_file(p) as Arc<dyn ResourceSource>);
        let handle = Arc::new(ResourceHandle::new(
            make(),
            file,
            "",
            mode == UpdateMode::Auto,
        ));
        self.insert(handle)
    }

    /// Creates a proxy for resources of kind `T`.
    ///
    /// The proxy stays busy until [`Self::assign_proxy`] gives it a target.
    pub fn load_proxy_new<T: Resource>(&self) -> ResourcePtr<T> {
        let ptr = self.insert(Arc::new(ResourceHandle::new_proxy::<T>()));
        self.shared.proxies.lock().insert(ptr.id(), None);
        ptr
    }

    /// Releases the caller's reference and clears the slot.
    ///
    /// The last release queues the handle for [`Self::apply_nullify`].
    pub fn free<T: Resource>(&self, slot: &mut Option<ResourcePtr<T>>) {
        if slot.take().is_none() {
            log::debug!("free called on an empty slot");
        }
    }

    fn insert<T: Resource>(&self, handle: Arc<ResourceHandle>) -> ResourcePtr<T> {
        let mut table = self.shared.table.write();
        let id = table.insert(Arc::clone(&handle));
        ResourcePtr::new(self.guard(id, handle))
    }

    fn share<T: Resource>(
        &self,
        id: HandleId,
        handle: Arc<ResourceHandle>,
    ) -> Result<ResourcePtr<T>, ResourceError> {
        if handle.kind() != TypeId::of::<T>() {
            return Err(ResourceError::InvalidCall(format!(
                "resource '{}' is a {}, not a {}",
                handle.display_name(),
                handle.kind_name(),
                std::any::type_name::<T>()
            )));
        }
        Ok(ResourcePtr::new(self.guard(id, handle)))
    }

    pub(super) fn guard(&self, id: HandleId, handle: Arc<ResourceHandle>) -> RefGuard {
        RefGuard::acquire(id, handle, self.shared.reap_tx.clone())
    }

    // --- Reclamation ---

    /// Unloads and removes every queued handle that is still unreferenced.
    ///
    /// Handles referenced again since they were queued are kept. Removing a proxy
    /// releases its target, which may queue the target in turn, so the queue is
    /// drained until it stays empty. Returns the number of removed handles.
    pub fn apply_nullify(&self) -> usize {
        let mut total = 0;
        loop {
            let removed = self.reclaim_queued();
            if removed == 0 {
                return total;
            }
            total += removed;
        }
    }

    fn reclaim_queued(&self) -> usize {
        let removed: Vec<(HandleId, Arc<ResourceHandle>)> = {
            let mut table = self.shared.table.write();
            self.shared
                .reap_rx
                .try_iter()
                .filter_map(|id| {
                    let unreferenced = table.get(id)?.refs() == 0;
                    if unreferenced {
                        table.remove(id).map(|handle| (id, handle))
                    } else {
                        None
                    }
                })
                .collect()
        };

        for (id, handle) in &removed {
            handle.nullify();
            let held = self.shared.proxies.lock().remove(id);
            drop(held);
            log::debug!("Resource '{}' reclaimed", handle.display_name());
        }
        removed.len()
    }

    // --- Updates ---

    /// The main-thread pump.
    ///
    /// Reclaims queued handles, then, when no worker thread is running, advances every
    /// eligible handle by one step.
    pub fn update_resources(&self) -> PassStats {
        self.apply_nullify();
        if !self.is_active() || self.has_worker() {
            return PassStats::default();
        }
        update_pass(
            &self.shared.table,
            &self.shared.device,
            false,
            self.shared.config.fence_poll_timeout(),
        )
    }

    /// Runs the queued functions once when no worker thread owns them.
    ///
    /// Returns the number of functions still queued.
    pub fn update_functions(&self) -> usize {
        if self.has_worker() {
            return self.shared.functions.len();
        }
        self.shared.functions.run()
    }

    /// Queues `function` to run on the thread owning the resource context.
    ///
    /// It is called once per pump until it returns something other than
    /// [`Status::Busy`].
    pub fn attach_function(&self, function: impl FnMut() -> Status + Send + 'static) {
        self.shared.functions.attach(function);
    }

    /// Advances one handle on the calling thread, whatever its update mode.
    pub fn update_now<T: Resource>(&self, ptr: &ResourcePtr<T>) -> Status {
        if ptr.is_proxy() {
            return Status::InvalidCall;
        }
        ptr.handle().update(
            &self.shared.device,
            false,
            self.shared.config.fence_poll_timeout(),
        )
    }

    /// Waits until no referenced automatic handle is busy, or `timeout` elapses.
    ///
    /// Pumps the update loop itself when no worker thread runs. `None` uses the
    /// configured startup budget. Returns the number of handles still loading.
    pub fn wait_for_startup(&self, timeout: Option<Duration>) -> usize {
        let budget = timeout.unwrap_or_else(|| self.shared.config.startup_wait());
        let deadline = Instant::now() + budget;

        loop {
            let pending = self.pending_count();
            if pending == 0 {
                return 0;
            }
            if !self.is_active() || Instant::now() >= deadline {
                log::warn!("{} resources still loading after {:?}", pending, budget);
                return pending;
            }

            if self.has_worker() {
                thread::sleep(Duration::from_millis(1));
            } else {
                self.update_resources();
                self.update_functions();
                thread::yield_now();
            }
        }
    }

    /// Number of referenced automatic handles still busy.
    pub fn pending_count(&self) -> usize {
        self.shared
            .table
            .read()
            .iter()
            .filter(|(_, h)| h.is_automatic() && h.refs() > 0 && h.status().is_busy())
            .count()
    }

    // --- Access ---

    /// The status of `ptr`. A proxy reports the status mirrored from its target.
    pub fn status<T: Resource>(&self, ptr: &ResourcePtr<T>) -> Status {
        ptr.status()
    }

    /// Returns `true` if `ptr`, or the target of a proxy, may be used.
    pub fn is_usable<T: Resource>(&self, ptr: &ResourcePtr<T>) -> bool {
        ptr.is_usable() && self.resolve(ptr).is_some_and(|h| h.is_usable())
    }

    /// Runs `f` with the resource behind `ptr`.
    ///
    /// Proxies resolve to their current target. While the resource is not usable the
    /// default resource of kind `T` is used instead, if one is set. Returns `None` when
    /// neither is available.
    pub fn read<T: Resource, R>(&self, ptr: &ResourcePtr<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        let handle = match self.resolve(ptr).filter(|h| h.is_usable()) {
            Some(handle) => handle,
            None => self.default_of::<T>()?,
        };
        handle.with_resource(f)
    }

    /// Runs `f` with exclusive access to the usable resource behind `ptr`.
    pub fn write<T: Resource, R>(
        &self,
        ptr: &ResourcePtr<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        self.resolve(ptr)
            .filter(|h| h.is_usable())?
            .with_resource_mut(f)
    }

    /// The handle `ptr` designates, looking through proxies by id.
    ///
    /// A proxy whose target was reclaimed resolves to `None`.
    pub(super) fn resolve<T: Resource>(&self, ptr: &ResourcePtr<T>) -> Option<Arc<ResourceHandle>> {
        if !ptr.is_proxy() {
            return Some(Arc::clone(ptr.handle()));
        }
        let target = {
            let proxies = self.shared.proxies.lock();
            proxies.get(&ptr.id())?.as_ref()?.id()
        };
        self.shared.table.read().get(target).cloned()
    }

    // --- Defaults ---

    /// Sets the stand-in for busy resources of kind `T`, built by `T::default()`.
    ///
    /// See [`Self::set_default_with`].
    pub fn set_default<T: Resource + Default>(&self, path: Option<&str>) -> Status {
        self.set_default_with(path, T::default)
    }

    /// Sets the stand-in used by [`Self::read`] while a resource of kind `T` loads.
    ///
    /// The default is loaded synchronously and replaces any previous default of the
    /// same kind. Returns its load status.
    pub fn set_default_with<T: Resource>(&self, path: Option<&str>, make: impl FnOnce() -> T) -> Status {
        let file = path.map(|p| self.retrieve_file(p) as Arc<dyn ResourceSource>);
        let handle = Arc::new(ResourceHandle::new(make(), file, "", true));

        let status = if self.is_active() {
            handle.load_blocking(&self.shared.device, self.shared.config.startup_wait())
        } else {
            handle.status()
        };
        if status.is_error() {
            log::error!(
                "Default resource for {} failed to load: {}",
                std::any::type_name::<T>(),
                status
            );
        }

        let previous = self
            .shared
            .defaults
            .write()
            .insert(TypeId::of::<T>(), handle);
        if let Some(previous) = previous {
            previous.nullify();
        }
        status
    }

    fn default_of<T: Resource>(&self) -> Option<Arc<ResourceHandle>> {
        self.shared
            .defaults
            .read()
            .get(&TypeId::of::<T>())
            .filter(|h| h.is_usable())
            .cloned()
    }

    // --- Reset ---

    /// Tears down or rebuilds all GPU state. Redundant calls are ignored.
    ///
    /// `Exit` stops the worker, finishes the device, notifies relation objects and
    /// nullifies every handle, keeping names and table entries. `Init` reloads the
    /// defaults, re-links every proxy, notifies relation objects and restarts the
    /// worker when the device supports one.
    pub fn reset(&self, mode: ResetMode) {
        match mode {
            ResetMode::Exit => self.exit(),
            ResetMode::Init => self.init(),
        }
    }

    fn exit(&self) {
        if !self.shared.active.swap(false, Ordering::AcqRel) {
            log::debug!("Reset exit ignored, the manager is not active");
            return;
        }
        log::info!("Resource Manager reset: exit");

        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
        self.shared.device.finish();
        self.shared.resets.notify(ResetMode::Exit);

        let handles = self.shared.table.read().snapshot();
        for (_, handle) in handles {
            handle.nullify();
        }
        let defaults: Vec<_> = self.shared.defaults.read().values().cloned().collect();
        for handle in defaults {
            handle.nullify();
        }
    }

    fn init(&self) {
        if self.shared.active.swap(true, Ordering::AcqRel) {
            log::debug!("Reset init ignored, the manager is already active");
            return;
        }
        log::info!("Resource Manager reset: init");

        let defaults: Vec<_> = self.shared.defaults.read().values().cloned().collect();
        for handle in defaults {
            let status = handle.load_blocking(&self.shared.device, self.shared.config.startup_wait());
            if !status.is_ok() {
                log::warn!("Default {} reloaded with status {}", handle.kind_name(), status);
            }
        }
        self.propagate_proxies();
        self.shared.resets.notify(ResetMode::Init);

        if self.shared.device.supports_worker_context() {
            self.start_worker();
        } else {
            log::info!("No secondary context available, resources update on the main thread.");
        }
    }

    fn start_worker(&self) {
        let shared = Arc::clone(&self.shared);
        let config = WorkerConfig::from(&shared.config);
        let device = Arc::clone(&shared.device);

        let tick = move || {
            if shared.active.load(Ordering::Acquire) {
                update_pass(
                    &shared.table,
                    &shared.device,
                    true,
                    shared.config.fence_poll_timeout(),
                );
                shared.functions.run();
            }
        };

        match UpdateWorker::start(config, device, tick) {
            Ok(worker) => *self.worker.lock() = Some(worker),
            Err(e) => log::error!(
                "Failed to spawn the resource thread, updating on the main thread: {}",
                e
            ),
        }
    }

    /// Calls the reshape hook of every relation object and every loaded resource.
    pub fn reshape(&self) {
        self.shared.resets.reshape();
        let handles = self.shared.table.read().snapshot();
        for (_, handle) in handles {
            handle.reshape();
        }
        let defaults: Vec<_> = self.shared.defaults.read().values().cloned().collect();
        for handle in defaults {
            handle.reshape();
        }
    }

    /// Registers a relation object until the returned binding is dropped.
    #[must_use = "dropping the binding unregisters the object"]
    pub fn register_reset(&self, object: Weak<dyn Reset>) -> ResetBinding {
        self.shared.resets.register(object)
    }

    /// The relation object registry.
    pub fn resets(&self) -> &ResetRegistry {
        &self.shared.resets
    }

    // --- Files ---

    /// Resolves `path` to a file: loose file, then mounted archives, then an empty
    /// placeholder.
    pub fn retrieve_file(&self, path: &str) -> Arc<ResourceFile> {
        self.shared.files.lock().retrieve_file(path)
    }

    /// Opens (or returns the cached) archive at `path`.
    pub fn retrieve_archive(&self, path: &str) -> Arc<Archive> {
        self.shared.files.lock().retrieve_archive(path)
    }

    /// Makes an archive assembled in memory searchable under `path`.
    pub fn mount_archive(&self, path: &str, archive: Archive) -> Arc<Archive> {
        self.shared.files.lock().mount_archive(path, archive)
    }

    /// Registers a memory-only file under `path`.
    pub fn insert_memory_file(&self, path: &str, bytes: Vec<u8>) -> Arc<ResourceFile> {
        self.shared.files.lock().insert_memory_file(path, bytes)
    }

    /// Releases the cached bytes of every file. Returns how many were released.
    pub fn release_file_data(&self) -> usize {
        self.shared.files.lock().release_data()
    }

    // --- Introspection ---

    /// Number of handles in the table, proxies included.
    pub fn handle_count(&self) -> usize {
        self.shared.table.read().len()
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// The graphics device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.shared.device
    }

    /// Returns `true` between an init and an exit reset.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Returns `true` while the background thread drives updates.
    pub fn has_worker(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| worker.is_running())
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.reset(ResetMode::Exit);
        self.shared.functions.clear();

        let links: Vec<_> = self.shared.proxies.lock().drain().collect();
        drop(links);
        self.apply_nullify();

        let leftover = self.shared.table.write().drain();
        for handle in &leftover {
            if handle.refs() > 0 {
                log::warn!(
                    "Resource '{}' still has {} references at shutdown",
                    handle.display_name(),
                    handle.refs()
                );
            }
        }
        self.shared.defaults.write().clear();

        if !self.shared.resets.is_empty() {
            log::warn!(
                "{} relation objects are still registered at shutdown",
                self.shared.resets.len()
            );
        }
        log::info!("Resource Manager destroyed.");
    }
}
