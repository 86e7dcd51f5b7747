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

//! Proxy redirection.
//!
//! A proxy is a handle without a resource of its own. It holds one reference on its
//! current target, and turns usable when the target does. Every redirection bumps the
//! proxy's epoch so a callback left on a previous target never publishes.

use super::manager::ResourceManager;
use super::ptr::ResourcePtr;
use ember_core::{Resource, ResourceError, Status};
use ember_data::{HandleId, ResourceHandle};
use std::sync::Arc;

impl ResourceManager {
    /// Points `proxy` at `target`, or detaches it with `None`.
    ///
    /// The previous target loses the proxy's reference, the new one gains it. The
    /// proxy turns busy and mirrors [`Status::Ok`] once the target is usable.
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidCall`] if `proxy` is not a proxy, and
    /// [`ResourceError::InvalidInput`] if `target` is the proxy itself or another
    /// proxy.
    pub fn assign_proxy<T: Resource>(
        &self,
        proxy: &ResourcePtr<T>,
        target: Option<&ResourcePtr<T>>,
    ) -> Result<(), ResourceError> {
        if !proxy.is_proxy() {
            return Err(ResourceError::InvalidCall(format!(
                "'{}' is not a proxy",
                proxy.handle().display_name()
            )));
        }
        if let Some(target) = target {
            if target.id() == proxy.id() {
                return Err(ResourceError::InvalidInput(
                    "a proxy cannot target itself".to_string(),
                ));
            }
            if target.is_proxy() {
                return Err(ResourceError::InvalidInput(
                    "a proxy cannot target another proxy".to_string(),
                ));
            }
        }

        let target_handle = target.map(|t| Arc::clone(t.handle()));
        let held = target.map(|t| t.guard().clone());
        let previous = self.shared().proxies.lock().insert(proxy.id(), held);
        if let Some(previous) = previous.as_ref().and_then(|p| p.as_ref()) {
            previous.handle().cancel_loaded(proxy.handle().serial());
        }

        let epoch = proxy.handle().bump_epoch();
        proxy.handle().set_status(Status::Busy);
        if let Some(target) = target_handle {
            link(proxy.handle(), &target, epoch);
        }

        // Releases the reference on the previous target, once.
        drop(previous);
        Ok(())
    }

    /// The id of the current target of `proxy`, if it has one.
    pub fn proxy_target<T: Resource>(&self, proxy: &ResourcePtr<T>) -> Option<HandleId> {
        self.shared()
            .proxies
            .lock()
            .get(&proxy.id())?
            .as_ref()
            .map(|guard| guard.id())
    }

    /// Re-links every proxy to its current target after the targets were rebuilt.
    pub(super) fn propagate_proxies(&self) {
        let links: Vec<(HandleId, HandleId)> = self
            .shared()
            .proxies
            .lock()
            .iter()
            .filter_map(|(&proxy, held)| held.as_ref().map(|guard| (proxy, guard.id())))
            .collect();

        for (proxy, target) in links {
            let (proxy, target) = {
                let table = self.shared().table.read();
                (table.get(proxy).cloned(), table.get(target).cloned())
            };
            let (Some(proxy), Some(target)) = (proxy, target) else {
                continue;
            };
            let epoch = proxy.bump_epoch();
            proxy.set_status(Status::Busy);
            link(&proxy, &target, epoch);
        }
    }
}

/// Mirrors the target's first transition to OK into the proxy, unless the proxy was
/// redirected in the meantime.
///
/// The callback is keyed by the proxy, so relinking replaces the previous one.
fn link(proxy: &Arc<ResourceHandle>, target: &ResourceHandle, epoch: u64) {
    let owner = proxy.serial();
    let proxy = Arc::downgrade(proxy);
    target.on_loaded_once_for(owner, Box::new(move || {
        let Some(proxy) = proxy.upgrade() else {
            return;
        };
        if proxy.epoch() == epoch {
            proxy.publish(Status::Ok);
        }
    }));
}
