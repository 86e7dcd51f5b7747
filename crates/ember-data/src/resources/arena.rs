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

use super::handle::ResourceHandle;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::sync::Arc;

new_key_type! {
    /// A stable, generational identifier of a handle in the [`HandleArena`].
    ///
    /// Ids of removed handles are never handed out again, so a stale id resolves to
    /// nothing instead of to an unrelated handle.
    pub struct HandleId;
}

/// The handle table: generational storage plus a name index.
///
/// Besides the slot map, the arena keeps the ids in insertion order so the update
/// loop can walk it index by index while other threads insert.
#[derive(Default)]
pub struct HandleArena {
    slots: SlotMap<HandleId, Arc<ResourceHandle>>,
    names: HashMap<String, HandleId>,
    order: Vec<HandleId>,
}

impl HandleArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a handle. Named handles are indexed by name.
    ///
    /// The caller guarantees names are unique.
    pub fn insert(&mut self, handle: Arc<ResourceHandle>) -> HandleId {
        let name = handle.name().to_string();
        let id = self.slots.insert(handle);
        if !name.is_empty() {
            self.names.insert(name, id);
        }
        self.order.push(id);
        id
    }

    /// Returns the handle stored under `id`.
    pub fn get(&self, id: HandleId) -> Option<&Arc<ResourceHandle>> {
        self.slots.get(id)
    }

    /// Returns the id of the live handle named `name`.
    pub fn find(&self, name: &str) -> Option<HandleId> {
        self.names.get(name).copied()
    }

    /// Returns `true` if `id` is still live.
    pub fn contains(&self, id: HandleId) -> bool {
        self.slots.contains_key(id)
    }

    /// Removes a handle and its name entry.
    pub fn remove(&mut self, id: HandleId) -> Option<Arc<ResourceHandle>> {
        let handle = self.slots.remove(id)?;
        if !handle.name().is_empty() {
            self.names.remove(handle.name());
        }
        self.order.retain(|&other| other != id);
        Some(handle)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when no handle is stored.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The handle at position `index` in insertion order.
    pub fn at(&self, index: usize) -> Option<(HandleId, &Arc<ResourceHandle>)> {
        let id = *self.order.get(index)?;
        self.slots.get(id).map(|handle| (id, handle))
    }

    /// Iterates over every live handle in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (HandleId, &Arc<ResourceHandle>)> {
        self.order
            .iter()
            .filter_map(move |&id| self.slots.get(id).map(|handle| (id, handle)))
    }

    /// Clones every handle out of the arena, for work done without the table lock.
    pub fn snapshot(&self) -> Vec<(HandleId, Arc<ResourceHandle>)> {
        self.iter().map(|(id, h)| (id, Arc::clone(h))).collect()
    }

    /// Removes every handle and returns them.
    pub fn drain(&mut self) -> Vec<Arc<ResourceHandle>> {
        self.names.clear();
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.slots.remove(id))
            .collect()
    }
}
