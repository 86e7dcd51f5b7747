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

use super::SpinLock;
use crate::graphics::GraphicsDevice;

/// A fixed-capacity pool of pre-generated GPU object names.
///
/// Resource kinds that create many small GPU objects take names from here instead of
/// asking the driver one at a time. Running dry is not fatal: [`NamePool::acquire`]
/// logs a warning and hands out the null name `0`, which resources treat as "not
/// created yet".
pub struct NamePool {
    label: String,
    capacity: usize,
    free: SpinLock<Vec<u32>>,
}

impl NamePool {
    /// Creates a pool filled with the given names.
    pub fn new(label: impl Into<String>, names: Vec<u32>) -> Self {
        let capacity = names.len();
        Self {
            label: label.into(),
            capacity,
            free: SpinLock::new(names),
        }
    }

    /// Creates a pool of `capacity` names generated by `device`.
    pub fn from_device(label: impl Into<String>, device: &dyn GraphicsDevice, capacity: usize) -> Self {
        let names = device.generate_names(capacity);
        Self::new(label, names)
    }

    /// Takes a name from the pool, or returns `0` when the pool is exhausted.
    pub fn acquire(&self) -> u32 {
        match self.free.lock().pop() {
            Some(name) => name,
            None => {
                log::warn!(
                    "Name pool '{}' exhausted ({} names), returning the null name",
                    self.label,
                    self.capacity
                );
                0
            }
        }
    }

    /// Returns a name to the pool.
    ///
    /// The null name and names beyond the pool's capacity are ignored.
    pub fn release(&self, name: u32) {
        if name == 0 {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(name);
        }
    }

    /// Number of names currently available.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total number of names the pool was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empties the pool and returns every name still held, e.g. to delete them
    /// on the device before a reset.
    pub fn drain(&self) -> Vec<u32> {
        std::mem::take(&mut *self.free.lock())
    }
}
