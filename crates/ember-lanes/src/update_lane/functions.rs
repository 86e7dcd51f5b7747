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

use ember_core::Status;
use parking_lot::Mutex;

/// A function run on the thread owning the resource context.
///
/// Returning [`Status::Busy`] keeps it queued for the next run.
pub type DeferredFn = Box<dyn FnMut() -> Status + Send>;

/// Functions waiting to run on the resource thread.
#[derive(Default)]
pub struct FunctionQueue {
    functions: Mutex<Vec<DeferredFn>>,
}

impl FunctionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `function` for the next run.
    pub fn attach(&self, function: impl FnMut() -> Status + Send + 'static) {
        self.functions.lock().push(Box::new(function));
    }

    /// Calls every queued function once and drops those that are done.
    ///
    /// Functions may attach new functions while running. Those run on the next call.
    /// Returns the number of functions still queued.
    pub fn run(&self) -> usize {
        let mut current = std::mem::take(&mut *self.functions.lock());
        if current.is_empty() {
            return self.len();
        }

        current.retain_mut(|function| function().is_busy());

        let mut functions = self.functions.lock();
        current.append(&mut *functions);
        *functions = current;
        functions.len()
    }

    /// Number of queued functions.
    pub fn len(&self) -> usize {
        self.functions.lock().len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.functions.lock().is_empty()
    }

    /// Drops every queued function without running it.
    pub fn clear(&self) {
        self.functions.lock().clear();
    }
}
