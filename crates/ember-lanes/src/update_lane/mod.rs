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

//! The resource update lane.
//!
//! The same [`update_pass`] runs on the background worker when a secondary graphics
//! context exists, and on the main thread otherwise. Only the `on_worker` flag
//! differs between the two.

mod functions;
mod pass;
mod worker;

pub use self::functions::{DeferredFn, FunctionQueue};
pub use self::pass::{update_pass, PassStats};
pub use self::worker::{UpdateWorker, WorkerConfig};
