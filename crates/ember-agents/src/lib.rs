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

//! # Ember Agents
//!
//! The orchestration layer of the resource system. [`ResourceManager`] owns the
//! handle table, the file caches, the proxy table and the background worker, and is
//! the only type the rest of the engine needs to talk to.

pub mod resource_agent;

pub use resource_agent::{ResetBinding, ResetRegistry, ResourceManager, ResourcePtr};
